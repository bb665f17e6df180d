use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, Args, Parser, Subcommand};

mod logging;

use equipment_alarm_insights::config::EngineConfig;
use equipment_alarm_insights::diagnostics::DiagnosticsSnapshot;
use equipment_alarm_insights::drilldown::Selection;
use equipment_alarm_insights::export::CsvExport;
use equipment_alarm_insights::filter::FilterSpec;
use equipment_alarm_insights::loader::{ChunkLoader, FsPartitionSource, Manifest};
use equipment_alarm_insights::models::EquipmentType;
use equipment_alarm_insights::session::Session;
use equipment_alarm_insights::{report, weeks};

#[derive(Parser)]
#[command(name = "alarm-insights")]
#[command(about = "Equipment alarm rankings, drilldowns and weekly trends", long_about = None)]
struct Cli {
    /// Partition manifest (falls back to ALARM_MANIFEST)
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,
    /// Engine tunables as JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct FilterArgs {
    /// Equipment type (AIB, AOB, FLIB, UNKNOWN); repeatable
    #[arg(long = "type", value_parser = parse_equipment)]
    types: Vec<EquipmentType>,
    #[arg(long)]
    site: Vec<String>,
    #[arg(long)]
    cell: Vec<String>,
    /// Walmart week, e.g. W07; repeatable
    #[arg(long, value_parser = parse_week_arg)]
    week: Vec<u8>,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
}

impl FilterArgs {
    fn to_spec(&self) -> FilterSpec {
        FilterSpec::default()
            .with_types(self.types.iter().copied())
            .with_sites(self.site.iter().cloned())
            .with_cells(self.cell.iter().cloned())
            .with_weeks(self.week.iter().copied())
            .with_date_range(self.from, self.to)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print headline metrics and rankings, or write a markdown report
    Summary {
        #[command(flatten)]
        filters: FilterArgs,
        /// Add insights for one week
        #[arg(long, value_parser = parse_week_arg)]
        focus: Option<u8>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Alarm-type breakdown scoped to one cell or component
    #[command(group(
        ArgGroup::new("target")
            .args(["drill_cell", "component"])
            .required(true)
            .multiple(false)
    ))]
    Drill {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long = "drill-cell")]
        drill_cell: Option<String>,
        #[arg(long)]
        component: Option<String>,
    },
    /// Weekly counts with week-over-week change
    Weeks {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_parser = parse_week_arg)]
        focus: Option<u8>,
    },
    /// Write the filtered alarms as CSV
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "alarms_export.csv")]
        out: PathBuf,
    },
    /// Print load and filter counters as JSON
    Diagnostics {
        #[command(flatten)]
        filters: FilterArgs,
    },
}

fn parse_equipment(value: &str) -> Result<EquipmentType, String> {
    EquipmentType::parse(value).ok_or_else(|| format!("unknown equipment type {value}"))
}

fn parse_week_arg(value: &str) -> Result<u8, String> {
    weeks::parse_week(value).ok_or_else(|| format!("invalid week {value}, expected W01..W52"))
}

fn manifest_path(cli_value: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    match cli_value {
        Some(path) => Ok(path),
        None => std::env::var("ALARM_MANIFEST")
            .map(PathBuf::from)
            .context("pass --manifest or set ALARM_MANIFEST to the partition manifest"),
    }
}

async fn open_session(manifest_path: &Path, config: &EngineConfig) -> anyhow::Result<Session> {
    let manifest = Manifest::from_path(manifest_path)
        .await
        .with_context(|| format!("failed to read manifest {}", manifest_path.display()))?;
    let loader = ChunkLoader::new(
        FsPartitionSource,
        config.loader.clone(),
        config.calendar,
        config.prefix_table(),
    );

    let mut session = Session::new(config.limits);
    session
        .load(&loader, &manifest)
        .await
        .context("failed to load partitions")?;
    Ok(session)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match cli.config.as_deref() {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };
    let manifest = manifest_path(cli.manifest)?;
    let mut session = open_session(&manifest, &config).await?;

    match cli.command {
        Commands::Summary {
            filters,
            focus,
            out,
        } => {
            let snapshot = session.apply_filters(filters.to_spec());
            let detail = focus.map(|week| session.week_detail(week));
            let report =
                report::build_report(&session.load_diagnostics(), &snapshot, detail.as_ref());

            match out {
                Some(path) => {
                    std::fs::write(&path, report)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{report}"),
            }
        }
        Commands::Drill {
            filters,
            drill_cell,
            component,
        } => {
            session.apply_filters(filters.to_spec());
            let selection = match (drill_cell, component) {
                (Some(cell), _) => Selection::Cell(cell),
                (None, Some(component)) => Selection::Component(component),
                (None, None) => anyhow::bail!("pass --drill-cell or --component"),
            };

            let view = session.select(selection);

            if view.count == 0 {
                println!("No alarms for this selection.");
                return Ok(());
            }

            println!("{} alarms in scope. Top alarm types:", view.count);
            for row in view.alarm_types.iter() {
                println!("- {}: {}", row.key, row.count);
            }
            println!("Components:");
            for row in view.components.iter() {
                println!(
                    "- {}: {} ({:.1}% cumulative)",
                    row.key, row.count, row.cumulative_pct
                );
            }
        }
        Commands::Weeks { filters, focus } => {
            let snapshot = session.apply_filters(filters.to_spec());
            if snapshot.weeks.is_empty() {
                println!("No alarms match these filters.");
                return Ok(());
            }

            for week in snapshot.weeks.iter() {
                println!(
                    "{}  {:>7}  {:<7}  {}",
                    weeks::week_label(week.week),
                    week.count,
                    week.dominant.map(|t| t.as_str()).unwrap_or("-"),
                    week.delta
                        .map(|d| format!("{d:+}"))
                        .unwrap_or_else(|| "n/a".to_string())
                );
            }

            if let Some(week) = focus {
                let mut output = String::new();
                report::write_week_detail(&mut output, &session.week_detail(week));
                print!("\n{output}");
            }
        }
        Commands::Export { filters, out } => {
            session.apply_filters(filters.to_spec());
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let mut sink = CsvExport::new(std::io::BufWriter::new(file));
            let written = session.export_to(&mut sink)?;
            sink.into_inner()?;
            println!("Exported {written} alarms to {}.", out.display());
        }
        Commands::Diagnostics { filters } => {
            session.apply_filters(filters.to_spec());
            let snapshot = DiagnosticsSnapshot {
                load: session.load_diagnostics(),
                filter: session.last_filter_diagnostics().cloned(),
            };
            println!("{}", snapshot.to_json()?);
        }
    }

    Ok(())
}
