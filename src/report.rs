use std::fmt::Write;

use crate::diagnostics::LoadDiagnostics;
use crate::drilldown::DrillState;
use crate::filter::FilterSpec;
use crate::models::ViewStatus;
use crate::session::Snapshot;
use crate::weeks::{week_label, Recommendation, WeekDetail};

fn describe_filter(spec: &FilterSpec) -> String {
    if spec.is_unrestricted() {
        return "no filters".to_string();
    }

    let mut parts = Vec::new();
    if !spec.types.is_empty() {
        let types: Vec<&str> = spec.types.iter().map(|t| t.as_str()).collect();
        parts.push(format!("types {}", types.join("/")));
    }
    if !spec.sites.is_empty() {
        parts.push(format!("sites {}", join(spec.sites.iter())));
    }
    if !spec.cells.is_empty() {
        parts.push(format!("cells {}", join(spec.cells.iter())));
    }
    if !spec.weeks.is_empty() {
        let weeks: Vec<String> = spec.weeks.iter().map(|w| week_label(*w)).collect();
        parts.push(format!("weeks {}", weeks.join(", ")));
    }
    match (spec.date_from, spec.date_to) {
        (Some(from), Some(to)) => parts.push(format!("{from} to {to}")),
        (Some(from), None) => parts.push(format!("from {from}")),
        (None, Some(to)) => parts.push(format!("until {to}")),
        (None, None) => {}
    }
    parts.join("; ")
}

fn join<'a, I: Iterator<Item = &'a String>>(values: I) -> String {
    values.map(String::as_str).collect::<Vec<_>>().join(", ")
}

pub fn build_report(
    load: &LoadDiagnostics,
    snapshot: &Snapshot,
    focus: Option<&WeekDetail>,
) -> String {
    let views = &snapshot.views;
    let mut output = String::new();

    let _ = writeln!(output, "# Equipment Alarm Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} of {} loaded alarms)",
        describe_filter(&snapshot.filter),
        views.metrics.total_incidents,
        load.total_loaded
    );
    if load.degraded {
        let _ = writeln!(
            output,
            "Data is incomplete: missing partitions {}",
            load.missing_partitions.join(", ")
        );
    }
    if !load.short_partitions.is_empty() {
        let _ = writeln!(
            output,
            "Partitions shorter than announced: {}",
            load.short_partitions.join(", ")
        );
    }
    if load.total_skipped > 0 {
        let _ = writeln!(output, "{} malformed rows skipped.", load.total_skipped);
    }
    let _ = writeln!(output);

    if views.status == ViewStatus::NoMatches {
        let _ = writeln!(output, "No alarms match these filters.");
        return output;
    }

    let metrics = &views.metrics;
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Alarms: {}", metrics.total_incidents);
    let _ = writeln!(output, "- Downtime: {:.1} hrs", metrics.downtime_hours());
    let _ = writeln!(output, "- Blocking: {}", metrics.blocking);
    let _ = writeln!(output, "- Starving: {}", metrics.starving);
    let _ = writeln!(output, "- Avg duration: {:.2} mins", metrics.avg_duration_mins);
    let _ = writeln!(output);

    let _ = writeln!(output, "## Equipment Types");
    for (equipment, count) in views.by_type.known() {
        let _ = writeln!(output, "- {}: {}", equipment, count);
    }
    let _ = writeln!(output, "- All types: {}", views.by_type.total());
    let _ = writeln!(output);

    let _ = writeln!(output, "## Top Cells");
    for (rank, row) in views.top_cells.iter().enumerate() {
        let _ = writeln!(output, "{}. {} ({} alarms)", rank + 1, row.key, row.count);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Top Components (Pareto)");
    for row in views.top_components.iter() {
        let _ = writeln!(
            output,
            "- {}: {} alarms, cumulative {:.1}%",
            row.key, row.count, row.cumulative_pct
        );
    }
    let _ = writeln!(output);

    let scope = match &snapshot.drilldown.state {
        DrillState::Overview => String::new(),
        DrillState::CellDrilldown(cell) => format!(" for cell {cell}"),
        DrillState::ComponentDrilldown(component) => format!(" for component {component}"),
    };
    let _ = writeln!(output, "## Top Alarm Types{scope}");
    for row in snapshot.drilldown.alarm_types.iter() {
        let _ = writeln!(output, "- {}: {}", row.key, row.count);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Cell Statistics");
    let _ = writeln!(
        output,
        "| Rank | Cell | Alarms | Downtime (mins) | Blocking | Starving | Avg Duration |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    for (rank, row) in views.cell_table.iter().enumerate() {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {:.1} | {} | {} | {:.2} |",
            rank + 1,
            row.cell,
            row.incidents,
            row.downtime_mins,
            row.blocking,
            row.starving,
            row.avg_duration_mins
        );
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Weekly Trend");
    for week in snapshot.weeks.iter() {
        let dominant = week.dominant.map(|t| t.as_str()).unwrap_or("-");
        let delta = week
            .delta
            .map(|d| format!("{d:+}"))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            output,
            "- {}: {} alarms, mostly {}, change {}",
            week_label(week.week),
            week.count,
            dominant,
            delta
        );
    }

    if let Some(detail) = focus {
        let _ = writeln!(output);
        write_week_detail(&mut output, detail);
    }

    output
}

pub fn write_week_detail(output: &mut String, detail: &WeekDetail) {
    let _ = writeln!(output, "## Insights for {}", week_label(detail.week));
    if detail.count == 0 {
        let _ = writeln!(output, "No alarms recorded for this week.");
        return;
    }

    let _ = writeln!(output, "### Top Loss Alarms");
    for (rank, loss) in detail.top_loss.iter().enumerate() {
        let _ = writeln!(
            output,
            "{}. {} ({:.0} mins, {} occurrences)",
            rank + 1,
            loss.alarm_type,
            loss.downtime_mins,
            loss.count
        );
    }

    let _ = writeln!(output, "### Blocking");
    if detail.top_blocking.is_empty() {
        let _ = writeln!(output, "No blocking alarms.");
    }
    for row in detail.top_blocking.iter() {
        let _ = writeln!(output, "- {}: {}", row.key, row.count);
    }

    let _ = writeln!(output, "### Starving");
    if detail.top_starving.is_empty() {
        let _ = writeln!(output, "No starving alarms.");
    }
    for row in detail.top_starving.iter() {
        let _ = writeln!(output, "- {}: {}", row.key, row.count);
    }

    if let Some(cell) = detail.most_impacted.as_ref() {
        let _ = writeln!(
            output,
            "### Most Impacted Cell: {} ({:.0} mins)",
            cell.cell, cell.downtime_mins
        );
        for row in cell.top_alarms.iter() {
            let _ = writeln!(output, "- {} ({}x)", row.key, row.count);
        }
    }

    let _ = writeln!(output, "### Recommendations");
    for recommendation in detail.recommendations.iter() {
        let line = match recommendation {
            Recommendation::FixAlarm {
                alarm_type,
                downtime_mins,
            } => format!("Fix \"{alarm_type}\": {downtime_mins:.0} mins lost"),
            Recommendation::FocusCell { cell, count } => {
                format!("Focus on {cell}: {count} alarms")
            }
            Recommendation::Blocking { count } => {
                format!("{count} blocking alarms are impacting flow")
            }
            Recommendation::Starving { count } => {
                format!("{count} starving alarms, check upstream")
            }
        };
        let priority = if recommendation.is_high_priority() {
            "high"
        } else {
            "medium"
        };
        let _ = writeln!(output, "- [{priority}] {line}");
    }
}
