use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::PrefixTable;
use crate::config::{FiscalCalendar, LoaderConfig};
use crate::error::LoadError;
use crate::models::{ClassifiedIncident, Incident, TypeBreakdown};
use crate::weeks::parse_week;

/// Shared by every loader, so a load started later always carries a higher
/// generation than any earlier one, whichever loader ran it.
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub partitions: Vec<PartitionRef>,
    pub expected_total: u64,
    #[serde(default)]
    pub generated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartitionRef {
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub rows: Option<u64>,
}

impl Manifest {
    /// Reads a manifest and resolves partition paths against its directory.
    pub async fn from_path(path: &Path) -> Result<Self, LoadError> {
        let raw = tokio::fs::read(path).await.map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest: Manifest =
            serde_json::from_slice(&raw).map_err(|source| LoadError::Manifest {
                path: path.to_path_buf(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for partition in manifest.partitions.iter_mut() {
            if partition.path.is_relative() {
                partition.path = base.join(&partition.path);
            }
        }

        Ok(manifest)
    }
}

/// Where partition bytes come from. The refresh job owns the files; the
/// loader only reads them.
#[async_trait]
pub trait PartitionSource: Send + Sync {
    async fn fetch(&self, partition: &PartitionRef) -> Result<Vec<u8>, LoadError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsPartitionSource;

#[async_trait]
impl PartitionSource for FsPartitionSource {
    async fn fetch(&self, partition: &PartitionRef) -> Result<Vec<u8>, LoadError> {
        tokio::fs::read(&partition.path)
            .await
            .map_err(|source| LoadError::Io {
                path: partition.path.clone(),
                source,
            })
    }
}

/// Reconciliation counters for one completed load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub generation: u64,
    pub manifest_generated_at: Option<String>,
    pub partitions: usize,
    pub loaded: usize,
    pub skipped: usize,
    pub expected_total: u64,
    pub missing_partitions: Vec<String>,
    /// Partitions that decoded fewer rows than the manifest announced.
    pub short_partitions: Vec<String>,
    pub degraded: bool,
    pub shortfall: u64,
    pub by_type: TypeBreakdown,
}

/// The immutable record collection produced by one load.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Arc<[ClassifiedIncident]>,
    pub report: LoadReport,
}

impl Dataset {
    pub fn empty() -> Self {
        Self {
            records: Arc::from(Vec::new()),
            report: LoadReport::default(),
        }
    }

    /// Wraps records that were classified elsewhere.
    pub fn from_records(records: Vec<ClassifiedIncident>) -> Self {
        let mut by_type = TypeBreakdown::default();
        for record in records.iter() {
            by_type.record(record.equipment);
        }
        let report = LoadReport {
            loaded: records.len(),
            expected_total: records.len() as u64,
            by_type,
            ..LoadReport::default()
        };
        Self {
            records: Arc::from(records),
            report,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "ID", default)]
    id: Option<String>,
    #[serde(rename = "SITE", default)]
    site: Option<String>,
    #[serde(rename = "DC", default)]
    dc: Option<String>,
    #[serde(rename = "CELLNAME", default)]
    cell: Option<String>,
    #[serde(rename = "COMPONENT", default)]
    component: Option<String>,
    #[serde(rename = "ALARMTEXT", default)]
    alarm_text: Option<String>,
    #[serde(rename = "ALARM_START", default)]
    alarm_start: Option<String>,
    #[serde(rename = "ALARM_DURATION_SECONDS", default)]
    duration_secs: Option<String>,
    #[serde(rename = "ALARM_DURATION_MINUTES", default)]
    duration_mins: Option<String>,
    #[serde(rename = "BLOCKING", default)]
    blocking: Option<String>,
    #[serde(rename = "STARVING", default)]
    starving: Option<String>,
    #[serde(rename = "WM_WEEK", default)]
    wm_week: Option<String>,
}

struct DecodedPartition {
    records: Vec<ClassifiedIncident>,
    skipped: usize,
}

pub struct ChunkLoader<S> {
    source: S,
    config: LoaderConfig,
    calendar: FiscalCalendar,
    prefixes: PrefixTable,
    latest: AtomicU64,
}

impl<S: PartitionSource> ChunkLoader<S> {
    pub fn new(
        source: S,
        config: LoaderConfig,
        calendar: FiscalCalendar,
        prefixes: PrefixTable,
    ) -> Self {
        Self {
            source,
            config,
            calendar,
            prefixes,
            latest: AtomicU64::new(0),
        }
    }

    /// Generation of the most recently started load.
    pub fn current_generation(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Loads every partition in manifest order. Starting a load invalidates
    /// any load still in flight on this loader.
    pub async fn load(&self, manifest: &Manifest) -> Result<Dataset, LoadError> {
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest.fetch_max(generation, Ordering::SeqCst);
        info!(
            generation,
            partitions = manifest.partitions.len(),
            expected_total = manifest.expected_total,
            "starting load"
        );

        let capacity = usize::try_from(manifest.expected_total).unwrap_or(0);
        let mut records = Vec::with_capacity(capacity);
        let mut skipped = 0usize;
        let mut missing_partitions = Vec::new();
        let mut short_partitions = Vec::new();

        for partition in manifest.partitions.iter() {
            self.ensure_current(generation)?;
            match self.load_partition(partition, generation).await? {
                Some(decoded) => {
                    debug!(
                        partition = %partition.id,
                        rows = decoded.records.len(),
                        skipped = decoded.skipped,
                        "partition loaded"
                    );
                    let seen = (decoded.records.len() + decoded.skipped) as u64;
                    if partition.rows.is_some_and(|rows| seen < rows) {
                        warn!(
                            partition = %partition.id,
                            seen,
                            announced = ?partition.rows,
                            "partition shorter than manifest"
                        );
                        short_partitions.push(partition.id.clone());
                    }
                    records.extend(decoded.records);
                    skipped += decoded.skipped;
                }
                None => missing_partitions.push(partition.id.clone()),
            }
        }
        self.ensure_current(generation)?;

        let seen = (records.len() + skipped) as u64;
        let mut dataset = Dataset::from_records(records);
        let report = &mut dataset.report;
        report.generation = generation;
        report.manifest_generated_at = manifest.generated_at.clone();
        report.partitions = manifest.partitions.len();
        report.skipped = skipped;
        report.expected_total = manifest.expected_total;
        report.degraded = !missing_partitions.is_empty();
        report.missing_partitions = missing_partitions;
        report.short_partitions = short_partitions;
        report.shortfall = manifest.expected_total.saturating_sub(seen);

        if report.degraded {
            warn!(
                generation,
                missing = ?report.missing_partitions,
                "load completed with missing partitions"
            );
        }
        info!(
            generation,
            loaded = report.loaded,
            skipped = report.skipped,
            shortfall = report.shortfall,
            "load complete"
        );

        Ok(dataset)
    }

    fn ensure_current(&self, generation: u64) -> Result<(), LoadError> {
        if self.current_generation() == generation {
            Ok(())
        } else {
            info!(generation, "load superseded");
            Err(LoadError::Superseded { generation })
        }
    }

    /// One initial attempt plus `max_retries` retries. `None` marks the
    /// partition missing.
    async fn load_partition(
        &self,
        partition: &PartitionRef,
        generation: u64,
    ) -> Result<Option<DecodedPartition>, LoadError> {
        let attempts = self.config.max_retries + 1;

        for attempt in 1..=attempts {
            let outcome = match self.source.fetch(partition).await {
                Ok(bytes) => self.decode(partition, &bytes),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(decoded) => return Ok(Some(decoded)),
                Err(err) if err.is_superseded() => return Err(err),
                Err(err) => {
                    warn!(
                        partition = %partition.id,
                        attempt,
                        attempts,
                        error = %err,
                        "partition load failed"
                    );
                }
            }

            if attempt < attempts {
                self.ensure_current(generation)?;
                let delay = self.config.retry_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        warn!(partition = %partition.id, "dropping partition after retries");
        Ok(None)
    }

    fn decode(&self, partition: &PartitionRef, bytes: &[u8]) -> Result<DecodedPartition, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(bytes);
        reader.headers().map_err(|source| LoadError::Decode {
            partition: partition.id.clone(),
            source,
        })?;

        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = match result {
                Ok(row) => row,
                Err(err) => {
                    debug!(partition = %partition.id, line, error = %err, "malformed row");
                    skipped += 1;
                    continue;
                }
            };

            match self.build_incident(row) {
                Some(incident) => {
                    let equipment = self.prefixes.classify(&incident.cell);
                    records.push(ClassifiedIncident {
                        incident,
                        equipment,
                    });
                }
                None => skipped += 1,
            }
        }

        Ok(DecodedPartition { records, skipped })
    }

    fn build_incident(&self, row: CsvRow) -> Option<Incident> {
        let started_at = non_empty(row.alarm_start).and_then(|raw| parse_timestamp(&raw))?;
        let site = non_empty(row.site).or_else(|| non_empty(row.dc))?;
        let cell = non_empty(row.cell)?;
        let component = non_empty(row.component)?;
        let alarm_text = non_empty(row.alarm_text)?;

        let cell = match self.config.numeric_cell_prefix.as_deref() {
            Some(prefix) if cell.chars().all(|c| c.is_ascii_digit()) => format!("{prefix}{cell}"),
            _ => cell,
        };

        let duration_mins = match non_empty(row.duration_mins) {
            Some(minutes) => parse_duration(&minutes),
            None => non_empty(row.duration_secs)
                .map(|seconds| parse_duration(&seconds) / 60.0)
                .unwrap_or(0.0),
        };

        let week = non_empty(row.wm_week)
            .and_then(|raw| parse_week(&raw))
            .unwrap_or_else(|| self.calendar.week_of(started_at.date()));

        let id = non_empty(row.id).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Some(Incident {
            id,
            started_at,
            site,
            cell,
            component,
            alarm_type: alarm_text
                .chars()
                .take(self.config.alarm_text_max_len)
                .collect(),
            duration_mins,
            week,
            blocking: row.blocking.as_deref().map(parse_flag).unwrap_or(false),
            starving: row.starving.as_deref().map(parse_flag).unwrap_or(false),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }

    let raw = raw.strip_suffix(" UTC").unwrap_or(raw);
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

fn parse_duration(raw: &str) -> f64 {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => value.max(0.0),
        _ => 0.0,
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "t" | "1" | "yes" | "y"
    )
}
