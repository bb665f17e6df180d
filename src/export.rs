use std::io::Write;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::ClassifiedIncident;
use crate::weeks::week_label;

/// Fixed export column set, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "Site")]
    pub site: String,
    #[serde(rename = "Cell")]
    pub cell: String,
    #[serde(rename = "Component")]
    pub component: String,
    #[serde(rename = "Alarm Type")]
    pub alarm_type: String,
    #[serde(rename = "Duration (mins)")]
    pub duration_mins: f64,
    #[serde(rename = "Week")]
    pub week: String,
}

impl From<&ClassifiedIncident> for ExportRow {
    fn from(record: &ClassifiedIncident) -> Self {
        let incident = &record.incident;
        Self {
            timestamp: incident.started_at,
            site: incident.site.clone(),
            cell: incident.cell.clone(),
            component: incident.component.clone(),
            alarm_type: incident.alarm_type.clone(),
            duration_mins: incident.duration_mins,
            week: week_label(incident.week),
        }
    }
}

pub fn export_rows(filtered: &[&ClassifiedIncident]) -> Vec<ExportRow> {
    filtered.iter().map(|record| ExportRow::from(*record)).collect()
}

/// The spreadsheet collaborator. The engine only hands it rows.
pub trait ExportSink {
    fn write_rows(&mut self, rows: &[ExportRow]) -> anyhow::Result<usize>;
}

pub struct CsvExport<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvExport<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
        }
    }

    pub fn into_inner(self) -> anyhow::Result<W> {
        self.writer
            .into_inner()
            .map_err(|err| anyhow::anyhow!("failed to flush export: {}", err.error()))
    }
}

impl<W: Write> ExportSink for CsvExport<W> {
    fn write_rows(&mut self, rows: &[ExportRow]) -> anyhow::Result<usize> {
        for row in rows {
            self.writer.serialize(row)?;
        }
        self.writer.flush()?;
        Ok(rows.len())
    }
}
