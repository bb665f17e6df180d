use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Equipment family derived from a cell code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EquipmentType {
    Aib,
    Aob,
    Flib,
    Unknown,
}

impl EquipmentType {
    pub const ALL: [EquipmentType; 4] = [
        EquipmentType::Aib,
        EquipmentType::Aob,
        EquipmentType::Flib,
        EquipmentType::Unknown,
    ];

    pub const KNOWN: [EquipmentType; 3] =
        [EquipmentType::Aib, EquipmentType::Aob, EquipmentType::Flib];

    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentType::Aib => "AIB",
            EquipmentType::Aob => "AOB",
            EquipmentType::Flib => "FLIB",
            EquipmentType::Unknown => "UNKNOWN",
        }
    }

    pub fn parse(value: &str) -> Option<EquipmentType> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AIB" => Some(EquipmentType::Aib),
            "AOB" => Some(EquipmentType::Aob),
            "FLIB" => Some(EquipmentType::Flib),
            "UNKNOWN" => Some(EquipmentType::Unknown),
            _ => None,
        }
    }

    fn index(&self) -> usize {
        match self {
            EquipmentType::Aib => 0,
            EquipmentType::Aob => 1,
            EquipmentType::Flib => 2,
            EquipmentType::Unknown => 3,
        }
    }
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alarm occurrence as exported upstream. Never mutated after load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    pub id: String,
    pub started_at: NaiveDateTime,
    pub site: String,
    pub cell: String,
    pub component: String,
    pub alarm_type: String,
    pub duration_mins: f64,
    pub week: u8,
    pub blocking: bool,
    pub starving: bool,
}

impl Incident {
    pub fn date(&self) -> NaiveDate {
        self.started_at.date()
    }
}

/// An incident with its equipment type resolved once at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedIncident {
    pub incident: Incident,
    pub equipment: EquipmentType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCount {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParetoRow {
    pub key: String,
    pub count: usize,
    pub cumulative_pct: f64,
}

/// Counts per equipment tag. The four slots partition the counted set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeBreakdown {
    counts: [usize; 4],
}

impl TypeBreakdown {
    pub fn record(&mut self, equipment: EquipmentType) {
        self.counts[equipment.index()] += 1;
    }

    pub fn count(&self, equipment: EquipmentType) -> usize {
        self.counts[equipment.index()]
    }

    /// The "All Types" total, UNKNOWN included.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Type-specific rows; UNKNOWN is left out.
    pub fn known(&self) -> Vec<(EquipmentType, usize)> {
        EquipmentType::KNOWN
            .iter()
            .map(|equipment| (*equipment, self.count(*equipment)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeadlineMetrics {
    pub total_incidents: usize,
    pub downtime_mins: f64,
    pub blocking: usize,
    pub starving: usize,
    pub avg_duration_mins: f64,
}

impl HeadlineMetrics {
    pub fn downtime_hours(&self) -> f64 {
        self.downtime_mins / 60.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellStats {
    pub cell: String,
    pub incidents: usize,
    pub downtime_mins: f64,
    pub blocking: usize,
    pub starving: usize,
    pub avg_duration_mins: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Populated,
    NoMatches,
}

/// Every chart's data for one FilterSpec.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardViews {
    pub status: ViewStatus,
    pub metrics: HeadlineMetrics,
    pub by_type: TypeBreakdown,
    pub top_cells: Vec<RankedCount>,
    pub top_components: Vec<ParetoRow>,
    pub top_alarm_types: Vec<RankedCount>,
    pub cell_table: Vec<CellStats>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekSummary {
    pub week: u8,
    pub count: usize,
    pub dominant: Option<EquipmentType>,
    pub delta: Option<i64>,
}
