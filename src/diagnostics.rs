use serde::Serialize;
use tracing::info;

use crate::filter::FilterSpec;
use crate::loader::LoadReport;
use crate::models::{EquipmentType, TypeBreakdown, ViewStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub aib: usize,
    pub aob: usize,
    pub flib: usize,
    pub unknown: usize,
}

impl From<&TypeBreakdown> for TypeCounts {
    fn from(breakdown: &TypeBreakdown) -> Self {
        Self {
            aib: breakdown.count(EquipmentType::Aib),
            aob: breakdown.count(EquipmentType::Aob),
            flib: breakdown.count(EquipmentType::Flib),
            unknown: breakdown.count(EquipmentType::Unknown),
        }
    }
}

/// Counters for a load action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadDiagnostics {
    pub generation: u64,
    pub manifest_generated_at: Option<String>,
    pub partitions: usize,
    pub total_loaded: usize,
    pub total_skipped: usize,
    pub expected_total: u64,
    pub shortfall: u64,
    pub degraded: bool,
    pub missing_partitions: Vec<String>,
    pub short_partitions: Vec<String>,
    pub by_type: TypeCounts,
}

impl From<&LoadReport> for LoadDiagnostics {
    fn from(report: &LoadReport) -> Self {
        Self {
            generation: report.generation,
            manifest_generated_at: report.manifest_generated_at.clone(),
            partitions: report.partitions,
            total_loaded: report.loaded,
            total_skipped: report.skipped,
            expected_total: report.expected_total,
            shortfall: report.shortfall,
            degraded: report.degraded,
            missing_partitions: report.missing_partitions.clone(),
            short_partitions: report.short_partitions.clone(),
            by_type: TypeCounts::from(&report.by_type),
        }
    }
}

impl LoadDiagnostics {
    pub fn emit(&self) {
        info!(
            target: "diagnostics",
            generation = self.generation,
            partitions = self.partitions,
            total_loaded = self.total_loaded,
            total_skipped = self.total_skipped,
            shortfall = self.shortfall,
            degraded = self.degraded,
            aib = self.by_type.aib,
            aob = self.by_type.aob,
            flib = self.by_type.flib,
            unknown = self.by_type.unknown,
            "load"
        );
    }
}

/// Counters for an apply-filters action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterDiagnostics {
    pub filter: FilterSpec,
    pub total_loaded: usize,
    pub matched: usize,
    pub status: ViewStatus,
    pub degraded: bool,
    pub by_type: TypeCounts,
}

impl FilterDiagnostics {
    pub fn emit(&self) {
        info!(
            target: "diagnostics",
            total_loaded = self.total_loaded,
            matched = self.matched,
            status = ?self.status,
            degraded = self.degraded,
            aib = self.by_type.aib,
            aob = self.by_type.aob,
            flib = self.by_type.flib,
            unknown = self.by_type.unknown,
            "apply_filters"
        );
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsSnapshot {
    pub load: LoadDiagnostics,
    pub filter: Option<FilterDiagnostics>,
}

impl DiagnosticsSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_counters_serialize_with_stable_names() {
        let mut by_type = TypeBreakdown::default();
        by_type.record(EquipmentType::Aib);
        by_type.record(EquipmentType::Unknown);
        let report = LoadReport {
            generation: 3,
            manifest_generated_at: None,
            partitions: 2,
            loaded: 2,
            skipped: 1,
            expected_total: 4,
            missing_partitions: vec!["part-001".to_string()],
            short_partitions: Vec::new(),
            degraded: true,
            shortfall: 1,
            by_type,
        };

        let snapshot = DiagnosticsSnapshot {
            load: LoadDiagnostics::from(&report),
            filter: None,
        };
        let value: serde_json::Value =
            serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();

        assert_eq!(value["load"]["partitions"], 2);
        assert_eq!(value["load"]["total_loaded"], 2);
        assert_eq!(value["load"]["total_skipped"], 1);
        assert_eq!(value["load"]["degraded"], true);
        assert_eq!(value["load"]["by_type"]["unknown"], 1);
        assert!(value["filter"].is_null());
    }
}
