use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::classify::PrefixTable;
use crate::models::EquipmentType;

/// Engine tunables. Every field has a default, so an empty JSON object is a
/// valid config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: ViewLimits,
    pub loader: LoaderConfig,
    pub calendar: FiscalCalendar,
    pub extra_prefixes: Vec<PrefixEntry>,
}

impl EngineConfig {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn prefix_table(&self) -> PrefixTable {
        PrefixTable::extended(
            self.extra_prefixes
                .iter()
                .map(|entry| (entry.prefix.clone(), entry.equipment)),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrefixEntry {
    pub prefix: String,
    pub equipment: EquipmentType,
}

/// Row counts per view. The product surface shows 15/15/10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ViewLimits {
    pub cells: usize,
    pub components: usize,
    pub alarm_types: usize,
    /// Characters of alarm text kept in chart labels.
    pub alarm_label_len: usize,
    pub cell_table: usize,
    pub insight_top: usize,
}

impl Default for ViewLimits {
    fn default() -> Self {
        Self {
            cells: 15,
            components: 15,
            alarm_types: 10,
            alarm_label_len: 50,
            cell_table: 20,
            insight_top: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub numeric_cell_prefix: Option<String>,
    pub alarm_text_max_len: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 0,
            numeric_cell_prefix: None,
            alarm_text_max_len: 200,
        }
    }
}

impl LoaderConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Walmart fiscal calendar: week 1 starts on `year_start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FiscalCalendar {
    pub year_start: NaiveDate,
}

impl Default for FiscalCalendar {
    fn default() -> Self {
        Self {
            year_start: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.limits, ViewLimits::default());
        assert_eq!(config.loader.max_retries, 2);
        assert_eq!(
            config.calendar.year_start,
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
        );
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{
                "limits": { "cells": 5 },
                "loader": { "numeric_cell_prefix": "AIB" },
                "extra_prefixes": [ { "prefix": "AOBX", "equipment": "FLIB" } ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.limits.cells, 5);
        assert_eq!(config.limits.components, 15);
        assert_eq!(config.loader.numeric_cell_prefix.as_deref(), Some("AIB"));
        assert_eq!(config.prefix_table().classify("aobx9"), EquipmentType::Flib);
    }

    #[test]
    fn reads_config_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "calendar": { "year_start": "2026-01-31" } }"#).unwrap();
        let config = EngineConfig::from_path(&path).unwrap();
        assert_eq!(
            config.calendar.year_start,
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()
        );
    }
}
