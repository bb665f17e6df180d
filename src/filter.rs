use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{ClassifiedIncident, EquipmentType};

/// Five independent filter dimensions. An empty set is a wildcard; values
/// within a set are OR-ed and dimensions are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FilterSpec {
    pub types: BTreeSet<EquipmentType>,
    pub sites: BTreeSet<String>,
    pub cells: BTreeSet<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub weeks: BTreeSet<u8>,
}

impl FilterSpec {
    pub fn with_types<I: IntoIterator<Item = EquipmentType>>(mut self, types: I) -> Self {
        self.types.extend(types);
        self
    }

    pub fn with_sites<I, S>(mut self, sites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sites.extend(sites.into_iter().map(Into::into));
        self
    }

    pub fn with_cells<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cells.extend(cells.into_iter().map(Into::into));
        self
    }

    pub fn with_weeks<I: IntoIterator<Item = u8>>(mut self, weeks: I) -> Self {
        self.weeks.extend(weeks);
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        *self == FilterSpec::default()
    }

    pub fn matches(&self, record: &ClassifiedIncident) -> bool {
        let incident = &record.incident;
        let date = incident.date();

        allows(&self.types, &record.equipment)
            && allows(&self.sites, &incident.site)
            && allows(&self.cells, &incident.cell)
            && allows(&self.weeks, &incident.week)
            && self.date_from.map_or(true, |from| date >= from)
            && self.date_to.map_or(true, |to| date <= to)
    }
}

fn allows<T: Ord>(set: &BTreeSet<T>, value: &T) -> bool {
    set.is_empty() || set.contains(value)
}

/// Holds the active FilterSpec between explicit apply actions.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    spec: FilterSpec,
}

impl FilterState {
    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    pub fn set(&mut self, spec: FilterSpec) {
        self.spec = spec;
    }

    pub fn reset(&mut self) {
        self.spec = FilterSpec::default();
    }

    pub fn apply_filters<'a>(&self, records: &'a [ClassifiedIncident]) -> Vec<&'a ClassifiedIncident> {
        apply_filters(&self.spec, records)
    }
}

/// Single linear pass; input order is preserved.
pub fn apply_filters<'a>(
    spec: &FilterSpec,
    records: &'a [ClassifiedIncident],
) -> Vec<&'a ClassifiedIncident> {
    records.iter().filter(|record| spec.matches(record)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::incident;
    use crate::aggregate::type_breakdown;

    fn base() -> Vec<ClassifiedIncident> {
        vec![
            incident("AIB1", "DC1", "LIFT", "Jam", 1),
            incident("AIB2", "DC2", "LIFT", "Jam", 2),
            incident("AOB1", "DC1", "BELT", "Stall", 2),
            incident("AOB2", "DC3", "BELT", "Stall", 3),
            incident("FLIB1", "DC2", "FORK", "Low", 3),
            incident("QQ1", "DC1", "FORK", "Low", 4),
        ]
    }

    fn aob_only() -> Vec<ClassifiedIncident> {
        vec![
            incident("AOB1", "DC1", "BELT", "Stall", 1),
            incident("AOB2", "DC2", "BELT", "Stall", 2),
            incident("AOB3", "DC2", "LIFT", "Jam", 2),
        ]
    }

    #[test]
    fn empty_dimensions_are_wildcards() {
        let records = base();
        let spec = FilterSpec::default();
        assert!(spec.is_unrestricted());
        assert_eq!(apply_filters(&spec, &records).len(), records.len());
    }

    #[test]
    fn values_or_within_dimension_and_across() {
        let records = base();
        let spec = FilterSpec::default()
            .with_sites(["DC1", "DC2"])
            .with_types([EquipmentType::Aib, EquipmentType::Aob]);
        let cells: Vec<&str> = apply_filters(&spec, &records)
            .iter()
            .map(|r| r.incident.cell.as_str())
            .collect();
        assert_eq!(cells, vec!["AIB1", "AIB2", "AOB1"]);
    }

    #[test]
    fn composition_is_consistent_on_single_type_base() {
        let records = aob_only();
        let mut state = FilterState::default();

        state.set(FilterSpec::default().with_types([EquipmentType::Aob]));
        assert_eq!(state.apply_filters(&records).len(), records.len());

        state.set(FilterSpec::default().with_types([EquipmentType::Aib]));
        let after_switch = state.apply_filters(&records).len();
        let direct = apply_filters(
            &FilterSpec::default().with_types([EquipmentType::Aib]),
            &records,
        )
        .len();
        assert_eq!(after_switch, 0);
        assert_eq!(after_switch, direct);
    }

    #[test]
    fn narrowing_never_increases_count() {
        let records = base();
        let unrestricted = apply_filters(&FilterSpec::default(), &records).len();
        let day = |d| NaiveDate::from_ymd_opt(2025, 2, d);

        let narrowed = [
            FilterSpec::default().with_sites(["DC1"]),
            FilterSpec::default().with_cells(["AOB1", "FLIB1"]),
            FilterSpec::default().with_weeks([2]),
            FilterSpec::default().with_types([EquipmentType::Flib]),
            FilterSpec::default().with_date_range(day(8), None),
            FilterSpec::default().with_date_range(None, day(14)),
        ];
        for spec in narrowed.iter() {
            let count = apply_filters(spec, &records).len();
            assert!(count <= unrestricted, "{spec:?} widened the set");

            let further = spec.clone().with_sites(["DC3"]);
            assert!(apply_filters(&further, &records).len() <= count);
        }
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let records = base();
        let day = |d| NaiveDate::from_ymd_opt(2025, 2, d);
        // week 2 starts on Feb 8
        let spec = FilterSpec::default().with_date_range(day(8), day(8));
        assert_eq!(apply_filters(&spec, &records).len(), 2);
    }

    #[test]
    fn zero_match_filter_is_not_an_error() {
        let records = aob_only();
        let spec = FilterSpec::default().with_types([EquipmentType::Flib]);
        let filtered = apply_filters(&spec, &records);
        assert!(filtered.is_empty());
        assert_eq!(type_breakdown(&filtered).total(), 0);
    }

    #[test]
    fn breakdown_sums_to_filtered_count() {
        let records = base();
        for spec in [
            FilterSpec::default(),
            FilterSpec::default().with_sites(["DC2"]),
            FilterSpec::default().with_weeks([3, 4]),
        ] {
            let filtered = apply_filters(&spec, &records);
            let breakdown = type_breakdown(&filtered);
            let sum: usize = EquipmentType::ALL.iter().map(|t| breakdown.count(*t)).sum();
            assert_eq!(sum, filtered.len());
        }
    }

    #[test]
    fn reset_restores_wildcard() {
        let mut state = FilterState::default();
        state.set(FilterSpec::default().with_weeks([9]));
        state.reset();
        assert!(state.spec().is_unrestricted());
    }
}
