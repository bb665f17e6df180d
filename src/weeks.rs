//! Weekly trend view over a filtered record set.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::rank_counts;
use crate::config::FiscalCalendar;
use crate::models::{ClassifiedIncident, EquipmentType, RankedCount, TypeBreakdown, WeekSummary};

pub const WEEKS_PER_YEAR: i64 = 52;

impl FiscalCalendar {
    /// Fiscal week (1..=52) containing `date`. Weeks past 52 fold back to 1,
    /// and dates before `year_start` count back from W52, so the day before
    /// the fiscal year starts is in W52.
    pub fn week_of(&self, date: NaiveDate) -> u8 {
        let days = (date - self.year_start).num_days();
        let week = days.div_euclid(7);
        (week.rem_euclid(WEEKS_PER_YEAR) + 1) as u8
    }
}

/// W01 is preceded by W52.
pub fn previous_week(week: u8) -> u8 {
    if week <= 1 {
        WEEKS_PER_YEAR as u8
    } else {
        week - 1
    }
}

pub fn week_label(week: u8) -> String {
    format!("W{week:02}")
}

/// Accepts `W07`, `w7` or `7`.
pub fn parse_week(raw: &str) -> Option<u8> {
    let digits = raw.trim().trim_start_matches(['W', 'w']);
    match digits.parse::<u8>() {
        Ok(week) if (1..=WEEKS_PER_YEAR as u8).contains(&week) => Some(week),
        _ => None,
    }
}

/// Per-week counts in ascending week order. Weeks without records are
/// absent, not zero.
pub fn week_insights(records: &[&ClassifiedIncident]) -> Vec<WeekSummary> {
    let mut weeks: BTreeMap<u8, TypeBreakdown> = BTreeMap::new();
    for record in records {
        weeks
            .entry(record.incident.week)
            .or_default()
            .record(record.equipment);
    }

    let counts: BTreeMap<u8, usize> = weeks
        .iter()
        .map(|(week, breakdown)| (*week, breakdown.total()))
        .collect();

    weeks
        .iter()
        .map(|(week, breakdown)| {
            let count = breakdown.total();
            let delta = counts
                .get(&previous_week(*week))
                .map(|previous| count as i64 - *previous as i64);
            WeekSummary {
                week: *week,
                count,
                dominant: dominant_type(breakdown),
                delta,
            }
        })
        .collect()
}

/// Highest-count known type; ties go to the earlier tag. UNKNOWN never
/// dominates.
fn dominant_type(breakdown: &TypeBreakdown) -> Option<EquipmentType> {
    let mut best: Option<(EquipmentType, usize)> = None;
    for (equipment, count) in breakdown.known() {
        if count == 0 {
            continue;
        }
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((equipment, count)),
        }
    }
    best.map(|(equipment, _)| equipment)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossAlarm {
    pub alarm_type: String,
    pub downtime_mins: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactedCell {
    pub cell: String,
    pub downtime_mins: f64,
    pub count: usize,
    pub top_alarms: Vec<RankedCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    FixAlarm { alarm_type: String, downtime_mins: f64 },
    FocusCell { cell: String, count: usize },
    Blocking { count: usize },
    Starving { count: usize },
}

impl Recommendation {
    pub fn is_high_priority(&self) -> bool {
        matches!(
            self,
            Recommendation::FixAlarm { .. } | Recommendation::FocusCell { .. }
        )
    }
}

/// Drill-in for one selected week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekDetail {
    pub week: u8,
    pub count: usize,
    pub top_loss: Vec<LossAlarm>,
    pub top_blocking: Vec<RankedCount>,
    pub top_starving: Vec<RankedCount>,
    pub most_impacted: Option<ImpactedCell>,
    pub recommendations: Vec<Recommendation>,
}

pub fn week_detail(records: &[&ClassifiedIncident], week: u8, top: usize) -> WeekDetail {
    let in_week: Vec<&ClassifiedIncident> = records
        .iter()
        .copied()
        .filter(|record| record.incident.week == week)
        .collect();

    let mut by_alarm: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    let mut by_cell: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for record in in_week.iter() {
        let alarm = by_alarm.entry(&record.incident.alarm_type).or_insert((0.0, 0));
        alarm.0 += record.incident.duration_mins;
        alarm.1 += 1;
        let cell = by_cell.entry(&record.incident.cell).or_insert((0.0, 0));
        cell.0 += record.incident.duration_mins;
        cell.1 += 1;
    }

    let mut top_loss: Vec<LossAlarm> = by_alarm
        .into_iter()
        .map(|(alarm_type, (downtime_mins, count))| LossAlarm {
            alarm_type: alarm_type.to_string(),
            downtime_mins,
            count,
        })
        .collect();
    top_loss.sort_by(|a, b| b.downtime_mins.total_cmp(&a.downtime_mins));
    top_loss.truncate(top);

    let blocking: Vec<&ClassifiedIncident> =
        in_week.iter().copied().filter(|r| r.incident.blocking).collect();
    let starving: Vec<&ClassifiedIncident> =
        in_week.iter().copied().filter(|r| r.incident.starving).collect();
    let top_blocking = rank_counts(blocking.iter().map(|r| r.incident.alarm_type.as_str()), top);
    let top_starving = rank_counts(starving.iter().map(|r| r.incident.alarm_type.as_str()), top);

    let mut cells: Vec<(&str, (f64, usize))> = by_cell.into_iter().collect();
    cells.sort_by(|a, b| b.1 .0.total_cmp(&a.1 .0));
    let most_impacted = cells.first().map(|(cell, (downtime_mins, count))| ImpactedCell {
        cell: cell.to_string(),
        downtime_mins: *downtime_mins,
        count: *count,
        top_alarms: rank_counts(
            in_week
                .iter()
                .filter(|r| r.incident.cell == *cell)
                .map(|r| r.incident.alarm_type.as_str()),
            top,
        ),
    });

    let mut recommendations = Vec::new();
    if let Some(loss) = top_loss.first() {
        recommendations.push(Recommendation::FixAlarm {
            alarm_type: loss.alarm_type.clone(),
            downtime_mins: loss.downtime_mins,
        });
    }
    if let Some(cell) = most_impacted.as_ref() {
        recommendations.push(Recommendation::FocusCell {
            cell: cell.cell.clone(),
            count: cell.count,
        });
    }
    if !blocking.is_empty() {
        recommendations.push(Recommendation::Blocking {
            count: blocking.len(),
        });
    }
    if !starving.is_empty() {
        recommendations.push(Recommendation::Starving {
            count: starving.len(),
        });
    }

    WeekDetail {
        week,
        count: in_week.len(),
        top_loss,
        top_blocking,
        top_starving,
        most_impacted,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::incident;

    #[test]
    fn week_numbers_follow_fiscal_calendar() {
        let calendar = FiscalCalendar::default();
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(calendar.week_of(day(2025, 2, 1)), 1);
        assert_eq!(calendar.week_of(day(2025, 2, 7)), 1);
        assert_eq!(calendar.week_of(day(2025, 2, 8)), 2);
        assert_eq!(calendar.week_of(day(2026, 1, 30)), 52);
        assert_eq!(calendar.week_of(day(2026, 1, 31)), 1);
        assert_eq!(calendar.week_of(day(2025, 1, 31)), 52);
        assert_eq!(week_label(7), "W07");
        assert_eq!(parse_week("W07"), Some(7));
        assert_eq!(parse_week("52"), Some(52));
        assert_eq!(parse_week("W53"), None);
        assert_eq!(parse_week("W00"), None);
    }

    #[test]
    fn groups_by_week_and_omits_empty_weeks() {
        let records = vec![
            incident("AIB1", "DC1", "LIFT", "Jam", 3),
            incident("AIB2", "DC1", "LIFT", "Jam", 3),
            incident("AOB1", "DC1", "BELT", "Stall", 3),
            incident("AOB1", "DC1", "BELT", "Stall", 4),
            incident("AOB2", "DC1", "BELT", "Stall", 4),
            incident("AOB3", "DC1", "BELT", "Stall", 4),
            incident("FLIB1", "DC1", "FORK", "Low", 6),
        ];
        let refs: Vec<&ClassifiedIncident> = records.iter().collect();
        let weeks = week_insights(&refs);

        assert_eq!(
            weeks,
            vec![
                WeekSummary { week: 3, count: 3, dominant: Some(EquipmentType::Aib), delta: None },
                WeekSummary { week: 4, count: 3, dominant: Some(EquipmentType::Aob), delta: Some(0) },
                WeekSummary { week: 6, count: 1, dominant: Some(EquipmentType::Flib), delta: None },
            ]
        );
    }

    #[test]
    fn first_week_compares_against_week_52() {
        let records = vec![
            incident("AIB1", "DC1", "LIFT", "Jam", 52),
            incident("AIB1", "DC1", "LIFT", "Jam", 52),
            incident("AIB1", "DC1", "LIFT", "Jam", 1),
        ];
        let refs: Vec<&ClassifiedIncident> = records.iter().collect();
        let weeks = week_insights(&refs);
        assert_eq!(weeks[0].week, 1);
        assert_eq!(weeks[0].delta, Some(-1));
        assert_eq!(weeks[1].delta, None);
    }

    #[test]
    fn unknown_only_week_has_no_dominant_type() {
        let records = vec![incident("ZZ9", "DC1", "LIFT", "Jam", 5)];
        let refs: Vec<&ClassifiedIncident> = records.iter().collect();
        assert_eq!(week_insights(&refs)[0].dominant, None);
    }

    #[test]
    fn week_detail_ranks_loss_and_recommends() {
        let mut records = vec![
            incident("AIB1", "DC1", "LIFT", "Jam", 9),
            incident("AIB1", "DC1", "LIFT", "Jam", 9),
            incident("AIB2", "DC1", "BELT", "Stall", 9),
            incident("AIB2", "DC1", "BELT", "Other week", 10),
        ];
        records[0].incident.duration_mins = 5.0;
        records[1].incident.duration_mins = 5.0;
        records[1].incident.blocking = true;
        records[2].incident.duration_mins = 30.0;
        let refs: Vec<&ClassifiedIncident> = records.iter().collect();

        let detail = week_detail(&refs, 9, 3);
        assert_eq!(detail.count, 3);
        assert_eq!(detail.top_loss[0].alarm_type, "Stall");
        assert_eq!(detail.top_loss[1].count, 2);
        assert_eq!(detail.top_blocking, vec![RankedCount { key: "Jam".into(), count: 1 }]);
        assert!(detail.top_starving.is_empty());
        let impacted = detail.most_impacted.as_ref().unwrap();
        assert_eq!(impacted.cell, "AIB2");
        assert_eq!(impacted.top_alarms.len(), 1);
        assert_eq!(detail.recommendations.len(), 3);
        assert!(detail.recommendations[0].is_high_priority());
        assert_eq!(detail.recommendations[2], Recommendation::Blocking { count: 1 });
    }
}
