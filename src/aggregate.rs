use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::config::ViewLimits;
use crate::models::{
    CellStats, ClassifiedIncident, DashboardViews, HeadlineMetrics, ParetoRow, RankedCount,
    TypeBreakdown, ViewStatus,
};

/// Counts keys and ranks them by count descending, then key ascending.
pub fn rank_counts<'a, I>(keys: I, limit: usize) -> Vec<RankedCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut map: BTreeMap<&str, usize> = BTreeMap::new();
    for key in keys {
        *map.entry(key).or_insert(0) += 1;
    }

    let mut ranked: Vec<RankedCount> = map
        .into_iter()
        .map(|(key, count)| RankedCount {
            key: key.to_string(),
            count,
        })
        .collect();

    // keys arrive sorted, so a stable sort on count keeps the key tie-break
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

pub fn type_breakdown(records: &[&ClassifiedIncident]) -> TypeBreakdown {
    let mut breakdown = TypeBreakdown::default();
    for record in records {
        breakdown.record(record.equipment);
    }
    breakdown
}

pub fn top_cells(records: &[&ClassifiedIncident], limit: usize) -> Vec<RankedCount> {
    rank_counts(records.iter().map(|r| r.incident.cell.as_str()), limit)
}

/// Chart label for an alarm text: the first `max_len` characters, with a
/// trailing "..." when the text was longer.
pub fn alarm_label(text: &str, max_len: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_len) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}

/// Alarm ranking grouped by label, so texts sharing a long prefix count
/// together.
pub fn top_alarm_types(
    records: &[&ClassifiedIncident],
    limit: usize,
    label_len: usize,
) -> Vec<RankedCount> {
    let labels: Vec<Cow<'_, str>> = records
        .iter()
        .map(|r| alarm_label(&r.incident.alarm_type, label_len))
        .collect();
    rank_counts(labels.iter().map(|label| label.as_ref()), limit)
}

/// Component ranking with the running share of the whole filtered set, so
/// the last row only reaches 100% when the top N cover every record.
pub fn top_components(records: &[&ClassifiedIncident], limit: usize) -> Vec<ParetoRow> {
    let total = records.len();
    let ranked = rank_counts(records.iter().map(|r| r.incident.component.as_str()), limit);

    let mut running = 0usize;
    ranked
        .into_iter()
        .map(|row| {
            running += row.count;
            ParetoRow {
                key: row.key,
                count: row.count,
                cumulative_pct: cumulative_pct(running, total),
            }
        })
        .collect()
}

fn cumulative_pct(running: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (running as f64 * 100.0 / total as f64).min(100.0)
}

pub fn headline_metrics(records: &[&ClassifiedIncident]) -> HeadlineMetrics {
    let total_incidents = records.len();
    let downtime_mins: f64 = records.iter().map(|r| r.incident.duration_mins).sum();

    HeadlineMetrics {
        total_incidents,
        downtime_mins,
        blocking: records.iter().filter(|r| r.incident.blocking).count(),
        starving: records.iter().filter(|r| r.incident.starving).count(),
        avg_duration_mins: if total_incidents == 0 {
            0.0
        } else {
            downtime_mins / total_incidents as f64
        },
    }
}

pub fn cell_table(records: &[&ClassifiedIncident], limit: usize) -> Vec<CellStats> {
    let mut map: BTreeMap<&str, CellStats> = BTreeMap::new();

    for record in records {
        let incident = &record.incident;
        let entry = map.entry(&incident.cell).or_insert_with(|| CellStats {
            cell: incident.cell.clone(),
            incidents: 0,
            downtime_mins: 0.0,
            blocking: 0,
            starving: 0,
            avg_duration_mins: 0.0,
        });
        entry.incidents += 1;
        entry.downtime_mins += incident.duration_mins;
        entry.blocking += usize::from(incident.blocking);
        entry.starving += usize::from(incident.starving);
    }

    let mut rows: Vec<CellStats> = map
        .into_values()
        .map(|mut stats| {
            stats.avg_duration_mins = stats.downtime_mins / stats.incidents as f64;
            stats
        })
        .collect();
    rows.sort_by(|a, b| b.incidents.cmp(&a.incidents));
    rows.truncate(limit);
    rows
}

/// Derives every chart for one filtered set. Pure: the same input always
/// yields the same output.
pub fn build_views(records: &[&ClassifiedIncident], limits: &ViewLimits) -> DashboardViews {
    DashboardViews {
        status: if records.is_empty() {
            ViewStatus::NoMatches
        } else {
            ViewStatus::Populated
        },
        metrics: headline_metrics(records),
        by_type: type_breakdown(records),
        top_cells: top_cells(records, limits.cells),
        top_components: top_components(records, limits.components),
        top_alarm_types: top_alarm_types(records, limits.alarm_types, limits.alarm_label_len),
        cell_table: cell_table(records, limits.cell_table),
    }
}
