use serde::Serialize;
use tracing::debug;

use crate::aggregate::{top_alarm_types, top_components};
use crate::config::ViewLimits;
use crate::models::{ClassifiedIncident, ParetoRow, RankedCount};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum DrillState {
    #[default]
    Overview,
    CellDrilldown(String),
    ComponentDrilldown(String),
}

impl DrillState {
    /// The implicit predicate this state adds on top of the FilterSpec.
    pub fn matches(&self, record: &ClassifiedIncident) -> bool {
        match self {
            DrillState::Overview => true,
            DrillState::CellDrilldown(cell) => record.incident.cell == *cell,
            DrillState::ComponentDrilldown(component) => record.incident.component == *component,
        }
    }
}

/// A chart element the user picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Cell(String),
    Component(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrilldownView {
    pub state: DrillState,
    pub count: usize,
    pub alarm_types: Vec<RankedCount>,
    pub components: Vec<ParetoRow>,
}

/// At most one drilldown is active; a new selection replaces the old one.
#[derive(Debug, Clone, Default)]
pub struct DrillDownController {
    state: DrillState,
}

impl DrillDownController {
    pub fn state(&self) -> &DrillState {
        &self.state
    }

    pub fn select(&mut self, selection: Selection) -> &DrillState {
        self.state = match selection {
            Selection::Cell(cell) => DrillState::CellDrilldown(cell),
            Selection::Component(component) => DrillState::ComponentDrilldown(component),
        };
        debug!(state = ?self.state, "drilldown selected");
        &self.state
    }

    pub fn clear(&mut self) {
        self.state = DrillState::Overview;
    }

    /// Scopes an already filtered set to the selected entity. The FilterSpec
    /// that produced `filtered` is left untouched.
    pub fn scope<'a>(&self, filtered: &[&'a ClassifiedIncident]) -> Vec<&'a ClassifiedIncident> {
        filtered
            .iter()
            .copied()
            .filter(|record| self.state.matches(record))
            .collect()
    }

    pub fn view(&self, filtered: &[&ClassifiedIncident], limits: &ViewLimits) -> DrilldownView {
        let scoped = self.scope(filtered);
        DrilldownView {
            state: self.state.clone(),
            count: scoped.len(),
            alarm_types: top_alarm_types(&scoped, limits.alarm_types, limits.alarm_label_len),
            components: top_components(&scoped, limits.components),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::incident;

    fn records() -> Vec<ClassifiedIncident> {
        vec![
            incident("AIB1", "DC1", "LIFT", "Jam", 1),
            incident("AIB1", "DC1", "BELT", "Stall", 1),
            incident("AIB2", "DC1", "LIFT", "Fault", 2),
            incident("AOB1", "DC2", "LIFT", "Jam", 2),
        ]
    }

    #[test]
    fn starts_in_overview() {
        assert_eq!(*DrillDownController::default().state(), DrillState::Overview);
    }

    #[test]
    fn cell_drilldown_scopes_alarm_types() {
        let records = records();
        let filtered: Vec<&ClassifiedIncident> = records.iter().collect();
        let mut controller = DrillDownController::default();
        controller.select(Selection::Cell("AIB1".into()));

        let view = controller.view(&filtered, &ViewLimits::default());
        assert_eq!(view.count, 2);
        assert_eq!(
            view.alarm_types,
            vec![
                RankedCount { key: "Jam".into(), count: 1 },
                RankedCount { key: "Stall".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn new_selection_replaces_previous() {
        let records = records();
        let filtered: Vec<&ClassifiedIncident> = records.iter().collect();
        let mut controller = DrillDownController::default();
        controller.select(Selection::Cell("AIB1".into()));
        controller.select(Selection::Component("LIFT".into()));

        assert_eq!(
            *controller.state(),
            DrillState::ComponentDrilldown("LIFT".into())
        );
        // not intersected with the earlier cell selection
        assert_eq!(controller.scope(&filtered).len(), 3);
    }

    #[test]
    fn clearing_restores_overview_view() {
        let records = records();
        let filtered: Vec<&ClassifiedIncident> = records.iter().collect();
        let limits = ViewLimits::default();
        let mut controller = DrillDownController::default();
        let before = controller.view(&filtered, &limits);

        controller.select(Selection::Cell("AOB1".into()));
        assert_ne!(controller.view(&filtered, &limits), before);
        controller.clear();

        assert_eq!(controller.view(&filtered, &limits), before);
    }

    #[test]
    fn selection_outside_filtered_set_is_empty() {
        let records = records();
        let filtered: Vec<&ClassifiedIncident> = records.iter().take(2).collect();
        let mut controller = DrillDownController::default();
        controller.select(Selection::Cell("AOB1".into()));
        let view = controller.view(&filtered, &ViewLimits::default());
        assert_eq!(view.count, 0);
        assert!(view.alarm_types.is_empty());
    }
}
