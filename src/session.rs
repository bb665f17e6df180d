//! Action dispatch over one loaded record set.
//!
//! The session owns the dataset, the active filter and the drilldown state.
//! Every view is re-derived from those values on an explicit action; nothing
//! recomputes in the background.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aggregate::{build_views, type_breakdown};
use crate::config::ViewLimits;
use crate::diagnostics::{FilterDiagnostics, LoadDiagnostics, TypeCounts};
use crate::drilldown::{DrillDownController, DrillState, DrilldownView, Selection};
use crate::error::LoadError;
use crate::export::{export_rows, ExportRow, ExportSink};
use crate::filter::{FilterSpec, FilterState};
use crate::loader::{ChunkLoader, Dataset, Manifest, PartitionSource};
use crate::models::{ClassifiedIncident, DashboardViews, WeekSummary};
use crate::weeks::{week_detail, week_insights, WeekDetail};

/// Distinct filters kept in the view cache before it is flushed.
const VIEW_CACHE_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ApplyFilters(FilterSpec),
    ResetFilters,
    Select(Selection),
    Clear,
    Export,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied(Snapshot),
    Drilldown(DrilldownView),
    Export(Vec<ExportRow>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub filter: FilterSpec,
    pub views: Arc<DashboardViews>,
    pub drilldown: DrilldownView,
    pub weeks: Vec<WeekSummary>,
}

pub struct Session {
    dataset: Arc<Dataset>,
    filter: FilterState,
    drill: DrillDownController,
    limits: ViewLimits,
    cache: HashMap<FilterSpec, Arc<DashboardViews>>,
    last_filter: Option<FilterDiagnostics>,
}

impl Session {
    pub fn new(limits: ViewLimits) -> Self {
        Self::with_dataset(Dataset::empty(), limits)
    }

    pub fn with_dataset(dataset: Dataset, limits: ViewLimits) -> Self {
        Self {
            dataset: Arc::new(dataset),
            filter: FilterState::default(),
            drill: DrillDownController::default(),
            limits,
            cache: HashMap::new(),
            last_filter: None,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn filter(&self) -> &FilterSpec {
        self.filter.spec()
    }

    pub fn drill_state(&self) -> &DrillState {
        self.drill.state()
    }

    pub fn last_filter_diagnostics(&self) -> Option<&FilterDiagnostics> {
        self.last_filter.as_ref()
    }

    pub fn load_diagnostics(&self) -> LoadDiagnostics {
        LoadDiagnostics::from(&self.dataset.report)
    }

    pub async fn load<S: PartitionSource>(
        &mut self,
        loader: &ChunkLoader<S>,
        manifest: &Manifest,
    ) -> Result<LoadDiagnostics, LoadError> {
        let result = loader.load(manifest).await;
        self.install(result)
    }

    /// Swaps in a finished load. Superseded or older generations leave the
    /// current dataset untouched.
    pub fn install(&mut self, result: Result<Dataset, LoadError>) -> Result<LoadDiagnostics, LoadError> {
        let dataset = match result {
            Ok(dataset) => dataset,
            Err(err) => {
                warn!(error = %err, "keeping previous dataset");
                return Err(err);
            }
        };

        let current = self.dataset.report.generation;
        if dataset.report.generation < current {
            warn!(
                generation = dataset.report.generation,
                current, "ignoring stale load"
            );
            return Err(LoadError::Superseded {
                generation: dataset.report.generation,
            });
        }

        if dataset.is_empty() {
            warn!(generation = dataset.report.generation, "load produced no alarms");
        }

        self.dataset = Arc::new(dataset);
        self.cache.clear();
        self.last_filter = None;

        let diagnostics = self.load_diagnostics();
        diagnostics.emit();
        Ok(diagnostics)
    }

    pub fn dispatch(&mut self, action: Action) -> Outcome {
        match action {
            Action::ApplyFilters(spec) => Outcome::Applied(self.apply_filters(spec)),
            Action::ResetFilters => Outcome::Applied(self.reset_filters()),
            Action::Select(selection) => Outcome::Drilldown(self.select(selection)),
            Action::Clear => Outcome::Drilldown(self.clear()),
            Action::Export => Outcome::Export(export_rows(&self.filtered())),
        }
    }

    pub fn apply_filters(&mut self, spec: FilterSpec) -> Snapshot {
        self.filter.set(spec);
        self.apply()
    }

    pub fn reset_filters(&mut self) -> Snapshot {
        self.filter.reset();
        self.apply()
    }

    pub fn select(&mut self, selection: Selection) -> DrilldownView {
        self.drill.select(selection);
        self.drilldown()
    }

    /// Back to Overview. The FilterSpec is untouched.
    pub fn clear(&mut self) -> DrilldownView {
        self.drill.clear();
        self.drilldown()
    }

    /// Hands the current filtered rows to an export collaborator.
    pub fn export_to<E: ExportSink>(&self, sink: &mut E) -> anyhow::Result<usize> {
        let rows = export_rows(&self.filtered());
        let written = sink.write_rows(&rows)?;
        info!(rows = written, "export handed off");
        Ok(written)
    }

    pub fn week_detail(&self, week: u8) -> WeekDetail {
        week_detail(&self.filtered(), week, self.limits.insight_top)
    }

    fn filtered(&self) -> Vec<&ClassifiedIncident> {
        self.filter.apply_filters(&self.dataset.records)
    }

    fn drilldown(&self) -> DrilldownView {
        self.drill.view(&self.filtered(), &self.limits)
    }

    fn apply(&mut self) -> Snapshot {
        let spec = self.filter.spec().clone();
        let dataset = Arc::clone(&self.dataset);
        let filtered = self.filter.apply_filters(&dataset.records);

        if self.cache.len() >= VIEW_CACHE_CAPACITY && !self.cache.contains_key(&spec) {
            debug!(entries = self.cache.len(), "flushing view cache");
            self.cache.clear();
        }

        let limits = self.limits;
        let views = Arc::clone(
            self.cache
                .entry(spec.clone())
                .or_insert_with(|| Arc::new(build_views(&filtered, &limits))),
        );

        let diagnostics = FilterDiagnostics {
            filter: spec.clone(),
            total_loaded: dataset.len(),
            matched: filtered.len(),
            status: views.status,
            degraded: dataset.report.degraded,
            by_type: TypeCounts::from(&type_breakdown(&filtered)),
        };
        diagnostics.emit();
        self.last_filter = Some(diagnostics);

        Snapshot {
            filter: spec,
            drilldown: self.drill.view(&filtered, &self.limits),
            weeks: week_insights(&filtered),
            views,
        }
    }
}
