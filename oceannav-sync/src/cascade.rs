use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use oceannav_core::{
    AppState, DatasetChange, DatasetId, Panel, QuiverVariable, StatePatch, TimeIndex, Timestamp,
    Variable, VariableId, ViewPatch, ViewStateStore,
};
use tracing::{debug, error, info, warn};

use crate::client::CatalogClient;
use crate::error::SyncError;

/// Number of timestamps before the last one that a fresh time window spans.
const DEFAULT_WINDOW: usize = 24;

// ---------------------------------------------------------------------------
// Generations
// ---------------------------------------------------------------------------

/// Per-panel cascade generations.
///
/// Starting a cascade advances the panel's generation; a cascade that finds
/// the generation moved on while it was waiting on the catalog has been
/// superseded and must not commit.
#[derive(Debug, Default)]
pub struct CascadeGenerations {
    counters: [AtomicU64; 2],
}

impl CascadeGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new generation for `panel` and return it.
    pub fn begin(&self, panel: Panel) -> u64 {
        self.counters[panel.index()].fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Read the current generation of `panel`.
    pub fn current(&self, panel: Panel) -> u64 {
        self.counters[panel.index()].load(Ordering::SeqCst)
    }

    pub fn is_current(&self, panel: Panel, generation: u64) -> bool {
        self.current(panel) == generation
    }
}

/// `(starttime, time)` for a freshly selected dataset: the last timestamp,
/// and the one [`DEFAULT_WINDOW`] entries before it (or the first, for short
/// series).
pub fn starting_window(timestamps: &[Timestamp]) -> Option<(TimeIndex, TimeIndex)> {
    let last = timestamps.last()?;
    let start = if timestamps.len() > DEFAULT_WINDOW {
        &timestamps[timestamps.len() - DEFAULT_WINDOW - 1]
    } else {
        &timestamps[0]
    };
    Some((start.id, last.id))
}

// ---------------------------------------------------------------------------
// Busy hold
// ---------------------------------------------------------------------------

/// A busy hold on the store that is released when dropped, including when
/// the future owning it is dropped before completion.
pub(crate) struct BusyHold<'a> {
    store: &'a RefCell<ViewStateStore>,
    armed: bool,
}

impl<'a> BusyHold<'a> {
    pub(crate) fn acquire(store: &'a RefCell<ViewStateStore>) -> Self {
        store.borrow_mut().acquire_busy();
        Self { store, armed: true }
    }

    /// Release the hold and commit `patch` in the same transition.
    pub(crate) fn release_with(mut self, patch: StatePatch) -> Arc<AppState> {
        self.armed = false;
        self.store.borrow_mut().release_busy(Some(patch))
    }
}

impl Drop for BusyHold<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.store.try_borrow_mut() {
            Ok(mut store) => {
                store.release_busy(None);
            }
            Err(_) => warn!("Store borrowed while releasing busy; hold leaked"),
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Resolves a dataset change into a consistent `{dataset, variable, time,
/// starttime}` patch by querying the catalog, then commits it.
pub struct DatasetChangeCoordinator<C> {
    catalog: C,
    generations: CascadeGenerations,
}

impl<C: CatalogClient> DatasetChangeCoordinator<C> {
    pub fn new(catalog: C) -> Self {
        Self {
            catalog,
            generations: CascadeGenerations::new(),
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    pub fn generations(&self) -> &CascadeGenerations {
        &self.generations
    }

    /// Run a dataset-change cascade.
    ///
    /// `busy` is held for the duration and released on every exit path,
    /// including when this future is dropped before it completes. On
    /// success the resolved fields, merged over the change's base patch, are
    /// committed in the same transition that releases `busy`. On failure or
    /// supersession the state is left as it was.
    ///
    /// The store is only borrowed between awaits.
    pub async fn change_dataset(
        &self,
        store: &RefCell<ViewStateStore>,
        change: DatasetChange,
    ) -> crate::Result<Arc<AppState>> {
        let DatasetChange {
            panel,
            dataset,
            base,
        } = change;
        let generation = self.generations.begin(panel);
        info!(%panel, %dataset, generation, "Starting dataset change");
        let hold = BusyHold::acquire(store);

        match self.resolve(store, panel, &dataset, &base, generation).await {
            Ok(resolved) => {
                let mut patch = base;
                patch.merge(resolved);
                let state = hold.release_with(patch);
                info!(%panel, %dataset, "Dataset change committed");
                Ok(state)
            }
            Err(e) => {
                if e.is_superseded() {
                    debug!("{e}");
                } else {
                    error!(%panel, %dataset, "Dataset change failed: {e}");
                }
                drop(hold);
                Err(e)
            }
        }
    }

    fn ensure_current(
        &self,
        panel: Panel,
        dataset: &DatasetId,
        generation: u64,
    ) -> crate::Result<()> {
        if self.generations.is_current(panel, generation) {
            Ok(())
        } else {
            Err(SyncError::Superseded {
                panel,
                dataset: dataset.clone(),
            })
        }
    }

    async fn resolve(
        &self,
        store: &RefCell<ViewStateStore>,
        panel: Panel,
        dataset: &DatasetId,
        base: &StatePatch,
        generation: u64,
    ) -> crate::Result<StatePatch> {
        let variables = self.catalog.list_variables(dataset).await?;
        let snapshot = store.borrow().snapshot();
        let requested = base
            .view(panel)
            .variable
            .clone()
            .unwrap_or_else(|| snapshot.views.view(panel).variable.clone());
        let variable = pick_variable(&variables, &requested)
            .ok_or_else(|| SyncError::NoVariables(dataset.clone()))?
            .clone();
        debug!(%panel, %dataset, variable = %variable.id, "Variable resolved");

        self.ensure_current(panel, dataset, generation)?;
        let timestamps = self.catalog.list_timestamps(dataset, &variable.id).await?;
        let (starttime, time) =
            starting_window(&timestamps).ok_or_else(|| SyncError::NoTimestamps {
                dataset: dataset.clone(),
                variable: variable.id.clone(),
            })?;
        self.ensure_current(panel, dataset, generation)?;

        let mut patch = StatePatch::default();
        *patch.view_mut(panel) = ViewPatch {
            dataset: Some(dataset.clone()),
            variable: Some(variable.id.clone()),
            quiver_variable: Some(QuiverVariable::None),
            time: Some(time),
            starttime: Some(starttime),
            variable_scale: variable.scale,
            ..ViewPatch::default()
        };
        if panel == Panel::Primary {
            let snapshot = store.borrow().snapshot();
            patch.quantum = snapshot
                .available_datasets
                .iter()
                .find(|d| &d.id == dataset)
                .and_then(|d| d.quantum.clone());
            patch.dataset_variables = Some(variables);
        }
        Ok(patch)
    }
}

/// The requested variable when the dataset has it, else the first one in
/// catalog order.
fn pick_variable<'a>(variables: &'a [Variable], requested: &VariableId) -> Option<&'a Variable> {
    variables
        .iter()
        .find(|v| &v.id == requested)
        .or_else(|| variables.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: i64) -> Vec<Timestamp> {
        (0..n).map(Timestamp::new).collect()
    }

    #[test]
    fn long_series_start_twenty_four_steps_back() {
        assert_eq!(starting_window(&series(30)), Some((5, 29)));
        assert_eq!(starting_window(&series(25)), Some((0, 24)));
    }

    #[test]
    fn short_series_start_at_the_beginning() {
        assert_eq!(starting_window(&series(10)), Some((0, 9)));
        assert_eq!(starting_window(&series(1)), Some((0, 0)));
        assert_eq!(starting_window(&[]), None);
    }

    #[test]
    fn generations_advance_per_panel() {
        let generations = CascadeGenerations::new();
        let first = generations.begin(Panel::Primary);
        assert!(generations.is_current(Panel::Primary, first));
        let second = generations.begin(Panel::Primary);
        assert!(!generations.is_current(Panel::Primary, first));
        assert!(generations.is_current(Panel::Primary, second));
        assert_eq!(generations.current(Panel::Secondary), 0);
    }

    #[test]
    fn requested_variable_wins_when_listed() {
        let vars: Vec<Variable> = ["votemper", "vosaline"]
            .into_iter()
            .map(|id| Variable {
                id: id.into(),
                name: id.to_string(),
                scale: None,
            })
            .collect();
        let pick = |id: &str| {
            pick_variable(&vars, &VariableId::from(id)).map(|v| v.id.as_str().to_string())
        };
        assert_eq!(pick("vosaline").as_deref(), Some("vosaline"));
        assert_eq!(pick("sossheig").as_deref(), Some("votemper"));
        assert!(pick_variable(&[], &VariableId::from("x")).is_none());
    }
}
