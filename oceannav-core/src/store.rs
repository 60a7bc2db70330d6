//! The single owner of [`AppState`].
//!
//! Every mutation goes through [`ViewStateStore`], which applies the
//! cross-field rules (scale sync, selection clearing, time-window order),
//! decides whether a patch needs a dataset-change cascade and notifies
//! subscribers after each transition that actually changed something.

use std::sync::mpsc;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::options::{Options, OptionsPatch};
use crate::patch::StatePatch;
use crate::scale::ScaleRange;
use crate::selection::Coordinate;
use crate::state::AppState;
use crate::swap::swap_views;
use crate::view::{DatasetId, Panel};

/// A dataset change the store cannot apply on its own: the variable list
/// and time window must be fetched from the catalog first.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetChange {
    pub panel: Panel,
    pub dataset: DatasetId,
    /// The rest of the originating patch, applied together with the
    /// resolved dataset fields.
    pub base: StatePatch,
}

/// Result of [`ViewStateStore::apply`].
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub state: Arc<AppState>,
    /// Whether this call produced a new state (and a notification).
    pub changed: bool,
    /// Dataset changes still to be resolved, primary panel first.
    pub cascades: Vec<DatasetChange>,
}

pub struct ViewStateStore {
    state: Arc<AppState>,
    /// Options before the last [`update_options`](Self::update_options).
    previous_options: Options,
    /// Outstanding busy holds; `busy` is set while any is held.
    busy_holds: u32,
    subscribers: Vec<mpsc::Sender<Arc<AppState>>>,
}

impl Default for ViewStateStore {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl ViewStateStore {
    pub fn new(state: AppState) -> Self {
        let previous_options = state.options.clone();
        Self {
            state: Arc::new(state),
            previous_options,
            busy_holds: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Receive a snapshot after every transition. Dropped receivers are
    /// pruned on the next notification.
    pub fn subscribe(&mut self) -> mpsc::Receiver<Arc<AppState>> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    /// Apply a patch.
    ///
    /// A dataset equal to the panel's current one is dropped from the patch.
    /// A real dataset change is not applied here: it is returned in
    /// [`ApplyOutcome::cascades`] with the remainder of the patch, and the
    /// state is left untouched until the cascade commits. A secondary
    /// dataset only cascades while comparison is (or becomes) enabled;
    /// otherwise it is stored as given. Turning comparison on re-resolves
    /// the secondary panel against its dataset.
    pub fn apply(&mut self, mut patch: StatePatch) -> ApplyOutcome {
        let current = Arc::clone(&self.state);
        if patch.primary.dataset.as_ref() == Some(&current.views.primary.dataset) {
            patch.primary.dataset = None;
        }
        if patch.secondary.dataset.as_ref() == Some(&current.views.secondary.dataset) {
            patch.secondary.dataset = None;
        }

        let compare = patch
            .dataset_compare
            .unwrap_or(current.views.dataset_compare);
        let enabling_compare = compare && !current.views.dataset_compare;
        let mut cascades = Vec::new();
        if let Some(dataset) = patch.primary.dataset.take() {
            cascades.push((Panel::Primary, dataset));
        }
        if compare {
            match patch.secondary.dataset.take() {
                Some(dataset) => cascades.push((Panel::Secondary, dataset)),
                // Stored while inert; its variable and window may not match.
                None if enabling_compare => {
                    cascades.push((Panel::Secondary, current.views.secondary.dataset.clone()))
                }
                None => {}
            }
        }

        if !cascades.is_empty() {
            let mut base = Some(patch);
            let cascades: Vec<DatasetChange> = cascades
                .into_iter()
                .map(|(panel, dataset)| {
                    info!(%panel, %dataset, "Dataset change requested");
                    DatasetChange {
                        panel,
                        dataset,
                        base: base.take().unwrap_or_default(),
                    }
                })
                .collect();
            return ApplyOutcome {
                state: current,
                changed: false,
                cascades,
            };
        }

        if patch.is_empty() {
            return ApplyOutcome {
                state: current,
                changed: false,
                cascades: Vec::new(),
            };
        }

        let changed = self.commit_patch(patch);
        ApplyOutcome {
            state: self.snapshot(),
            changed,
            cascades: Vec::new(),
        }
    }

    /// Apply a batch of `(key, value)` updates in wire spelling.
    ///
    /// Unknown keys and values of the wrong shape are logged and skipped.
    /// `None` values are skipped. The cross-field rules follow the order of
    /// the pairs: a scale is mirrored only if ranges are synchronized at the
    /// point it is written, and hiding the observation selector clears any
    /// area written before it. The batch is committed as one transition.
    pub fn apply_pairs<I, K>(&mut self, pairs: I) -> ApplyOutcome
    where
        I: IntoIterator<Item = (K, Option<Value>)>,
        K: AsRef<str>,
    {
        let views = &self.state.views;
        let mut sync = views.sync_ranges;
        let mut scales: [Option<ScaleRange>; 2] = [None, None];
        let mut area: Option<Vec<Coordinate>> = None;
        let mut clear_selection = false;
        let mut object = Map::new();

        for (key, value) in pairs {
            let key = key.as_ref();
            let Some(value) = value else {
                debug!(key, "Skipping state key without a value");
                continue;
            };
            let step = match StatePatch::single(key, value.clone()) {
                Ok(step) => step,
                Err(e) => {
                    warn!("Ignoring state update: {e}");
                    continue;
                }
            };

            if let Some(on) = step.sync_ranges {
                sync = on;
            }
            for panel in [Panel::Primary, Panel::Secondary] {
                let Some(scale) = step.view(panel).scale else {
                    continue;
                };
                let other = panel.other().index();
                scales[panel.index()] = Some(scale);
                scales[other] = if sync {
                    Some(scale)
                } else {
                    // Pinned so the commit-time rule cannot mirror it later.
                    scales[other].or(Some(views.view(panel.other()).scale))
                };
            }
            if step.observation_area.is_some() {
                area = step.observation_area;
            } else if step.ui.show_observation_select == Some(false) {
                area = Some(Vec::new());
            }
            if step.selection.is_some() {
                clear_selection = false;
            } else if step.ui.show_modal == Some(false) {
                clear_selection = true;
            }
            object.insert(key.to_string(), value);
        }

        let mut patch = match StatePatch::from_json(Value::Object(object)) {
            Ok(patch) => patch,
            Err(e) => {
                warn!("Ignoring state update batch: {e}");
                return self.apply(StatePatch::default());
            }
        };
        let [primary_scale, secondary_scale] = scales;
        if primary_scale.is_some() {
            patch.primary.scale = primary_scale;
        }
        if secondary_scale.is_some() {
            patch.secondary.scale = secondary_scale;
        }
        if area.is_some() {
            patch.observation_area = area;
        }
        if clear_selection {
            patch.selection = Some(None);
        }
        self.apply(patch)
    }

    /// Apply a patch with the cross-field rules but without cascade
    /// detection. Used to commit the outcome of a resolved cascade.
    pub fn commit(&mut self, patch: StatePatch) -> Arc<AppState> {
        self.commit_patch(patch);
        self.snapshot()
    }

    /// Load a state fragment verbatim, e.g. from a permalink. Datasets are
    /// taken as given; the catalog is not consulted.
    pub fn restore(&mut self, patch: StatePatch) -> Arc<AppState> {
        info!("Restoring state from link");
        self.commit(patch)
    }

    /// Exchange the displayed fields of the two panels.
    pub fn swap(&mut self) -> Arc<AppState> {
        let mut next = (*self.state).clone();
        swap_views(&mut next.views);
        debug!("Swapped primary and secondary views");
        self.publish(next);
        self.snapshot()
    }

    // -----------------------------------------------------------------------
    // Options
    // -----------------------------------------------------------------------

    /// Merge `patch` into the options, remembering the previous options for
    /// [`revert_options`](Self::revert_options).
    pub fn update_options(&mut self, patch: OptionsPatch) -> Arc<AppState> {
        self.previous_options = self.state.options.clone();
        self.commit(StatePatch {
            options: Some(patch),
            ..StatePatch::default()
        })
    }

    /// Restore the options in effect before the last update.
    pub fn revert_options(&mut self) -> Arc<AppState> {
        let previous = OptionsPatch::from_options(&self.previous_options);
        info!("Reverting options");
        self.commit(StatePatch {
            options: Some(previous),
            ..StatePatch::default()
        })
    }

    // -----------------------------------------------------------------------
    // Busy
    // -----------------------------------------------------------------------

    /// Take a busy hold. `busy` stays set until every hold is released.
    pub fn acquire_busy(&mut self) -> Arc<AppState> {
        self.busy_holds += 1;
        let mut next = (*self.state).clone();
        next.busy = true;
        self.publish(next);
        self.snapshot()
    }

    /// Release a busy hold and apply `patch` in the same transition.
    pub fn release_busy(&mut self, patch: Option<StatePatch>) -> Arc<AppState> {
        if self.busy_holds == 0 {
            warn!("Busy released without a matching hold");
        }
        self.busy_holds = self.busy_holds.saturating_sub(1);
        self.commit_patch(patch.unwrap_or_default());
        self.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.busy_holds > 0
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Rules that tie fields together, applied to `patch` before it is
    /// merged into the current state.
    fn apply_rules(&self, patch: &mut StatePatch) {
        let current = &self.state;

        let sync = patch.sync_ranges.unwrap_or(current.views.sync_ranges);
        if sync {
            match (&patch.primary.scale, &patch.secondary.scale) {
                (Some(scale), None) => patch.secondary.scale = Some(scale.clone()),
                (None, Some(scale)) => patch.primary.scale = Some(scale.clone()),
                _ => {}
            }
        }

        if patch.ui.show_observation_select == Some(false) && patch.observation_area.is_none() {
            patch.observation_area = Some(Vec::new());
        }

        if patch.ui.show_modal == Some(false) && patch.selection.is_none() {
            patch.selection = Some(None);
        }
    }

    fn commit_patch(&mut self, mut patch: StatePatch) -> bool {
        self.apply_rules(&mut patch);
        let mut next = (*self.state).clone();
        patch.apply_to(&mut next);
        for panel in [Panel::Primary, Panel::Secondary] {
            if next.views.view_mut(panel).normalize_time_window() {
                debug!(%panel, "Corrected inverted time window");
            }
        }
        next.busy = self.busy_holds > 0;
        self.publish(next)
    }

    /// Install `next` and notify subscribers, unless nothing changed.
    fn publish(&mut self, next: AppState) -> bool {
        if next == *self.state {
            return false;
        }
        self.state = Arc::new(next);
        let snapshot = Arc::clone(&self.state);
        self.subscribers
            .retain(|tx| tx.send(Arc::clone(&snapshot)).is_ok());
        true
    }
}
