//! The entry point a presentation layer talks to.
//!
//! [`Navigator`] owns the store and the dataset-change coordinator. Every
//! operation borrows the store only for synchronous sections; catalog
//! lookups are the only points where it yields.

use std::cell::RefCell;
use std::sync::mpsc;
use std::sync::Arc;

use oceannav_core::{
    decode, dispatch, dispatch_named, encode, Action, AppState, ApplyOutcome, MapCommand,
    OptionsPatch, Panel, PermalinkFlags, StatePatch, SubsetArea, SubsetRequest, UiPatch, ViewPatch,
    ViewStateStore,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cascade::{BusyHold, DatasetChangeCoordinator};
use crate::client::CatalogClient;

/// What closing the modal window did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalClose {
    /// A pending plot link was discarded and the modal hidden.
    Dismissed,
    /// Nothing to discard; the caller should step back in its history.
    NavigateBack,
}

pub struct Navigator<C> {
    store: RefCell<ViewStateStore>,
    coordinator: DatasetChangeCoordinator<C>,
}

impl<C: CatalogClient> Navigator<C> {
    pub fn new(catalog: C) -> Self {
        Self::with_state(catalog, AppState::default())
    }

    pub fn with_state(catalog: C, state: AppState) -> Self {
        Self {
            store: RefCell::new(ViewStateStore::new(state)),
            coordinator: DatasetChangeCoordinator::new(catalog),
        }
    }

    pub fn catalog(&self) -> &C {
        self.coordinator.catalog()
    }

    pub fn snapshot(&self) -> Arc<AppState> {
        self.store.borrow().snapshot()
    }

    pub fn subscribe(&self) -> mpsc::Receiver<Arc<AppState>> {
        self.store.borrow_mut().subscribe()
    }

    // -----------------------------------------------------------------------
    // Updates
    // -----------------------------------------------------------------------

    /// Apply a patch, running any dataset-change cascade it triggers.
    ///
    /// When both panels change dataset the primary cascade runs first; if it
    /// fails the secondary one is not started.
    pub async fn apply(&self, patch: StatePatch) -> crate::Result<Arc<AppState>> {
        let outcome = self.store.borrow_mut().apply(patch);
        self.run_cascades(outcome).await
    }

    /// Batched `(key, value)` form of [`apply`](Self::apply).
    pub async fn apply_pairs<I, K>(&self, pairs: I) -> crate::Result<Arc<AppState>>
    where
        I: IntoIterator<Item = (K, Option<Value>)>,
        K: AsRef<str>,
    {
        let outcome = self.store.borrow_mut().apply_pairs(pairs);
        self.run_cascades(outcome).await
    }

    async fn run_cascades(&self, outcome: ApplyOutcome) -> crate::Result<Arc<AppState>> {
        let mut state = outcome.state;
        for change in outcome.cascades {
            state = self.coordinator.change_dataset(&self.store, change).await?;
        }
        Ok(state)
    }

    pub fn swap(&self) -> Arc<AppState> {
        self.store.borrow_mut().swap()
    }

    pub fn update_options(&self, patch: OptionsPatch) -> Arc<AppState> {
        self.store.borrow_mut().update_options(patch)
    }

    pub fn revert_options(&self) -> Arc<AppState> {
        self.store.borrow_mut().revert_options()
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Dispatch an action, apply its patch and hand back the map commands.
    pub fn dispatch(&self, action: Action) -> Vec<MapCommand> {
        let outcome = dispatch(&self.snapshot(), action);
        self.apply_dispatch(outcome.patch);
        outcome.commands
    }

    pub fn dispatch_named(&self, name: &str, arg: Option<Value>) -> Vec<MapCommand> {
        let outcome = dispatch_named(&self.snapshot(), name, arg);
        self.apply_dispatch(outcome.patch);
        outcome.commands
    }

    fn apply_dispatch(&self, patch: Option<StatePatch>) {
        let Some(patch) = patch else {
            return;
        };
        let outcome = self.store.borrow_mut().apply(patch);
        if !outcome.cascades.is_empty() {
            warn!("Action requested a dataset change; ignoring it");
        }
    }

    /// Close the modal window.
    pub fn close_modal(&self) -> ModalClose {
        if self.snapshot().subquery.is_none() {
            return ModalClose::NavigateBack;
        }
        self.store.borrow_mut().apply(StatePatch {
            subquery: Some(None),
            ui: UiPatch {
                show_modal: Some(false),
                ..UiPatch::default()
            },
            ..StatePatch::default()
        });
        debug!("Discarded pending plot link");
        ModalClose::Dismissed
    }

    /// Hide the modal, dropping its selection.
    pub fn hide_modal(&self) -> Arc<AppState> {
        self.store
            .borrow_mut()
            .apply(StatePatch {
                ui: UiPatch {
                    show_modal: Some(false),
                    ..UiPatch::default()
                },
                ..StatePatch::default()
            })
            .state
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    pub fn permalink(&self, flags: &PermalinkFlags, base_url: &str) -> String {
        encode(&self.snapshot(), flags).to_url(base_url)
    }

    /// Load the state carried by a link. Malformed links change nothing.
    pub fn restore_permalink(&self, link: &str) -> Arc<AppState> {
        let patch = decode(link);
        if patch.is_empty() {
            return self.snapshot();
        }
        self.store.borrow_mut().restore(patch)
    }

    /// A subset request for the primary panel's current window.
    pub fn subset_request(&self, area: SubsetArea) -> SubsetRequest {
        SubsetRequest::from_view(self.snapshot().primary(), area)
    }

    // -----------------------------------------------------------------------
    // Startup
    // -----------------------------------------------------------------------

    /// Fill the catalog lists and, when a time window has not been set
    /// (e.g. by a link), point it at the dataset's latest data. The
    /// secondary window is only filled while comparison is on.
    ///
    /// Failures are logged and leave the state as it is.
    pub async fn bootstrap(&self) -> Arc<AppState> {
        let hold = BusyHold::acquire(&self.store);
        let mut patch = StatePatch::default();
        let snapshot = self.snapshot();
        let primary = snapshot.primary();

        match self.catalog().list_datasets().await {
            Ok(datasets) => {
                patch.quantum = datasets
                    .iter()
                    .find(|d| d.id == primary.dataset)
                    .and_then(|d| d.quantum.clone());
                info!(count = datasets.len(), "Datasets loaded");
                patch.available_datasets = Some(datasets);
            }
            Err(e) => error!("Failed to list datasets: {e}"),
        }

        match self.catalog().list_variables(&primary.dataset).await {
            Ok(variables) => patch.dataset_variables = Some(variables),
            Err(e) => error!(dataset = %primary.dataset, "Failed to list variables: {e}"),
        }

        let mut panels = vec![Panel::Primary];
        if snapshot.views.dataset_compare {
            panels.push(Panel::Secondary);
        }
        for panel in panels {
            let view = snapshot.views.view(panel);
            if view.time_window_resolved() {
                continue;
            }
            match self
                .catalog()
                .list_timestamps(&view.dataset, &view.variable)
                .await
            {
                Ok(timestamps) => {
                    if let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) {
                        *patch.view_mut(panel) = ViewPatch {
                            time: Some(last.id),
                            starttime: Some(first.id),
                            ..ViewPatch::default()
                        };
                    }
                }
                Err(e) => error!(
                    %panel,
                    dataset = %view.dataset,
                    variable = %view.variable,
                    "Failed to list timestamps: {e}"
                ),
            }
        }

        hold.release_with(patch)
    }
}
