use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ops::Range;

use futures::channel::oneshot;
use futures::executor::block_on;
use futures::future::join;
use futures::FutureExt;
use oceannav_core::{
    Dataset, DatasetId, Panel, QuiverVariable, StatePatch, Timestamp, Variable, VariableId,
};
use oceannav_sync::{CatalogClient, CatalogError, InMemoryCatalog, Navigator, SyncError};
use pretty_assertions::assert_eq;
use serde_json::json;

fn variable(id: &str) -> Variable {
    Variable {
        id: id.into(),
        name: id.to_string(),
        scale: None,
    }
}

fn dataset(id: &str, quantum: &str) -> Dataset {
    Dataset {
        id: id.into(),
        name: id.to_string(),
        quantum: Some(quantum.to_string()),
    }
}

fn steps(variable: &str, ids: Range<i64>) -> (VariableId, Vec<i64>) {
    (variable.into(), ids.collect())
}

/// giops_day and giops_month (10 steps), riops_daily (30 steps, no
/// votemper), broken (no timestamps), empty (no variables).
fn sample_catalog() -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::default();
    catalog.insert(
        dataset("giops_day", "day"),
        vec![variable("votemper"), variable("vosaline")],
        [steps("votemper", 100..110), steps("vosaline", 100..110)],
    );
    catalog.insert(
        dataset("riops_daily", "day"),
        vec![variable("vosaline"), variable("sossheig")],
        [steps("vosaline", 0..30), steps("sossheig", 0..5)],
    );
    catalog.insert(
        dataset("giops_month", "month"),
        vec![variable("votemper")],
        [steps("votemper", 0..10)],
    );
    catalog.insert(
        dataset("broken", "day"),
        vec![variable("votemper")],
        Vec::<(VariableId, Vec<i64>)>::new(),
    );
    catalog.insert(
        dataset("empty", "day"),
        Vec::new(),
        Vec::<(VariableId, Vec<i64>)>::new(),
    );
    catalog
}

/// Holds back variable lookups for chosen datasets until released.
struct GatedCatalog {
    inner: InMemoryCatalog,
    gates: RefCell<HashMap<DatasetId, oneshot::Receiver<()>>>,
    timestamp_requests: Cell<usize>,
}

impl GatedCatalog {
    fn new(inner: InMemoryCatalog) -> Self {
        Self {
            inner,
            gates: RefCell::new(HashMap::new()),
            timestamp_requests: Cell::new(0),
        }
    }

    fn gate(&self, dataset: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().insert(dataset.into(), rx);
        tx
    }
}

impl CatalogClient for GatedCatalog {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, CatalogError> {
        self.inner.list_datasets().await
    }

    async fn list_variables(&self, dataset: &DatasetId) -> Result<Vec<Variable>, CatalogError> {
        let gate = self.gates.borrow_mut().remove(dataset);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.inner.list_variables(dataset).await
    }

    async fn list_timestamps(
        &self,
        dataset: &DatasetId,
        variable: &VariableId,
    ) -> Result<Vec<Timestamp>, CatalogError> {
        self.timestamp_requests.set(self.timestamp_requests.get() + 1);
        self.inner.list_timestamps(dataset, variable).await
    }
}

#[test]
fn long_series_window_spans_twenty_four_steps() {
    let nav = Navigator::new(sample_catalog());
    let patch = StatePatch::from_json(json!({
        "dataset": "riops_daily",
        "variable": "vosaline",
    }))
    .unwrap();
    let state = block_on(nav.apply(patch)).unwrap();
    assert_eq!(state.primary().dataset.as_str(), "riops_daily");
    assert_eq!((state.primary().starttime, state.primary().time), (5, 29));
}

#[test]
fn short_series_window_starts_at_the_first_step() {
    let nav = Navigator::new(sample_catalog());
    let state = block_on(nav.apply(StatePatch::dataset("giops_month"))).unwrap();
    assert_eq!((state.primary().starttime, state.primary().time), (0, 9));
}

#[test]
fn cascade_result_is_consistent_with_the_catalog() {
    let catalog = sample_catalog();
    let nav = Navigator::new(sample_catalog());
    let quiver = StatePatch::from_json(json!({ "quiverVariable": "vozocrtx" })).unwrap();
    block_on(nav.apply(quiver)).unwrap();
    let state = block_on(nav.apply(StatePatch::dataset("riops_daily"))).unwrap();
    let view = state.primary();

    // votemper is not offered by riops_daily, so the first variable is used.
    assert_eq!(view.variable.as_str(), "vosaline");
    assert_eq!(view.quiver_variable, QuiverVariable::None);
    let variables = block_on(catalog.list_variables(&view.dataset)).unwrap();
    assert!(variables.iter().any(|v| v.id == view.variable));
    let ids: Vec<i64> = block_on(catalog.list_timestamps(&view.dataset, &view.variable))
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert!(ids.contains(&view.time));
    assert!(ids.contains(&view.starttime));
    assert_eq!(state.dataset_variables, variables);
    assert!(!state.busy);
}

#[test]
fn base_patch_rides_along_with_the_cascade() {
    let nav = Navigator::new(sample_catalog());
    let state = block_on(nav.apply(
        StatePatch::from_json(json!({ "dataset": "giops_month", "depth": 12, "showHelp": true }))
            .unwrap(),
    ))
    .unwrap();
    assert_eq!(state.primary().depth, 12);
    assert!(state.ui.show_help);
    assert_eq!(state.quantum, "day", "quantum needs the dataset list from bootstrap");

    let nav = Navigator::new(sample_catalog());
    block_on(nav.bootstrap());
    let state = block_on(nav.apply(StatePatch::dataset("giops_month"))).unwrap();
    assert_eq!(state.quantum, "month");
}

#[test]
fn failed_cascade_releases_busy_and_keeps_state() {
    let nav = Navigator::new(sample_catalog());
    let before = nav.snapshot();
    let rx = nav.subscribe();

    for target in ["missing", "broken", "empty"] {
        let result = block_on(nav.apply(StatePatch::dataset(target)));
        assert!(result.is_err(), "{target} should fail");
        let state = nav.snapshot();
        assert!(!state.busy);
        assert_eq!(state.views, before.views);
    }

    assert!(matches!(
        block_on(nav.apply(StatePatch::dataset("missing"))),
        Err(SyncError::Catalog(CatalogError::UnknownDataset(_)))
    ));
    assert!(matches!(
        block_on(nav.apply(StatePatch::dataset("broken"))),
        Err(SyncError::NoTimestamps { .. })
    ));
    assert!(matches!(
        block_on(nav.apply(StatePatch::dataset("empty"))),
        Err(SyncError::NoVariables(_))
    ));

    // Every attempt toggled busy on and back off.
    let snapshots: Vec<bool> = rx.try_iter().map(|s| s.busy).collect();
    assert_eq!(snapshots.len(), 12);
    assert!(snapshots.chunks(2).all(|pair| pair == [true, false]));
}

#[test]
fn stale_cascade_does_not_clobber_a_newer_one() {
    let catalog = GatedCatalog::new(sample_catalog());
    let release = catalog.gate("riops_daily");
    let nav = Navigator::new(catalog);

    let slow = nav.apply(StatePatch::dataset("riops_daily"));
    let fast = async {
        let result = nav.apply(StatePatch::dataset("giops_month")).await;
        let _ = release.send(());
        result
    };
    let (slow, fast) = block_on(join(slow, fast));

    assert!(matches!(slow, Err(SyncError::Superseded { panel: Panel::Primary, .. })));
    assert_eq!(fast.unwrap().primary().dataset.as_str(), "giops_month");

    let state = nav.snapshot();
    assert_eq!(state.primary().dataset.as_str(), "giops_month");
    assert!(!state.busy);
    // The superseded cascade stopped before asking for timestamps.
    assert_eq!(nav.catalog().timestamp_requests.get(), 1);
}

#[test]
fn dropping_a_pending_cascade_releases_busy() {
    let catalog = GatedCatalog::new(sample_catalog());
    let _release = catalog.gate("riops_daily");
    let nav = Navigator::new(catalog);
    let rx = nav.subscribe();

    // Polled once: busy is taken and the lookup is still waiting on the gate.
    let pending = nav.apply(StatePatch::dataset("riops_daily")).now_or_never();
    assert!(pending.is_none());

    let state = nav.snapshot();
    assert!(!state.busy);
    assert_eq!(state.primary().dataset.as_str(), "giops_day");
    let snapshots: Vec<bool> = rx.try_iter().map(|s| s.busy).collect();
    assert_eq!(snapshots, vec![true, false]);

    let state = block_on(nav.apply(StatePatch::dataset("giops_month"))).unwrap();
    assert_eq!(state.primary().dataset.as_str(), "giops_month");
    assert!(!state.busy);
}

#[test]
fn enabling_compare_resolves_a_secondary_stored_while_inert() {
    let nav = Navigator::new(sample_catalog());
    block_on(nav.bootstrap());
    block_on(nav.apply(
        StatePatch::from_json(json!({ "dataset_1": { "dataset": "riops_daily" } })).unwrap(),
    ))
    .unwrap();
    let state = block_on(nav.apply(
        StatePatch::from_json(json!({ "dataset_compare": true })).unwrap(),
    ))
    .unwrap();

    assert!(state.views.dataset_compare);
    let secondary = state.secondary();
    assert_eq!(secondary.dataset.as_str(), "riops_daily");
    assert_eq!(secondary.variable.as_str(), "vosaline");
    assert_eq!((secondary.starttime, secondary.time), (5, 29));
    assert!(!state.busy);
}

#[test]
fn secondary_cascades_only_in_compare_mode() {
    let nav = Navigator::new(sample_catalog());
    let state = block_on(nav.apply(
        StatePatch::from_json(json!({ "dataset_1": { "dataset": "riops_daily" } })).unwrap(),
    ))
    .unwrap();
    assert_eq!(state.secondary().dataset.as_str(), "riops_daily");
    assert_eq!(state.secondary().time, -1, "inert panel is not resolved");

    let nav = Navigator::new(sample_catalog());
    let state = block_on(nav.apply(
        StatePatch::from_json(json!({
            "dataset_compare": true,
            "dataset_1": { "dataset": "riops_daily" },
        }))
        .unwrap(),
    ))
    .unwrap();
    assert!(state.views.dataset_compare);
    assert_eq!(state.secondary().variable.as_str(), "vosaline");
    assert_eq!(state.secondary().time, 29);
    assert!(state.dataset_variables.is_empty(), "secondary does not touch the selector list");
}

#[test]
fn both_panels_change_primary_first() {
    let nav = Navigator::new(sample_catalog());
    let state = block_on(nav.apply(
        StatePatch::from_json(json!({
            "dataset_compare": true,
            "dataset": "giops_month",
            "dataset_1": { "dataset": "riops_daily" },
        }))
        .unwrap(),
    ))
    .unwrap();
    assert_eq!(state.primary().dataset.as_str(), "giops_month");
    assert_eq!(state.secondary().dataset.as_str(), "riops_daily");
    assert!(!state.busy);
}

#[test]
fn synced_ranges_mirror_between_panels() {
    let nav = Navigator::new(sample_catalog());
    let state = block_on(nav.apply_pairs([
        ("syncRanges", Some(json!(true))),
        ("scale", Some(json!("1,2"))),
    ]))
    .unwrap();
    assert_eq!(state.primary().scale.to_string(), "1,2");
    assert_eq!(state.secondary().scale.to_string(), "1,2");
}

#[test]
fn reapplying_the_current_dataset_is_silent() {
    let nav = Navigator::new(sample_catalog());
    let rx = nav.subscribe();
    let before = nav.snapshot();
    let after = block_on(nav.apply(StatePatch::dataset("giops_day"))).unwrap();
    assert_eq!(*after, *before);
    assert_eq!(rx.try_iter().count(), 0);
    assert_eq!(nav.snapshot().primary().time, -1);
}

#[test]
fn bootstrap_resolves_an_unset_window_only() {
    let nav = Navigator::new(sample_catalog());
    let state = block_on(nav.bootstrap());
    assert_eq!(state.available_datasets.len(), 5);
    assert_eq!(state.dataset_variables.len(), 2);
    assert_eq!((state.primary().starttime, state.primary().time), (100, 109));
    assert!(!state.busy);

    let nav = Navigator::new(sample_catalog());
    nav.restore_permalink(r#"{"time": 104, "starttime": 102}"#);
    let state = block_on(nav.bootstrap());
    assert_eq!((state.primary().starttime, state.primary().time), (102, 104));
    assert_eq!(state.secondary().time, -1, "inert panel is left alone");

    let nav = Navigator::new(sample_catalog());
    nav.restore_permalink(r#"{"time": 104, "starttime": 102, "dataset_compare": true}"#);
    let state = block_on(nav.bootstrap());
    assert_eq!((state.primary().starttime, state.primary().time), (102, 104));
    assert_eq!((state.secondary().starttime, state.secondary().time), (100, 109));
}
