use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::error;

use crate::catalog::{Dataset, Variable};
use crate::options::Options;
use crate::scale::ScaleRange;
use crate::selection::{Coordinate, Selection, SelectionKind};
use crate::view::{CompareState, DatasetId, QuiverVariable, TimeIndex, VariableId, ViewState};

// ---------------------------------------------------------------------------
// UI flags
// ---------------------------------------------------------------------------

/// Transient dialog and panel flags the presentation layer renders from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiState {
    #[serde(rename = "showModal")]
    pub show_modal: bool,
    /// Which selection window the modal shows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modal: Option<SelectionKind>,
    #[serde(rename = "showPermalink")]
    pub show_permalink: bool,
    #[serde(rename = "showOptions")]
    pub show_options: bool,
    #[serde(rename = "showHelp")]
    pub show_help: bool,
    #[serde(rename = "showCompareHelp")]
    pub show_compare_help: bool,
    #[serde(rename = "sidebarOpen")]
    pub sidebar_open: bool,
    #[serde(rename = "showObservationSelect")]
    pub show_observation_select: bool,
    #[serde(rename = "plotEnabled")]
    pub plot_enabled: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            show_modal: false,
            modal: None,
            show_permalink: false,
            show_options: false,
            show_help: false,
            show_compare_help: false,
            sidebar_open: true,
            show_observation_select: false,
            plot_enabled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Everything the viewer shares between its components.
///
/// Only [`ViewStateStore`](crate::store::ViewStateStore) mutates it; every
/// other component reads snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub views: CompareState,
    pub options: Options,
    /// Map projection code (e.g. `EPSG:3857`).
    pub projection: String,
    pub basemap: String,
    /// Temporal resolution of the primary dataset.
    pub quantum: String,
    /// A dataset-change cascade is in flight; conflicting interaction is
    /// blocked while set.
    pub busy: bool,
    pub ui: UiState,
    pub selection: Option<Selection>,
    /// Opaque plot settings handed over by a plot window when it asks for a
    /// shareable link.
    pub subquery: Option<Value>,
    pub observation_area: Vec<Coordinate>,
    /// Catalog lists for the selectors. Never serialized.
    pub available_datasets: Vec<Dataset>,
    pub dataset_variables: Vec<Variable>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            views: CompareState::default(),
            options: Options::default(),
            projection: "EPSG:3857".to_string(),
            basemap: "topo".to_string(),
            quantum: "day".to_string(),
            busy: false,
            ui: UiState::default(),
            selection: None,
            subquery: None,
            observation_area: Vec::new(),
            available_datasets: Vec::new(),
            dataset_variables: Vec::new(),
        }
    }
}

impl AppState {
    pub fn primary(&self) -> &ViewState {
        &self.views.primary
    }

    pub fn secondary(&self) -> &ViewState {
        &self.views.secondary
    }

    /// Wire form of the state as a JSON object with sorted keys.
    pub fn to_json(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                error!("State serialized to a non-object value: {other}");
                Map::new()
            }
            Err(e) => {
                error!("Failed to serialize state: {e}");
                Map::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire layout
// ---------------------------------------------------------------------------

/// The secondary view travels as `dataset_1` without its scale, which is
/// carried by the top-level `scale_1` key.
#[derive(Serialize)]
struct SecondaryWire<'a> {
    dataset: &'a DatasetId,
    variable: &'a VariableId,
    #[serde(rename = "quiverVariable")]
    quiver_variable: &'a QuiverVariable,
    depth: u32,
    time: TimeIndex,
    starttime: TimeIndex,
    variable_scale: [f64; 2],
}

/// Emits `names` and the selection under its kind's key (`point`, `line`…).
struct SelectionWire<'a>(&'a Selection);

impl Serialize for SelectionWire<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("names", &self.0.names)?;
        map.serialize_entry(self.0.kind.key(), &self.0.value)?;
        map.end()
    }
}

#[derive(Serialize)]
struct Wire<'a> {
    #[serde(flatten)]
    primary: &'a ViewState,
    scale_1: &'a ScaleRange,
    dataset_1: SecondaryWire<'a>,
    dataset_compare: bool,
    #[serde(rename = "syncRanges")]
    sync_ranges: bool,
    options: &'a Options,
    projection: &'a str,
    basemap: &'a str,
    quantum: &'a str,
    busy: bool,
    #[serde(flatten)]
    ui: &'a UiState,
    #[serde(skip_serializing_if = "Option::is_none")]
    subquery: Option<&'a Value>,
    #[serde(rename = "observationArea")]
    observation_area: &'a [Coordinate],
    #[serde(flatten)]
    selection: Option<SelectionWire<'a>>,
}

impl Serialize for AppState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let secondary = &self.views.secondary;
        Wire {
            primary: &self.views.primary,
            scale_1: &secondary.scale,
            dataset_1: SecondaryWire {
                dataset: &secondary.dataset,
                variable: &secondary.variable,
                quiver_variable: &secondary.quiver_variable,
                depth: secondary.depth,
                time: secondary.time,
                starttime: secondary.starttime,
                variable_scale: secondary.variable_scale,
            },
            dataset_compare: self.views.dataset_compare,
            sync_ranges: self.views.sync_ranges,
            options: &self.options,
            projection: &self.projection,
            basemap: &self.basemap,
            quantum: &self.quantum,
            busy: self.busy,
            ui: &self.ui,
            subquery: self.subquery.as_ref(),
            observation_area: &self.observation_area,
            selection: self.selection.as_ref().map(SelectionWire),
        }
        .serialize(serializer)
    }
}
