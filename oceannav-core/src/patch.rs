//! Typed partial updates to [`AppState`].
//!
//! A patch only carries the fields it changes. Patches arrive either from
//! Rust callers, from JSON (permalinks, the shell, batched key/value
//! updates), or from the dataset-change cascade. JSON keys follow the
//! viewer's wire names; unknown keys are ignored on decode and rejected by
//! [`StatePatch::single`].

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::{Dataset, Variable};
use crate::error::CoreError;
use crate::options::OptionsPatch;
use crate::scale::ScaleRange;
use crate::selection::{Coordinate, Selection, SelectionKind, SelectionValue};
use crate::state::{AppState, UiState};
use crate::view::{DatasetId, Panel, QuiverVariable, TimeIndex, VariableId, ViewState};

/// Every key a patch understands, in wire spelling.
pub const STATE_KEYS: &[&str] = &[
    "dataset",
    "variable",
    "quiverVariable",
    "depth",
    "time",
    "starttime",
    "scale",
    "variable_scale",
    "scale_1",
    "dataset_1",
    "dataset_compare",
    "syncRanges",
    "options",
    "projection",
    "basemap",
    "quantum",
    "showModal",
    "modal",
    "names",
    "point",
    "line",
    "area",
    "track",
    "class4",
    "subquery",
    "showPermalink",
    "showOptions",
    "showHelp",
    "showCompareHelp",
    "sidebarOpen",
    "showObservationSelect",
    "observationArea",
    "plotEnabled",
];

/// Replace `dst` with `src` when `src` carries a value.
pub(crate) fn overlay<T>(dst: &mut Option<T>, src: Option<T>) {
    if src.is_some() {
        *dst = src;
    }
}

fn assign<T: Clone>(dst: &mut T, src: &Option<T>) {
    if let Some(v) = src {
        *dst = v.clone();
    }
}

// ---------------------------------------------------------------------------
// ViewPatch
// ---------------------------------------------------------------------------

/// Partial update of one panel's [`ViewState`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewPatch {
    pub dataset: Option<DatasetId>,
    pub variable: Option<VariableId>,
    pub quiver_variable: Option<QuiverVariable>,
    pub depth: Option<u32>,
    pub time: Option<TimeIndex>,
    pub starttime: Option<TimeIndex>,
    pub scale: Option<ScaleRange>,
    pub variable_scale: Option<[f64; 2]>,
}

impl ViewPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn merge(&mut self, other: ViewPatch) {
        overlay(&mut self.dataset, other.dataset);
        overlay(&mut self.variable, other.variable);
        overlay(&mut self.quiver_variable, other.quiver_variable);
        overlay(&mut self.depth, other.depth);
        overlay(&mut self.time, other.time);
        overlay(&mut self.starttime, other.starttime);
        overlay(&mut self.scale, other.scale);
        overlay(&mut self.variable_scale, other.variable_scale);
    }

    pub fn apply_to(&self, view: &mut ViewState) {
        assign(&mut view.dataset, &self.dataset);
        assign(&mut view.variable, &self.variable);
        assign(&mut view.quiver_variable, &self.quiver_variable);
        assign(&mut view.depth, &self.depth);
        assign(&mut view.time, &self.time);
        assign(&mut view.starttime, &self.starttime);
        assign(&mut view.scale, &self.scale);
        assign(&mut view.variable_scale, &self.variable_scale);
    }
}

// ---------------------------------------------------------------------------
// UiPatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiPatch {
    pub show_modal: Option<bool>,
    /// `Some(None)` clears the modal kind.
    pub modal: Option<Option<SelectionKind>>,
    pub show_permalink: Option<bool>,
    pub show_options: Option<bool>,
    pub show_help: Option<bool>,
    pub show_compare_help: Option<bool>,
    pub sidebar_open: Option<bool>,
    pub show_observation_select: Option<bool>,
    pub plot_enabled: Option<bool>,
}

impl UiPatch {
    pub fn merge(&mut self, other: UiPatch) {
        overlay(&mut self.show_modal, other.show_modal);
        overlay(&mut self.modal, other.modal);
        overlay(&mut self.show_permalink, other.show_permalink);
        overlay(&mut self.show_options, other.show_options);
        overlay(&mut self.show_help, other.show_help);
        overlay(&mut self.show_compare_help, other.show_compare_help);
        overlay(&mut self.sidebar_open, other.sidebar_open);
        overlay(&mut self.show_observation_select, other.show_observation_select);
        overlay(&mut self.plot_enabled, other.plot_enabled);
    }

    pub fn apply_to(&self, ui: &mut UiState) {
        assign(&mut ui.show_modal, &self.show_modal);
        assign(&mut ui.modal, &self.modal);
        assign(&mut ui.show_permalink, &self.show_permalink);
        assign(&mut ui.show_options, &self.show_options);
        assign(&mut ui.show_help, &self.show_help);
        assign(&mut ui.show_compare_help, &self.show_compare_help);
        assign(&mut ui.sidebar_open, &self.sidebar_open);
        assign(&mut ui.show_observation_select, &self.show_observation_select);
        assign(&mut ui.plot_enabled, &self.plot_enabled);
    }
}

// ---------------------------------------------------------------------------
// StatePatch
// ---------------------------------------------------------------------------

/// Partial update of the whole [`AppState`].
///
/// `Option<Option<T>>` fields distinguish "leave alone" (`None`) from
/// "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub primary: ViewPatch,
    /// Secondary view; its `scale` is the wire key `scale_1`.
    pub secondary: ViewPatch,
    pub dataset_compare: Option<bool>,
    pub sync_ranges: Option<bool>,
    pub options: Option<OptionsPatch>,
    pub projection: Option<String>,
    pub basemap: Option<String>,
    pub quantum: Option<String>,
    pub ui: UiPatch,
    pub selection: Option<Option<Selection>>,
    pub subquery: Option<Option<Value>>,
    pub observation_area: Option<Vec<Coordinate>>,
    pub available_datasets: Option<Vec<Dataset>>,
    pub dataset_variables: Option<Vec<Variable>>,
}

impl StatePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Parse a patch from a JSON object in wire spelling.
    pub fn from_json(value: Value) -> crate::Result<Self> {
        let raw: RawPatch =
            serde_json::from_value(value).map_err(|e| CoreError::InvalidStateValue {
                key: "<patch>".to_string(),
                source: e,
            })?;
        raw.into_patch()
    }

    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| CoreError::InvalidStateValue {
                key: "<patch>".to_string(),
                source: e,
            })?;
        Self::from_json(value)
    }

    /// Patch for a single wire key. Unknown keys and values of the wrong
    /// shape are errors.
    pub fn single(key: &str, value: Value) -> crate::Result<Self> {
        if !STATE_KEYS.contains(&key) {
            return Err(CoreError::UnknownStateKey(key.to_string()));
        }
        let mut object = Map::new();
        object.insert(key.to_string(), value);
        let raw: RawPatch = serde_json::from_value(Value::Object(object)).map_err(|e| {
            CoreError::InvalidStateValue {
                key: key.to_string(),
                source: e,
            }
        })?;
        raw.into_patch()
    }

    pub fn view(&self, panel: Panel) -> &ViewPatch {
        match panel {
            Panel::Primary => &self.primary,
            Panel::Secondary => &self.secondary,
        }
    }

    pub fn view_mut(&mut self, panel: Panel) -> &mut ViewPatch {
        match panel {
            Panel::Primary => &mut self.primary,
            Panel::Secondary => &mut self.secondary,
        }
    }

    /// Change the primary dataset.
    pub fn dataset(id: impl Into<DatasetId>) -> Self {
        Self {
            primary: ViewPatch {
                dataset: Some(id.into()),
                ..ViewPatch::default()
            },
            ..Self::default()
        }
    }

    /// Fold `other` on top of `self`; fields set in `other` win.
    pub fn merge(&mut self, other: StatePatch) {
        self.primary.merge(other.primary);
        self.secondary.merge(other.secondary);
        overlay(&mut self.dataset_compare, other.dataset_compare);
        overlay(&mut self.sync_ranges, other.sync_ranges);
        match (&mut self.options, other.options) {
            (Some(mine), Some(theirs)) => mine.merge(theirs),
            (mine, theirs) => overlay(mine, theirs),
        }
        overlay(&mut self.projection, other.projection);
        overlay(&mut self.basemap, other.basemap);
        overlay(&mut self.quantum, other.quantum);
        self.ui.merge(other.ui);
        overlay(&mut self.selection, other.selection);
        overlay(&mut self.subquery, other.subquery);
        overlay(&mut self.observation_area, other.observation_area);
        overlay(&mut self.available_datasets, other.available_datasets);
        overlay(&mut self.dataset_variables, other.dataset_variables);
    }

    /// Copy every present field into `state`, without any cross-field rules.
    pub fn apply_to(&self, state: &mut AppState) {
        self.primary.apply_to(&mut state.views.primary);
        self.secondary.apply_to(&mut state.views.secondary);
        assign(&mut state.views.dataset_compare, &self.dataset_compare);
        assign(&mut state.views.sync_ranges, &self.sync_ranges);
        if let Some(options) = &self.options {
            state.options.apply_patch(options);
        }
        assign(&mut state.projection, &self.projection);
        assign(&mut state.basemap, &self.basemap);
        assign(&mut state.quantum, &self.quantum);
        self.ui.apply_to(&mut state.ui);
        assign(&mut state.selection, &self.selection);
        assign(&mut state.subquery, &self.subquery);
        assign(&mut state.observation_area, &self.observation_area);
        assign(&mut state.available_datasets, &self.available_datasets);
        assign(&mut state.dataset_variables, &self.dataset_variables);
    }
}

// ---------------------------------------------------------------------------
// Wire decoding
// ---------------------------------------------------------------------------

/// Distinguishes an explicit `null` (`Some(None)`) from an absent key.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawView {
    dataset: Option<DatasetId>,
    variable: Option<VariableId>,
    #[serde(rename = "quiverVariable")]
    quiver_variable: Option<QuiverVariable>,
    depth: Option<u32>,
    time: Option<TimeIndex>,
    starttime: Option<TimeIndex>,
    scale: Option<ScaleRange>,
    variable_scale: Option<[f64; 2]>,
}

impl From<RawView> for ViewPatch {
    fn from(raw: RawView) -> Self {
        Self {
            dataset: raw.dataset,
            variable: raw.variable,
            quiver_variable: raw.quiver_variable,
            depth: raw.depth,
            time: raw.time,
            starttime: raw.starttime,
            scale: raw.scale,
            variable_scale: raw.variable_scale,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPatch {
    #[serde(flatten)]
    primary: RawView,
    scale_1: Option<ScaleRange>,
    dataset_1: Option<RawView>,
    dataset_compare: Option<bool>,
    #[serde(rename = "syncRanges")]
    sync_ranges: Option<bool>,
    options: Option<OptionsPatch>,
    projection: Option<String>,
    basemap: Option<String>,
    quantum: Option<String>,
    #[serde(rename = "showModal")]
    show_modal: Option<bool>,
    #[serde(deserialize_with = "double_option")]
    modal: Option<Option<SelectionKind>>,
    names: Option<Vec<String>>,
    point: Option<SelectionValue>,
    line: Option<SelectionValue>,
    area: Option<SelectionValue>,
    track: Option<SelectionValue>,
    class4: Option<SelectionValue>,
    #[serde(deserialize_with = "double_option")]
    subquery: Option<Option<Value>>,
    #[serde(rename = "showPermalink")]
    show_permalink: Option<bool>,
    #[serde(rename = "showOptions")]
    show_options: Option<bool>,
    #[serde(rename = "showHelp")]
    show_help: Option<bool>,
    #[serde(rename = "showCompareHelp")]
    show_compare_help: Option<bool>,
    #[serde(rename = "sidebarOpen")]
    sidebar_open: Option<bool>,
    #[serde(rename = "showObservationSelect")]
    show_observation_select: Option<bool>,
    #[serde(rename = "observationArea")]
    observation_area: Option<Vec<Coordinate>>,
    #[serde(rename = "plotEnabled")]
    plot_enabled: Option<bool>,
}

impl RawPatch {
    /// Pick the selection carried by the raw keys. The `modal` key decides
    /// between several candidates; otherwise the first kind present wins.
    fn take_selection(&mut self) -> crate::Result<Option<Selection>> {
        let mut candidates: Vec<(SelectionKind, SelectionValue)> = [
            (SelectionKind::Point, self.point.take()),
            (SelectionKind::Line, self.line.take()),
            (SelectionKind::Area, self.area.take()),
            (SelectionKind::Track, self.track.take()),
            (SelectionKind::Class4, self.class4.take()),
        ]
        .into_iter()
        .filter_map(|(kind, value)| value.map(|v| (kind, v)))
        .collect();

        if candidates.is_empty() {
            if self.names.is_some() {
                debug!("Ignoring selection names without a selection");
            }
            return Ok(None);
        }

        let preferred = match self.modal {
            Some(Some(kind)) => candidates.iter().position(|(k, _)| *k == kind),
            _ => None,
        };
        let (kind, value) = candidates.swap_remove(preferred.unwrap_or(0));
        let names = self.names.take().unwrap_or_default();
        Selection::new(kind, value, names).map(Some)
    }

    fn into_patch(mut self) -> crate::Result<StatePatch> {
        let selection = self.take_selection()?;

        let mut secondary: ViewPatch = self.dataset_1.take().map(Into::into).unwrap_or_default();
        overlay(&mut secondary.scale, self.scale_1);

        Ok(StatePatch {
            primary: self.primary.into(),
            secondary,
            dataset_compare: self.dataset_compare,
            sync_ranges: self.sync_ranges,
            options: self.options,
            projection: self.projection,
            basemap: self.basemap,
            quantum: self.quantum,
            ui: UiPatch {
                show_modal: self.show_modal,
                modal: self.modal,
                show_permalink: self.show_permalink,
                show_options: self.show_options,
                show_help: self.show_help,
                show_compare_help: self.show_compare_help,
                sidebar_open: self.sidebar_open,
                show_observation_select: self.show_observation_select,
                plot_enabled: self.plot_enabled,
            },
            selection: selection.map(Some),
            subquery: self.subquery,
            observation_area: self.observation_area,
            available_datasets: None,
            dataset_variables: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_primary_and_secondary_fields() {
        let patch = StatePatch::from_json(json!({
            "dataset": "riops_daily",
            "time": 12,
            "scale": "auto",
            "scale_1": "0,1",
            "dataset_1": { "variable": "vosaline", "depth": 4 },
        }))
        .unwrap();
        assert_eq!(patch.primary.dataset, Some(DatasetId::from("riops_daily")));
        assert_eq!(patch.primary.time, Some(12));
        assert_eq!(patch.primary.scale, Some(ScaleRange::Auto));
        assert_eq!(patch.secondary.scale, Some(ScaleRange::new(0.0, 1.0)));
        assert_eq!(patch.secondary.variable, Some(VariableId::from("vosaline")));
        assert_eq!(patch.secondary.depth, Some(4));
    }

    #[test]
    fn unknown_keys_are_ignored_when_decoding() {
        let patch = StatePatch::from_json(json!({ "depth": 2, "vectorid": "abc" })).unwrap();
        assert_eq!(patch.primary.depth, Some(2));
    }

    #[test]
    fn single_rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            StatePatch::single("vectorid", json!("abc")),
            Err(CoreError::UnknownStateKey(_))
        ));
        assert!(matches!(
            StatePatch::single("depth", json!("deep")),
            Err(CoreError::InvalidStateValue { .. })
        ));
        assert!(StatePatch::single("depth", json!(3)).is_ok());
    }

    #[test]
    fn null_clears_nullable_fields() {
        let patch = StatePatch::from_json(json!({ "subquery": null, "modal": null })).unwrap();
        assert_eq!(patch.subquery, Some(None));
        assert_eq!(patch.ui.modal, Some(None));
        let absent = StatePatch::from_json(json!({})).unwrap();
        assert!(absent.is_empty());
    }

    #[test]
    fn selection_is_built_from_modal_and_value() {
        let patch = StatePatch::from_json(json!({
            "modal": "line",
            "names": ["transect"],
            "point": [[1.0, 2.0]],
            "line": [[1.0, 2.0], [3.0, 4.0]],
        }))
        .unwrap();
        let selection = patch.selection.unwrap().unwrap();
        assert_eq!(selection.kind, SelectionKind::Line);
        assert_eq!(selection.names, vec!["transect".to_string()]);
    }

    #[test]
    fn invalid_selection_fails_the_patch() {
        assert!(StatePatch::from_json(json!({ "point": [] })).is_err());
    }

    #[test]
    fn merge_prefers_later_values() {
        let mut a = StatePatch::from_json(json!({ "depth": 1, "time": 4 })).unwrap();
        let b = StatePatch::from_json(json!({ "depth": 2 })).unwrap();
        a.merge(b);
        assert_eq!(a.primary.depth, Some(2));
        assert_eq!(a.primary.time, Some(4));
    }

    #[test]
    fn options_patches_merge_field_by_field() {
        let mut a = StatePatch::from_json(json!({ "options": { "bathymetry": false } })).unwrap();
        let b = StatePatch::from_json(json!({ "options": { "interpRadius": 40 } })).unwrap();
        a.merge(b);
        let options = a.options.unwrap();
        assert_eq!(options.bathymetry, Some(false));
        assert_eq!(options.interp_radius, Some(40));
    }
}
