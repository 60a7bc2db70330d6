//! Translation of user intents into state patches and map commands.
//!
//! Dispatching is pure: it reads a snapshot and returns what should happen.
//! The caller applies the patch through the store and forwards the commands
//! to the map panels.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::patch::{StatePatch, UiPatch};
use crate::selection::{Coordinate, Selection, SelectionKind, SelectionValue};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Map commands
// ---------------------------------------------------------------------------

/// Drawing tool on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    Point,
    Line,
    Area,
    ObsPoint,
    ObsArea,
}

/// Which maps receive a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapTarget {
    Primary,
    /// Both panels, while comparison is on.
    Both,
}

impl MapTarget {
    fn for_state(state: &AppState) -> Self {
        if state.views.dataset_compare {
            Self::Both
        } else {
            Self::Primary
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MapCommand {
    Arm {
        mode: InteractionMode,
        target: MapTarget,
    },
    Disarm {
        mode: InteractionMode,
        target: MapTarget,
    },
    Show {
        layer: String,
        id: String,
        target: MapTarget,
    },
    Add {
        kind: String,
        id: String,
        extra: Option<Value>,
        target: MapTarget,
    },
    Reset {
        target: MapTarget,
    },
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Where a point came from. Map clicks report `[lon, lat]`; typed
/// coordinates are already `[lat, lon]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum PointSource {
    #[default]
    #[serde(rename = "drawn")]
    Drawn,
    #[serde(rename = "enterPoint")]
    Entered,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ObsPoint,
    /// `None` arms the tool; `Some` stores the drawn area.
    ObsArea(Option<Vec<Coordinate>>),
    Point(Option<(Coordinate, PointSource)>),
    Line(Option<Vec<Coordinate>>),
    Area(Option<SelectionValue>),
    Track {
        track: SelectionValue,
        names: Vec<String>,
    },
    Class4(String),
    Show {
        layer: String,
        id: String,
    },
    Add {
        kind: String,
        id: String,
        extra: Option<Value>,
    },
    Plot,
    Reset,
    /// Open the link dialog, optionally for a plot's settings.
    Permalink(Option<Value>),
    Options,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionName {
    ObsPoint,
    ObsArea,
    Point,
    Line,
    Area,
    Track,
    Class4,
    Show,
    Add,
    Plot,
    Reset,
    Permalink,
    Options,
    Help,
}

impl ActionName {
    pub const ALL: [ActionName; 14] = [
        Self::ObsPoint,
        Self::ObsArea,
        Self::Point,
        Self::Line,
        Self::Area,
        Self::Track,
        Self::Class4,
        Self::Show,
        Self::Add,
        Self::Plot,
        Self::Reset,
        Self::Permalink,
        Self::Options,
        Self::Help,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObsPoint => "obs_point",
            Self::ObsArea => "obs_area",
            Self::Point => "point",
            Self::Line => "line",
            Self::Area => "area",
            Self::Track => "track",
            Self::Class4 => "class4",
            Self::Show => "show",
            Self::Add => "add",
            Self::Plot => "plot",
            Self::Reset => "reset",
            Self::Permalink => "permalink",
            Self::Options => "options",
            Self::Help => "help",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| CoreError::UnknownAction(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Argument decoding
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum PointArg {
    Bare(Coordinate),
    Tagged {
        coordinate: Coordinate,
        #[serde(default)]
        source: PointSource,
    },
}

#[derive(Deserialize)]
struct TrackArg {
    track: SelectionValue,
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Deserialize)]
struct ShowArg {
    layer: String,
    id: String,
}

#[derive(Deserialize)]
struct AddArg {
    kind: String,
    id: String,
    #[serde(default)]
    extra: Option<Value>,
}

fn required<T: for<'de> Deserialize<'de>>(
    name: ActionName,
    arg: Option<Value>,
) -> crate::Result<T> {
    let value = arg.ok_or_else(|| CoreError::InvalidActionArgument {
        action: name.to_string(),
        reason: "missing argument".to_string(),
    })?;
    serde_json::from_value(value).map_err(|e| CoreError::InvalidActionArgument {
        action: name.to_string(),
        reason: e.to_string(),
    })
}

fn optional<T: for<'de> Deserialize<'de>>(
    name: ActionName,
    arg: Option<Value>,
) -> crate::Result<Option<T>> {
    match arg {
        None | Some(Value::Null) => Ok(None),
        some => required(name, some).map(Some),
    }
}

impl Action {
    /// Build an action from its name and an optional JSON argument.
    pub fn from_named(name: &str, arg: Option<Value>) -> crate::Result<Self> {
        let name: ActionName = name.parse()?;
        Ok(match name {
            ActionName::ObsPoint => Self::ObsPoint,
            ActionName::ObsArea => Self::ObsArea(optional(name, arg)?),
            ActionName::Point => Self::Point(optional::<PointArg>(name, arg)?.map(|p| match p {
                PointArg::Bare(c) => (c, PointSource::Drawn),
                PointArg::Tagged { coordinate, source } => (coordinate, source),
            })),
            ActionName::Line => Self::Line(optional(name, arg)?),
            ActionName::Area => Self::Area(optional(name, arg)?),
            ActionName::Track => {
                let TrackArg { track, names } = required(name, arg)?;
                Self::Track { track, names }
            }
            ActionName::Class4 => Self::Class4(required(name, arg)?),
            ActionName::Show => {
                let ShowArg { layer, id } = required(name, arg)?;
                Self::Show { layer, id }
            }
            ActionName::Add => {
                let AddArg { kind, id, extra } = required(name, arg)?;
                Self::Add { kind, id, extra }
            }
            ActionName::Plot => Self::Plot,
            ActionName::Reset => Self::Reset,
            ActionName::Permalink => Self::Permalink(optional(name, arg)?),
            ActionName::Options => Self::Options,
            ActionName::Help => Self::Help,
        })
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// What an action asks for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dispatch {
    pub patch: Option<StatePatch>,
    pub commands: Vec<MapCommand>,
}

impl Dispatch {
    fn patch(patch: StatePatch) -> Self {
        Self {
            patch: Some(patch),
            commands: Vec::new(),
        }
    }

    fn command(command: MapCommand) -> Self {
        Self {
            patch: None,
            commands: vec![command],
        }
    }
}

fn ui(ui: UiPatch) -> StatePatch {
    StatePatch {
        ui,
        ..StatePatch::default()
    }
}

/// Arm a drawing tool. A pending selection of another kind is dropped.
fn arm(state: &AppState, mode: InteractionMode, kind: Option<SelectionKind>) -> Dispatch {
    let target = MapTarget::for_state(state);
    let stale = matches!(
        (&state.selection, kind),
        (Some(selection), Some(kind)) if selection.kind != kind
    );
    Dispatch {
        patch: stale.then(|| StatePatch {
            selection: Some(None),
            ..StatePatch::default()
        }),
        commands: vec![MapCommand::Arm { mode, target }],
    }
}

/// Store a finished selection and open its modal window.
fn open(state: &AppState, selection: Selection, disarm: Option<InteractionMode>) -> Dispatch {
    let target = MapTarget::for_state(state);
    debug!(kind = %selection.kind, "Opening selection");
    Dispatch {
        patch: Some(StatePatch {
            ui: UiPatch {
                show_modal: Some(true),
                modal: Some(Some(selection.kind)),
                ..UiPatch::default()
            },
            selection: Some(Some(selection)),
            ..StatePatch::default()
        }),
        commands: disarm
            .map(|mode| MapCommand::Disarm { mode, target })
            .into_iter()
            .collect(),
    }
}

fn complete(
    state: &AppState,
    kind: SelectionKind,
    value: SelectionValue,
    names: Vec<String>,
    disarm: Option<InteractionMode>,
) -> Dispatch {
    match Selection::new(kind, value, names) {
        Ok(selection) => open(state, selection, disarm),
        Err(e) => {
            warn!("Ignoring {kind} action: {e}");
            Dispatch::default()
        }
    }
}

/// Decide what `action` does given the current `state`.
pub fn dispatch(state: &AppState, action: Action) -> Dispatch {
    let target = MapTarget::for_state(state);
    match action {
        Action::ObsPoint => arm(state, InteractionMode::ObsPoint, None),
        Action::ObsArea(None) => arm(state, InteractionMode::ObsArea, None),
        Action::ObsArea(Some(area)) => Dispatch {
            patch: Some(StatePatch {
                ui: UiPatch {
                    show_observation_select: Some(true),
                    ..UiPatch::default()
                },
                observation_area: Some(area),
                ..StatePatch::default()
            }),
            commands: vec![MapCommand::Disarm {
                mode: InteractionMode::ObsArea,
                target,
            }],
        },
        Action::Point(None) => arm(state, InteractionMode::Point, Some(SelectionKind::Point)),
        Action::Point(Some((coordinate, source))) => {
            if coordinate.len() < 2 {
                warn!(?coordinate, "Ignoring point without two components");
                return Dispatch::default();
            }
            let pair = match source {
                PointSource::Drawn => vec![coordinate[1], coordinate[0]],
                PointSource::Entered => vec![coordinate[0], coordinate[1]],
            };
            complete(
                state,
                SelectionKind::Point,
                SelectionValue::Coordinates(vec![pair]),
                Vec::new(),
                Some(InteractionMode::Point),
            )
        }
        Action::Line(None) => arm(state, InteractionMode::Line, Some(SelectionKind::Line)),
        Action::Line(Some(coords)) => complete(
            state,
            SelectionKind::Line,
            SelectionValue::Coordinates(coords),
            Vec::new(),
            Some(InteractionMode::Line),
        ),
        Action::Area(None) => arm(state, InteractionMode::Area, Some(SelectionKind::Area)),
        Action::Area(Some(value)) => complete(
            state,
            SelectionKind::Area,
            value,
            Vec::new(),
            Some(InteractionMode::Area),
        ),
        Action::Track { track, names } => {
            complete(state, SelectionKind::Track, track, names, None)
        }
        Action::Class4(id) => complete(
            state,
            SelectionKind::Class4,
            SelectionValue::Reference(id),
            Vec::new(),
            None,
        ),
        Action::Show { layer, id } => Dispatch::command(MapCommand::Show { layer, id, target }),
        Action::Add { kind, id, extra } => Dispatch::command(MapCommand::Add {
            kind,
            id,
            extra,
            target,
        }),
        Action::Reset => Dispatch::command(MapCommand::Reset { target }),
        Action::Plot => Dispatch::patch(ui(UiPatch {
            show_modal: Some(true),
            ..UiPatch::default()
        })),
        Action::Permalink(subquery) => Dispatch::patch(StatePatch {
            subquery: subquery.map(Some),
            ui: UiPatch {
                show_permalink: Some(true),
                ..UiPatch::default()
            },
            ..StatePatch::default()
        }),
        Action::Options => Dispatch::patch(ui(UiPatch {
            show_options: Some(true),
            ..UiPatch::default()
        })),
        Action::Help => Dispatch::patch(ui(UiPatch {
            show_help: Some(true),
            ..UiPatch::default()
        })),
    }
}

/// Dispatch an action by its wire name. Unknown names and malformed
/// arguments are logged and produce nothing.
pub fn dispatch_named(state: &AppState, name: &str, arg: Option<Value>) -> Dispatch {
    match Action::from_named(name, arg) {
        Ok(action) => dispatch(state, action),
        Err(e) => {
            warn!("Ignoring action: {e}");
            Dispatch::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comparing() -> AppState {
        let mut state = AppState::default();
        state.views.dataset_compare = true;
        state
    }

    #[test]
    fn arming_targets_both_maps_in_compare_mode() {
        let d = dispatch(&comparing(), Action::Line(None));
        assert_eq!(
            d.commands,
            vec![MapCommand::Arm {
                mode: InteractionMode::Line,
                target: MapTarget::Both
            }]
        );
        let d = dispatch(&AppState::default(), Action::Line(None));
        assert!(matches!(
            d.commands[0],
            MapCommand::Arm {
                target: MapTarget::Primary,
                ..
            }
        ));
    }

    #[test]
    fn arming_another_kind_drops_the_selection() {
        let state = AppState {
            selection: Some(Selection::point(1.0, 2.0)),
            ..AppState::default()
        };
        let d = dispatch(&state, Action::Line(None));
        assert_eq!(d.patch.unwrap().selection, Some(None));
        let d = dispatch(&state, Action::Point(None));
        assert!(d.patch.is_none());
    }

    #[test]
    fn drawn_points_are_swapped_and_entered_points_kept() {
        let state = AppState::default();
        let drawn = dispatch(&state, Action::Point(Some((vec![-63.0, 45.0], PointSource::Drawn))));
        let selection = drawn.patch.unwrap().selection.unwrap().unwrap();
        assert_eq!(selection.coordinates().unwrap(), &[vec![45.0, -63.0]]);

        let entered = dispatch(
            &state,
            Action::Point(Some((vec![45.0, -63.0], PointSource::Entered))),
        );
        let selection = entered.patch.unwrap().selection.unwrap().unwrap();
        assert_eq!(selection.coordinates().unwrap(), &[vec![45.0, -63.0]]);
    }

    #[test]
    fn completion_opens_the_modal_and_disarms() {
        let d = dispatch(
            &AppState::default(),
            Action::Line(Some(vec![vec![1.0, 2.0], vec![3.0, 4.0]])),
        );
        let patch = d.patch.unwrap();
        assert_eq!(patch.ui.show_modal, Some(true));
        assert_eq!(patch.ui.modal, Some(Some(SelectionKind::Line)));
        assert_eq!(
            d.commands,
            vec![MapCommand::Disarm {
                mode: InteractionMode::Line,
                target: MapTarget::Primary
            }]
        );
    }

    #[test]
    fn named_dispatch_parses_arguments() {
        let state = AppState::default();
        let d = dispatch_named(
            &state,
            "point",
            Some(json!({ "coordinate": [45.0, -63.0], "source": "enterPoint" })),
        );
        let selection = d.patch.unwrap().selection.unwrap().unwrap();
        assert_eq!(selection.coordinates().unwrap(), &[vec![45.0, -63.0]]);

        let d = dispatch_named(
            &state,
            "class4",
            Some(json!("class4_20190102_GIOPS_CONCEPTS_2.3_profile")),
        );
        assert_eq!(d.patch.unwrap().ui.modal, Some(Some(SelectionKind::Class4)));

        let d = dispatch_named(&state, "show", Some(json!({ "layer": "drifters", "id": "all" })));
        assert_eq!(
            d.commands,
            vec![MapCommand::Show {
                layer: "drifters".to_string(),
                id: "all".to_string(),
                target: MapTarget::Primary
            }]
        );
    }

    #[test]
    fn unknown_or_malformed_actions_do_nothing() {
        let state = AppState::default();
        assert_eq!(dispatch_named(&state, "teleport", None), Dispatch::default());
        assert_eq!(dispatch_named(&state, "class4", None), Dispatch::default());
        assert_eq!(
            dispatch_named(&state, "line", Some(json!([]))),
            Dispatch::default()
        );
    }

    #[test]
    fn permalink_stores_the_subquery() {
        let d = dispatch(
            &AppState::default(),
            Action::Permalink(Some(json!({ "type": "profile" }))),
        );
        let patch = d.patch.unwrap();
        assert_eq!(patch.subquery, Some(Some(json!({ "type": "profile" }))));
        assert_eq!(patch.ui.show_permalink, Some(true));
    }

    #[test]
    fn observation_area_is_stored_and_shown() {
        let area = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let d = dispatch(&AppState::default(), Action::ObsArea(Some(area.clone())));
        let patch = d.patch.unwrap();
        assert_eq!(patch.observation_area, Some(area));
        assert_eq!(patch.ui.show_observation_select, Some(true));
    }
}
