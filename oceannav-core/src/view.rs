use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::scale::ScaleRange;

/// Index of a timestamp as reported by the catalog.
///
/// Negative values are placeholders for "not yet resolved"; the defaults are
/// `-1` for `time` and `-2` for `starttime`.
pub type TimeIndex = i64;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Catalog identifier of a dataset (e.g. `giops_day`).
    DatasetId
);
string_id!(
    /// Catalog identifier of a variable within a dataset (e.g. `votemper`).
    VariableId
);

// ---------------------------------------------------------------------------
// Quiver variable
// ---------------------------------------------------------------------------

/// Vector field drawn as arrows on top of a panel, or nothing.
///
/// Serialized as the variable id, or the literal `"none"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QuiverVariable {
    #[default]
    None,
    Variable(VariableId),
}

impl Serialize for QuiverVariable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_str("none"),
            Self::Variable(id) => serializer.serialize_str(id.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for QuiverVariable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() || raw == "none" {
            Ok(Self::None)
        } else {
            Ok(Self::Variable(VariableId(raw)))
        }
    }
}

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// What one map panel displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub dataset: DatasetId,
    pub variable: VariableId,
    #[serde(rename = "quiverVariable", default)]
    pub quiver_variable: QuiverVariable,
    pub depth: u32,
    pub time: TimeIndex,
    pub starttime: TimeIndex,
    pub scale: ScaleRange,
    pub variable_scale: [f64; 2],
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            dataset: DatasetId::from("giops_day"),
            variable: VariableId::from("votemper"),
            quiver_variable: QuiverVariable::None,
            depth: 0,
            time: -1,
            starttime: -2,
            scale: ScaleRange::default(),
            variable_scale: [-5.0, 30.0],
        }
    }
}

impl ViewState {
    /// Both ends of the time window point at real catalog entries.
    pub fn time_window_resolved(&self) -> bool {
        self.time >= 0 && self.starttime >= 0
    }

    /// Restore `starttime <= time` by exchanging the two when inverted.
    /// Returns `true` if the window had to be corrected.
    pub fn normalize_time_window(&mut self) -> bool {
        if self.time_window_resolved() && self.starttime > self.time {
            std::mem::swap(&mut self.starttime, &mut self.time);
            true
        } else {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Panels
// ---------------------------------------------------------------------------

/// Which of the two comparison panels an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Primary,
    Secondary,
}

impl Panel {
    pub fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The primary view, the secondary (comparison) view and the flags that tie
/// them together.
///
/// While `dataset_compare` is off the secondary view is inert: it is kept
/// for when comparison is re-enabled but never fetched for.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareState {
    pub primary: ViewState,
    pub secondary: ViewState,
    pub dataset_compare: bool,
    /// Mirror scale writes between the two panels.
    pub sync_ranges: bool,
}

impl Default for CompareState {
    fn default() -> Self {
        Self {
            primary: ViewState::default(),
            secondary: ViewState::default(),
            dataset_compare: false,
            sync_ranges: false,
        }
    }
}

impl CompareState {
    pub fn view(&self, panel: Panel) -> &ViewState {
        match panel {
            Panel::Primary => &self.primary,
            Panel::Secondary => &self.secondary,
        }
    }

    pub fn view_mut(&mut self, panel: Panel) -> &mut ViewState {
        match panel {
            Panel::Primary => &mut self.primary,
            Panel::Secondary => &mut self.secondary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiver_none_round_trips_as_literal() {
        let json = serde_json::to_string(&QuiverVariable::None).unwrap();
        assert_eq!(json, "\"none\"");
        let parsed: QuiverVariable = serde_json::from_str("\"vozocrtx\"").unwrap();
        assert_eq!(parsed, QuiverVariable::Variable(VariableId::from("vozocrtx")));
        let parsed: QuiverVariable = serde_json::from_str("\"none\"").unwrap();
        assert_eq!(parsed, QuiverVariable::None);
    }

    #[test]
    fn default_view_is_unresolved() {
        let view = ViewState::default();
        assert_eq!(view.dataset.as_str(), "giops_day");
        assert_eq!(view.variable.as_str(), "votemper");
        assert!(!view.time_window_resolved());
    }

    #[test]
    fn inverted_window_is_swapped_back() {
        let mut view = ViewState {
            time: 3,
            starttime: 7,
            ..ViewState::default()
        };
        assert!(view.normalize_time_window());
        assert_eq!((view.starttime, view.time), (3, 7));
        assert!(!view.normalize_time_window());
    }

    #[test]
    fn unresolved_window_is_left_alone() {
        let mut view = ViewState::default();
        assert!(!view.normalize_time_window());
        assert_eq!((view.starttime, view.time), (-2, -1));
    }
}
