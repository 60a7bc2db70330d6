use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A `[lat, lon]` pair. Drawing tools occasionally append a third component,
/// which is tolerated on input and dropped when a link is generated.
pub type Coordinate = Vec<f64>;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// What a selection describes, and which modal window it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    Point,
    Line,
    Area,
    Track,
    Class4,
}

impl SelectionKind {
    pub const ALL: [SelectionKind; 5] = [
        Self::Point,
        Self::Line,
        Self::Area,
        Self::Track,
        Self::Class4,
    ];

    /// State key the selection value is stored under on the wire.
    pub fn key(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Line => "line",
            Self::Area => "area",
            Self::Track => "track",
            Self::Class4 => "class4",
        }
    }
}

impl fmt::Display for SelectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SelectionKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key() == s)
            .ok_or_else(|| CoreError::InvalidSelection {
                reason: format!("unknown selection kind {s:?}"),
            })
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// Geometry of a selection: drawn coordinates, or a reference by name
/// (a class4 id or a predefined area).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectionValue {
    Coordinates(Vec<Coordinate>),
    Reference(String),
}

impl SelectionValue {
    fn validate(&self) -> crate::Result<()> {
        match self {
            Self::Coordinates(coords) => {
                if coords.is_empty() {
                    return Err(CoreError::InvalidSelection {
                        reason: "selection has no coordinates".to_string(),
                    });
                }
                if let Some(bad) = coords
                    .iter()
                    .find(|c| c.len() < 2 || c.iter().any(|v| !v.is_finite()))
                {
                    return Err(CoreError::InvalidSelection {
                        reason: format!("invalid coordinate {bad:?}"),
                    });
                }
                Ok(())
            }
            Self::Reference(name) if name.trim().is_empty() => Err(CoreError::InvalidSelection {
                reason: "empty selection reference".to_string(),
            }),
            Self::Reference(_) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// A transient selection created by a drawing interaction.
///
/// Lives until its modal is dismissed or a drawing of another kind starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub kind: SelectionKind,
    pub value: SelectionValue,
    /// Display names (e.g. track or station names), possibly empty.
    pub names: Vec<String>,
}

impl Selection {
    pub fn new(
        kind: SelectionKind,
        value: SelectionValue,
        names: Vec<String>,
    ) -> crate::Result<Self> {
        value.validate()?;
        Ok(Self { kind, value, names })
    }

    /// A single-point selection at `(lat, lon)`.
    pub fn point(lat: f64, lon: f64) -> Self {
        Self {
            kind: SelectionKind::Point,
            value: SelectionValue::Coordinates(vec![vec![lat, lon]]),
            names: Vec::new(),
        }
    }

    pub fn coordinates(&self) -> Option<&[Coordinate]> {
        match &self.value {
            SelectionValue::Coordinates(coords) => Some(coords),
            SelectionValue::Reference(_) => None,
        }
    }

    /// The value to embed in a shareable link.
    ///
    /// Points carrying a spurious third component are cut back to
    /// `[lat, lon]` pairs; every other selection is passed through.
    pub fn link_value(&self) -> SelectionValue {
        match (&self.kind, &self.value) {
            (SelectionKind::Point, SelectionValue::Coordinates(coords))
                if coords.iter().any(|c| c.len() == 3) =>
            {
                SelectionValue::Coordinates(
                    coords.iter().map(|c| c.iter().copied().take(2).collect()).collect(),
                )
            }
            _ => self.value.clone(),
        }
    }

    /// Title for the modal window: the sorted names when there are any,
    /// otherwise formatted coordinates for points and lines.
    pub fn title(&self) -> String {
        if !self.names.is_empty() {
            let mut names = self.names.clone();
            names.sort();
            return names.join(", ");
        }
        match (self.kind, self.coordinates()) {
            (SelectionKind::Point, Some(coords)) => format_lat_lon(coords[0][0], coords[0][1]),
            (SelectionKind::Line, Some(coords)) => {
                let parts: Vec<String> =
                    coords.iter().map(|c| format_lat_lon(c[0], c[1])).collect();
                format!("({})", parts.join("), ("))
            }
            _ => String::new(),
        }
    }
}

/// `"12.5000 N, 63.2500 W"`.
pub fn format_lat_lon(latitude: f64, longitude: f64) -> String {
    format!(
        "{:.4} {}, {:.4} {}",
        latitude.abs(),
        if latitude >= 0.0 { "N" } else { "S" },
        longitude.abs(),
        if longitude >= 0.0 { "E" } else { "W" },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_short_coordinates() {
        let empty = SelectionValue::Coordinates(Vec::new());
        assert!(Selection::new(SelectionKind::Line, empty, Vec::new()).is_err());
        let short = SelectionValue::Coordinates(vec![vec![1.0]]);
        assert!(Selection::new(SelectionKind::Point, short, Vec::new()).is_err());
        let blank = SelectionValue::Reference("  ".to_string());
        assert!(Selection::new(SelectionKind::Class4, blank, Vec::new()).is_err());
    }

    #[test]
    fn point_link_value_drops_third_component() {
        let sel = Selection::new(
            SelectionKind::Point,
            SelectionValue::Coordinates(vec![vec![45.0, -63.0, 0.0]]),
            Vec::new(),
        )
        .unwrap();
        assert_eq!(
            sel.link_value(),
            SelectionValue::Coordinates(vec![vec![45.0, -63.0]])
        );
    }

    #[test]
    fn line_link_value_is_untouched() {
        let value = SelectionValue::Coordinates(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let sel = Selection::new(SelectionKind::Line, value.clone(), Vec::new()).unwrap();
        assert_eq!(sel.link_value(), value);
    }

    #[test]
    fn untagged_value_accepts_arrays_and_names() {
        let coords: SelectionValue = serde_json::from_str("[[1.5, 2.5]]").unwrap();
        assert_eq!(coords, SelectionValue::Coordinates(vec![vec![1.5, 2.5]]));
        let named: SelectionValue = serde_json::from_str("\"class4_20200101_GIOPS\"").unwrap();
        assert_eq!(named, SelectionValue::Reference("class4_20200101_GIOPS".to_string()));
    }

    #[test]
    fn titles() {
        assert_eq!(Selection::point(45.0, -63.5).title(), "45.0000 N, 63.5000 W");
        let named = Selection {
            names: vec!["b".to_string(), "a".to_string()],
            ..Selection::point(0.0, 0.0)
        };
        assert_eq!(named.title(), "a, b");
    }

    #[test]
    fn kind_parses_from_wire_key() {
        assert_eq!("class4".parse::<SelectionKind>().unwrap(), SelectionKind::Class4);
        assert!("polygon".parse::<SelectionKind>().is_err());
    }
}
