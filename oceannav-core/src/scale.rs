use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Colour scale applied to a panel's variable.
///
/// On the wire this is either the literal `"auto"` or a `"min,max"` string,
/// so it is serialized through its `Display`/`FromStr` pair rather than as a
/// structured value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleRange {
    /// Let the plotting backend pick the range from the data.
    Auto,
    /// Fixed range.
    Range { min: f64, max: f64 },
}

impl ScaleRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self::Range { min, max }
    }

    /// Range bounds, or `None` for [`ScaleRange::Auto`].
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match *self {
            Self::Auto => None,
            Self::Range { min, max } => Some((min, max)),
        }
    }
}

impl Default for ScaleRange {
    fn default() -> Self {
        Self::Range {
            min: -5.0,
            max: 30.0,
        }
    }
}

impl fmt::Display for ScaleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Range { min, max } => write!(f, "{min},{max}"),
        }
    }
}

impl FromStr for ScaleRange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let invalid = || CoreError::InvalidScale(s.to_string());
        let (min, max) = trimmed.split_once(',').ok_or_else(invalid)?;
        let min: f64 = min.trim().parse().map_err(|_| invalid())?;
        let max: f64 = max.trim().parse().map_err(|_| invalid())?;
        if !min.is_finite() || !max.is_finite() {
            return Err(invalid());
        }
        Ok(Self::Range { min, max })
    }
}

impl Serialize for ScaleRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ScaleRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
