//! Read-only entities returned by the remote catalog.

use serde::{Deserialize, Serialize};

use crate::view::{DatasetId, TimeIndex, VariableId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    /// Temporal resolution (`day`, `hour`, `month`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VariableId,
    pub name: String,
    /// Suggested colour range for the variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    pub id: TimeIndex,
    /// Human-readable instant, as supplied by the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Timestamp {
    pub fn new(id: TimeIndex) -> Self {
        Self { id, value: None }
    }
}
