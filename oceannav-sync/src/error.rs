use oceannav_core::{CoreError, DatasetId, Panel, VariableId};
use thiserror::Error;

/// Errors reported by a catalog backend.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown dataset: {0}")]
    UnknownDataset(DatasetId),

    #[error("dataset {dataset} has no variable {variable}")]
    UnknownVariable {
        dataset: DatasetId,
        variable: VariableId,
    },

    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors from synchronizing state with the catalog.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("dataset {0} lists no variables")]
    NoVariables(DatasetId),

    #[error("dataset {dataset} lists no timestamps for {variable}")]
    NoTimestamps {
        dataset: DatasetId,
        variable: VariableId,
    },

    /// A newer dataset change for the same panel started while this one
    /// was waiting on the catalog.
    #[error("{panel} change to {dataset} was superseded")]
    Superseded { panel: Panel, dataset: DatasetId },
}

impl SyncError {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded { .. })
    }
}
