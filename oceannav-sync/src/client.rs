use std::future::Future;

use oceannav_core::{Dataset, DatasetId, Timestamp, Variable, VariableId};

use crate::error::CatalogError;

/// Read-only access to the dataset catalog.
///
/// Lookups are the only suspension points of a dataset-change cascade.
/// Implementations are free to go over the network; the futures need not
/// be `Send`.
pub trait CatalogClient {
    fn list_datasets(&self) -> impl Future<Output = Result<Vec<Dataset>, CatalogError>>;

    /// Variables of `dataset`, in catalog order.
    fn list_variables(
        &self,
        dataset: &DatasetId,
    ) -> impl Future<Output = Result<Vec<Variable>, CatalogError>>;

    /// Timestamps of `variable` in `dataset`, oldest first.
    fn list_timestamps(
        &self,
        dataset: &DatasetId,
        variable: &VariableId,
    ) -> impl Future<Output = Result<Vec<Timestamp>, CatalogError>>;
}
