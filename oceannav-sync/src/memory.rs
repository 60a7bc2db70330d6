//! A catalog held in memory, loaded from a JSON document.
//!
//! ```json
//! { "datasets": [
//!     { "id": "giops_day", "name": "GIOPS Daily", "quantum": "day",
//!       "variables": [{ "id": "votemper", "name": "Temperature" }],
//!       "timestamps": { "votemper": [2208988800, 2209075200] } } ] }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use oceannav_core::{Dataset, DatasetId, TimeIndex, Timestamp, Variable, VariableId};
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::CatalogClient;
use crate::error::CatalogError;

#[derive(Debug, Clone, Deserialize)]
struct CatalogEntry {
    #[serde(flatten)]
    dataset: Dataset,
    #[serde(default)]
    variables: Vec<Variable>,
    #[serde(default)]
    timestamps: BTreeMap<VariableId, Vec<TimeIndex>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InMemoryCatalog {
    datasets: Vec<CatalogEntry>,
}

impl InMemoryCatalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        debug!(datasets = catalog.datasets.len(), "Parsed catalog");
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&json)?;
        info!(
            "Loaded catalog with {} datasets from {}",
            catalog.datasets.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Add (or replace) a dataset.
    pub fn insert(
        &mut self,
        dataset: Dataset,
        variables: Vec<Variable>,
        timestamps: impl IntoIterator<Item = (VariableId, Vec<TimeIndex>)>,
    ) {
        self.datasets.retain(|e| e.dataset.id != dataset.id);
        self.datasets.push(CatalogEntry {
            dataset,
            variables,
            timestamps: timestamps.into_iter().collect(),
        });
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    fn entry(&self, dataset: &DatasetId) -> Result<&CatalogEntry, CatalogError> {
        self.datasets
            .iter()
            .find(|e| &e.dataset.id == dataset)
            .ok_or_else(|| CatalogError::UnknownDataset(dataset.clone()))
    }
}

impl CatalogClient for InMemoryCatalog {
    async fn list_datasets(&self) -> Result<Vec<Dataset>, CatalogError> {
        Ok(self.datasets.iter().map(|e| e.dataset.clone()).collect())
    }

    async fn list_variables(&self, dataset: &DatasetId) -> Result<Vec<Variable>, CatalogError> {
        Ok(self.entry(dataset)?.variables.clone())
    }

    async fn list_timestamps(
        &self,
        dataset: &DatasetId,
        variable: &VariableId,
    ) -> Result<Vec<Timestamp>, CatalogError> {
        let entry = self.entry(dataset)?;
        if !entry.variables.iter().any(|v| &v.id == variable) {
            return Err(CatalogError::UnknownVariable {
                dataset: dataset.clone(),
                variable: variable.clone(),
            });
        }
        let mut ids = entry.timestamps.get(variable).cloned().unwrap_or_default();
        ids.sort_unstable();
        Ok(ids.into_iter().map(Timestamp::new).collect())
    }
}
