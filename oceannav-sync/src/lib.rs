pub mod cascade;
pub mod client;
pub mod error;
pub mod memory;
pub mod navigator;

pub use cascade::{starting_window, CascadeGenerations, DatasetChangeCoordinator};
pub use client::CatalogClient;
pub use error::{CatalogError, SyncError};
pub use memory::InMemoryCatalog;
pub use navigator::{ModalClose, Navigator};

/// Convenience result type for the sync crate.
pub type Result<T> = std::result::Result<T, SyncError>;
