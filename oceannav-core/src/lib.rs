pub mod action;
pub mod catalog;
pub mod error;
pub mod options;
pub mod patch;
pub mod permalink;
pub mod scale;
pub mod selection;
pub mod state;
pub mod store;
pub mod subset;
pub mod swap;
pub mod view;

// Re-export primary types for convenience.
pub use action::{
    dispatch, dispatch_named, Action, ActionName, Dispatch, InteractionMode, MapCommand,
    MapTarget, PointSource,
};
pub use catalog::{Dataset, Timestamp, Variable};
pub use error::CoreError;
pub use options::{BathyContour, InterpolationMethod, Options, OptionsPatch};
pub use patch::{StatePatch, UiPatch, ViewPatch};
pub use permalink::{
    decode, encode, try_decode, PermalinkFlags, PermalinkKey, PermalinkToken, SelectionToken,
    SettingsToken,
};
pub use scale::ScaleRange;
pub use selection::{Coordinate, Selection, SelectionKind, SelectionValue};
pub use state::{AppState, UiState};
pub use store::{ApplyOutcome, DatasetChange, ViewStateStore};
pub use subset::{
    bounding_box, BoundingBox, OutputFormat, ScriptLanguage, SubsetArea, SubsetRequest,
};
pub use swap::swap_views;
pub use view::{CompareState, DatasetId, Panel, QuiverVariable, TimeIndex, VariableId, ViewState};

/// Convenience result type for the core crate.
pub type Result<T> = std::result::Result<T, CoreError>;
