use thiserror::Error;

/// Errors originating from the state model and its codecs.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid scale range: {0:?} (expected \"auto\" or \"min,max\")")]
    InvalidScale(String),

    #[error("invalid selection: {reason}")]
    InvalidSelection { reason: String },

    #[error("unknown state key: {0}")]
    UnknownStateKey(String),

    #[error("invalid value for state key {key}: {source}")]
    InvalidStateValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed permalink: {reason}")]
    MalformedPermalink { reason: String },

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error("invalid argument for action {action}: {reason}")]
    InvalidActionArgument { action: String, reason: String },

    #[error("output format {format} is not available for dataset {dataset}")]
    UnavailableFormat { format: String, dataset: String },

    #[error("subset area polygon has no vertices")]
    EmptyArea,

    #[error("subset request selects no variables")]
    NoSubsetVariables,
}
