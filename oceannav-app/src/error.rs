use oceannav_core::CoreError;
use oceannav_sync::SyncError;
use thiserror::Error;

/// Errors surfaced to the shell user. None of them end the session.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("empty command")]
    EmptyCommand,

    #[error("unknown command: {0} (try `help`)")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid JSON argument: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub type Result<T> = std::result::Result<T, AppError>;
