//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::{RepositoryError, UpgradeRejected};

/// Errors of viewer admission and session setup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Rejected(#[from] UpgradeRejected),

    #[error("event '{0}' disappeared before the session started")]
    EventNotFound(String),

    #[error("failed to encode the initial snapshot: {0}")]
    Encode(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors of publishing, ingestion, status changes and live-data reads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveDataError {
    #[error("event '{0}' not found")]
    EventNotFound(String),

    #[error("race '{race_id}' not found in event '{event_id}'")]
    RaceNotFound { event_id: String, race_id: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
