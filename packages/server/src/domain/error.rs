//! ドメイン層のエラー型

use thiserror::Error;

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("event id must not be empty")]
    EventIdEmpty,

    #[error("event id is too long ({0} characters)")]
    EventIdTooLong(usize),

    #[error("event id contains invalid characters: '{0}'")]
    EventIdInvalidCharacter(String),
}

/// Persistent store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Reasons for refusing a WebSocket upgrade.
///
/// Always decided before any connection state is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpgradeRejected {
    /// Unknown event, or an event still in draft
    #[error("event not found")]
    NotFound,

    /// The event is official; no further live updates will be published
    #[error("event is official, live updates have ended")]
    Gone,

    /// The room already holds `capacity` viewers
    #[error("room is full (capacity {capacity})")]
    OverCapacity { capacity: usize },
}
