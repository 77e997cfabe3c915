use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MatchError {
    /// The report lacks a field every comparison needs.
    #[error("report {id} cannot be compared: {reason}")]
    InvalidReport { id: Uuid, reason: String },

    #[error("invalid match configuration: {0}")]
    Config(String),

    #[error("item store error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("blocking store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
