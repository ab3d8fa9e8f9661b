use thiserror::Error;

/// Errors surfaced by the queue engine's public API.
#[derive(Debug, Error)]
pub enum QueueError {
    /// `schedule()` was given a cron expression that failed to parse.
    #[error("invalid cron expression provided")]
    InvalidCron,

    /// A payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store rejected or failed an operation. Wraps the adapter's
    /// `anyhow::Error` unchanged.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}
