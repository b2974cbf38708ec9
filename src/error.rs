//! The crate-wide error type and result alias.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, TesseraError>;

/// Failure taxonomy of the execution core.
///
/// Ordering violations and exhaustion misuse indicate bugs in the caller or
/// planner, not in the data; they are never silently corrected. Upstream
/// storage failures are translated at iterator boundaries via
/// [`Lazy::on_error`](crate::iterator::Lazy::on_error).
#[derive(Debug, Clone, Error)]
pub enum TesseraError {
    /// A value cannot be represented in its key category's byte layout.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// A seek target or iterator composition would move a cursor backward.
    #[error("ordering violation: {0}")]
    OrderingViolation(&'static str),
    /// `next()` was called on an exhausted iterator.
    #[error("iterator exhausted")]
    Exhausted,
    /// The storage collaborator failed while scanning or reading.
    #[error("storage error: {0}")]
    Storage(String),
    /// A scheduling wait was interrupted, e.g. by worker pool shutdown.
    #[error("interrupted: {0}")]
    Interrupted(&'static str),
}
