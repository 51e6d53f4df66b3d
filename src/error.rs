//! Error taxonomy for the review pipeline.

use thiserror::Error;

/// Errors raised by the review pipeline.
///
/// Pipeline stages fail fast with the variant matching their concern; the
/// CLI boundary renders these as user-facing messages, while library callers
/// receive them unmodified.
#[derive(Error, Debug)]
pub enum ReviewerError {
    /// Configuration file is malformed or fails validation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Template file is missing, malformed, or incomplete.
    #[error("template error: {0}")]
    Template(String),

    /// Repository validation or git operation failure.
    #[error("git repository error: {0}")]
    GitRepository(String),

    /// Fatal context-file condition (per-file read errors are downgraded to
    /// inline markers and never reach this variant).
    #[error("context error: {0}")]
    Context(String),

    /// The external model execution tool failed to start or returned
    /// unusable output.
    #[error("dispatcher error: {0}")]
    Dispatcher(String),
}

/// Result type used throughout the review pipeline.
pub type Result<T> = std::result::Result<T, ReviewerError>;
