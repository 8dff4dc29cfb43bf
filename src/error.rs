//! Error types for shopmind

use thiserror::Error;

/// Main error type for shopmind
#[derive(Debug, Error)]
pub enum Error {
    /// Input failed schema or length bounds (chat message, rating value, wishlist payload).
    #[error("validation error: {0}")]
    Validation(String),

    /// The analyzer raised an exception while classifying intent / extracting requirements.
    #[error("analyzer failure: {0}")]
    AnalyzerFailure(String),

    /// The catalog gateway returned no usable results or exhausted its retries.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The catalog gateway returned HTTP 429; retryable up to the configured limit.
    #[error("upstream rate limited: {0}")]
    UpstreamRateLimited(String),

    /// The catalog or generative provider rejected credentials (HTTP 401). Fatal, not retried.
    #[error("upstream auth failed: {0}")]
    UpstreamAuth(String),

    /// A model reply could not be parsed as the expected JSON shape.
    #[error("model response invalid: {0}")]
    ModelResponseInvalid(String),

    /// A chat turn exceeded its soft deadline.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// A wishlist/rating/purchase lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness or capacity invariant was violated (duplicate wishlist item, wishlist full).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The account is inactive.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A guarded operation was attempted without a valid bearer identity.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Database-related errors not already covered by `Sql`.
    #[error("database error: {0}")]
    Database(String),

    /// Configuration errors (missing/invalid environment variables).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQL errors.
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Reqwest HTTP client errors.
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Generic errors.
    #[error("{0}")]
    Other(String),
}

/// Result type alias for shopmind operations
pub type Result<T> = std::result::Result<T, Error>;
