//! Error types for pinecone-migrate.

use thiserror::Error;

/// Result type alias for migration and index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the index clients, the embedder and the pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credentials rejected by the remote service.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The service asked us to slow down (retry-after seconds).
    #[error("Rate limited, retry after {0}s")]
    RateLimit(u64),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the remote service.
    #[error("{service} returned {status}: {body}")]
    Service {
        /// Service that produced the response.
        service: String,
        /// HTTP status code.
        status: u16,
        /// Response body, as received.
        body: String,
    },

    /// The named index does not exist under the current credentials.
    #[error("Index '{0}' not found")]
    IndexNotFound(String),

    /// The source index configuration could not be read.
    #[error("Could not read configuration of source index '{index}': {reason}")]
    SourceDescribe {
        /// Source index name.
        index: String,
        /// Underlying failure.
        reason: String,
    },

    /// Vector or index dimension differs from the one required.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Required dimension (source index, or the index being written).
        expected: usize,
        /// Dimension found (destination index, or the offending vector).
        actual: usize,
    },

    /// The index topology cannot enumerate record ids.
    #[error("Index '{0}' does not support listing record ids")]
    ListingUnsupported(String),

    /// The destination index did not become ready in time.
    #[error("Index '{index}' not ready after {waited_secs}s")]
    ReadinessTimeout {
        /// Index being provisioned.
        index: String,
        /// Seconds spent polling.
        waited_secs: u64,
    },

    /// Embedding service failure.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Interactive prompt failure.
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// JSON (de)serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true for errors that abort the whole run before any transfer.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Authentication(_)
                | Self::IndexNotFound(_)
                | Self::SourceDescribe { .. }
                | Self::DimensionMismatch { .. }
                | Self::ReadinessTimeout { .. }
        )
    }
}
