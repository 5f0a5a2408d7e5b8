//! Common error types for TDS analysis

use thiserror::Error;

/// Common result type for TDS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the curve engine and its front ends
#[derive(Error, Debug)]
pub enum Error {
    /// Raw trial record is missing data, has no timestamps, or has a
    /// non-positive duration
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Attribute vocabulary contains the same name twice
    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),

    /// Curves with different vocabularies or resolutions were combined
    #[error("Incompatible curves: {0}")]
    IncompatibleCurve(String),

    /// Merge requested over zero curves
    #[error("Cannot aggregate an empty set of curves")]
    EmptyAggregation,

    /// Invalid parameter (out-of-range time, zero resolution, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record or snapshot (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record file is not a readable YAML stream of records
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}
