use serde::Serialize;
use thiserror::Error;

use crate::model::FormatTag;

/// Convenience alias used across the engine crates.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Every failure the engine can report. Adapter variants annul a whole
/// file; normalizer variants reject a single record. Nothing here is ever
/// allowed to take down the embedding application.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineError {
    /// The bytes could not be parsed as the declared or detected format.
    #[error("unreadable {format} input: {reason}")]
    UnreadableFormat { format: FormatTag, reason: String },

    /// A header parsed but no data rows followed.
    #[error("input contains no data rows")]
    EmptyInput,

    /// No source column maps onto a required canonical field.
    #[error("no source column maps to required field '{field}'")]
    UnmappableField { field: String },

    /// The entity identifier cell is blank, so the record cannot be keyed.
    #[error("record has no entity identifier")]
    MissingEntityId,

    /// The date cell matched none of the configured patterns.
    #[error("cannot parse date '{value}'")]
    InvalidDate { value: String },

    /// A metric cell is neither blank nor a non-negative number.
    #[error("invalid value '{value}' for metric '{field}'")]
    InvalidMetricValue { field: String, value: String },

    /// Engine configuration failed validation.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// The export writer failed. Unreachable for in-memory sinks.
    #[error("export failed: {reason}")]
    Export { reason: String },
}

impl EngineError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config { reason: reason.into() }
    }

    /// True for the per-record taxonomy; false for whole-file failures.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            Self::MissingEntityId | Self::InvalidDate { .. } | Self::InvalidMetricValue { .. }
        )
    }
}
