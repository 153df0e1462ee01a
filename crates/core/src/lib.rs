//! `merits-core` — Canonical data model for the ingestion engine.
//!
//! Shared types only: raw adapter output, normalized records, the
//! reconciled dataset, the conflict log, and the engine error type.
//! No parsing, no IO.

pub mod error;
pub mod model;

pub use error::{EngineError, Result};
pub use model::{
    CanonicalDataset, ConflictEntry, ConflictLog, DimensionField, FormatTag, KeptSide,
    MetricField, NormalizedRecord, RawRecord, RawTable, RawValue, RecordKey,
};
