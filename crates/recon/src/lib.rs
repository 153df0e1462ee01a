//! `merits-recon` — Schema normalization, reconciliation and KPI derivation.
//!
//! Pure engine crate: receives raw file bytes plus configuration, returns
//! the reconciled dataset, conflict log, reports and KPI summaries. The
//! dashboard layer holds the current dataset snapshot; nothing in here is
//! global or touches the filesystem.

pub mod config;
pub mod kpi;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;

pub use config::{AliasTable, ConflictConfig, DimensionPolicy, EngineConfig, NumericPolicy};
pub use kpi::{compute_kpis, daily_series, DailyTotals, DatasetFilter, KpiSummary};
pub use normalize::{normalize_table, NormalizedTable, RejectedRecord};
pub use pipeline::{ingest_batch, BatchReport, FileInput, FileReport};
pub use reconcile::merge;
