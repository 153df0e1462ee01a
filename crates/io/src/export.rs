// Deterministic CSV export of the reconciled dataset

use merits_core::{CanonicalDataset, EngineError, NormalizedRecord, Result};

/// Canonical export header. These names are themselves accepted aliases, so
/// exported files re-ingest without configuration.
pub const EXPORT_COLUMNS: [&str; 8] = [
    "entity_id",
    "date",
    "impressions",
    "engagements",
    "clicks",
    "leads",
    "campaign",
    "content_type",
];

/// Render the dataset as CSV bytes: one row per record in key order
/// (entity_id, then date), ISO dates, absent values as empty fields, a
/// trailing newline after the last row. The same dataset always yields the
/// same bytes.
pub fn export_csv(dataset: &CanonicalDataset) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_COLUMNS).map_err(|e| export_err(&e))?;

    for record in dataset.records() {
        writer
            .write_record(record_fields(record))
            .map_err(|e| export_err(&e))?;
    }

    writer.into_inner().map_err(|e| export_err(&e))
}

fn record_fields(record: &NormalizedRecord) -> [String; 8] {
    [
        record.entity_id.clone(),
        record.date.format("%Y-%m-%d").to_string(),
        metric_cell(record.impressions),
        metric_cell(record.engagements),
        metric_cell(record.clicks),
        metric_cell(record.leads),
        record.campaign.clone().unwrap_or_default(),
        record.content_type.clone().unwrap_or_default(),
    ]
}

fn metric_cell(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn export_err(e: &dyn std::fmt::Display) -> EngineError {
    EngineError::Export { reason: e.to_string() }
}
