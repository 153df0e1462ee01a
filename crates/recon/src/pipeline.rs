use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use merits_core::{CanonicalDataset, ConflictLog, EngineError, FormatTag, NormalizedRecord};
use merits_io::{detect_format, read_table};

use crate::config::EngineConfig;
use crate::normalize::{normalize_table, NormalizedTable, RejectedRecord};
use crate::reconcile::merge;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One uploaded file: a name hint for detection and reporting, the raw
/// bytes, and an optional caller-declared format that overrides detection.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub name: String,
    pub bytes: Vec<u8>,
    pub format: Option<FormatTag>,
}

impl FileInput {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into(), format: None }
    }

    pub fn with_format(mut self, format: FormatTag) -> Self {
        self.format = Some(format);
        self
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What happened to one file in a batch. A whole-file failure sets `error`
/// and contributes nothing; otherwise the counts, the resolved column map
/// and any per-row rejections describe the file's contribution.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub name: String,
    pub format: FormatTag,
    pub rows_read: usize,
    pub rows_merged: usize,
    pub rows_rejected: usize,
    pub columns: BTreeMap<String, String>,
    pub rejected: Vec<RejectedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EngineError>,
}

impl FileReport {
    fn failed(name: &str, format: FormatTag, error: EngineError) -> Self {
        Self {
            name: name.to_string(),
            format,
            rows_read: 0,
            rows_merged: 0,
            rows_rejected: 0,
            columns: BTreeMap::new(),
            rejected: Vec::new(),
            error: Some(error),
        }
    }
}

/// Outcome of one `ingest_batch` call: per-file reports in input order plus
/// the conflicts the merge phase resolved.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
    pub conflicts: ConflictLog,
}

impl BatchReport {
    /// Files that contributed nothing because of a whole-file failure.
    pub fn failed_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.error.is_some())
    }
}

// ---------------------------------------------------------------------------
// Batch ingestion
// ---------------------------------------------------------------------------

/// Run the full pipeline over a batch of uploaded files: parse and
/// normalize every file first, then merge each file's records in input
/// order. Infallible by design — every failure is data in the report, and a
/// broken file never blocks the rest of the batch.
pub fn ingest_batch(
    dataset: &mut CanonicalDataset,
    files: &[FileInput],
    config: &EngineConfig,
) -> BatchReport {
    // Accumulate phase: all parsing and normalization happens before any
    // mutation of the dataset, so adapter work could run per-file in
    // parallel without changing the conflict-resolution order.
    let mut staged: Vec<(FileReport, Vec<NormalizedRecord>)> = Vec::with_capacity(files.len());

    for file in files {
        let format = file.format.unwrap_or_else(|| detect_format(&file.name, &file.bytes));
        debug!(file = %file.name, %format, declared = file.format.is_some(), "ingesting file");

        let table = match read_table(&file.bytes, format) {
            Ok(table) => table,
            Err(error) => {
                warn!(file = %file.name, %error, "file contributes nothing");
                staged.push((FileReport::failed(&file.name, format, error), Vec::new()));
                continue;
            }
        };

        let rows_read = table.rows.len();
        match normalize_table(&table, config) {
            Ok(NormalizedTable { records, rejected, columns }) => {
                let report = FileReport {
                    name: file.name.clone(),
                    format,
                    rows_read,
                    rows_merged: records.len(),
                    rows_rejected: rejected.len(),
                    columns,
                    rejected,
                    error: None,
                };
                staged.push((report, records));
            }
            Err(error) => {
                warn!(file = %file.name, %error, "file contributes nothing");
                staged.push((FileReport::failed(&file.name, format, error), Vec::new()));
            }
        }
    }

    // Merge phase: sequential, in input order.
    let mut conflicts = ConflictLog::new();
    let mut reports = Vec::with_capacity(staged.len());
    for (report, records) in staged {
        let mut log = merge(dataset, records, &config.conflict);
        conflicts.append(&mut log);
        reports.push(report);
    }

    BatchReport { files: reports, conflicts }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn batch_merges_csv_files() {
        let f1 = FileInput::new(
            "january.csv",
            &b"Post URL,Date,Impressions\nhttp://a,2024-01-01,100\n"[..],
        );
        let f2 = FileInput::new(
            "february.csv",
            &b"Post URL,Date,Impressions\nhttp://a,2024-02-01,80\nhttp://b,2024-02-01,40\n"[..],
        );

        let mut dataset = CanonicalDataset::new();
        let report = ingest_batch(&mut dataset, &[f1, f2], &config());

        assert_eq!(dataset.len(), 3);
        assert!(report.conflicts.is_empty());
        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].rows_merged, 1);
        assert_eq!(report.files[1].rows_merged, 2);
    }

    #[test]
    fn declared_format_overrides_misleading_name() {
        let file = FileInput::new(
            "export.xlsx",
            &b"Post URL,Date,Impressions\nhttp://a,2024-01-01,100\n"[..],
        )
        .with_format(FormatTag::Csv);

        let mut dataset = CanonicalDataset::new();
        let report = ingest_batch(&mut dataset, &[file], &config());
        assert_eq!(report.files[0].format, FormatTag::Csv);
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn unreadable_file_fails_alone() {
        let bad = FileInput::new("corrupt.xlsx", &b"PK\x03\x04not actually a workbook"[..]);
        let good = FileInput::new(
            "good.csv",
            &b"Post URL,Date,Impressions\nhttp://a,2024-01-01,100\n"[..],
        );

        let mut dataset = CanonicalDataset::new();
        let report = ingest_batch(&mut dataset, &[bad, good], &config());

        assert_eq!(dataset.len(), 1);
        assert_eq!(report.failed_files().count(), 1);
        let failed = report.failed_files().next().unwrap();
        assert_eq!(failed.name, "corrupt.xlsx");
        assert!(matches!(failed.error, Some(EngineError::UnreadableFormat { .. })));
    }

    #[test]
    fn header_only_file_is_empty_input() {
        let file = FileInput::new("empty.csv", &b"Post URL,Date,Impressions\n"[..]);
        let mut dataset = CanonicalDataset::new();
        let report = ingest_batch(&mut dataset, &[file], &config());
        assert_eq!(report.files[0].error, Some(EngineError::EmptyInput));
        assert!(dataset.is_empty());
    }

    #[test]
    fn unmappable_header_fails_the_file() {
        let file = FileInput::new("odd.csv", &b"Foo,Bar\n1,2\n"[..]);
        let mut dataset = CanonicalDataset::new();
        let report = ingest_batch(&mut dataset, &[file], &config());
        assert_eq!(
            report.files[0].error,
            Some(EngineError::UnmappableField { field: "entity_id".into() })
        );
    }

    #[test]
    fn per_row_rejections_surface_in_report() {
        let file = FileInput::new(
            "mixed.csv",
            &b"Post URL,Date,Impressions\nhttp://a,2024-01-01,abc\nhttp://b,2024-01-01,50\n"[..],
        );
        let mut dataset = CanonicalDataset::new();
        let report = ingest_batch(&mut dataset, &[file], &config());

        let f = &report.files[0];
        assert_eq!(f.rows_read, 2);
        assert_eq!(f.rows_merged, 1);
        assert_eq!(f.rows_rejected, 1);
        assert_eq!(f.rejected[0].row, 1);
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn json_file_detected_and_merged() {
        let file = FileInput::new(
            "report.json",
            &br#"[{"post url": "http://a", "date": "2024-01-01", "clicks": 3}]"#[..],
        );
        let mut dataset = CanonicalDataset::new();
        let report = ingest_batch(&mut dataset, &[file], &config());
        assert_eq!(report.files[0].format, FormatTag::Json);
        assert_eq!(dataset.records().next().unwrap().clicks, Some(3));
    }

    #[test]
    fn overlap_across_files_is_logged() {
        let f1 = FileInput::new(
            "short_range.csv",
            &b"Post URL,Date,Impressions\nhttp://a,2024-01-01,100\n"[..],
        );
        let f2 = FileInput::new(
            "long_range.csv",
            &b"Post URL,Date,Impressions\nhttp://a,2024-01-01,120\n"[..],
        );

        let mut dataset = CanonicalDataset::new();
        let report = ingest_batch(&mut dataset, &[f1, f2], &config());

        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records().next().unwrap().impressions, Some(120));
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts.entries()[0].existing, "100");
    }
}
