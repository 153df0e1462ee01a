use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Raw adapter output
// ---------------------------------------------------------------------------

/// A single untyped cell as produced by a format adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Empty,
}

impl RawValue {
    /// True for `Empty` and for text that is blank after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Display form: trimmed text, integers without a fractional part.
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => render_number(*n),
            Self::Empty => String::new(),
        }
    }
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 9e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// One row of adapter output, positionally aligned with `RawTable::columns`.
pub type RawRecord = Vec<RawValue>;

/// Untyped table from a single input file. Column names come verbatim from
/// the source; rows may be shorter than the header (missing cells read as
/// `Empty`).
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl RawTable {
    pub fn cell<'a>(&self, row: &'a RawRecord, column: usize) -> &'a RawValue {
        row.get(column).unwrap_or(&RawValue::Empty)
    }
}

// ---------------------------------------------------------------------------
// Format tags
// ---------------------------------------------------------------------------

/// Input format, either declared by the caller or detected from the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatTag {
    Csv,
    Xlsx,
    Json,
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Xlsx => write!(f, "xlsx"),
            Self::Json => write!(f, "json"),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical schema
// ---------------------------------------------------------------------------

/// The four canonical metric fields, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    Impressions,
    Engagements,
    Clicks,
    Leads,
}

impl MetricField {
    pub const ALL: [MetricField; 4] = [
        MetricField::Impressions,
        MetricField::Engagements,
        MetricField::Clicks,
        MetricField::Leads,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Impressions => "impressions",
            Self::Engagements => "engagements",
            Self::Clicks => "clicks",
            Self::Leads => "leads",
        }
    }
}

impl std::fmt::Display for MetricField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Optional descriptive fields, resolved per-field during merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionField {
    Campaign,
    ContentType,
}

impl DimensionField {
    pub const ALL: [DimensionField; 2] = [DimensionField::Campaign, DimensionField::ContentType];

    pub fn name(self) -> &'static str {
        match self {
            Self::Campaign => "campaign",
            Self::ContentType => "content_type",
        }
    }
}

impl std::fmt::Display for DimensionField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Normalized records
// ---------------------------------------------------------------------------

/// Dataset key = (entity_id, date). Dimension fields are record content,
/// not key components, so files disagreeing on a dimension still collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordKey {
    pub entity_id: String,
    pub date: NaiveDate,
}

/// One record in the canonical schema. Absent metrics stay `None`;
/// absence is distinct from zero everywhere downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub entity_id: String,
    pub date: NaiveDate,
    pub impressions: Option<u64>,
    pub engagements: Option<u64>,
    pub clicks: Option<u64>,
    pub leads: Option<u64>,
    pub campaign: Option<String>,
    pub content_type: Option<String>,
}

impl NormalizedRecord {
    pub fn new(entity_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            entity_id: entity_id.into(),
            date,
            impressions: None,
            engagements: None,
            clicks: None,
            leads: None,
            campaign: None,
            content_type: None,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            entity_id: self.entity_id.clone(),
            date: self.date,
        }
    }

    pub fn metric(&self, field: MetricField) -> Option<u64> {
        match field {
            MetricField::Impressions => self.impressions,
            MetricField::Engagements => self.engagements,
            MetricField::Clicks => self.clicks,
            MetricField::Leads => self.leads,
        }
    }

    pub fn set_metric(&mut self, field: MetricField, value: Option<u64>) {
        match field {
            MetricField::Impressions => self.impressions = value,
            MetricField::Engagements => self.engagements = value,
            MetricField::Clicks => self.clicks = value,
            MetricField::Leads => self.leads = value,
        }
    }

    pub fn dimension(&self, field: DimensionField) -> Option<&str> {
        match field {
            DimensionField::Campaign => self.campaign.as_deref(),
            DimensionField::ContentType => self.content_type.as_deref(),
        }
    }

    pub fn set_dimension(&mut self, field: DimensionField, value: Option<String>) {
        match field {
            DimensionField::Campaign => self.campaign = value,
            DimensionField::ContentType => self.content_type = value,
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical dataset
// ---------------------------------------------------------------------------

/// The reconciled dataset: at most one record per key, iterated in key
/// order (entity_id, then date). Mutated only through merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalDataset {
    records: BTreeMap<RecordKey, NormalizedRecord>,
}

impl CanonicalDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &RecordKey) -> Option<&NormalizedRecord> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &RecordKey) -> Option<&mut NormalizedRecord> {
        self.records.get_mut(key)
    }

    /// Inserts under the record's own key, replacing any existing record.
    pub fn insert(&mut self, record: NormalizedRecord) {
        self.records.insert(record.key(), record);
    }

    pub fn records(&self) -> impl Iterator<Item = &NormalizedRecord> {
        self.records.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &NormalizedRecord)> {
        self.records.iter()
    }
}

impl Serialize for CanonicalDataset {
    /// Serializes as an ordered array of records; the struct key cannot be
    /// a JSON object key.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.values())
    }
}

// ---------------------------------------------------------------------------
// Conflict log
// ---------------------------------------------------------------------------

/// Which side of a conflicting pair survived the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeptSide {
    Existing,
    Incoming,
}

impl std::fmt::Display for KeptSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Existing => write!(f, "existing"),
            Self::Incoming => write!(f, "incoming"),
        }
    }
}

/// One resolved disagreement: both candidate values in display form, plus
/// which side the policy kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictEntry {
    pub entity_id: String,
    pub date: NaiveDate,
    pub field: String,
    pub existing: String,
    pub incoming: String,
    pub kept: KeptSide,
}

/// Append-only record of every disagreement a merge resolved, in merge
/// order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConflictLog {
    entries: Vec<ConflictEntry>,
}

impl ConflictLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: ConflictEntry) {
        self.entries.push(entry);
    }

    /// Moves all entries from `other` onto the end of this log.
    pub fn append(&mut self, other: &mut ConflictLog) {
        self.entries.append(&mut other.entries);
    }

    pub fn entries(&self) -> &[ConflictEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConflictEntry> {
        self.entries.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
