use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, warn};

use merits_core::{
    DimensionField, EngineError, MetricField, NormalizedRecord, RawTable, RawValue, Result,
};

use crate::config::{AliasTable, EngineConfig};

// ---------------------------------------------------------------------------
// Normalized table
// ---------------------------------------------------------------------------

/// One rejected source row: its 1-based position among the data rows, and
/// why it was refused.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    pub row: usize,
    pub error: EngineError,
}

/// Output of normalizing one raw table: the records that passed, the rows
/// that were rejected (the file continues past them), and which source
/// header each canonical field was read from.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedTable {
    pub records: Vec<NormalizedRecord>,
    pub rejected: Vec<RejectedRecord>,
    pub columns: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Engagement component columns, read only to synthesize a total when no
/// direct engagements column exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComponentField {
    Likes,
    Comments,
    Shares,
}

impl ComponentField {
    const ALL: [ComponentField; 3] = [
        ComponentField::Likes,
        ComponentField::Comments,
        ComponentField::Shares,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Likes => "likes",
            Self::Comments => "comments",
            Self::Shares => "shares",
        }
    }

    fn variants(self, aliases: &AliasTable) -> &[String] {
        match self {
            Self::Likes => &aliases.likes,
            Self::Comments => &aliases.comments,
            Self::Shares => &aliases.shares,
        }
    }
}

/// Header positions for every canonical field that resolved. Built once per
/// table; rows index into it positionally.
#[derive(Debug)]
struct ResolvedColumns {
    entity_id: usize,
    date: usize,
    metrics: [Option<usize>; 4],
    dimensions: [Option<usize>; 2],
    components: [Option<usize>; 3],
}

impl ResolvedColumns {
    fn metric(&self, field: MetricField) -> Option<usize> {
        self.metrics[field as usize]
    }

    fn dimension(&self, field: DimensionField) -> Option<usize> {
        self.dimensions[field as usize]
    }

    fn component(&self, field: ComponentField) -> Option<usize> {
        self.components[field as usize]
    }

    /// Canonical field → source header actually used, for the file report.
    fn mapping(&self, columns: &[String]) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let mut put = |name: &str, idx: usize| {
            if let Some(header) = columns.get(idx) {
                map.insert(name.to_string(), header.clone());
            }
        };
        put("entity_id", self.entity_id);
        put("date", self.date);
        for field in MetricField::ALL {
            if let Some(idx) = self.metric(field) {
                put(field.name(), idx);
            }
        }
        for field in DimensionField::ALL {
            if let Some(idx) = self.dimension(field) {
                put(field.name(), idx);
            }
        }
        for field in ComponentField::ALL {
            if let Some(idx) = self.component(field) {
                put(field.name(), idx);
            }
        }
        map
    }
}

/// Fold to the form aliases match against: lowercase, no whitespace, no
/// underscores. `"Post URL"`, `"post_url"` and `"POST URL "` all collapse to
/// `"posturl"`.
fn fold_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Match one canonical field's variants against the folded headers. Exact
/// equality first, then substring containment (variant inside header) to
/// absorb decorated headers like `"Impressions (organic)"`. Within a pass,
/// earlier variants outrank later ones, earlier columns outrank later ones.
fn resolve_slot(folded: &[String], variants: &[String]) -> Option<usize> {
    for variant in variants {
        let folded_variant = fold_header(variant);
        if folded_variant.is_empty() {
            continue;
        }
        if let Some(idx) = folded.iter().position(|h| *h == folded_variant) {
            return Some(idx);
        }
    }
    for variant in variants {
        let folded_variant = fold_header(variant);
        if folded_variant.is_empty() {
            continue;
        }
        if let Some(idx) = folded.iter().position(|h| h.contains(&folded_variant)) {
            return Some(idx);
        }
    }
    None
}

fn resolve_columns(columns: &[String], aliases: &AliasTable) -> Result<ResolvedColumns> {
    let folded: Vec<String> = columns.iter().map(|c| fold_header(c)).collect();

    let required = |variants: &[String], name: &str| {
        resolve_slot(&folded, variants).ok_or_else(|| EngineError::UnmappableField {
            field: name.to_string(),
        })
    };

    let entity_id = required(&aliases.entity_id, "entity_id")?;
    let date = required(&aliases.date, "date")?;

    let mut metrics = [None; 4];
    for field in MetricField::ALL {
        metrics[field as usize] = resolve_slot(&folded, aliases.metric_variants(field));
    }
    let mut dimensions = [None; 2];
    for field in DimensionField::ALL {
        dimensions[field as usize] = resolve_slot(&folded, aliases.dimension_variants(field));
    }
    let mut components = [None; 3];
    for field in ComponentField::ALL {
        components[field as usize] = resolve_slot(&folded, field.variants(aliases));
    }

    Ok(ResolvedColumns { entity_id, date, metrics, dimensions, components })
}

// ---------------------------------------------------------------------------
// Value coercion
// ---------------------------------------------------------------------------

/// Parse a date cell against the configured patterns, first match wins.
/// Each pattern is tried as a datetime (truncated to its date part) and as a
/// date, so ISO timestamps from spreadsheet cells normalize cleanly.
fn coerce_date(value: &RawValue, formats: &[String]) -> Result<NaiveDate> {
    let text = value.render();
    for pattern in formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, pattern) {
            return Ok(dt.date());
        }
        if let Ok(d) = NaiveDate::parse_from_str(&text, pattern) {
            return Ok(d);
        }
    }
    Err(EngineError::InvalidDate { value: text })
}

/// Coerce a metric cell: blank → absent, numbers truncate toward zero,
/// numeric text parses (digit-grouping commas accepted in strict
/// `1,234,567` form only), anything negative or non-numeric is refused.
fn coerce_metric(value: &RawValue, field: &str) -> Result<Option<u64>> {
    let invalid = || EngineError::InvalidMetricValue {
        field: field.to_string(),
        value: value.render(),
    };

    let number = match value {
        RawValue::Empty => return Ok(None),
        RawValue::Number(n) => *n,
        RawValue::Text(s) => {
            let text = s.trim();
            if text.is_empty() {
                return Ok(None);
            }
            let ungrouped = strip_digit_grouping(text);
            ungrouped.parse::<f64>().map_err(|_| invalid())?
        }
    };

    if !number.is_finite() || number < 0.0 {
        return Err(invalid());
    }
    Ok(Some(number.trunc() as u64))
}

/// Remove commas only when they form a strict thousands grouping
/// (`1,234,567`); otherwise return the text unchanged and let the numeric
/// parse decide.
fn strip_digit_grouping(text: &str) -> String {
    let mut parts = text.split(',');
    let first = parts.next().unwrap_or("");
    if first.is_empty() || first.len() > 3 || !first.chars().all(|c| c.is_ascii_digit()) {
        return text.to_string();
    }
    let mut rest = 0usize;
    for part in parts {
        if part.len() != 3 || !part.chars().all(|c| c.is_ascii_digit()) {
            return text.to_string();
        }
        rest += 1;
    }
    if rest == 0 {
        return text.to_string();
    }
    text.replace(',', "")
}

fn dimension_value(value: &RawValue) -> Option<String> {
    if value.is_blank() {
        None
    } else {
        Some(value.render())
    }
}

// ---------------------------------------------------------------------------
// Table normalization
// ---------------------------------------------------------------------------

/// Normalize one raw table into canonical records. Fails as a whole only
/// when a required field cannot be resolved from the header; individual bad
/// rows land in `rejected` and the rest of the file continues.
pub fn normalize_table(table: &RawTable, config: &EngineConfig) -> Result<NormalizedTable> {
    let resolved = resolve_columns(&table.columns, &config.aliases)?;
    let columns = resolved.mapping(&table.columns);
    debug!(mapped = columns.len(), "resolved source columns");

    let mut records = Vec::with_capacity(table.rows.len());
    let mut rejected = Vec::new();

    for (i, row) in table.rows.iter().enumerate() {
        match normalize_row(table, row, &resolved, config) {
            Ok(record) => records.push(record),
            Err(error) => {
                warn!(row = i + 1, %error, "rejected record");
                rejected.push(RejectedRecord { row: i + 1, error });
            }
        }
    }

    Ok(NormalizedTable { records, rejected, columns })
}

fn normalize_row(
    table: &RawTable,
    row: &merits_core::RawRecord,
    resolved: &ResolvedColumns,
    config: &EngineConfig,
) -> Result<NormalizedRecord> {
    let cell = |idx: usize| table.cell(row, idx);

    let entity_id = cell(resolved.entity_id).render();
    if entity_id.is_empty() {
        return Err(EngineError::MissingEntityId);
    }
    let date = coerce_date(cell(resolved.date), &config.date_formats)?;

    let mut record = NormalizedRecord::new(entity_id, date);
    for field in MetricField::ALL {
        if let Some(idx) = resolved.metric(field) {
            record.set_metric(field, coerce_metric(cell(idx), field.name())?);
        }
    }

    // No engagements column anywhere: total engagements is the sum of
    // whatever component columns resolved, plus clicks. All contributors
    // absent leaves the field absent, never a fabricated zero.
    if resolved.metric(MetricField::Engagements).is_none() {
        let mut total: Option<u64> = None;
        for component in ComponentField::ALL {
            if let Some(idx) = resolved.component(component) {
                if let Some(v) = coerce_metric(cell(idx), component.name())? {
                    total = Some(total.unwrap_or(0).saturating_add(v));
                }
            }
        }
        if let Some(clicks) = record.clicks {
            total = Some(total.unwrap_or(0).saturating_add(clicks));
        }
        record.engagements = total;
    }

    for field in DimensionField::ALL {
        if let Some(idx) = resolved.dimension(field) {
            record.set_dimension(field, dimension_value(cell(idx)));
        }
    }

    Ok(record)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
