// Structured-record adapter: JSON arrays of objects, plus NDJSON

use merits_core::{EngineError, FormatTag, RawRecord, RawTable, RawValue, Result};
use serde_json::{Map, Value};
use tracing::debug;

/// Parse JSON bytes into a raw table. Accepts a top-level array of flat
/// objects, a single top-level object (one record), or newline-delimited
/// objects when whole-document parsing fails. Object keys become columns
/// in first-seen order, unioned across records.
pub fn parse(bytes: &[u8]) -> Result<RawTable> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| unreadable(format!("invalid UTF-8: {e}")))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text).trim();

    let records = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => {
            let mut records = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                match item {
                    Value::Object(map) => records.push(map),
                    other => {
                        return Err(unreadable(format!(
                            "element {i} is not an object ({})",
                            kind_name(&other)
                        )))
                    }
                }
            }
            records
        }
        Ok(Value::Object(map)) => vec![map],
        Ok(other) => {
            return Err(unreadable(format!(
                "top level must be an array of objects, got {}",
                kind_name(&other)
            )))
        }
        Err(doc_err) => parse_lines(text, &doc_err)?,
    };

    if records.is_empty() {
        return Err(EngineError::EmptyInput);
    }

    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    let rows: Vec<RawRecord> = records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|column| record.get(column).map_or(RawValue::Empty, scalar_value))
                .collect()
        })
        .collect();

    debug!(columns = columns.len(), rows = rows.len(), "parsed record table");
    Ok(RawTable { columns, rows })
}

/// One object per non-blank line. Any bad line fails the file; the original
/// whole-document error is kept in the message for context.
fn parse_lines(text: &str, doc_err: &serde_json::Error) -> Result<Vec<Map<String, Value>>> {
    let mut records = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => records.push(map),
            _ => {
                return Err(unreadable(format!(
                    "neither a JSON document ({doc_err}) nor newline-delimited records (line {})",
                    line_no + 1
                )))
            }
        }
    }
    Ok(records)
}

fn unreadable(reason: String) -> EngineError {
    EngineError::UnreadableFormat { format: FormatTag::Json, reason }
}

fn scalar_value(value: &Value) -> RawValue {
    match value {
        Value::Null => RawValue::Empty,
        Value::Bool(b) => RawValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Value::Number(n) => match n.as_f64() {
            Some(f) => RawValue::Number(f),
            None => RawValue::Text(n.to_string()),
        },
        Value::String(s) => {
            if s.trim().is_empty() {
                RawValue::Empty
            } else {
                RawValue::Text(s.clone())
            }
        }
        // Nested values carry through as compact JSON text; metric coercion
        // rejects them later instead of guessing.
        other => RawValue::Text(other.to_string()),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
