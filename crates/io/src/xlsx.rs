// Spreadsheet adapter: xlsx, xls, xlsb, ods (read-only)

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::NaiveTime;
use merits_core::{EngineError, FormatTag, RawRecord, RawTable, RawValue, Result};
use tracing::{debug, warn};

/// Column cap; cells beyond it are dropped.
const MAX_COLS: usize = 256;

/// Parse workbook bytes into a raw table. The container kind (zip or OLE2)
/// is autodetected; the first sheet holding any data is read, first row as
/// header.
pub fn parse(bytes: &[u8]) -> Result<RawTable> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| unreadable(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    if sheet_names.is_empty() {
        return Err(EngineError::EmptyInput);
    }

    // Exporters occasionally lead with a blank cover sheet; skip to the
    // first sheet with data.
    for name in &sheet_names {
        let range = workbook
            .worksheet_range(name)
            .map_err(|e| unreadable(format!("sheet '{name}': {e}")))?;
        let (height, width) = range.get_size();
        if height == 0 || width == 0 {
            continue;
        }
        if width > MAX_COLS {
            warn!(sheet = %name, width, "column count exceeds cap, extra columns dropped");
        }
        return table_from_range(name, &range);
    }

    Err(EngineError::EmptyInput)
}

fn unreadable(reason: String) -> EngineError {
    EngineError::UnreadableFormat { format: FormatTag::Xlsx, reason }
}

fn table_from_range(name: &str, range: &Range<Data>) -> Result<RawTable> {
    let mut row_iter = range.rows();
    let header = row_iter.next().ok_or(EngineError::EmptyInput)?;
    let columns: Vec<String> = header
        .iter()
        .take(MAX_COLS)
        .map(|cell| cell_value(cell).render())
        .collect();

    let mut rows: Vec<RawRecord> = Vec::new();
    for row in row_iter {
        let record: RawRecord = row.iter().take(MAX_COLS).map(cell_value).collect();
        if record.iter().all(RawValue::is_blank) {
            continue;
        }
        rows.push(record);
    }

    if rows.is_empty() {
        return Err(EngineError::EmptyInput);
    }

    debug!(sheet = %name, columns = columns.len(), rows = rows.len(), "parsed worksheet");
    Ok(RawTable { columns, rows })
}

/// Map one cell to an untyped scalar. Date cells surface as ISO text so the
/// normalizer's pattern list applies uniformly across formats; booleans and
/// error cells surface as their text forms.
fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) => {
            if s.trim().is_empty() {
                RawValue::Empty
            } else {
                RawValue::Text(s.clone())
            }
        }
        Data::Float(n) => RawValue::Number(*n),
        Data::Int(n) => RawValue::Number(*n as f64),
        Data::Bool(b) => RawValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => RawValue::Text(format!("#{e:?}")),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ts) if ts.time() == NaiveTime::MIN => {
                RawValue::Text(ts.format("%Y-%m-%d").to_string())
            }
            Some(ts) => RawValue::Text(ts.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => RawValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => RawValue::Text(s.clone()),
        Data::DurationIso(s) => RawValue::Text(s.clone()),
    }
}
