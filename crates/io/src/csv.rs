// Delimited-text adapter: CSV, TSV and semicolon/pipe variants

use merits_core::{EngineError, FormatTag, RawRecord, RawTable, RawValue, Result};
use tracing::debug;

/// Parse delimited-text bytes into a raw table. The first row is the
/// header; fully blank rows are skipped; rows may be narrower than the
/// header.
pub fn parse(bytes: &[u8]) -> Result<RawTable> {
    let content = decode_text(bytes);
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    let delimiter = sniff_delimiter(content);
    parse_with_delimiter(content, delimiter)
}

/// Decode bytes as UTF-8, falling back to Windows-1252 for legacy exports.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Detect the most likely field delimiter by checking consistency across the
/// first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line.
/// The delimiter producing the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the header line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Score: (lines agreeing with the header's field count) * field count.
        // Higher field count breaks ties between candidates.
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

fn parse_with_delimiter(content: &str, delimiter: u8) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut columns: Option<Vec<String>> = None;
    let mut rows: Vec<RawRecord> = Vec::new();

    for result in reader.records() {
        let record = result.map_err(|e| EngineError::UnreadableFormat {
            format: FormatTag::Csv,
            reason: e.to_string(),
        })?;

        if columns.is_none() {
            columns = Some(record.iter().map(|h| h.trim().to_string()).collect());
            continue;
        }
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(field_value).collect());
    }

    let columns = columns.ok_or(EngineError::EmptyInput)?;
    if rows.is_empty() {
        return Err(EngineError::EmptyInput);
    }

    debug!(columns = columns.len(), rows = rows.len(), "parsed delimited table");
    Ok(RawTable { columns, rows })
}

fn field_value(field: &str) -> RawValue {
    if field.trim().is_empty() {
        RawValue::Empty
    } else {
        RawValue::Text(field.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "Post URL,Impressions,Clicks\nhttp://a,120,4\nhttp://b,95,2\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Post URL;Impressions;Clicks\nhttp://a;120;4\nhttp://b;95;2\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "Post URL\tImpressions\tClicks\nhttp://a\t120\t4\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_pipe_delimiter() {
        let content = "Post URL|Impressions|Clicks\nhttp://a|120|4\n";
        assert_eq!(sniff_delimiter(content), b'|');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        let content =
            "Campaign;Impressions\n\"Spring, wave 1\";120\n\"Spring, wave 2\";95\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_parse_basic_table() {
        let table = parse(b"Post URL,Date,Impressions\nhttp://a,2024-01-01,120\n").unwrap();
        assert_eq!(table.columns, vec!["Post URL", "Date", "Impressions"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], RawValue::Text("http://a".into()));
        assert_eq!(table.rows[0][2], RawValue::Text("120".into()));
    }

    #[test]
    fn test_parse_empty_fields_become_empty_values() {
        let table = parse(b"a,b,c\n1,,3\n").unwrap();
        assert_eq!(table.rows[0][1], RawValue::Empty);
    }

    #[test]
    fn test_parse_skips_blank_rows() {
        let table = parse(b"a,b\n1,2\n,\n\n3,4\n").unwrap();
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_parse_keeps_short_rows() {
        let table = parse(b"a,b,c\n1,2\n").unwrap();
        assert_eq!(table.rows[0].len(), 2);
        assert_eq!(*table.cell(&table.rows[0], 2), RawValue::Empty);
    }

    #[test]
    fn test_parse_header_only_is_empty_input() {
        assert_eq!(parse(b"a,b,c\n").unwrap_err(), EngineError::EmptyInput);
    }

    #[test]
    fn test_parse_no_bytes_is_empty_input() {
        assert_eq!(parse(b"").unwrap_err(), EngineError::EmptyInput);
    }

    #[test]
    fn test_parse_strips_utf8_bom() {
        let table = parse(b"\xef\xbb\xbfa,b\n1,2\n").unwrap();
        assert_eq!(table.columns[0], "a");
    }

    #[test]
    fn test_parse_windows_1252_fallback() {
        // "Campagne été" in Windows-1252: é = 0xE9
        let bytes = b"campaign,impressions\ncampagne \xe9t\xe9,120\n";
        let table = parse(bytes).unwrap();
        assert_eq!(table.rows[0][0], RawValue::Text("campagne été".into()));
    }

    #[test]
    fn test_parse_trims_header_whitespace() {
        let table = parse(b" Post URL , Impressions \nx,1\n").unwrap();
        assert_eq!(table.columns, vec!["Post URL", "Impressions"]);
    }
}
