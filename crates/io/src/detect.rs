// Input format detection: container signature, then extension, then content

use merits_core::FormatTag;

/// ZIP local-file header; xlsx, xlsb and ods are ZIP containers.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// OLE2 compound document header; legacy .xls.
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Pick the adapter for a file from its name and leading bytes. A caller
/// that already knows the format should pass its own tag instead; this is
/// the fallback for unlabeled uploads. Binary container signatures win over
/// the extension so a workbook renamed to `.csv` still parses.
pub fn detect_format(name: &str, bytes: &[u8]) -> FormatTag {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE2_MAGIC) {
        return FormatTag::Xlsx;
    }
    if let Some(tag) = from_extension(name) {
        return tag;
    }
    match first_content_byte(bytes) {
        Some(b'{') | Some(b'[') => FormatTag::Json,
        _ => FormatTag::Csv,
    }
}

fn from_extension(name: &str) -> Option<FormatTag> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "csv" | "tsv" | "txt" => Some(FormatTag::Csv),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(FormatTag::Xlsx),
        "json" | "ndjson" | "jsonl" => Some(FormatTag::Json),
        _ => None,
    }
}

fn first_content_byte(bytes: &[u8]) -> Option<u8> {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    bytes.iter().copied().find(|b| !b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(detect_format("posts.csv", b"a,b\n1,2\n"), FormatTag::Csv);
        assert_eq!(detect_format("posts.XLSX", b""), FormatTag::Xlsx);
        assert_eq!(detect_format("posts.json", b""), FormatTag::Json);
        assert_eq!(detect_format("export.jsonl", b""), FormatTag::Json);
    }

    #[test]
    fn test_zip_signature_beats_extension() {
        assert_eq!(detect_format("mislabeled.csv", b"PK\x03\x04rest"), FormatTag::Xlsx);
    }

    #[test]
    fn test_ole2_signature_is_xlsx() {
        let bytes = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0x00];
        assert_eq!(detect_format("old-report", &bytes), FormatTag::Xlsx);
    }

    #[test]
    fn test_extension_beats_content_sniff() {
        assert_eq!(detect_format("data.csv", b"[1,2,3]"), FormatTag::Csv);
    }

    #[test]
    fn test_content_sniff_for_unlabeled_json() {
        assert_eq!(detect_format("upload", b"  [{\"a\": 1}]"), FormatTag::Json);
        assert_eq!(detect_format("upload", b"{\"a\": 1}"), FormatTag::Json);
    }

    #[test]
    fn test_default_is_csv() {
        assert_eq!(detect_format("upload", b"a,b\n1,2\n"), FormatTag::Csv);
        assert_eq!(detect_format("notes.bin", b""), FormatTag::Csv);
    }
}
