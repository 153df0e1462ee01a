// Format adapters and tabular export

pub mod csv;
pub mod detect;
pub mod export;
pub mod json;
pub mod xlsx;

use merits_core::{FormatTag, RawTable, Result};

pub use detect::detect_format;
pub use export::{export_csv, EXPORT_COLUMNS};

/// Parse one file's bytes with the adapter for `format`.
pub fn read_table(bytes: &[u8], format: FormatTag) -> Result<RawTable> {
    match format {
        FormatTag::Csv => self::csv::parse(bytes),
        FormatTag::Xlsx => self::xlsx::parse(bytes),
        FormatTag::Json => self::json::parse(bytes),
    }
}
