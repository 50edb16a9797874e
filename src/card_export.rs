// src/card_export.rs
use clap::ValueEnum;
use encoding_rs::{Encoding, GBK, UTF_8};
use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::report::{ReportRow, ReportSummary};
use crate::transaction::RawTransaction;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Required column missing from input: {0}")]
    MissingColumn(String),
}

// Each entry lists the accepted header names for one required column.
const REQUIRED_COLUMNS: [&[&str]; 5] = [
    &["姓名", "name"],
    &["个人编号", "person_id"],
    &["交易地点", "location"],
    &["交易金额", "amount"],
    &["交易时间", "timestamp"],
];
const CATEGORY_COLUMNS: [&str; 4] = ["人员类别", "person_category", "帐号", "account_id"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn check_headers(headers: &csv::StringRecord) -> Result<(), ExportError> {
    let present = |names: &[&str]| headers.iter().any(|h| names.contains(&h));
    for names in REQUIRED_COLUMNS {
        if !present(names) {
            return Err(ExportError::MissingColumn(names.join("/")));
        }
    }
    if !present(&CATEGORY_COLUMNS[..]) {
        return Err(ExportError::MissingColumn(CATEGORY_COLUMNS.join("/")));
    }
    Ok(())
}

/// Character encoding of the card export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InputEncoding {
    /// Byte-order mark if present, else UTF-8 when the bytes are valid UTF-8, else GBK.
    #[default]
    Auto,
    Utf8,
    Gbk,
}

impl InputEncoding {
    fn resolve(&self, bytes: &[u8]) -> &'static Encoding {
        match self {
            InputEncoding::Utf8 => UTF_8,
            InputEncoding::Gbk => GBK,
            InputEncoding::Auto => match Encoding::for_bom(bytes) {
                Some((encoding, _)) => encoding,
                None if std::str::from_utf8(bytes).is_ok() => UTF_8,
                None => GBK,
            },
        }
    }
}

/// Decodes the whole export; undecodable bytes become U+FFFD so the damage stays
/// inside the affected rows.
fn decode(bytes: &[u8], encoding: InputEncoding) -> Cow<'_, str> {
    let encoding = encoding.resolve(bytes);
    let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
    debug!("Decoding input as {}", encoding.name());
    if had_errors {
        warn!(
            "Input contains bytes that are not valid {}; they were replaced",
            encoding.name()
        );
    }
    text
}

fn has_replacement(row: &RawTransaction) -> bool {
    let fields: [&str; 10] = [
        row.person_category.as_deref().unwrap_or_default(),
        row.account_id.as_deref().unwrap_or_default(),
        &row.name,
        &row.person_id,
        &row.card_type,
        &row.location,
        &row.amount,
        &row.timestamp,
        &row.department,
        &row.transaction_type,
    ];
    fields.iter().any(|f| f.contains(char::REPLACEMENT_CHARACTER))
}

/// Reads a card export. Header problems are reported before any row is read;
/// a damaged record is logged and kept or, if it cannot be mapped at all, skipped
/// without affecting the other rows.
pub fn read_transactions<R: Read>(
    mut reader: R,
    encoding: InputEncoding,
) -> Result<Vec<RawTransaction>, ExportError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let text = decode(&bytes, encoding);

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers = rdr.headers()?.clone();
    debug!("Input headers: {:?}", headers);
    check_headers(&headers)?;

    let mut rows = Vec::new();
    for (index, record) in rdr.records().enumerate() {
        let line = index + 1;
        let parsed = record.and_then(|r| r.deserialize::<RawTransaction>(Some(&headers)));
        match parsed {
            Ok(row) => {
                if has_replacement(&row) {
                    warn!("Row {}: undecodable bytes replaced", line);
                }
                rows.push(row);
            }
            Err(e) => warn!("Row {}: unreadable record skipped: {}", line, e),
        }
    }
    Ok(rows)
}

pub fn read_transactions_from_path(
    path: &Path,
    encoding: InputEncoding,
) -> Result<Vec<RawTransaction>, ExportError> {
    let rows = read_transactions(File::open(path)?, encoding)?;
    info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Writes the report as CSV with a UTF-8 BOM so spreadsheet tools pick the encoding.
pub fn write_report<W: Write>(rows: &[ReportRow], mut writer: W) -> Result<(), ExportError> {
    writer.write_all(UTF8_BOM)?;
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_report_to_path(rows: &[ReportRow], path: &Path) -> Result<(), ExportError> {
    write_report(rows, File::create(path)?)?;
    info!("Report with {} rows written to {}", rows.len(), path.display());
    Ok(())
}

pub fn write_summary_to_path(summary: &ReportSummary, path: &Path) -> Result<(), ExportError> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)?;
    info!("Summary written to {}", path.display());
    Ok(())
}
