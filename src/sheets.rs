use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader as _};
use tracing::info;

use crate::utils;

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Rejections that happen at file-selection time, before any parse attempt.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{path}: not a spreadsheet (expected a .xlsx or .xls file)")]
    BadExtension { path: String },
    #[error("{path}: file is larger than the 10 MB limit")]
    TooLarge { path: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Checks extension and size of an export before it is decoded.
pub fn validate_upload(path: &Path) -> Result<(), UploadError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if !extension.eq_ignore_ascii_case("xlsx") && !extension.eq_ignore_ascii_case("xls") {
        return Err(UploadError::BadExtension { path: path.display().to_string() });
    }
    let size = std::fs::metadata(path)?.len();
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge { path: path.display().to_string() });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    #[error("sheet \"{0}\" not found in workbook")]
    SheetNotFound(String),
    #[error("sheet \"{0}\" has a header row but no data rows")]
    InsufficientData(String),
    #[error(transparent)]
    Workbook(#[from] calamine::Error),
}

/// One data row of a sheet, keyed by the header row. All typed-coercion of
/// cell values happens through the accessors here so that each field's exact
/// fallback is in one place.
#[derive(Debug, Clone)]
pub struct RawRow {
    cells: HashMap<String, Data>,
}

impl RawRow {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Data)>) -> Self {
        Self { cells: pairs.into_iter().collect() }
    }

    /// The cell under `key` as trimmed text; missing or empty cells become
    /// `""`. Whole-number cells are rendered without a trailing `.0`, so
    /// numeric job IDs keep their spreadsheet spelling.
    pub fn text(&self, key: &str) -> String {
        match self.cells.get(key) {
            Some(Data::String(s)) => s.trim().to_owned(),
            Some(Data::Float(f)) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            Some(Data::Int(i)) => i.to_string(),
            Some(Data::Bool(b)) => b.to_string(),
            Some(Data::DateTime(dt)) => {
                dt.as_datetime().map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string()).unwrap_or_default()
            }
            Some(Data::DateTimeIso(s)) | Some(Data::DurationIso(s)) => s.clone(),
            Some(Data::Error(_)) | Some(Data::Empty) | None => String::new(),
        }
    }

    /// Like [`Self::text`] but substituting `default` for missing/empty cells.
    pub fn text_or(&self, key: &str, default: &str) -> String {
        let text = self.text(key);
        if text.is_empty() {
            default.to_owned()
        } else {
            text
        }
    }

    /// The cell under `key` as a number. Numeric cells are used directly;
    /// text cells go through the lenient currency parse; everything else
    /// (including parse failure) becomes 0.
    pub fn number(&self, key: &str) -> f64 {
        match self.cells.get(key) {
            Some(Data::Float(f)) => *f,
            Some(Data::Int(i)) => *i as f64,
            Some(Data::String(s)) => utils::parse_currency(s),
            _ => 0.0,
        }
    }
}

/// Reads the named sheet of the workbook at `path` into header-keyed rows.
pub fn read_sheet(path: &Path, sheet_name: &str) -> Result<Vec<RawRow>, SheetError> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|name| name == sheet_name) {
        return Err(SheetError::SheetNotFound(sheet_name.to_owned()));
    }
    let range = workbook.worksheet_range(sheet_name)?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Err(SheetError::InsufficientData(sheet_name.to_owned()));
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| match cell {
            Data::String(s) => s.trim().to_owned(),
            other => other.to_string(),
        })
        .collect();

    let data: Vec<RawRow> = rows
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|row| {
            RawRow::from_pairs(
                headers.iter().cloned().zip(row.iter().cloned().chain(std::iter::repeat(Data::Empty))),
            )
        })
        .collect();
    if data.is_empty() {
        return Err(SheetError::InsufficientData(sheet_name.to_owned()));
    }

    info!("read {} rows from sheet \"{}\" of {}", data.len(), sheet_name, path.display());
    Ok(data)
}
