//! CSV and spreadsheet rows mapped onto typed records.
//!
//! Every file has one header row; spreadsheets are read from their first
//! sheet. Object, expiry and membership files are
//! positional; new-user files are keyed by header name. A row that cannot be
//! mapped or applied is reported and the rest of the file still runs.

use crate::error::{Error, Result};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

const BOM: char = '\u{feff}';
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// `name, domain, ou_path`; used by delete, block and unblock files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRow {
    pub name: String,
    pub domain: String,
    pub ou_path: String,
}

/// `name, domain, ou_path, date`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryRow {
    pub target: ObjectRow,
    pub date: String,
}

/// `user, user_domain, user_ou, group, group_domain, group_ou`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRow {
    pub user: ObjectRow,
    pub group: ObjectRow,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUserRow {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

pub trait FromRecord: Sized {
    fn from_record(record: &StringRecord, headers: &StringRecord) -> Result<Self>;
}

fn field<'a>(record: &'a StringRecord, index: usize, name: &str) -> Result<&'a str> {
    record
        .get(index)
        .ok_or_else(|| Error::InvalidArgument(format!("missing column {} ({})", index + 1, name)))
}

fn required<'a>(record: &'a StringRecord, index: usize, name: &str) -> Result<&'a str> {
    let value = field(record, index, name)?;
    if value.is_empty() {
        return Err(Error::InvalidArgument(format!("{} is empty", name)));
    }
    Ok(value)
}

impl ObjectRow {
    fn at(record: &StringRecord, offset: usize) -> Result<Self> {
        Ok(Self {
            name: required(record, offset, "name")?.to_string(),
            domain: required(record, offset + 1, "domain")?.to_string(),
            ou_path: field(record, offset + 2, "ou_path")?.to_string(),
        })
    }
}

impl FromRecord for ObjectRow {
    fn from_record(record: &StringRecord, _headers: &StringRecord) -> Result<Self> {
        Self::at(record, 0)
    }
}

impl FromRecord for ExpiryRow {
    fn from_record(record: &StringRecord, _headers: &StringRecord) -> Result<Self> {
        Ok(Self {
            target: ObjectRow::at(record, 0)?,
            date: required(record, 3, "date")?.to_string(),
        })
    }
}

impl FromRecord for MembershipRow {
    fn from_record(record: &StringRecord, _headers: &StringRecord) -> Result<Self> {
        Ok(Self {
            user: ObjectRow::at(record, 0)?,
            group: ObjectRow::at(record, 3)?,
        })
    }
}

impl FromRecord for NewUserRow {
    fn from_record(record: &StringRecord, headers: &StringRecord) -> Result<Self> {
        Ok(record.deserialize(Some(headers))?)
    }
}

/// One data row; `line` is the 1-based line in the file.
#[derive(Debug)]
pub struct Row<T> {
    pub line: u64,
    pub parsed: Result<T>,
}

fn normalize_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> StringRecord {
    headers
        .into_iter()
        .map(|h| h.trim_start_matches(BOM).trim().to_ascii_lowercase())
        .collect()
}

/// Read a `.csv` file or the first sheet of a spreadsheet.
pub fn read_rows<T: FromRecord>(path: &Path) -> Result<Vec<Row<T>>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if extension == "csv" {
        read_csv_rows(path)
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        read_sheet_rows(path)
    } else {
        Err(Error::UnsupportedFile(path.display().to_string()))
    }
}

fn read_csv_rows<T: FromRecord>(path: &Path) -> Result<Vec<Row<T>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)?;

    let headers = normalize_headers(reader.headers()?.iter());

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let row = match record {
            Ok(record) => Row {
                line: record.position().map_or(fallback_line, |p| p.line()),
                parsed: T::from_record(&record, &headers),
            },
            Err(e) => Row {
                line: e.position().map_or(fallback_line, |p| p.line()),
                parsed: Err(e.into()),
            },
        };
        rows.push(row);
    }

    Ok(rows)
}

/// Cell text as a CSV reader would have seen it. Whole numbers lose their
/// `.0` and date cells come out as `DD-MM-YYYY`.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other
            .as_date()
            .map(|date| date.format("%d-%m-%Y").to_string())
            .unwrap_or_else(|| other.to_string()),
    }
}

fn read_sheet_rows<T: FromRecord>(path: &Path) -> Result<Vec<Row<T>>> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::UnsupportedFile(format!("{}: workbook has no sheets", path.display())))??;

    let mut lines = range.rows().map(|cells| cells.iter().map(cell_text).collect::<Vec<_>>());
    let Some(header_cells) = lines.next() else {
        return Ok(Vec::new());
    };
    let headers = normalize_headers(header_cells.iter().map(String::as_str));

    let mut rows = Vec::new();
    for (index, cells) in lines.enumerate() {
        if cells.iter().all(String::is_empty) {
            continue;
        }
        let record = StringRecord::from(cells);
        rows.push(Row {
            line: index as u64 + 2,
            parsed: T::from_record(&record, &headers),
        });
    }

    Ok(rows)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub failures: Vec<RowFailure>,
}

impl BatchReport {
    pub fn record_failure(&mut self, line: u64, err: &Error) {
        log::warn!("row {}: {}", line, err);
        self.failures.push(RowFailure {
            line,
            reason: err.to_string(),
        });
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} processed, {} failed", self.processed, self.failures.len())
    }
}

/// Map every row of `path` and hand the good ones to `apply`.
pub fn run<T, F>(path: &Path, mut apply: F) -> Result<BatchReport>
where
    T: FromRecord,
    F: FnMut(&T) -> Result<()>,
{
    let mut report = BatchReport::default();

    for row in read_rows::<T>(path)? {
        match row.parsed.and_then(|record| apply(&record)) {
            Ok(()) => report.processed += 1,
            Err(e) => report.record_failure(row.line, &e),
        }
    }

    log::info!("{}: {}", path.display(), report);
    Ok(report)
}
