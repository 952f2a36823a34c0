//! Bulk account creation from CSV or Excel. The first row is a header naming the columns;
//! `last_name`, `first_name` and `user_type` are required, `middle_name` and `group_name`
//! are optional.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::db::types::UserType;
use crate::services::accounts::{self, NewAccount, RegisterOutcome};
use crate::services::spreadsheet::{cell_to_string, first_sheet, LoadError};

const REQUIRED_COLUMNS: [&str; 3] = ["last_name", "first_name", "user_type"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImportFormat {
    Csv,
    Excel,
}

impl ImportFormat {
    pub(crate) fn from_filename(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Some(Self::Csv)
        } else if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
            Some(Self::Excel)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum ImportError {
    #[error("file is not valid UTF-8 CSV: {0}")]
    Csv(String),
    #[error(transparent)]
    Spreadsheet(#[from] LoadError),
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreatedCredential {
    pub(crate) login: String,
    pub(crate) password: String,
    pub(crate) full_name: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct ImportReport {
    pub(crate) total_processed: usize,
    pub(crate) successful: usize,
    pub(crate) failed: usize,
    pub(crate) exists: usize,
    pub(crate) errors: Vec<String>,
    pub(crate) existing_users: Vec<String>,
    pub(crate) created: Vec<CreatedCredential>,
}

/// Header-normalised rows keyed by their 1-based line in the source file: lowercased, trimmed
/// column name to trimmed cell value.
type Rows = Vec<(usize, HashMap<String, String>)>;

fn zip_row(headers: &[String], cells: impl Iterator<Item = String>) -> HashMap<String, String> {
    headers.iter().cloned().zip(cells.map(|cell| cell.trim().to_string())).collect()
}

fn read_csv(bytes: &[u8]) -> Result<(Vec<String>, Rows), ImportError> {
    let text = std::str::from_utf8(bytes).map_err(|err| ImportError::Csv(err.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader =
        csv::ReaderBuilder::new().has_headers(true).flexible(true).from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| ImportError::Csv(err.to_string()))?
        .iter()
        .map(|header| header.trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for (position, record) in reader.records().enumerate() {
        let record = record.map_err(|err| ImportError::Csv(err.to_string()))?;
        let line = record.position().map_or(position + 2, |pos| pos.line() as usize);
        rows.push((line, zip_row(&headers, record.iter().map(str::to_string))));
    }
    Ok((headers, rows))
}

fn read_excel(bytes: Vec<u8>) -> Result<(Vec<String>, Rows), ImportError> {
    let range = first_sheet(bytes)?;
    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut sheet_rows = range.rows().enumerate();

    let Some((_, header_row)) = sheet_rows.next() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let headers: Vec<String> =
        header_row.iter().map(|cell| cell_to_string(cell).trim().to_lowercase()).collect();

    let rows = sheet_rows
        .filter(|(_, row)| row.iter().any(|cell| !cell_to_string(cell).trim().is_empty()))
        .map(|(offset, row)| {
            (first_row + offset + 1, zip_row(&headers, row.iter().map(cell_to_string)))
        })
        .collect();
    Ok((headers, rows))
}

fn parse_rows(bytes: Vec<u8>, format: ImportFormat) -> Result<Rows, ImportError> {
    let (headers, rows) = match format {
        ImportFormat::Csv => read_csv(&bytes)?,
        ImportFormat::Excel => read_excel(bytes)?,
    };

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !headers.iter().any(|header| header == *column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }
    Ok(rows)
}

fn field(row: &HashMap<String, String>, name: &str) -> Option<String> {
    row.get(name).filter(|value| !value.is_empty()).cloned()
}

fn validate_row(row: &HashMap<String, String>) -> Result<NewAccount, String> {
    let user_type = match row.get("user_type").and_then(|value| UserType::parse(value)) {
        Some(kind @ (UserType::Teacher | UserType::Student)) => kind,
        _ => return Err("user_type must be 'teacher' or 'student'".to_string()),
    };

    let (Some(last_name), Some(first_name)) = (field(row, "last_name"), field(row, "first_name"))
    else {
        return Err("last_name and first_name are required".to_string());
    };

    let group_name = field(row, "group_name");
    if user_type == UserType::Student && group_name.is_none() {
        return Err("group_name is required for students".to_string());
    }

    Ok(NewAccount {
        user_type,
        last_name,
        first_name,
        middle_name: field(row, "middle_name"),
        group_name,
    })
}

fn display_name(account: &NewAccount) -> String {
    match account.middle_name.as_deref() {
        Some(middle) => format!("{} {} {}", account.last_name, account.first_name, middle),
        None => format!("{} {}", account.last_name, account.first_name),
    }
}

/// Registers every valid row. Invalid rows are reported and skipped; they never abort the
/// import. Row numbers in messages are source lines, so the header is row 1 and skipped blank
/// rows still count.
pub(crate) async fn import_users(
    pool: &SqlitePool,
    bytes: Vec<u8>,
    format: ImportFormat,
) -> Result<ImportReport, ImportError> {
    let rows = parse_rows(bytes, format)?;
    let mut report = ImportReport { total_processed: rows.len(), ..ImportReport::default() };

    for (row_number, row) in &rows {
        let row_number = *row_number;
        let account = match validate_row(row) {
            Ok(account) => account,
            Err(message) => {
                report.failed += 1;
                report.errors.push(format!("Row {row_number}: {message}"));
                continue;
            }
        };

        let full_name = display_name(&account);
        match accounts::register(pool, account).await {
            Ok(RegisterOutcome::Created { user, password }) => {
                report.successful += 1;
                report.created.push(CreatedCredential { login: user.login, password, full_name });
            }
            Ok(RegisterOutcome::AlreadyExists) => {
                report.exists += 1;
                report.existing_users.push(format!("{full_name} - already exists"));
            }
            Err(err) => {
                tracing::warn!(row = row_number, error = %err, "User import row failed");
                report.failed += 1;
                report.errors.push(format!("Row {row_number}: {err}"));
            }
        }
    }

    Ok(report)
}
