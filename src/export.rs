//! Spreadsheet export of the review snapshot.

use chrono::FixedOffset;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

use crate::review::format_timestamp;
use crate::store::StudentRecord;

/// File name offered to the browser.
pub const EXPORT_FILE_NAME: &str = "student_records.xlsx";

/// Worksheet holding the rows.
pub const SHEET_NAME: &str = "Students";

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Column headers, in output order.
pub const HEADERS: [&str; 7] = [
    "Name",
    "Phone",
    "Email",
    "College",
    "Department",
    "Year",
    "Submitted At",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to build spreadsheet: {0}")]
    Xlsx(#[from] XlsxError),
}

/// One exported row, cells in [`HEADERS`] order.
pub type ExportRow = [String; 7];

/// Flattens records into spreadsheet rows, one per record, in input order.
pub fn rows(records: &[StudentRecord], offset: FixedOffset) -> Vec<ExportRow> {
    records
        .iter()
        .map(|r| {
            [
                r.name.clone(),
                r.phone.clone(),
                r.email.clone(),
                r.college.clone(),
                r.department.clone(),
                r.year.clone(),
                format_timestamp(r.created_at, offset),
            ]
        })
        .collect()
}

/// Builds the `.xlsx` document for `records`.
///
/// Every cell is written as a string so phone numbers keep their leading
/// zeros.
pub fn write_workbook(records: &[StudentRecord], offset: FixedOffset) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, title) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (i, row) in rows(records, offset).iter().enumerate() {
        let row_idx = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            sheet.write_string(row_idx, col as u16, cell)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}
