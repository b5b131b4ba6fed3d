//! Customer workbooks
//!
//! Import reads the workbook before uploading it: the operator sees the
//! sheet names, the header row and the data rows of the first sheet, and a
//! sheet without data rows is never sent. Export writes a single
//! "Customers" sheet with the import headers and auto-sized columns.

use std::io::Cursor;

use bytes::Bytes;
use calamine::{Reader, open_workbook_auto_from_rs};
use rust_xlsxwriter::Workbook;

use crate::error::{Error, Result};
use crate::export::row;
use crate::models::Customer;

/// Name of the sheet written by `customers_xlsx`.
pub const XLSX_SHEET_NAME: &str = "Customers";

/// Upper bound on an auto-sized column, in characters.
pub const MAX_COLUMN_WIDTH: usize = 30;

pub const XLSX_HEADERS: [&str; 11] = [
    "Company Name",
    "Represented Name",
    "Address 1",
    "Address 2",
    "City",
    "Country",
    "Email",
    "Primary Phone",
    "Secondary Phone",
    "Status",
    "Added By",
];

/// What the first sheet of an uploaded workbook holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookPreview {
    pub sheet_names: Vec<String>,
    /// First row of the first sheet.
    pub headers: Vec<String>,
    /// Every following non-blank row.
    pub rows: Vec<Vec<String>>,
}

impl WorkbookPreview {
    pub fn first_sheet(&self) -> Option<&str> {
        self.sheet_names.first().map(String::as_str)
    }
}

/// Cells as text, with trailing empty cells dropped.
fn trimmed(cells: &[calamine::Data]) -> Vec<String> {
    let mut out: Vec<String> = cells.iter().map(ToString::to_string).collect();
    while out.last().is_some_and(String::is_empty) {
        out.pop();
    }
    out
}

/// Read sheet names plus the header and data rows of the first sheet.
pub fn read_workbook(contents: &[u8]) -> Result<WorkbookPreview> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(contents))?;
    let sheet_names = workbook.sheet_names();
    let Some(first) = sheet_names.first().cloned() else {
        return Ok(WorkbookPreview::default());
    };

    let range = workbook.worksheet_range(&first)?;
    let mut rows = range.rows().map(trimmed);
    let headers = rows.next().unwrap_or_default();
    let rows = rows.filter(|r| !r.is_empty()).collect();

    Ok(WorkbookPreview {
        sheet_names,
        headers,
        rows,
    })
}

/// A workbook read from disk, ready to upload.
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub file_name: String,
    pub contents: Bytes,
    pub preview: WorkbookPreview,
}

impl ImportFile {
    pub fn read(file_name: impl Into<String>, contents: impl Into<Bytes>) -> Result<Self> {
        let contents = contents.into();
        let preview = read_workbook(&contents)?;
        Ok(Self {
            file_name: file_name.into(),
            contents,
            preview,
        })
    }

    /// Number of data rows, the fallback when the server reports no count.
    pub fn row_count(&self) -> u64 {
        self.preview.rows.len() as u64
    }

    pub fn has_data(&self) -> bool {
        !self.preview.rows.is_empty()
    }
}

/// Export row: like the CSV row, but a missing "Added By" reads "System".
fn xlsx_row(customer: &Customer) -> [&str; 11] {
    let mut cells = row(customer);
    if cells[10].is_empty() {
        cells[10] = "System";
    }
    cells
}

/// Column widths: at least the header, widened by longer values up to
/// `MAX_COLUMN_WIDTH`.
pub fn column_widths(rows: &[[&str; 11]]) -> [usize; 11] {
    let mut widths = XLSX_HEADERS.map(|h| h.chars().count());
    for cells in rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            let len = cell.chars().count();
            if len > *width {
                *width = len.min(MAX_COLUMN_WIDTH);
            }
        }
    }
    widths
}

/// Render customers as an `.xlsx` workbook. `None` when there is nothing
/// to export.
pub fn customers_xlsx(customers: &[Customer]) -> Result<Option<Vec<u8>>> {
    if customers.is_empty() {
        return Ok(None);
    }
    let rows: Vec<[&str; 11]> = customers.iter().map(xlsx_row).collect();

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(XLSX_SHEET_NAME)?;

    for (col, header) in (0u16..).zip(XLSX_HEADERS) {
        sheet.write_string(0, col, header)?;
    }
    for (row_num, cells) in (1u32..).zip(&rows) {
        for (col, cell) in (0u16..).zip(cells) {
            if !cell.is_empty() {
                sheet.write_string(row_num, col, *cell)?;
            }
        }
    }
    for (col, width) in (0u16..).zip(column_widths(&rows)) {
        sheet.set_column_width(col, width as f64)?;
    }

    let buffer = workbook.save_to_buffer()?;
    Ok(Some(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customers() -> Vec<Customer> {
        vec![
            Customer {
                party_name: "Acme".into(),
                city_name: Some("Lyon".into()),
                email: Some("jane@acme.test".into()),
                ..Default::default()
            },
            Customer {
                party_name: "Globex Corporation International Holdings".into(),
                added_by: Some("admin".into()),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn widths_start_at_header_and_cap_long_values() {
        let rows = [
            ["Acme", "", "", "", "", "", "", "", "", "", "System"],
            [
                "Globex Corporation International Holdings",
                "",
                "",
                "",
                "Saint-Remy-de-Provence",
                "",
                "",
                "",
                "",
                "",
                "",
            ],
        ];
        let widths = column_widths(&rows);
        assert_eq!(widths[0], MAX_COLUMN_WIDTH);
        assert_eq!(widths[1], "Represented Name".len());
        assert_eq!(widths[4], "Saint-Remy-de-Provence".len());
        assert_eq!(widths[10], "Added By".len());
    }

    #[test]
    fn empty_list_writes_no_workbook() {
        assert!(customers_xlsx(&[]).unwrap().is_none());
    }

    #[test]
    fn exported_workbook_has_customers_sheet() {
        let bytes = customers_xlsx(&customers()).unwrap().unwrap();
        let preview = read_workbook(&bytes).unwrap();

        assert_eq!(preview.sheet_names, vec![XLSX_SHEET_NAME.to_string()]);
        assert_eq!(preview.headers, XLSX_HEADERS.map(String::from).to_vec());
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.rows[0][0], "Acme");
        assert_eq!(preview.rows[0][4], "Lyon");
        assert_eq!(preview.rows[0][10], "System");
        assert_eq!(preview.rows[1][10], "admin");
    }

    #[test]
    fn header_only_sheet_has_no_data() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Company Name").unwrap();
        sheet.write_string(0, 1, "Email").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let file = ImportFile::read("empty.xlsx", bytes).unwrap();
        assert_eq!(file.preview.headers, vec!["Company Name", "Email"]);
        assert!(!file.has_data());
        assert_eq!(file.preview.first_sheet(), Some("Sheet1"));
    }

    #[test]
    fn blank_rows_are_skipped() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Company Name").unwrap();
        sheet.write_string(1, 0, "Acme").unwrap();
        sheet.write_string(3, 0, "Globex").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let file = ImportFile::read("gaps.xlsx", bytes).unwrap();
        assert_eq!(file.row_count(), 2);
        assert_eq!(file.preview.rows[1], vec!["Globex"]);
    }

    #[test]
    fn unreadable_bytes_are_an_error() {
        let err = read_workbook(b"not a workbook").unwrap_err();
        assert!(matches!(err, Error::Spreadsheet(_)), "got {err:?}");
    }
}
