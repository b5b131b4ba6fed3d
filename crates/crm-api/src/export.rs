//! Customer export
//!
//! Column headers match what the import endpoint reads back. The XLSX
//! writer lives in `spreadsheet`.

use std::fmt;
use std::str::FromStr;

use crate::models::Customer;

/// File format of a customer export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => Err(format!("unknown export format: {other}")),
        }
    }
}

pub const CSV_HEADERS: [&str; 11] = [
    "Company Name",
    "Represented Name",
    "Address 1",
    "Address 2",
    "City",
    "Country",
    "Email",
    "Primary Phone",
    "Secondary phone",
    "Status",
    "Added By",
];

/// Quote a cell that contains a comma or a double quote.
pub fn escape_cell(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

pub(crate) fn row(customer: &Customer) -> [&str; 11] {
    [
        customer.party_name.as_str(),
        customer.shortname(),
        customer.address1(),
        customer.address2(),
        customer.city(),
        customer.country(),
        customer.email(),
        customer.phone1(),
        customer.phone2(),
        customer.status(),
        customer.added_by(),
    ]
}

/// Render customers as CSV, one line per customer, `\n`-separated.
///
/// `None` when there is nothing to export.
pub fn customers_csv(customers: &[Customer]) -> Option<String> {
    if customers.is_empty() {
        return None;
    }
    let mut lines = Vec::with_capacity(customers.len() + 1);
    lines.push(CSV_HEADERS.join(","));
    for customer in customers {
        let cells: Vec<String> = row(customer).iter().map(|v| escape_cell(v)).collect();
        lines.push(cells.join(","));
    }
    Some(lines.join("\n"))
}

/// `customers_<date>.<ext>`, with `date` as `YYYY-MM-DD`.
pub fn export_file_name(date: &str, format: ExportFormat) -> String {
    format!("customers_{date}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_with_commas_or_quotes_are_quoted() {
        assert_eq!(escape_cell("plain"), "plain");
        assert_eq!(escape_cell("Acme, Inc"), "\"Acme, Inc\"");
        assert_eq!(escape_cell(r#"The "Best""#), r#""The ""Best""""#);
    }

    #[test]
    fn empty_list_exports_nothing() {
        assert!(customers_csv(&[]).is_none());
    }

    #[test]
    fn header_and_rows() {
        let customers = vec![
            Customer {
                party_name: "Acme, Inc".into(),
                shortname: Some("Jane".into()),
                city_name: Some("Lyon".into()),
                country: Some("France".into()),
                email: Some("jane@acme.test".into()),
                phone1: Some("555".into()),
                status: Some("Active".into()),
                ..Default::default()
            },
            Customer {
                party_name: "Globex".into(),
                added_by: Some("admin".into()),
                ..Default::default()
            },
        ];
        let csv = customers_csv(&customers).unwrap();
        let lines: Vec<&str> = csv.split('\n').collect();
        assert_eq!(
            lines[0],
            "Company Name,Represented Name,Address 1,Address 2,City,Country,Email,Primary Phone,Secondary phone,Status,Added By"
        );
        assert_eq!(
            lines[1],
            "\"Acme, Inc\",Jane,,,Lyon,France,jane@acme.test,555,,Active,"
        );
        assert_eq!(lines[2], "Globex,,,,,,,,,,admin");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn file_name_carries_date() {
        assert_eq!(
            export_file_name("2026-10-19", ExportFormat::Csv),
            "customers_2026-10-19.csv"
        );
        assert_eq!(
            export_file_name("2026-10-19", ExportFormat::Xlsx),
            "customers_2026-10-19.xlsx"
        );
    }

    #[test]
    fn format_names() {
        assert_eq!("XLSX".parse::<ExportFormat>(), Ok(ExportFormat::Xlsx));
        assert_eq!("csv".parse::<ExportFormat>(), Ok(ExportFormat::Csv));
        assert!("ods".parse::<ExportFormat>().is_err());
    }
}
