//! Error types for CRM resource operations

use crm_client::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("unexpected response shape: {0}")]
    Decode(String),

    /// Input rejected before any request was sent.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("template error: {0}")]
    Template(String),

    /// Workbook could not be read or written.
    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),
}

impl Error {
    /// Message suitable for showing to an operator.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Error::Client(e) => e.user_message(fallback),
            Error::Validation(problems) => problems.join("; "),
            _ => fallback.to_owned(),
        }
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::Template(e.to_string())
    }
}

impl From<calamine::Error> for Error {
    fn from(e: calamine::Error) -> Self {
        Error::Spreadsheet(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Error::Spreadsheet(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
