//! Typed CRM resources and console-side helpers
//!
//! `CrmApi` wraps an authenticated `crm_client::ApiClient` with one method
//! per endpoint the console uses. The remaining modules hold the logic the
//! console runs locally: list filtering, `{placeholder}` mail templates,
//! bulk personalized sends, the Markdown preview, and CSV and XLSX
//! workbooks.

pub mod error;
pub mod export;
pub mod filter;
pub mod mail;
pub mod markdown;
pub mod models;
pub mod resources;
pub mod spreadsheet;
pub mod template;

pub use error::{Error, Result};
pub use export::{ExportFormat, customers_csv, export_file_name};
pub use filter::{CustomerQuery, CustomerSort, MessageQuery, MessageSort, SortOrder, UserQuery};
pub use mail::{MailFailure, MailReport, MailRequest, send_personalized};
pub use markdown::MarkdownRenderer;
pub use models::{
    Customer, CustomerInput, Department, Message, NewDepartment, NewUser, ProfileUpdate, RecordId,
    Role, RoleAssignment, User,
};
pub use resources::{CrmApi, XLSX_MIME};
pub use spreadsheet::{ImportFile, WorkbookPreview, customers_xlsx, read_workbook};
pub use template::Template;
