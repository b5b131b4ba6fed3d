//! Shared types for the CRM console workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
