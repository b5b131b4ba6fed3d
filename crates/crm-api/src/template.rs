//! `{placeholder}` substitution for personalized mail
//!
//! Placeholders match case-insensitively. Fields missing on the customer
//! render as empty strings; unrecognized placeholders are left as written.

use regex::{Captures, Regex};

use crate::error::Result;
use crate::models::Customer;

/// Every recognized placeholder name, lowercase.
pub const PLACEHOLDERS: &[&str] = &[
    "company_name",
    "companyname",
    "represented_name",
    "shortname",
    "email",
    "phone",
    "phone1",
    "primary_phone",
    "phone2",
    "secondary_phone",
    "city",
    "country",
    "address1",
    "address2",
    "address",
];

fn lookup<'a>(customer: &'a Customer, name: &str) -> Option<&'a str> {
    let value = match name {
        "company_name" | "companyname" => customer.party_name.as_str(),
        "represented_name" | "shortname" => customer.shortname(),
        "email" => customer.email(),
        "phone" | "phone1" | "primary_phone" => customer.phone1(),
        "phone2" | "secondary_phone" => customer.phone2(),
        "city" => customer.city(),
        "country" => customer.country(),
        "address1" | "address" => customer.address1(),
        "address2" => customer.address2(),
        _ => return None,
    };
    Some(value)
}

/// A subject or body with placeholders.
#[derive(Debug, Clone)]
pub struct Template {
    source: String,
    pattern: Regex,
}

impl Template {
    pub fn new(source: impl Into<String>) -> Result<Self> {
        Ok(Self {
            source: source.into(),
            pattern: Regex::new(r"\{([A-Za-z0-9_]+)\}")?,
        })
    }

    /// Render against one customer.
    pub fn render(&self, customer: &Customer) -> String {
        self.pattern
            .replace_all(&self.source, |caps: &Captures<'_>| {
                let name = caps[1].to_ascii_lowercase();
                match lookup(customer, &name) {
                    Some(value) => value.to_owned(),
                    None => caps[0].to_owned(),
                }
            })
            .into_owned()
    }

    /// Placeholders in the source that no customer field answers to.
    pub fn unknown_placeholders(&self) -> Vec<String> {
        self.pattern
            .captures_iter(&self.source)
            .map(|caps| caps[1].to_owned())
            .filter(|name| !PLACEHOLDERS.contains(&name.to_ascii_lowercase().as_str()))
            .collect()
    }
}
