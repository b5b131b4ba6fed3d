//! Wire types for CRM resources
//!
//! Field names follow the API's camelCase JSON. Most fields are optional on
//! the wire; older records carry `cityName`/`countryName` instead of
//! `city`/`country`, and the accessors below paper over that.

use std::fmt;
use std::str::FromStr;

use common::Secret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Record identifier. The API uses integers but older endpoints return strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl FromStr for RecordId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map(RecordId::Int)
            .unwrap_or_else(|_| RecordId::Text(s.to_owned())))
    }
}

/// `Some` only for non-empty strings.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
    pub id: Option<RecordId>,
    pub party_name: String,
    pub shortname: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub city_name: Option<String>,
    pub country: Option<String>,
    pub country_name: Option<String>,
    pub email: Option<String>,
    pub phone1: Option<String>,
    pub phone2: Option<String>,
    pub status: Option<String>,
    pub added_by: Option<String>,
}

impl Customer {
    pub fn city(&self) -> &str {
        present(&self.city)
            .or_else(|| present(&self.city_name))
            .unwrap_or("")
    }

    pub fn country(&self) -> &str {
        present(&self.country)
            .or_else(|| present(&self.country_name))
            .unwrap_or("")
    }

    pub fn shortname(&self) -> &str {
        present(&self.shortname).unwrap_or("")
    }

    pub fn email(&self) -> &str {
        present(&self.email).unwrap_or("")
    }

    pub fn phone1(&self) -> &str {
        present(&self.phone1).unwrap_or("")
    }

    pub fn phone2(&self) -> &str {
        present(&self.phone2).unwrap_or("")
    }

    pub fn address1(&self) -> &str {
        present(&self.address1).unwrap_or("")
    }

    pub fn address2(&self) -> &str {
        present(&self.address2).unwrap_or("")
    }

    pub fn status(&self) -> &str {
        present(&self.status).unwrap_or("")
    }

    pub fn added_by(&self) -> &str {
        present(&self.added_by).unwrap_or("")
    }
}

/// Body for creating or updating a customer.
///
/// `address2` and `phone2` are omitted when empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInput {
    pub party_name: String,
    pub shortname: String,
    pub address1: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub address2: String,
    pub city: String,
    pub country: String,
    pub email: String,
    pub phone1: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone2: String,
    pub status: String,
}

impl Default for CustomerInput {
    fn default() -> Self {
        Self {
            party_name: String::new(),
            shortname: String::new(),
            address1: String::new(),
            address2: String::new(),
            city: String::new(),
            country: String::new(),
            email: String::new(),
            phone1: String::new(),
            phone2: String::new(),
            status: "Active".into(),
        }
    }
}

impl From<&Customer> for CustomerInput {
    fn from(c: &Customer) -> Self {
        Self {
            party_name: c.party_name.clone(),
            shortname: c.shortname().into(),
            address1: c.address1().into(),
            address2: c.address2().into(),
            city: c.city().into(),
            country: c.country().into(),
            email: c.email().into(),
            phone1: c.phone1().into(),
            phone2: c.phone2().into(),
            status: present(&c.status).unwrap_or("Active").into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    #[default]
    User,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
            Role::Unknown => "unknown",
        }
    }

    /// Users and managers belong to a department; admins don't.
    pub fn has_department(self) -> bool {
        matches!(self, Role::User | Role::Manager)
    }

    /// Only plain users report to a manager.
    pub fn has_manager(self) -> bool {
        self == Role::User
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct User {
    pub id: Option<RecordId>,
    pub username: String,
    pub name: Option<String>,
    pub email: String,
    pub login: Option<String>,
    pub role: Role,
    pub department_id: Option<RecordId>,
    pub manager_id: Option<RecordId>,
}

/// Body for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: Secret<String>,
    pub role: Role,
    pub department_id: Option<RecordId>,
    pub manager_id: Option<RecordId>,
}

impl NewUser {
    /// JSON body. `departmentId` is sent only for users and managers,
    /// `managerId` only for users.
    pub fn to_payload(&self) -> Value {
        let mut body = Map::new();
        body.insert("username".into(), json!(self.username));
        body.insert("name".into(), json!(self.name));
        body.insert("email".into(), json!(self.email));
        body.insert("password".into(), json!(self.password.expose()));
        body.insert("role".into(), json!(self.role));
        if self.role.has_department() {
            body.insert("departmentId".into(), json!(self.department_id));
        }
        if self.role.has_manager() {
            body.insert("managerId".into(), json!(self.manager_id));
        }
        Value::Object(body)
    }
}

/// Role change for an existing user, with the same department/manager rules
/// as `NewUser`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleAssignment {
    pub role: Role,
    pub department_id: Option<RecordId>,
    pub manager_id: Option<RecordId>,
}

impl RoleAssignment {
    pub fn to_payload(&self) -> Value {
        let mut body = Map::new();
        body.insert("role".into(), json!(self.role));
        if self.role.has_department() {
            body.insert("departmentId".into(), json!(self.department_id));
        }
        if self.role.has_manager() {
            body.insert("managerId".into(), json!(self.manager_id));
        }
        Value::Object(body)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Department {
    pub id: Option<RecordId>,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDepartment {
    pub name: String,
    pub description: String,
}

/// Self-service profile change.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub username: String,
    pub email: String,
    /// New password; left out of the request when `None` or empty.
    pub password: Option<Secret<String>>,
    pub confirm_password: Option<Secret<String>>,
}

impl ProfileUpdate {
    fn new_password(&self) -> Option<&str> {
        self.password
            .as_ref()
            .map(|p| p.expose().as_str())
            .filter(|p| !p.is_empty())
    }

    /// Check the form the way the console does before sending it.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let username = self.username.trim();
        if username.is_empty() {
            problems.push("Username is required".to_owned());
        } else if self.username.chars().count() < 3 {
            problems.push("Username must be at least 3 characters".to_owned());
        }

        if self.email.trim().is_empty() {
            problems.push("Email is required".to_owned());
        } else if !looks_like_email(&self.email) {
            problems.push("Invalid email format".to_owned());
        }

        if let Some(password) = self.new_password() {
            let confirm = self
                .confirm_password
                .as_ref()
                .map(|p| p.expose().as_str())
                .unwrap_or("");
            if password.chars().count() < 6 {
                problems.push("Password must be at least 6 characters".to_owned());
            } else if password != confirm {
                problems.push("Passwords do not match".to_owned());
            }
        }

        problems
    }

    pub fn to_payload(&self) -> Value {
        let mut body = Map::new();
        body.insert("username".into(), json!(self.username));
        body.insert("email".into(), json!(self.email));
        if let Some(password) = self.new_password() {
            body.insert("password".into(), json!(password));
        }
        Value::Object(body)
    }
}

/// `local@domain.tld`: no whitespace or extra `@`, and a dot inside the domain.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Sender {
    pub username: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Recipient {
    pub party_name: Option<String>,
    pub email: Option<String>,
}

/// Entry in the sent-message history.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Message {
    pub id: Option<RecordId>,
    pub subject: Option<String>,
    pub body_markdown: Option<String>,
    pub body: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub user: Option<Sender>,
    pub recipient: Option<Recipient>,
    pub created_at: Option<String>,
    pub sent_at: Option<String>,
}

impl Message {
    pub fn body_text(&self) -> &str {
        present(&self.body_markdown)
            .or_else(|| present(&self.body))
            .unwrap_or("")
    }

    pub fn sender(&self) -> &str {
        self.user
            .as_ref()
            .and_then(|u| present(&u.username).or_else(|| present(&u.name)))
            .unwrap_or("")
    }

    pub fn recipient_name(&self) -> &str {
        self.recipient
            .as_ref()
            .and_then(|r| present(&r.party_name))
            .unwrap_or("")
    }
}
