//! Typed CRM endpoints over `ApiClient`
//!
//! Responses come wrapped in a loose envelope: list endpoints return either
//! `{"<plural>": [...]}` or the bare array, single-record endpoints return
//! `{"<singular>": {...}}` or the bare object. `unwrap_envelope` accepts
//! both.

use bytes::Bytes;
use crm_client::{ApiClient, ApiResponse, FilePart, MultipartPayload};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::mail::MailRequest;
use crate::spreadsheet::ImportFile;
use crate::models::{
    Customer, CustomerInput, Department, Message, NewDepartment, NewUser, ProfileUpdate, RecordId,
    RoleAssignment, User,
};

/// MIME type the import endpoint expects.
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Truthiness as the API's own clients treat it: null, false, 0 and "" are empty.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `body.<key>` if set, else the body itself, else `Null`.
pub fn unwrap_envelope(body: Value, key: &str) -> Value {
    if let Some(inner) = body.get(key)
        && is_truthy(inner)
    {
        return inner.clone();
    }
    if is_truthy(&body) { body } else { Value::Null }
}

fn decode_list<T: DeserializeOwned>(body: Value, key: &str) -> Result<Vec<T>> {
    match unwrap_envelope(body, key) {
        Value::Null => Ok(Vec::new()),
        value => serde_json::from_value(value)
            .map_err(|e| Error::Decode(format!("{key} list: {e}"))),
    }
}

fn decode_one<T: DeserializeOwned>(body: Value, key: &str) -> Result<Option<T>> {
    match unwrap_envelope(body, key) {
        Value::Null => Ok(None),
        value => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::Decode(format!("{key}: {e}"))),
    }
}

fn require<T>(record: Option<T>, key: &str) -> Result<T> {
    record.ok_or_else(|| Error::Decode(format!("response carried no {key}")))
}

fn body(response: &ApiResponse) -> Result<Value> {
    Ok(response.value()?)
}

/// CRM resources for the signed-in operator.
#[derive(Clone)]
pub struct CrmApi {
    client: ApiClient,
}

impl CrmApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    async fn list<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Vec<T>> {
        let response = self.client.get(path).await?;
        let items = decode_list(body(&response)?, key)?;
        debug!(path, count = items.len(), "fetched list");
        Ok(items)
    }

    // Profile

    /// The signed-in user.
    pub async fn me(&self) -> Result<User> {
        let response = self.client.get("/auth/me").await?;
        require(decode_one(body(&response)?, "user")?, "user")
    }

    /// Update username, email and optionally password.
    ///
    /// Returns the server's copy of the user when it sends one back.
    pub async fn update_me(&self, update: &ProfileUpdate) -> Result<Option<User>> {
        let problems = update.validate();
        if !problems.is_empty() {
            return Err(Error::Validation(problems));
        }
        let response = self.client.patch("/users/me", update.to_payload()).await?;
        decode_one(body(&response)?, "user")
    }

    // Customers

    pub async fn customers(&self) -> Result<Vec<Customer>> {
        self.list("/customers", "customers").await
    }

    pub async fn create_customer(&self, input: &CustomerInput) -> Result<Customer> {
        let payload = serde_json::to_value(input).map_err(|e| Error::Decode(e.to_string()))?;
        let response = self.client.post("/customers", payload).await?;
        let created = require(decode_one(body(&response)?, "customer")?, "customer")?;
        info!(party_name = %input.party_name, "customer created");
        Ok(created)
    }

    pub async fn update_customer(&self, id: &RecordId, input: &CustomerInput) -> Result<()> {
        let payload = serde_json::to_value(input).map_err(|e| Error::Decode(e.to_string()))?;
        self.client
            .patch(&format!("/customers/{id}"), payload)
            .await?;
        info!(%id, "customer updated");
        Ok(())
    }

    pub async fn delete_customer(&self, id: &RecordId) -> Result<()> {
        self.client.delete(&format!("/customers/{id}")).await?;
        info!(%id, "customer deleted");
        Ok(())
    }

    /// Upload a spreadsheet of customers. Returns the imported count when
    /// the server reports one.
    pub async fn import_customers(
        &self,
        file_name: &str,
        contents: impl Into<Bytes>,
    ) -> Result<Option<u64>> {
        let payload = MultipartPayload::new().file(
            "file",
            FilePart::new(file_name, contents).with_mime(XLSX_MIME),
        );
        let response = self.client.post("/customers/import", payload).await?;
        let count = body(&response)?.get("count").and_then(Value::as_u64);
        info!(file_name, ?count, "customers imported");
        Ok(count)
    }

    /// Upload a workbook that was read beforehand. A sheet without data
    /// rows is refused locally; when the server reports no count, the
    /// number of rows read stands in for it.
    pub async fn import_file(&self, file: &ImportFile) -> Result<u64> {
        if !file.has_data() {
            return Err(Error::Validation(vec!["No data to import".into()]));
        }
        let count = self
            .import_customers(&file.file_name, file.contents.clone())
            .await?;
        Ok(count.unwrap_or_else(|| file.row_count()))
    }

    // Users

    pub async fn users(&self) -> Result<Vec<User>> {
        self.list("/users", "users").await
    }

    /// Members of the signed-in manager's department.
    pub async fn department_users(&self) -> Result<Vec<User>> {
        self.list("/users/department", "users").await
    }

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let response = self.client.post("/users", user.to_payload()).await?;
        let created = require(decode_one(body(&response)?, "user")?, "user")?;
        info!(username = %user.username, role = %user.role, "user created");
        Ok(created)
    }

    /// Change a user's role. Returns the updated record when the server
    /// sends one back.
    pub async fn update_user(
        &self,
        id: &RecordId,
        assignment: &RoleAssignment,
    ) -> Result<Option<User>> {
        let response = self
            .client
            .patch(&format!("/users/{id}"), assignment.to_payload())
            .await?;
        let value = body(&response)?;
        match value.get("user") {
            Some(user) if is_truthy(user) => serde_json::from_value(user.clone())
                .map(Some)
                .map_err(|e| Error::Decode(format!("user: {e}"))),
            _ => Ok(None),
        }
    }

    pub async fn delete_user(&self, id: &RecordId) -> Result<()> {
        self.client.delete(&format!("/users/{id}")).await?;
        info!(%id, "user deleted");
        Ok(())
    }

    // Departments

    pub async fn departments(&self) -> Result<Vec<Department>> {
        self.list("/departments", "departments").await
    }

    pub async fn create_department(&self, department: &NewDepartment) -> Result<Department> {
        let payload =
            serde_json::to_value(department).map_err(|e| Error::Decode(e.to_string()))?;
        let response = self.client.post("/departments", payload).await?;
        require(decode_one(body(&response)?, "department")?, "department")
    }

    pub async fn delete_department(&self, id: &RecordId) -> Result<()> {
        self.client.delete(&format!("/departments/{id}")).await?;
        info!(%id, "department deleted");
        Ok(())
    }

    // Messages

    /// Sent messages visible to the signed-in user; the server scopes this
    /// by role.
    pub async fn message_history(&self) -> Result<Vec<Message>> {
        self.list("/messages/history", "messages").await
    }

    pub async fn send_mail(&self, mail: &MailRequest) -> Result<Value> {
        let response = self
            .client
            .post("/messages/mail", mail.to_payload())
            .await?;
        debug!(
            recipients = mail.customer_ids.len(),
            attachments = mail.attachments.len(),
            "mail sent"
        );
        body(&response)
    }
}
