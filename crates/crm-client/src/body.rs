//! Request bodies and per-request options
//!
//! Bodies are kept as owned data rather than a ready-made reqwest body so a
//! request can be rebuilt and re-issued after a token refresh. Multipart
//! payloads are turned into a fresh `reqwest::multipart::Form` per attempt.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::error::{ClientError, Result};

/// Body of an outgoing request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Sent as `application/json`.
    Json(serde_json::Value),
    /// Sent as `multipart/form-data` with a transport-generated boundary.
    Multipart(MultipartPayload),
}

impl RequestBody {
    /// Serialize any value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ClientError::InvalidRequest(format!("serializing JSON body: {e}")))
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, RequestBody::Multipart(_))
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<MultipartPayload> for RequestBody {
    fn from(payload: MultipartPayload) -> Self {
        RequestBody::Multipart(payload)
    }
}

/// A file to upload as one multipart part.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Bytes,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

#[derive(Debug, Clone)]
enum PartData {
    Text(String),
    File(FilePart),
}

/// Ordered multipart fields. Repeating a name appends another part.
#[derive(Debug, Clone, Default)]
pub struct MultipartPayload {
    parts: Vec<(String, PartData)>,
}

impl MultipartPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push((name.into(), PartData::Text(value.into())));
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: FilePart) -> Self {
        self.parts.push((name.into(), PartData::File(file)));
        self
    }

    /// Names of all parts, in order.
    pub fn field_names(&self) -> Vec<&str> {
        self.parts.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Value of the first text part called `name`.
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|(n, data)| match data {
            PartData::Text(v) if n == name => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Build a fresh form for one send attempt.
    pub(crate) fn to_form(&self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for (name, data) in &self.parts {
            form = match data {
                PartData::Text(value) => form.text(name.clone(), value.clone()),
                PartData::File(file) => {
                    let mut part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
                        .file_name(file.file_name.clone());
                    if let Some(mime) = &file.mime {
                        part = part.mime_str(mime).map_err(|e| {
                            ClientError::InvalidRequest(format!("invalid mime type {mime}: {e}"))
                        })?;
                    }
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// Per-request configuration.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body_from_struct() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Department {
            name: String,
            description: String,
        }

        let body = RequestBody::json(&Department {
            name: "Sales".into(),
            description: "Field sales".into(),
        })
        .unwrap();
        match body {
            RequestBody::Json(v) => assert_eq!(v["name"], "Sales"),
            RequestBody::Multipart(_) => panic!("expected JSON"),
        }
    }

    #[test]
    fn multipart_keeps_order_and_repeats() {
        let payload = MultipartPayload::new()
            .text("subject", "Hello")
            .text("customerIds", "7")
            .file("attachments", FilePart::new("a.pdf", vec![1u8, 2, 3]))
            .file("attachments", FilePart::new("b.pdf", vec![4u8]));

        assert_eq!(
            payload.field_names(),
            vec!["subject", "customerIds", "attachments", "attachments"]
        );
        assert_eq!(payload.text_value("customerIds"), Some("7"));
        assert_eq!(payload.text_value("attachments"), None);
        assert!(RequestBody::from(payload).is_multipart());
    }

    #[test]
    fn form_builds_with_mime() {
        let payload = MultipartPayload::new().file(
            "file",
            FilePart::new("customers.xlsx", Bytes::from_static(b"PK"))
                .with_mime("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        );
        let form = payload.to_form().unwrap();
        assert!(!form.boundary().is_empty());
    }

    #[test]
    fn form_rejects_bad_mime() {
        let payload = MultipartPayload::new()
            .file("file", FilePart::new("x", Bytes::new()).with_mime("not a mime"));
        assert!(matches!(
            payload.to_form(),
            Err(ClientError::InvalidRequest(_))
        ));
    }
}
