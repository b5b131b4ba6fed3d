//! Outgoing mail and bulk personalized sends

use crm_client::{FilePart, MultipartPayload};
use tracing::{info, warn};

use crate::models::{Customer, RecordId};
use crate::resources::CrmApi;
use crate::template::Template;

/// One `/messages/mail` call.
#[derive(Debug, Clone, Default)]
pub struct MailRequest {
    pub subject: String,
    pub body_markdown: String,
    pub customer_ids: Vec<RecordId>,
    pub attachments: Vec<FilePart>,
}

impl MailRequest {
    /// Multipart body: `subject`, `bodyMarkdown`, one `customerIds` part per
    /// recipient and one `attachments` part per file.
    pub fn to_payload(&self) -> MultipartPayload {
        let mut payload = MultipartPayload::new()
            .text("subject", self.subject.clone())
            .text("bodyMarkdown", self.body_markdown.clone());
        for id in &self.customer_ids {
            payload = payload.text("customerIds", id.to_string());
        }
        for file in &self.attachments {
            payload = payload.file("attachments", file.clone());
        }
        payload
    }
}

/// A customer the batch could not reach.
#[derive(Debug, Clone, PartialEq)]
pub struct MailFailure {
    pub customer: String,
    pub reason: String,
}

/// Outcome of a bulk send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MailReport {
    pub sent: Vec<RecordId>,
    pub failed: Vec<MailFailure>,
}

impl MailReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Operator-facing summary line.
    pub fn summary(&self) -> String {
        if self.is_clean() {
            format!("Email sent successfully to {} customer(s)!", self.sent.len())
        } else {
            format!(
                "Email sent to {} customer(s), {} failed.",
                self.sent.len(),
                self.failed.len()
            )
        }
    }
}

/// Send one personalized mail per customer, in order.
///
/// Subject and body are rendered against each customer's record and sent
/// with that customer's id alone plus every attachment. A failure is
/// recorded and the batch moves on.
pub async fn send_personalized(
    api: &CrmApi,
    subject: &Template,
    body: &Template,
    customers: &[Customer],
    attachments: &[FilePart],
) -> MailReport {
    let mut report = MailReport::default();

    for customer in customers {
        let Some(id) = customer.id.clone() else {
            warn!(party_name = %customer.party_name, "customer has no id, skipped");
            report.failed.push(MailFailure {
                customer: customer.party_name.clone(),
                reason: "customer has no id".into(),
            });
            continue;
        };

        let request = MailRequest {
            subject: subject.render(customer),
            body_markdown: body.render(customer),
            customer_ids: vec![id.clone()],
            attachments: attachments.to_vec(),
        };

        match api.send_mail(&request).await {
            Ok(_) => report.sent.push(id),
            Err(e) => {
                warn!(%id, party_name = %customer.party_name, error = %e, "personalized mail failed");
                report.failed.push(MailFailure {
                    customer: customer.party_name.clone(),
                    reason: e.user_message("Failed to send email. Please try again."),
                });
            }
        }
    }

    info!(
        sent = report.sent.len(),
        failed = report.failed.len(),
        "bulk mail finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_repeats_ids_and_attachments() {
        let request = MailRequest {
            subject: "Hi".into(),
            body_markdown: "**Hello**".into(),
            customer_ids: vec![RecordId::Int(1), RecordId::Int(2)],
            attachments: vec![
                FilePart::new("a.pdf", b"a".to_vec()),
                FilePart::new("b.pdf", b"b".to_vec()),
            ],
        };
        let payload = request.to_payload();
        assert_eq!(
            payload.field_names(),
            vec![
                "subject",
                "bodyMarkdown",
                "customerIds",
                "customerIds",
                "attachments",
                "attachments"
            ]
        );
        assert_eq!(payload.text_value("bodyMarkdown"), Some("**Hello**"));
    }

    #[test]
    fn summary_wording() {
        let mut report = MailReport {
            sent: vec![RecordId::Int(1), RecordId::Int(2)],
            failed: Vec::new(),
        };
        assert_eq!(
            report.summary(),
            "Email sent successfully to 2 customer(s)!"
        );
        report.failed.push(MailFailure {
            customer: "Acme".into(),
            reason: "boom".into(),
        });
        assert_eq!(report.summary(), "Email sent to 2 customer(s), 1 failed.");
    }
}
