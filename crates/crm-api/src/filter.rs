//! Client-side search, filtering and sorting of fetched lists

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::models::{Customer, Message, RecordId, Role, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomerSort {
    #[default]
    PartyName,
    Shortname,
    City,
    Country,
    Status,
}

/// Customer list filter. `None` for status or country means "All".
#[derive(Debug, Clone, Default)]
pub struct CustomerQuery {
    pub search: String,
    pub status: Option<String>,
    pub country: Option<String>,
    pub sort: CustomerSort,
    pub order: SortOrder,
}

impl CustomerQuery {
    fn matches(&self, c: &Customer) -> bool {
        let term = self.search.to_lowercase();
        let matches_search = term.is_empty()
            || [
                c.party_name.as_str(),
                c.shortname(),
                c.email(),
                c.city(),
                c.country(),
                c.added_by(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&term))
            || c.phone1().contains(&self.search)
            || c.phone2().contains(&self.search);

        let matches_status = self.status.as_deref().is_none_or(|s| c.status() == s);
        let matches_country = self
            .country
            .as_deref()
            .is_none_or(|wanted| c.country().to_lowercase() == wanted.to_lowercase());

        matches_search && matches_status && matches_country
    }

    fn key(&self, c: &Customer) -> String {
        match self.sort {
            CustomerSort::PartyName => c.party_name.to_lowercase(),
            CustomerSort::Shortname => c.shortname().to_lowercase(),
            CustomerSort::City => c.city().to_lowercase(),
            CustomerSort::Country => c.country().to_lowercase(),
            CustomerSort::Status => c.status().to_lowercase(),
        }
    }

    pub fn apply(&self, customers: &[Customer]) -> Vec<Customer> {
        let mut out: Vec<Customer> = customers
            .iter()
            .filter(|c| self.matches(c))
            .cloned()
            .collect();
        out.sort_by(|a, b| self.order.apply(self.key(a).cmp(&self.key(b))));
        out
    }
}

/// Distinct non-blank countries, sorted.
pub fn countries(customers: &[Customer]) -> Vec<String> {
    let mut all: Vec<String> = customers
        .iter()
        .map(|c| c.country().to_owned())
        .filter(|c| !c.trim().is_empty())
        .collect();
    all.sort();
    all.dedup();
    all
}

#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub search: String,
    pub role: Option<Role>,
    pub order: SortOrder,
}

impl UserQuery {
    /// Filter by username, email or login, then sort by username.
    pub fn apply(&self, users: &[User]) -> Vec<User> {
        let term = self.search.to_lowercase();
        let mut out: Vec<User> = users
            .iter()
            .filter(|u| {
                term.is_empty()
                    || u.username.to_lowercase().contains(&term)
                    || u.email.to_lowercase().contains(&term)
                    || u.login
                        .as_deref()
                        .is_some_and(|l| l.to_lowercase().contains(&term))
            })
            .filter(|u| self.role.is_none_or(|r| u.role == r))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            self.order
                .apply(a.username.to_lowercase().cmp(&b.username.to_lowercase()))
        });
        out
    }
}

/// The manager a new user in `department` reports to by default: the
/// department's only manager, or nobody when there are zero or several.
pub fn sole_manager<'a>(users: &'a [User], department: &RecordId) -> Option<&'a RecordId> {
    let mut managers = users
        .iter()
        .filter(|u| u.role == Role::Manager && u.department_id.as_ref() == Some(department));
    match (managers.next(), managers.next()) {
        (Some(only), None) => only.id.as_ref(),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageSort {
    #[default]
    CreatedAt,
    SentAt,
    Subject,
}

#[derive(Debug, Clone)]
pub struct MessageQuery {
    pub search: String,
    /// Message type (`Email`, ...); `None` means all.
    pub kind: Option<String>,
    pub sort: MessageSort,
    pub order: SortOrder,
}

impl Default for MessageQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            kind: None,
            sort: MessageSort::CreatedAt,
            order: SortOrder::Desc,
        }
    }
}

/// Unparseable or missing timestamps sort as the epoch.
fn timestamp(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

impl MessageQuery {
    pub fn apply(&self, messages: &[Message]) -> Vec<Message> {
        let term = self.search.to_lowercase();
        let mut out: Vec<Message> = messages
            .iter()
            .filter(|m| {
                term.is_empty()
                    || [
                        m.subject.as_deref().unwrap_or(""),
                        m.body_text(),
                        m.sender(),
                        m.recipient_name(),
                    ]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            })
            .filter(|m| {
                self.kind
                    .as_deref()
                    .is_none_or(|k| m.kind.as_deref() == Some(k))
            })
            .cloned()
            .collect();

        out.sort_by(|a, b| {
            let ordering = match self.sort {
                MessageSort::CreatedAt => timestamp(a.created_at.as_deref())
                    .cmp(&timestamp(b.created_at.as_deref())),
                MessageSort::SentAt => {
                    timestamp(a.sent_at.as_deref()).cmp(&timestamp(b.sent_at.as_deref()))
                }
                MessageSort::Subject => a
                    .subject
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase()
                    .cmp(&b.subject.as_deref().unwrap_or("").to_lowercase()),
            };
            self.order.apply(ordering)
        });
        out
    }
}
