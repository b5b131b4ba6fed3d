//! Protected-route check
//!
//! A route is reachable only while an access token is stored. The check is
//! purely local: an expired token still passes, and the first API call on
//! the page is what discovers the expiry and triggers a refresh.

use crate::constants::LOGIN_ROUTE;
use crate::session::{SessionKey, SessionStore};

/// Outcome of the protected-route check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

/// Allow the route if an access token is stored, otherwise redirect to login.
pub fn check_route(store: &dyn SessionStore) -> GuardDecision {
    match store.get(SessionKey::AccessToken) {
        Some(_) => GuardDecision::Allow,
        None => GuardDecision::Redirect(LOGIN_ROUTE),
    }
}
