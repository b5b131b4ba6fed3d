//! Session credentials for the CRM console
//!
//! Owns everything about "who is logged in": the key-value session store
//! holding the access/refresh token pair, the token endpoint calls that mint
//! a new pair, the navigation seam used to force a return to the login route,
//! and the protected-route check.
//!
//! Session lifecycle:
//! 1. `token::login()` returns a `TokenPair`, persisted with `session::store_pair()`
//! 2. Requests read `SessionKey::AccessToken` and send it as a bearer credential
//! 3. On expiry, `token::refresh_session()` exchanges the refresh token once
//! 4. Terminal failures call `session::clear_session()` and navigate to `LOGIN_ROUTE`

pub mod constants;
pub mod error;
pub mod guard;
pub mod navigation;
pub mod session;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use guard::{GuardDecision, check_route};
pub use navigation::{Navigator, RecordingNavigator};
pub use session::{
    FileSessionStore, MemorySessionStore, SessionKey, SessionStore, clear_session, store_pair,
};
pub use token::{TokenPair, login, refresh_session};
