//! Terminal navigation target
//!
//! The console has no router; "navigating" to the login route means telling
//! the operator to sign in again and remembering that the session ended so
//! the process can exit with a distinct status.

use std::sync::atomic::{AtomicBool, Ordering};

use crm_auth::{LOGIN_ROUTE, Navigator};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct ConsoleNavigator {
    session_ended: AtomicBool,
}

impl ConsoleNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything sent the console back to the login route.
    pub fn session_ended(&self) -> bool {
        self.session_ended.load(Ordering::Relaxed)
    }
}

impl Navigator for ConsoleNavigator {
    fn navigate(&self, route: &str) {
        if route == LOGIN_ROUTE {
            // Only the first redirect prints the hint
            if !self.session_ended.swap(true, Ordering::Relaxed) {
                warn!(route, "session ended, sign-in required");
                eprintln!("Not signed in or session expired. Run `crm-console login` to continue.");
            }
        } else {
            info!(route, "navigated");
        }
    }
}
