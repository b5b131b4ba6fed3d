//! Navigation seam for forced logout
//!
//! The client never decides *how* the application returns to the login
//! entry point; it only asks a `Navigator` to go there. A desktop shell, a
//! CLI and a test harness each plug in their own.

use std::sync::Mutex;

/// Something that can move the application to a route.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, route: &str) {
        self(route)
    }
}

/// Navigator that records every requested route, in order.
///
/// Used by headless embeddings that inspect the route after the fact, and by
/// tests asserting a redirect happened exactly once.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes navigated to so far.
    pub fn routes(&self) -> Vec<String> {
        self.routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of navigations so far.
    pub fn count(&self) -> usize {
        self.routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(route.to_owned());
    }
}
