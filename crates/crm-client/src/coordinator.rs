//! Single-flight coordination of token refreshes
//!
//! Holds the refresh-in-progress flag and the ordered queue of requests
//! waiting on it. Both live behind one mutex that is never held across an
//! await point, so checking the flag and enqueuing behind it is a single
//! atomic step even on a multi-threaded runtime.
//!
//! The coordinator is owned by an `ApiClient` (shared by its clones). Two
//! independently built clients never share refresh state.
//!
//! Lifecycle of one refresh:
//! 1. First 401 -> `join()` returns `Leader(lease)`, flag set
//! 2. Later 401s -> `join()` returns `Waiter`, appended to the queue
//! 3. Leader finishes -> `lease.settle(outcome)` drains the whole queue in
//!    arrival order, then clears the flag
//! 4. Leader dropped without settling -> waiters get `RefreshAbandoned`

use std::sync::{Mutex, MutexGuard};

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{ClientError, Result};

/// Outcome handed to every waiter: the new access token or the refresh error.
type Outcome = Result<String>;

#[derive(Default)]
struct State {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// Refresh-in-progress flag plus the queue of pending waiters.
#[derive(Default)]
pub struct RefreshCoordinator {
    state: Mutex<State>,
}

/// What a request that just received a 401 should do.
pub enum RefreshRole<'a> {
    /// No refresh was running; this request performs it.
    Leader(RefreshLease<'a>),
    /// A refresh is running; wait for its outcome.
    Waiter(Waiter),
}

/// Exclusive right to perform the current refresh.
///
/// Must be consumed with `settle`. Dropping it unsettled fails all waiters
/// with `RefreshAbandoned` and clears the flag.
pub struct RefreshLease<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

/// A queued request's handle on the in-flight refresh.
pub struct Waiter {
    rx: oneshot::Receiver<Outcome>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the refresh if none is in progress.
    pub fn begin_refresh(&self) -> Option<RefreshLease<'_>> {
        let mut state = self.lock();
        if state.in_progress {
            return None;
        }
        state.in_progress = true;
        Some(RefreshLease {
            coordinator: self,
            settled: false,
        })
    }

    /// Queue a waiter behind the current refresh.
    ///
    /// Only meaningful while a refresh is in progress; `join` does the check
    /// and the enqueue atomically and is what request code should call.
    pub fn enqueue(&self) -> Waiter {
        let mut state = self.lock();
        Self::push_waiter(&mut state)
    }

    /// Become the refresh leader, or queue behind the running refresh.
    pub fn join(&self) -> RefreshRole<'_> {
        let mut state = self.lock();
        if state.in_progress {
            let waiter = Self::push_waiter(&mut state);
            debug!(queued = state.waiters.len(), "refresh in progress, request queued");
            RefreshRole::Waiter(waiter)
        } else {
            state.in_progress = true;
            RefreshRole::Leader(RefreshLease {
                coordinator: self,
                settled: false,
            })
        }
    }

    fn push_waiter(state: &mut State) -> Waiter {
        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        Waiter { rx }
    }

    /// Settle every queued waiter with `outcome`, in arrival order, and clear
    /// the flag. Returns how many waiters were settled.
    pub fn settle_refresh(&self, outcome: Outcome) -> usize {
        let waiters = self.release();
        let count = waiters.len();
        for tx in waiters {
            // A waiter whose request was cancelled has dropped its receiver
            let _ = tx.send(outcome.clone());
        }
        count
    }

    /// Clear the flag and take the queue, oldest waiter first.
    fn release(&self) -> Vec<oneshot::Sender<Outcome>> {
        let mut state = self.lock();
        state.in_progress = false;
        std::mem::take(&mut state.waiters)
    }

    pub fn is_refreshing(&self) -> bool {
        self.lock().in_progress
    }

    /// Number of waiters currently queued.
    pub fn pending(&self) -> usize {
        self.lock().waiters.len()
    }
}

impl RefreshLease<'_> {
    /// Publish the refresh outcome to all waiters and release the flag.
    pub fn settle(mut self, outcome: Outcome) -> usize {
        self.settled = true;
        self.coordinator.settle_refresh(outcome)
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let abandoned = self
                .coordinator
                .settle_refresh(Err(ClientError::RefreshAbandoned));
            debug!(waiters = abandoned, "refresh leader dropped before settling");
        }
    }
}

impl Waiter {
    /// Wait for the refresh to settle.
    pub async fn wait(self) -> Outcome {
        self.rx
            .await
            .unwrap_or(Err(ClientError::RefreshAbandoned))
    }
}
