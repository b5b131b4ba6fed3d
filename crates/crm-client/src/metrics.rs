//! Client-side counters
//!
//! Recorded through the `metrics` facade; the host process decides whether a
//! recorder is installed. Without one every call is a no-op.
//!
//! - `crm_client_requests_total` (counter): labels `method`, `status`
//! - `crm_client_token_refresh_total` (counter): label `outcome`
//! - `crm_client_refresh_waiters_total` (counter): requests queued behind a refresh

/// Refresh outcome labels.
pub const REFRESH_SUCCESS: &str = "success";
pub const REFRESH_NO_REFRESH_TOKEN: &str = "no_refresh_token";
pub const REFRESH_MISSING_ACCESS_TOKEN: &str = "missing_access_token";
pub const REFRESH_REJECTED: &str = "rejected";
pub const REFRESH_FAILED: &str = "failed";

/// Record one HTTP attempt. `status` is `0` when no response arrived.
pub fn record_request(method: &str, status: u16) {
    metrics::counter!(
        "crm_client_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the outcome of a refresh the client led.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("crm_client_token_refresh_total", "outcome" => outcome).increment(1);
}

/// Record a request that queued behind an in-flight refresh.
pub fn record_refresh_waiter() {
    metrics::counter!("crm_client_refresh_waiters_total").increment(1);
}
