//! Authenticated HTTP client for the CRM REST API
//!
//! Every request carries the stored access token as a bearer credential.
//! When the API answers 401, the client refreshes the token pair once and
//! re-issues the request; requests that hit 401 while that refresh is in
//! flight queue behind it instead of starting their own.
//!
//! Request lifecycle:
//! 1. Caller issues `ApiClient::request()` (or `get`/`post`/... helpers)
//! 2. Access token attached; multipart bodies keep the transport's boundary
//! 3. 401 on first attempt -> `RefreshCoordinator::join()` picks leader or waiter
//! 4. Leader calls the refresh endpoint through an uninstrumented client
//! 5. Outcome settles every waiter; each re-issues once with the new token
//! 6. Refresh impossible or rejected -> session cleared, navigate to login, error returned

pub mod body;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod metrics;

pub use body::{FilePart, MultipartPayload, RequestBody, RequestOptions};
pub use client::{ApiClient, ApiClientBuilder, ApiResponse};
pub use coordinator::{RefreshCoordinator, RefreshLease, RefreshRole, Waiter};
pub use error::{ClientError, Result};
