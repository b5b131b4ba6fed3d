//! Fixed keys, routes and endpoint paths shared by the console crates
//!
//! Storage keys use the same camelCase names as the token endpoints' JSON.

/// Storage key for the short-lived bearer credential
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the long-lived refresh credential
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Route every terminal auth failure sends the user back to
pub const LOGIN_ROUTE: &str = "/admin/crm/login";

/// Landing route after a successful login
pub const DASHBOARD_ROUTE: &str = "/admin/crm/dashboard";

/// API base path used when no explicit base URL is configured
pub const DEFAULT_BASE_PATH: &str = "/api/v1";

/// Token refresh endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Password login endpoint, relative to the API base URL
pub const LOGIN_PATH: &str = "/auth/login";
