//! The authenticated API client
//!
//! `ApiClient` is cheap to clone; clones share the HTTP connection pool, the
//! session store, the navigator and the refresh coordinator.
//!
//! Two reqwest clients are built once per `ApiClient`: `http` carries every
//! API call and is wrapped by the 401 handling below; `refresh_http` is only
//! used for the refresh call itself, so the refresh can never recurse into
//! its own recovery path.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crm_auth::{LOGIN_ROUTE, Navigator, SessionKey, SessionStore};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::body::{RequestBody, RequestOptions};
use crate::coordinator::{RefreshCoordinator, RefreshRole};
use crate::error::{ClientError, Result};
use crate::metrics;

const DEFAULT_USER_AGENT: &str = concat!("crm-client/", env!("CARGO_PKG_VERSION"));

/// A successful (2xx) API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// Deserialize the body. An empty body reads as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let result = if self.body.iter().all(u8::is_ascii_whitespace) {
            serde_json::from_value(serde_json::Value::Null)
        } else {
            serde_json::from_slice(&self.body)
        };
        result.map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Body as an untyped JSON value.
    pub fn value(&self) -> Result<serde_json::Value> {
        self.json()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One logical request, rebuilt for every attempt.
struct RequestContext<'a> {
    method: Method,
    url: String,
    body: Option<&'a RequestBody>,
    options: &'a RequestOptions,
    /// Set once the request has been through a refresh; a second 401 is final.
    retried: bool,
}

/// Navigator used when the host doesn't provide one.
fn log_navigator(route: &str) {
    warn!(route, "session ended, re-authentication required");
}

/// HTTP client for the CRM API with transparent token refresh.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    refresh_http: reqwest::Client,
    base_url: Arc<str>,
    session: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    coordinator: Arc<RefreshCoordinator>,
    refresh_timeout: Option<Duration>,
}

impl ApiClient {
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// The uninstrumented client used for token endpoint calls (refresh, login).
    pub fn token_http(&self) -> &reqwest::Client {
        &self.refresh_http
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, None, RequestOptions::default())
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, path, None, RequestOptions::default())
            .await
    }

    pub async fn post(&self, path: &str, body: impl Into<RequestBody>) -> Result<ApiResponse> {
        self.request(
            Method::POST,
            path,
            Some(body.into()),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn patch(&self, path: &str, body: impl Into<RequestBody>) -> Result<ApiResponse> {
        self.request(
            Method::PATCH,
            path,
            Some(body.into()),
            RequestOptions::default(),
        )
        .await
    }

    pub async fn put(&self, path: &str, body: impl Into<RequestBody>) -> Result<ApiResponse> {
        self.request(
            Method::PUT,
            path,
            Some(body.into()),
            RequestOptions::default(),
        )
        .await
    }

    /// Issue a request relative to the base URL.
    ///
    /// A 401 on the first attempt is recovered by one token refresh (shared
    /// with any other request failing at the same time) and one re-issue. A
    /// 401 on the re-issue, and every other failure, is returned unchanged.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), method = %method, path = %path))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let mut ctx = RequestContext {
            method,
            url: self.url(path),
            body: body.as_ref(),
            options: &options,
            retried: false,
        };
        let mut token = self.session.get(SessionKey::AccessToken);

        loop {
            match self.send(&ctx, token.as_deref()).await {
                Err(err) if err.is_unauthorized() && !ctx.retried => {
                    ctx.retried = true;
                    debug!("401 on first attempt, recovering via token refresh");
                    token = Some(self.recover(err).await?);
                }
                result => return result,
            }
        }
    }

    /// Obtain a fresh access token, either by leading a refresh or by
    /// waiting on the one already in flight.
    async fn recover(&self, original: ClientError) -> Result<String> {
        match self.coordinator.join() {
            RefreshRole::Waiter(waiter) => {
                metrics::record_refresh_waiter();
                waiter.wait().await
            }
            RefreshRole::Leader(lease) => {
                let outcome = self.refresh_tokens(original).await;
                if outcome.is_err() {
                    self.end_session();
                }
                let settled = lease.settle(outcome.clone());
                match &outcome {
                    Ok(_) => info!(waiters = settled, "token refresh succeeded"),
                    Err(e) => warn!(waiters = settled, error = %e, "token refresh failed, session ended"),
                }
                outcome
            }
        }
    }

    /// Perform the refresh call and persist the new pair.
    ///
    /// Without a stored refresh token the original 401 is the result.
    async fn refresh_tokens(&self, original: ClientError) -> Result<String> {
        let Some(refresh) = self.session.get(SessionKey::RefreshToken) else {
            metrics::record_refresh(metrics::REFRESH_NO_REFRESH_TOKEN);
            warn!("no refresh token stored");
            return Err(original);
        };

        let pair = match crm_auth::refresh_session(
            &self.refresh_http,
            &self.base_url,
            &refresh,
            self.refresh_timeout,
        )
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                let outcome = match e {
                    crm_auth::Error::InvalidCredentials(_) => metrics::REFRESH_REJECTED,
                    _ => metrics::REFRESH_FAILED,
                };
                metrics::record_refresh(outcome);
                return Err(e.into());
            }
        };

        match crm_auth::store_pair(self.session.as_ref(), &pair) {
            Ok(access) => {
                metrics::record_refresh(metrics::REFRESH_SUCCESS);
                Ok(access)
            }
            Err(e) => {
                if matches!(e, crm_auth::Error::MissingAccessToken) {
                    metrics::record_refresh(metrics::REFRESH_MISSING_ACCESS_TOKEN);
                } else {
                    metrics::record_refresh(metrics::REFRESH_FAILED);
                }
                Err(e.into())
            }
        }
    }

    /// Clear both tokens and send the application back to login.
    fn end_session(&self) {
        if let Err(e) = crm_auth::clear_session(self.session.as_ref()) {
            warn!(error = %e, "failed to clear session tokens");
        }
        self.navigator.navigate(LOGIN_ROUTE);
    }

    /// One HTTP attempt. Non-2xx responses become `ClientError::Status`.
    async fn send(&self, ctx: &RequestContext<'_>, token: Option<&str>) -> Result<ApiResponse> {
        let multipart = ctx.body.is_some_and(RequestBody::is_multipart);

        let mut builder = self.http.request(ctx.method.clone(), &ctx.url);
        for (name, value) in &ctx.options.headers {
            // Multipart needs the transport's boundary; the credential is ours to set
            if (multipart && *name == CONTENT_TYPE) || (token.is_some() && *name == AUTHORIZATION) {
                continue;
            }
            builder = builder.header(name, value);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match ctx.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Multipart(payload)) => builder.multipart(payload.to_form()?),
            None => builder,
        };

        debug!(url = %ctx.url, retried = ctx.retried, authenticated = token.is_some(), "sending request");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_request(ctx.method.as_str(), 0);
                return Err(ClientError::Transport(e.to_string()));
            }
        };

        let status = response.status();
        metrics::record_request(ctx.method.as_str(), status.as_u16());
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(format!("reading response body: {e}")))?;

        if status.is_success() {
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        } else {
            debug!(%status, "request failed");
            Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }
}

/// Builder for `ApiClient`.
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    session: Option<Arc<dyn SessionStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    timeout: Option<Duration>,
    refresh_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ApiClientBuilder {
    /// Absolute API base URL, e.g. `http://localhost:3000/api/v1`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn session(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session = Some(store);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Timeout for ordinary API calls.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Upper bound on the refresh call. Requests queued behind a refresh
    /// fail once it elapses.
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<ApiClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::Configuration(format!(
                "base_url must start with http:// or https://, got: {base_url}"
            )));
        }

        let session = self
            .session
            .ok_or_else(|| ClientError::Configuration("session store is required".into()))?;
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(log_navigator) as Arc<dyn Navigator>);
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let mut http = reqwest::Client::builder().user_agent(user_agent.clone());
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http
            .build()
            .map_err(|e| ClientError::Configuration(format!("building HTTP client: {e}")))?;

        let refresh_http = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ClientError::Configuration(format!("building refresh client: {e}")))?;

        Ok(ApiClient {
            http,
            refresh_http,
            base_url: base_url.into(),
            session,
            navigator,
            coordinator: Arc::new(RefreshCoordinator::new()),
            refresh_timeout: self.refresh_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_auth::MemorySessionStore;

    fn client(base: &str) -> Result<ApiClient> {
        ApiClient::builder()
            .base_url(base)
            .session(Arc::new(MemorySessionStore::new()))
            .build()
    }

    #[test]
    fn builder_requires_base_url() {
        let result = ApiClient::builder()
            .session(Arc::new(MemorySessionStore::new()))
            .build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn builder_requires_session_store() {
        let result = ApiClient::builder()
            .base_url("http://localhost:3000/api/v1")
            .build();
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }

    #[test]
    fn builder_rejects_relative_base_url() {
        assert!(matches!(
            client("/api/v1"),
            Err(ClientError::Configuration(_))
        ));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = client("http://localhost:3000/api/v1/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api/v1");
        assert_eq!(
            client.url("/customers"),
            "http://localhost:3000/api/v1/customers"
        );
        assert_eq!(
            client.url("customers/7"),
            "http://localhost:3000/api/v1/customers/7"
        );
    }

    #[test]
    fn clones_share_coordinator() {
        let a = client("http://localhost:3000").unwrap();
        let b = a.clone();
        let lease = a.coordinator().begin_refresh();
        assert!(lease.is_some());
        assert!(b.coordinator().is_refreshing());
    }

    #[test]
    fn separate_clients_do_not_share_coordinator() {
        let a = client("http://localhost:3000").unwrap();
        let b = client("http://localhost:3000").unwrap();
        let _lease = a.coordinator().begin_refresh();
        assert!(!b.coordinator().is_refreshing());
    }

    #[test]
    fn empty_body_decodes_as_null() {
        let response = ApiResponse {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        };
        assert_eq!(response.value().unwrap(), serde_json::Value::Null);
        let none: Option<serde_json::Value> = response.json().unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn invalid_json_is_decode_error() {
        let response = ApiResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"<html>"),
        };
        assert!(matches!(response.value(), Err(ClientError::Decode(_))));
    }
}
