//! Token endpoint calls
//!
//! Both calls go straight through a bare `reqwest::Client`, never through the
//! authenticated API client: the refresh call in particular must not be
//! intercepted by the same 401 handling it is recovering from.
//!
//! Wire format (camelCase JSON):
//! - `POST <base>/auth/refresh` `{"refreshToken"}` -> `{"accessToken", "refreshToken"?}`
//! - `POST <base>/auth/login` `{"email", "password"}` -> same pair

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{LOGIN_PATH, REFRESH_PATH};
use crate::error::{Error, Result};

/// Token pair returned by the login and refresh endpoints.
///
/// Both fields are optional on the wire. A refresh response without an
/// access token is a failed refresh; a missing refresh token means the old
/// one stays valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenPair {
    /// Non-empty access token, if any.
    pub fn access(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Non-empty rotated refresh token, if any.
    pub fn refresh(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Exchange a refresh token for a new token pair.
///
/// `timeout` bounds the whole call so a hung refresh cannot stall every
/// request queued behind it.
pub async fn refresh_session(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
    timeout: Option<Duration>,
) -> Result<TokenPair> {
    let url = format!("{base_url}{REFRESH_PATH}");
    debug!(%url, "requesting token refresh");

    let mut request = client.post(&url).json(&RefreshRequest {
        refresh_token: refresh,
    });
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    read_token_pair(response, "refresh").await
}

/// Exchange email and password for a token pair.
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &str,
) -> Result<TokenPair> {
    let url = format!("{base_url}{LOGIN_PATH}");
    debug!(%url, "requesting login");

    let response = client
        .post(&url)
        .json(&LoginRequest { email, password })
        .send()
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    let pair = read_token_pair(response, "login").await?;
    if pair.access().is_none() {
        return Err(Error::MissingAccessToken);
    }
    Ok(pair)
}

async fn read_token_pair(response: reqwest::Response, call: &str) -> Result<TokenPair> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh token (or password) was rejected outright
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::InvalidCredentials(format!(
                "{call} rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "{call} returned {status}: {body}"
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Http(format!("reading {call} response: {e}")))?;
    parse_token_pair(&bytes)
        .map_err(|e| Error::TokenExchange(format!("invalid {call} response: {e}")))
}

/// Parse a token response body. An empty or `null` body is an empty pair.
fn parse_token_pair(bytes: &[u8]) -> serde_json::Result<TokenPair> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(TokenPair::default());
    }
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    match value {
        serde_json::Value::Object(_) => serde_json::from_value(value),
        _ => Ok(TokenPair::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn token_pair_deserializes_camel_case() {
        let json = r#"{"accessToken":"A2","refreshToken":"R2"}"#;
        let pair: TokenPair = serde_json::from_str(json).unwrap();
        assert_eq!(pair.access(), Some("A2"));
        assert_eq!(pair.refresh(), Some("R2"));
    }

    #[test]
    fn token_pair_tolerates_missing_refresh() {
        let pair = parse_token_pair(br#"{"accessToken":"A2"}"#).unwrap();
        assert_eq!(pair.access(), Some("A2"));
        assert_eq!(pair.refresh(), None);
    }

    #[test]
    fn empty_strings_count_as_missing() {
        let pair = parse_token_pair(br#"{"accessToken":"","refreshToken":""}"#).unwrap();
        assert_eq!(pair.access(), None);
        assert_eq!(pair.refresh(), None);
    }

    #[test]
    fn non_object_bodies_yield_empty_pair() {
        assert_eq!(parse_token_pair(b"").unwrap(), TokenPair::default());
        assert_eq!(parse_token_pair(b"null").unwrap(), TokenPair::default());
        assert_eq!(parse_token_pair(b"\"ok\"").unwrap(), TokenPair::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_token_pair(b"{not json").is_err());
    }

    #[tokio::test]
    async fn refresh_sends_refresh_token_and_parses_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/refresh"))
            .and(body_json(serde_json::json!({"refreshToken": "R1"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"accessToken": "A2"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let base = format!("{}/api/v1", server.uri());
        let pair = refresh_session(&reqwest::Client::new(), &base, "R1", None)
            .await
            .unwrap();
        assert_eq!(pair.access(), Some("A2"));
        assert_eq!(pair.refresh(), None);
    }

    #[tokio::test]
    async fn refresh_rejection_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
            .mount(&server)
            .await;

        let err = refresh_session(&reqwest::Client::new(), &server.uri(), "R1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn refresh_server_error_is_token_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = refresh_session(&reqwest::Client::new(), &server.uri(), "R1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TokenExchange(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn refresh_timeout_fails_instead_of_hanging() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"accessToken": "A2"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = refresh_session(
            &reqwest::Client::new(),
            &server.uri(),
            "R1",
            Some(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn login_requires_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = login(&reqwest::Client::new(), &server.uri(), "a@b.c", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingAccessToken));
    }

    #[tokio::test]
    async fn login_returns_pair() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(
                serde_json::json!({"email": "admin@example.com", "password": "pw"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"accessToken": "A1", "refreshToken": "R1"}),
            ))
            .mount(&server)
            .await;

        let pair = login(
            &reqwest::Client::new(),
            &server.uri(),
            "admin@example.com",
            "pw",
        )
        .await
        .unwrap();
        assert_eq!(pair.access(), Some("A1"));
        assert_eq!(pair.refresh(), Some("R1"));
    }
}
