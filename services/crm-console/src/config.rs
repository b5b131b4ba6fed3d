//! Configuration types and loading
//!
//! The file is picked by `--config`, then CONFIG_PATH, then the default
//! name. Field precedence: env vars > config file > defaults.
//! Every field has a default, so an empty file is a valid config. The
//! session file holds live tokens and is never named by an env var.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Env var overriding the resolved API base URL.
pub const BASE_URL_ENV: &str = "CRM_API_BASE_URL";

/// Config file read when neither `--config` nor CONFIG_PATH names one.
/// Unlike an explicit path, it may be absent.
pub const DEFAULT_CONFIG_PATH: &str = "crm-console.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Base URL after env overlay, set by `load`.
    #[serde(skip)]
    base_url: String,
}

/// CRM API connection settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Scheme and host the base path is resolved against.
    #[serde(default = "default_origin")]
    pub origin: String,
    /// Relative path (`/api/v1`) or absolute URL.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub refresh_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            base_path: default_base_path(),
            timeout_secs: default_timeout(),
            refresh_timeout_secs: default_timeout(),
        }
    }
}

/// Session persistence settings
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_base_path() -> String {
    crm_auth::DEFAULT_BASE_PATH.into()
}

fn default_timeout() -> u64 {
    30
}

fn default_session_path() -> PathBuf {
    PathBuf::from("crm-session.json")
}

/// Join `base` onto `origin` unless it is already absolute; strip any
/// trailing slash.
fn resolve_base_url(origin: &str, base: &str) -> String {
    let joined = if base.starts_with("http://") || base.starts_with("https://") {
        base.to_owned()
    } else if base.starts_with('/') {
        format!("{}{base}", origin.trim_end_matches('/'))
    } else {
        format!("{}/{base}", origin.trim_end_matches('/'))
    };
    joined.trim_end_matches('/').to_owned()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::parse(""),
            Err(e) => Err(e.into()),
        }
    }

    fn parse(contents: &str) -> common::Result<Self> {
        let mut config: Config = toml::from_str(contents)?;

        let base = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| config.api.base_path.clone());
        config.base_url = resolve_base_url(&config.api.origin, base.trim());

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "API base URL must start with http:// or https://, got: {}",
                self.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.api.refresh_timeout_secs == 0 {
            return Err(common::Error::Config(
                "refresh_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.session.path.as_os_str().is_empty() {
            return Err(common::Error::Config("session.path must not be empty".into()));
        }

        Ok(())
    }

    /// Absolute API base URL, e.g. `http://localhost:3000/api/v1`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.api.refresh_timeout_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }
}
