//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the session store
//!   (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `BACKEND_URL` - Base URL of the back office API (e.g. `http://127.0.0.1:3001/`)
//! - `BACKEND_API_TOKEN` - Bearer token for the back office API
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `BACKEND_TIMEOUT_MS` - Deadline for one backend call (default: 5000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::BTreeMap;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default deadline for one backend call.
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 5000;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_BITS_PER_CHAR: f64 = 3.3;

/// Substrings that give away a copied example value (matched case-insensitively).
const PLACEHOLDERS: &[&str] = &[
    "changeme",
    "placeholder",
    "example",
    "your-",
    "secret",
    "password",
    "xxx",
    "todo",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid environment variable {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Insecure secret in {key}: {reason}")]
    Insecure { key: &'static str, reason: String },
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Session store connection URL (contains password)
    pub database_url: SecretString,
    pub host: IpAddr,
    pub port: u16,
    /// Public base URL; `https://` turns on secure cookies
    pub base_url: String,
    pub session_secret: SecretString,
    pub backend: BackendConfig,
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Back office API connection settings.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL; API paths are joined onto it
    pub base_url: Url,
    /// Bearer token sent on every call
    pub api_token: SecretString,
    /// Deadline for one call, connect included
    pub timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables, reading `.env` first
    /// when one exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing, a value does
    /// not parse, or a secret looks like a placeholder or is too weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: database_url("STOREFRONT_DATABASE_URL")?,
            host: parse_env("STOREFRONT_HOST", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
            port: parse_env("STOREFRONT_PORT", 3000)?,
            base_url: required("STOREFRONT_BASE_URL")?,
            session_secret: secret("STOREFRONT_SESSION_SECRET")?,
            backend: BackendConfig::from_env()?,
            sentry_dsn: optional("SENTRY_DSN"),
            sentry_environment: optional("SENTRY_ENVIRONMENT"),
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should be marked `Secure`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_backend_url(&required("BACKEND_URL")?)?,
            api_token: secret("BACKEND_API_TOKEN")?,
            timeout: Duration::from_millis(parse_env(
                "BACKEND_TIMEOUT_MS",
                DEFAULT_BACKEND_TIMEOUT_MS,
            )?),
        })
    }
}

/// Non-empty value of `key`.
fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

/// Parse `key` if set, otherwise use `default`.
fn parse_env<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    optional(key).map_or(Ok(default), |raw| {
        raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
    })
}

fn database_url(key: &'static str) -> Result<SecretString, ConfigError> {
    optional(key)
        .or_else(|| optional("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or(ConfigError::Missing(key))
}

/// Required secret that passes [`check_secret`].
fn secret(key: &'static str) -> Result<SecretString, ConfigError> {
    let value = required(key)?;
    check_secret(key, &value)?;
    Ok(SecretString::from(value))
}

/// Parse the backend base URL so relative API paths join under it.
fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "BACKEND_URL",
        reason,
    };
    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme: {}", url.scheme())));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Shannon entropy of `value` in bits per character.
fn bits_per_char(value: &str) -> f64 {
    let counts = value.chars().fold(BTreeMap::new(), |mut counts, c| {
        *counts.entry(c).or_insert(0_u32) += 1;
        counts
    });
    let len = f64::from(counts.values().sum::<u32>());

    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject short, placeholder-looking, or low-entropy secrets.
fn check_secret(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| ConfigError::Insecure { key, reason };

    if value.len() < MIN_SECRET_LENGTH {
        return Err(insecure(format!(
            "must be at least {MIN_SECRET_LENGTH} characters (got {})",
            value.len()
        )));
    }

    let lower = value.to_lowercase();
    if let Some(word) = PLACEHOLDERS.iter().find(|word| lower.contains(*word)) {
        return Err(insecure(format!("looks like a placeholder (contains '{word}')")));
    }

    let bits = bits_per_char(value);
    if bits < MIN_BITS_PER_CHAR {
        return Err(insecure(format!(
            "entropy {bits:.2} bits/char is below {MIN_BITS_PER_CHAR:.1}; generate it randomly"
        )));
    }

    Ok(())
}
