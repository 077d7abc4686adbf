//! Cart subsystem configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CART_API_URL` - Base URL of the cart service (e.g., `https://api.example.com/cart`)
//!
//! ## Optional
//! - `CART_API_TOKEN` - Bearer token sent with every cart request
//! - `CART_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `CART_TOAST_MILLIS` - Auto-dismiss duration for toasts (default: 1200)
//! - `CART_BADGE_COUNT` - Number of cart badge elements on the page (default: 1)
//! - `CART_USER_ID` - Session value identifying the cart owner
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TOAST_MILLIS: u64 = 1_200;
const DEFAULT_BADGE_COUNT: usize = 1;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart subsystem configuration.
///
/// Implements `Debug` manually to redact the API token.
#[derive(Clone)]
pub struct CartConfig {
    /// Base URL of the cart service; user paths are appended to it
    pub api_url: Url,
    /// Optional bearer token for the cart service
    pub api_token: Option<SecretString>,
    /// Timeout applied to every request; a hung request holds its
    /// product's lock at most this long
    pub request_timeout: Duration,
    /// Fixed auto-dismiss duration for toasts
    pub toast_duration: Duration,
    /// Number of badge counter elements to keep in sync
    pub badge_count: usize,
    /// Raw session value identifying the cart owner
    pub user_id: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for CartConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartConfig")
            .field("api_url", &self.api_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("toast_duration", &self.toast_duration)
            .field("badge_count", &self.badge_count)
            .field("user_id", &self.user_id)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl CartConfig {
    /// Configuration with defaults for everything but the service URL.
    #[must_use]
    pub const fn new(api_url: Url) -> Self {
        Self {
            api_url,
            api_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            toast_duration: Duration::from_millis(DEFAULT_TOAST_MILLIS),
            badge_count: DEFAULT_BADGE_COUNT,
            user_id: None,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = EnvReader { lookup };

        let raw_url = env.required("CART_API_URL")?;
        let api_url = Url::parse(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("CART_API_URL".to_string(), e.to_string()))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "CART_API_URL".to_string(),
                format!("unsupported scheme {}", api_url.scheme()),
            ));
        }

        let request_timeout = Duration::from_secs(
            env.parsed("CART_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
        );
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "CART_REQUEST_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_url,
            api_token: env.optional("CART_API_TOKEN").map(SecretString::from),
            request_timeout,
            toast_duration: Duration::from_millis(
                env.parsed("CART_TOAST_MILLIS", DEFAULT_TOAST_MILLIS)?,
            ),
            badge_count: env.parsed("CART_BADGE_COUNT", DEFAULT_BADGE_COUNT)?,
            user_id: env.optional("CART_USER_ID"),
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.api_url.as_str().trim_end_matches('/').to_string()
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<CartConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        CartConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("CART_API_URL", "https://api.example.com/cart/")]).unwrap();
        assert_eq!(config.base_url(), "https://api.example.com/cart");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.toast_duration, Duration::from_millis(1_200));
        assert_eq!(config.badge_count, 1);
        assert!(config.api_token.is_none());
        assert!(config.user_id.is_none());
    }

    #[test]
    fn test_missing_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "CART_API_URL"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let err = load(&[("CART_API_URL", "ftp://example.com/cart")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(..)));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("CART_API_URL", "http://localhost:8080/cart"),
            ("CART_API_TOKEN", "tok_123"),
            ("CART_REQUEST_TIMEOUT_SECS", "3"),
            ("CART_TOAST_MILLIS", "800"),
            ("CART_BADGE_COUNT", "2"),
            ("CART_USER_ID", "17"),
        ])
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.toast_duration, Duration::from_millis(800));
        assert_eq!(config.badge_count, 2);
        assert_eq!(config.user_id.as_deref(), Some("17"));
        assert_eq!(
            config.api_token.as_ref().map(|t| t.expose_secret().to_string()),
            Some("tok_123".to_string())
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = load(&[
            ("CART_API_URL", "http://localhost:8080/cart"),
            ("CART_REQUEST_TIMEOUT_SECS", "0"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "CART_REQUEST_TIMEOUT_SECS"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = CartConfig::new(Url::parse("http://localhost/cart").unwrap());
        config.api_token = Some(SecretString::from("super-private"));
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-private"));
        assert!(debug.contains("[REDACTED]"));
    }
}
