//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `YMGS_BACKEND_URL` - Base URL of the pharmacy backend API (http or https)
//!
//! ## Optional
//! - `YMGS_TOKEN_FILE` - Where the auth token is persisted (default: platform data dir)
//! - `YMGS_TOKEN_HEADER` - Header carrying the auth token (default: token)
//! - `YMGS_DELIVERY_FEE` - Flat delivery fee added at checkout (default: 10)
//! - `YMGS_CURRENCY` - Display currency code (default: INR)
//! - `YMGS_PAGE_SIZE` - Products per catalog page (default: 12)
//! - `YMGS_FEATURED_LIMIT` - Best-sellers shown on the landing page (default: 5)
//! - `YMGS_REQUEST_TIMEOUT_SECS` - HTTP request timeout (default: 15)
//! - `YMGS_PRODUCT_CACHE_TTL_SECS` - Single-product cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;
use ymgs_core::CurrencyCode;

use crate::catalog::{DEFAULT_FEATURED_LIMIT, DEFAULT_PAGE_SIZE};
use crate::session::default_token_path;

/// Default header name the backend reads the auth token from.
pub const DEFAULT_TOKEN_HEADER: &str = "token";

const DEFAULT_DELIVERY_FEE: Decimal = Decimal::TEN;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_PRODUCT_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront configuration.
///
/// Implements `Debug` manually to redact the Sentry DSN.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// Backend base URL; endpoint paths are resolved against it
    pub backend_url: Url,
    /// Durable token location; `None` when no data directory could be found
    pub token_file: Option<PathBuf>,
    /// Header name carrying the auth token
    pub token_header: String,
    /// Flat delivery fee added to every order
    pub delivery_fee: Decimal,
    /// Currency used for display
    pub currency: CurrencyCode,
    /// Products per catalog page
    pub page_size: u32,
    /// Number of best-sellers fetched for the landing page
    pub featured_limit: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Lifetime of cached single-product lookups
    pub product_cache_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<SecretString>,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("backend_url", &self.backend_url.as_str())
            .field("token_file", &self.token_file)
            .field("token_header", &self.token_header)
            .field("delivery_fee", &self.delivery_fee)
            .field("currency", &self.currency)
            .field("page_size", &self.page_size)
            .field("featured_limit", &self.featured_limit)
            .field("request_timeout", &self.request_timeout)
            .field("product_cache_ttl", &self.product_cache_ttl)
            .field(
                "sentry_dsn",
                &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl StorefrontConfig {
    /// Configuration with defaults for everything but the backend URL.
    #[must_use]
    pub fn new(backend_url: Url) -> Self {
        Self {
            backend_url,
            token_file: default_token_path(),
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
            delivery_fee: DEFAULT_DELIVERY_FEE,
            currency: CurrencyCode::default(),
            page_size: DEFAULT_PAGE_SIZE,
            featured_limit: DEFAULT_FEATURED_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            product_cache_ttl: Duration::from_secs(DEFAULT_PRODUCT_CACHE_TTL_SECS),
            sentry_dsn: None,
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

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let backend_url = parse_backend_url(&vars.required("YMGS_BACKEND_URL")?)?;
        let mut config = Self::new(backend_url);

        if let Some(path) = vars.optional("YMGS_TOKEN_FILE") {
            config.token_file = Some(PathBuf::from(path));
        }
        if let Some(header) = vars.optional("YMGS_TOKEN_HEADER") {
            config.token_header = header;
        }
        if let Some(fee) = vars.parsed::<Decimal>("YMGS_DELIVERY_FEE")? {
            if fee.is_sign_negative() {
                return Err(ConfigError::InvalidEnvVar(
                    "YMGS_DELIVERY_FEE".to_string(),
                    "must not be negative".to_string(),
                ));
            }
            config.delivery_fee = fee;
        }
        if let Some(currency) = vars.parsed::<CurrencyCode>("YMGS_CURRENCY")? {
            config.currency = currency;
        }
        if let Some(size) = vars.positive("YMGS_PAGE_SIZE")? {
            config.page_size = size;
        }
        if let Some(limit) = vars.positive("YMGS_FEATURED_LIMIT")? {
            config.featured_limit = limit;
        }
        if let Some(secs) = vars.parsed::<u64>("YMGS_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = vars.parsed::<u64>("YMGS_PRODUCT_CACHE_TTL_SECS")? {
            config.product_cache_ttl = Duration::from_secs(secs);
        }
        config.sentry_dsn = vars.optional("SENTRY_DSN").map(SecretString::from);

        Ok(config)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable; blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get and parse an optional variable.
    fn parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            })
            .transpose()
    }

    /// Get an optional non-zero count.
    fn positive(&self, key: &str) -> Result<Option<u32>, ConfigError> {
        match self.parsed::<u32>(key)? {
            Some(0) => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must be at least 1".to_string(),
            )),
            other => Ok(other),
        }
    }
}

fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("YMGS_BACKEND_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "YMGS_BACKEND_URL".to_string(),
            format!("unsupported scheme: {}", url.scheme()),
        ));
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("YMGS_BACKEND_URL", "https://api.ymgs.com")]).unwrap();
        assert_eq!(config.token_header, "token");
        assert_eq!(config.delivery_fee, Decimal::TEN);
        assert_eq!(config.currency, CurrencyCode::INR);
        assert_eq!(config.page_size, 12);
        assert_eq!(config.featured_limit, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_backend_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "YMGS_BACKEND_URL"));
    }

    #[test]
    fn test_rejects_non_http_backend() {
        let err = load(&[("YMGS_BACKEND_URL", "ftp://files.ymgs.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(..)));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("YMGS_BACKEND_URL", "http://localhost:4000"),
            ("YMGS_TOKEN_FILE", "/tmp/ymgs-token"),
            ("YMGS_TOKEN_HEADER", "x-auth"),
            ("YMGS_DELIVERY_FEE", "25.50"),
            ("YMGS_CURRENCY", "USD"),
            ("YMGS_PAGE_SIZE", "24"),
        ])
        .unwrap();
        assert_eq!(config.token_file, Some(PathBuf::from("/tmp/ymgs-token")));
        assert_eq!(config.token_header, "x-auth");
        assert_eq!(config.delivery_fee, Decimal::new(2550, 2));
        assert_eq!(config.currency, CurrencyCode::USD);
        assert_eq!(config.page_size, 24);
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(load(&[("YMGS_BACKEND_URL", "http://x.test"), ("YMGS_PAGE_SIZE", "0")]).is_err());
        assert!(
            load(&[("YMGS_BACKEND_URL", "http://x.test"), ("YMGS_DELIVERY_FEE", "-1")]).is_err()
        );
        assert!(
            load(&[("YMGS_BACKEND_URL", "http://x.test"), ("YMGS_REQUEST_TIMEOUT_SECS", "soon")])
                .is_err()
        );
    }

    #[test]
    fn test_debug_redacts_sentry_dsn() {
        let config = load(&[
            ("YMGS_BACKEND_URL", "http://x.test"),
            ("SENTRY_DSN", "https://key@sentry.example.com/1"),
        ])
        .unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("key@sentry"));
    }
}
