use anyhow::{anyhow, Context, Result};
use axum::http::HeaderValue;
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub const CONNECTION: Self = Self {
        window_secs: 60,
        max_requests: 5,
    };

    pub const REVIEW: Self = Self {
        window_secs: 300,
        max_requests: 2,
    };

    pub fn window_millis(&self) -> i64 {
        (self.window_secs as i64).saturating_mul(1000)
    }
}

/// Runtime configuration, built once at startup and handed to the router.
///
/// The webhook URLs are secrets: they are never logged and never echoed back
/// to clients. An unset URL is not a boot failure; the matching handler
/// answers 500 until it is configured.
#[derive(Clone)]
pub struct Config {
    pub allowed_origin: HeaderValue,
    pub connection_webhook_url: Option<String>,
    pub review_webhook_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub connection_limit: RateLimitConfig,
    pub review_limit: RateLimitConfig,
    pub rate_limit_max_entries: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("allowed_origin", &self.allowed_origin)
            .field(
                "connection_webhook_url",
                &self.connection_webhook_url.as_ref().map(|_| "<redacted>"),
            )
            .field(
                "review_webhook_url",
                &self.review_webhook_url.as_ref().map(|_| "<redacted>"),
            )
            .field("bind_addr", &self.bind_addr)
            .field("connection_limit", &self.connection_limit)
            .field("review_limit", &self.review_limit)
            .field("rate_limit_max_entries", &self.rate_limit_max_entries)
            .finish()
    }
}

impl Config {
    pub fn new(allowed_origin: HeaderValue) -> Self {
        Self {
            allowed_origin,
            connection_webhook_url: None,
            review_webhook_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            connection_limit: RateLimitConfig::CONNECTION,
            review_limit: RateLimitConfig::REVIEW,
            rate_limit_max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so it can be
    /// exercised without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let allowed_origin = lookup("ALLOWED_ORIGIN")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("ALLOWED_ORIGIN must be set"))?;
        let allowed_origin =
            HeaderValue::from_str(&allowed_origin).context("Invalid ALLOWED_ORIGIN")?;

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr = bind_raw
            .parse()
            .with_context(|| format!("Invalid BIND_ADDR '{}'", bind_raw))?;

        let connection_limit = RateLimitConfig {
            window_secs: parse_or(
                &lookup,
                "CONNECTION_RATE_WINDOW_SECS",
                RateLimitConfig::CONNECTION.window_secs,
            )?,
            max_requests: parse_or(
                &lookup,
                "CONNECTION_RATE_MAX",
                RateLimitConfig::CONNECTION.max_requests,
            )?,
        };
        let review_limit = RateLimitConfig {
            window_secs: parse_or(
                &lookup,
                "REVIEW_RATE_WINDOW_SECS",
                RateLimitConfig::REVIEW.window_secs,
            )?,
            max_requests: parse_or(
                &lookup,
                "REVIEW_RATE_MAX",
                RateLimitConfig::REVIEW.max_requests,
            )?,
        };

        Ok(Self {
            allowed_origin,
            connection_webhook_url: secret(&lookup, "CONNECTION_WEBHOOK_URL"),
            review_webhook_url: secret(&lookup, "REVIEW_WEBHOOK_URL"),
            bind_addr,
            connection_limit,
            review_limit,
            rate_limit_max_entries: parse_or(
                &lookup,
                "RATE_LIMIT_MAX_ENTRIES",
                DEFAULT_MAX_ENTRIES,
            )?,
        })
    }
}

fn secret<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn requires_allowed_origin() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("ALLOWED_ORIGIN"));
    }

    #[test]
    fn rejects_origin_that_is_not_a_header_value() {
        let err = Config::from_lookup(lookup_from(&[(
            "ALLOWED_ORIGIN",
            "https://example.com\u{7f}",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("Invalid ALLOWED_ORIGIN"));
    }

    #[test]
    fn applies_defaults() {
        let config =
            Config::from_lookup(lookup_from(&[("ALLOWED_ORIGIN", "https://example.com")]))
                .unwrap();
        assert_eq!(config.allowed_origin, "https://example.com");
        assert!(config.connection_webhook_url.is_none());
        assert!(config.review_webhook_url.is_none());
        assert_eq!(config.connection_limit, RateLimitConfig::CONNECTION);
        assert_eq!(config.review_limit, RateLimitConfig::REVIEW);
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.rate_limit_max_entries, 10_000);
    }

    #[test]
    fn empty_webhook_url_counts_as_unset() {
        let config = Config::from_lookup(lookup_from(&[
            ("ALLOWED_ORIGIN", "https://example.com"),
            ("CONNECTION_WEBHOOK_URL", "   "),
            ("REVIEW_WEBHOOK_URL", "https://hooks.example/review"),
        ]))
        .unwrap();
        assert!(config.connection_webhook_url.is_none());
        assert_eq!(
            config.review_webhook_url.as_deref(),
            Some("https://hooks.example/review")
        );
    }

    #[test]
    fn overrides_rate_limits() {
        let config = Config::from_lookup(lookup_from(&[
            ("ALLOWED_ORIGIN", "https://example.com"),
            ("REVIEW_RATE_WINDOW_SECS", "10"),
            ("REVIEW_RATE_MAX", "7"),
        ]))
        .unwrap();
        assert_eq!(
            config.review_limit,
            RateLimitConfig {
                window_secs: 10,
                max_requests: 7
            }
        );
        assert_eq!(config.connection_limit, RateLimitConfig::CONNECTION);
    }

    #[test]
    fn rejects_unparsable_numbers() {
        let err = Config::from_lookup(lookup_from(&[
            ("ALLOWED_ORIGIN", "https://example.com"),
            ("CONNECTION_RATE_MAX", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CONNECTION_RATE_MAX"));
    }

    #[test]
    fn debug_output_redacts_urls() {
        let mut config = Config::new(HeaderValue::from_static("https://example.com"));
        config.connection_webhook_url = Some("https://hooks.example/secret-token".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
