// Runtime configuration.
// Reads project credentials and sync tunables from FILESTASH_* environment variables.

use std::time::Duration;

use crate::error::{Result, StashError};

const DEFAULT_BUCKET: &str = "images";
const DEFAULT_PROBE_URL: &str = "https://www.google.com/";

/// Default freshness window for the cached file listing: 1 hour.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
/// Base delay before the first automatic retry; doubles per attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Automatic retries before a refresh is reported as failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Upper bound on a single remote call made by the coordinator.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Lifetime of signed preview/download URLs.
pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(3600);
/// Interval between connectivity probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(15);

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted project, without a trailing slash.
    pub project_url: String,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
    /// Storage bucket holding user files.
    pub bucket: String,
    pub cache_ttl: Duration,
    pub retry_delay: Duration,
    pub max_retries: u32,
    pub request_timeout: Duration,
    pub signed_url_ttl: Duration,
    pub probe_url: String,
    pub probe_interval: Duration,
}

impl Config {
    /// Build a configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_url = lookup("FILESTASH_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(StashError::MissingCredentials("FILESTASH_URL"))?
            .trim()
            .trim_end_matches('/')
            .to_string();
        let anon_key = lookup("FILESTASH_ANON_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(StashError::MissingCredentials("FILESTASH_ANON_KEY"))?;

        if !project_url.starts_with("http://") && !project_url.starts_with("https://") {
            return Err(StashError::Config(format!(
                "FILESTASH_URL must be an http(s) URL, got {}",
                project_url
            )));
        }

        let bucket = lookup("FILESTASH_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string());
        let probe_url =
            lookup("FILESTASH_PROBE_URL").unwrap_or_else(|| DEFAULT_PROBE_URL.to_string());

        let max_retries = match lookup("FILESTASH_MAX_RETRIES") {
            Some(raw) => {
                let value = parse_number("FILESTASH_MAX_RETRIES", &raw)?;
                u32::try_from(value).map_err(|_| {
                    StashError::Config(format!("FILESTASH_MAX_RETRIES is too large: {}", value))
                })?
            }
            None => DEFAULT_MAX_RETRIES,
        };

        Ok(Self {
            project_url,
            anon_key,
            bucket,
            cache_ttl: duration_secs(&lookup, "FILESTASH_CACHE_TTL_SECS", DEFAULT_CACHE_TTL)?,
            retry_delay: duration_millis(&lookup, "FILESTASH_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY)?,
            max_retries,
            request_timeout: duration_secs(
                &lookup,
                "FILESTASH_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT,
            )?,
            signed_url_ttl: duration_secs(
                &lookup,
                "FILESTASH_SIGNED_URL_TTL_SECS",
                DEFAULT_SIGNED_URL_TTL,
            )?,
            probe_url,
            probe_interval: duration_secs(
                &lookup,
                "FILESTASH_PROBE_INTERVAL_SECS",
                DEFAULT_PROBE_INTERVAL,
            )?,
        })
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| StashError::Config(format!("{} must be a whole number, got {:?}", key, raw)))
}

fn duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => Ok(Duration::from_secs(parse_number(key, &raw)?)),
        None => Ok(default),
    }
}

fn duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => Ok(Duration::from_millis(parse_number(key, &raw)?)),
        None => Ok(default),
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
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("FILESTASH_URL", "https://demo.supabase.co/"),
            ("FILESTASH_ANON_KEY", "anon"),
        ]))
        .unwrap();

        assert_eq!(config.project_url, "https://demo.supabase.co");
        assert_eq!(config.bucket, "images");
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.retry_delay, Duration::from_millis(1000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.signed_url_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("FILESTASH_URL", "http://localhost:54321"),
            ("FILESTASH_ANON_KEY", "anon"),
            ("FILESTASH_BUCKET", "docs"),
            ("FILESTASH_CACHE_TTL_SECS", "60"),
            ("FILESTASH_RETRY_DELAY_MS", "250"),
            ("FILESTASH_MAX_RETRIES", "5"),
        ]))
        .unwrap();

        assert_eq!(config.bucket, "docs");
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn test_missing_url() {
        let err = Config::from_lookup(lookup_from(&[("FILESTASH_ANON_KEY", "anon")])).unwrap_err();
        assert!(matches!(err, StashError::MissingCredentials("FILESTASH_URL")));
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = Config::from_lookup(lookup_from(&[
            ("FILESTASH_URL", "https://demo.supabase.co"),
            ("FILESTASH_ANON_KEY", "anon"),
            ("FILESTASH_CACHE_TTL_SECS", "an hour"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StashError::Config(_)));

        let err = Config::from_lookup(lookup_from(&[
            ("FILESTASH_URL", "demo.supabase.co"),
            ("FILESTASH_ANON_KEY", "anon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StashError::Config(_)));
    }

    #[test]
    fn test_max_retries_out_of_range() {
        let err = Config::from_lookup(lookup_from(&[
            ("FILESTASH_URL", "https://demo.supabase.co"),
            ("FILESTASH_ANON_KEY", "anon"),
            ("FILESTASH_MAX_RETRIES", "4294967296"),
        ]))
        .unwrap_err();
        assert!(matches!(err, StashError::Config(_)));
    }
}
