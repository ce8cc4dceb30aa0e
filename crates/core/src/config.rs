use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub listing: ListingConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `QLIST_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("QLIST_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            listing: ListingConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        let l = &self.listing;
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  listing:     max_results={}, batch_size={}, max_jobs={}",
            l.max_results,
            l.batch_size,
            l.max_jobs
        );
        tracing::info!(
            "  expiration:  {}s, uri_prefix={}",
            l.expiration_secs,
            l.uri_prefix
        );
    }

    /// Return a JSON view of the effective configuration.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "listing": self.listing,
        })
    }
}

// ── Listing ───────────────────────────────────────────────────

/// Tuning for listing requests: result cap, expiration, and capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Maximum number of item summaries retained per job.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// How long a finished job stays queryable before the sweep evicts it.
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: u64,
    /// Maximum number of jobs tracked at once.
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
    /// Items per batch for the queue enumerator.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Base of each job's polling URI (`{uri_prefix}/{id}`).
    #[serde(default = "default_uri_prefix")]
    pub uri_prefix: String,
}

fn default_max_results() -> usize { 100 }
fn default_expiration_secs() -> u64 { 300 }
fn default_max_jobs() -> usize { 1000 }
fn default_batch_size() -> usize { 100 }
fn default_uri_prefix() -> String { "/listing-requests".to_string() }

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            expiration_secs: default_expiration_secs(),
            max_jobs: default_max_jobs(),
            batch_size: default_batch_size(),
            uri_prefix: default_uri_prefix(),
        }
    }
}

impl ListingConfig {
    /// Unprofiled shortcut for [`Config::from_env`]'s listing section.
    pub fn from_env() -> Self {
        Self::from_env_profiled("")
    }

    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_results: profiled_env_usize(p, "LISTING_MAX_RESULTS", default_max_results()),
            expiration_secs: profiled_env_u64(p, "LISTING_EXPIRATION_SECS", default_expiration_secs()),
            max_jobs: profiled_env_usize(p, "LISTING_MAX_JOBS", default_max_jobs()),
            batch_size: profiled_env_usize(p, "LISTING_BATCH_SIZE", default_batch_size()),
            uri_prefix: profiled_env_or(p, "LISTING_URI_PREFIX", &default_uri_prefix()),
        }
    }

    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_secs)
    }

    /// Reject values that would make every job useless or untrackable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_results", self.max_results),
            ("max_jobs", self.max_jobs),
            ("batch_size", self.batch_size),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Polling URI for a job id.
    pub fn uri_for(&self, id: impl std::fmt::Display) -> String {
        format!("{}/{}", self.uri_prefix.trim_end_matches('/'), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_defaults() {
        let c = ListingConfig::default();
        assert_eq!(c.max_results, 100);
        assert_eq!(c.expiration(), Duration::from_secs(300));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_listing_serde_defaults() {
        let c: ListingConfig = serde_json::from_str(r#"{"max_results": 10}"#).unwrap();
        assert_eq!(c.max_results, 10);
        assert_eq!(c.batch_size, 100);
        assert_eq!(c.uri_prefix, "/listing-requests");
    }

    #[test]
    fn test_validate_rejects_zero() {
        let c = ListingConfig { batch_size: 0, ..Default::default() };
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_uri_for_trims_trailing_slash() {
        let c = ListingConfig { uri_prefix: "/api/listings/".to_string(), ..Default::default() };
        assert_eq!(c.uri_for("abc"), "/api/listings/abc");
    }

    #[test]
    fn test_summary_json() {
        let config = Config { profile: String::new(), listing: ListingConfig::default() };
        let json = config.summary();
        assert_eq!(json["profile"], "default");
        assert_eq!(json["listing"]["max_results"], 100);
    }

    #[test]
    fn test_profiled_env_lookup() {
        // Prefix unique to this test so parallel tests don't collide.
        env::set_var("QLTESTPROF_LISTING_MAX_RESULTS", "7");
        env::set_var("QLTESTPROF_LISTING_BATCH_SIZE", "not-a-number");
        let config = Config::for_profile("qltestprof");
        assert_eq!(config.profile_label(), "QLTESTPROF");
        assert_eq!(config.listing.max_results, 7);
        assert_eq!(config.listing.batch_size, 100);
        env::remove_var("QLTESTPROF_LISTING_MAX_RESULTS");
        env::remove_var("QLTESTPROF_LISTING_BATCH_SIZE");
    }
}
