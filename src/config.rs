//! Environment-driven configuration.
//!
//! Every knob is an environment variable (loaded through figment), so the same
//! binary runs locally against a memory-only cache and in production against
//! Redis without a config file. Durations accept human-readable values
//! (`90s`, `5m`, `2h`) parsed by fundu.

use figment::value::UncasedStr;
use figment::{Figment, providers::Env};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::cache::ttl::{PopularityTiers, TtlTiers};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the web service binds to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Redis connection URL. When absent (or unreachable at startup) the
    /// service degrades to a process-local in-memory cache.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Base URL of the upstream search backend.
    #[serde(default = "default_origin_base_url")]
    pub origin_base_url: String,

    /// Log level applied to this crate when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Wall-clock bound on the cache-existence probe, store call included.
    #[serde(default = "default_probe_timeout", deserialize_with = "humane_duration")]
    pub probe_timeout: Duration,

    /// Bound on a prefetch's origin fetch. Prefetches are best-effort, so
    /// this is deliberately tighter than the standard path's timeout.
    #[serde(default = "default_prefetch_timeout", deserialize_with = "humane_duration")]
    pub prefetch_timeout: Duration,

    /// Bound on the standard path's origin fetch.
    #[serde(default = "default_origin_timeout", deserialize_with = "humane_duration")]
    pub origin_timeout: Duration,

    /// How long to wait for a Redis connection before falling back to memory.
    #[serde(default = "default_redis_connect_timeout", deserialize_with = "humane_duration")]
    pub redis_connect_timeout: Duration,

    /// Grace period for in-flight requests on shutdown.
    #[serde(default = "default_shutdown_timeout", deserialize_with = "humane_duration")]
    pub shutdown_timeout: Duration,

    /// Upper bound on tracked distinct queries in the popularity map.
    #[serde(default = "default_popularity_capacity")]
    pub popularity_capacity: usize,

    /// Hit count at which a query enters the "popular" TTL tier.
    #[serde(default = "default_popular_threshold")]
    pub popular_threshold: u64,

    /// Hit count at which a query enters the "high-volume" TTL tier.
    #[serde(default = "default_high_volume_threshold")]
    pub high_volume_threshold: u64,

    /// TTL multiplier for the "popular" tier.
    #[serde(default = "default_popular_multiplier")]
    pub popular_multiplier: f64,

    /// TTL multiplier for the "high-volume" tier.
    #[serde(default = "default_high_volume_multiplier")]
    pub high_volume_multiplier: f64,

    #[serde(default = "default_ttl_staff_directory", deserialize_with = "humane_duration")]
    pub ttl_staff_directory: Duration,

    #[serde(default = "default_ttl_popular_tab", deserialize_with = "humane_duration")]
    pub ttl_popular_tab: Duration,

    #[serde(default = "default_ttl_programs", deserialize_with = "humane_duration")]
    pub ttl_programs: Duration,

    #[serde(default = "default_ttl_tab", deserialize_with = "humane_duration")]
    pub ttl_tab: Duration,

    #[serde(default = "default_ttl_default", deserialize_with = "humane_duration")]
    pub ttl_default: Duration,

    #[serde(default = "default_ttl_search", deserialize_with = "humane_duration")]
    pub ttl_search: Duration,

    #[serde(default = "default_ttl_suggestion", deserialize_with = "humane_duration")]
    pub ttl_suggestion: Duration,

    #[serde(default = "default_ttl_time_sensitive", deserialize_with = "humane_duration")]
    pub ttl_time_sensitive: Duration,

    /// Minimum query length before a keystroke may trigger a prefetch.
    /// Higher than the suggestion threshold so near-empty queries are
    /// never warmed.
    #[serde(default = "default_prefetch_min_query_length")]
    pub prefetch_min_query_length: usize,

    /// Minimum query length for the suggestion endpoint.
    #[serde(default = "default_suggest_min_query_length")]
    pub suggest_min_query_length: usize,

    /// Quiet window for keystroke debouncing on the prefetch trigger.
    #[serde(default = "default_debounce_window", deserialize_with = "humane_duration")]
    pub debounce_window: Duration,
}

impl Config {
    pub fn ttl_tiers(&self) -> TtlTiers {
        TtlTiers {
            staff_directory: self.ttl_staff_directory,
            popular_tab: self.ttl_popular_tab,
            programs: self.ttl_programs,
            tab: self.ttl_tab,
            general: self.ttl_default,
            search: self.ttl_search,
            suggestion: self.ttl_suggestion,
            time_sensitive: self.ttl_time_sensitive,
        }
    }

    pub fn popularity_tiers(&self) -> PopularityTiers {
        PopularityTiers {
            popular_threshold: self.popular_threshold,
            high_volume_threshold: self.high_volume_threshold,
            popular_multiplier: self.popular_multiplier,
            high_volume_multiplier: self.high_volume_multiplier,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            redis_url: None,
            origin_base_url: default_origin_base_url(),
            log_level: default_log_level(),
            probe_timeout: default_probe_timeout(),
            prefetch_timeout: default_prefetch_timeout(),
            origin_timeout: default_origin_timeout(),
            redis_connect_timeout: default_redis_connect_timeout(),
            shutdown_timeout: default_shutdown_timeout(),
            popularity_capacity: default_popularity_capacity(),
            popular_threshold: default_popular_threshold(),
            high_volume_threshold: default_high_volume_threshold(),
            popular_multiplier: default_popular_multiplier(),
            high_volume_multiplier: default_high_volume_multiplier(),
            ttl_staff_directory: default_ttl_staff_directory(),
            ttl_popular_tab: default_ttl_popular_tab(),
            ttl_programs: default_ttl_programs(),
            ttl_tab: default_ttl_tab(),
            ttl_default: default_ttl_default(),
            ttl_search: default_ttl_search(),
            ttl_suggestion: default_ttl_suggestion(),
            ttl_time_sensitive: default_ttl_time_sensitive(),
            prefetch_min_query_length: default_prefetch_min_query_length(),
            suggest_min_query_length: default_suggest_min_query_length(),
            debounce_window: default_debounce_window(),
        }
    }
}

/// Load configuration from the environment.
///
/// Railway exposes its draining window under its own name; map it onto
/// `SHUTDOWN_TIMEOUT` so the grace period follows the platform setting.
pub fn load_config() -> Result<Config, figment::Error> {
    Figment::new()
        .merge(Env::raw().map(|k| {
            if k == UncasedStr::new("RAILWAY_DEPLOYMENT_DRAINING_SECONDS") {
                "SHUTDOWN_TIMEOUT".into()
            } else {
                k.into()
            }
        }))
        .extract()
}

/// Deserialize a human-readable duration string (`"1s"`, `"5m"`, `"2h"`).
/// Bare numbers are seconds.
fn humane_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let parsed = fundu::DurationParser::with_all_time_units()
        .parse(raw.trim())
        .map_err(serde::de::Error::custom)?;
    Duration::try_from(parsed).map_err(serde::de::Error::custom)
}

fn default_port() -> u16 {
    8080
}

fn default_origin_base_url() -> String {
    "http://localhost:9000/s/search.html".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_prefetch_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_origin_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_redis_connect_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_popularity_capacity() -> usize {
    10_000
}

fn default_popular_threshold() -> u64 {
    5
}

fn default_high_volume_threshold() -> u64 {
    20
}

fn default_popular_multiplier() -> f64 {
    1.3
}

fn default_high_volume_multiplier() -> f64 {
    1.5
}

fn default_ttl_staff_directory() -> Duration {
    Duration::from_secs(4 * 60 * 60)
}

fn default_ttl_popular_tab() -> Duration {
    Duration::from_secs(3 * 60 * 60)
}

fn default_ttl_programs() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}

fn default_ttl_tab() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_ttl_default() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_ttl_search() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_ttl_suggestion() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_ttl_time_sensitive() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_prefetch_min_query_length() -> usize {
    4
}

fn default_suggest_min_query_length() -> usize {
    2
}

fn default_debounce_window() -> Duration {
    Duration::from_millis(300)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct DurationHolder {
        #[serde(deserialize_with = "humane_duration")]
        value: Duration,
    }

    fn parse(raw: &str) -> Duration {
        let holder: DurationHolder =
            serde_json::from_str(&format!(r#"{{"value":"{raw}"}}"#)).unwrap();
        holder.value
    }

    #[test]
    fn humane_durations_parse() {
        assert_eq!(parse("90s"), Duration::from_secs(90));
        assert_eq!(parse("5m"), Duration::from_secs(300));
        assert_eq!(parse("2h"), Duration::from_secs(7200));
        // Bare numbers are seconds
        assert_eq!(parse("45"), Duration::from_secs(45));
    }

    #[test]
    fn defaults_are_tiered() {
        let config = Config::default();
        let tiers = config.ttl_tiers();
        // Longest-lived content first, time-sensitive content shortest.
        assert!(tiers.staff_directory > tiers.programs);
        assert!(tiers.programs > tiers.tab);
        assert!(tiers.tab > tiers.search);
        assert!(tiers.search > tiers.time_sensitive);
        // Prefetch requires more typed characters than suggestions.
        assert!(config.prefetch_min_query_length > config.suggest_min_query_length);
    }
}
