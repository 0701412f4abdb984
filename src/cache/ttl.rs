//! Tiered TTL policy.
//!
//! Two independent axes, never conflated:
//!
//! - **Popularity** ([`TtlPolicy::recommended_ttl`]) — escalates a caller's
//!   default TTL as a query's traffic count crosses the popular and
//!   high-volume thresholds. Used when caching a specific query's result set.
//! - **Content class** ([`TtlPolicy::content_specific_ttl`]) — maps what the
//!   fragment *is* (staff directory, program listing, news) to a lifetime.
//!   Used when caching whole tab content with no explicit TTL.
//!
//! Thresholds, multipliers and tier durations all come from configuration.

use crate::cache::popularity::PopularityTracker;
use std::sync::Arc;
use std::time::Duration;

/// Content classification for the content-class TTL axis.
///
/// Classification is substring matching against a fixed keyword table;
/// ambiguous content falls back to `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    /// Faculty/staff directory content. Changes rarely; cached longest.
    StaffDirectory,
    /// Academic program / degree content.
    Programs,
    /// A named result tab with no more specific classification.
    TabContent,
    /// Full search result fragments.
    SearchResults,
    /// News, events, and "today/now/latest" queries. Cached shortest.
    TimeSensitive,
    /// Nothing matched.
    General,
}

const STAFF_KEYWORDS: &[&str] = &["faculty", "staff", "directory", "people"];
const PROGRAM_KEYWORDS: &[&str] = &["program", "degree", "major", "academic", "course"];
const TIME_SENSITIVE_KEYWORDS: &[&str] = &["news", "event", "today", "now", "latest", "announcement"];

impl ContentClass {
    /// Classify a fragment by its tab identifier or query text.
    pub fn classify(text: &str) -> ContentClass {
        let folded = text.to_lowercase();
        if STAFF_KEYWORDS.iter().any(|k| folded.contains(k)) {
            ContentClass::StaffDirectory
        } else if TIME_SENSITIVE_KEYWORDS.iter().any(|k| folded.contains(k)) {
            ContentClass::TimeSensitive
        } else if PROGRAM_KEYWORDS.iter().any(|k| folded.contains(k)) {
            ContentClass::Programs
        } else {
            ContentClass::General
        }
    }
}

/// Per-class TTL durations.
#[derive(Debug, Clone)]
pub struct TtlTiers {
    pub staff_directory: Duration,
    pub popular_tab: Duration,
    pub programs: Duration,
    pub tab: Duration,
    pub general: Duration,
    pub search: Duration,
    pub suggestion: Duration,
    pub time_sensitive: Duration,
}

/// Popularity thresholds and multipliers.
#[derive(Debug, Clone)]
pub struct PopularityTiers {
    pub popular_threshold: u64,
    pub high_volume_threshold: u64,
    pub popular_multiplier: f64,
    pub high_volume_multiplier: f64,
}

/// The TTL tier a count falls into, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopularityTier {
    Default,
    Popular,
    HighVolume,
}

impl PopularityTiers {
    pub fn tier_for(&self, count: u64) -> PopularityTier {
        if count >= self.high_volume_threshold {
            PopularityTier::HighVolume
        } else if count >= self.popular_threshold {
            PopularityTier::Popular
        } else {
            PopularityTier::Default
        }
    }
}

pub struct TtlPolicy {
    tiers: TtlTiers,
    popularity: PopularityTiers,
    tracker: Arc<PopularityTracker>,
}

impl TtlPolicy {
    pub fn new(tiers: TtlTiers, popularity: PopularityTiers, tracker: Arc<PopularityTracker>) -> Self {
        Self {
            tiers,
            popularity,
            tracker,
        }
    }

    pub fn tiers(&self) -> &TtlTiers {
        &self.tiers
    }

    /// Popularity axis: escalate `default_ttl` by the query's traffic tier.
    ///
    /// Non-decreasing in the query's count; crossing the popular and
    /// high-volume thresholds strictly increases the result.
    pub fn recommended_ttl(&self, query: &str, default_ttl: Duration) -> Duration {
        let count = self.tracker.count(query);
        self.ttl_for_count(count, default_ttl)
    }

    /// Popularity axis with an externally supplied count.
    pub fn ttl_for_count(&self, count: u64, default_ttl: Duration) -> Duration {
        let multiplier = match self.popularity.tier_for(count) {
            PopularityTier::Default => return default_ttl,
            PopularityTier::Popular => self.popularity.popular_multiplier,
            PopularityTier::HighVolume => self.popularity.high_volume_multiplier,
        };
        Duration::from_secs_f64(default_ttl.as_secs_f64() * multiplier)
    }

    /// Content-class axis: lifetime for a fragment with no explicit TTL.
    ///
    /// `popular_tab` selects the popular-tab tier over the class tier — a
    /// heavily trafficked tab stays warm regardless of what it contains.
    pub fn content_specific_ttl(&self, class: ContentClass, popular_tab: bool) -> Duration {
        if popular_tab {
            return self.tiers.popular_tab;
        }
        match class {
            ContentClass::StaffDirectory => self.tiers.staff_directory,
            ContentClass::Programs => self.tiers.programs,
            ContentClass::TabContent => self.tiers.tab,
            ContentClass::SearchResults => self.tiers.search,
            ContentClass::TimeSensitive => self.tiers.time_sensitive,
            ContentClass::General => self.tiers.general,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn policy() -> TtlPolicy {
        let config = Config::default();
        TtlPolicy::new(
            config.ttl_tiers(),
            config.popularity_tiers(),
            Arc::new(PopularityTracker::new(config.popularity_capacity)),
        )
    }

    #[test]
    fn classify_matches_keyword_table() {
        assert_eq!(ContentClass::classify("Faculty_Staff"), ContentClass::StaffDirectory);
        assert_eq!(ContentClass::classify("nursing program"), ContentClass::Programs);
        assert_eq!(ContentClass::classify("campus news"), ContentClass::TimeSensitive);
        assert_eq!(ContentClass::classify("events today"), ContentClass::TimeSensitive);
        assert_eq!(ContentClass::classify("library hours"), ContentClass::General);
    }

    #[test]
    fn ttl_is_monotonic_in_popularity() {
        let policy = policy();
        let default = Duration::from_secs(900);

        let mut previous = Duration::ZERO;
        for count in 0..30 {
            let ttl = policy.ttl_for_count(count, default);
            assert!(ttl >= previous, "ttl decreased at count {count}");
            previous = ttl;
        }

        // Crossing each threshold strictly increases the TTL.
        assert!(policy.ttl_for_count(5, default) > policy.ttl_for_count(4, default));
        assert!(policy.ttl_for_count(20, default) > policy.ttl_for_count(19, default));
    }

    #[test]
    fn high_volume_queries_get_the_top_tier() {
        let policy = policy();
        let default = Duration::from_secs(900);

        for _ in 0..25 {
            policy.tracker.record("admissions deadline");
        }
        let ttl = policy.recommended_ttl("admissions deadline", default);
        assert_eq!(ttl, Duration::from_secs_f64(900.0 * 1.5));
    }

    #[test]
    fn popular_tab_flag_overrides_the_class_tier() {
        let policy = policy();
        let plain = policy.content_specific_ttl(ContentClass::Programs, false);
        let popular = policy.content_specific_ttl(ContentClass::Programs, true);
        assert_eq!(popular, policy.tiers().popular_tab);
        assert_ne!(popular, plain);
        // The popular tier beats the default tab TTL.
        assert!(popular > policy.tiers().tab);
    }

    #[test]
    fn content_tiers_are_ordered() {
        let policy = policy();
        let staff = policy.content_specific_ttl(ContentClass::StaffDirectory, false);
        let programs = policy.content_specific_ttl(ContentClass::Programs, false);
        let tab = policy.content_specific_ttl(ContentClass::TabContent, false);
        let search = policy.content_specific_ttl(ContentClass::SearchResults, false);
        let news = policy.content_specific_ttl(ContentClass::TimeSensitive, false);
        assert!(staff > programs && programs > tab && tab > search && search > news);
    }
}
