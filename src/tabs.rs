//! Tab-scoped request detection and tab-id normalization.
//!
//! The upstream backend addresses result tabs through an undocumented
//! query-string convention (a partial-render marker plus facet-style filter
//! parameters). The detection rules are inherently coupled to that
//! convention, so they live in a versioned [`TabRules`] value instead of
//! inline literals, and classification misses are logged for monitoring.
//!
//! False negatives fall back to full-search caching (safe); false positives
//! would wrongly partition cache space (wasteful, never corrupting).

use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// A classified tab request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabDescriptor {
    pub raw_id: Option<String>,
    pub normalized_id: String,
}

/// Detection and normalization rules for one version of the upstream URL
/// convention.
pub struct TabRules {
    /// Rule-set version, reported in logs so misclassifications can be
    /// correlated with upstream convention changes.
    pub version: u32,
    /// Parameter and value marking a partial (fragment) render.
    partial_marker: (&'static str, &'static str),
    /// Explicit tab parameter name.
    tab_param: &'static str,
    /// Profile parameter name.
    profile_param: &'static str,
    /// Profile values that do NOT indicate a tab.
    default_profiles: &'static [&'static str],
    /// Facet-style tab filter parameters start with this prefix.
    facet_prefix: &'static str,
    /// Synonym spellings (lowercased, punctuation squashed) → canonical id.
    synonyms: Vec<(&'static str, &'static str)>,
    /// Tab assigned when the partial marker is present but nothing more
    /// specific is identified.
    default_tab: &'static str,
    /// Strips duplicate-element numbering artifacts like `Results2`.
    numeric_suffix: Regex,
}

impl Default for TabRules {
    fn default() -> Self {
        Self::v1()
    }
}

impl TabRules {
    /// Rules matching the upstream convention as currently observed.
    pub fn v1() -> Self {
        Self {
            version: 1,
            partial_marker: ("form", "partial"),
            tab_param: "tab",
            profile_param: "profile",
            default_profiles: &["_default", "default"],
            facet_prefix: "f.Tabs|",
            synonyms: vec![
                ("results", "Results"),
                ("result", "Results"),
                ("search", "Results"),
                ("searchresults", "Results"),
                ("programs", "Programs"),
                ("program", "Programs"),
                ("academicprograms", "Programs"),
                ("facultystaff", "Faculty_Staff"),
                ("faculty", "Faculty_Staff"),
                ("staff", "Faculty_Staff"),
                ("facultyandstaff", "Faculty_Staff"),
                ("news", "News"),
                ("newsevents", "News"),
            ],
            default_tab: "Results",
            numeric_suffix: Regex::new(r"(?:[\s_-]*\d+)+$").expect("static regex"),
        }
    }

    /// Whether a request targets a named result tab.
    ///
    /// Heuristic: the partial-render marker must be present, plus at least
    /// one of an explicit tab parameter, a non-default profile, or a
    /// facet-style tab filter.
    pub fn is_tab_request(&self, params: &HashMap<String, String>) -> bool {
        self.has_partial_marker(params)
            && (params.contains_key(self.tab_param)
                || self.non_default_profile(params).is_some()
                || self.facet_tab_value(params).is_some())
    }

    /// Extract the raw tab identifier. First match wins: facet filter →
    /// explicit tab parameter → non-default profile → known literal tab name
    /// embedded anywhere in the query string → default tab when the partial
    /// marker is present.
    pub fn extract_tab_id(
        &self,
        params: &HashMap<String, String>,
        raw_query: &str,
    ) -> Option<String> {
        if let Some(facet) = self.facet_tab_value(params) {
            return Some(facet.to_owned());
        }
        if let Some(tab) = params.get(self.tab_param) {
            return Some(tab.clone());
        }
        if let Some(profile) = self.non_default_profile(params) {
            return Some(profile.to_owned());
        }
        if let Some(embedded) = self.embedded_tab_name(raw_query) {
            return Some(embedded);
        }
        if self.has_partial_marker(params) {
            debug!(
                rules_version = self.version,
                raw_query, "partial request with no identifiable tab, defaulting"
            );
            return Some(self.default_tab.to_owned());
        }
        None
    }

    /// Collapse a raw tab identifier onto its canonical spelling.
    ///
    /// Strips trailing numeric suffixes, then maps known synonyms onto one
    /// canonical identifier. Unknown identifiers pass through unchanged —
    /// this is a total, idempotent function, never an error.
    pub fn normalize_tab_id(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let stripped = self.numeric_suffix.replace(trimmed, "");
        let squashed: String = stripped
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        for (synonym, canonical) in &self.synonyms {
            if squashed == *synonym {
                return (*canonical).to_owned();
            }
        }
        stripped.into_owned()
    }

    /// Classify a request, returning a descriptor when it is tab-scoped.
    pub fn classify(
        &self,
        params: &HashMap<String, String>,
        raw_query: &str,
    ) -> Option<TabDescriptor> {
        if !self.is_tab_request(params) {
            return None;
        }
        let raw_id = self.extract_tab_id(params, raw_query);
        let normalized_id = self
            .normalize_tab_id(raw_id.as_deref().unwrap_or(self.default_tab));
        Some(TabDescriptor { raw_id, normalized_id })
    }

    fn has_partial_marker(&self, params: &HashMap<String, String>) -> bool {
        params.get(self.partial_marker.0).map(String::as_str) == Some(self.partial_marker.1)
    }

    fn non_default_profile<'a>(&self, params: &'a HashMap<String, String>) -> Option<&'a str> {
        let profile = params.get(self.profile_param)?;
        if self.default_profiles.contains(&profile.as_str()) {
            None
        } else {
            Some(profile)
        }
    }

    fn facet_tab_value<'a>(&self, params: &'a HashMap<String, String>) -> Option<&'a str> {
        params
            .iter()
            .find(|(name, _)| name.starts_with(self.facet_prefix))
            .map(|(_, value)| value.as_str())
    }

    fn embedded_tab_name(&self, raw_query: &str) -> Option<String> {
        let folded = raw_query.to_lowercase();
        self.synonyms
            .iter()
            .find(|(synonym, _)| folded.contains(synonym))
            .map(|(_, canonical)| (*canonical).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn detection_requires_the_partial_marker() {
        let rules = TabRules::default();
        // Tab parameter without the marker is a full-page request.
        assert!(!rules.is_tab_request(&params(&[("tab", "Programs")])));
        assert!(rules.is_tab_request(&params(&[("form", "partial"), ("tab", "Programs")])));
        assert!(rules.is_tab_request(&params(&[("form", "partial"), ("profile", "programs")])));
        assert!(rules.is_tab_request(&params(&[
            ("form", "partial"),
            ("f.Tabs|seattleu~sp-search", "Faculty & Staff"),
        ])));
        // Default profile alone is not a tab signal.
        assert!(!rules.is_tab_request(&params(&[("form", "partial"), ("profile", "_default")])));
    }

    #[test]
    fn extraction_order_prefers_facet_filters() {
        let rules = TabRules::default();
        let request = params(&[
            ("form", "partial"),
            ("f.Tabs|collection", "News"),
            ("tab", "Programs"),
            ("profile", "staff"),
        ]);
        assert_eq!(rules.extract_tab_id(&request, "").as_deref(), Some("News"));

        let request = params(&[("form", "partial"), ("tab", "Programs"), ("profile", "staff")]);
        assert_eq!(rules.extract_tab_id(&request, "").as_deref(), Some("Programs"));

        let request = params(&[("form", "partial"), ("profile", "staff")]);
        assert_eq!(rules.extract_tab_id(&request, "").as_deref(), Some("staff"));
    }

    #[test]
    fn embedded_literals_and_default_fall_through() {
        let rules = TabRules::default();
        let partial_only = params(&[("form", "partial")]);
        assert_eq!(
            rules.extract_tab_id(&partial_only, "query=x&view=facultystaff"),
            Some("Faculty_Staff".to_owned())
        );
        assert_eq!(
            rules.extract_tab_id(&partial_only, "query=x"),
            Some("Results".to_owned())
        );
        assert_eq!(rules.extract_tab_id(&params(&[("query", "x")]), "query=x"), None);
    }

    #[test]
    fn normalization_is_idempotent() {
        let rules = TabRules::default();
        for raw in [
            "Results",
            "Results2",
            "Faculty & Staff",
            "FacultyStaff",
            "faculty_staff_3",
            "Programs",
            "News",
            "Library",
            "Library_2",
            "",
        ] {
            let once = rules.normalize_tab_id(raw);
            let twice = rules.normalize_tab_id(&once);
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn synonyms_collapse_to_canonical_ids() {
        let rules = TabRules::default();
        assert_eq!(rules.normalize_tab_id("Faculty & Staff"), "Faculty_Staff");
        assert_eq!(rules.normalize_tab_id("FacultyStaff"), "Faculty_Staff");
        assert_eq!(rules.normalize_tab_id("staff"), "Faculty_Staff");
        assert_eq!(rules.normalize_tab_id("Results2"), "Results");
        assert_eq!(rules.normalize_tab_id("search"), "Results");
        assert_eq!(rules.normalize_tab_id("program"), "Programs");
        // Unknown identifiers pass through (minus numbering artifacts).
        assert_eq!(rules.normalize_tab_id("Library_2"), "Library");
        assert_eq!(rules.normalize_tab_id("Athletics"), "Athletics");
    }

    #[test]
    fn classify_builds_a_descriptor() {
        let rules = TabRules::default();
        let request = params(&[("form", "partial"), ("tab", "Faculty & Staff")]);
        let descriptor = rules.classify(&request, "").unwrap();
        assert_eq!(descriptor.raw_id.as_deref(), Some("Faculty & Staff"));
        assert_eq!(descriptor.normalized_id, "Faculty_Staff");

        assert!(rules.classify(&params(&[("query", "nursing")]), "").is_none());
    }
}
