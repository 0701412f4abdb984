//! Deterministic cache-key derivation.
//!
//! Keys are colon-delimited and stable across every call path (client
//! prefetch-check, server write, server read) — the same normalization runs
//! everywhere, or cache coherence breaks. Session identifiers never
//! participate in a key, so entries are shareable across users.
//!
//! Formats:
//! - `search:<query>:<collection>:<profile>`
//! - `tab:<query>:<collection>:<NormalizedTabId>`
//! - `suggestion:<query>:<collection>:<profile>`

use crate::tabs::TabRules;

/// Sentinel used when a request omits collection or profile.
pub const DEFAULT_SENTINEL: &str = "default";

/// Punctuation stripped from queries before keying. Apostrophes, quotes and
/// terminal punctuation vary by typist but never change what the user meant.
const STRIPPED_PUNCTUATION: [char; 4] = ['"', '\'', '?', '!'];

/// The request category a cache key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Search,
    Tab,
    Suggestion,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Search => "search",
            KeyKind::Tab => "tab",
            KeyKind::Suggestion => "suggestion",
        }
    }

    /// Recover the kind from a derived key's prefix. Unknown prefixes are
    /// counted as search traffic.
    pub fn from_key(key: &str) -> KeyKind {
        match key.split(':').next() {
            Some("tab") => KeyKind::Tab,
            Some("suggestion") => KeyKind::Suggestion,
            _ => KeyKind::Search,
        }
    }
}

/// Normalize a raw query for keying and popularity counting: case-fold, strip
/// a small fixed set of punctuation, and collapse internal whitespace to
/// single spaces. Total — any input (including empty) yields a stable result.
pub fn normalize_query(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key for a full search-results fragment.
pub fn search_key(query: &str, collection: Option<&str>, profile: Option<&str>) -> String {
    prefixed_key(KeyKind::Search, query, collection, profile)
}

/// Key for a suggestion fragment.
pub fn suggestion_key(query: &str, collection: Option<&str>, profile: Option<&str>) -> String {
    prefixed_key(KeyKind::Suggestion, query, collection, profile)
}

/// Key for a tab-scoped fragment. The tab identifier runs through
/// [`TabRules::normalize_tab_id`] first so equivalent spellings collapse
/// to one key.
pub fn tab_key(query: &str, collection: Option<&str>, raw_tab: &str, rules: &TabRules) -> String {
    let tab = rules.normalize_tab_id(raw_tab);
    format!(
        "{}:{}:{}:{}",
        KeyKind::Tab.as_str(),
        normalize_query(query),
        collection.unwrap_or(DEFAULT_SENTINEL),
        tab
    )
}

fn prefixed_key(
    kind: KeyKind,
    query: &str,
    collection: Option<&str>,
    profile: Option<&str>,
) -> String {
    format!(
        "{}:{}:{}:{}",
        kind.as_str(),
        normalize_query(query),
        collection.unwrap_or(DEFAULT_SENTINEL),
        profile.unwrap_or(DEFAULT_SENTINEL)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_deterministic() {
        assert_eq!(
            search_key("Study Abroad", Some("c"), Some("p")),
            search_key("  study   abroad ", Some("c"), Some("p")),
        );
        assert_eq!(normalize_query("What's new?"), "whats new");
        assert_eq!(normalize_query("  NURSING\tProgram  "), "nursing program");
    }

    #[test]
    fn empty_query_is_allowed() {
        assert_eq!(search_key("", None, None), "search::default:default");
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn defaults_apply_when_absent() {
        assert_eq!(
            suggestion_key("adm", None, None),
            "suggestion:adm:default:default"
        );
        assert_eq!(
            search_key("fees", Some("main"), None),
            "search:fees:main:default"
        );
    }

    #[test]
    fn tab_keys_embed_the_normalized_tab() {
        let rules = TabRules::default();
        assert_eq!(
            tab_key("nursing program", Some("seattleu~sp-search"), "Programs", &rules),
            "tab:nursing program:seattleu~sp-search:Programs"
        );
        // Equivalent tab spellings collapse to one key.
        assert_eq!(
            tab_key("nursing program", Some("c"), "Faculty & Staff", &rules),
            tab_key("nursing program", Some("c"), "FacultyStaff", &rules),
        );
    }

    #[test]
    fn kind_round_trips_through_keys() {
        assert_eq!(KeyKind::from_key("search:q:c:p"), KeyKind::Search);
        assert_eq!(KeyKind::from_key("tab:q:c:Results"), KeyKind::Tab);
        assert_eq!(KeyKind::from_key("suggestion:q:c:p"), KeyKind::Suggestion);
        assert_eq!(KeyKind::from_key("bogus"), KeyKind::Search);
    }
}
