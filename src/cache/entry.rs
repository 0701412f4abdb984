//! Cache entry envelope, payload format detection, and best-effort coercion.
//!
//! Entries are stored as a JSON envelope so format and creation time survive
//! alongside the payload. A stored value that fails to parse as an envelope
//! is *coerced* rather than rejected — the renderer copes with a raw value
//! far better than with a cache error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Detected payload format. Prefer the origin's `Content-Type` header over
/// sniffing; the sniffer exists only for values written by older builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    Html,
    Json,
    Text,
    Unknown,
}

impl PayloadFormat {
    /// Map an origin response `Content-Type` to a format, falling back to
    /// sniffing the body shape when the header is missing or unhelpful.
    pub fn detect(content_type: Option<&str>, body: &str) -> PayloadFormat {
        match content_type {
            Some(ct) if ct.contains("html") => PayloadFormat::Html,
            Some(ct) if ct.contains("json") => PayloadFormat::Json,
            Some(ct) if ct.contains("text/plain") => PayloadFormat::Text,
            _ => PayloadFormat::sniff(body),
        }
    }

    /// Guess a format from content shape alone.
    pub fn sniff(body: &str) -> PayloadFormat {
        let trimmed = body.trim_start();
        if trimmed.starts_with('<') {
            PayloadFormat::Html
        } else if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
        {
            PayloadFormat::Json
        } else if trimmed.is_empty() {
            PayloadFormat::Unknown
        } else {
            PayloadFormat::Text
        }
    }

    /// Response `Content-Type` to serve this payload with.
    pub fn content_type(&self) -> &'static str {
        match self {
            PayloadFormat::Html => "text/html; charset=utf-8",
            PayloadFormat::Json => "application/json",
            PayloadFormat::Text | PayloadFormat::Unknown => "text/plain; charset=utf-8",
        }
    }
}

/// A live cache entry. One key maps to at most one entry; writing the same
/// key overwrites and resets the TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub format: PayloadFormat,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub payload: String,
}

impl CacheEntry {
    pub fn new(payload: String, format: PayloadFormat, ttl: Duration) -> Self {
        Self {
            format,
            created_at: Utc::now(),
            ttl_seconds: ttl.as_secs(),
            payload,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Serialize to the stored envelope form.
    pub fn encode(&self) -> String {
        // The envelope is plain serializable data; encoding cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| self.payload.clone())
    }

    /// Decode a stored value, coercing malformed entries instead of erroring.
    ///
    /// Order: proper envelope → JSON object with an embedded HTML/payload
    /// field (unwrap it) → raw value with a sniffed format.
    pub fn decode(raw: &str) -> CacheEntry {
        if let Ok(entry) = serde_json::from_str::<CacheEntry>(raw) {
            return entry;
        }

        if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(raw) {
            for field in ["html", "payload", "response", "body"] {
                if let Some(serde_json::Value::String(inner)) = map.get(field) {
                    debug!(field, "coerced cache value from embedded envelope field");
                    return CacheEntry {
                        format: PayloadFormat::sniff(inner),
                        created_at: Utc::now(),
                        ttl_seconds: 0,
                        payload: inner.clone(),
                    };
                }
            }
        }

        debug!("cache value is not an envelope, serving raw");
        CacheEntry {
            format: PayloadFormat::sniff(raw),
            created_at: Utc::now(),
            ttl_seconds: 0,
            payload: raw.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips() {
        for payload in ["<ol><li>Result</li></ol>", r#"{"results":[]}"#, ""] {
            let entry = CacheEntry::new(
                payload.to_owned(),
                PayloadFormat::sniff(payload),
                Duration::from_secs(60),
            );
            let decoded = CacheEntry::decode(&entry.encode());
            assert_eq!(decoded.payload, payload);
            assert_eq!(decoded.format, entry.format);
            assert_eq!(decoded.ttl_seconds, 60);
        }
    }

    #[test]
    fn detect_prefers_content_type_over_shape() {
        // The header wins even when the body looks like something else.
        assert_eq!(
            PayloadFormat::detect(Some("application/json"), "<div></div>"),
            PayloadFormat::Json
        );
        assert_eq!(
            PayloadFormat::detect(Some("text/html; charset=utf-8"), "{}"),
            PayloadFormat::Html
        );
        assert_eq!(PayloadFormat::detect(None, "<p>hi</p>"), PayloadFormat::Html);
        assert_eq!(PayloadFormat::detect(None, r#"{"a":1}"#), PayloadFormat::Json);
        assert_eq!(PayloadFormat::detect(None, "plain words"), PayloadFormat::Text);
        assert_eq!(PayloadFormat::detect(None, ""), PayloadFormat::Unknown);
    }

    #[test]
    fn malformed_values_are_coerced_not_rejected() {
        // JSON with an embedded HTML field unwraps to the fragment.
        let wrapped = r#"{"status":"ok","html":"<ul><li>hit</li></ul>"}"#;
        let entry = CacheEntry::decode(wrapped);
        assert_eq!(entry.payload, "<ul><li>hit</li></ul>");
        assert_eq!(entry.format, PayloadFormat::Html);

        // Anything else comes back verbatim.
        let entry = CacheEntry::decode("just some text");
        assert_eq!(entry.payload, "just some text");
        assert_eq!(entry.format, PayloadFormat::Text);
    }
}
