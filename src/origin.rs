//! HTTP client for the upstream search backend.
//!
//! The backend is opaque: given a (query, collection, profile, tab-filter)
//! tuple it returns an HTML or JSON fragment. This client only knows how to
//! build those parameters from normalized inputs — it never interprets
//! result content.

use crate::cache::key::{DEFAULT_SENTINEL, KeyKind};
use std::time::Duration;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    #[error("origin returned HTTP {status}")]
    BadStatus { status: u16 },
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Parameters for one origin fetch.
#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub kind: KeyKind,
    pub query: String,
    pub collection: Option<String>,
    pub profile: Option<String>,
    /// Opaque session identifier, forwarded for origin-side bookkeeping.
    /// Never part of a cache key.
    pub session_id: Option<String>,
    /// Facet-style tab filter parameters, forwarded verbatim.
    pub tab_filters: Vec<(String, String)>,
}

impl OriginRequest {
    pub fn new(kind: KeyKind, query: impl Into<String>) -> Self {
        Self {
            kind,
            query: query.into(),
            collection: None,
            profile: None,
            session_id: None,
            tab_filters: Vec::new(),
        }
    }
}

/// A fetched fragment plus the metadata needed for format detection.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub body: String,
    pub content_type: Option<String>,
    pub status: u16,
}

pub struct OriginClient {
    http: reqwest::Client,
    base: Url,
}

impl OriginClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("funnel/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base })
    }

    /// Fetch a result fragment. Non-2xx statuses are errors — a failed
    /// origin response is never cached.
    pub async fn fetch(&self, request: &OriginRequest) -> Result<OriginResponse, OriginError> {
        let mut pairs: Vec<(&str, &str)> = vec![
            ("query", &request.query),
            (
                "collection",
                request.collection.as_deref().unwrap_or(DEFAULT_SENTINEL),
            ),
            (
                "profile",
                request.profile.as_deref().unwrap_or(DEFAULT_SENTINEL),
            ),
            // Suggestions use the backend's query-completion form; everything
            // else asks for a partial (fragment) render.
            (
                "form",
                match request.kind {
                    KeyKind::Suggestion => "qs",
                    _ => "partial",
                },
            ),
        ];
        if let Some(session_id) = &request.session_id {
            pairs.push(("sessionId", session_id));
        }
        for (name, value) in &request.tab_filters {
            pairs.push((name, value));
        }

        let response = self
            .http
            .get(self.base.clone())
            .query(&pairs)
            .send()
            .await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(OriginError::BadStatus { status });
        }

        let content_type = response
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(String::from);
        let body = response.text().await?;

        Ok(OriginResponse {
            body,
            content_type,
            status,
        })
    }
}
