//! Server response types.
//!
//! List endpoints answer either with a bare JSON array or with a paginated
//! envelope; error responses carry a `detail` string or field error lists.

use serde::{Deserialize, Serialize};

/// Paginated list envelope.
///
/// ```json
/// { "count": 42, "next": "https://.../?page=2", "previous": null, "results": [ ... ] }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total number of results matching the query.
    #[serde(default)]
    pub count: Option<u64>,
    /// URL of the next page, if any.
    #[serde(default)]
    pub next: Option<String>,
    /// URL of the previous page, if any.
    #[serde(default)]
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// A list endpoint's body in either of its two shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Plain(Vec<T>),
    Paginated(Page<T>),
}

impl<T> ListResponse<T> {
    /// The items, whichever shape the server used.
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Plain(items) => items,
            Self::Paginated(page) => page.results,
        }
    }

    /// Total count when the server reports one, else the items on this page.
    pub fn total(&self) -> u64 {
        match self {
            Self::Plain(items) => items.len() as u64,
            Self::Paginated(page) => page.count.unwrap_or(page.results.len() as u64),
        }
    }
}

/// Body of the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Body of the unread-count endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Error body returned with 4xx/5xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub non_field_errors: Vec<String>,
}

impl ApiErrorBody {
    /// Human-readable message from a raw error body, if it has one.
    pub fn message_from(body: &str) -> Option<String> {
        let parsed: ApiErrorBody = serde_json::from_str(body).ok()?;
        parsed
            .detail
            .filter(|d| !d.is_empty())
            .or_else(|| {
                (!parsed.non_field_errors.is_empty()).then(|| parsed.non_field_errors.join("; "))
            })
    }
}
