//! Wikipedia lookup of a flower's introductory summary.
//!
//! One GET per label against the MediaWiki `api.php` query endpoint. The API
//! resolves title redirects itself (`redirects=1`), so a synonym such as a
//! former scientific name comes back under the canonical page title.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::WikiError;
use crate::models::wiki_types::PageSummary;

const ARTICLE_BASE_URL: &str = "https://en.wikipedia.org/wiki/";

/// Source of page summaries for a label.
#[async_trait]
pub trait Encyclopedia: Send + Sync {
    /// `Ok(None)` when the response has no page for the title.
    async fn fetch_summary(&self, title: &str) -> Result<Option<PageSummary>, WikiError>;
}

/// Fixed query parameters, plus the title.
pub fn query_params(title: &str) -> [(&'static str, &str); 9] {
    [
        ("format", "json"),
        ("action", "query"),
        ("prop", "extracts|pageimages"),
        ("pithumbsize", "500"),
        ("exintro", ""),
        ("explaintext", ""),
        ("titles", title),
        ("indexpageids", ""),
        ("redirects", "1"),
    ]
}

/// Client for the MediaWiki API
pub struct WikiClient {
    endpoint: String,
    client: Client,
}

impl WikiClient {
    /// Create a client for the given `api.php` endpoint.
    ///
    /// No timeout is set; transport defaults apply. reqwest follows HTTP
    /// redirects with its default policy.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
        }
    }

    pub fn build_request(&self, title: &str) -> Result<reqwest::Request, WikiError> {
        Ok(self
            .client
            .get(&self.endpoint)
            .header("Accept", "application/json")
            .query(&query_params(title))
            .build()?)
    }
}

#[async_trait]
impl Encyclopedia for WikiClient {
    async fn fetch_summary(&self, title: &str) -> Result<Option<PageSummary>, WikiError> {
        let request = self.build_request(title)?;
        debug!(url = %request.url(), "Querying Wikipedia");

        let response = self.client.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(WikiError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let json: Value = serde_json::from_slice(&body)?;
        Ok(parse_summary(&json))
    }
}

/// Follows `query.pageids[0]` into `query.pages`. Missing `title` or
/// `extract` become empty strings; a missing id or page yields `None`.
pub fn parse_summary(json: &Value) -> Option<PageSummary> {
    let query = json.get("query")?;
    let page_id = query.get("pageids")?.get(0)?.as_str()?;
    let page = query.get("pages")?.get(page_id)?;

    let text = |key: &str| {
        page.get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Some(PageSummary {
        title: text("title"),
        extract: text("extract"),
        thumbnail_url: page
            .pointer("/thumbnail/source")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

/// Browser URL of the article with the given title.
pub fn article_url(title: &str) -> String {
    format!("{}{}", ARTICLE_BASE_URL, title.trim().replace(' ', "_"))
}
