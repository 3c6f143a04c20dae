use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use log::{debug, warn};
use reqwest::Url;
use serde::Deserialize;

use crate::error::WikiError;
use crate::markup::{clean_snippet, truncate_chars};
use crate::types::WikiResult;

pub const DEFAULT_API_URL: &str = "https://grand-piece-online.fandom.com/api.php";
pub const DEFAULT_PAGE_BASE_URL: &str = "https://grand-piece-online.fandom.com/wiki/";
pub const SEARCH_LIMIT: usize = 8;
pub const EXTRACT_MAX_CHARS: usize = 900;
pub const NO_DESCRIPTION: &str = "No description available.";
pub const DEFAULT_EXTRACT_CONCURRENCY: usize = 4;

/// Anything that can turn a query into ranked wiki results.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<WikiResult>, WikiError>;
}

/// Search hit before its extract has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<RawSearchHit>,
}

#[derive(Deserialize)]
struct RawSearchHit {
    title: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: Option<ExtractQuery>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: BTreeMap<String, ExtractPage>,
}

#[derive(Deserialize)]
struct ExtractPage {
    #[serde(default)]
    extract: Option<String>,
}

impl From<ApiErrorBody> for WikiError {
    fn from(body: ApiErrorBody) -> Self {
        Self::Api {
            code: body.code,
            info: body.info,
        }
    }
}

/// Two-step MediaWiki client: full-text search, then one intro extract per
/// matched title.
#[derive(Debug, Clone)]
pub struct WikiClient {
    client: reqwest::Client,
    api_url: String,
    page_base_url: String,
    extract_concurrency: usize,
}

impl WikiClient {
    #[must_use]
    pub fn new(client: &reqwest::Client) -> Self {
        Self {
            client: client.clone(),
            api_url: DEFAULT_API_URL.to_string(),
            page_base_url: DEFAULT_PAGE_BASE_URL.to_string(),
            extract_concurrency: DEFAULT_EXTRACT_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_endpoints(
        mut self,
        api_url: impl Into<String>,
        page_base_url: impl Into<String>,
    ) -> Self {
        self.api_url = api_url.into();
        self.page_base_url = page_base_url.into();
        self
    }

    #[must_use]
    pub fn with_extract_concurrency(mut self, limit: usize) -> Self {
        self.extract_concurrency = limit.max(1);
        self
    }

    /// Ranked `(title, snippet)` pairs for `query`, at most [`SEARCH_LIMIT`].
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-success status, an
    /// undecodable body, or an API-level error object.
    pub async fn search_titles(&self, query: &str) -> Result<Vec<SearchHit>, WikiError> {
        const OPERATION: &str = "search";
        let limit = SEARCH_LIMIT.to_string();

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("format", "json"),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|error| WikiError::request(OPERATION, error))?;

        if !response.status().is_success() {
            return Err(WikiError::Status {
                operation: OPERATION,
                status: response.status(),
            });
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|error| WikiError::decode(OPERATION, error))?;
        if let Some(error) = body.error {
            return Err(error.into());
        }

        let hits: Vec<SearchHit> = body
            .query
            .map(|query| query.search)
            .unwrap_or_default()
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|hit| SearchHit {
                snippet: clean_snippet(&hit.snippet),
                title: hit.title,
            })
            .collect();

        debug!("Wiki search {query:?} matched {} titles", hits.len());
        Ok(hits)
    }

    /// Plain-text intro of `title`, or `None` when the page has no extract.
    ///
    /// # Errors
    /// Returns an error on transport failure, a non-success status, an
    /// undecodable body, or an API-level error object.
    pub async fn fetch_extract(&self, title: &str) -> Result<Option<String>, WikiError> {
        const OPERATION: &str = "extract";

        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("titles", title),
                ("format", "json"),
                ("exintro", "1"),
                ("explaintext", "1"),
            ])
            .send()
            .await
            .map_err(|error| WikiError::request(OPERATION, error))?;

        if !response.status().is_success() {
            return Err(WikiError::Status {
                operation: OPERATION,
                status: response.status(),
            });
        }

        let body: ExtractResponse = response
            .json()
            .await
            .map_err(|error| WikiError::decode(OPERATION, error))?;
        if let Some(error) = body.error {
            return Err(error.into());
        }

        let extract = body
            .query
            .into_iter()
            .flat_map(|query| query.pages.into_values())
            .find_map(|page| page.extract)
            .map(|extract| truncate_chars(extract.trim(), EXTRACT_MAX_CHARS).to_string())
            .filter(|extract| !extract.is_empty());

        Ok(extract)
    }

    /// Page URL for `title`: spaces become underscores and the segment is
    /// percent-encoded.
    #[must_use]
    pub fn source_url(&self, title: &str) -> String {
        let segment = title.trim().replace(' ', "_");
        let Ok(mut url) = Url::parse(&self.page_base_url) else {
            return format!("{}{segment}", self.page_base_url);
        };
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&segment);
        } else {
            return format!("{}{segment}", self.page_base_url);
        }
        url.into()
    }

    async fn resolve(&self, hit: SearchHit) -> WikiResult {
        let extract = match self.fetch_extract(&hit.title).await {
            Ok(Some(extract)) => extract,
            Ok(None) => NO_DESCRIPTION.to_string(),
            Err(error) => {
                warn!("Extract lookup for {:?} failed: {error}", hit.title);
                NO_DESCRIPTION.to_string()
            }
        };

        WikiResult {
            source_url: self.source_url(&hit.title),
            title: hit.title,
            snippet: hit.snippet,
            extract,
        }
    }
}

#[async_trait]
impl SearchBackend for WikiClient {
    /// Search, then resolve extracts with bounded concurrency. Results keep
    /// the search ranking; a failed extract degrades to [`NO_DESCRIPTION`].
    async fn search(&self, query: &str) -> Result<Vec<WikiResult>, WikiError> {
        let hits = self.search_titles(query).await?;

        let results = stream::iter(hits)
            .map(|hit| self.resolve(hit))
            .buffered(self.extract_concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(results)
    }
}
