//! Grand Piece Online wiki search and per-category content aggregation.

mod aggregate;
mod client;
mod error;
mod markup;
mod types;

pub use aggregate::{ContentAggregator, DEFAULT_CATEGORY_CONCURRENCY, RenderOptions, render_results};
pub use client::{
    DEFAULT_API_URL, DEFAULT_EXTRACT_CONCURRENCY, DEFAULT_PAGE_BASE_URL, EXTRACT_MAX_CHARS,
    NO_DESCRIPTION, SEARCH_LIMIT, SearchBackend, SearchHit, WikiClient,
};
pub use error::{AggregateError, WikiError};
pub use types::{Category, DEFAULT_BASE_QUERY, WikiResult, normalize_base_query};
