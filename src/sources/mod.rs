//! Bibliographic source plugins with a trait-based architecture.
//!
//! This module defines the [`Source`] trait that every backend implements. A
//! source turns a [`CanonicalQuery`] into its own request parameters, knows the
//! URL to send them to and how to page through results, and parses a response
//! body into raw BibTeX records. Fetching, pagination and normalization are
//! shared and live in [`fetch`].
//!
//! # Sources
//!
//! - [`MRefSource`]: exact citation matching, at most one record
//! - [`MathSciNetSource`]: field search with paging
//! - [`ZbMathSource`]: field search, BibTeX fetched per result
//! - [`ArxivSource`]: preprint search through the UC Davis front end
//!
//! # Adding a Source
//!
//! 1. Create a struct that implements `Source`
//! 2. Implement `format_query`, `search_url` and `parse_results`
//! 3. Override `pagination` and `identifier_query` if the backend supports them
//! 4. Add a variant to [`SourceKind`] so the registry can build it

mod arxiv;
pub mod dialect;
pub mod fetch;
mod mathscinet;
pub mod mock;
mod mref;
mod registry;
mod zbmath;

pub use arxiv::ArxivSource;
pub use fetch::{fetch, fetch_website, MAX_REQUESTS};
pub use mathscinet::MathSciNetSource;
pub use mock::MockSource;
pub use mref::MRefSource;
pub use registry::{SourceCapabilities, SourceEndpoints, SourceKind, SourceRegistry};
pub use zbmath::ZbMathSource;

use async_trait::async_trait;

use crate::models::{CanonicalQuery, RawRecord};
use crate::utils::HttpFetch;

/// Request parameters for one backend, in the order they are sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendQuery {
    params: Vec<(String, String)>,
}

impl BackendQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.push((key.into(), value.into()));
    }

    pub fn extend(&mut self, other: BackendQuery) {
        self.params.extend(other.params);
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Value of the first parameter named `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// `application/x-www-form-urlencoded` form of the parameters
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish()
    }
}

/// How a backend pages through results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Records per response
    pub page_size: usize,

    /// Name of the offset parameter
    pub offset_param: &'static str,

    /// Added to the number of records found so far to form the offset
    pub offset_correction: usize,
}

/// Records parsed from one response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultPage {
    pub records: Vec<RawRecord>,

    /// Total number of matches, when the backend reports it
    pub total: Option<usize>,
}

impl ResultPage {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            total: None,
        }
    }

    pub fn with_total(mut self, total: Option<usize>) -> Self {
        self.total = total;
        self
    }
}

/// The Source trait defines the interface for all bibliographic backends.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (e.g., "mathscinet", "zbmath")
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Whether this source only returns exact matches
    fn is_exact_lookup(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::EXACT_LOOKUP)
    }

    /// Whether this source has a human-readable result page
    fn supports_website(&self) -> bool {
        self.capabilities().contains(SourceCapabilities::WEBSITE)
    }

    // ========== QUERY FORMATTING ==========

    /// Request for an identifier this source resolves directly, if the query carries one
    fn identifier_query(&self, _query: &CanonicalQuery) -> Option<BackendQuery> {
        None
    }

    /// Translate a query into request parameters.
    ///
    /// An empty result means there is nothing this source can search for.
    fn format_query(&self, query: &CanonicalQuery) -> Result<BackendQuery, SourceError>;

    /// Identifier request when possible, otherwise [`Source::format_query`]
    fn prepare(&self, query: &CanonicalQuery) -> Result<BackendQuery, SourceError> {
        match self.identifier_query(query) {
            Some(request) => Ok(request),
            None => self.format_query(query),
        }
    }

    /// URL for the first page of results
    fn search_url(&self, query: &BackendQuery) -> String;

    /// Paging parameters; `None` when one response holds every result
    fn pagination(&self) -> Option<Pagination> {
        None
    }

    // ========== RESULTS ==========

    /// Parse a response body into records
    fn parse_results(&self, body: &[u8]) -> Result<ResultPage, SourceError>;

    /// Fetch and parse one page of results
    async fn fetch_page(&self, http: &dyn HttpFetch, url: &str) -> Result<ResultPage, SourceError> {
        let body = http.get(url).await?;
        self.parse_results(&body)
    }

    // ========== WEBSITE ==========

    /// URL of the human-readable result page
    fn website_url(&self, _query: &BackendQuery) -> Option<String> {
        None
    }

    /// Reduce a result page to an HTML fragment
    fn clean_website(&self, html: &str) -> String {
        html.to_string()
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not supported by this source
    #[error("Operation not supported by this source")]
    NotImplemented,

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (HTML, BibTeX)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error status from the source
    #[error("API error: {0}")]
    Api(String),

    /// Unknown source id
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_capabilities() {
        let caps = SourceCapabilities::SEARCH | SourceCapabilities::PAGINATION;

        assert!(caps.contains(SourceCapabilities::SEARCH));
        assert!(caps.contains(SourceCapabilities::PAGINATION));
        assert!(!caps.contains(SourceCapabilities::EXACT_LOOKUP));
    }

    #[test]
    fn test_backend_query_encoding() {
        let query = BackendQuery::new()
            .with("pg1", "AUCN")
            .with("s1", "Smith, J. and \"Doe\"")
            .with("q", "a & b");
        assert_eq!(
            query.encode(),
            "pg1=AUCN&s1=Smith%2C+J.+and+%22Doe%22&q=a+%26+b"
        );
        assert_eq!(query.get("pg1"), Some("AUCN"));
        assert!(BackendQuery::new().is_empty());
    }
}
