//! Mock source and transport for testing purposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{CanonicalQuery, RawRecord};
use crate::sources::{BackendQuery, Pagination, ResultPage, Source, SourceCapabilities, SourceError};
use crate::utils::HttpFetch;

/// A mock source that serves predefined result pages, one per request, and
/// counts how often it was asked.
#[derive(Debug, Default)]
pub struct MockSource {
    id: String,
    exact: bool,
    failing: bool,
    pagination: Option<Pagination>,
    pages: Vec<ResultPage>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl MockSource {
    /// Create a new mock source answering nothing.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Answer the first request with these records
    pub fn with_records(self, records: Vec<RawRecord>) -> Self {
        self.with_pages(vec![ResultPage::new(records)])
    }

    /// Answer consecutive requests with these pages, then with empty pages.
    pub fn with_pages(mut self, pages: Vec<ResultPage>) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Behave like an exact-match lookup
    pub fn exact(mut self) -> Self {
        self.exact = true;
        self
    }

    /// Fail every request with a network error
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of pages requested so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// URLs requested so far, in order
    pub fn requested_urls(&self) -> Vec<String> {
        self.urls
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> SourceCapabilities {
        let mut caps = SourceCapabilities::SEARCH;
        if self.exact {
            caps |= SourceCapabilities::EXACT_LOOKUP;
        }
        if self.pagination.is_some() {
            caps |= SourceCapabilities::PAGINATION;
        }
        caps
    }

    fn format_query(&self, query: &CanonicalQuery) -> Result<BackendQuery, SourceError> {
        Ok(BackendQuery::new().with("q", query.raw.trim()))
    }

    fn search_url(&self, query: &BackendQuery) -> String {
        format!("mock://{}?{}", self.id, query.encode())
    }

    fn pagination(&self) -> Option<Pagination> {
        self.pagination
    }

    fn parse_results(&self, _body: &[u8]) -> Result<ResultPage, SourceError> {
        Ok(ResultPage::default())
    }

    async fn fetch_page(&self, _http: &dyn HttpFetch, url: &str) -> Result<ResultPage, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut urls) = self.urls.lock() {
            urls.push(url.to_string());
        }

        if self.failing {
            return Err(SourceError::Network(format!("{} is unreachable", self.id)));
        }
        Ok(self.pages.get(call).cloned().unwrap_or_default())
    }
}

/// In-memory transport answering fixed URLs
#[derive(Debug, Default)]
pub struct MockHttp {
    routes: HashMap<String, Vec<u8>>,
    requests: AtomicUsize,
}

impl MockHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `body`
    pub fn with_route(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.routes.insert(url.into(), body.into());
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetch for MockHttp {
    async fn get(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.routes
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::Network(format!("no route to {}", url)))
    }
}

/// Helper function to create a mock MathSciNet-style record for testing.
pub fn make_record(mrnumber: &str, title: &str, author: &str) -> RawRecord {
    RawRecord::new("article", format!("MR{}", mrnumber))
        .with_field("author", author)
        .with_field("title", title)
        .with_field("mrnumber", mrnumber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_http_routes() {
        let http = MockHttp::new().with_route("mock://a", "body");
        assert_eq!(http.get("mock://a").await.unwrap(), b"body".to_vec());
        assert!(http.get("mock://b").await.is_err());
        assert_eq!(http.request_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_source_serves_pages_in_order() {
        let source = MockSource::new("m")
            .with_records(vec![make_record("1", "A", "Smith, J.")])
            .exact();
        let http = MockHttp::new();

        assert!(source.is_exact_lookup());
        assert_eq!(source.fetch_page(&http, "u1").await.unwrap().records.len(), 1);
        assert!(source.fetch_page(&http, "u2").await.unwrap().records.is_empty());
        assert_eq!(source.call_count(), 2);
        assert_eq!(source.requested_urls(), vec!["u1", "u2"]);
    }
}
