//! MRef source implementation.
//!
//! MRef matches a complete reference against MathSciNet and answers with the one
//! record it is sure about, or nothing.

use async_trait::async_trait;

use crate::models::CanonicalQuery;
use crate::sources::mathscinet::fix_mrnumber;
use crate::sources::{BackendQuery, ResultPage, Source, SourceCapabilities, SourceError};
use crate::utils::bibtex::parse_entries;
use crate::utils::latex::unescape_html;

const MREF_URL: &str = "https://mathscinet.ams.org/mathscinet-mref";

/// MRef exact reference matching
#[derive(Debug, Clone)]
pub struct MRefSource {
    base_url: String,
}

impl MRefSource {
    pub fn new() -> Self {
        Self::with_base_url(MREF_URL)
    }

    /// Point the source at another server, e.g. a test double
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Request for a free-text reference
    pub fn reference_query(reference: &str) -> BackendQuery {
        let reference = regex!(r"(?i)\bEdited\s+by\b").replace_all(reference, " ");
        let reference = reference.trim();
        if reference.is_empty() {
            BackendQuery::new()
        } else {
            BackendQuery::new().with("ref", reference)
        }
    }
}

impl Default for MRefSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for MRefSource {
    fn id(&self) -> &str {
        "mref"
    }

    fn name(&self) -> &str {
        "MRef"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::EXACT_LOOKUP
    }

    /// The whole input goes to MRef as written
    fn format_query(&self, query: &CanonicalQuery) -> Result<BackendQuery, SourceError> {
        Ok(Self::reference_query(&query.raw))
    }

    fn search_url(&self, query: &BackendQuery) -> String {
        format!("{}?dataType=bibtex&{}", self.base_url, query.encode())
    }

    fn parse_results(&self, body: &[u8]) -> Result<ResultPage, SourceError> {
        let html = String::from_utf8_lossy(body);

        let Some(pre) = regex!(r"(?s)<pre>(.*?)</pre>")
            .captures(&html)
            .and_then(|c| c.get(1))
        else {
            return Ok(ResultPage::default());
        };

        let data = unescape_html(&fix_mrnumber(pre.as_str()));
        let mut records = parse_entries(&data);
        records.truncate(1);

        Ok(ResultPage::new(records))
    }
}
