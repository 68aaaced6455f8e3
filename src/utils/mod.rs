//! Utility modules supporting citation lookups.
//!
//! - [`HttpClient`] / [`HttpFetch`]: the GET seam every source fetches through
//! - [`bibtex`]: lenient BibTeX reader and normalized writer
//! - [`latex`]: ASCII folding, LaTeX escapes, HTML entities
//! - [`deduplicate_records`]: collapse the same publication reported by several services

pub mod bibtex;
mod dedup;
mod http;
pub mod latex;

pub use dedup::{deduplicate_records, find_duplicates};
pub use http::{HttpClient, HttpFetch, DEFAULT_TIMEOUT_SECS};
