//! # mathcite
//!
//! Resolve a bibliographic citation (free text, a partial BibTeX record, a LaTeX `\bibitem`
//! or a field-tagged query) into normalized BibTeX records by querying MathSciNet, MRef,
//! zbMATH and arXiv, and arbitrating between their answers.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Canonical query, records and fetch outcomes
//! - [`query`]: Classification of raw input into a [`CanonicalQuery`]
//! - [`sources`]: Backend plugins behind the [`Source`] trait
//! - [`normalize`]: Cleanup and deduplication of fetched BibTeX
//! - [`resolve`]: Multi-backend arbitration
//! - [`harness`]: Bounded-concurrency execution of many lookups
//! - [`render`], [`batch`]: Output shaping for the terminal front end
//! - [`config`]: Configuration management
//! - [`utils`]: HTTP client, BibTeX reader/writer, LaTeX helpers, deduplication

#[macro_use]
mod macros;

pub mod batch;
pub mod config;
pub mod harness;
pub mod models;
pub mod normalize;
pub mod query;
pub mod render;
pub mod resolve;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use models::{CanonicalQuery, CanonicalRecord, FetchOutcome};
pub use query::classify;
pub use resolve::Arbitrator;
pub use sources::{Source, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
