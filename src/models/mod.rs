//! Core data models shared by the classifier, the sources and the arbitrator.

mod query;
mod record;

pub use query::{CanonicalQuery, Connector, Field, QueryEntry, QueryExpr, Term};
pub use record::{CanonicalRecord, FetchOutcome, RawRecord};
