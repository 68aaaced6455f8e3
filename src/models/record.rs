//! Bibliographic records as fetched, as normalized, and as returned by a lookup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A BibTeX entry exactly as a source returned it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Entry type as written (`article`, `Book`, ...)
    pub entry_type: String,

    /// Citation key as written
    pub key: String,

    /// Fields in source order, names as written
    pub fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new(entry_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            key: key.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Case-insensitive field lookup
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace a field in place, or append it
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }
}

/// A normalized record: lowercase field names, LaTeX-safe values, stable id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Lowercase entry type
    pub entry_type: String,

    /// `MR<number>`, `Zbl<number>`, the arXiv id, or the original key
    pub id: String,

    pub fields: BTreeMap<String, String>,
}

impl CanonicalRecord {
    pub fn new(entry_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entry_type: entry_type.into(),
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_lowercase(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn title(&self) -> Option<&str> {
        self.field("title")
    }

    /// Author names, split on ` and `
    pub fn author_list(&self) -> Vec<&str> {
        self.field("author")
            .map(|a| {
                a.split(" and ")
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Identifier fields this record carries
    pub fn identifiers(&self) -> Vec<(&'static str, &str)> {
        ["mrnumber", "zbl", "arxiv", "doi"]
            .into_iter()
            .filter_map(|name| self.field(name).map(|v| (name, v)))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect()
    }

    /// Which backend family produced the record, judged from its id
    pub fn origin(&self) -> &'static str {
        if self.id.starts_with("MR") {
            "mathscinet"
        } else if self.id.starts_with("Zbl") {
            "zbmath"
        } else if self.fields.contains_key("arxiv") {
            "arxiv"
        } else {
            "unknown"
        }
    }

    /// Serialize as a BibTeX entry
    pub fn to_bibtex(&self) -> String {
        crate::utils::bibtex::write_entry(&self.entry_type, &self.id, &self.fields)
    }
}

/// Result of one lookup against one backend, or of an arbitration across several.
///
/// `is_unique` implies `count == 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// Display name of the backend, or the contributing backends joined with `+`
    pub backend: String,

    pub records: Vec<CanonicalRecord>,

    /// Number of records returned
    pub count: usize,

    /// Number of matches the backend reported, at least `count`
    pub total: usize,

    pub is_unique: bool,

    /// `\bibitem{...}` captured from the query
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bibitem: Option<String>,

    /// Reason the lookup failed, for lookups folded into an empty outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl FetchOutcome {
    /// An empty outcome
    pub fn empty(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Default::default()
        }
    }

    /// A failed lookup, reported as zero records
    pub fn failed(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            failure: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Build from records; unique when exactly one record was found in total
    pub fn from_records(backend: impl Into<String>, records: Vec<CanonicalRecord>, total: usize) -> Self {
        let count = records.len();
        let total = total.max(count);
        Self {
            backend: backend.into(),
            records,
            count,
            total,
            is_unique: count == 1 && total == 1,
            bibitem: None,
            failure: None,
        }
    }

    /// Attach the query's bibitem
    pub fn with_bibitem(mut self, bibitem: Option<String>) -> Self {
        self.bibitem = bibitem;
        self
    }

    /// Mark the outcome as unique; only takes effect for exactly one record
    pub fn unique(mut self) -> Self {
        self.is_unique = self.count == 1;
        self
    }

    /// Mark the outcome as not unique regardless of its count
    pub fn non_unique(mut self) -> Self {
        self.is_unique = false;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// All records as BibTeX, separated by blank lines
    pub fn bibtex(&self) -> String {
        self.records
            .iter()
            .map(CanonicalRecord::to_bibtex)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> CanonicalRecord {
        CanonicalRecord::new("article", id)
            .with_field("author", "Smith, J. and Doe, A.")
            .with_field("title", "On X")
    }

    #[test]
    fn test_raw_record_fields() {
        let mut raw = RawRecord::new("Article", "key").with_field("TITLE", "On X");
        assert_eq!(raw.field("title"), Some("On X"));
        raw.set_field("title", "On Y");
        raw.set_field("year", "2001");
        assert_eq!(raw.field("Title"), Some("On Y"));
        assert_eq!(raw.fields.len(), 2);
    }

    #[test]
    fn test_author_list() {
        assert_eq!(record("MR1").author_list(), vec!["Smith, J.", "Doe, A."]);
    }

    #[test]
    fn test_origin() {
        assert_eq!(record("MR1234567").origin(), "mathscinet");
        assert_eq!(record("Zbl1234.56789").origin(), "zbmath");
        assert_eq!(
            record("1234.5678").with_field("arxiv", "1234.5678").origin(),
            "arxiv"
        );
    }

    #[test]
    fn test_uniqueness_requires_single_record() {
        let one = FetchOutcome::from_records("MathSciNet", vec![record("MR1")], 1);
        assert!(one.is_unique);

        let truncated = FetchOutcome::from_records("MathSciNet", vec![record("MR1")], 7);
        assert!(!truncated.is_unique);
        assert_eq!(truncated.total, 7);

        let two = FetchOutcome::from_records("zbMATH", vec![record("Zbl1"), record("Zbl2")], 0);
        assert_eq!(two.total, 2);
        assert!(!two.unique().is_unique);
    }

    #[test]
    fn test_failed_outcome_is_empty() {
        let outcome = FetchOutcome::failed("arXiv", "timeout");
        assert!(outcome.is_empty());
        assert!(outcome.is_failure());
        assert!(!outcome.is_unique);
    }
}
