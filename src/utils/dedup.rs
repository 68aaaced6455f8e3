//! Deduplication of bibliographic records across sources.

use std::collections::HashSet;
use strsim::jaro_winkler;

use crate::models::CanonicalRecord;

/// Identifier fields copied from a dropped duplicate onto the record that is kept
const MERGED_IDENTIFIERS: &[&str] = &["mrnumber", "zbl", "arxiv", "doi"];

/// Find duplicate records based on id, shared identifiers, and title similarity
///
/// Returns groups of record indices that are duplicates of each other
pub fn find_duplicates(records: &[CanonicalRecord]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut processed: HashSet<usize> = HashSet::new();

    for i in 0..records.len() {
        if processed.contains(&i) {
            continue;
        }

        let mut group = vec![i];
        let record_i = &records[i];

        for (j, record_j) in records.iter().enumerate().skip(i + 1) {
            if processed.contains(&j) {
                continue;
            }

            if are_duplicates(record_i, record_j) {
                group.push(j);
                processed.insert(j);
            }
        }

        if group.len() > 1 {
            groups.push(group);
        }

        processed.insert(i);
    }

    groups
}

/// Check if two records are likely the same publication
fn are_duplicates(a: &CanonicalRecord, b: &CanonicalRecord) -> bool {
    if a.id == b.id {
        return true;
    }

    // Shared identifier (strongest signal after the id)
    for name in MERGED_IDENTIFIERS {
        if let (Some(x), Some(y)) = (a.field(name), b.field(name)) {
            if !x.trim().is_empty() && x.trim().eq_ignore_ascii_case(y.trim()) {
                return true;
            }
        }
    }

    // One service never lists a publication twice; fuzzy matching only across services
    if a.origin() == b.origin() {
        return false;
    }

    let title_a = normalize_title(a.title().unwrap_or_default());
    let title_b = normalize_title(b.title().unwrap_or_default());
    if title_a.is_empty() || title_b.is_empty() {
        return false;
    }

    // High title similarity (0.95+ threshold)
    jaro_winkler(&title_a, &title_b) >= 0.95 && authors_match(a, b)
}

/// Check if at least one author surname is shared
fn authors_match(a: &CanonicalRecord, b: &CanonicalRecord) -> bool {
    let surnames = |r: &CanonicalRecord| -> HashSet<String> {
        r.author_list()
            .iter()
            .map(|name| {
                name.split(',')
                    .next()
                    .unwrap_or_default()
                    .to_lowercase()
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect::<String>()
            })
            .filter(|s| !s.is_empty())
            .collect()
    };
    let authors_a = surnames(a);
    let authors_b = surnames(b);

    // If one has no authors, can't compare
    if authors_a.is_empty() || authors_b.is_empty() {
        return true;
    }

    authors_a.intersection(&authors_b).count() > 0
}

/// Normalize a title for comparison: drop braces, TeX commands and punctuation
fn normalize_title(title: &str) -> String {
    regex!(r"\\[A-Za-z]+|\\.")
        .replace_all(title, "")
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove duplicate records, keeping the first occurrence of each group.
///
/// Identifier fields missing on the kept record are filled in from its duplicates.
pub fn deduplicate_records(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let groups = find_duplicates(&records);

    if groups.is_empty() {
        return records;
    }

    let mut records: Vec<Option<CanonicalRecord>> = records.into_iter().map(Some).collect();

    for group in groups {
        let mut dropped = Vec::new();
        for idx in group.iter().skip(1) {
            if let Some(record) = records[*idx].take() {
                dropped.push(record);
            }
        }

        if let Some(kept) = records[group[0]].as_mut() {
            for duplicate in dropped {
                for name in MERGED_IDENTIFIERS {
                    if let Some(value) = duplicate.field(name) {
                        kept.fields
                            .entry(name.to_string())
                            .or_insert_with(|| value.to_string());
                    }
                }
            }
        }
    }

    records.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record(id: &str, title: &str, authors: &str) -> CanonicalRecord {
        CanonicalRecord::new("article", id)
            .with_field("title", title)
            .with_field("author", authors)
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("{O}n the {\\v{C}}ech   complex."),
            "on the cech complex"
        );
    }

    #[test]
    fn test_deduplicate_by_id() {
        let records = vec![
            make_record("MR1", "On X", "Smith, J."),
            make_record("MR1", "On X", "Smith, J."),
        ];
        assert_eq!(deduplicate_records(records).len(), 1);
    }

    #[test]
    fn test_deduplicate_by_doi_case_insensitive() {
        let records = vec![
            make_record("MR1", "On X", "Smith, J.").with_field("doi", "10.1234/ABC"),
            make_record("Zbl2", "Something else", "Doe, A.").with_field("doi", "10.1234/abc"),
        ];
        let result = deduplicate_records(records);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "MR1");
    }

    #[test]
    fn test_deduplicate_by_title_merges_identifiers() {
        let records = vec![
            make_record("MR1234567", "On Lie groups", "Smith, John"),
            make_record("Zbl1234.56789", "On {L}ie groups", "Smith, J.")
                .with_field("zbl", "1234.56789"),
        ];
        let result = deduplicate_records(records);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "MR1234567");
        assert_eq!(result[0].field("zbl"), Some("1234.56789"));
    }

    #[test]
    fn test_no_fuzzy_duplicates_same_source() {
        let records = vec![
            make_record("MR1", "On Lie groups", "Smith, J."),
            make_record("MR2", "On Lie groups", "Smith, J."),
        ];
        assert_eq!(deduplicate_records(records).len(), 2);
    }

    #[test]
    fn test_no_duplicates_different_titles() {
        let records = vec![
            make_record("MR1", "Machine learning", "Smith, J."),
            make_record("Zbl2", "Quantum cohomology", "Smith, J."),
        ];
        assert_eq!(deduplicate_records(records).len(), 2);
    }

    #[test]
    fn test_no_duplicates_no_common_authors() {
        let records = vec![
            make_record("MR1", "On Lie groups", "Smith, J."),
            make_record("Zbl2", "On Lie groups", "Doe, A."),
        ];
        assert_eq!(deduplicate_records(records).len(), 2);
    }

    #[test]
    fn test_find_duplicates_groups() {
        let records = vec![
            make_record("MR1", "A", "X, Y."),
            make_record("MR2", "B", "X, Y."),
            make_record("MR1", "A", "X, Y."),
        ];
        assert_eq!(find_duplicates(&records), vec![vec![0, 2]]);
    }

    #[test]
    fn test_deduplicate_empty_and_single() {
        assert!(deduplicate_records(Vec::new()).is_empty());
        assert_eq!(
            deduplicate_records(vec![make_record("MR1", "A", "B, C.")]).len(),
            1
        );
    }
}
