//! Turning raw source records into uniform canonical records.
//!
//! Every source's BibTeX goes through the same cleanup: lowercase entry types and
//! field names, LaTeX escapes instead of non-ASCII characters, braces around
//! uppercase runs in titles, authors as `Last, First`, and an id with a fixed
//! prefix per identifier kind. The cleaned set is deduplicated and ordered by id.

use crate::models::{CanonicalRecord, RawRecord};
use crate::utils::deduplicate_records;
use crate::utils::latex::{protect_uppercase, to_latex};

/// Lowercase name particles that belong to the last name
const PARTICLES: &[&str] = &["van", "von", "der", "den", "de", "di", "da", "du", "del", "la", "le"];

/// Normalize one source's records
pub fn normalize(records: Vec<RawRecord>) -> Vec<CanonicalRecord> {
    merge(records.iter().map(canonicalize).collect())
}

/// Deduplicate already canonical records, possibly from several sources, and order them by id
pub fn merge(records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
    let mut records = deduplicate_records(records);
    records.sort_by(|a, b| a.id.cmp(&b.id));
    records
}

/// Canonical form of one record
pub fn canonicalize(record: &RawRecord) -> CanonicalRecord {
    let mut canonical = CanonicalRecord::new(record.entry_type.to_lowercase(), "");

    for (name, value) in &record.fields {
        let name = name.to_lowercase();
        if canonical.fields.contains_key(&name) {
            continue;
        }

        let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
        let value = if value.is_ascii() { value } else { to_latex(&value) };
        let value = match name.as_str() {
            "title" => protect_uppercase(&value),
            "author" | "editor" => canonical_names(&value),
            _ => value,
        };
        canonical.fields.insert(name, value);
    }

    canonical.id = record_id(&canonical, &record.key);
    canonical
}

fn record_id(record: &CanonicalRecord, key: &str) -> String {
    if let Some(mr) = record.field("mrnumber") {
        format!("MR{}", mr.trim())
    } else if let Some(zbl) = record.field("zbl") {
        format!("Zbl{}", zbl.trim())
    } else if let Some(arxiv) = record.field("arxiv") {
        arxiv.trim().to_string()
    } else {
        key.to_string()
    }
}

/// `First Last and ...` becomes `Last, First and ...`
pub fn canonical_names(value: &str) -> String {
    regex!(r"\s+and\s+")
        .split(value)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(last_name_first)
        .collect::<Vec<_>>()
        .join(" and ")
}

fn last_name_first(name: &str) -> String {
    if name.contains(',') || name.starts_with('{') {
        return name.to_string();
    }

    let parts: Vec<&str> = name.split_whitespace().collect();
    if parts.len() < 2 {
        return name.to_string();
    }

    // the last name starts at the first particle, or is the final word
    let split = parts[..parts.len() - 1]
        .iter()
        .position(|p| PARTICLES.contains(p))
        .filter(|&i| i > 0)
        .unwrap_or(parts.len() - 1);

    format!("{}, {}", parts[split..].join(" "), parts[..split].join(" "))
}
