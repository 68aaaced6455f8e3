//! MR, Zbl and arXiv identifier references.

use crate::models::{Field, Term};

/// Most arXiv ids carried by one query
const MAX_ARXIV_IDS: usize = 10;

/// Every identifier kind referenced in `text`, in MR, Zbl, arXiv order.
/// All ids of one kind are joined with ` or `.
pub fn detect_identifiers(text: &str) -> Vec<Term> {
    let mut found = Vec::new();

    let mr: Vec<&str> = regex!(r"(?i)(?:\bmr\s*:?\s*|\\mref\s*\{\s*|mrnumber\s*=\s*\{\s*)(?:mr)?(\d{6,})")
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if !mr.is_empty() {
        found.push(Term::new(Field::Mr, join_unique(mr, usize::MAX)));
    }

    let zbl: Vec<&str> = regex!(
        r"(?i)(?:\bzbl\s*:?\s*|\bzbmath\s*:?\s*|\\zbl\s*\{\s*|zbl\s*=\s*\{\s*)(?:zbl|zbmath)?\s*(\d{4}\.?\d{4,})\b"
    )
    .captures_iter(text)
    .filter_map(|c| c.get(1).map(|m| m.as_str()))
    .collect();
    if !zbl.is_empty() {
        found.push(Term::new(Field::Zbl, join_unique(zbl, usize::MAX)));
    }

    let arxiv: Vec<&str> =
        regex!(r"(?i)(?:\barxiv\s*:\s*|\\arxiv\s*\{\s*|arxiv\s*=\s*\{\s*)(\d{4}\.\d{4,5}(?:v\d+)?)")
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
    if !arxiv.is_empty() {
        found.push(Term::new(Field::Arxiv, join_unique(arxiv, MAX_ARXIV_IDS)));
    }

    found
}

fn join_unique(ids: Vec<&str>, limit: usize) -> String {
    let mut unique: Vec<&str> = Vec::new();
    for id in ids {
        if !unique.contains(&id) {
            unique.push(id);
        }
    }
    unique.truncate(limit);
    unique.join(" or ")
}
