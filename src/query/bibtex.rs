//! Partial BibTeX records used as queries.

use crate::models::{Field, QueryEntry, Term};
use crate::utils::bibtex::parse_entries;

/// Terms from the first entry's author, title, journal, year and identifier fields
pub fn parse(text: &str) -> Vec<QueryEntry> {
    let Some(record) = parse_entries(text).into_iter().next() else {
        return Vec::new();
    };

    record
        .fields
        .iter()
        .filter_map(|(name, value)| {
            let field = match name.to_lowercase().as_str() {
                "author" => Field::Author,
                "title" => Field::Title,
                "journal" => Field::Journal,
                "year" | "date" => Field::Date,
                "mrnumber" => Field::Mr,
                "zbl" => Field::Zbl,
                "arxiv" => Field::Arxiv,
                _ => return None,
            };
            Some(QueryEntry::Term(Term::new(field, strip_markup(value))))
        })
        .collect()
}

/// Drop TeX commands, accents, formulas and braces, keeping the words
fn strip_markup(value: &str) -> String {
    let value = regex!(r"(?s)\$.*?\$").replace_all(value, "");
    let value = regex!(r"\\[A-Za-z]{2,}").replace_all(&value, "");
    let value = regex!(r"\\\W|\\\w([\\{])").replace_all(&value, "$1");
    let value = value.replace(['{', '}'], "").replace('~', " ");
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
