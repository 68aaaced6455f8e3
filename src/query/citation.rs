//! Free-form citations and `\bibitem` entries.
//!
//! A citation is reduced to the words most likely to identify the publication:
//! formatting, page ranges, volume numbers, links, publisher boilerplate and short
//! words are removed. A single remaining four-digit year becomes a date term.

use crate::models::{Field, QueryEntry, Term};

/// The leading `\bibitem[label]{key}`, verbatim
pub fn extract_bibitem(text: &str) -> Option<String> {
    bibitem_pattern()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Reduce a citation to a free-text term and, when exactly one year remains, a date term
pub fn parse(text: &str) -> Vec<QueryEntry> {
    let cleaned = clean(text);

    let years: Vec<&str> = regex!(r"\d{4}").find_iter(&cleaned).map(|m| m.as_str()).collect();
    if years.len() == 1 {
        let year = years[0].to_string();
        let rest = regex!(r"\d{4}").replace_all(&cleaned, " ");
        let rest = rest.split_whitespace().collect::<Vec<_>>().join(" ");
        vec![
            QueryEntry::Term(Term::new(Field::None, rest)),
            QueryEntry::Term(Term::new(Field::Date, year)),
        ]
    } else {
        vec![QueryEntry::Term(Term::new(Field::None, cleaned))]
    }
}

fn bibitem_pattern() -> &'static regex::Regex {
    regex!(r"^\s*(\\bibitem\s*(?:\[[^\]]*\])?\s*\{(?:[^{}]|\{[^{}]*\})*\})")
}

/// Strip everything but identifying words from a citation
pub fn clean(text: &str) -> String {
    let text = bibitem_pattern().replace(text, "");

    // identifiers and links end the useful part
    let text = regex!(r"(?i)mr\d{6,}").replace_all(&text, "");
    let text = regex!(
        r"(?is)(https?:|\\doi|doi:|\\mref|\\arxiv|MR\s*:?\s*\d{4,}|zbl\s*\d+|arxiv:?\s*\d+|\\url|\\href).*"
    )
    .replace(&text, "");

    // TeX commands and accents, keeping the accented letter
    let text = regex!(r"\\[A-Za-z]{2,}").replace_all(&text, "");
    let text = regex!(r"\{\\'\{\\i\}\}|\\'\\i\s").replace_all(&text, "i");
    let text = regex!(r"\\c s").replace_all(&text, "s");
    let text = regex!(r"\{\\l\}").replace_all(&text, "l");
    let text = regex!(r"\\\w([\\{])").replace_all(&text, "$1");
    let text = regex!(r"\\\W\s?").replace_all(&text, "");
    let text = text.replace('~', " ");

    // formulas and boilerplate
    let text = regex!(r"(?s)\$.*?\$").replace_all(&text, "");
    let text = regex!(r"(?i)\(electronic\)").replace_all(&text, " ");
    let text = regex!(r"(?is)dedicated\s+to.*").replace(&text, " ");

    let text = regex!(r"[\]\[{}?%#():`]").replace_all(&text, "");
    let text = regex!(r"[&=/,']").replace_all(&text, " ");

    // short words, including "et al"
    let text = regex!(r"(?i)\b(and|not|und|art|vol|eds|isbn|inc|the|with)\b").replace_all(&text, " ");
    let text = regex!(r"\b[A-Za-z]{1,2}\b").replace_all(&text, " ");

    // page ranges and every number that is not a year
    let text = regex!(r"\b\d+\s*-+\s*\d+\b").replace_all(&text, " ");
    let text = regex!(r"\b(\d{1,3}|\d{5,})\b").replace_all(&text, " ");

    let text = regex!(r"(?is)\b(preparation|arxiv|preprint|to\s+appear|submitted|translated\s+from).*")
        .replace(&text, " ");
    let text = regex!(
        r"Birkhauser|Springer|New York|Paris|Heidelberg|Berlin|Boston|Basel|Grenoble|Providence|Verlag"
    )
    .replace_all(&text, "");

    // a short word with a period is an abbreviation
    let text = regex!(r"(\b[a-zA-Z]{0,4})\.").replace_all(&text, "$1*");
    let text = regex!(r"[-.]").replace_all(&text, " ");
    let text = text.replace('\\', "");
    let text = regex!(r"\s+\*+(\s+|$)").replace_all(&text, " ");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
