//! Field-tagged queries: `au: Smith and (ti: groups or ti: rings) date: 2001-2005`.

use regex::Regex;

use crate::models::{Field, QueryEntry, Term};

use super::pubtype::publication_type;

/// Split field-tagged text into terms and the logic between them
pub fn parse(text: &str) -> Vec<QueryEntry> {
    let text = cleanup(text);

    // one field per line
    let text = regex!(r"([\s()])([a-zA-Z]{2,3}|date|year|type):").replace_all(&text, "$1\n$2:");
    let text = format!("\n{}", text);

    split_keeping_logic(&text)
        .into_iter()
        .filter_map(|(segment, is_separator)| {
            if is_separator || is_logic(segment) {
                Some(QueryEntry::Logic(segment.to_string()))
            } else {
                segment_term(segment).map(QueryEntry::Term)
            }
        })
        .collect()
}

fn cleanup(text: &str) -> String {
    let text = regex!(r"\\[A-Za-z]{2,}").replace_all(text, "");
    let text = regex!(r"\\\w([\\{])").replace_all(&text, "$1");
    let text = regex!(r"\\\W").replace_all(&text, "");
    let text = text.replace('~', " ");
    let text = regex!(r"(?s)\$.*?\$").replace_all(&text, "");
    regex!(r"[{}&?%=/#.]").replace_all(&text, "").into_owned()
}

/// Split on runs of whitespace, parentheses and `and`/`or`/`not` that contain a
/// line break, returning `(text, is_separator)` pairs. Empty separators are skipped.
fn split_keeping_logic(text: &str) -> Vec<(&str, bool)> {
    let separator = regex!(
        r"(?i)(?:[\s()]|\band\b|\bnot\b|\bor\b)*(?:\n+|$)(?:[\s()]|\band\b|\bnot\b|\bor\b)*"
    );

    let mut parts = Vec::new();
    let mut last = 0;
    for m in separator.find_iter(text) {
        if m.as_str().is_empty() {
            continue;
        }
        parts.push((&text[last..m.start()], false));
        parts.push((m.as_str(), true));
        last = m.end();
    }
    parts.push((&text[last..], false));
    parts
}

fn is_logic(segment: &str) -> bool {
    regex!(r"(?i)^(?:[\s()]|\band\b|\bor\b|\bnot\b)*$").is_match(segment)
}

fn segment_term(line: &str) -> Option<Term> {
    if let Some(caps) = date_pattern().captures(line) {
        return Some(Term::new(Field::Date, caps[2].trim()));
    }

    if regex!(r"(?i)^(type:|ty:|\s*(not\s)?\s*(book|journal|proceeding))").is_match(line) {
        return publication_type(line).map(|t| Term::new(Field::Type, t));
    }

    if let Some(caps) = regex!(r"(?is)^(?:a|au|aut[hors]*):(.*)").captures(line) {
        let author = caps[1].trim();
        // "Smith, J" matches any first name starting with J
        let author = regex!(r"(\w{2,},\s+\w)(\s|$)").replace_all(author, "$1*$2");
        return Some(Term::new(Field::Author, author.into_owned()));
    }

    if let Some(caps) = regex!(r"(?is)^(?:j|jo|jou[rnal]*|s|so|sou[rce]*|jr):(.*)").captures(line) {
        return Some(Term::new(Field::Journal, caps[1].trim()));
    }

    if let Some(caps) = regex!(r"(?is)^(?:t|ti|tit[le]*):(.*)").captures(line) {
        return Some(Term::new(Field::Title, caps[1].trim()));
    }

    if regex!(r"(?i)^(any|all|):").is_match(line) {
        let value = regex!(r"^.*?:\s*").replace(line, "");
        return Some(Term::new(Field::Any, value.trim()));
    }

    if let Some(caps) = regex!(r"(?s)^(\w{2,3}):\s*(.*)$").captures(line) {
        return Some(Term::new(Field::from_name(&caps[1]), caps[2].trim()));
    }

    // "Smith, J" without a marker is an author
    if regex!(r"^\s*\w+,\s+\w(\s|\*|$)").is_match(line) {
        let author = format!("\"{}*\"", line.trim()).replace("**", "*");
        return Some(Term::new(Field::Author, author));
    }

    Some(Term::new(Field::None, line.trim()))
}

fn date_pattern() -> &'static Regex {
    regex!(r"(?i)^((?:py|yr|dt|date|year):\D*?)?([<=>]?\s*\d{4}(\s*-+\s*\d{4}|(\b\d{4}\b|[,\s])+)?)")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(text: &str) -> Vec<(Field, String)> {
        parse(text)
            .into_iter()
            .filter_map(|e| match e {
                QueryEntry::Term(t) => Some((t.field, t.value)),
                QueryEntry::Logic(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_split_keeps_logic() {
        let entries = parse("(au: Smith or au: Jones) and not ti: rings");
        let logic: Vec<String> = entries
            .iter()
            .filter_map(|e| match e {
                QueryEntry::Logic(l) => Some(l.split_whitespace().collect::<Vec<_>>().join(" ")),
                QueryEntry::Term(_) => None,
            })
            .filter(|l| !l.is_empty())
            .collect();
        assert_eq!(logic, vec!["(", "or", ") and not"]);
    }

    #[test]
    fn test_word_endings_are_not_logic() {
        assert_eq!(
            terms("au: Victor\nti: Sand"),
            vec![
                (Field::Author, "Victor".to_string()),
                (Field::Title, "Sand".to_string())
            ]
        );
    }

    #[test]
    fn test_dates() {
        assert_eq!(terms("date: >2001"), vec![(Field::Date, ">2001".to_string())]);
        assert_eq!(terms("py: 1990-1995"), vec![(Field::Date, "1990-1995".to_string())]);
        assert_eq!(terms("2001, 2003"), vec![(Field::Date, "2001, 2003".to_string())]);
    }

    #[test]
    fn test_author_initial_wildcard() {
        assert_eq!(
            terms("au: Smith, J"),
            vec![(Field::Author, "Smith, J*".to_string())]
        );
        assert_eq!(
            terms("Smith, J."),
            vec![(Field::Author, "\"Smith, J*\"".to_string())]
        );
    }

    #[test]
    fn test_journal_title_any_and_codes() {
        assert_eq!(
            terms("jo: Ann Math ti: groups any: cohomology cc: 20J06"),
            vec![
                (Field::Journal, "Ann Math".to_string()),
                (Field::Title, "groups".to_string()),
                (Field::Any, "cohomology".to_string()),
                (Field::Other("cc".to_string()), "20J06".to_string()),
            ]
        );
    }

    #[test]
    fn test_unlabelled_text() {
        assert_eq!(
            terms("cohomology of groups"),
            vec![(Field::None, "cohomology of groups".to_string())]
        );
    }

    #[test]
    fn test_cleanup_strips_tex() {
        assert_eq!(
            terms("ti: \\emph{Lie} groups $G$"),
            vec![(Field::Title, "Lie groups".to_string())]
        );
    }
}
