//! Value formatting shared by the backend query languages.
//!
//! Each backend spells boolean connectives differently and treats quoted phrases
//! differently; the rules for combining words are the same everywhere.

/// How a backend writes connectives and phrases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseStyle {
    pub and: &'static str,
    pub or: &'static str,
    pub not: &'static str,
    /// Keep `"..."` around phrases
    pub keep_quotes: bool,
    /// Whole-word replacements applied to unquoted words
    pub abbreviations: &'static [(&'static str, &'static str)],
}

pub const MATHSCINET_STYLE: PhraseStyle = PhraseStyle {
    and: "and",
    or: "or",
    not: "not",
    keep_quotes: false,
    abbreviations: &[],
};

pub const ZBMATH_STYLE: PhraseStyle = PhraseStyle {
    and: "&",
    or: "|",
    not: "!",
    keep_quotes: true,
    abbreviations: &[("Illinois", "Ill*")],
};

pub const ARXIV_STYLE: PhraseStyle = PhraseStyle {
    and: "and",
    or: "or",
    not: "not",
    keep_quotes: true,
    abbreviations: &[],
};

enum Token<'a> {
    Word(&'a str),
    Phrase(&'a str),
    Open,
    Close,
    And,
    Or,
    Not,
}

/// Format a field value: words are joined with `and` unless another connective
/// is written between them, quoted phrases stay together, leading `and`/`or` and
/// trailing connectives are dropped, unbalanced parentheses are repaired.
pub fn format_value(value: &str, style: &PhraseStyle) -> String {
    let mut out: Vec<String> = Vec::new();
    let (mut or, mut not) = (false, false);
    let mut after_term = false;
    let mut depth = 0usize;

    for token in tokenize(value) {
        match token {
            Token::And => {}
            Token::Or => or = true,
            Token::Not => not = true,
            Token::Close => {
                if depth > 0 {
                    out.push(")".to_string());
                    depth -= 1;
                    after_term = true;
                }
                or = false;
                not = false;
            }
            Token::Open | Token::Word(_) | Token::Phrase(_) => {
                if after_term {
                    out.push(connective(or, not, style));
                } else if not {
                    out.push(style.not.to_string());
                }
                or = false;
                not = false;

                match token {
                    Token::Open => {
                        out.push("(".to_string());
                        depth += 1;
                        after_term = false;
                    }
                    Token::Word(word) => {
                        out.push(abbreviate(word, style));
                        after_term = true;
                    }
                    Token::Phrase(phrase) => {
                        out.push(if style.keep_quotes {
                            format!("\"{}\"", phrase)
                        } else {
                            phrase.to_string()
                        });
                        after_term = true;
                    }
                    _ => {}
                }
            }
        }
    }

    out.extend(std::iter::repeat(")".to_string()).take(depth));

    let joined = out.join(" ");
    let joined = regex!(r"\(\s+").replace_all(&joined, "(");
    let joined = regex!(r"\s+\)").replace_all(&joined, ")");
    regex!(r"\(\)").replace_all(&joined, "").trim().to_string()
}

/// Format an author value. Names written `Last, First` are kept together as phrases.
pub fn format_author(value: &str, style: &PhraseStyle) -> String {
    let names: Vec<String> = regex!(r"(?i)\s+and\s+")
        .split(value.trim())
        .map(|name| {
            if name.contains(',') && !name.contains('"') {
                format!("\"{}\"", name.trim())
            } else {
                name.to_string()
            }
        })
        .collect();
    format_value(&names.join(" and "), style)
}

/// Close any parentheses left open in `value`
pub fn close_parentheses(value: &str) -> String {
    let open = value.matches('(').count();
    let close = value.matches(')').count();
    format!("{}{}", value, ")".repeat(open.saturating_sub(close)))
}

fn connective(or: bool, not: bool, style: &PhraseStyle) -> String {
    match (or, not) {
        (true, true) => format!("{} {}", style.or, style.not),
        (true, false) => style.or.to_string(),
        (false, true) => style.not.to_string(),
        (false, false) => style.and.to_string(),
    }
}

fn abbreviate(word: &str, style: &PhraseStyle) -> String {
    style
        .abbreviations
        .iter()
        .find(|(long, _)| *long == word)
        .map(|(_, short)| short.to_string())
        .unwrap_or_else(|| word.to_string())
}

fn tokenize(value: &str) -> Vec<Token<'_>> {
    regex!(r#""([^"]*)"?|\(|\)|[^\s"()]+"#)
        .captures_iter(value)
        .filter_map(|caps| {
            let text = caps.get(0)?.as_str();
            if let Some(phrase) = caps.get(1) {
                let phrase = phrase.as_str().trim();
                return (!phrase.is_empty()).then_some(Token::Phrase(phrase));
            }
            Some(match text {
                "(" => Token::Open,
                ")" => Token::Close,
                "&" => Token::And,
                "|" => Token::Or,
                "!" => Token::Not,
                _ if text.eq_ignore_ascii_case("and") => Token::And,
                _ if text.eq_ignore_ascii_case("or") => Token::Or,
                _ if text.eq_ignore_ascii_case("not") => Token::Not,
                _ => Token::Word(text),
            })
        })
        .collect()
}

/// A publication year constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateSpec {
    /// Inclusive range
    Range(u32, u32),
    /// Strictly after the year
    After(u32),
    /// Strictly before the year
    Before(u32),
    /// Any of the listed years
    Years(Vec<u32>),
}

impl DateSpec {
    /// Parse `2001-2005`, `>2001`, `<2001`, `2001` or `2001, 2003`.
    /// A reversed range is read as its ascending form.
    pub fn parse(value: &str) -> Option<Self> {
        if let Some(caps) = regex!(r"(\d{4})\s*-+\s*(\d{4})").captures(value) {
            let first: u32 = caps[1].parse().ok()?;
            let last: u32 = caps[2].parse().ok()?;
            return Some(DateSpec::Range(first.min(last), first.max(last)));
        }

        let years: Vec<u32> = regex!(r"\d{4}")
            .find_iter(value)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        let first = *years.first()?;

        let inequality = regex!(r"([<>])\s*\d{4}").captures(value);
        match inequality {
            Some(caps) if years.len() == 1 => {
                if &caps[1] == ">" {
                    Some(DateSpec::After(first))
                } else {
                    Some(DateSpec::Before(first))
                }
            }
            _ => Some(DateSpec::Years(years)),
        }
    }
}
