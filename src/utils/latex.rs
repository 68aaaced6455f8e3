//! Conversions between Unicode text, plain ASCII and LaTeX escapes.

use unicode_normalization::UnicodeNormalization;

/// Letters NFKD does not decompose, with their ASCII and LaTeX spellings
const SPECIAL_LETTERS: &[(char, &str, &str)] = &[
    ('ß', "ss", "{\\ss}"),
    ('ł', "l", "{\\l}"),
    ('Ł', "L", "{\\L}"),
    ('ø', "o", "{\\o}"),
    ('Ø', "O", "{\\O}"),
    ('æ', "ae", "{\\ae}"),
    ('Æ', "AE", "{\\AE}"),
    ('œ', "oe", "{\\oe}"),
    ('Œ', "OE", "{\\OE}"),
    ('đ', "d", "{\\dj}"),
    ('ı', "i", "{\\i}"),
];

/// Typographic punctuation and its LaTeX spelling
const PUNCTUATION: &[(char, &str)] = &[
    ('\u{2013}', "--"),
    ('\u{2014}', "---"),
    ('\u{2018}', "`"),
    ('\u{2019}', "'"),
    ('\u{201C}', "``"),
    ('\u{201D}', "''"),
    ('\u{00A0}', "~"),
];

/// Fold text to ASCII: compatibility-decompose, drop combining marks, spell out
/// the few letters without a decomposition, drop anything else non-ASCII.
pub fn fold_to_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfkd() {
        if c.is_ascii() {
            out.push(c);
        } else if let Some((_, ascii, _)) = SPECIAL_LETTERS.iter().find(|(s, _, _)| *s == c) {
            out.push_str(ascii);
        } else if let Some((_, latex)) = PUNCTUATION.iter().find(|(p, _)| *p == c) {
            out.push_str(if *latex == "~" { " " } else { "-" });
        }
    }
    out
}

/// Replace non-ASCII characters with LaTeX escapes, e.g. `é` becomes `{\'e}`.
/// Characters with no known spelling are kept as they are.
pub fn to_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        if let Some((_, _, latex)) = SPECIAL_LETTERS.iter().find(|(s, _, _)| *s == c) {
            out.push_str(latex);
            continue;
        }
        if let Some((_, latex)) = PUNCTUATION.iter().find(|(p, _)| *p == c) {
            out.push_str(latex);
            continue;
        }
        match accented(c) {
            Some(latex) => out.push_str(&latex),
            None => out.push(c),
        }
    }
    out
}

/// Brace-wrap uppercase letters outside any group, so BibTeX styles keep the case.
/// Letters of control sequences are left alone.
pub fn protect_uppercase(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut depth = 0usize;
    let mut in_command = false;

    for c in text.chars() {
        match c {
            '\\' => {
                in_command = true;
                out.push(c);
                continue;
            }
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }

        if in_command && c.is_ascii_alphabetic() {
            out.push(c);
            continue;
        }
        in_command = false;

        if depth == 0 && c.is_ascii_uppercase() {
            out.push('{');
            out.push(c);
            out.push('}');
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode the HTML entities the bibliographic services leave in `<pre>` blocks
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Minimal escaping for embedding text in HTML
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn accented(c: char) -> Option<String> {
    let mut parts = std::iter::once(c).nfd();
    let base = parts.next()?;
    if !base.is_ascii_alphabetic() {
        return None;
    }

    let marks: Vec<char> = parts.collect();
    if marks.is_empty() {
        return None;
    }

    let mut inner = match base {
        'i' => "\\i".to_string(),
        'j' => "\\j".to_string(),
        _ => base.to_string(),
    };
    for mark in marks {
        let command = accent_command(mark)?;
        let simple = inner.len() == 1 || inner == "\\i" || inner == "\\j";
        inner = if command.chars().all(|ch| ch.is_ascii_alphabetic()) {
            format!("\\{}{{{}}}", command, inner)
        } else if simple {
            format!("\\{}{}", command, inner)
        } else {
            format!("\\{}{{{}}}", command, inner)
        };
    }
    Some(format!("{{{}}}", inner))
}

fn accent_command(mark: char) -> Option<&'static str> {
    Some(match mark {
        '\u{0300}' => "`",
        '\u{0301}' => "'",
        '\u{0302}' => "^",
        '\u{0303}' => "~",
        '\u{0304}' => "=",
        '\u{0306}' => "u",
        '\u{0307}' => ".",
        '\u{0308}' => "\"",
        '\u{030A}' => "r",
        '\u{030B}' => "H",
        '\u{030C}' => "v",
        '\u{0323}' => "d",
        '\u{0327}' => "c",
        '\u{0328}' => "k",
        _ => return None,
    })
}
