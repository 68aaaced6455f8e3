//! Publication type expressions in zbMATH notation.
//!
//! `a` is a book article (proceedings), `b` a book, `j` a journal article;
//! `|` is or, `&` is and, `!` is not.

/// Translate a type phrase such as `type: journal or book` into `j|b`.
///
/// Returns `None` when the result is not a valid expression of at most three types.
pub fn publication_type(line: &str) -> Option<String> {
    let line = line
        .to_lowercase()
        .replace("type:", "")
        .replace("ty:", "")
        .replace("book article", "a")
        .replace("proceeding", "a")
        .replace("book", "b")
        .replace("journal", "j")
        .replace('s', "")
        .replace("not", "!")
        .replace("and", "&")
        .replace("or", "|")
        .replace('p', "a");

    let compact: Vec<char> = line
        .chars()
        .filter(|c| matches!(c, 'a' | 'b' | 'j' | '|' | '!' | '&'))
        .collect();

    // adjacent types default to or
    let mut expr = String::with_capacity(compact.len() * 2);
    for (i, c) in compact.iter().enumerate() {
        if i > 0 && is_type(compact[i - 1]) && is_type(*c) {
            expr.push('|');
        }
        expr.push(*c);
    }

    regex!(r"^!?[abj]([!|&][abj]){0,2}$")
        .is_match(&expr)
        .then_some(expr)
}

fn is_type(c: char) -> bool {
    matches!(c, 'a' | 'b' | 'j')
}
