//! Classification of raw user input into a [`CanonicalQuery`].
//!
//! Input is first folded to ASCII. Identifier references (MR numbers, Zbl numbers,
//! arXiv ids) short-circuit everything else. Otherwise the text is recognised as
//! one of three forms:
//!
//! - a BibTeX record, reduced to a few allow-listed fields
//! - a free-form citation or `\bibitem`, stripped of formatting and noise
//! - a field-tagged query such as `au: Smith ti: groups date: 2001-2005`

mod bibtex;
mod citation;
mod fields;
mod ident;
mod pubtype;

use std::borrow::Cow;

use crate::models::{CanonicalQuery, QueryEntry};
use crate::utils::latex::fold_to_ascii;

pub use citation::extract_bibitem;
pub use ident::detect_identifiers;
pub use pubtype::publication_type;

/// Recognised shape of the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryForm {
    Bibtex,
    Citation,
    Fields,
}

/// Classify raw text. Identifier references win over any other structure.
pub fn classify(text: &str) -> CanonicalQuery {
    let folded = fold_to_ascii(text);
    let identifiers = detect_identifiers(&folded);

    match identifiers.first().cloned() {
        Some(first) => {
            let bibitem = extract_bibitem(&folded);
            let mut query = CanonicalQuery::new(folded).with_bibitem(bibitem);
            query.entries = vec![QueryEntry::Term(first)];
            query.identifiers = identifiers;
            query
        }
        None => classify_structured(&folded),
    }
}

/// Classify without identifier detection.
///
/// Sources that cannot resolve the identifier kind found by [`classify`] search
/// on the rest of the input instead.
pub fn classify_structured(text: &str) -> CanonicalQuery {
    let folded = fold_to_ascii(text);
    let bibitem = extract_bibitem(&folded);

    let entries = match detect_form(&folded) {
        QueryForm::Bibtex => bibtex::parse(&folded),
        QueryForm::Citation => citation::parse(&folded),
        QueryForm::Fields => fields::parse(&folded),
    };

    CanonicalQuery::new(folded)
        .with_entries(entries)
        .with_bibitem(bibitem)
        .normalized()
}

/// The query a source without identifier support should search with
pub fn structured(query: &CanonicalQuery) -> Cow<'_, CanonicalQuery> {
    if query.is_identifier_only() {
        Cow::Owned(classify_structured(&query.raw))
    } else {
        Cow::Borrowed(query)
    }
}

/// Decide which parser handles the text; first matching rule wins
pub fn detect_form(text: &str) -> QueryForm {
    if regex!(r"^\s*@\w+\s*\{").is_match(text) {
        QueryForm::Bibtex
    } else if regex!(r"^\s*\\(bibitem|text|emph|newblock|bf\s|it\s)").is_match(text) {
        QueryForm::Citation
    } else if regex!(r"(?i)\b(\w{2,3}|date|year):").is_match(text) {
        // explicit field marker
        QueryForm::Fields
    } else if regex!(r"(?m)^\s*(\w:|\d{4,})").is_match(text) {
        // a line starting with a one-letter field or a year
        QueryForm::Fields
    } else if text.chars().count() > 40 && text.lines().count() < 3 {
        QueryForm::Citation
    } else {
        QueryForm::Fields
    }
}
