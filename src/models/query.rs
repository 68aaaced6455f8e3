//! Canonical query model: an ordered list of field-tagged terms and logic fragments.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A query field understood by at least one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Author,
    Title,
    Journal,
    Date,
    Type,
    Mr,
    Zbl,
    Arxiv,
    Msc,
    Doi,
    /// Searches every field
    Any,
    /// Free text with no field attached
    None,
    /// A backend-specific two or three letter code, lowercased
    #[serde(untagged)]
    Other(String),
}

impl Field {
    /// Canonical lowercase name
    pub fn name(&self) -> &str {
        match self {
            Field::Author => "author",
            Field::Title => "title",
            Field::Journal => "journal",
            Field::Date => "date",
            Field::Type => "type",
            Field::Mr => "mr",
            Field::Zbl => "zbl",
            Field::Arxiv => "arxiv",
            Field::Msc => "msc",
            Field::Doi => "doi",
            Field::Any => "any",
            Field::None => "none",
            Field::Other(code) => code,
        }
    }

    /// Map a name or code to a field. Unknown codes become [`Field::Other`].
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        match name.as_str() {
            "author" => Field::Author,
            "title" => Field::Title,
            "journal" => Field::Journal,
            "date" | "year" => Field::Date,
            "type" => Field::Type,
            "mr" | "mrnumber" => Field::Mr,
            "zbl" => Field::Zbl,
            "arxiv" => Field::Arxiv,
            "msc" => Field::Msc,
            "doi" => Field::Doi,
            "any" | "all" => Field::Any,
            "none" => Field::None,
            _ => Field::Other(name),
        }
    }

    /// True for the MR, Zbl and arXiv identifier fields
    pub fn is_identifier(&self) -> bool {
        matches!(self, Field::Mr | Field::Zbl | Field::Arxiv)
    }

    /// Short marker used when writing the query back as field-tagged text
    fn marker(&self) -> Option<&str> {
        match self {
            Field::Author => Some("au"),
            Field::Title => Some("ti"),
            Field::Journal => Some("jo"),
            Field::None => None,
            other => Some(other.name()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single field-tagged search term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub field: Field,
    pub value: String,
}

impl Term {
    pub fn new(field: Field, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    /// Identifier values joined with `or`, split back into individual ids
    pub fn ids(&self) -> Vec<&str> {
        self.value
            .split(|c: char| c.is_whitespace() || c == '|' || c == ',')
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("or"))
            .collect()
    }
}

/// One element of a canonical query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum QueryEntry {
    /// Connective text between terms: parentheses and `and`/`or`/`not`
    Logic(String),
    Term(Term),
}

/// Classified form of a user query.
///
/// `entries` preserves the order in which terms and logic fragments appeared.
/// `identifiers` holds every MR, Zbl or arXiv identifier recognised in the input; when
/// it is non-empty `entries` is a single identifier-only term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalQuery {
    pub entries: Vec<QueryEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<Term>,
    /// Leading `\bibitem{...}` captured verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bibitem: Option<String>,
    /// The ASCII-folded input the query was classified from
    #[serde(default)]
    pub raw: String,
}

impl CanonicalQuery {
    /// Create an empty query for the given raw text
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            ..Default::default()
        }
    }

    pub fn with_entries(mut self, entries: Vec<QueryEntry>) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_bibitem(mut self, bibitem: Option<String>) -> Self {
        self.bibitem = bibitem;
        self
    }

    pub fn push_term(&mut self, field: Field, value: impl Into<String>) {
        self.entries.push(QueryEntry::Term(Term::new(field, value)));
    }

    pub fn push_logic(&mut self, logic: impl Into<String>) {
        self.entries.push(QueryEntry::Logic(logic.into()));
    }

    /// Iterate over the terms, skipping logic fragments
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.entries.iter().filter_map(|e| match e {
            QueryEntry::Term(t) => Some(t),
            QueryEntry::Logic(_) => None,
        })
    }

    /// First term with the given field
    pub fn term(&self, field: &Field) -> Option<&Term> {
        self.terms().find(|t| &t.field == field)
    }

    /// A recognised identifier of the given kind, if any
    pub fn identifier(&self, field: &Field) -> Option<&Term> {
        self.identifiers.iter().find(|t| &t.field == field)
    }

    /// True when at least one identifier was recognised in the input
    pub fn is_identifier_only(&self) -> bool {
        !self.identifiers.is_empty()
    }

    /// True when no term carries searchable text
    pub fn is_empty(&self) -> bool {
        !self.terms().any(|t| has_content(&t.value))
    }

    /// Canonical form: whitespace collapsed, empty terms dropped, logic fragments
    /// reduced to their tokens and adjacent fragments merged. Idempotent.
    pub fn normalized(&self) -> CanonicalQuery {
        let mut entries: Vec<QueryEntry> = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match entry {
                QueryEntry::Logic(text) => {
                    let tokens = logic_tokens(text);
                    if let Some(QueryEntry::Logic(prev)) = entries.last_mut() {
                        let merged = format!("{prev} {tokens}");
                        *prev = logic_tokens(&merged);
                    } else {
                        entries.push(QueryEntry::Logic(tokens));
                    }
                }
                QueryEntry::Term(term) => {
                    let value = collapse_whitespace(&term.value);
                    if has_content(&value) {
                        entries.push(QueryEntry::Term(Term::new(term.field.clone(), value)));
                    }
                }
            }
        }

        CanonicalQuery {
            entries,
            identifiers: self.identifiers.clone(),
            bibitem: self.bibitem.clone(),
            raw: self.raw.clone(),
        }
    }

    /// Build the boolean expression tree.
    ///
    /// `or` binds loosest, adjacent terms are implicitly `and`ed, `not` and
    /// parentheses bind tightest. Unclosed parentheses are closed at the end and
    /// stray closing parentheses are ignored, as are `not` and `(` nested more than
    /// 32 deep. Returns `None` when there are no terms.
    pub fn to_expr(&self) -> Option<QueryExpr> {
        let mut tokens = Vec::new();
        for entry in &self.entries {
            match entry {
                QueryEntry::Logic(text) => {
                    for word in logic_tokens(text).split_whitespace() {
                        tokens.push(match word {
                            "(" => Token::Open,
                            ")" => Token::Close,
                            "and" => Token::And,
                            "or" => Token::Or,
                            _ => Token::Not,
                        });
                    }
                }
                QueryEntry::Term(term) if has_content(&term.value) => {
                    tokens.push(Token::Term(term));
                }
                QueryEntry::Term(_) => {}
            }
        }

        let mut parser = ExprParser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let mut parts = Vec::new();
        while parser.pos < parser.tokens.len() {
            if matches!(parser.peek(), Some(Token::Close)) {
                parser.pos += 1;
                continue;
            }
            let start = parser.pos;
            match parser.parse_or() {
                Some(expr) => parts.push(expr),
                None if parser.pos == start => parser.pos += 1,
                None => {}
            }
        }
        combine(parts, QueryExpr::And)
    }
}

impl fmt::Display for CanonicalQuery {
    /// Field-tagged text that classifies back to the same terms
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                QueryEntry::Logic(text) => {
                    out.push(' ');
                    out.push_str(&logic_tokens(text));
                    out.push(' ');
                }
                QueryEntry::Term(term) => {
                    out.push(' ');
                    if let Some(marker) = term.field.marker() {
                        out.push_str(marker);
                        out.push_str(": ");
                    }
                    out.push_str(&term.value);
                    out.push(' ');
                }
            }
        }
        write!(f, "{}", collapse_whitespace(&out))
    }
}

/// Boolean expression over query terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryExpr {
    Field(Term),
    And(Vec<QueryExpr>),
    Or(Vec<QueryExpr>),
    Not(Box<QueryExpr>),
    Group(Box<QueryExpr>),
}

/// Connective preceding a term once the tree is flattened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    Or,
    Not,
}

impl Connector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::And => "AND",
            Connector::Or => "OR",
            Connector::Not => "NOT",
        }
    }
}

impl QueryExpr {
    /// Flatten into terms in reading order, each paired with the connective that
    /// joins it to the previous term. The first term gets [`Connector::And`]
    /// unless it is negated.
    pub fn linearize(&self) -> Vec<(Connector, &Term)> {
        let mut out = Vec::new();
        self.collect(Connector::And, &mut out);
        out
    }

    fn collect<'a>(&'a self, incoming: Connector, out: &mut Vec<(Connector, &'a Term)>) {
        match self {
            QueryExpr::Field(term) => out.push((incoming, term)),
            QueryExpr::And(items) | QueryExpr::Or(items) => {
                let joiner = if matches!(self, QueryExpr::And(_)) {
                    Connector::And
                } else {
                    Connector::Or
                };
                for (i, item) in items.iter().enumerate() {
                    item.collect(if i == 0 { incoming } else { joiner }, out);
                }
            }
            QueryExpr::Not(inner) => inner.collect(Connector::Not, out),
            QueryExpr::Group(inner) => inner.collect(incoming, out),
        }
    }
}

/// Nesting of `not` and `(` beyond this is ignored
const MAX_DEPTH: usize = 32;

#[derive(Clone, Copy)]
enum Token<'a> {
    Term(&'a Term),
    Open,
    Close,
    And,
    Or,
    Not,
}

struct ExprParser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn parse_or(&mut self) -> Option<QueryExpr> {
        let mut items: Vec<QueryExpr> = self.parse_and().into_iter().collect();
        while matches!(self.peek(), Some(Token::Or)) {
            self.pos += 1;
            if let Some(expr) = self.parse_and() {
                items.push(expr);
            }
        }
        combine(items, QueryExpr::Or)
    }

    fn parse_and(&mut self) -> Option<QueryExpr> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(Token::And) => self.pos += 1,
                Some(Token::Or) | Some(Token::Close) | None => break,
                _ => match self.parse_unary() {
                    Some(expr) => items.push(expr),
                    None => break,
                },
            }
        }
        combine(items, QueryExpr::And)
    }

    fn parse_unary(&mut self) -> Option<QueryExpr> {
        // openers past the depth cap are dropped
        while self.depth >= MAX_DEPTH && matches!(self.peek(), Some(Token::Not | Token::Open)) {
            self.pos += 1;
        }

        let token = *self.tokens.get(self.pos)?;
        self.pos += 1;
        match token {
            Token::Term(term) => Some(QueryExpr::Field(term.clone())),
            Token::Not => self
                .nested(Self::parse_unary)
                .map(|e| QueryExpr::Not(Box::new(e))),
            Token::Open => {
                let inner = self.nested(Self::parse_or);
                if matches!(self.peek(), Some(Token::Close)) {
                    self.pos += 1;
                }
                inner.map(|e| QueryExpr::Group(Box::new(e)))
            }
            Token::And | Token::Or | Token::Close => None,
        }
    }

    fn nested(&mut self, parse: fn(&mut Self) -> Option<QueryExpr>) -> Option<QueryExpr> {
        self.depth += 1;
        let expr = parse(self);
        self.depth -= 1;
        expr
    }
}

fn combine(mut items: Vec<QueryExpr>, wrap: fn(Vec<QueryExpr>) -> QueryExpr) -> Option<QueryExpr> {
    match items.len() {
        0 => None,
        1 => items.pop(),
        _ => Some(wrap(items)),
    }
}

/// Reduce a logic fragment to space-separated `(`, `)`, `and`, `or`, `not` tokens
fn logic_tokens(text: &str) -> String {
    regex!(r"(?i)\(|\)|\band\b|\bor\b|\bnot\b")
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn has_content(value: &str) -> bool {
    value.chars().any(|c| c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(entries: Vec<QueryEntry>) -> CanonicalQuery {
        CanonicalQuery::new("").with_entries(entries)
    }

    fn term(field: Field, value: &str) -> QueryEntry {
        QueryEntry::Term(Term::new(field, value))
    }

    fn logic(text: &str) -> QueryEntry {
        QueryEntry::Logic(text.to_string())
    }

    #[test]
    fn test_field_from_name() {
        assert_eq!(Field::from_name("Year"), Field::Date);
        assert_eq!(Field::from_name("MRNUMBER"), Field::Mr);
        assert_eq!(Field::from_name("cc"), Field::Other("cc".to_string()));
        assert!(Field::Zbl.is_identifier());
        assert!(!Field::Title.is_identifier());
    }

    #[test]
    fn test_term_ids() {
        let t = Term::new(Field::Mr, "1234567 or 7654321");
        assert_eq!(t.ids(), vec!["1234567", "7654321"]);
    }

    #[test]
    fn test_normalized_is_idempotent() {
        let q = query(vec![
            logic("\n"),
            term(Field::Author, "  Smith  "),
            logic(" \n and ("),
            logic(" "),
            term(Field::Title, "groups\nand rings"),
            term(Field::None, "  , "),
            logic(")"),
        ]);
        let once = q.normalized();
        assert_eq!(once, once.normalized());
        assert_eq!(
            once.entries,
            vec![
                logic(""),
                term(Field::Author, "Smith"),
                logic("and ("),
                term(Field::Title, "groups and rings"),
                logic(")"),
            ]
        );
    }

    #[test]
    fn test_to_expr_implicit_and() {
        let q = query(vec![
            term(Field::Author, "Smith"),
            logic(" "),
            term(Field::Title, "groups"),
        ]);
        assert_eq!(
            q.to_expr(),
            Some(QueryExpr::And(vec![
                QueryExpr::Field(Term::new(Field::Author, "Smith")),
                QueryExpr::Field(Term::new(Field::Title, "groups")),
            ]))
        );
    }

    #[test]
    fn test_to_expr_precedence() {
        // a or b and not c  ==  a or (b and (not c))
        let q = query(vec![
            term(Field::Author, "a"),
            logic("or"),
            term(Field::Title, "b"),
            logic("and not"),
            term(Field::Journal, "c"),
        ]);
        let expr = q.to_expr().unwrap();
        match expr {
            QueryExpr::Or(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[1], QueryExpr::And(inner) if inner.len() == 2));
                if let QueryExpr::And(inner) = &items[1] {
                    assert!(matches!(&inner[1], QueryExpr::Not(_)));
                }
            }
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_to_expr_unbalanced_parentheses() {
        let q = query(vec![
            logic("("),
            term(Field::Author, "a"),
            logic("or"),
            term(Field::Author, "b"),
        ]);
        assert!(matches!(q.to_expr(), Some(QueryExpr::Group(_))));

        let q = query(vec![
            term(Field::Author, "a"),
            logic(")"),
            term(Field::Title, "b"),
        ]);
        assert!(matches!(q.to_expr(), Some(QueryExpr::And(items)) if items.len() == 2));
    }

    #[test]
    fn test_to_expr_deep_nesting() {
        let q = query(vec![
            logic(&"( ".repeat(100_000)),
            term(Field::Author, "Smith"),
        ]);
        let expr = q.to_expr().unwrap();
        let flat = expr.linearize();
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0], (Connector::And, &Term::new(Field::Author, "Smith")));

        let q = query(vec![
            logic(&"not ".repeat(100_000)),
            term(Field::Author, "Smith"),
            logic("or"),
            term(Field::Title, "groups"),
        ]);
        let expr = q.to_expr().unwrap();
        let flat: Vec<_> = expr
            .linearize()
            .into_iter()
            .map(|(c, t)| (c, t.value.as_str()))
            .collect();
        assert_eq!(flat, vec![(Connector::Not, "Smith"), (Connector::Or, "groups")]);
    }

    #[test]
    fn test_to_expr_empty() {
        assert_eq!(query(vec![logic("and")]).to_expr(), None);
        assert_eq!(query(vec![term(Field::None, " ")]).to_expr(), None);
    }

    #[test]
    fn test_linearize_connectors() {
        let q = query(vec![
            term(Field::Author, "a"),
            logic("or"),
            term(Field::Title, "b"),
            logic("not"),
            term(Field::Journal, "c"),
        ]);
        let expr = q.to_expr().unwrap();
        let flat: Vec<_> = expr
            .linearize()
            .into_iter()
            .map(|(c, t)| (c, t.value.as_str()))
            .collect();
        assert_eq!(
            flat,
            vec![
                (Connector::And, "a"),
                (Connector::Or, "b"),
                (Connector::Not, "c")
            ]
        );
    }

    #[test]
    fn test_display_field_tagged() {
        let q = query(vec![
            term(Field::Author, "Smith"),
            logic("\n"),
            term(Field::Title, "groups and rings"),
            logic("\n"),
            term(Field::Date, "2001-2005"),
        ]);
        assert_eq!(q.to_string(), "au: Smith ti: groups and rings date: 2001-2005");
    }

    #[test]
    fn test_is_empty() {
        assert!(query(vec![]).is_empty());
        assert!(query(vec![term(Field::None, "--")]).is_empty());
        assert!(!query(vec![term(Field::None, "x")]).is_empty());
    }
}
