//! Lenient BibTeX reader and a writer for normalized records.
//!
//! The reader accepts what the bibliographic services actually emit: uppercase
//! field names, braced or quoted values, bare numbers, `#` concatenation. Entries
//! that cannot be parsed are skipped rather than failing the whole text.

use std::collections::BTreeMap;

use crate::models::RawRecord;

/// Parse every entry in `text`. `@comment`, `@preamble` and `@string` blocks are skipped.
pub fn parse_entries(text: &str) -> Vec<RawRecord> {
    let mut reader = Reader {
        src: text.as_bytes(),
        text,
        pos: 0,
    };
    let mut entries = Vec::new();

    while let Some(at) = text.get(reader.pos..).and_then(|rest| rest.find('@')) {
        reader.pos += at + 1;
        let start = reader.pos;
        match reader.entry() {
            Some(Some(entry)) => entries.push(entry),
            Some(None) => {}
            None => {
                tracing::debug!("Skipping malformed BibTeX entry at byte {}", start);
                reader.pos = start;
            }
        }
    }

    entries
}

/// Write one entry with four-space indented fields
pub fn write_entry(entry_type: &str, key: &str, fields: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    out.push('@');
    out.push_str(entry_type);
    out.push('{');
    out.push_str(key);
    out.push_str(",\n");

    for (name, value) in fields {
        out.push_str("    ");
        out.push_str(name);
        out.push_str(" = {");
        out.push_str(value);
        out.push_str("},\n");
    }

    out.push_str("}\n");
    out
}

struct Reader<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    /// `Some(Some(_))` for an entry, `Some(None)` for a skipped block, `None` when malformed
    fn entry(&mut self) -> Option<Option<RawRecord>> {
        let entry_type = self.word()?;
        self.skip_ws();
        let close = match self.bump()? {
            b'{' => b'}',
            b'(' => b')',
            _ => return None,
        };

        if matches!(
            entry_type.to_ascii_lowercase().as_str(),
            "comment" | "preamble" | "string"
        ) {
            self.pos -= 1;
            self.balanced(b'{', b'}')
                .map(|_| ())
                .or_else(|| self.until(close))?;
            return Some(None);
        }

        self.skip_ws();
        let key_start = self.pos;
        while let Some(&c) = self.src.get(self.pos) {
            if c == b',' || c == close {
                break;
            }
            self.pos += 1;
        }
        let key = self.text[key_start..self.pos].trim().to_string();

        let mut record = RawRecord::new(entry_type, key);
        loop {
            self.skip_ws();
            match self.src.get(self.pos) {
                Some(&c) if c == close => {
                    self.pos += 1;
                    return Some(Some(record));
                }
                Some(b',') => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => {}
                None => return Some(Some(record)),
            }

            let name = self.field_name()?;
            self.skip_ws();
            if self.bump()? != b'=' {
                return None;
            }
            let value = self.value(close)?;
            record.fields.push((name, value));
        }
    }

    fn word(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.text[start..self.pos].to_string())
    }

    fn field_name(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|c| !c.is_ascii_whitespace() && !matches!(c, b'=' | b',' | b'{' | b'}'))
        {
            self.pos += 1;
        }
        (self.pos > start).then(|| self.text[start..self.pos].to_string())
    }

    /// One or more `#`-joined pieces
    fn value(&mut self, close: u8) -> Option<String> {
        let mut value = String::new();
        loop {
            self.skip_ws();
            match *self.src.get(self.pos)? {
                b'{' => value.push_str(self.balanced(b'{', b'}')?),
                b'"' => value.push_str(self.quoted()?),
                _ => {
                    let start = self.pos;
                    while self
                        .src
                        .get(self.pos)
                        .is_some_and(|c| *c != b',' && *c != close && *c != b'#')
                    {
                        self.pos += 1;
                    }
                    value.push_str(self.text[start..self.pos].trim());
                }
            }
            self.skip_ws();
            if self.src.get(self.pos) == Some(&b'#') {
                self.pos += 1;
            } else {
                return Some(value);
            }
        }
    }

    /// Contents of a balanced `{...}` group, without the outer braces
    fn balanced(&mut self, open: u8, close: u8) -> Option<&'a str> {
        if self.src.get(self.pos) != Some(&open) {
            return None;
        }
        let start = self.pos + 1;
        let mut depth = 0usize;
        while let Some(&c) = self.src.get(self.pos) {
            self.pos += 1;
            if c == b'\\' {
                self.skip_escaped();
            } else if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth == 0 {
                    return self.text.get(start..self.pos - 1);
                }
            }
        }
        None
    }

    fn quoted(&mut self) -> Option<&'a str> {
        let start = self.pos + 1;
        self.pos += 1;
        let mut depth = 0usize;
        while let Some(&c) = self.src.get(self.pos) {
            self.pos += 1;
            match c {
                b'\\' => self.skip_escaped(),
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'"' if depth == 0 => return self.text.get(start..self.pos - 1),
                _ => {}
            }
        }
        None
    }

    /// Step over the byte after a backslash, stopping at the end of input
    fn skip_escaped(&mut self) {
        self.pos = (self.pos + 1).min(self.src.len());
    }

    fn until(&mut self, close: u8) -> Option<()> {
        let offset = self.src.get(self.pos..)?.iter().position(|c| *c == close)?;
        self.pos += offset + 1;
        Some(())
    }

    fn bump(&mut self) -> Option<u8> {
        let c = *self.src.get(self.pos)?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.src.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_entry() {
        let entries =
            parse_entries("@article{foo, author={Smith, J.}, title={On X}, year={2001}}");
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.entry_type, "article");
        assert_eq!(e.key, "foo");
        assert_eq!(e.field("author"), Some("Smith, J."));
        assert_eq!(e.field("title"), Some("On X"));
        assert_eq!(e.field("year"), Some("2001"));
    }

    #[test]
    fn test_parse_mathscinet_style() {
        let text = r#"
@article {MR1234567,
    AUTHOR = {M\"uller, K.},
    TITLE = {On {L}ie groups},
    JOURNAL = "Ann. of Math. (2)",
    YEAR = 2001,
    MRNUMBER = {1234567},
}

@book {MR7654321,
    AUTHOR = {Doe, A.},
    TITLE = {Rings},
}
"#;
        let entries = parse_entries(text);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "MR1234567");
        assert_eq!(entries[0].field("author"), Some(r#"M\"uller, K."#));
        assert_eq!(entries[0].field("title"), Some("On {L}ie groups"));
        assert_eq!(entries[0].field("journal"), Some("Ann. of Math. (2)"));
        assert_eq!(entries[0].field("year"), Some("2001"));
        assert_eq!(entries[1].entry_type, "book");
    }

    #[test]
    fn test_concatenation_and_comments() {
        let text = "@comment{ignore me}\n@misc{k, note = \"a\" # {b}}";
        let entries = parse_entries(text);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field("note"), Some("ab"));
    }

    #[test]
    fn test_malformed_entry_is_skipped() {
        let text = "@article{broken, title = {unterminated\n@article{ok, title={Fine}}";
        let entries = parse_entries(text);
        assert!(entries.iter().any(|e| e.key == "ok"));
    }

    #[test]
    fn test_trailing_backslash() {
        assert!(parse_entries("@comment{x\\").is_empty());
        assert!(parse_entries("@string(x\\").is_empty());
        assert!(parse_entries("@misc{k, note = \"a\\").is_empty());
        assert!(parse_entries("@misc{k, note = {a\\").is_empty());

        let entries = parse_entries("@comment{x\\}} @misc{k, title={T}}");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].field("title"), Some("T"));
    }

    #[test]
    fn test_no_entries() {
        assert!(parse_entries("no bibtex here").is_empty());
        assert!(parse_entries("user@example.com").is_empty());
    }

    #[test]
    fn test_write_entry() {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), "On X".to_string());
        fields.insert("author".to_string(), "Smith, J.".to_string());
        let text = write_entry("article", "MR1", &fields);
        assert_eq!(
            text,
            "@article{MR1,\n    author = {Smith, J.},\n    title = {On X},\n}\n"
        );
    }
}
