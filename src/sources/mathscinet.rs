//! MathSciNet source implementation.
//!
//! Uses the publication search form with BibTeX output. The form takes up to ten
//! search cells (`pgN` field code, `sN` value, `coN` connective) plus a date
//! restriction, and pages through results with the `r` offset parameter.

use async_trait::async_trait;

use crate::models::{CanonicalQuery, Connector, Field, Term};
use crate::query::structured;
use crate::sources::dialect::{
    close_parentheses, format_author, format_value, DateSpec, MATHSCINET_STYLE,
};
use crate::sources::{BackendQuery, Pagination, ResultPage, Source, SourceCapabilities, SourceError};
use crate::utils::bibtex::parse_entries;
use crate::utils::latex::unescape_html;

const MSN_SEARCH_URL: &str = "https://mathscinet.ams.org/mathscinet/search/publications.html";

/// Most search cells the form accepts
const MAX_CELLS: usize = 10;

/// Records per result page
const PAGE_SIZE: usize = 100;

/// Search-form field codes for the short codes users can type
const FIELD_CODES: &[(&str, &str)] = &[
    ("ref", "REFF"),
    ("ic", "IC"),
    ("se", "SE"),
    ("rt", "RT"),
    ("mr", "MR"),
    ("rev", "RVCN"),
    ("all", "ALLF"),
    ("any", "ALLF"),
    ("mscp", "PC"),
    ("pc", "PC"),
    ("cc", "CC"),
    ("msc", "CC"),
    ("ar", "ICN"),
    ("rel", "ICN"),
    ("icn", "ICN"),
    ("aid", "INDI"),
    ("ti", "TI"),
];

/// MathSciNet publication search
#[derive(Debug, Clone)]
pub struct MathSciNetSource {
    base_url: String,
}

impl MathSciNetSource {
    pub fn new() -> Self {
        Self::with_base_url(MSN_SEARCH_URL)
    }

    /// Point the source at another server, e.g. a test double
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn mr_query(ids: &str) -> BackendQuery {
        BackendQuery::new()
            .with("pg1", "MR")
            .with("co1", "AND")
            .with("s1", ids)
    }

    fn cell_value(term: &Term) -> String {
        match term.field {
            Field::Type => term
                .value
                .chars()
                .find_map(|c| match c {
                    'a' => Some("Proceedings"),
                    'b' => Some("Books"),
                    'j' => Some("Journals"),
                    _ => None,
                })
                .unwrap_or_default()
                .to_string(),
            Field::Author => format_author(&term.value, &MATHSCINET_STYLE),
            _ => format_value(&close_parentheses(&term.value), &MATHSCINET_STYLE),
        }
    }
}

impl Default for MathSciNetSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Search-form code for a field, `None` when the form has no such field
fn field_code(field: &Field) -> Option<&'static str> {
    match field {
        Field::Title => Some("TI"),
        Field::Author => Some("AUCN"),
        Field::Journal => Some("JOUR"),
        Field::Any | Field::None => Some("ALLF"),
        Field::Type => Some("ET"),
        Field::Msc => Some("CC"),
        Field::Mr => Some("MR"),
        Field::Other(code) => {
            let code = code.to_lowercase();
            FIELD_CODES
                .iter()
                .find(|(short, long)| *short == code || long.eq_ignore_ascii_case(&code))
                .map(|(_, long)| *long)
        }
        _ => None,
    }
}

fn date_params(spec: &DateSpec) -> BackendQuery {
    let request = BackendQuery::new().with("dr", "pubyear");
    match spec {
        DateSpec::Range(first, last) => request
            .with("yearRangeFirst", first.to_string())
            .with("yearRangeSecond", last.to_string()),
        DateSpec::After(year) => request.with("yrop", "gt").with("arg3", year.to_string()),
        DateSpec::Before(year) => request.with("yrop", "lt").with("arg3", year.to_string()),
        DateSpec::Years(years) => request
            .with("yrop", "eq")
            .with("arg3", years.first().map(u32::to_string).unwrap_or_default()),
    }
}

/// Keep only the number in `MRNUMBER` fields, which also carry the review class
pub(crate) fn fix_mrnumber(data: &str) -> String {
    regex!(r"(?mi)MRNUMBER\s*=\s*\{(.*?)(\s|\}).*$")
        .replace_all(data, "MRNUMBER = {$1},")
        .into_owned()
}

#[async_trait]
impl Source for MathSciNetSource {
    fn id(&self) -> &str {
        "mathscinet"
    }

    fn name(&self) -> &str {
        "MathSciNet"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::PAGINATION | SourceCapabilities::WEBSITE
    }

    fn identifier_query(&self, query: &CanonicalQuery) -> Option<BackendQuery> {
        query
            .identifier(&Field::Mr)
            .map(|term| Self::mr_query(&term.value))
    }

    fn format_query(&self, query: &CanonicalQuery) -> Result<BackendQuery, SourceError> {
        let query = structured(query);
        let Some(expr) = query.to_expr() else {
            return Ok(BackendQuery::new());
        };

        let mut date = None;
        // connective to the previous cell, field code, search text
        let mut cells: Vec<(Connector, &str, String)> = Vec::new();

        for (connector, term) in expr.linearize() {
            if !term.value.chars().any(char::is_alphanumeric) {
                continue;
            }

            match &term.field {
                Field::Mr => return Ok(Self::mr_query(&term.value)),
                Field::Date => {
                    if date.is_none() {
                        date = DateSpec::parse(&term.value);
                    }
                }
                field => {
                    let Some(code) = field_code(field) else {
                        continue;
                    };
                    let value = Self::cell_value(term);
                    if !value.is_empty() {
                        cells.push((connector, code, value));
                    }
                }
            }
        }

        if cells.len() > MAX_CELLS {
            tracing::debug!("MathSciNet query truncated to {} fields", MAX_CELLS);
        }

        let mut request = BackendQuery::new();
        for (i, (_, code, value)) in cells.iter().take(MAX_CELLS).enumerate() {
            // each cell carries the connective joining it to the next one
            let connector = cells
                .get(i + 1)
                .map(|(c, _, _)| *c)
                .unwrap_or(Connector::And);
            let cell = i + 1;
            request.push(format!("pg{}", cell), *code);
            request.push(format!("co{}", cell), connector.as_str());
            request.push(format!("s{}", cell), value.as_str());
        }
        if let Some(spec) = date {
            request.extend(date_params(&spec));
        }

        Ok(request)
    }

    fn search_url(&self, query: &BackendQuery) -> String {
        format!("{}?fmt=bibtex&extend=1&{}", self.base_url, query.encode())
    }

    fn pagination(&self) -> Option<Pagination> {
        Some(Pagination {
            page_size: PAGE_SIZE,
            offset_param: "r",
            offset_correction: 1,
        })
    }

    fn parse_results(&self, body: &[u8]) -> Result<ResultPage, SourceError> {
        let html = String::from_utf8_lossy(body);

        let Some(doc) = regex!(r#"(?s)"doc">(.*)<div id="foot"#)
            .captures(&html)
            .and_then(|c| c.get(1))
        else {
            tracing::debug!("MathSciNet page has no result section - returning empty results");
            return Ok(ResultPage::default());
        };

        let data = doc.as_str().split("<pre>").skip(1).collect::<String>();
        let data = regex!(r"</?(div|pre)>").replace_all(&data, "");
        let data = unescape_html(&fix_mrnumber(&data));

        Ok(ResultPage::new(parse_entries(&data)))
    }

    fn website_url(&self, query: &BackendQuery) -> Option<String> {
        Some(format!("{}?fmt=hl&extend=1&{}", self.base_url, query.encode()))
    }

    fn clean_website(&self, html: &str) -> String {
        let data = regex!(r#"(?s)^.*?<div class="headlineText">"#).replace(html, "");
        let data = regex!(r"(?s)</form>.*").replace(&data, "");
        let data = regex!(r#"(?s)<div class="sfx.*?</noscript>.*?</div>"#).replace_all(&data, "");
        let data = regex!(r#"(?s)<div class="headlineMenu.*?</div>"#).replace_all(&data, "");
        let data = regex!(r#"(?s)<div class="headline_dates.*?<div class="headlineText">"#)
            .replace_all(&data, "</p><p>");
        let data = regex!(r"(?s)<div.*").replace(&data, "");
        let data = regex!(r#"(?s)<a class="item_status.*?</a>"#).replace_all(&data, "&nbsp;");
        let data = regex!(r"(?s)\(Reviewer:.*?(<a\s)").replace_all(&data, "$1");
        let data = regex!(r"(?s)<a href=[^<]*?mscdoc[^/]*?</a>").replace_all(&data, "");
        let data = regex!(r#"(?s)(class|title)="[^"]*""#).replace_all(&data, "");
        let data = data.replace("href=\"/math", "href=\"https://mathscinet.ams.org/math");
        format!("<p>{}</p>", data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::classify;

    fn params(request: &BackendQuery) -> Vec<(&str, &str)> {
        request
            .params()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_mr_number_query() {
        let source = MathSciNetSource::new();
        let request = source.prepare(&classify("MR1234567")).unwrap();
        assert_eq!(
            params(&request),
            vec![("pg1", "MR"), ("co1", "AND"), ("s1", "1234567")]
        );
    }

    #[test]
    fn test_field_query_cells() {
        let source = MathSciNetSource::new();
        let request = source
            .prepare(&classify("au: Smith or au: Jones ti: groups rings date: 2001-2005"))
            .unwrap();
        assert_eq!(
            params(&request),
            vec![
                ("pg1", "AUCN"),
                ("co1", "OR"),
                ("s1", "Smith"),
                ("pg2", "AUCN"),
                ("co2", "AND"),
                ("s2", "Jones"),
                ("pg3", "TI"),
                ("co3", "AND"),
                ("s3", "groups and rings"),
                ("dr", "pubyear"),
                ("yearRangeFirst", "2001"),
                ("yearRangeSecond", "2005"),
            ]
        );
    }

    #[test]
    fn test_date_inequality_and_type() {
        let source = MathSciNetSource::new();
        let request = source
            .prepare(&classify("ti: groups date: >1999 type: book"))
            .unwrap();
        assert_eq!(request.get("yrop"), Some("gt"));
        assert_eq!(request.get("arg3"), Some("1999"));
        assert_eq!(request.get("pg2"), Some("ET"));
        assert_eq!(request.get("s2"), Some("Books"));
    }

    #[test]
    fn test_connector_skips_dates_and_dropped_fields() {
        let source = MathSciNetSource::new();
        let request = source
            .prepare(&classify("au: Smith date: 2001 or ti: groups"))
            .unwrap();
        assert_eq!(request.get("pg1"), Some("AUCN"));
        assert_eq!(request.get("co1"), Some("OR"));
        assert_eq!(request.get("pg2"), Some("TI"));
        assert_eq!(request.get("co2"), Some("AND"));
        assert_eq!(request.get("pg3"), None);

        let request = source
            .prepare(&classify("au: Smith xx: foo or ti: groups"))
            .unwrap();
        assert_eq!(request.get("co1"), Some("OR"));
        assert_eq!(request.get("pg2"), Some("TI"));
    }

    #[test]
    fn test_cell_limit() {
        let source = MathSciNetSource::new();
        let text = (0..12)
            .map(|i| format!("ti: word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let request = source.prepare(&classify(&text)).unwrap();
        assert!(request.get("pg10").is_some());
        assert!(request.get("pg11").is_none());
    }

    #[test]
    fn test_unknown_codes_dropped() {
        assert_eq!(field_code(&Field::Other("cc".to_string())), Some("CC"));
        assert_eq!(field_code(&Field::Other("icn".to_string())), Some("ICN"));
        assert_eq!(field_code(&Field::Other("xx".to_string())), None);
        assert_eq!(field_code(&Field::Doi), None);
    }

    #[test]
    fn test_search_url() {
        let source = MathSciNetSource::with_base_url("http://localhost/msn");
        let url = source.search_url(&BackendQuery::new().with("pg1", "TI").with("s1", "a b"));
        assert_eq!(url, "http://localhost/msn?fmt=bibtex&extend=1&pg1=TI&s1=a+b");
    }

    #[test]
    fn test_parse_results() {
        let html = r#"<html><div id="doc"><div id="content">
<div class="headline"><pre>
@article {MR1234567,
    AUTHOR = {Smith, J.},
     TITLE = {On groups &amp; rings},
   JOURNAL = {Ann. of Math.},
      YEAR = {2001},
  MRNUMBER = {1234567 (2002a:20001)},
}
</pre></div><div class="headline"><pre>
@book {MR7654321,
    AUTHOR = {Doe, A.},
     TITLE = {Rings},
      YEAR = {1999},
  MRNUMBER = {7654321},
}
</pre></div>
</div><div id="foot">footer</div></html>"#;
        let page = MathSciNetSource::new()
            .parse_results(html.as_bytes())
            .unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].field("mrnumber"), Some("1234567"));
        assert_eq!(page.records[0].field("title"), Some("On groups & rings"));
        assert_eq!(page.records[1].key, "MR7654321");
    }

    #[test]
    fn test_parse_results_without_doc_section() {
        let page = MathSciNetSource::new()
            .parse_results(b"<html>No results</html>")
            .unwrap();
        assert!(page.records.is_empty());
    }
}
