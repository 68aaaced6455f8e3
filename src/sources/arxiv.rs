//! arXiv source implementation.
//!
//! Searches through the UC Davis front end, whose query language takes
//! `field: (words)` clauses joined by `and`/`or`/`not`, and a bracketed list of
//! words for "any of". Results are scraped from the HTML listing.

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::models::{CanonicalQuery, Field, QueryExpr, RawRecord, Term};
use crate::query::structured;
use crate::sources::dialect::{close_parentheses, format_value, DateSpec, ARXIV_STYLE};
use crate::sources::{BackendQuery, ResultPage, Source, SourceCapabilities, SourceError};

const FRONT_URL: &str = "https://front.math.ucdavis.edu/search";
const FRONT_HOME: &str = "https://front.math.ucdavis.edu/";

/// Results requested per search
const RESULT_COUNT: usize = 200;

/// Years listed for an open-ended date restriction
const YEAR_SPAN: u32 = 20;

/// Field codes the front end understands when typed directly
const KNOWN_CODES: &[&str] = &["ti", "au", "ab", "soc", "jr", "doi", "cat", "co"];

/// arXiv search through the UC Davis front end
#[derive(Debug, Clone)]
pub struct ArxivSource {
    base_url: String,
}

impl ArxivSource {
    pub fn new() -> Self {
        Self::with_base_url(FRONT_URL)
    }

    /// Point the source at another server, e.g. a test double
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn clause(term: &Term) -> Option<String> {
        let code = match &term.field {
            Field::Title => "ti",
            Field::Author => "au",
            Field::Msc => "soc",
            Field::Journal => "jr",
            Field::Doi => "doi",
            Field::Any | Field::None => "",
            Field::Date => return DateSpec::parse(&term.value).and_then(|spec| date_clause(&spec)),
            Field::Other(code) => match code.to_lowercase().as_str() {
                "abs" => "ab",
                code => KNOWN_CODES.iter().copied().find(|known| *known == code)?,
            },
            _ => return None,
        };

        let value = match term.field {
            // "Smith, J" is written "Smith-J"
            Field::Author => regex!(r"\b(\w+)\s*,\s*(\w)\b\*?")
                .replace_all(&term.value, "$1-$2")
                .into_owned(),
            _ => term.value.clone(),
        };
        let value = format_value(&close_parentheses(&value), &ARXIV_STYLE);
        if value.is_empty() {
            return None;
        }

        Some(if code.is_empty() {
            format!("({})", value)
        } else {
            format!("{}: ({})", code, value)
        })
    }

    fn render(expr: &QueryExpr) -> Option<String> {
        let join = |items: &[QueryExpr], sep: &str| {
            let parts: Vec<String> = items.iter().filter_map(Self::render).collect();
            (!parts.is_empty()).then(|| parts.join(sep))
        };

        match expr {
            QueryExpr::Field(term) => Self::clause(term),
            QueryExpr::And(items) => join(items, " and "),
            QueryExpr::Or(items) => join(items, " or "),
            QueryExpr::Not(inner) => Self::render(inner).map(|s| format!("not {}", s)),
            QueryExpr::Group(inner) => Self::render(inner).map(|s| format!("({})", s)),
        }
    }
}

impl Default for ArxivSource {
    fn default() -> Self {
        Self::new()
    }
}

/// The front end has no year ranges, so every year is listed. Ranges keep
/// their last `YEAR_SPAN + 1` years.
fn date_clause(spec: &DateSpec) -> Option<String> {
    let years: Vec<u32> = match spec {
        DateSpec::Range(first, last) => {
            let (first, last) = if first <= last {
                (*first, *last)
            } else {
                (*last, *first)
            };
            (first.max(last.saturating_sub(YEAR_SPAN))..=last).collect()
        }
        DateSpec::After(year) => (year + 1..=year + YEAR_SPAN).collect(),
        DateSpec::Before(year) => (year.saturating_sub(YEAR_SPAN)..*year).collect(),
        DateSpec::Years(years) => years.clone(),
    };
    (!years.is_empty()).then(|| {
        format!(
            "date: [{}]",
            years.iter().map(u32::to_string).collect::<Vec<_>>().join(" ")
        )
    })
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("selector {}: {:?}", css, e)))
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::WEBSITE
    }

    fn identifier_query(&self, query: &CanonicalQuery) -> Option<BackendQuery> {
        let term = query.identifier(&Field::Arxiv)?;
        Some(BackendQuery::new().with("q", format!("id: ([{}])", term.ids().join(" "))))
    }

    fn format_query(&self, query: &CanonicalQuery) -> Result<BackendQuery, SourceError> {
        let query = structured(query);
        let Some(q) = query.to_expr().as_ref().and_then(Self::render) else {
            return Ok(BackendQuery::new());
        };

        let q = regex!(r"\s+").replace_all(&q, " ");
        Ok(BackendQuery::new().with("q", q.trim()))
    }

    fn search_url(&self, query: &BackendQuery) -> String {
        format!("{}?n={}&{}", self.base_url, RESULT_COUNT, query.encode())
    }

    fn parse_results(&self, body: &[u8]) -> Result<ResultPage, SourceError> {
        let html = String::from_utf8_lossy(body);
        if html.contains("<title>Front: Not found</title>") {
            return Ok(ResultPage::default());
        }

        let document = Html::parse_document(&html);
        let listing = selector("table.listing")?;
        let link = selector("a[href]")?;
        let bold = selector("b")?;
        let author = selector("a[href*=\"author\"]")?;
        let fromto = selector("p.fromto")?;

        let mut records = Vec::new();
        for table in document.select(&listing) {
            let Some(id) = table
                .select(&link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| href.trim_matches('/').to_string())
            else {
                continue;
            };

            let title = table
                .select(&bold)
                .next()
                .map(|b| b.text().collect::<String>())
                .unwrap_or_default();
            let title = title.trim().trim_end_matches('.').trim();

            let authors: Vec<String> = table
                .select(&author)
                .map(|a| {
                    let name = a.text().collect::<String>();
                    let name = regex!(r"\(\w+\)").replace_all(&name, "");
                    name.split_whitespace().collect::<Vec<_>>().join(" ")
                })
                .filter(|name| !name.is_empty())
                .collect();

            records.push(
                RawRecord::new("unpublished", id.as_str())
                    .with_field("author", authors.join(" and "))
                    .with_field("title", title)
                    .with_field("arxiv", id.as_str()),
            );
        }

        let total = document
            .select(&fromto)
            .next()
            .map(|p| p.text().collect::<String>())
            .and_then(|text| {
                regex!(r"of\s+(\d+)")
                    .captures(&text)
                    .and_then(|c| c[1].parse().ok())
            });

        tracing::debug!("arXiv listing has {} records (total {:?})", records.len(), total);
        Ok(ResultPage::new(records).with_total(total))
    }

    fn website_url(&self, query: &BackendQuery) -> Option<String> {
        Some(self.search_url(query))
    }

    fn clean_website(&self, html: &str) -> String {
        let data = match html.find("<table class=\"listing") {
            Some(start) => &html[start..],
            None => html,
        };
        let data = regex!(r#"(?s)<p class="fromto.*$"#).replace(data, "");
        let data = regex!(r#"(?s)<table class="listing.*?<td class="text">"#).replace_all(&data, "<p>");
        let data = regex!(r"(?s)</td.*?</table>").replace_all(&data, "</p>");
        let data = regex!(r#"(?s)\(?<a href="/(math|phys).*?</p>"#).replace_all(&data, "</p>");
        // author list before the title
        let data = regex!(r"(?s)(<b>.*?</b>)(.*?)</p>").replace_all(&data, "$2$1</p>");
        data.replace("href=\"/", &format!("href=\"{}", FRONT_HOME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::classify;
    use std::ops::RangeInclusive;

    fn years(range: RangeInclusive<u32>) -> Option<String> {
        Some(format!(
            "date: [{}]",
            range.map(|y| y.to_string()).collect::<Vec<_>>().join(" ")
        ))
    }

    const LISTING: &str = r#"<html><head><title>Front: search results</title></head><body>
<table class="listing"><tr><td class="item"><a href="/math.AG/0101001">math.AG/0101001</a></td>
<td class="text"><b>On moduli of curves &amp; surfaces.</b>
<a href="/author/Smith-J">John Smith</a>, <a href="/author/Doe-A">Anna Doe (MIT)</a></td></tr></table>
<table class="listing"><tr><td class="item"><a href="/1234.5678">1234.5678</a></td>
<td class="text"><b>Rings</b> <a href="/author/Roe-R">R. Roe</a></td></tr></table>
<p class="fromto">Showing 1-2 of 37</p>
</body></html>"#;

    #[test]
    fn test_identifier_query() {
        let source = ArxivSource::new();
        let request = source
            .prepare(&classify("arXiv:1234.5678 and arxiv: 2345.67890v2"))
            .unwrap();
        assert_eq!(request.get("q"), Some("id: ([1234.5678 2345.67890v2])"));
    }

    #[test]
    fn test_field_query() {
        let source = ArxivSource::new();
        let request = source
            .prepare(&classify("au: Smith, J ti: groups rings"))
            .unwrap();
        assert_eq!(
            request.get("q"),
            Some("au: (Smith-J) and ti: (groups and rings)")
        );
    }

    #[test]
    fn test_date_enumeration() {
        assert_eq!(
            date_clause(&DateSpec::Range(2001, 2005)),
            Some("date: [2001 2002 2003 2004 2005]".to_string())
        );
        assert_eq!(date_clause(&DateSpec::After(2000)), years(2001..=2020));
        assert_eq!(date_clause(&DateSpec::Before(2000)), years(1980..=1999));
    }

    #[test]
    fn test_date_ranges_are_bounded() {
        assert_eq!(date_clause(&DateSpec::Range(1000, 3000)), years(2980..=3000));
        assert_eq!(date_clause(&DateSpec::Range(2005, 2001)), years(2001..=2005));
        assert_eq!(date_clause(&DateSpec::Before(0)), None);

        let term = Term::new(Field::Date, "2005-2001");
        assert_eq!(
            ArxivSource::clause(&term),
            Some("date: [2001 2002 2003 2004 2005]".to_string())
        );
    }

    #[test]
    fn test_parse_listing() {
        let page = ArxivSource::new().parse_results(LISTING.as_bytes()).unwrap();
        assert_eq!(page.total, Some(37));
        assert_eq!(page.records.len(), 2);

        let first = &page.records[0];
        assert_eq!(first.entry_type, "unpublished");
        assert_eq!(first.field("arxiv"), Some("math.AG/0101001"));
        assert_eq!(first.field("title"), Some("On moduli of curves & surfaces"));
        assert_eq!(first.field("author"), Some("John Smith and Anna Doe"));

        assert_eq!(page.records[1].key, "1234.5678");
        assert_eq!(page.records[1].field("title"), Some("Rings"));
    }

    #[test]
    fn test_not_found_sentinel() {
        let html = "<html><head><title>Front: Not found</title></head></html>";
        let page = ArxivSource::new().parse_results(html.as_bytes()).unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.total, None);
    }

    #[test]
    fn test_search_url() {
        let source = ArxivSource::with_base_url("http://localhost/search");
        let url = source.search_url(&BackendQuery::new().with("q", "ti: (x)"));
        assert_eq!(url, "http://localhost/search?n=200&q=ti%3A+%28x%29");
    }
}
