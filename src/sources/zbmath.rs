//! zbMATH source implementation.
//!
//! The search page only lists matches; each match links to its own `.bib` file,
//! which is fetched separately. Queries use zbMATH's `& | !` connectives.

use async_trait::async_trait;

use super::mref::MRefSource;
use crate::models::{CanonicalQuery, Field, QueryExpr, RawRecord, Term};
use crate::query::structured;
use crate::sources::dialect::{
    close_parentheses, format_author, format_value, DateSpec, ZBMATH_STYLE,
};
use crate::sources::{BackendQuery, ResultPage, Source, SourceError};
use crate::utils::bibtex::parse_entries;
use crate::utils::HttpFetch;

const ZBMATH_URL: &str = "https://zbmath.org/";

/// Field codes zbMATH understands when typed directly
const KNOWN_CODES: &[&str] = &["ti", "au", "pu", "cc", "so", "la", "any", "dt", "an"];

/// zbMATH search
#[derive(Debug, Clone)]
pub struct ZbMathSource {
    base_url: String,
    bib_url: String,

    /// Look every zbMATH record up in MRef as well
    other_ids: Option<MRefSource>,
}

impl ZbMathSource {
    pub fn new() -> Self {
        Self::with_base_urls(ZBMATH_URL, ZBMATH_URL)
    }

    /// Search page and `.bib` files served from other locations
    pub fn with_base_urls(base_url: impl Into<String>, bib_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bib_url: bib_url.into(),
            other_ids: None,
        }
    }

    /// Replace each record with its MathSciNet counterpart when MRef finds one
    pub fn with_other_ids(mut self, mref: MRefSource) -> Self {
        self.other_ids = Some(mref);
        self
    }

    fn clause(term: &Term) -> Option<String> {
        let code = match &term.field {
            Field::Title => "ti",
            Field::Author => "au",
            Field::Msc => "cc",
            Field::Journal => "so",
            Field::Any | Field::None => "any",
            Field::Type => "dt",
            Field::Zbl => "an",
            Field::Date => return DateSpec::parse(&term.value).map(|spec| date_clause(&spec)),
            Field::Other(code) => {
                let code = code.to_lowercase();
                KNOWN_CODES.iter().copied().find(|known| *known == code)?
            }
            _ => return None,
        };

        let value = match term.field {
            Field::Author => format_author(&term.value, &ZBMATH_STYLE),
            Field::Type => term.value.clone(),
            Field::Zbl => term.ids().join("|"),
            _ => format_value(&close_parentheses(&term.value), &ZBMATH_STYLE),
        };
        if value.is_empty() {
            return None;
        }
        Some(format!("{}: {}", code, value))
    }

    fn render(expr: &QueryExpr) -> Option<String> {
        let join = |items: &[QueryExpr], sep: &str| {
            let parts: Vec<String> = items.iter().filter_map(Self::render).collect();
            (!parts.is_empty()).then(|| parts.join(sep))
        };

        match expr {
            QueryExpr::Field(term) => Self::clause(term),
            QueryExpr::And(items) => join(items, " & "),
            QueryExpr::Or(items) => join(items, " | "),
            QueryExpr::Not(inner) => Self::render(inner).map(|s| format!("!{}", s)),
            QueryExpr::Group(inner) => Self::render(inner).map(|s| format!("({})", s)),
        }
    }

    /// MathSciNet record for a zbMATH entry, if MRef recognizes it
    async fn find_other_ids(&self, http: &dyn HttpFetch, mref: &MRefSource, bibtex: &str) -> Option<RawRecord> {
        let request = MRefSource::reference_query(bibtex);
        if request.is_empty() {
            return None;
        }

        match mref.fetch_page(http, &mref.search_url(&request)).await {
            Ok(page) => page.records.into_iter().next(),
            Err(e) => {
                tracing::warn!("MRef lookup for zbMATH record failed: {}", e);
                None
            }
        }
    }
}

impl Default for ZbMathSource {
    fn default() -> Self {
        Self::new()
    }
}

fn date_clause(spec: &DateSpec) -> String {
    match spec {
        DateSpec::Range(first, last) => format!("py: {}-{}", first, last),
        DateSpec::After(year) => format!("py: {}-3000", year + 1),
        DateSpec::Before(year) => format!("py: 1000-{}", year.saturating_sub(1)),
        DateSpec::Years(years) => format!(
            "py: {}",
            years.iter().map(u32::to_string).collect::<Vec<_>>().join("|")
        ),
    }
}

/// Give a zbMATH entry its `Zbl` key and put authors in `Last, First` form
fn customize(mut record: RawRecord) -> RawRecord {
    let zbl = match record.field("zbl") {
        Some(zbl) => zbl.trim().to_string(),
        None => {
            let zbl = record.key.replace("zbMATH", "");
            record.set_field("zbl", zbl.clone());
            zbl
        }
    };
    record.key = format!("Zbl{}", zbl);

    if let Some(author) = record.field("author") {
        let fixed = author
            .split(" and ")
            .map(last_name_first)
            .collect::<Vec<_>>()
            .join(" and ");
        record.set_field("author", fixed);
    }

    record
}

/// `First {Last}` becomes `Last, First`; names without a braced part are left alone
fn last_name_first(name: &str) -> String {
    let name = name.trim();
    let Some(caps) = regex!(r"(?s)^(.*?)\{(.*)\}$").captures(name) else {
        return name.to_string();
    };

    let last = caps[2].trim();
    let first = regex!(r"\.(\w\.)").replace_all(caps[1].trim(), ". $1");
    if first.is_empty() {
        last.to_string()
    } else {
        format!("{}, {}", last, first)
    }
}

#[async_trait]
impl Source for ZbMathSource {
    fn id(&self) -> &str {
        "zbmath"
    }

    fn name(&self) -> &str {
        "zbMATH"
    }

    fn identifier_query(&self, query: &CanonicalQuery) -> Option<BackendQuery> {
        let term = query.identifier(&Field::Zbl)?;
        Some(BackendQuery::new().with("q", format!("an: {}", term.ids().join("|"))))
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
        format!("{}?{}", self.base_url, query.encode())
    }

    /// Parse one `.bib` file
    fn parse_results(&self, body: &[u8]) -> Result<ResultPage, SourceError> {
        let text = String::from_utf8_lossy(body);
        Ok(ResultPage::new(
            parse_entries(&text).into_iter().map(customize).collect(),
        ))
    }

    async fn fetch_page(&self, http: &dyn HttpFetch, url: &str) -> Result<ResultPage, SourceError> {
        let body = http.get(url).await?;
        let html = String::from_utf8_lossy(&body);

        let mut links: Vec<&str> = Vec::new();
        for m in regex!(r#"(?i)bibtex/[^"'\s>]*?\d{3,}\.bib"#).find_iter(&html) {
            if !links.contains(&m.as_str()) {
                links.push(m.as_str());
            }
        }
        tracing::debug!("zbMATH listed {} BibTeX links", links.len());

        let mut records = Vec::new();
        for link in links {
            let bib_url = format!("{}/{}", self.bib_url.trim_end_matches('/'), link);
            let bib = match http.get(&bib_url).await {
                Ok(bib) => bib,
                Err(e) => {
                    tracing::warn!("Failed to fetch zbMATH record {}: {}", link, e);
                    continue;
                }
            };

            let page = self.parse_results(&bib)?;
            let Some(zbl) = page.records.into_iter().next() else {
                continue;
            };

            let record = match &self.other_ids {
                Some(mref) => {
                    let text = String::from_utf8_lossy(&bib);
                    match self.find_other_ids(http, mref, &text).await {
                        Some(mut msn) => {
                            if let Some(id) = zbl.field("zbl") {
                                msn.set_field("zbl", id);
                            }
                            if msn.field("doi").is_none() {
                                if let Some(doi) = zbl.field("doi") {
                                    msn.set_field("doi", doi);
                                }
                            }
                            msn
                        }
                        None => zbl,
                    }
                }
                None => zbl,
            };
            records.push(record);
        }

        Ok(ResultPage::new(records))
    }
}
