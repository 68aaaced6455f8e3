//! Running a query against one source.
//!
//! [`fetch`] is the only place that talks to the network on behalf of a source:
//! it formats the query, walks through result pages, normalizes what came back
//! and decides whether the answer is unique.

use crate::models::{CanonicalQuery, FetchOutcome};
use crate::normalize::normalize;
use crate::sources::{Source, SourceError};
use crate::utils::HttpFetch;

/// Most requests made for one query
pub const MAX_REQUESTS: usize = 20;

/// Look `query` up in `source`, returning at most `max_count` records.
///
/// The outcome is unique only when exactly one record exists, so a single record
/// cut from a longer result list is not unique. An error on the first request
/// is returned; an error on a later page ends paging with what was found so far.
pub async fn fetch(
    source: &dyn Source,
    http: &dyn HttpFetch,
    query: &CanonicalQuery,
    max_count: usize,
) -> Result<FetchOutcome, SourceError> {
    if query.is_empty() {
        return Ok(FetchOutcome::empty(source.name()));
    }

    let request = source.prepare(query)?;
    if request.is_empty() {
        tracing::debug!("{} has nothing to search for", source.name());
        return Ok(FetchOutcome::empty(source.name()));
    }

    let base_url = source.search_url(&request);
    let pagination = source.pagination();
    let mut raw = Vec::new();
    let mut reported_total = None;

    for attempt in 0..MAX_REQUESTS {
        let url = match pagination {
            Some(p) => format!("{}&{}={}", base_url, p.offset_param, raw.len() + p.offset_correction),
            None => base_url.clone(),
        };
        tracing::debug!("Fetching {} page {}: {}", source.name(), attempt + 1, url);

        let page = match source.fetch_page(http, &url).await {
            Ok(page) => page,
            Err(e) if attempt == 0 => return Err(e),
            Err(e) => {
                tracing::warn!("{} stopped paging after an error: {}", source.name(), e);
                break;
            }
        };

        let received = page.records.len();
        if page.total.is_some() {
            reported_total = page.total;
        }
        raw.extend(page.records);

        let Some(p) = pagination else {
            break;
        };
        if received == 0 || received < p.page_size || raw.len() >= max_count {
            break;
        }
    }

    let mut records = normalize(raw);
    let total = records.len().max(reported_total.unwrap_or(0));
    records.truncate(max_count);
    tracing::debug!("{} returned {} of {} records", source.name(), records.len(), total);

    Ok(FetchOutcome::from_records(source.name(), records, total).with_bibitem(query.bibitem.clone()))
}

/// Cleaned HTML result page for `query`, for sources with a browsable website
pub async fn fetch_website(
    source: &dyn Source,
    http: &dyn HttpFetch,
    query: &CanonicalQuery,
) -> Result<String, SourceError> {
    let request = source.prepare(query)?;
    let url = source
        .website_url(&request)
        .ok_or(SourceError::NotImplemented)?;
    tracing::debug!("Fetching {} website: {}", source.name(), url);

    let body = http.get(&url).await?;
    Ok(source.clean_website(&String::from_utf8_lossy(&body)))
}
