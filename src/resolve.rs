//! Resolving a query to a final answer.
//!
//! A [`Resolve`] implementation is the unit of work the batch harness runs. The
//! simplest one asks a single source. The [`Arbitrator`] asks several sources in
//! turn, stops as soon as one gives a trustworthy answer, and otherwise merges
//! everything found into one non-unique answer.

use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{CanonicalQuery, FetchOutcome};
use crate::normalize::merge;
use crate::sources::{fetch, Source, SourceRegistry};
use crate::utils::HttpFetch;

/// Something that turns a query into a final outcome. Failures are folded into
/// the outcome, never returned.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Name reported with progress events
    fn name(&self) -> &str;

    async fn resolve(&self, query: &CanonicalQuery, max_count: usize) -> FetchOutcome;
}

/// Resolve against one source only
#[derive(Debug, Clone)]
pub struct SingleSource {
    source: Arc<dyn Source>,
    http: Arc<dyn HttpFetch>,
}

impl SingleSource {
    pub fn new(source: Arc<dyn Source>, http: Arc<dyn HttpFetch>) -> Self {
        Self { source, http }
    }
}

#[async_trait]
impl Resolve for SingleSource {
    fn name(&self) -> &str {
        self.source.name()
    }

    async fn resolve(&self, query: &CanonicalQuery, max_count: usize) -> FetchOutcome {
        match fetch(self.source.as_ref(), self.http.as_ref(), query, max_count).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("{} search failed: {}", self.source.name(), e);
                FetchOutcome::failed(self.source.name(), e.to_string())
                    .with_bibitem(query.bibitem.clone())
            }
        }
    }
}

/// When an arbitration stage ends the search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRule {
    /// Any record at all is the answer
    AnyRecord,
    /// A unique result is the answer, whatever earlier stages found
    Unique,
    /// A unique result is the answer only if no earlier stage found anything
    UniqueAlone,
}

/// One source in the arbitration order
#[derive(Debug, Clone)]
pub struct Stage {
    pub source: Arc<dyn Source>,
    pub stop: StopRule,
}

/// Tries sources in order and decides between them.
///
/// Results that do not end the search are collected; if no stage ends it, the
/// collected records are merged into one non-unique outcome.
#[derive(Debug, Clone)]
pub struct Arbitrator {
    stages: Vec<Stage>,
    http: Arc<dyn HttpFetch>,
}

impl Arbitrator {
    /// An arbitrator with no stages yet
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self {
            stages: Vec::new(),
            http,
        }
    }

    /// Append a stage
    pub fn with_stage(mut self, source: Arc<dyn Source>, stop: StopRule) -> Self {
        self.stages.push(Stage { source, stop });
        self
    }

    /// Stages for sources in the given order: exact lookups stop on any record,
    /// the last source stops only when alone, every other source stops when unique.
    pub fn from_sources(sources: Vec<Arc<dyn Source>>, http: Arc<dyn HttpFetch>) -> Self {
        let last = sources.len().saturating_sub(1);
        let stages = sources
            .into_iter()
            .enumerate()
            .map(|(i, source)| {
                let stop = if source.is_exact_lookup() {
                    StopRule::AnyRecord
                } else if i == last {
                    StopRule::UniqueAlone
                } else {
                    StopRule::Unique
                };
                Stage { source, stop }
            })
            .collect();
        Self { stages, http }
    }

    /// Every registered source in arbitration order: MRef, zbMATH, MathSciNet, arXiv
    pub fn from_registry(registry: &SourceRegistry, http: Arc<dyn HttpFetch>) -> Self {
        Self::from_sources(registry.in_priority_order(), http)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[async_trait]
impl Resolve for Arbitrator {
    fn name(&self) -> &str {
        "all sources"
    }

    async fn resolve(&self, query: &CanonicalQuery, max_count: usize) -> FetchOutcome {
        let mut collected: Vec<FetchOutcome> = Vec::new();

        for stage in &self.stages {
            let source = stage.source.as_ref();
            let outcome = match fetch(source, self.http.as_ref(), query, max_count).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!("{} search failed, continuing: {}", source.name(), e);
                    continue;
                }
            };

            if outcome.is_empty() {
                tracing::debug!("{} found nothing", source.name());
                continue;
            }

            let stop = match stage.stop {
                StopRule::AnyRecord => true,
                StopRule::Unique => outcome.is_unique,
                StopRule::UniqueAlone => outcome.is_unique && collected.is_empty(),
            };
            if stop {
                tracing::debug!("{} answered with {} record(s)", source.name(), outcome.count);
                return match stage.stop {
                    StopRule::AnyRecord => outcome.unique(),
                    _ => outcome,
                };
            }

            collected.push(outcome);
        }

        if collected.is_empty() {
            return FetchOutcome::empty(self.name()).with_bibitem(query.bibitem.clone());
        }

        let backend = collected
            .iter()
            .map(|o| o.backend.as_str())
            .collect::<Vec<_>>()
            .join("+");
        let records = merge(collected.into_iter().flat_map(|o| o.records).collect());
        let total = records.len();

        FetchOutcome::from_records(backend, records, total)
            .non_unique()
            .with_bibitem(query.bibitem.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::classify;
    use crate::sources::mock::{make_record, MockHttp, MockSource};

    fn http() -> Arc<dyn HttpFetch> {
        Arc::new(MockHttp::new())
    }

    fn sources(mocks: &[&Arc<MockSource>]) -> Vec<Arc<dyn Source>> {
        mocks.iter().map(|m| Arc::clone(m) as Arc<dyn Source>).collect()
    }

    #[tokio::test]
    async fn test_exact_lookup_wins() {
        let a = Arc::new(MockSource::new("a").exact().with_records(vec![make_record("1", "A", "Smith, J.")]));
        let b = Arc::new(MockSource::new("b").with_records(vec![make_record("2", "B", "Doe, A.")]));
        let arbitrator = Arbitrator::from_sources(sources(&[&a, &b]), http());

        let outcome = arbitrator.resolve(&classify("anything at all"), 10).await;
        assert!(outcome.is_unique);
        assert_eq!(outcome.backend, "a");
        assert_eq!(a.call_count(), 1);
        assert_eq!(b.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unique_second_stage_stops_search() {
        let a = Arc::new(MockSource::new("a").exact());
        let b = Arc::new(MockSource::new("b").with_records(vec![make_record("2", "B", "Doe, A.")]));
        let c = Arc::new(MockSource::new("c").with_records(vec![make_record("3", "C", "Roe, R.")]));
        let arbitrator = Arbitrator::from_sources(sources(&[&a, &b, &c]), http());

        let outcome = arbitrator.resolve(&classify("x"), 10).await;
        assert!(outcome.is_unique);
        assert_eq!(outcome.records[0].id, "MR2");
        assert_eq!((a.call_count(), b.call_count(), c.call_count()), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_non_unique_results_are_merged() {
        let a = Arc::new(MockSource::new("a").exact());
        let b = Arc::new(MockSource::new("b").with_records(vec![
            make_record("2", "Groups", "Doe, A."),
            make_record("3", "Rings", "Roe, R."),
        ]));
        let c = Arc::new(MockSource::new("c").with_records(vec![make_record("4", "Fields", "Poe, E.")]));
        let arbitrator = Arbitrator::from_sources(sources(&[&a, &b, &c]), http());

        let outcome = arbitrator.resolve(&classify("x"), 10).await;
        assert!(!outcome.is_unique);
        assert_eq!(outcome.count, 3);
        assert_eq!(outcome.backend, "b+c");
        let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["MR2", "MR3", "MR4"]);
        assert_eq!(c.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unique_stage_returns_over_collected_results() {
        let b = Arc::new(MockSource::new("b").with_records(vec![
            make_record("2", "Groups", "Doe, A."),
            make_record("3", "Rings", "Roe, R."),
        ]));
        let c = Arc::new(MockSource::new("c").with_records(vec![make_record("4", "Fields", "Poe, E.")]));
        let d = Arc::new(MockSource::new("d"));
        let arbitrator = Arbitrator::new(http())
            .with_stage(b, StopRule::Unique)
            .with_stage(c, StopRule::Unique)
            .with_stage(d.clone(), StopRule::UniqueAlone);

        let outcome = arbitrator.resolve(&classify("x"), 10).await;
        assert!(outcome.is_unique);
        assert_eq!(outcome.backend, "c");
        assert_eq!(d.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failures_count_as_nothing_found() {
        let a = Arc::new(MockSource::new("a").exact().failing());
        let b = Arc::new(MockSource::new("b").failing());
        let arbitrator = Arbitrator::from_sources(sources(&[&a, &b]), http());

        let outcome = arbitrator.resolve(&classify("x"), 10).await;
        assert!(outcome.is_empty());
        assert!(!outcome.is_unique);
        assert_eq!(outcome.count, 0);
    }

    #[tokio::test]
    async fn test_single_source_folds_errors() {
        let resolver = SingleSource::new(Arc::new(MockSource::new("down").failing()), http());
        let outcome = resolver.resolve(&classify("x"), 10).await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.count, 0);
        assert_eq!(resolver.name(), "down");
    }

    #[test]
    fn test_default_stop_rules() {
        let arbitrator = Arbitrator::from_registry(&SourceRegistry::new(), http());
        let rules: Vec<(&str, StopRule)> = arbitrator
            .stages()
            .iter()
            .map(|s| (s.source.id(), s.stop))
            .collect();
        assert_eq!(
            rules,
            vec![
                ("mref", StopRule::AnyRecord),
                ("zbmath", StopRule::Unique),
                ("mathscinet", StopRule::Unique),
                ("arxiv", StopRule::UniqueAlone),
            ]
        );
    }
}
