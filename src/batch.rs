//! Batch lookups: many references at once.
//!
//! Input is split into separate queries, every query is resolved through the
//! harness, and the results are written as a report in input order: the record
//! for a unique match, every candidate for an ambiguous one, a note for no match.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::harness::{into_submission_order, FetchHarness, FetchTask, ProgressEvent};
use crate::models::FetchOutcome;
use crate::query::classify;
use crate::render::{RenderKind, RenderOptions, Renderer};
use crate::resolve::Resolve;

/// How batch input is split into queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    /// Before every `\bibitem` or `@type{`
    #[default]
    Bibitem,
    /// At blank lines
    Empty,
    /// At every line break
    #[serde(alias = "new")]
    Newline,
}

impl Separator {
    /// Splitting on bibitems means they are worth keeping
    pub fn keeps_bibitems(&self) -> bool {
        matches!(self, Separator::Bibitem)
    }

    /// Split `text` into queries. `%` comments are removed and blank pieces dropped.
    pub fn split(&self, text: &str) -> Vec<String> {
        let text = regex!(r"%[^\n]*").replace_all(text, "");

        let pieces: Vec<&str> = match self {
            Separator::Bibitem => {
                let starts: Vec<usize> = regex!(r"\\bibitem\s*[\[{]|@\w+\s*\{")
                    .find_iter(&text)
                    .map(|m| m.start())
                    .collect();
                let mut pieces = Vec::with_capacity(starts.len() + 1);
                let mut last = 0;
                for start in starts {
                    pieces.push(&text[last..start]);
                    last = start;
                }
                pieces.push(&text[last..]);
                pieces
            }
            Separator::Empty => regex!(r"\n[\s\n]+").split(&text).collect(),
            Separator::Newline => text.split('\n').collect(),
        };

        pieces
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Separator::Bibitem => "bibitem",
            Separator::Empty => "empty",
            Separator::Newline => "newline",
        })
    }
}

impl FromStr for Separator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bibitem" => Ok(Separator::Bibitem),
            "empty" => Ok(Separator::Empty),
            "new" | "newline" => Ok(Separator::Newline),
            other => Err(format!("unknown separator '{}'", other)),
        }
    }
}

/// How a query in the batch was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    NotFound,
    Ambiguous,
    Unique,
}

/// Report section for one query
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub query: String,
    pub status: MatchStatus,
    pub count: usize,
    /// Text shown to the user
    pub text: String,
    /// BibTeX contributed to the combined bibliography
    pub bibtex: String,
}

/// Result of a whole batch, in input order
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub entries: Vec<ReportEntry>,
}

impl BatchReport {
    /// Report text, sections separated by blank lines
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Combined BibTeX. Candidates for ambiguous queries are fenced with
    /// `% start nonunique` / `% end nonunique`.
    pub fn bibtex(&self) -> String {
        self.entries.iter().map(|e| e.bibtex.as_str()).collect()
    }

    pub fn count(&self, status: MatchStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }
}

/// Report section for one query and its outcome
pub fn report_entry(
    query: &str,
    outcome: &FetchOutcome,
    renderer: &dyn Renderer,
    options: &RenderOptions,
) -> ReportEntry {
    let bib_options = RenderOptions {
        bibtex_out: true,
        html: false,
        ..options.clone()
    };

    let (status, text, bibtex) = if outcome.is_empty() {
        (
            MatchStatus::NotFound,
            format!("% No match found for\n\n{}", query),
            String::new(),
        )
    } else if !outcome.is_unique {
        (
            MatchStatus::Ambiguous,
            format!(
                "% {} matches found for\n\n{}\n\n% results:\n\n{}\n\n% end",
                outcome.count,
                query,
                renderer.render(outcome, options).trim_end()
            ),
            format!(
                "% start nonunique\n\n{}% end nonunique\n\n",
                renderer.render(outcome, &bib_options)
            ),
        )
    } else {
        (
            MatchStatus::Unique,
            renderer.render(outcome, options).trim_end().to_string(),
            renderer.render(outcome, &bib_options),
        )
    };

    ReportEntry {
        query: query.to_string(),
        status,
        count: outcome.count,
        text,
        bibtex,
    }
}

/// A batch lookup ready to run
pub struct Batch {
    pub separator: Separator,
    pub max_count: usize,
    pub options: RenderOptions,
}

impl Batch {
    pub fn new(separator: Separator, max_count: usize, options: RenderOptions) -> Self {
        let options = RenderOptions {
            keep_bibitems: options.keep_bibitems || separator.keeps_bibitems(),
            kind: RenderKind::Batch,
            ..options
        };
        Self {
            separator,
            max_count,
            options,
        }
    }

    /// Split `text`, resolve every query and build the report
    pub async fn run(
        &self,
        text: &str,
        resolver: Arc<dyn Resolve>,
        harness: &FetchHarness,
        renderer: &dyn Renderer,
        progress: Option<UnboundedSender<ProgressEvent>>,
    ) -> BatchReport {
        let queries = self.separator.split(text);
        tracing::info!("Resolving {} queries on {} workers", queries.len(), harness.workers());

        let tasks = queries
            .iter()
            .enumerate()
            .map(|(i, q)| FetchTask::new(i, classify(q), self.max_count, Arc::clone(&resolver)))
            .collect();
        let results = into_submission_order(harness.run(tasks, progress).await);

        BatchReport {
            entries: results
                .iter()
                .map(|r| report_entry(&queries[r.index], &r.outcome, renderer, &self.options))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CanonicalRecord;
    use crate::render::BibtexRenderer;

    fn record(id: &str) -> CanonicalRecord {
        CanonicalRecord::new("article", id).with_field("title", "T")
    }

    #[test]
    fn test_split_on_bibitems() {
        let text = "% references\n\\bibitem{a} A. Smith, Groups.\n\n\\bibitem[X]{b} B. Doe,\nRings. % note\n@article{c, title={C}}";
        assert_eq!(
            Separator::Bibitem.split(text),
            vec![
                "\\bibitem{a} A. Smith, Groups.",
                "\\bibitem[X]{b} B. Doe,\nRings.",
                "@article{c, title={C}}",
            ]
        );
    }

    #[test]
    fn test_split_on_blank_lines_and_newlines() {
        let text = "one\ntwo\n\n  \nthree\n";
        assert_eq!(Separator::Empty.split(text), vec!["one\ntwo", "three"]);
        assert_eq!(Separator::Newline.split(text), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_separator_parsing() {
        assert_eq!("new".parse::<Separator>(), Ok(Separator::Newline));
        assert_eq!("BIBITEM".parse::<Separator>(), Ok(Separator::Bibitem));
        assert!("comma".parse::<Separator>().is_err());
        assert!(Separator::Bibitem.keeps_bibitems());
        assert!(!Separator::Empty.keeps_bibitems());
    }

    #[test]
    fn test_report_sections() {
        let options = RenderOptions::default();

        let none = report_entry("q1", &FetchOutcome::empty("all"), &BibtexRenderer, &options);
        assert_eq!(none.status, MatchStatus::NotFound);
        assert_eq!(none.text, "% No match found for\n\nq1");
        assert!(none.bibtex.is_empty());

        let two = FetchOutcome::from_records("all", vec![record("MR1"), record("MR2")], 2);
        let many = report_entry("q2", &two, &BibtexRenderer, &options);
        assert_eq!(many.status, MatchStatus::Ambiguous);
        assert!(many.text.starts_with("% 2 matches found for\n\nq2\n\n% results:\n\n@article{MR1"));
        assert!(many.text.ends_with("}\n\n% end"));
        assert!(many.bibtex.starts_with("% start nonunique\n\n@article{MR1"));
        assert!(many.bibtex.ends_with("% end nonunique\n\n"));

        let one = FetchOutcome::from_records("all", vec![record("MR3")], 1);
        let unique = report_entry("q3", &one, &BibtexRenderer, &options);
        assert_eq!(unique.status, MatchStatus::Unique);
        assert!(unique.text.starts_with("@article{MR3"));
    }

    #[test]
    fn test_batch_forces_kept_bibitems() {
        let batch = Batch::new(Separator::Bibitem, 3, RenderOptions::default());
        assert!(batch.options.keep_bibitems);
        assert_eq!(batch.options.kind, RenderKind::Batch);

        let batch = Batch::new(Separator::Newline, 3, RenderOptions::default());
        assert!(!batch.options.keep_bibitems);
    }
}
