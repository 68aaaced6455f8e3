//! Turning resolved records into output text.
//!
//! Citation styles are out of scope here: [`Renderer`] is the seam a style
//! engine plugs into, and [`BibtexRenderer`] emits the normalized BibTeX itself.

use serde::{Deserialize, Serialize};

use crate::models::FetchOutcome;
use crate::utils::latex::escape_html;

/// Which kind of lookup the output is for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderKind {
    #[default]
    Search,
    Batch,
}

/// Output options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Emit BibTeX instead of formatted citations
    pub bibtex_out: bool,

    /// Reuse the `\bibitem{...}` captured from the query
    pub keep_bibitems: bool,

    /// Let the renderer generate bibitems
    pub gen_bibitems: bool,

    #[serde(skip)]
    pub kind: RenderKind,

    /// Produce HTML instead of plain text
    pub html: bool,
}

impl RenderOptions {
    /// The bibitem to print before the records, if any.
    ///
    /// A captured bibitem is kept only when keeping is on; generation is then
    /// switched off. Without a captured bibitem nothing is kept.
    pub fn bibitem<'a>(&self, captured: Option<&'a str>) -> Option<&'a str> {
        let captured = captured.filter(|b| !b.trim().is_empty());
        let generate = if captured.is_some() && self.keep_bibitems {
            false
        } else {
            self.gen_bibitems
        };

        if !self.keep_bibitems || generate {
            None
        } else {
            captured
        }
    }
}

/// Renders the records of an outcome
pub trait Renderer: Send + Sync {
    fn render(&self, outcome: &FetchOutcome, options: &RenderOptions) -> String;
}

/// Writes the records as normalized BibTeX
#[derive(Debug, Clone, Copy, Default)]
pub struct BibtexRenderer;

impl Renderer for BibtexRenderer {
    fn render(&self, outcome: &FetchOutcome, options: &RenderOptions) -> String {
        let mut text = String::new();
        if !options.bibtex_out {
            if let Some(bibitem) = options.bibitem(outcome.bibitem.as_deref()) {
                text.push_str(bibitem.trim_end());
                text.push('\n');
            }
        }
        text.push_str(&outcome.bibtex());

        if !options.html {
            return text;
        }
        match options.kind {
            RenderKind::Search => outcome
                .records
                .iter()
                .map(|r| format!("<pre>{}</pre>", escape_html(&r.to_bibtex())))
                .collect::<Vec<_>>()
                .join("\n"),
            RenderKind::Batch => format!("<pre>{}</pre>", escape_html(&text)),
        }
    }
}
