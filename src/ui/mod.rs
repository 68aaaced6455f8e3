//! Terminal output: colored status lines, report highlighting and batch progress.
//!
//! Color is only used when stdout is a terminal; redirected output stays plain
//! so reports and BibTeX can be piped into files.

use owo_colors::OwoColorize;
use std::io::IsTerminal;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::batch::{BatchReport, MatchStatus};
use crate::harness::ProgressEvent;

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
    Search,
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
        Status::Search => "🔍",
    }
}

/// A status line, colored when `color` is set
pub fn status_line(status: Status, msg: &str, color: bool) -> String {
    let icon = status_icon(status);
    if !color {
        return format!("{} {}", icon, msg);
    }
    match status {
        Status::Success => format!("{} {}", icon.green().bold(), msg),
        Status::Error => format!("{} {}", icon.red().bold(), msg),
        Status::Warning => format!("{} {}", icon.yellow().bold(), msg),
        Status::Info => format!("{} {}", icon.cyan().bold(), msg),
        Status::Search => format!("{} {}", icon.yellow(), msg),
    }
}

/// Print a status line to stderr, keeping stdout for results
pub fn print_status(status: Status, msg: &str) {
    eprintln!("{}", status_line(status, msg, std::io::stderr().is_terminal()));
}

/// Dim the `%` comment lines of a report so the records stand out
pub fn highlight_report(text: &str, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    text.lines()
        .map(|line| {
            if line.starts_with('%') {
                line.dimmed().to_string()
            } else if line.starts_with('@') {
                line.cyan().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One-line summary of a batch
pub fn batch_summary(report: &BatchReport) -> String {
    format!(
        "{} unique, {} ambiguous, {} not found",
        report.count(MatchStatus::Unique),
        report.count(MatchStatus::Ambiguous),
        report.count(MatchStatus::NotFound)
    )
}

fn bar_style(template: &str) -> indicatif::ProgressStyle {
    indicatif::ProgressStyle::with_template(template)
        .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
}

/// Progress bar for a batch, advanced by harness progress events
pub struct BatchProgress {
    pb: indicatif::ProgressBar,
}

impl BatchProgress {
    /// A bar over `total` queries; hidden when `visible` is false
    pub fn new(total: usize, visible: bool) -> Self {
        let pb = if visible {
            indicatif::ProgressBar::new(total as u64)
        } else {
            indicatif::ProgressBar::hidden()
        };
        pb.set_style(
            bar_style("{msg}\n{spinner:.cyan} {wide_bar:.cyan/blue} {pos}/{len}")
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
                .progress_chars("█   "),
        );
        pb.set_message("🔍 Resolving references");
        Self { pb }
    }

    /// Record one finished lookup
    pub fn record(&self, event: &ProgressEvent) {
        self.pb.set_position(event.completed as u64);
        if event.success {
            self.pb.set_message(event.to_string());
        } else {
            self.pb.set_message(event.to_string().red().to_string());
        }
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    /// Consume events until the sender side is dropped
    pub fn listen(self, mut rx: UnboundedReceiver<ProgressEvent>) -> JoinHandle<Self> {
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.record(&event);
            }
            self
        })
    }

    /// Finish with success
    pub fn finish_with_success(&self, msg: &str) {
        self.pb.set_style(bar_style("{spinner:.green} {msg}").tick_chars("✓"));
        self.pb.finish_with_message(format!("✓ {}", msg));
    }

    /// Finish with error
    pub fn finish_with_error(&self, msg: &str) {
        self.pb.set_style(bar_style("{spinner:.red} {msg}").tick_chars("✗"));
        self.pb.finish_with_message(format!("✗ {}", msg));
    }
}

/// Spinner shown while a single search runs
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    pub fn new(msg: &str, visible: bool) -> Self {
        let pb = if visible {
            indicatif::ProgressBar::new_spinner()
        } else {
            indicatif::ProgressBar::hidden()
        };
        pb.set_style(bar_style("{spinner:.cyan} {msg}"));
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
