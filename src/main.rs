use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mathcite::batch::Batch;
use mathcite::config::{default_toml, get_config, Config};
use mathcite::harness::FetchHarness;
use mathcite::query::classify;
use mathcite::render::{BibtexRenderer, RenderKind, Renderer};
use mathcite::resolve::{Arbitrator, Resolve, SingleSource};
use mathcite::sources::{fetch_website, SourceKind, SourceRegistry};
use mathcite::ui::{self, BatchProgress, Spinner, Status};
use mathcite::utils::HttpFetch;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Records requested when `--count` is not a positive number
const FALLBACK_COUNT: usize = 3;

/// mathcite - Resolve citations against MathSciNet, MRef, zbMATH and arXiv
#[derive(Parser, Debug)]
#[command(name = "mathcite")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve free-form, BibTeX and \\bibitem citations into normalized BibTeX", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where to look citations up
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SourceArg {
    #[value(name = "mref")]
    MRef,
    #[value(name = "mathscinet", alias = "msn")]
    MathSciNet,
    #[value(name = "zbmath", alias = "zbl")]
    ZbMath,
    #[value(name = "arxiv")]
    Arxiv,
    /// Every source, arbitrated
    #[value(name = "all")]
    All,
}

impl SourceArg {
    fn kind(self) -> Option<SourceKind> {
        match self {
            SourceArg::MRef => Some(SourceKind::MRef),
            SourceArg::MathSciNet => Some(SourceKind::MathSciNet),
            SourceArg::ZbMath => Some(SourceKind::ZbMath),
            SourceArg::Arxiv => Some(SourceKind::Arxiv),
            SourceArg::All => None,
        }
    }
}

/// How batch input is split
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SeparatorArg {
    Bibitem,
    Empty,
    #[value(name = "new", alias = "newline")]
    New,
}

impl From<SeparatorArg> for mathcite::batch::Separator {
    fn from(arg: SeparatorArg) -> Self {
        match arg {
            SeparatorArg::Bibitem => Self::Bibitem,
            SeparatorArg::Empty => Self::Empty,
            SeparatorArg::New => Self::Newline,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Look up a single citation
    #[command(alias = "s")]
    Search {
        /// Citation text, BibTeX, \bibitem or field query ("au: Smith ti: groups")
        query: Vec<String>,

        /// Source to search
        #[arg(long, short, value_enum, default_value_t = SourceArg::All)]
        source: SourceArg,

        /// Maximum number of records
        #[arg(long, short = 'n')]
        count: Option<i64>,

        /// Print BibTeX only, without the captured \bibitem
        #[arg(long)]
        bibtex: bool,

        /// Print the source's own result page instead of records
        #[arg(long)]
        website: bool,
    },

    /// Look up many citations from a file or stdin
    #[command(alias = "b")]
    Batch {
        /// Input file; stdin when omitted
        file: Option<PathBuf>,

        /// How to split the input into references
        #[arg(long, value_enum)]
        separator: Option<SeparatorArg>,

        /// Lookups run at once
        #[arg(long, short)]
        workers: Option<usize>,

        /// Source to search
        #[arg(long, short, value_enum, default_value_t = SourceArg::All)]
        source: SourceArg,

        /// Write the combined BibTeX here as well
        #[arg(long)]
        bib_out: Option<PathBuf>,
    },

    /// Show how a query is understood, as JSON
    Classify {
        query: Vec<String>,
    },

    /// Print the default configuration file
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("mathcite={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = get_config(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Search {
            query,
            source,
            count,
            bibtex,
            website,
        } => {
            let text = query_text(query)?;
            let count = match count {
                Some(n) if n > 0 => n as usize,
                Some(_) => FALLBACK_COUNT,
                None => config.search.search_count,
            };
            search(&config, &text, source, count, bibtex, website, cli.quiet).await
        }

        Commands::Batch {
            file,
            separator,
            workers,
            source,
            bib_out,
        } => {
            let text = match &file {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?,
                None => read_stdin()?,
            };
            let separator = separator.map(Into::into).unwrap_or(config.batch.separator);
            let workers = workers.unwrap_or(config.batch.workers);
            run_batch(&config, &text, separator, workers, source, bib_out, cli.quiet).await
        }

        Commands::Classify { query } => {
            let text = query_text(query)?;
            println!("{}", serde_json::to_string_pretty(&classify(&text))?);
            Ok(())
        }

        Commands::Config => {
            print!("{}", default_toml()?);
            Ok(())
        }
    }
}

/// Query words from the command line, or stdin when there are none
fn query_text(words: Vec<String>) -> Result<String> {
    if words.is_empty() {
        read_stdin()
    } else {
        Ok(words.join(" "))
    }
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("failed to read stdin")?;
    Ok(text)
}

fn build_resolver(
    registry: &SourceRegistry,
    http: Arc<dyn HttpFetch>,
    source: SourceArg,
) -> Result<Arc<dyn Resolve>> {
    Ok(match source.kind() {
        Some(kind) => {
            let source = registry.get_required(kind.id())?;
            Arc::new(SingleSource::new(Arc::clone(source), http))
        }
        None => {
            tracing::debug!("Arbitrating over {} sources", registry.len());
            Arc::new(Arbitrator::from_registry(registry, http))
        }
    })
}

async fn search(
    config: &Config,
    text: &str,
    source: SourceArg,
    count: usize,
    bibtex: bool,
    website: bool,
    quiet: bool,
) -> Result<()> {
    let registry = SourceRegistry::with_endpoints(&config.endpoints, config.search.find_other_ids);
    let http: Arc<dyn HttpFetch> = Arc::new(config.http.client()?);
    let query = classify(text);

    if website {
        let kind = source.kind().unwrap_or(SourceKind::MathSciNet);
        let source = registry.get_required(kind.id())?;
        let page = fetch_website(source.as_ref(), http.as_ref(), &query).await?;
        println!("{}", page);
        return Ok(());
    }

    let resolver = build_resolver(&registry, http, source)?;
    let spinner = Spinner::new(&format!("Searching {}", resolver.name()), !quiet && ui::is_terminal());
    let outcome = resolver.resolve(&query, count).await;
    spinner.finish();

    if let Some(reason) = &outcome.failure {
        ui::print_status(Status::Error, &format!("{} search failed: {}", outcome.backend, reason));
    }
    if outcome.is_empty() {
        if !quiet {
            ui::print_status(Status::Warning, "No match found for");
        }
        println!("{}", text.trim());
        return Ok(());
    }

    let options = mathcite::render::RenderOptions {
        bibtex_out: bibtex || config.output.bibtex_out,
        kind: RenderKind::Search,
        ..config.output.clone()
    };
    if !quiet {
        let status = if outcome.is_unique { Status::Success } else { Status::Info };
        ui::print_status(
            status,
            &format!("{} found {} of {} record(s)", outcome.backend, outcome.count, outcome.total),
        );
    }
    let rendered = BibtexRenderer.render(&outcome, &options);
    println!("{}", ui::highlight_report(rendered.trim_end(), ui::is_terminal()));
    Ok(())
}

async fn run_batch(
    config: &Config,
    text: &str,
    separator: mathcite::batch::Separator,
    workers: usize,
    source: SourceArg,
    bib_out: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let registry = SourceRegistry::with_endpoints(&config.endpoints, config.search.find_other_ids);
    let http: Arc<dyn HttpFetch> = Arc::new(config.http.client()?);
    let resolver = build_resolver(&registry, http, source)?;

    let batch = Batch::new(separator, config.search.batch_count, config.output.clone());
    let total = separator.split(text).len();
    let harness = FetchHarness::new(workers);

    let cancel = harness.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing running lookups");
            cancel.cancel();
        }
    });

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let listener = BatchProgress::new(total, !quiet && ui::is_terminal()).listen(rx);

    let report = batch
        .run(text, resolver, &harness, &BibtexRenderer, Some(tx))
        .await;

    let progress = listener.await?;
    let summary = ui::batch_summary(&report);
    if report.entries.len() < total {
        progress.finish_with_error(&format!("Cancelled after {} of {}: {}", report.entries.len(), total, summary));
    } else {
        progress.finish_with_success(&summary);
    }

    println!("{}", ui::highlight_report(&report.text(), ui::is_terminal()));

    if let Some(path) = bib_out {
        std::fs::write(&path, report.bibtex())
            .with_context(|| format!("failed to write {}", path.display()))?;
        if !quiet {
            ui::print_status(Status::Success, &format!("BibTeX written to {}", path.display()));
        }
    }
    Ok(())
}
