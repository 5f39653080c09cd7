//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use topicdoc_core::{
    Grounding, Pipeline, PipelineConfig, ProgressReporter, RefineRequest, Services, parse_outline,
};
use topicdoc_shared::{AppConfig, TopicContext, init_config, load_config, validate_api_key};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// TopicDoc: turn a subject into a sourced MDX document.
#[derive(Parser)]
#[command(
    name = "topicdoc",
    version,
    about = "Generate MDX documentation for a subject from web sources and a language model.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Where a command writes its result.
#[derive(Args)]
pub(crate) struct Output {
    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Discover sources for a subject and generate a document.
    Generate {
        /// Subject to document.
        subject: String,

        /// Enclosing subject that frames the document.
        #[arg(short, long)]
        parent: Option<String>,

        /// URLs requested per search query (defaults to config).
        #[arg(short, long)]
        results: Option<usize>,

        /// Print the full run result as JSON.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        output: Output,
    },

    /// Generate a document from the given pages only.
    FromUrls {
        /// Subject to document.
        #[arg(short, long)]
        subject: String,

        /// Enclosing subject that frames the document.
        #[arg(short, long)]
        parent: Option<String>,

        /// Pages to use as sources.
        #[arg(required = true)]
        urls: Vec<Url>,

        #[command(flatten)]
        output: Output,
    },

    /// Generate a lesson outline (JSON) for a query.
    Outline {
        /// What the lesson should cover.
        query: String,
    },

    /// Generate a lesson plan from an outline file.
    Lesson {
        /// Outline JSON, as printed by `outline`.
        #[arg(long)]
        outline: PathBuf,

        /// URLs requested per topic/subtopic search (defaults to config).
        #[arg(short, long)]
        results: Option<usize>,

        #[command(flatten)]
        output: Output,
    },

    /// Rewrite a selected passage of a document.
    Refine {
        /// Document containing the selection.
        #[arg(long)]
        doc: PathBuf,

        /// The selected text.
        #[arg(long)]
        selection: String,

        /// What to change or answer.
        #[arg(long)]
        question: String,

        /// Topic of the document.
        #[arg(long)]
        topic: String,

        /// Ground the answer in web search results.
        #[arg(long, conflicts_with = "url")]
        search: bool,

        /// Ground the answer in these pages (repeatable).
        #[arg(long)]
        url: Vec<Url>,

        /// URLs requested per search query with --search (defaults to config).
        #[arg(short, long)]
        results: Option<usize>,

        #[command(flatten)]
        output: Output,
    },

    /// Normalize an existing document (offline).
    Normalize {
        /// Document to normalize.
        file: PathBuf,

        #[command(flatten)]
        output: Output,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "topicdoc=info",
        1 => "topicdoc=debug",
        _ => "topicdoc=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Generate {
            subject,
            parent,
            results,
            json,
            output,
        } => cmd_generate(&subject, parent.as_deref(), results, json, &output).await,
        Command::FromUrls {
            subject,
            parent,
            urls,
            output,
        } => cmd_from_urls(&subject, parent.as_deref(), &urls, &output).await,
        Command::Outline { query } => cmd_outline(&query).await,
        Command::Lesson {
            outline,
            results,
            output,
        } => cmd_lesson(&outline, results, &output).await,
        Command::Refine {
            doc,
            selection,
            question,
            topic,
            search,
            url,
            results,
            output,
        } => {
            let request = RefineRequest {
                document: read_file(&doc)?,
                selected_text: selection,
                question,
                topic,
            };
            cmd_refine(request, search, url, results, &output).await
        }
        Command::Normalize { file, output } => cmd_normalize(&file, &output),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

/// Load config, check the API key, and wire up the real collaborators.
fn build_pipeline() -> Result<(AppConfig, Pipeline)> {
    let config = load_config()?;
    validate_api_key(&config)?;
    let services = Services::from_config(&config)?;
    let pipeline = Pipeline::new(&services, PipelineConfig::from(&config));
    Ok((config, pipeline))
}

async fn cmd_generate(
    subject: &str,
    parent: Option<&str>,
    results: Option<usize>,
    json: bool,
    output: &Output,
) -> Result<()> {
    let (config, pipeline) = build_pipeline()?;
    let ctx = TopicContext::new(subject, parent)?;
    let n = results.unwrap_or(config.defaults.results_per_query);

    info!(subject = %ctx, n, "generating document");

    let reporter = CliProgress::new();
    let result = pipeline.generate(&ctx, n, &reporter).await;
    reporter.finish();
    let doc = result?;

    if json {
        emit(output, &serde_json::to_string_pretty(&doc)?)?;
    } else {
        emit(output, doc.artifact.as_str())?;
    }

    eprintln!();
    eprintln!("  Run:        {}", doc.run_id);
    eprintln!("  Discovered: {}", doc.sources_discovered);
    eprintln!("  Used:       {}", doc.outcome.sources_used.len());
    eprintln!("  Mode:       {}", doc.outcome.mode());
    eprintln!("  Current:    {}", doc.outcome.currency_known);
    Ok(())
}

async fn cmd_from_urls(
    subject: &str,
    parent: Option<&str>,
    urls: &[Url],
    output: &Output,
) -> Result<()> {
    let (_, pipeline) = build_pipeline()?;
    let ctx = TopicContext::new(subject, parent)?;

    info!(subject = %ctx, urls = urls.len(), "generating document from URLs");

    let reporter = CliProgress::new();
    let result = pipeline.generate_from_urls(&ctx, urls, &reporter).await;
    reporter.finish();
    let doc = result?;

    emit(output, doc.artifact.as_str())?;
    eprintln!(
        "  Used {} of {} pages ({})",
        doc.outcome.sources_used.len(),
        doc.sources_discovered,
        doc.outcome.mode()
    );
    Ok(())
}

async fn cmd_outline(query: &str) -> Result<()> {
    let (_, pipeline) = build_pipeline()?;
    let outline = pipeline.outline(query).await?;
    println!("{}", serde_json::to_string_pretty(&outline)?);
    Ok(())
}

async fn cmd_lesson(outline_path: &Path, results: Option<usize>, output: &Output) -> Result<()> {
    let outline = parse_outline(&read_file(outline_path)?)?;
    let (config, pipeline) = build_pipeline()?;
    let n = results.unwrap_or(config.defaults.results_per_query);

    info!(topics = outline.len(), n, "generating lesson");

    let reporter = CliProgress::new();
    let result = pipeline.generate_lesson(&outline, n, &reporter).await;
    reporter.finish();
    let plan = result?;

    emit(output, &plan.render())?;
    eprintln!("  Sections: {}", plan.section_count());
    Ok(())
}

async fn cmd_refine(
    request: RefineRequest,
    search: bool,
    urls: Vec<Url>,
    results: Option<usize>,
    output: &Output,
) -> Result<()> {
    let (config, pipeline) = build_pipeline()?;
    let grounding = if search {
        Grounding::Search {
            results_per_query: results.unwrap_or(config.defaults.results_per_query),
        }
    } else if !urls.is_empty() {
        Grounding::Urls(urls)
    } else {
        Grounding::None
    };

    let refined = pipeline.refine(&request, &grounding).await?;
    emit(output, &refined.text)?;
    for source in &refined.sources {
        eprintln!("  source: {source}");
    }
    Ok(())
}

fn cmd_normalize(file: &Path, output: &Output) -> Result<()> {
    let raw = read_file(file)?;
    emit(output, topicdoc_core::normalize(&raw).as_str())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))
}

fn emit(output: &Output, text: &str) -> Result<()> {
    match &output.out {
        Some(path) => {
            std::fs::write(path, text)
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            eprintln!("  Written to {}", path.display());
        }
        None => {
            if text.ends_with('\n') {
                print!("{text}");
            } else {
                println!("{text}");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn sources_found(&self, count: usize) {
        self.spinner.println(format!("  Found {count} candidate sources"));
    }

    fn pages_fetched(&self, succeeded: usize, total: usize) {
        self.spinner
            .println(format!("  Fetched {succeeded}/{total} pages"));
    }
}
