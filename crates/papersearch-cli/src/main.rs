use std::io::{IsTerminal, Write};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use papersearch_core::config_file;
use papersearch_core::{Config, ModelFunction, Paper, SearchParams, Session, SortOrder, Trigger};

mod output;

use output::ColorMode;

/// Paper Search - search papers and summarize, translate and analyze them
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Backend base URL (overrides PAPERSEARCH_API_URL and the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Debug logging for papersearch (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct ListingArgs {
    /// Lines of abstract to show per result (0 = all)
    #[arg(long, default_value_t = 3)]
    abstract_lines: usize,

    /// Request quick summaries for every result with an abstract
    #[arg(long)]
    auto_summarize: bool,
}

#[derive(Args, Debug)]
struct PaperArgs {
    /// Search query used to find the paper
    query: String,

    /// Which result to use (0-based)
    #[arg(short, long, default_value_t = 0)]
    index: usize,

    /// Number of results to fetch (5, 10, 20, 50 or 100)
    #[arg(short, long)]
    limit: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search for papers
    Search {
        query: String,

        /// Number of results (5, 10, 20, 50 or 100)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Result order: relevance, date or citations
        #[arg(long)]
        sort: Option<SortOrder>,

        #[command(flatten)]
        listing: ListingArgs,
    },

    /// Run a search from a shared query string such as `q=transformers&limit=20`
    Open {
        query_string: String,

        #[command(flatten)]
        listing: ListingArgs,
    },

    /// Classify a paper's field, target and methods
    Analyze(PaperArgs),

    /// Translate a paper's abstract, streaming the text as it arrives
    Translate(PaperArgs),

    /// Detailed structured summary of a paper
    Summarize(PaperArgs),

    /// One-line summary of a paper
    QuickSummary(PaperArgs),

    /// Inspect or change the backend's model selection
    Models {
        #[command(subcommand)]
        action: ModelsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ModelsCommand {
    /// List installed models
    List,
    /// Show which model each function uses
    Show,
    /// Select the model for a function
    Set {
        /// analysis, translation, quick_summary or detailed_summary
        function: String,
        model: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = resolve_config(cli.api_url);
    tracing::debug!(?config, "resolved configuration");
    let color = ColorMode(!cli.no_color && std::io::stdout().is_terminal());
    let session = Session::from_config(&config);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Search {
            query,
            limit,
            sort,
            listing,
        } => {
            if let Some(sort) = sort {
                session.set_sort(sort);
            }
            let params = SearchParams::new(query, limit.unwrap_or(config.default_limit));
            search(&session, params, &listing, color, &cancel).await
        }
        Command::Open {
            query_string,
            listing,
        } => {
            let params = SearchParams::from_query_string(&query_string);
            search(&session, params, &listing, color, &cancel).await
        }
        Command::Analyze(args) => analyze(&session, &config, &args, color).await,
        Command::Translate(args) => translate(&session, &config, &args, color).await,
        Command::Summarize(args) => summarize(&session, &config, &args, color).await,
        Command::QuickSummary(args) => quick_summary(&session, &config, &args, color).await,
        Command::Models { action } => models(&session, action, color).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,papersearch=debug,papersearch_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// CLI flag > env > config file > defaults.
fn resolve_config(api_url_flag: Option<String>) -> Config {
    let mut config = Config::from_file(&config_file::load_config());
    let env_url = ["PAPERSEARCH_API_URL", "NEXT_PUBLIC_API_BASE_URL"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()));
    if let Some(url) = api_url_flag.or(env_url) {
        config.api_base_url = url.trim().trim_end_matches('/').to_string();
    }
    config
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

async fn search(
    session: &Session,
    params: SearchParams,
    listing: &ListingArgs,
    color: ColorMode,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    if params.query.trim().is_empty() {
        anyhow::bail!("Search query is empty");
    }

    let pb = spinner(format!("Searching for \"{}\"...", params.query));
    let outcome = session.search(params).await;
    pb.finish_and_clear();
    if !outcome.ok {
        anyhow::bail!("Search failed (is the backend running at the configured URL?)");
    }

    let mut out = std::io::stdout();
    output::print_results(&mut out, &session.searcher().state(), listing.abstract_lines, color)?;

    if listing.auto_summarize && !session.queue().is_empty() {
        run_queue(session, color, cancel).await;
    }
    Ok(())
}

async fn run_queue(session: &Session, color: ColorMode, cancel: &CancellationToken) {
    let total = session.queue().len() as u64;
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} Quick summaries [{bar:30.green/dim}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    println!();

    let progress = {
        let pb = pb.clone();
        move |event| {
            if let Some(line) = output::format_queue_event(&event, color) {
                pb.println(line);
            }
            pb.inc(1);
        }
    };
    session.queue().run_until_empty(cancel, progress).await;

    if cancel.is_cancelled() {
        pb.abandon_with_message("interrupted");
    } else {
        pb.finish_and_clear();
    }
}

/// Search and pick the `index`-th result.
async fn pick_paper(session: &Session, config: &Config, args: &PaperArgs) -> anyhow::Result<Paper> {
    let params = SearchParams::new(args.query.clone(), args.limit.unwrap_or(config.default_limit));
    let pb = spinner(format!("Searching for \"{}\"...", params.query));
    let outcome = session.search(params).await;
    pb.finish_and_clear();
    if !outcome.ok {
        anyhow::bail!("Search failed (is the backend running at the configured URL?)");
    }
    let count = outcome.papers.len();
    outcome
        .papers
        .into_iter()
        .nth(args.index)
        .ok_or_else(|| anyhow::anyhow!("No result at index {} ({} results)", args.index, count))
}

async fn analyze(
    session: &Session,
    config: &Config,
    args: &PaperArgs,
    color: ColorMode,
) -> anyhow::Result<()> {
    let paper = pick_paper(session, config, args).await?;
    let pb = spinner("Analyzing...".to_string());
    let result = session.analysis().analyze(&paper, |_| {}).await;
    pb.finish_and_clear();
    let analysis = result.context("Analysis failed")?;
    output::print_analysis(&mut std::io::stdout(), &paper, &analysis, color)?;
    Ok(())
}

async fn translate(
    session: &Session,
    config: &Config,
    args: &PaperArgs,
    color: ColorMode,
) -> anyhow::Result<()> {
    use owo_colors::OwoColorize;

    let paper = pick_paper(session, config, args).await?;
    let mut out = std::io::stdout();
    let mut shown = String::new();
    let mut write_error: Option<std::io::Error> = None;

    let title = paper.title.clone();
    let result = session
        .translation()
        .translate(
            &paper,
            |_| {
                if color.enabled() {
                    println!("{}\n", title.bold());
                } else {
                    println!("{}\n", title);
                }
            },
            |visible| {
                if write_error.is_some() {
                    return;
                }
                if let Err(e) = output::write_stream_update(&mut out, &mut shown, visible) {
                    write_error = Some(e);
                }
            },
        )
        .await;

    if let Some(e) = write_error {
        return Err(anyhow::Error::new(e).context("Failed to write translation"));
    }
    match result {
        Ok(text) => {
            // Cache hit: nothing was streamed.
            if shown.is_empty() {
                println!("{}", text);
            } else {
                println!();
            }
            Ok(())
        }
        Err(e) => {
            if !shown.is_empty() {
                println!();
            }
            Err(anyhow::Error::new(e).context("Translation failed"))
        }
    }
}

async fn summarize(
    session: &Session,
    config: &Config,
    args: &PaperArgs,
    color: ColorMode,
) -> anyhow::Result<()> {
    let paper = pick_paper(session, config, args).await?;
    let pb = spinner("Summarizing...".to_string());
    let result = session.summary().summarize(&paper, Trigger::User).await;
    pb.finish_and_clear();
    let data = result.context("Summary failed")?;
    output::print_summary(&mut std::io::stdout(), &paper, &data, color)?;
    Ok(())
}

async fn quick_summary(
    session: &Session,
    config: &Config,
    args: &PaperArgs,
    color: ColorMode,
) -> anyhow::Result<()> {
    let paper = pick_paper(session, config, args).await?;
    let pb = spinner("Summarizing...".to_string());
    let result = session.summary().quick_summary(&paper).await;
    pb.finish_and_clear();
    match result.context("Quick summary failed")? {
        Some(summary) => println!(
            "{}",
            output::format_quick_summary(&paper.title, &summary, color)
        ),
        None => println!("A quick summary for this paper is already in progress."),
    }
    Ok(())
}

async fn models(session: &Session, action: ModelsCommand, color: ColorMode) -> anyhow::Result<()> {
    let mut out = std::io::stdout();
    match action {
        ModelsCommand::List => {
            let available = session
                .models()
                .load_available_models()
                .await
                .context("Failed to list models")?;
            let config = session.models().load_config().await;
            output::print_models(&mut out, &available, config.as_ref(), color)?;
        }
        ModelsCommand::Show => {
            let config = session
                .models()
                .load_config()
                .await
                .context("Model configuration unavailable (backend unreachable and no local copy)")?;
            output::print_model_config(&mut out, &config, color)?;
        }
        ModelsCommand::Set { function, model } => {
            let function = ModelFunction::from_wire_name(&function).with_context(|| {
                let names: Vec<&str> = ModelFunction::ALL.iter().map(|f| f.wire_name()).collect();
                format!("Unknown function '{}'. Expected one of: {}", function, names.join(", "))
            })?;
            let updated = session
                .models()
                .update(function, &model)
                .await
                .with_context(|| format!("Failed to set {} model to {}", function, model))?;
            writeln!(out, "Set {} model to {}", function, model)?;
            if let Some(config) = updated {
                output::print_model_config(&mut out, &config, color)?;
            }
        }
    }
    Ok(())
}
