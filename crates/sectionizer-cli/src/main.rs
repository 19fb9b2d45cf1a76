use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use sectionizer_batch::config_file::{self, ConfigFile};
use sectionizer_batch::output::PROCESSED_SUFFIX;
use sectionizer_batch::{BatchConfig, BatchEvent, DocOutcome, run_batch};
use sectionizer_core::{REFERENCES_KEY, SectionMap, Sectionizer, SectionizerConfig};

mod output;

use output::ColorMode;

const DEFAULT_LOG_FILTER: &str = "sectionizer=info";

/// How long abandoned blocking work may delay process exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// Exit status after a second Ctrl+C.
const FORCED_EXIT_CODE: i32 = 130;

/// Sectionizer - split scholarly full texts into named sections and a reference block
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sectionize every .json/.txt document in a directory
    Sectionize {
        /// Directory holding the input documents
        source: PathBuf,

        /// Output directory for artifacts and the ledger (default: <SOURCE>_json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of parallel workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Per-document timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Config file layered over the default cascade
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Re-run reference extraction over existing *_processed.json files
    Refs {
        /// Directory holding processed artifacts
        dir: PathBuf,

        /// Config file layered over the default cascade
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of files handled at once
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Show reference scores for the trailing paragraphs of one document
    Explain {
        /// Input document or a *_processed.json artifact
        file: PathBuf,

        /// Config file layered over the default cascade
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of trailing paragraphs to show
        #[arg(long, default_value_t = 12)]
        last: usize,
    },

    /// Count headings that still follow a conclusion in processed artifacts
    Keys {
        /// Directory holding processed artifacts
        dir: PathBuf,

        /// Write the markdown report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref())?;
    let color = ColorMode(!cli.no_color);

    block_on_with_grace(run(cli.command, color), SHUTDOWN_GRACE)?
}

/// Run `future` on a fresh multi-threaded runtime, then give blocking tasks
/// at most `grace` to finish before the runtime is torn down.
///
/// Timed-out documents leave their blocking task running; a plain runtime drop
/// would wait for it.
fn block_on_with_grace<F: Future>(future: F, grace: Duration) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

async fn run(command: Command, color: ColorMode) -> anyhow::Result<()> {
    match command {
        Command::Sectionize {
            source,
            output,
            workers,
            timeout_secs,
            config,
        } => sectionize(source, output, workers, timeout_secs, config, color).await,
        Command::Refs {
            dir,
            config,
            workers,
        } => refs(dir, config, workers, color).await,
        Command::Explain { file, config, last } => explain(&file, config.as_deref(), last, color),
        Command::Keys { dir, output } => keys(&dir, output.as_deref()),
    }
}

/// Install the fmt subscriber; with `--log-file` events go through a
/// non-blocking file writer whose guard must outlive `main`.
fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

/// Platform config < `.sectionizer.toml` < explicit `--config`.
fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<ConfigFile> {
    let cascade = config_file::load_config();
    match explicit {
        Some(path) => Ok(config_file::merge(cascade, config_file::read_config(path)?)),
        None => Ok(cascade),
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Resolve batch settings: CLI flags > env vars > config file > defaults.
fn batch_config(
    file: &ConfigFile,
    output: Option<PathBuf>,
    workers: Option<usize>,
    timeout_secs: Option<u64>,
) -> BatchConfig {
    let defaults = BatchConfig::default();
    BatchConfig {
        output_dir: output.or_else(|| file.output_dir()),
        num_workers: workers
            .or_else(|| env_parse("SECTIONIZER_WORKERS"))
            .or_else(|| file.num_workers())
            .unwrap_or(defaults.num_workers)
            .max(1),
        document_timeout: timeout_secs
            .or_else(|| env_parse("SECTIONIZER_TIMEOUT_SECS"))
            .or_else(|| file.timeout_secs())
            .map(Duration::from_secs)
            .unwrap_or(defaults.document_timeout),
    }
}

async fn sectionize(
    source: PathBuf,
    output: Option<PathBuf>,
    workers: Option<usize>,
    timeout_secs: Option<u64>,
    config: Option<PathBuf>,
    color: ColorMode,
) -> anyhow::Result<()> {
    let file = resolve_config(config.as_deref())?;
    let sectionizer = Sectionizer::with_config(file.sectionizer_config()?);
    let batch = batch_config(&file, output, workers, timeout_secs);

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} {msg} [{bar:40.green/dim}] {pos}/{len} (eta {eta})",
        )
        .unwrap()
        .progress_chars("=> "),
    );

    let progress_bar = bar.clone();
    let progress: Arc<dyn Fn(BatchEvent) + Send + Sync> =
        Arc::new(move |event: BatchEvent| match event {
            BatchEvent::Started { total, skipped } => {
                progress_bar.set_length(total.saturating_sub(skipped) as u64);
                progress_bar.set_message("sectionizing");
            }
            BatchEvent::Completed { id, outcome } => {
                if let DocOutcome::Failed { kind, reason } = &outcome {
                    progress_bar.println(output::failure_line(&id, *kind, reason, color));
                }
                progress_bar.set_message(id);
                progress_bar.inc(1);
            }
            BatchEvent::Finished(_) => progress_bar.finish_and_clear(),
        });

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler: the first press drains, the second exits.
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight documents");
            cancel_clone.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(FORCED_EXIT_CODE);
        }
    });

    let summary = run_batch(&source, &batch, sectionizer, cancel, progress).await?;
    bar.finish_and_clear();

    output::print_summary(&mut std::io::stdout(), &summary, color)?;
    Ok(())
}

async fn refs(
    dir: PathBuf,
    config: Option<PathBuf>,
    workers: Option<usize>,
    color: ColorMode,
) -> anyhow::Result<()> {
    let file = resolve_config(config.as_deref())?;
    let concurrency = batch_config(&file, None, workers, None).num_workers;
    let summary =
        sectionizer_batch::refs::reextract_dir(&dir, file.sectionizer_config()?, concurrency)
            .await?;

    output::print_refs_summary(&mut std::io::stdout(), &summary, color)?;
    Ok(())
}

fn explain(
    path: &Path,
    config: Option<&Path>,
    last: usize,
    color: ColorMode,
) -> anyhow::Result<()> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let config = resolve_config(config)?.sectionizer_config()?;
    let map = load_section_map(path, &config)?;
    let (heading, text) = merged_last_section(map)
        .ok_or_else(|| anyhow::anyhow!("{} has no sections", path.display()))?;

    let scores = sectionizer_core::references::explain(&text, &config);
    let shown = &scores[scores.len().saturating_sub(last)..];
    output::print_explain(
        &mut std::io::stdout(),
        &heading,
        scores.len(),
        shown,
        config.reference_threshold(),
        color,
    )?;
    Ok(())
}

/// Read a processed artifact as-is, or sectionize a raw input document.
fn load_section_map(path: &Path, config: &SectionizerConfig) -> anyhow::Result<SectionMap> {
    let is_artifact = path
        .file_name()
        .map(|n| n.to_string_lossy().ends_with(PROCESSED_SUFFIX))
        .unwrap_or(false);

    if is_artifact {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    } else {
        let doc = Sectionizer::with_config(config.clone()).sectionize_path(path)?;
        Ok(doc.to_processed_map())
    }
}

/// The last content section with its `References` entry appended again.
fn merged_last_section(mut map: SectionMap) -> Option<(String, String)> {
    let refs = map.remove(REFERENCES_KEY);
    match (map.last(), refs) {
        (Some((heading, body)), Some(refs)) => {
            Some((heading.to_string(), format!("{}\n\n{}", body, refs)))
        }
        (Some((heading, body)), None) => Some((heading.to_string(), body.to_string())),
        (None, Some(refs)) => Some((REFERENCES_KEY.to_string(), refs)),
        (None, None) => None,
    }
}

fn keys(dir: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let report = sectionizer_batch::keys::scan_dir(dir)?;
    let markdown = report.to_markdown();

    match output {
        Some(path) => {
            std::fs::write(path, markdown)
                .with_context(|| format!("cannot write {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => print!("{}", markdown),
    }
    Ok(())
}
