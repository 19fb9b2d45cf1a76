use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use sectionizer_core::Sectionizer;

pub mod collect;
pub mod config_file;
pub mod keys;
pub mod ledger;
pub mod output;
pub mod pool;
pub mod refs;

pub use collect::{InputDoc, collect_inputs};
pub use config_file::ConfigFile;
pub use ledger::{FailureKind, LEDGER_FILE, Ledger};
pub use pool::{DocJob, DocOutcome, SectionizePool};

/// Per-document timeout when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("cannot read source directory {}: {source}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("ledger {} is unreadable: {source}", .path.display())]
    Ledger {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid config file {}: {reason}", .path.display())]
    Config { path: PathBuf, reason: String },
    #[error("failed to persist file: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Where artifacts and the ledger go; defaults to `<source>_json`.
    pub output_dir: Option<PathBuf>,
    pub num_workers: usize,
    pub document_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            num_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            document_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Counts for a finished (or interrupted) batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    /// Failures other than timeouts.
    pub failed: usize,
    pub timed_out: usize,
    /// Documents already in the ledger.
    pub skipped: usize,
    pub with_references: usize,
    /// Succeeded documents without headings, kept as one `text` section.
    pub fallback: usize,
    pub interrupted: bool,
}

/// Progress events emitted during a batch run.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize, skipped: usize },
    Completed { id: String, outcome: DocOutcome },
    Finished(BatchSummary),
}

/// `<source>_json` next to the source directory.
pub fn default_output_dir(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    source.with_file_name(format!("{}_json", name))
}

/// Sectionize every eligible document in `source`.
///
/// Pipeline:
/// 1. Collect inputs and load the ledger from the output directory
/// 2. Skip documents the ledger already knows
/// 3. Process the rest on the worker pool, writing artifacts per document
/// 4. Save the ledger, also when the run was cancelled
pub async fn run_batch(
    source: &Path,
    config: &BatchConfig,
    sectionizer: Sectionizer,
    cancel: CancellationToken,
    progress: Arc<dyn Fn(BatchEvent) + Send + Sync>,
) -> Result<BatchSummary, BatchError> {
    let docs = collect_inputs(source)?;
    let output_dir = config
        .output_dir
        .clone()
        .unwrap_or_else(|| default_output_dir(source));
    std::fs::create_dir_all(&output_dir)?;

    let ledger_path = output_dir.join(LEDGER_FILE);
    let ledger = Ledger::load(&ledger_path)?;

    let total = docs.len();
    let (skipped, pending): (Vec<_>, Vec<_>) =
        docs.into_iter().partition(|d| ledger.contains(&d.id));
    let mut summary = BatchSummary {
        total,
        skipped: skipped.len(),
        ..Default::default()
    };

    tracing::info!(
        source = %source.display(),
        output = %output_dir.display(),
        total,
        skipped = summary.skipped,
        workers = config.num_workers,
        "batch started"
    );
    progress(BatchEvent::Started {
        total,
        skipped: summary.skipped,
    });

    let ledger = Arc::new(Mutex::new(ledger));
    let pool = SectionizePool::new(
        sectionizer,
        output_dir,
        ledger.clone(),
        config.document_timeout,
        cancel.clone(),
        config.num_workers,
    );

    let mut receivers = Vec::with_capacity(pending.len());
    for doc in pending {
        if cancel.is_cancelled() {
            break;
        }
        let (result_tx, result_rx) = oneshot::channel();
        pool.submit(DocJob {
            doc,
            result_tx,
            progress: progress.clone(),
        })
        .await;
        receivers.push(result_rx);
    }
    pool.shutdown().await;

    for rx in receivers {
        // A dropped sender means the job was abandoned by cancellation.
        let Ok(outcome) = rx.await else {
            continue;
        };
        match outcome {
            DocOutcome::Succeeded {
                references,
                fallback,
            } => {
                summary.succeeded += 1;
                if references {
                    summary.with_references += 1;
                }
                if fallback {
                    summary.fallback += 1;
                }
            }
            DocOutcome::Failed {
                kind: FailureKind::Timeout,
                ..
            } => summary.timed_out += 1,
            DocOutcome::Failed { .. } => summary.failed += 1,
        }
    }
    summary.interrupted = cancel.is_cancelled();

    let snapshot = ledger.lock().unwrap_or_else(|e| e.into_inner()).clone();
    snapshot.save(&ledger_path)?;

    tracing::info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        timed_out = summary.timed_out,
        skipped = summary.skipped,
        with_references = summary.with_references,
        fallback = summary.fallback,
        interrupted = summary.interrupted,
        "batch finished"
    );
    progress(BatchEvent::Finished(summary.clone()));
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_dir_is_sibling() {
        assert_eq!(
            default_output_dir(Path::new("/data/papers")),
            PathBuf::from("/data/papers_json")
        );
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(BatchConfig::default().document_timeout, Duration::from_secs(60));
        assert!(BatchConfig::default().num_workers >= 1);
    }
}
