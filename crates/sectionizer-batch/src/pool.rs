//! Worker pool for sectionizing documents.
//!
//! Jobs go through one shared `async-channel` queue consumed by `num_workers`
//! worker tasks. Classification is CPU-bound and runs in `spawn_blocking`
//! under a per-document timeout; a timed-out job is abandoned, and since only
//! the worker writes artifacts, the abandoned computation can never produce
//! output.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sectionizer_core::{SectionizeError, Sectionizer};

use crate::collect::InputDoc;
use crate::ledger::{FailureKind, Ledger};
use crate::output::write_artifacts;
use crate::BatchEvent;

/// Result of processing one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocOutcome {
    Succeeded { references: bool, fallback: bool },
    Failed { kind: FailureKind, reason: String },
}

/// A document submitted to the pool.
pub struct DocJob {
    pub doc: InputDoc,
    pub result_tx: oneshot::Sender<DocOutcome>,
    pub progress: Arc<dyn Fn(BatchEvent) + Send + Sync>,
}

/// State shared by every worker.
struct WorkerContext {
    sectionizer: Sectionizer,
    output_dir: PathBuf,
    ledger: Arc<Mutex<Ledger>>,
    document_timeout: Duration,
}

/// A pool of worker tasks that sectionize documents and write their artifacts.
///
/// Submit jobs via [`submit()`](SectionizePool::submit); each job's outcome is
/// delivered on its oneshot channel and recorded in the shared ledger.
pub struct SectionizePool {
    job_tx: async_channel::Sender<DocJob>,
    pool_handle: JoinHandle<()>,
}

impl SectionizePool {
    pub fn new(
        sectionizer: Sectionizer,
        output_dir: PathBuf,
        ledger: Arc<Mutex<Ledger>>,
        document_timeout: Duration,
        cancel: CancellationToken,
        num_workers: usize,
    ) -> Self {
        let (job_tx, job_rx) = async_channel::unbounded::<DocJob>();
        let ctx = Arc::new(WorkerContext {
            sectionizer,
            output_dir,
            ledger,
            document_timeout,
        });

        let pool_handle = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(num_workers.max(1));
            for _ in 0..num_workers.max(1) {
                handles.push(tokio::spawn(worker_loop(
                    job_rx.clone(),
                    ctx.clone(),
                    cancel.clone(),
                )));
            }

            // Workers hold the remaining receivers and exit when the queue closes.
            drop(job_rx);

            for h in handles {
                let _ = h.await;
            }
        });

        Self {
            job_tx,
            pool_handle,
        }
    }

    pub async fn submit(&self, job: DocJob) {
        let _ = self.job_tx.send(job).await;
    }

    /// Close the queue and wait for the workers to drain it.
    pub async fn shutdown(self) {
        self.job_tx.close();
        let _ = self.pool_handle.await;
    }
}

async fn worker_loop(
    job_rx: async_channel::Receiver<DocJob>,
    ctx: Arc<WorkerContext>,
    cancel: CancellationToken,
) {
    while let Ok(job) = job_rx.recv().await {
        if cancel.is_cancelled() {
            break;
        }

        let DocJob {
            doc,
            result_tx,
            progress,
        } = job;

        let outcome = tokio::select! {
            _ = cancel.cancelled() => break,
            outcome = process_document(&doc, &ctx) => outcome,
        };

        {
            let mut ledger = ctx.ledger.lock().unwrap_or_else(|e| e.into_inner());
            match &outcome {
                DocOutcome::Succeeded { .. } => ledger.record_success(&doc.id),
                DocOutcome::Failed { kind, reason } => {
                    ledger.record_failure(&doc.id, *kind, reason.clone())
                }
            }
        }

        progress(BatchEvent::Completed {
            id: doc.id.clone(),
            outcome: outcome.clone(),
        });
        let _ = result_tx.send(outcome);
    }
}

async fn process_document(doc: &InputDoc, ctx: &WorkerContext) -> DocOutcome {
    let sectionizer = ctx.sectionizer.clone();
    let path = doc.path.clone();
    let task = tokio::task::spawn_blocking(move || sectionizer.sectionize_path(&path));

    let classified = match tokio::time::timeout(ctx.document_timeout, task).await {
        Err(_) => {
            let reason = format!("exceeded {}s", ctx.document_timeout.as_secs_f64());
            tracing::warn!(id = %doc.id, %reason, "document timed out");
            return DocOutcome::Failed {
                kind: FailureKind::Timeout,
                reason,
            };
        }
        Ok(Err(join_err)) => return failed(&doc.id, FailureKind::Error, join_err.to_string()),
        Ok(Ok(Err(e))) => return failed(&doc.id, failure_kind(&e), e.to_string()),
        Ok(Ok(Ok(classified))) => classified,
    };

    let references = classified.references.is_some();
    let fallback = classified.fallback;
    let output_dir = ctx.output_dir.clone();
    let id = doc.id.clone();
    let write = tokio::task::spawn_blocking(move || write_artifacts(&output_dir, &id, &classified));

    match write.await {
        Ok(Ok(paths)) => {
            tracing::debug!(id = %doc.id, path = %paths.processed.display(), "artifacts written");
            DocOutcome::Succeeded {
                references,
                fallback,
            }
        }
        Ok(Err(e)) => failed(&doc.id, FailureKind::Error, e.to_string()),
        Err(join_err) => failed(&doc.id, FailureKind::Error, join_err.to_string()),
    }
}

fn failed(id: &str, kind: FailureKind, reason: String) -> DocOutcome {
    tracing::warn!(id, kind = kind.as_str(), %reason, "document failed");
    DocOutcome::Failed { kind, reason }
}

fn failure_kind(err: &SectionizeError) -> FailureKind {
    match err {
        SectionizeError::Malformed(_) | SectionizeError::Json(_) | SectionizeError::Io(_) => {
            FailureKind::Malformed
        }
        SectionizeError::NoValidSections => FailureKind::NoValidSections,
    }
}
