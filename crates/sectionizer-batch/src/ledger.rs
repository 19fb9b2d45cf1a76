//! Skip list and failure ledger shared by a batch run.
//!
//! The ledger is read once when a batch starts and rewritten once when it ends
//! (or is interrupted). Documents it mentions are never opened again.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::BatchError;

/// File name of the ledger inside the output directory.
pub const LEDGER_FILE: &str = "ledger.json";

/// Why a document was recorded as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input could not be read or had no recognizable text.
    Malformed,
    /// Classification produced no valid section.
    NoValidSections,
    /// Classification ran past the per-document timeout.
    Timeout,
    /// Any other per-document error.
    Error,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Malformed => "malformed",
            FailureKind::NoValidSections => "no_valid_sections",
            FailureKind::Timeout => "timeout",
            FailureKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: FailureKind,
    pub reason: String,
}

/// Completed and failed document ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ledger {
    completed: BTreeSet<String>,
    failed: BTreeMap<String, FailureRecord>,
}

/// On-disk shapes. Older runs wrote a bare array of failed ids.
#[derive(Deserialize)]
#[serde(untagged)]
enum LedgerFile {
    Current {
        #[serde(default)]
        completed: BTreeSet<String>,
        #[serde(default)]
        failed: BTreeMap<String, FailureRecord>,
    },
    Legacy(Vec<String>),
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a ledger. A missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, BatchError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(BatchError::Io(e)),
        };
        Self::from_json_str(&content).map_err(|source| BatchError::Ledger {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        let file: LedgerFile = serde_json::from_str(content)?;
        Ok(match file {
            LedgerFile::Current { completed, failed } => Self { completed, failed },
            LedgerFile::Legacy(ids) => Self {
                completed: BTreeSet::new(),
                failed: ids
                    .into_iter()
                    .map(|id| {
                        let record = FailureRecord {
                            kind: FailureKind::Error,
                            reason: "listed in legacy skip list".to_string(),
                        };
                        (id, record)
                    })
                    .collect(),
            },
        })
    }

    /// `true` if the id was completed or failed in an earlier run.
    pub fn contains(&self, id: &str) -> bool {
        self.completed.contains(id) || self.failed.contains_key(id)
    }

    pub fn record_success(&mut self, id: &str) {
        self.failed.remove(id);
        self.completed.insert(id.to_string());
    }

    pub fn record_failure(&mut self, id: &str, kind: FailureKind, reason: impl Into<String>) {
        self.completed.remove(id);
        self.failed.insert(
            id.to_string(),
            FailureRecord {
                kind,
                reason: reason.into(),
            },
        );
    }

    pub fn completed(&self) -> impl Iterator<Item = &str> {
        self.completed.iter().map(String::as_str)
    }

    pub fn failure(&self, id: &str) -> Option<&FailureRecord> {
        self.failed.get(id)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// Write the ledger through a temp file in the same directory, then rename.
    pub fn save(&self, path: &Path) -> Result<(), BatchError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, self).map_err(|source| BatchError::Ledger {
            path: path.to_path_buf(),
            source,
        })?;
        tmp.flush()?;
        tmp.persist(path)?;
        tracing::debug!(
            path = %path.display(),
            completed = self.completed.len(),
            failed = self.failed.len(),
            "ledger saved"
        );
        Ok(())
    }
}
