use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::ledger::LEDGER_FILE;
use crate::output::{PROCESSED_SUFFIX, REJECTED_SUFFIX};
use crate::BatchError;

/// Extensions of files the batch driver picks up.
pub const INPUT_EXTENSIONS: &[&str] = &["json", "txt"];

/// One input document: a file and the id its artifacts are named after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDoc {
    pub id: String,
    pub path: PathBuf,
}

/// Collect eligible input files directly in `source` and one directory below.
///
/// Hidden files and directories are ignored, as are files that look like our
/// own artifacts. The result is sorted by path; when two files share a stem,
/// the first one wins.
pub fn collect_inputs(source: &Path) -> Result<Vec<InputDoc>, BatchError> {
    let unreadable = |e: std::io::Error| BatchError::SourceUnreadable {
        path: source.to_path_buf(),
        source: e,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(source).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if is_hidden(&path) {
            continue;
        }
        if path.is_dir() {
            let Ok(children) = std::fs::read_dir(&path) else {
                tracing::warn!(dir = %path.display(), "skipping unreadable subdirectory");
                continue;
            };
            paths.extend(children.flatten().map(|e| e.path()).filter(|p| is_input(p)));
        } else if is_input(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut seen = HashSet::new();
    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(id) = doc_id(&path) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            tracing::warn!(id = %id, path = %path.display(), "duplicate document id, skipping");
            continue;
        }
        docs.push(InputDoc { id, path });
    }
    Ok(docs)
}

/// `*_processed.json` artifacts directly in `dir` and one directory below,
/// sorted by path.
pub fn processed_files(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let unreadable = |e: std::io::Error| BatchError::SourceUnreadable {
        path: dir.to_path_buf(),
        source: e,
    };
    let is_processed = |p: &Path| {
        p.is_file()
            && p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PROCESSED_SUFFIX) && !n.starts_with('.'))
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_dir() && !is_hidden(&path) {
            if let Ok(children) = std::fs::read_dir(&path) {
                files.extend(children.flatten().map(|e| e.path()).filter(|p| is_processed(p)));
            }
        } else if is_processed(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Document id: the file stem.
pub fn doc_id(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn is_input(path: &Path) -> bool {
    if !path.is_file() || is_hidden(path) {
        return false;
    }
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name == LEDGER_FILE || name.ends_with(PROCESSED_SUFFIX) || name.ends_with(REJECTED_SUFFIX) {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| INPUT_EXTENSIONS.iter().any(|x| ext.eq_ignore_ascii_case(x)))
}
