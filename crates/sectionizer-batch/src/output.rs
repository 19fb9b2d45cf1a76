use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use sectionizer_core::ClassifiedDocument;

use crate::BatchError;

pub const PROCESSED_SUFFIX: &str = "_processed.json";
pub const REJECTED_SUFFIX: &str = "_rejected.json";

/// Paths of the two artifacts written for a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub processed: PathBuf,
    pub rejected: PathBuf,
}

impl ArtifactPaths {
    pub fn for_id(output_dir: &Path, id: &str) -> Self {
        Self {
            processed: output_dir.join(format!("{id}{PROCESSED_SUFFIX}")),
            rejected: output_dir.join(format!("{id}{REJECTED_SUFFIX}")),
        }
    }
}

/// Serialize `value` as pretty JSON to a temp file next to `path`, then rename
/// it into place. Readers never see a partial file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), BatchError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(std::io::Error::from)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Write `<id>_processed.json` and `<id>_rejected.json`.
///
/// If the second write fails the first artifact is removed again, so a
/// document never ends up with only half of its output.
pub fn write_artifacts(
    output_dir: &Path,
    id: &str,
    doc: &ClassifiedDocument,
) -> Result<ArtifactPaths, BatchError> {
    let paths = ArtifactPaths::for_id(output_dir, id);

    write_json_atomic(&paths.processed, &doc.to_processed_map())?;
    if let Err(e) = write_json_atomic(&paths.rejected, &doc.rejected) {
        let _ = std::fs::remove_file(&paths.processed);
        return Err(e);
    }
    Ok(paths)
}
