//! Re-run reference extraction over existing processed artifacts.
//!
//! Useful after tuning weights or patience: each `*_processed.json` has its
//! `References` entry merged back onto the last section and split again.

use std::path::Path;
use std::sync::Arc;

use sectionizer_core::{REFERENCES_KEY, SectionMap, SectionizerConfig, extract_references_with_config};

use crate::collect::processed_files;
use crate::output::write_json_atomic;
use crate::BatchError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefsSummary {
    pub processed: usize,
    pub with_references: usize,
    pub failed: usize,
}

/// Re-extract references in every processed artifact under `dir`.
///
/// Files are handled concurrently, at most `concurrency` at a time. A file
/// that cannot be read or written is counted as failed and left untouched.
pub async fn reextract_dir(
    dir: &Path,
    config: SectionizerConfig,
    concurrency: usize,
) -> Result<RefsSummary, BatchError> {
    let files = processed_files(dir)?;
    tracing::info!(dir = %dir.display(), files = files.len(), "re-extracting references");

    let config = Arc::new(config);
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(files.len());

    for path in files {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let config = Arc::clone(&config);
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            let file = path.clone();
            let result = tokio::task::spawn_blocking(move || reextract_file(&file, &config)).await;
            (path, result)
        }));
    }

    let mut summary = RefsSummary::default();
    for handle in handles {
        let Ok((path, result)) = handle.await else {
            summary.failed += 1;
            continue;
        };
        match result {
            Ok(Ok(found)) => {
                summary.processed += 1;
                if found {
                    summary.with_references += 1;
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "re-extraction failed");
                summary.failed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "re-extraction task panicked");
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        processed = summary.processed,
        with_references = summary.with_references,
        failed = summary.failed,
        "re-extraction finished"
    );
    Ok(summary)
}

/// Re-extract references in one processed artifact, rewriting it in place
/// only when the split changed. Returns whether the file has a reference
/// block afterwards.
pub fn reextract_file(path: &Path, config: &SectionizerConfig) -> Result<bool, BatchError> {
    let content = std::fs::read_to_string(path)?;
    let mut map: SectionMap = serde_json::from_str(&content)?;
    let before = map.clone();
    let found = reextract_map(&mut map, config);
    if map != before {
        write_json_atomic(path, &map)?;
    } else {
        tracing::debug!(path = %path.display(), "reference split unchanged");
    }
    Ok(found)
}

/// Merge `References` back onto the last section and split it again.
///
/// If the new split finds nothing, the merged text stays on the last section
/// and `References` disappears. A map holding nothing but `References` is
/// left as it is.
pub fn reextract_map(map: &mut SectionMap, config: &SectionizerConfig) -> bool {
    let previous = map.remove(REFERENCES_KEY);
    let Some((heading, body)) = map.last().map(|(h, b)| (h.to_string(), b.to_string())) else {
        if let Some(refs) = previous {
            map.insert(REFERENCES_KEY.to_string(), refs);
            return true;
        }
        return false;
    };

    let merged = match previous {
        Some(refs) if body.trim().is_empty() => refs,
        Some(refs) => format!("{}\n\n{}", body, refs),
        None => body,
    };

    let split = extract_references_with_config(&merged, config);
    match split.references {
        Some(refs) => {
            if split.content.trim().is_empty() {
                map.remove(&heading);
            } else {
                map.insert(heading, split.content);
            }
            map.insert(REFERENCES_KEY.to_string(), refs);
            true
        }
        None => {
            map.insert(heading, merged);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sectionizer_core::SectionizerConfigBuilder;

    const REF_A: &str = "Smith, J. 2020 Tides and storms, Journal of Seas";
    const REF_B: &str = "Lee, K. 2019 Storm tracks in the north, Geophys. Res. Lett.";

    fn map(entries: &[(&str, &str)]) -> SectionMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_existing_split_is_reproduced() {
        let refs = format!("{REF_A}\n\n{REF_B}");
        let mut m = map(&[
            ("Intro", "Sea levels rise."),
            ("Discussion", "Coastal change is accelerating."),
            (REFERENCES_KEY, refs.as_str()),
        ]);
        let before = m.clone();
        assert!(reextract_map(&mut m, &SectionizerConfig::default()));
        assert_eq!(m, before);
    }

    #[test]
    fn test_references_restored_when_nothing_found() {
        let mut m = map(&[
            ("Discussion", "Coastal change is accelerating."),
            (REFERENCES_KEY, "Sea ice declines."),
        ]);
        assert!(!reextract_map(&mut m, &SectionizerConfig::default()));
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["Discussion"]);
        assert_eq!(
            m.get("Discussion"),
            Some("Coastal change is accelerating.\n\nSea ice declines.")
        );
    }

    #[test]
    fn test_new_references_found_in_last_section() {
        let body = format!("Coastal change is accelerating.\n\n{REF_A}");
        let mut m = map(&[("Discussion", body.as_str())]);
        assert!(reextract_map(&mut m, &SectionizerConfig::default()));
        assert_eq!(m.get("Discussion"), Some("Coastal change is accelerating."));
        assert_eq!(m.get(REFERENCES_KEY), Some(REF_A));
    }

    #[test]
    fn test_stricter_threshold_drops_block() {
        let config = SectionizerConfigBuilder::new()
            .reference_threshold(50)
            .build()
            .unwrap();
        let mut m = map(&[("Discussion", "Coastal change."), (REFERENCES_KEY, REF_A)]);
        assert!(!reextract_map(&mut m, &config));
        assert!(!m.contains_key(REFERENCES_KEY));
    }

    #[test]
    fn test_reextract_file_rewrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_processed.json");
        let body = format!("Coastal change is accelerating.\n\n{REF_A}");
        let m = map(&[("Discussion", body.as_str())]);
        std::fs::write(&path, serde_json::to_string(&m).unwrap()).unwrap();

        assert!(reextract_file(&path, &SectionizerConfig::default()).unwrap());
        let written: SectionMap =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.keys().collect::<Vec<_>>(), vec!["Discussion", REFERENCES_KEY]);
    }

    #[test]
    fn test_reextract_file_leaves_unchanged_split_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_processed.json");
        let original = format!(
            "{{\n  \"Discussion\":   \"Coastal change is accelerating.\",\n  \"{REFERENCES_KEY}\": \"{REF_A}\"\n}}"
        );
        std::fs::write(&path, &original).unwrap();

        assert!(reextract_file(&path, &SectionizerConfig::default()).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }
}
