//! Report of headings that still appear after a conclusion section.
//!
//! Helps spot keywords missing from the halt lists: anything listed here made
//! it into processed output although it follows a conclusion heading.

use std::collections::HashMap;
use std::path::Path;

use sectionizer_core::SectionMap;

use crate::collect::processed_files;
use crate::BatchError;

const CONCLUSION_MARKER: &str = "conclusion";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyReport {
    pub files_scanned: usize,
    /// Heading and number of files it followed a conclusion in; most frequent
    /// first, ties by heading.
    pub counts: Vec<(String, usize)>,
}

/// Headings following the first conclusion-like heading of `map`.
pub fn post_conclusion_keys(map: &SectionMap) -> Vec<&str> {
    map.keys()
        .skip_while(|k| !k.to_lowercase().contains(CONCLUSION_MARKER))
        .skip(1)
        .collect()
}

/// Scan processed artifacts in `dir` and count post-conclusion headings.
///
/// Files that cannot be read or parsed are skipped.
pub fn scan_dir(dir: &Path) -> Result<KeyReport, BatchError> {
    let files = processed_files(dir)?;
    let mut counts: HashMap<String, usize> = HashMap::new();

    for path in &files {
        let map = match std::fs::read_to_string(path)
            .map_err(BatchError::from)
            .and_then(|c| serde_json::from_str::<SectionMap>(&c).map_err(BatchError::from))
        {
            Ok(map) => map,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping unreadable artifact");
                continue;
            }
        };
        for key in post_conclusion_keys(&map) {
            *counts.entry(key.to_string()).or_default() += 1;
        }
    }

    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    Ok(KeyReport {
        files_scanned: files.len(),
        counts,
    })
}

impl KeyReport {
    /// Render the report as a markdown table.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# Post-Conclusion Dictionary Keys\n\n");
        out.push_str(&format!("Scanned {} files.\n", self.files_scanned));
        out.push_str(&format!(
            "Found {} unique keys appearing after 'conclusion' sections.\n\n",
            self.counts.len()
        ));
        out.push_str("| Key | Frequency |\n| --- | --- |\n");
        for (key, count) in &self.counts {
            out.push_str(&format!("| {} | {} |\n", key.replace('|', "\\|"), count));
        }
        out
    }
}
