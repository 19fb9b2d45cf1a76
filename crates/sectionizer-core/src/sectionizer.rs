use std::path::Path;
use std::sync::Arc;

use crate::classify::{SectionOutcome, classify_spans};
use crate::config::SectionizerConfig;
use crate::document::{ClassifiedDocument, FALLBACK_HEADING, RawInput, SectionMap};
use crate::heading::{HeadingCandidate, detect_headings, truncate_at_abstract};
use crate::lang::{LanguageDetector, WhatlangDetector};
use crate::line::{is_english, is_textually_valid};
use crate::references::extract_references_with_config;
use crate::span::{Span, build_spans};
use crate::text_processing::{collapse_double_spaces, normalize_text};
use crate::SectionizeError;

/// A configurable document sectionizing pipeline.
///
/// Holds a [`SectionizerConfig`] and a language detector and exposes each
/// pipeline step as a method. Cloning is cheap; the detector is shared.
#[derive(Clone)]
pub struct Sectionizer {
    config: SectionizerConfig,
    detector: Arc<dyn LanguageDetector>,
}

impl Default for Sectionizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sectionizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sectionizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Sectionizer {
    /// Create a sectionizer with default configuration and `whatlang` detection.
    pub fn new() -> Self {
        Self::with_config(SectionizerConfig::default())
    }

    pub fn with_config(config: SectionizerConfig) -> Self {
        Self {
            config,
            detector: Arc::new(WhatlangDetector),
        }
    }

    /// Replace the language detector.
    pub fn with_detector(mut self, detector: Arc<dyn LanguageDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Heading candidates after front-matter truncation (steps 1-2).
    pub fn headings(&self, lines: &[&str]) -> Vec<HeadingCandidate> {
        let candidates = detect_headings(lines, &self.config.heading_rule);
        truncate_at_abstract(candidates, &self.config.abstract_anchor)
    }

    /// Body spans for a document (step 3).
    pub fn spans(&self, lines: &[&str]) -> Vec<Span> {
        build_spans(self.headings(lines), lines.len())
    }

    /// Run the classification state machine without reference extraction (step 4).
    pub fn classify(&self, text: &str) -> SectionOutcome {
        let lines: Vec<&str> = text.lines().collect();
        let spans = self.spans(&lines);
        classify_spans(&lines, &spans, &self.config, self.detector.as_ref())
    }

    /// Run the full pipeline on one document's text.
    ///
    /// A document without any heading falls back to a single `text` section.
    /// The trailing reference block is split off the last section; a section
    /// that consisted only of references is dropped.
    pub fn sectionize(&self, text: &str) -> Result<ClassifiedDocument, SectionizeError> {
        let lines: Vec<&str> = text.lines().collect();
        let spans = self.spans(&lines);

        let (mut sections, rejected, fallback) = if spans.is_empty() {
            tracing::info!(lines = lines.len(), "no headings found, using whole text");
            (self.fallback_sections(text)?, Vec::new(), true)
        } else {
            let outcome = classify_spans(&lines, &spans, &self.config, self.detector.as_ref());
            (outcome.sections, outcome.rejected, false)
        };

        if sections.is_empty() {
            return Err(SectionizeError::NoValidSections);
        }

        let references = self.split_last_section(&mut sections);
        if sections.is_empty() {
            return Err(SectionizeError::NoValidSections);
        }

        tracing::debug!(
            sections = sections.len(),
            rejected = rejected.len(),
            has_references = references.is_some(),
            "document sectionized"
        );

        Ok(ClassifiedDocument {
            sections,
            rejected,
            references,
            fallback,
        })
    }

    /// Read a document from disk and sectionize it.
    pub fn sectionize_path(&self, path: &Path) -> Result<ClassifiedDocument, SectionizeError> {
        let text = RawInput::from_path(path)?.into_text()?;
        self.sectionize(&text)
    }

    fn fallback_sections(&self, text: &str) -> Result<SectionMap, SectionizeError> {
        let body = normalize_text(&collapse_double_spaces(text.trim()));
        if !is_english(&body, self.detector.as_ref())
            || !is_textually_valid(&body, self.config.validity_threshold)
        {
            return Err(SectionizeError::NoValidSections);
        }
        let mut sections = SectionMap::new();
        sections.insert(FALLBACK_HEADING.to_string(), body);
        Ok(sections)
    }

    fn split_last_section(&self, sections: &mut SectionMap) -> Option<String> {
        let (heading, body) = sections
            .last()
            .map(|(h, b)| (h.to_string(), b.to_string()))?;
        let split = extract_references_with_config(&body, &self.config);
        let references = split.references?;

        if split.content.trim().is_empty() {
            tracing::debug!(heading = %heading, "last section was entirely references");
            sections.remove(&heading);
        } else {
            sections.insert(heading, split.content);
        }
        Some(references)
    }
}
