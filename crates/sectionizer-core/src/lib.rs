use thiserror::Error;

pub mod classify;
pub mod config;
pub mod document;
pub mod heading;
pub mod lang;
pub mod line;
pub mod references;
pub mod sectionizer;
pub mod span;
pub mod text_processing;

pub use classify::{KeywordTable, SectionCategory, SectionOutcome};
pub use config::{ConfigError, ListOverride, SectionizerConfig, SectionizerConfigBuilder};
pub use document::{
    ClassifiedDocument, FALLBACK_HEADING, REFERENCES_KEY, RawInput, RejectedFragment, SectionMap,
};
pub use heading::{HeadingCandidate, HeadingRule};
pub use lang::{LanguageDetector, WhatlangDetector};
pub use references::{
    ParagraphScore, ReferenceSplit, ReferenceWeights, ScoreBreakdown, Signal, extract_references,
    extract_references_with_config, score,
};
pub use sectionizer::Sectionizer;
pub use span::Span;

#[derive(Error, Debug)]
pub enum SectionizeError {
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("no valid sections")]
    NoValidSections,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sectionize one document's text with default settings.
///
/// Pipeline:
/// 1. Flag heading candidates by spacing and word count
/// 2. Drop front matter before the `Abstract` heading
/// 3. Cut the text into one span per heading
/// 4. Classify spans by heading keyword, filtering invalid lines
/// 5. Split a trailing reference block off the last section
pub fn sectionize(text: &str) -> Result<ClassifiedDocument, SectionizeError> {
    Sectionizer::new().sectionize(text)
}
