use regex::Regex;
use thiserror::Error;

use crate::classify::{
    DEFAULT_DROP_LOCAL, DEFAULT_HALT_AND_DROP, DEFAULT_KEEP_THEN_HALT, KeywordTable,
};
use crate::heading::HeadingRule;
use crate::line::DEFAULT_VALIDITY_THRESHOLD;
use crate::references::ReferenceWeights;

/// Default score a paragraph needs to count as part of the reference block.
pub const DEFAULT_REFERENCE_THRESHOLD: i32 = 1;
/// Default number of consecutive sub-threshold paragraphs tolerated by the
/// backward reference walk.
pub const DEFAULT_PATIENCE: usize = 2;
/// Default heading that anchors front-matter truncation.
pub const DEFAULT_ABSTRACT_ANCHOR: &str = "abstract";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid regex: {0}")]
    Regex(#[from] regex::Error),
    #[error("invalid setting `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Controls how a list of patterns/values is overridden from its defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    /// Resolve this override against the given defaults.
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }
}

/// Configuration for the sectionizing pipeline.
///
/// Use [`SectionizerConfigBuilder`] to construct anything other than the
/// defaults; it validates numeric settings and compiles patterns up front.
#[derive(Debug, Clone)]
pub struct SectionizerConfig {
    // ── heading.rs ──
    pub(crate) heading_rule: HeadingRule,
    /// Heading (lower-cased) before which every candidate is front matter.
    pub(crate) abstract_anchor: String,

    // ── classify.rs ──
    pub(crate) keywords: KeywordTable,
    /// Require each body line to be English, not only the assembled body.
    pub(crate) check_line_language: bool,

    // ── line.rs ──
    pub(crate) validity_threshold: f64,

    // ── references.rs ──
    pub(crate) weights: ReferenceWeights,
    pub(crate) reference_threshold: i32,
    pub(crate) patience: usize,
    /// Regex splitting text into paragraphs (default: two or more newlines).
    pub(crate) paragraph_split_re: Option<Regex>,
}

impl Default for SectionizerConfig {
    fn default() -> Self {
        Self {
            heading_rule: HeadingRule::default(),
            abstract_anchor: DEFAULT_ABSTRACT_ANCHOR.to_string(),
            keywords: KeywordTable::default(),
            check_line_language: true,
            validity_threshold: DEFAULT_VALIDITY_THRESHOLD,
            weights: ReferenceWeights::default(),
            reference_threshold: DEFAULT_REFERENCE_THRESHOLD,
            patience: DEFAULT_PATIENCE,
            paragraph_split_re: None,
        }
    }
}

impl SectionizerConfig {
    pub fn heading_rule(&self) -> &HeadingRule {
        &self.heading_rule
    }

    pub fn keywords(&self) -> &KeywordTable {
        &self.keywords
    }

    pub fn reference_threshold(&self) -> i32 {
        self.reference_threshold
    }

    pub fn patience(&self) -> usize {
        self.patience
    }
}

/// Builder for [`SectionizerConfig`].
///
/// Accepts plain values and string patterns; [`build()`](Self::build) fails
/// fast on an invalid regex or an inconsistent heading rule.
#[derive(Debug, Clone, Default)]
pub struct SectionizerConfigBuilder {
    min_heading_words: Option<usize>,
    max_heading_words: Option<usize>,
    blank_lines_before: Option<usize>,
    blank_lines_after: Option<usize>,
    abstract_anchor: Option<String>,
    drop_local: ListOverride<String>,
    keep_then_halt: ListOverride<String>,
    halt_and_drop: ListOverride<String>,
    check_line_language: Option<bool>,
    validity_threshold: Option<f64>,
    weights: Option<ReferenceWeights>,
    reference_threshold: Option<i32>,
    patience: Option<usize>,
    paragraph_split_re: Option<String>,
}

impl SectionizerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Heading rule ──

    pub fn min_heading_words(mut self, n: usize) -> Self {
        self.min_heading_words = Some(n);
        self
    }

    /// Exclusive upper bound on heading word count.
    pub fn max_heading_words(mut self, n: usize) -> Self {
        self.max_heading_words = Some(n);
        self
    }

    pub fn blank_lines_before(mut self, n: usize) -> Self {
        self.blank_lines_before = Some(n);
        self
    }

    pub fn blank_lines_after(mut self, n: usize) -> Self {
        self.blank_lines_after = Some(n);
        self
    }

    pub fn abstract_anchor(mut self, anchor: &str) -> Self {
        self.abstract_anchor = Some(anchor.to_string());
        self
    }

    // ── Keyword lists ──

    pub fn set_drop_local_keywords(mut self, keywords: Vec<String>) -> Self {
        self.drop_local = ListOverride::Replace(keywords);
        self
    }

    pub fn add_drop_local_keyword(mut self, keyword: String) -> Self {
        push_keyword(&mut self.drop_local, keyword);
        self
    }

    pub fn set_keep_then_halt_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keep_then_halt = ListOverride::Replace(keywords);
        self
    }

    pub fn add_keep_then_halt_keyword(mut self, keyword: String) -> Self {
        push_keyword(&mut self.keep_then_halt, keyword);
        self
    }

    pub fn set_halt_and_drop_keywords(mut self, keywords: Vec<String>) -> Self {
        self.halt_and_drop = ListOverride::Replace(keywords);
        self
    }

    pub fn add_halt_and_drop_keyword(mut self, keyword: String) -> Self {
        push_keyword(&mut self.halt_and_drop, keyword);
        self
    }

    // ── Validity ──

    /// Per-line language check; on by default.
    pub fn check_line_language(mut self, enabled: bool) -> Self {
        self.check_line_language = Some(enabled);
        self
    }

    pub fn validity_threshold(mut self, threshold: f64) -> Self {
        self.validity_threshold = Some(threshold);
        self
    }

    // ── Reference walk ──

    pub fn reference_weights(mut self, weights: ReferenceWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn reference_threshold(mut self, threshold: i32) -> Self {
        self.reference_threshold = Some(threshold);
        self
    }

    pub fn patience(mut self, patience: usize) -> Self {
        self.patience = Some(patience);
        self
    }

    pub fn paragraph_split_regex(mut self, pattern: &str) -> Self {
        self.paragraph_split_re = Some(pattern.to_string());
        self
    }

    /// Validate settings, compile patterns and produce a [`SectionizerConfig`].
    pub fn build(self) -> Result<SectionizerConfig, ConfigError> {
        let defaults = HeadingRule::default();
        let heading_rule = HeadingRule {
            min_words: self.min_heading_words.unwrap_or(defaults.min_words),
            max_words: self.max_heading_words.unwrap_or(defaults.max_words),
            blank_before: self.blank_lines_before.unwrap_or(defaults.blank_before),
            blank_after: self.blank_lines_after.unwrap_or(defaults.blank_after),
        };
        if heading_rule.min_words == 0 {
            return Err(ConfigError::Invalid {
                name: "min_heading_words",
                reason: "must be at least 1".to_string(),
            });
        }
        if heading_rule.max_words <= heading_rule.min_words {
            return Err(ConfigError::Invalid {
                name: "max_heading_words",
                reason: format!(
                    "must exceed min_heading_words ({})",
                    heading_rule.min_words
                ),
            });
        }

        let validity_threshold = self
            .validity_threshold
            .unwrap_or(DEFAULT_VALIDITY_THRESHOLD);
        if !(validity_threshold > 0.0 && validity_threshold <= 1.0) {
            return Err(ConfigError::Invalid {
                name: "validity_threshold",
                reason: format!("{} is outside (0, 1]", validity_threshold),
            });
        }

        let owned = |defaults: &[&str]| -> Vec<String> {
            defaults.iter().map(|s| s.to_string()).collect()
        };
        let keywords = KeywordTable::new(
            &self.drop_local.resolve(&owned(DEFAULT_DROP_LOCAL)),
            &self.keep_then_halt.resolve(&owned(DEFAULT_KEEP_THEN_HALT)),
            &self.halt_and_drop.resolve(&owned(DEFAULT_HALT_AND_DROP)),
        );

        let paragraph_split_re = self
            .paragraph_split_re
            .map(|p| Regex::new(&p))
            .transpose()?;

        Ok(SectionizerConfig {
            heading_rule,
            abstract_anchor: self
                .abstract_anchor
                .map(|a| a.trim().to_lowercase())
                .unwrap_or_else(|| DEFAULT_ABSTRACT_ANCHOR.to_string()),
            keywords,
            check_line_language: self.check_line_language.unwrap_or(true),
            validity_threshold,
            weights: self.weights.unwrap_or_default(),
            reference_threshold: self
                .reference_threshold
                .unwrap_or(DEFAULT_REFERENCE_THRESHOLD),
            patience: self.patience.unwrap_or(DEFAULT_PATIENCE),
            paragraph_split_re,
        })
    }
}

fn push_keyword(list: &mut ListOverride<String>, keyword: String) {
    match list {
        ListOverride::Extend(v) | ListOverride::Replace(v) => v.push(keyword),
        ListOverride::Default => *list = ListOverride::Extend(vec![keyword]),
    }
}
