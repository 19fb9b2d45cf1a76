//! Heuristic separation of a trailing reference block from section content.
//!
//! Each paragraph gets an integer score from a fixed sequence of signals.
//! Paragraphs are then walked backward from the end of the text; the earliest
//! paragraph still reachable within the patience budget marks the start of the
//! reference block.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::SectionizerConfig;

/// Weights of the reference-likeness signals.
///
/// Positive weights push a paragraph toward the reference block, negative
/// ones toward content. `gate` is the running score below which prose and
/// first-person penalties apply; `long_sentence_gate` plays the same role
/// for the long-sentence penalty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceWeights {
    pub doi: i32,
    pub access_phrase: i32,
    pub citation_marker: i32,
    pub et_al: i32,
    pub preprint: i32,
    pub journal_term: i32,
    pub strong_year: i32,
    pub weak_year: i32,
    pub volume_pages: i32,
    pub surname_initial: i32,
    pub initial_surname: i32,
    pub prose_marker: i32,
    pub first_person: i32,
    pub caption: i32,
    pub long_sentence: i32,
    pub initials_ratio: i32,
    pub gate: i32,
    pub long_sentence_gate: i32,
}

impl Default for ReferenceWeights {
    fn default() -> Self {
        Self {
            doi: 8,
            access_phrase: 4,
            citation_marker: 6,
            et_al: 4,
            preprint: 5,
            journal_term: 3,
            strong_year: 2,
            weak_year: 1,
            volume_pages: 3,
            surname_initial: 3,
            initial_surname: 1,
            prose_marker: -5,
            first_person: -3,
            caption: -10,
            long_sentence: -2,
            initials_ratio: 3,
            gate: 5,
            long_sentence_gate: 2,
        }
    }
}

/// Share of initial-like tokens above which a paragraph looks like an author list.
const INITIALS_RATIO_THRESHOLD: f64 = 0.10;
/// Word count above which an unremarkable sentence counts as prose.
const LONG_SENTENCE_WORDS: usize = 15;

const PREPRINT_TERMS: &[&str] = &["arxiv", "ssrn", "proc."];

const ACCESS_PHRASES: &[&str] = &["retrieved from", "accessed:", "accessed,", "available at:"];

const JOURNAL_TERMS: &[&str] = &[
    "journal of",
    "trans.",
    "intl.",
    "conf.",
    "univ.",
    "press",
    "adv.",
    "sci.",
    "lett.",
    "rev.",
    "res.",
    "phys.",
    "chem.",
    "biol.",
    "geophys.",
    "ann.",
    "bull.",
    "j.",
    "am.",
    "soc.",
    "ieee",
    "acm",
    "nature",
    "science",
    "cell",
    "publishing",
    "publisher",
    "editors",
    "ed.",
    "eds.",
    "ltd",
    "inc",
    "literature cited",
    "ph.d. thesis",
    "doctoral thesis",
    "springer",
];

const PROSE_MARKERS: &[&str] = &[
    "however",
    "therefore",
    "although",
    "furthermore",
    "in conclusion",
    "we found",
    "results show",
    "discussion",
    "abstract",
    "introduction",
    "as shown in",
    "the figure",
    "the table",
    "section",
];

static DOI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"10\.\d{4,}/").unwrap());
static CITATION_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:\[\d+\]|\d+\.)").unwrap());
static STRONG_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\(,]\s*(?:19|20)\d{2}[\)\.]|\b(?:19|20)\d{2}[a-z]?\s*[\)\.]").unwrap()
});
static WEAK_YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());
static VOLUME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:vol\.|no\.|pp\.|p\.)\s*\d+").unwrap());
static PAGE_RANGE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\s*:\s*\d+[-–]\d+").unwrap());
static SURNAME_INITIAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-z]+,\s+[A-Z]\.").unwrap());
static INITIAL_SURNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]\.(?:[A-Z]\.)?\s+[A-Z][a-z]+").unwrap());
static ABBREVIATION_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:fig\.|table|vol\.|p\.|pp\.|u\.s\.)").unwrap());
static FIRST_PERSON_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:we|our)\b").unwrap());
static CAPTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:figure|fig\.|table|tab\.)\s*\d+").unwrap());
static DEFAULT_PARAGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\n+").unwrap());

/// A scoring signal that fired on a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Doi,
    AccessPhrase,
    CitationMarker,
    EtAl,
    Preprint,
    JournalTerm,
    StrongYear,
    WeakYear,
    VolumePages,
    SurnameInitial,
    InitialSurname,
    ProseMarker,
    FirstPerson,
    Caption,
    LongSentence,
    InitialsRatio,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Doi => "doi",
            Signal::AccessPhrase => "access_phrase",
            Signal::CitationMarker => "citation_marker",
            Signal::EtAl => "et_al",
            Signal::Preprint => "preprint",
            Signal::JournalTerm => "journal_term",
            Signal::StrongYear => "strong_year",
            Signal::WeakYear => "weak_year",
            Signal::VolumePages => "volume_pages",
            Signal::SurnameInitial => "surname_initial",
            Signal::InitialSurname => "initial_surname",
            Signal::ProseMarker => "prose_marker",
            Signal::FirstPerson => "first_person",
            Signal::Caption => "caption",
            Signal::LongSentence => "long_sentence",
            Signal::InitialsRatio => "initials_ratio",
        }
    }
}

/// Signals that fired on one paragraph, with their contributions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub signals: Vec<(Signal, i32)>,
    pub total: i32,
}

impl ScoreBreakdown {
    fn add(&mut self, signal: Signal, weight: i32) {
        self.signals.push((signal, weight));
        self.total += weight;
    }
}

/// Reference-likeness of a paragraph with default weights.
pub fn score(paragraph: &str) -> i32 {
    score_with_weights(paragraph, &ReferenceWeights::default())
}

pub fn score_with_weights(paragraph: &str, weights: &ReferenceWeights) -> i32 {
    score_breakdown(paragraph, weights).total
}

/// Score a paragraph, recording each signal that fired.
///
/// Signals are evaluated in a fixed order; the gated penalties look at the
/// running total at the point they are reached.
pub fn score_breakdown(paragraph: &str, weights: &ReferenceWeights) -> ScoreBreakdown {
    let text = paragraph.trim();
    let lower = text.to_lowercase();
    let mut b = ScoreBreakdown::default();

    if DOI_RE.is_match(text) {
        b.add(Signal::Doi, weights.doi);
    }
    if text.contains("http://")
        || text.contains("https://")
        || ACCESS_PHRASES.iter().any(|p| lower.contains(p))
    {
        b.add(Signal::AccessPhrase, weights.access_phrase);
    }
    if CITATION_MARKER_RE.is_match(text) {
        b.add(Signal::CitationMarker, weights.citation_marker);
    }
    if lower.contains("et al.") || lower.contains("et al,") {
        b.add(Signal::EtAl, weights.et_al);
    }
    if PREPRINT_TERMS.iter().any(|t| lower.contains(t)) {
        b.add(Signal::Preprint, weights.preprint);
    }
    if JOURNAL_TERMS.iter().any(|t| lower.contains(t)) {
        b.add(Signal::JournalTerm, weights.journal_term);
    }

    if STRONG_YEAR_RE.is_match(text) {
        b.add(Signal::StrongYear, weights.strong_year);
    } else if WEAK_YEAR_RE.is_match(text) {
        b.add(Signal::WeakYear, weights.weak_year);
    }

    if VOLUME_RE.is_match(&lower) || PAGE_RANGE_RE.is_match(text) {
        b.add(Signal::VolumePages, weights.volume_pages);
    }
    if SURNAME_INITIAL_RE.is_match(text) {
        b.add(Signal::SurnameInitial, weights.surname_initial);
    }
    if INITIAL_SURNAME_RE.is_match(text) && !ABBREVIATION_START_RE.is_match(&lower) {
        b.add(Signal::InitialSurname, weights.initial_surname);
    }

    if PROSE_MARKERS.iter().any(|m| lower.contains(m)) && b.total < weights.gate {
        b.add(Signal::ProseMarker, weights.prose_marker);
    }
    if FIRST_PERSON_RE.is_match(&lower) && b.total < weights.gate {
        b.add(Signal::FirstPerson, weights.first_person);
    }
    if CAPTION_RE.is_match(&lower) {
        b.add(Signal::Caption, weights.caption);
    }
    if text.split_whitespace().count() > LONG_SENTENCE_WORDS
        && text.ends_with('.')
        && b.total < weights.long_sentence_gate
    {
        b.add(Signal::LongSentence, weights.long_sentence);
    }
    if initials_ratio(text) > INITIALS_RATIO_THRESHOLD {
        b.add(Signal::InitialsRatio, weights.initials_ratio);
    }

    b
}

/// Share of single-space-separated tokens that are one character long or
/// two characters ending in a period.
fn initials_ratio(text: &str) -> f64 {
    let tokens: Vec<&str> = text.split(' ').collect();
    let initials = tokens
        .iter()
        .filter(|t| {
            let len = t.chars().count();
            len == 1 || (len == 2 && t.ends_with('.'))
        })
        .count();
    initials as f64 / tokens.len() as f64
}

/// Section content with any trailing reference block split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSplit {
    pub content: String,
    /// `None` when no paragraph reached the threshold.
    pub references: Option<String>,
}

/// Split `text` into content and references with default settings.
pub fn extract_references(text: &str) -> ReferenceSplit {
    extract_references_with_config(text, &SectionizerConfig::default())
}

/// Split `text` into content and references.
///
/// Paragraphs are joined back with a blank line on both sides of the split, so
/// running this again on the returned content finds no further references.
pub fn extract_references_with_config(text: &str, config: &SectionizerConfig) -> ReferenceSplit {
    let chunks = split_paragraphs(text, config);
    match find_reference_start(&chunks, config) {
        None => ReferenceSplit {
            content: text.to_string(),
            references: None,
        },
        Some(start) => ReferenceSplit {
            content: chunks[..start].join("\n\n"),
            references: Some(chunks[start..].join("\n\n")),
        },
    }
}

/// A paragraph's score and whether it landed in the reference block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParagraphScore {
    pub index: usize,
    pub text: String,
    pub breakdown: ScoreBreakdown,
    pub in_references: bool,
}

/// Score every non-blank paragraph of `text` for inspection.
pub fn explain(text: &str, config: &SectionizerConfig) -> Vec<ParagraphScore> {
    let chunks = split_paragraphs(text, config);
    let start = find_reference_start(&chunks, config).unwrap_or(chunks.len());

    chunks
        .iter()
        .enumerate()
        .filter(|(_, chunk)| !chunk.trim().is_empty())
        .map(|(index, chunk)| ParagraphScore {
            index,
            text: chunk.trim().to_string(),
            breakdown: score_breakdown(chunk, &config.weights),
            in_references: index >= start,
        })
        .collect()
}

fn split_paragraphs<'a>(text: &'a str, config: &SectionizerConfig) -> Vec<&'a str> {
    let re = config
        .paragraph_split_re
        .as_ref()
        .unwrap_or(&*DEFAULT_PARAGRAPH_RE);
    re.split(text).collect()
}

/// Backward walk over paragraphs. Returns the index of the first reference
/// paragraph, if any paragraph scored at or above the threshold.
fn find_reference_start(chunks: &[&str], config: &SectionizerConfig) -> Option<usize> {
    let mut start = None;
    let mut misses = 0usize;

    for (index, chunk) in chunks.iter().enumerate().rev() {
        let chunk = chunk.trim();
        if chunk.is_empty() {
            continue;
        }

        let score = score_with_weights(chunk, &config.weights);
        if score >= config.reference_threshold {
            start = Some(index);
            misses = 0;
        } else {
            misses += 1;
            if misses > config.patience {
                break;
            }
        }
    }

    if let Some(index) = start {
        tracing::debug!(paragraphs = chunks.len(), start = index, "reference block found");
    }
    start
}
