//! Section classification state machine.
//!
//! Spans are walked once, in reading order. Each heading is matched against a
//! keyword table that decides whether its span is kept, dropped on its own, kept
//! as the last section, or cut off together with everything after it.

use crate::config::SectionizerConfig;
use crate::document::{RejectedFragment, SectionMap};
use crate::lang::LanguageDetector;
use crate::line::{is_english, is_textually_valid};
use crate::span::Span;
use crate::text_processing::assemble_body;

/// Headings whose span is dropped on its own.
pub(crate) const DEFAULT_DROP_LOCAL: &[&str] = &[
    "abstract",
    "caption",
    "figure",
    "table",
    "author contribution",
    "author affiliation",
    "keyword",
    "disclaimer",
];

/// Headings kept as the final section of the document.
pub(crate) const DEFAULT_KEEP_THEN_HALT: &[&str] = &["conclusion", "concluding"];

/// Headings that, with every span after them, never reach the output.
pub(crate) const DEFAULT_HALT_AND_DROP: &[&str] = &[
    "acknowledgment",
    "acknowledgement",
    "reference",
    "bibliography",
    "literature cited",
    "works cited",
    "data availability",
    "code availability",
    "funding",
];

/// What happens to a span, decided by its heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionCategory {
    /// Validated and kept if the body passes.
    Keep,
    /// Validated for bookkeeping, then removed from the output.
    DropLocal,
    /// Kept, and every later span is rejected.
    KeepThenHalt,
    /// Rejected along with every later span.
    HaltAndDrop,
}

/// Keyword → category table.
///
/// A heading matches a keyword when its lower-cased text contains the keyword
/// as a substring. When several categories match, `HaltAndDrop` wins over
/// `KeepThenHalt`, which wins over `DropLocal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
    drop_local: Vec<String>,
    keep_then_halt: Vec<String>,
    halt_and_drop: Vec<String>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self::new(
            &owned(DEFAULT_DROP_LOCAL),
            &owned(DEFAULT_KEEP_THEN_HALT),
            &owned(DEFAULT_HALT_AND_DROP),
        )
    }
}

impl KeywordTable {
    pub fn new(drop_local: &[String], keep_then_halt: &[String], halt_and_drop: &[String]) -> Self {
        let normalize = |list: &[String]| {
            list.iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            drop_local: normalize(drop_local),
            keep_then_halt: normalize(keep_then_halt),
            halt_and_drop: normalize(halt_and_drop),
        }
    }

    pub fn classify(&self, heading: &str) -> SectionCategory {
        let lower = heading.to_lowercase();
        let hit = |list: &[String]| list.iter().any(|k| lower.contains(k.as_str()));

        if hit(&self.halt_and_drop) {
            SectionCategory::HaltAndDrop
        } else if hit(&self.keep_then_halt) {
            SectionCategory::KeepThenHalt
        } else if hit(&self.drop_local) {
            SectionCategory::DropLocal
        } else {
            SectionCategory::Keep
        }
    }

    /// `true` if the heading contains any drop-local keyword.
    pub fn contains_drop_local(&self, heading: &str) -> bool {
        let lower = heading.to_lowercase();
        self.drop_local.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// Sections and audit trail produced by one pass over a document's spans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionOutcome {
    pub sections: SectionMap,
    pub rejected: Vec<RejectedFragment>,
}

/// Run the state machine over `spans`.
pub fn classify_spans(
    lines: &[&str],
    spans: &[Span],
    config: &SectionizerConfig,
    detector: &dyn LanguageDetector,
) -> SectionOutcome {
    let mut outcome = SectionOutcome::default();

    for (index, span) in spans.iter().enumerate() {
        let heading = span.heading.text.as_str();
        let category = config.keywords.classify(heading);
        tracing::debug!(heading, ?category, "classified span");

        match category {
            SectionCategory::HaltAndDrop => {
                reject_spans(lines, &spans[index..], &mut outcome.rejected);
                break;
            }
            SectionCategory::KeepThenHalt => {
                let body = assemble_span_body(lines, span, config, detector, &mut outcome.rejected);
                outcome.sections.insert(heading.to_string(), body);
                reject_spans(lines, &spans[index + 1..], &mut outcome.rejected);
                break;
            }
            SectionCategory::Keep | SectionCategory::DropLocal => {
                let body = assemble_span_body(lines, span, config, detector, &mut outcome.rejected);
                if is_english(&body, detector)
                    && is_textually_valid(&body, config.validity_threshold)
                {
                    outcome.sections.insert(heading.to_string(), body);
                } else {
                    tracing::debug!(heading, "span body failed validation");
                    outcome.rejected.push(RejectedFragment::Span {
                        heading: heading.to_string(),
                        body,
                    });
                }
            }
        }
    }

    // Headings that slipped past the table (e.g. "Results and Table 1") still
    // must not carry a drop-local keyword.
    let removed = outcome
        .sections
        .extract_if_not(|heading| !config.keywords.contains_drop_local(heading));
    for (heading, body) in removed {
        outcome.rejected.push(RejectedFragment::Span { heading, body });
    }

    outcome
}

/// Filter a span's body lines and assemble the survivors.
///
/// Lines repeating the heading and blank lines are skipped silently; lines
/// failing the line classifier are recorded one by one.
fn assemble_span_body(
    lines: &[&str],
    span: &Span,
    config: &SectionizerConfig,
    detector: &dyn LanguageDetector,
    rejected: &mut Vec<RejectedFragment>,
) -> String {
    let heading = span.heading.text.as_str();
    let mut kept: Vec<&str> = Vec::new();

    for line in span.body(lines) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == heading {
            continue;
        }

        let valid = is_textually_valid(trimmed, config.validity_threshold)
            && (!config.check_line_language || is_english(trimmed, detector));
        if valid {
            kept.push(trimmed);
        } else {
            rejected.push(RejectedFragment::Line {
                heading: heading.to_string(),
                text: trimmed.to_string(),
            });
        }
    }

    assemble_body(&kept)
}

fn reject_spans(lines: &[&str], spans: &[Span], rejected: &mut Vec<RejectedFragment>) {
    for span in spans {
        rejected.push(RejectedFragment::Span {
            heading: span.heading.text.clone(),
            body: span.body(lines).join("\n").trim().to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SectionizerConfigBuilder;
    use crate::heading::HeadingCandidate;
    use crate::span::build_spans;

    /// Treats any text containing a letter as English.
    struct LettersAreEnglish;

    impl LanguageDetector for LettersAreEnglish {
        fn is_english(&self, text: &str) -> bool {
            text.chars().any(|c| c.is_alphabetic())
        }
    }

    /// Fixed verdict for every text.
    struct Always(bool);

    impl LanguageDetector for Always {
        fn is_english(&self, _text: &str) -> bool {
            self.0
        }
    }

    /// Flags anything containing a German article as foreign.
    struct NoGerman;

    impl LanguageDetector for NoGerman {
        fn is_english(&self, text: &str) -> bool {
            !text.split_whitespace().any(|w| matches!(w, "der" | "die" | "das" | "Der" | "Die" | "Das"))
        }
    }

    fn run(text: &str, headings: &[(usize, &str)]) -> SectionOutcome {
        run_with(text, headings, &SectionizerConfig::default(), &LettersAreEnglish)
    }

    fn run_with(
        text: &str,
        headings: &[(usize, &str)],
        config: &SectionizerConfig,
        detector: &dyn LanguageDetector,
    ) -> SectionOutcome {
        let lines: Vec<&str> = text.lines().collect();
        let candidates = headings
            .iter()
            .map(|(i, t)| HeadingCandidate {
                line_index: *i,
                text: t.to_string(),
            })
            .collect();
        let spans = build_spans(candidates, lines.len());
        classify_spans(&lines, &spans, config, detector)
    }

    #[test]
    fn test_keyword_table_substring_match() {
        let table = KeywordTable::default();
        assert_eq!(table.classify("Conclusions and Future Work"), SectionCategory::KeepThenHalt);
        assert_eq!(table.classify("Concluding Remarks"), SectionCategory::KeepThenHalt);
        assert_eq!(table.classify("REFERENCES"), SectionCategory::HaltAndDrop);
        assert_eq!(table.classify("Acknowledgements"), SectionCategory::HaltAndDrop);
        assert_eq!(table.classify("Data Availability Statement"), SectionCategory::HaltAndDrop);
        assert_eq!(table.classify("Figure 2"), SectionCategory::DropLocal);
        assert_eq!(table.classify("Keywords"), SectionCategory::DropLocal);
        assert_eq!(table.classify("Methods"), SectionCategory::Keep);
    }

    #[test]
    fn test_keyword_table_precedence() {
        let table = KeywordTable::default();
        assert_eq!(
            table.classify("Conclusion and Acknowledgments"),
            SectionCategory::HaltAndDrop
        );
        assert_eq!(table.classify("Conclusion Table"), SectionCategory::KeepThenHalt);
    }

    #[test]
    fn test_keep_sections_in_order() {
        let text = "Introduction\n\nIntro text here.\n\n\nMethods\n\nMethod text here.";
        let out = run(text, &[(0, "Introduction"), (5, "Methods")]);
        assert_eq!(out.sections.keys().collect::<Vec<_>>(), vec!["Introduction", "Methods"]);
        assert_eq!(out.sections.get("Introduction"), Some("Intro text here."));
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn test_invalid_lines_rejected_individually() {
        let text = "Results\n\nWarming was observed.\n12 34 56 78\nIt continued.";
        let out = run(text, &[(0, "Results")]);
        assert_eq!(
            out.sections.get("Results"),
            Some("Warming was observed.\n\nIt continued.")
        );
        assert_eq!(
            out.rejected,
            vec![RejectedFragment::Line {
                heading: "Results".into(),
                text: "12 34 56 78".into(),
            }]
        );
    }

    #[test]
    fn test_empty_keep_span_is_rejected_whole() {
        let text = "Results\n\n\n\nDiscussion\n\nSome text.";
        let out = run(text, &[(0, "Results"), (4, "Discussion")]);
        assert!(!out.sections.contains_key("Results"));
        assert!(matches!(
            &out.rejected[0],
            RejectedFragment::Span { heading, .. } if heading == "Results"
        ));
    }

    #[test]
    fn test_keep_then_halt_stops_scan() {
        let text = "Intro\n\nText a.\n\n\nConclusion\n\nText b.\n\n\nAppendix\n\nText c.";
        let out = run(text, &[(0, "Intro"), (5, "Conclusion"), (10, "Appendix")]);
        assert_eq!(out.sections.keys().collect::<Vec<_>>(), vec!["Intro", "Conclusion"]);
        assert_eq!(out.rejected.len(), 1);
        assert_eq!(out.rejected[0].heading(), "Appendix");
    }

    #[test]
    fn test_keep_then_halt_keeps_empty_body() {
        let text = "Conclusion\n\n99 99 99";
        let out = run(text, &[(0, "Conclusion")]);
        assert_eq!(out.sections.get("Conclusion"), Some(""));
    }

    #[test]
    fn test_halt_and_drop_rejects_rest() {
        let text = "Intro\n\nText a.\n\n\nReferences\n\n[1] A.\n\n\nAppendix\n\nText c.";
        let out = run(text, &[(0, "Intro"), (5, "References"), (10, "Appendix")]);
        assert_eq!(out.sections.keys().collect::<Vec<_>>(), vec!["Intro"]);
        let headings: Vec<_> = out.rejected.iter().map(|r| r.heading()).collect();
        assert_eq!(headings, vec!["References", "Appendix"]);
    }

    #[test]
    fn test_drop_local_removed_by_post_pass() {
        let text = "Abstract\n\nSummary text.\n\n\nIntro\n\nIntro text.";
        let out = run(text, &[(0, "Abstract"), (5, "Intro")]);
        assert_eq!(out.sections.keys().collect::<Vec<_>>(), vec!["Intro"]);
        assert!(matches!(
            &out.rejected[0],
            RejectedFragment::Span { heading, body } if heading == "Abstract" && body == "Summary text."
        ));
    }

    #[test]
    fn test_duplicate_heading_overwrites() {
        let text = "Notes\n\nFirst.\n\n\nNotes\n\nSecond.";
        let out = run(text, &[(0, "Notes"), (5, "Notes")]);
        assert_eq!(out.sections.len(), 1);
        assert_eq!(out.sections.get("Notes"), Some("Second."));
    }

    #[test]
    fn test_foreign_line_rejected_individually() {
        let text = "Introduction\n\nSea levels rise.\nDer Ozean wird wärmer.\nStorms follow.";
        let out = run_with(
            text,
            &[(0, "Introduction")],
            &SectionizerConfig::default(),
            &NoGerman,
        );
        assert_eq!(
            out.sections.get("Introduction"),
            Some("Sea levels rise.\n\nStorms follow.")
        );
        assert_eq!(
            out.rejected,
            vec![RejectedFragment::Line {
                heading: "Introduction".into(),
                text: "Der Ozean wird wärmer.".into(),
            }]
        );
    }

    #[test]
    fn test_line_language_check_can_be_disabled() {
        let config = SectionizerConfigBuilder::new()
            .check_line_language(false)
            .build()
            .unwrap();
        let text = "Introduction\n\nSea levels rise.\nDer Ozean wird wärmer.";
        let out = run_with(text, &[(0, "Introduction")], &config, &NoGerman);
        assert!(out.sections.is_empty());
        assert!(out.rejected.iter().all(|r| matches!(r, RejectedFragment::Span { .. })));
    }

    #[test]
    fn test_non_english_body_rejects_whole_span() {
        let config = SectionizerConfigBuilder::new()
            .check_line_language(false)
            .build()
            .unwrap();
        let text = "Results\n\nWarming was observed.\nIt continued.";
        let out = run_with(text, &[(0, "Results")], &config, &Always(false));
        assert!(out.sections.is_empty());
        assert_eq!(
            out.rejected,
            vec![RejectedFragment::Span {
                heading: "Results".into(),
                body: "Warming was observed.\n\nIt continued.".into(),
            }]
        );
    }
}
