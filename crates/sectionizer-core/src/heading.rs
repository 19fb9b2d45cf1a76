use serde::{Deserialize, Serialize};

/// Spacing/shape rule deciding whether a line is a heading candidate.
///
/// A line qualifies when its word count lies in `[min_words, max_words)`,
/// the `blank_before` lines above it are blank and the `blank_after` lines
/// below it are blank. Positions outside the document count as blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingRule {
    pub min_words: usize,
    /// Exclusive upper bound.
    pub max_words: usize,
    pub blank_before: usize,
    pub blank_after: usize,
}

impl Default for HeadingRule {
    fn default() -> Self {
        Self {
            min_words: 1,
            max_words: 15,
            blank_before: 2,
            blank_after: 1,
        }
    }
}

/// A line flagged as a likely heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadingCandidate {
    pub line_index: usize,
    /// The trimmed line text.
    pub text: String,
}

/// Flag heading candidates in `lines`, in line order.
pub fn detect_headings(lines: &[&str], rule: &HeadingRule) -> Vec<HeadingCandidate> {
    let is_blank = |i: isize| -> bool {
        if i < 0 || i as usize >= lines.len() {
            return true;
        }
        lines[i as usize].trim().is_empty()
    };

    let mut candidates = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        let words = line.split_whitespace().count();
        if words < rule.min_words || words >= rule.max_words {
            continue;
        }

        let i = index as isize;
        let blank_above = (1..=rule.blank_before as isize).all(|k| is_blank(i - k));
        let blank_below = (1..=rule.blank_after as isize).all(|k| is_blank(i + k));
        if blank_above && blank_below {
            candidates.push(HeadingCandidate {
                line_index: index,
                text: line.trim().to_string(),
            });
        }
    }
    candidates
}

/// Drop every candidate before the first one whose text is the anchor
/// (case-insensitive, trailing `:`/`.` ignored).
///
/// Without an anchor match the candidates are returned unchanged.
pub fn truncate_at_abstract(
    candidates: Vec<HeadingCandidate>,
    anchor: &str,
) -> Vec<HeadingCandidate> {
    let position = candidates.iter().position(|c| {
        c.text
            .trim_end_matches([':', '.'])
            .trim()
            .eq_ignore_ascii_case(anchor)
    });

    match position {
        Some(first) => candidates.into_iter().skip(first).collect(),
        None => candidates,
    }
}
