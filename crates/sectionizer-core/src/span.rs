use crate::heading::HeadingCandidate;

/// Body lines belonging to one heading: the half-open range
/// `[start_line, end_line)` between the heading and the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
    pub heading: HeadingCandidate,
}

impl Span {
    /// The body lines of this span.
    pub fn body<'a, 'b>(&self, lines: &'b [&'a str]) -> &'b [&'a str] {
        let end = self.end_line.min(lines.len());
        let start = self.start_line.min(end);
        &lines[start..end]
    }
}

/// Turn ordered heading positions into contiguous spans.
///
/// The last span runs to `line_count`. An empty heading list yields no spans;
/// the whole-document fallback is the caller's decision.
pub fn build_spans(headings: Vec<HeadingCandidate>, line_count: usize) -> Vec<Span> {
    let boundaries: Vec<usize> = headings
        .iter()
        .skip(1)
        .map(|h| h.line_index)
        .chain(std::iter::once(line_count))
        .collect();

    headings
        .into_iter()
        .zip(boundaries)
        .map(|(heading, end_line)| Span {
            start_line: heading.line_index + 1,
            end_line,
            heading,
        })
        .collect()
}
