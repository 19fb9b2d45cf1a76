use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Separator placed between retained body lines.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Collapse runs of two spaces left behind by PDF text extraction.
pub fn collapse_double_spaces(text: &str) -> String {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());
    RE.replace_all(text, " ").into_owned()
}

/// Canonical decomposition (NFD) followed by HTML entity unescaping.
///
/// - `"caf\u{e9}"` → `"cafe\u{301}"`
/// - `"heat &amp; drought"` → `"heat & drought"`
pub fn normalize_text(text: &str) -> String {
    let decomposed: String = text.nfd().collect();
    html_escape::decode_html_entities(&decomposed).into_owned()
}

/// Join retained body lines into one normalized section body.
pub fn assemble_body<S: AsRef<str>>(lines: &[S]) -> String {
    let joined = lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join(PARAGRAPH_SEPARATOR);
    normalize_text(&collapse_double_spaces(&joined))
}
