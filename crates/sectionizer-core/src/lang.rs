use whatlang::Lang;

/// Trait for language identification backends.
///
/// Implementors answer a single question; the line classifier in
/// [`crate::line`] handles empty input and fail-closed semantics around it.
pub trait LanguageDetector: Send + Sync {
    /// Return `true` if `text` is identified as English.
    fn is_english(&self, text: &str) -> bool;
}

/// Trigram-based detector backed by `whatlang`.
///
/// Input for which no language can be identified (numbers, symbols) is
/// reported as not English.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangDetector;

impl LanguageDetector for WhatlangDetector {
    fn is_english(&self, text: &str) -> bool {
        whatlang::detect(text).is_some_and(|info| info.lang() == Lang::Eng)
    }
}
