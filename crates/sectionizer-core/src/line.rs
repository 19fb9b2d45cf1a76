//! Line-level classification: language and textual validity.
//!
//! Every other stage leans on these two checks. Both are pure and
//! deterministic; the validity threshold comes from configuration rather than
//! being derived per call.

use crate::lang::LanguageDetector;

/// Maximum share of numeric (or symbol) characters a valid text may carry.
pub const DEFAULT_VALIDITY_THRESHOLD: f64 = 0.30;

/// Return `true` if `text` is English according to `detector`.
///
/// Empty and whitespace-only input is never English; neither is anything the
/// detector cannot place.
pub fn is_english(text: &str, detector: &dyn LanguageDetector) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    detector.is_english(text)
}

/// Return `false` for numeric or symbol garbage.
///
/// Only text that contains at least one numeric character is inspected:
/// it is invalid if the numeric share, or the share of characters that are not
/// ASCII letters or digits, exceeds `threshold`. Text without digits is valid.
pub fn is_textually_valid(text: &str, threshold: f64) -> bool {
    let total = text.chars().count();
    if total == 0 {
        return true;
    }

    let digits = text.chars().filter(|c| c.is_numeric()).count();
    if digits == 0 {
        return true;
    }

    if digits as f64 / total as f64 > threshold {
        return false;
    }

    let special = text.chars().filter(|c| !c.is_ascii_alphanumeric()).count();
    special as f64 / total as f64 <= threshold
}
