// Name & Email Normalization
// Canonicalizes text for comparison only - stored values stay untouched

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a person's name for comparison.
///
/// Steps, in order: Unicode NFD decomposition, strip combining diacritical
/// marks, fold to lower case, trim surrounding whitespace. Total for any
/// input (including empty) and idempotent.
pub fn normalize_name(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Normalize an email address for comparison.
///
/// Emails are matched byte-exact after case folding, so only lower-case and
/// trim apply. No diacritic handling.
pub fn normalize_email(text: &str) -> String {
    text.to_lowercase().trim().to_string()
}

// ============================================================================
// TESTS
// ============================================================================
