//! Text normalization for product matching.
//!
//! Both message text and catalog fields go through the same pipeline so
//! the two sides distort identically:
//!
//! 1. fold leet digits into letters (`m0lho` → `molho`)
//! 2. decompose to NFD and drop combining marks (`açúcar` → `acucar`)
//! 3. lowercase
//! 4. restrict the alphabet — either keeping word boundaries
//!    ([`normalize_for_matching`]) or stripping everything that is not a
//!    letter or digit ([`normalize_alphanumeric`])
//!
//! Leet folding runs first and consumes the digits it maps, so a second
//! pass over already-normalized text changes nothing.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Leet-speak digit substitutions seen in real chat transcripts.
fn fold_leet(c: char) -> char {
    match c {
        '0' => 'o',
        '1' => 'i',
        '3' => 'e',
        '4' => 'a',
        '5' => 's',
        '7' => 't',
        '8' => 'b',
        other => other,
    }
}

/// Shared head of the pipeline: leet fold, NFD mark stripping, lowercase.
fn fold(text: &str) -> impl Iterator<Item = char> + '_ {
    text.chars()
        .map(fold_leet)
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

/// Normalize text while preserving word boundaries.
///
/// Characters outside `[a-z0-9]` and whitespace become spaces, runs of
/// whitespace collapse to a single space, and the result is trimmed.
///
/// # Examples
///
/// ```
/// use mention_engine::normalize::normalize_for_matching;
///
/// assert_eq!(normalize_for_matching("M0lho  Esp3cial!"), "molho especial");
/// assert_eq!(normalize_for_matching("Açaí com granola"), "acai com granola");
/// assert_eq!(normalize_for_matching("  !!! "), "");
/// ```
pub fn normalize_for_matching(text: &str) -> String {
    let replaced: String = fold(text)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize text down to its letters and digits only.
///
/// Used for product-code matching, where separators vary freely between
/// the catalog and chat (`A-002`, `a002`, `A 002` all collapse together).
///
/// # Examples
///
/// ```
/// use mention_engine::normalize::normalize_alphanumeric;
///
/// assert_eq!(normalize_alphanumeric("A-002"), "aoo2");
/// assert_eq!(normalize_alphanumeric("789.123"), "tb9i2e");
/// ```
pub fn normalize_alphanumeric(text: &str) -> String {
    fold(text).filter(char::is_ascii_alphanumeric).collect()
}
