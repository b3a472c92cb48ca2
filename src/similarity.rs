//! Token similarity scoring over edit distance.
//!
//! Chat transcripts misspell product words in predictable ways:
//! repeated-letter emphasis ("molhooo"), pluralization ("caixas"), and
//! truncation ("especial" for "especialmente"). [`token_similarity`]
//! layers cheap rules for those on top of a normalized Levenshtein
//! baseline.

/// Similarity granted when two tokens are equal after collapsing repeats.
const COLLAPSED_EQUAL_SCORE: f32 = 0.98;

/// Minimum collapsed length for the collapsed-equality rule.
const COLLAPSED_EQUAL_MIN_LEN: usize = 4;

/// Similarity granted by the substring containment rule.
const SUBSTRING_SCORE: f32 = 0.9;

/// Minimum length of the first token for the containment rule. The gate
/// sits on the first argument only: callers pass the product token first,
/// and a short chat token inside a long product token is not evidence.
const SUBSTRING_MIN_LEN: usize = 6;

/// Unit-cost Levenshtein edit distance.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Collapse runs of a repeated character down to one occurrence.
///
/// `"molhooo"` becomes `"molho"`, `"caaaixa"` becomes `"caixa"`.
pub fn collapse_repeated_chars(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last = None;
    for c in s.chars() {
        if last != Some(c) {
            out.push(c);
            last = Some(c);
        }
    }
    out
}

/// Similarity in `[0, 1]` between two normalized tokens.
///
/// When both tokens collapse to the same form of length at least four,
/// the answer is a flat [`COLLAPSED_EQUAL_SCORE`]; identical long tokens
/// land here too, so only short exact matches ever score a full 1.0.
/// Otherwise the best raw similarity over the collapsed/uncollapsed
/// combinations wins, which keeps collapsing from ever hurting a pair.
pub fn token_similarity(a: &str, b: &str) -> f32 {
    let ca = collapse_repeated_chars(a);
    let cb = collapse_repeated_chars(b);

    if ca.len() >= COLLAPSED_EQUAL_MIN_LEN && ca == cb {
        return COLLAPSED_EQUAL_SCORE;
    }

    raw_similarity(a, b)
        .max(raw_similarity(&ca, b))
        .max(raw_similarity(a, &cb))
        .max(raw_similarity(&ca, &cb))
}

fn raw_similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    if a.len() >= SUBSTRING_MIN_LEN && (a.contains(b) || b.contains(a)) {
        return SUBSTRING_SCORE;
    }
    strsim::normalized_levenshtein(a, b) as f32
}
