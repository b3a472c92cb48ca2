//! Configuration for the detection pipeline.

use serde::{Deserialize, Serialize};

/// Tunable thresholds for the mention detector.
///
/// Defaults are the values the heuristics were tuned with on real vendor
/// chat transcripts. Invariant scores (1.0 for code matches, 0.97 for
/// exact name matches) are not configuration and live as constants next
/// to the code that emits them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Minimum length of a normalized product code for it to take part in
    /// matching. Shorter codes collide with ordinary words and quantities.
    pub min_code_len: usize,
    /// Per-token similarity at or above which a product token counts as
    /// matched by some text token.
    pub token_match_threshold: f32,
    /// Minimum fraction of product tokens that must be matched for the
    /// fuzzy tier to accept.
    pub min_match_ratio: f32,
    /// Minimum average best-similarity across product tokens.
    pub min_avg_similarity: f32,
    /// Minimum composite score for a fuzzy mention to be accepted.
    pub min_fuzzy_score: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_code_len: 4,
            token_match_threshold: 0.75,
            min_match_ratio: 0.7,
            min_avg_similarity: 0.78,
            min_fuzzy_score: 0.84,
        }
    }
}

/// Configuration for the citation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Prefix of the `source` audit tag written on citation links,
    /// e.g. `auto:code_exact:1.00`.
    pub source_prefix: String,
    pub detector: DetectorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            source_prefix: "auto".to_string(),
            detector: DetectorConfig::default(),
        }
    }
}
