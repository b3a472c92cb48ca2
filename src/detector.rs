//! Mention detection over a message and a company's catalog entries.
//!
//! Three tiers per catalog entry, first hit wins:
//!
//! 1. code-exact — a normalized product code appears in the message's
//!    alphanumeric form (score 1.0)
//! 2. name-exact — the normalized product name appears verbatim in the
//!    normalized message (score 0.97)
//! 3. name-fuzzy — token-level edit-distance similarity clears the
//!    configured acceptance gates (score in the fuzzy band)
//!
//! Detection is pure: it never touches IO or shared state, and empty or
//! absent input yields an empty mention list rather than an error.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{CatalogEntry, CompanyId, ProductId};
use crate::config::DetectorConfig;
use crate::normalize::{normalize_alphanumeric, normalize_for_matching};
use crate::similarity::token_similarity;
use crate::tokenize::extract_meaningful_tokens;

/// Maximum number of mentions reported for one message.
pub const MAX_MENTIONS: usize = 5;

/// Score assigned by the name-exact tier. Sits below the code tier so a
/// code hit always outranks a name hit for a different product.
const NAME_EXACT_SCORE: f32 = 0.97;

/// Minimum normalized-name length for the name-exact tier. Anything
/// shorter matches accidentally inside unrelated words.
const MIN_EXACT_NAME_LEN: usize = 4;

/// Minimum product token count for the fuzzy tier. A single token gives
/// the ratio gate nothing to measure.
const MIN_FUZZY_PRODUCT_TOKENS: usize = 2;

/// Weight of average similarity in the composite fuzzy score.
const FUZZY_SIMILARITY_WEIGHT: f32 = 0.6;
/// Weight of the matched-token ratio in the composite fuzzy score.
const FUZZY_RATIO_WEIGHT: f32 = 0.4;

/// Which tier produced a mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionMethod {
    /// A normalized product code appeared in the message.
    CodeExact,
    /// The full normalized product name appeared in the message.
    NameExact,
    /// Token-level similarity cleared the acceptance gates.
    NameFuzzy,
}

impl MentionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeExact => "code_exact",
            Self::NameExact => "name_exact",
            Self::NameFuzzy => "name_fuzzy",
        }
    }
}

impl fmt::Display for MentionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected product mention in one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub product_id: ProductId,
    pub method: MentionMethod,
    /// 1.0 for code matches, 0.97 for exact name matches, and at least
    /// the configured floor for fuzzy matches.
    pub score: f32,
}

/// Input for one detection pass.
///
/// The ingestion layer resolves its loosely-typed webhook payload into
/// this explicit shape before the engine sees anything; a field the
/// payload lacked arrives as `None` and is treated as empty text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageInput {
    pub message_text: Option<String>,
    pub response_text: Option<String>,
    pub company_id: Option<CompanyId>,
}

impl MessageInput {
    /// Message and response bodies joined with a newline, absent parts
    /// skipped.
    pub fn combined_text(&self) -> String {
        [self.message_text.as_deref(), self.response_text.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True when normalization leaves anything to match against. Lets
    /// callers skip catalog IO for blank or punctuation-only messages.
    pub fn has_matchable_content(&self) -> bool {
        let combined = self.combined_text();
        let normalized = normalize_for_matching(&combined);
        if normalized.is_empty() {
            return false;
        }
        !extract_meaningful_tokens(&normalized).is_empty()
            || !normalize_alphanumeric(&combined).is_empty()
    }
}

/// Detects catalog product mentions in chat messages.
#[derive(Debug, Clone, Default)]
pub struct MentionDetector {
    config: DetectorConfig,
}

impl MentionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect which of `entries` are mentioned in `input`.
    ///
    /// Returns at most [`MAX_MENTIONS`] mentions, sorted by descending
    /// score with catalog order deciding ties, and at most one mention
    /// per product. Missing company id or text that normalizes to
    /// nothing yields an empty list.
    pub fn detect(&self, input: &MessageInput, entries: &[CatalogEntry]) -> Vec<Mention> {
        if input.company_id.is_none() {
            return Vec::new();
        }

        let combined = input.combined_text();
        let normalized_text = normalize_for_matching(&combined);
        if normalized_text.is_empty() {
            return Vec::new();
        }

        let text_alphanumeric = normalize_alphanumeric(&combined);
        let text_tokens = extract_meaningful_tokens(&normalized_text);
        if text_tokens.is_empty() && text_alphanumeric.is_empty() {
            return Vec::new();
        }

        let mut mentions: Vec<Mention> = Vec::new();
        let mut mentioned: HashSet<ProductId> = HashSet::new();

        for entry in entries {
            if mentioned.contains(&entry.product_id) {
                continue;
            }
            if let Some(mention) =
                self.match_entry(entry, &normalized_text, &text_alphanumeric, &text_tokens)
            {
                mentioned.insert(entry.product_id);
                mentions.push(mention);
            }
        }

        // Stable sort keeps catalog order within equal scores.
        mentions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        mentions.truncate(MAX_MENTIONS);
        mentions
    }

    /// Run the tier cascade for one entry; the first tier that matches
    /// decides method and score.
    fn match_entry(
        &self,
        entry: &CatalogEntry,
        normalized_text: &str,
        text_alphanumeric: &str,
        text_tokens: &[String],
    ) -> Option<Mention> {
        if entry
            .normalized_codes
            .iter()
            .any(|code| text_alphanumeric.contains(code.as_str()))
        {
            debug!(product_id = %entry.product_id, "code-exact match");
            return Some(Mention {
                product_id: entry.product_id,
                method: MentionMethod::CodeExact,
                score: 1.0,
            });
        }

        if entry.normalized_name.len() >= MIN_EXACT_NAME_LEN
            && normalized_text.contains(entry.normalized_name.as_str())
        {
            debug!(product_id = %entry.product_id, "name-exact match");
            return Some(Mention {
                product_id: entry.product_id,
                method: MentionMethod::NameExact,
                score: NAME_EXACT_SCORE,
            });
        }

        self.fuzzy_score(&entry.name_tokens, text_tokens)
            .map(|score| {
                debug!(product_id = %entry.product_id, score, "name-fuzzy match");
                Mention {
                    product_id: entry.product_id,
                    method: MentionMethod::NameFuzzy,
                    score,
                }
            })
    }

    /// Composite fuzzy score for one entry, or `None` when rejected.
    ///
    /// Each product token gets its best similarity against the text
    /// tokens; a token counts as matched when that best clears the
    /// per-token threshold. The entry is rejected unless enough tokens
    /// matched, the average similarity holds up, and the blended score
    /// clears the floor.
    fn fuzzy_score(&self, product_tokens: &[String], text_tokens: &[String]) -> Option<f32> {
        if product_tokens.len() < MIN_FUZZY_PRODUCT_TOKENS || text_tokens.is_empty() {
            return None;
        }

        let mut similarity_sum = 0.0f32;
        let mut matched = 0usize;

        for product_token in product_tokens {
            let mut best = 0.0f32;
            for text_token in text_tokens {
                let similarity = token_similarity(product_token, text_token);
                if similarity > best {
                    best = similarity;
                }
                if best >= 1.0 {
                    break;
                }
            }
            similarity_sum += best;
            if best >= self.config.token_match_threshold {
                matched += 1;
            }
        }

        let match_ratio = matched as f32 / product_tokens.len() as f32;
        let avg_similarity = similarity_sum / product_tokens.len() as f32;

        if match_ratio < self.config.min_match_ratio
            || avg_similarity < self.config.min_avg_similarity
        {
            return None;
        }

        let score = avg_similarity * FUZZY_SIMILARITY_WEIGHT + match_ratio * FUZZY_RATIO_WEIGHT;
        (score >= self.config.min_fuzzy_score).then_some(score)
    }
}
