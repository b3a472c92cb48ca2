//! Token extraction from normalized text.

/// Minimum length a token must have to be kept.
pub const MIN_TOKEN_LEN: usize = 3;

/// Portuguese function words and catalog filler nouns that carry no
/// product signal. Entries are in normalized form (lowercase, accent
/// free), since tokenization runs on already-normalized text.
const STOPWORDS: &[&str] = &[
    // articles and contractions
    "a", "o", "as", "os", "um", "uma", "uns", "umas", "ao", "aos", "da", "de", "do", "das", "dos",
    "na", "no", "nas", "nos", "num", "numa", "pela", "pelo", "pelas", "pelos",
    // prepositions
    "para", "pra", "pro", "por", "com", "sem", "sob", "sobre", "entre", "ate", "apos", "desde",
    "em",
    // conjunctions and relatives
    "e", "ou", "mas", "que", "qual", "quais", "quando", "como", "porque",
    // pronouns and demonstratives
    "eu", "ele", "ela", "eles", "elas", "voce", "voces", "meu", "minha", "meus", "minhas", "seu",
    "sua", "seus", "suas", "esse", "essa", "esses", "essas", "este", "esta", "estes", "estas",
    "isso", "isto", "aquele", "aquela",
    // chat fillers
    "nao", "sim", "mais", "menos", "muito", "muita", "bem", "ja", "la",
    // catalog fillers that show up in nearly every product name
    "tipo", "linha", "produto", "produtos",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Split normalized text into the tokens that matter for matching.
///
/// Keeps a token only if it is at least [`MIN_TOKEN_LEN`] characters long
/// and not a stopword. Order is preserved and duplicates are kept; a
/// repeated token legitimately raises its weight in fuzzy scoring.
pub fn extract_meaningful_tokens(normalized: &str) -> Vec<String> {
    normalized
        .split_whitespace()
        .filter(|token| token.len() >= MIN_TOKEN_LEN && !is_stopword(token))
        .map(str::to_string)
        .collect()
}
