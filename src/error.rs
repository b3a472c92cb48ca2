//! Error types for the mention engine.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the engine's persistence collaborators.
///
/// The matching core itself is pure and total: empty or malformed input
/// yields an empty mention set, never an error. Everything here originates
/// in catalog reads or citation writes.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The product catalog for a company could not be fetched. The cache
    /// entry for that company stays unpopulated (all-or-nothing).
    #[error("catalog fetch failed for company {company_id}: {reason}")]
    CatalogFetch { company_id: Uuid, reason: String },

    /// A citation link could not be written. Link writing is best effort
    /// per mention; the service reports the failure and keeps going.
    #[error("citation write failed for message {message_id}, product {product_id}: {reason}")]
    CitationWrite {
        message_id: Uuid,
        product_id: Uuid,
        reason: String,
    },

    /// Database error from the Postgres-backed collaborators.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
