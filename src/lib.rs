//! Product-mention detection engine for vendor/customer chat transcripts.
//!
//! Takes the text of a chat message plus a company's product catalog and
//! returns a ranked, capped list of product mentions, each tagged with
//! the tier that produced it and a confidence score. Accepted mentions
//! can then be persisted as idempotent citation links, which downstream
//! analytics (citation counts, product rankings) consume without any
//! manual tagging.
//!
//! # Pipeline
//!
//! ```text
//!  raw message ──► normalize ──► tokenize ──► MentionDetector ──► ranked mentions
//!                                                  │                     │
//!                              CatalogCache ───────┘                     ▼
//!                            (one fetch per                      CitationLinkWriter
//!                          company and batch)                   (idempotent insert)
//! ```
//!
//! Three match tiers per catalog entry, first hit wins:
//!
//! 1. **code-exact** — a normalized SKU/EAN/DUN code appears in the
//!    message (score 1.0)
//! 2. **name-exact** — the normalized product name appears verbatim
//!    (score 0.97)
//! 3. **name-fuzzy** — token-level edit-distance similarity clears the
//!    configured acceptance gates
//!
//! Both sides of every comparison pass through the same normalization
//! (leet folding, diacritic stripping, lowercasing), so chat spellings
//! like `m0lho esp3cial` still line up with the catalog.
//!
//! The matching core is pure and total: blank input produces an empty
//! mention list, never an error. IO lives behind the
//! [`ProductCatalogProvider`] and [`CitationLinkWriter`] traits;
//! [`CitationService`] wires them to the detector for one ingestion
//! batch at a time.

pub mod catalog;
pub mod citation;
pub mod config;
pub mod detector;
pub mod error;
pub mod normalize;
pub mod similarity;
pub mod tokenize;

pub use catalog::{
    CatalogCache, CatalogEntry, CompanyId, InMemoryCatalogProvider, PgProductCatalogProvider,
    ProductCatalogProvider, ProductId, ProductRecord,
};
pub use citation::{
    format_source_tag, CitationLink, CitationLinkWriter, CitationService, InMemoryLinkWriter,
    LinkFailure, MessageId, MessageLinkReport, PgCitationLinkWriter,
};
pub use config::{DetectorConfig, ServiceConfig};
pub use detector::{Mention, MentionDetector, MentionMethod, MessageInput, MAX_MENTIONS};
pub use error::EngineError;
