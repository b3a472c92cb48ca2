//! Citation link persistence and the batch-scoped service.
//!
//! A citation link is the durable record that a product was mentioned in
//! a message. [`CitationService`] wires the detector to a catalog
//! provider and a link writer for the lifetime of one ingestion batch.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::catalog::{CatalogCache, CompanyId, ProductCatalogProvider, ProductId};
use crate::config::ServiceConfig;
use crate::detector::{Mention, MentionDetector, MentionMethod, MessageInput};
use crate::error::EngineError;

/// Identifier of a chat message.
pub type MessageId = Uuid;

/// A persisted assertion that a product was mentioned in a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationLink {
    pub message_id: MessageId,
    pub product_id: ProductId,
    pub company_id: CompanyId,
    pub cited_at: DateTime<Utc>,
    /// Audit tag describing how the link came to be; see
    /// [`format_source_tag`].
    pub source: String,
}

/// Render the audit tag stored on a citation link.
///
/// The tag records which tier produced the mention and at what
/// confidence, so analytics can filter or re-weigh links later without
/// re-running detection.
///
/// # Examples
///
/// ```
/// use mention_engine::{format_source_tag, MentionMethod};
///
/// let tag = format_source_tag("auto", MentionMethod::CodeExact, 1.0);
/// assert_eq!(tag, "auto:code_exact:1.00");
/// ```
pub fn format_source_tag(prefix: &str, method: MentionMethod, score: f32) -> String {
    format!("{prefix}:{method}:{score:.2}")
}

/// Write-side collaborator for citation links.
#[async_trait]
pub trait CitationLinkWriter: Send + Sync {
    /// Insert one link, returning how many rows were actually created.
    ///
    /// Must be idempotent per `(message_id, product_id)`: a duplicate
    /// insert is a no-op that reports zero rows, never an error.
    async fn create(&self, link: &CitationLink) -> Result<u64, EngineError>;
}

/// Postgres-backed citation writer.
///
/// Expects a `product_citations` table with a unique constraint over
/// `(message_id, product_id)`; idempotency rides on `ON CONFLICT DO
/// NOTHING`.
pub struct PgCitationLinkWriter {
    pool: PgPool,
}

impl PgCitationLinkWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CitationLinkWriter for PgCitationLinkWriter {
    async fn create(&self, link: &CitationLink) -> Result<u64, EngineError> {
        let result = sqlx::query(
            r#"
            INSERT INTO product_citations (message_id, product_id, company_id, cited_at, source)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (message_id, product_id) DO NOTHING
            "#,
        )
        .bind(link.message_id)
        .bind(link.product_id)
        .bind(link.company_id)
        .bind(link.cited_at)
        .bind(&link.source)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

/// In-memory citation writer for tests and offline runs.
///
/// Skips duplicate `(message, product)` pairs the way the Postgres
/// writer's conflict clause does. Product ids listed in `failing_for`
/// fail their writes, which exercises the best-effort path.
#[derive(Default)]
pub struct InMemoryLinkWriter {
    links: Mutex<Vec<CitationLink>>,
    fail_for: HashSet<ProductId>,
}

impl InMemoryLinkWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer whose `create` fails for the given product ids.
    pub fn failing_for(products: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            links: Mutex::new(Vec::new()),
            fail_for: products.into_iter().collect(),
        }
    }

    /// Snapshot of every link written so far.
    pub async fn links(&self) -> Vec<CitationLink> {
        self.links.lock().await.clone()
    }
}

#[async_trait]
impl CitationLinkWriter for InMemoryLinkWriter {
    async fn create(&self, link: &CitationLink) -> Result<u64, EngineError> {
        if self.fail_for.contains(&link.product_id) {
            return Err(EngineError::CitationWrite {
                message_id: link.message_id,
                product_id: link.product_id,
                reason: "injected write failure".to_string(),
            });
        }

        let mut links = self.links.lock().await;
        let duplicate = links
            .iter()
            .any(|existing| {
                existing.message_id == link.message_id && existing.product_id == link.product_id
            });
        if duplicate {
            return Ok(0);
        }
        links.push(link.clone());
        Ok(1)
    }
}

/// One mention whose link write failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkFailure {
    pub product_id: ProductId,
    pub reason: String,
}

/// Outcome of linking one message's mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageLinkReport {
    pub message_id: MessageId,
    /// Mentions the detector accepted, in rank order.
    pub mentions: Vec<Mention>,
    /// Rows actually inserted; duplicates already present count zero.
    pub links_created: u64,
    /// Mentions whose link write failed. The remaining links were still
    /// written.
    pub failures: Vec<LinkFailure>,
}

/// Batch-scoped detection and linking service.
///
/// Owns a [`CatalogCache`], so every message processed through one
/// instance shares a single catalog fetch per company. Create one
/// service per ingestion batch and drop it with the batch; an instance
/// held across batches would pin a stale catalog.
pub struct CitationService {
    provider: Arc<dyn ProductCatalogProvider>,
    writer: Arc<dyn CitationLinkWriter>,
    detector: MentionDetector,
    cache: CatalogCache,
    config: ServiceConfig,
}

impl CitationService {
    pub fn new(
        provider: Arc<dyn ProductCatalogProvider>,
        writer: Arc<dyn CitationLinkWriter>,
    ) -> Self {
        Self::with_config(provider, writer, ServiceConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn ProductCatalogProvider>,
        writer: Arc<dyn CitationLinkWriter>,
        config: ServiceConfig,
    ) -> Self {
        let detector = MentionDetector::new(config.detector.clone());
        let cache = CatalogCache::new(config.detector.min_code_len);
        Self {
            provider,
            writer,
            detector,
            cache,
            config,
        }
    }

    /// Detect which catalog products a message mentions.
    ///
    /// Blank input short-circuits to `Ok` with an empty list before any
    /// catalog IO happens. A catalog fetch failure propagates untouched;
    /// the caller decides whether to retry the message.
    #[instrument(skip(self, input), fields(company_id = ?input.company_id))]
    pub async fn detect_mentions(&self, input: &MessageInput) -> Result<Vec<Mention>, EngineError> {
        let Some(company_id) = input.company_id else {
            return Ok(Vec::new());
        };
        if !input.has_matchable_content() {
            return Ok(Vec::new());
        }

        let entries = self.cache.get_entries(self.provider.as_ref(), company_id).await?;
        Ok(self.detector.detect(input, &entries))
    }

    /// Detect mentions and persist one citation link per mention.
    ///
    /// Link writing is best effort: each mention is written
    /// independently, failures land in the report instead of aborting,
    /// and the links that did succeed stay in place. Re-running the same
    /// message is safe because the writer skips existing pairs.
    #[instrument(skip(self, input), fields(%message_id, company_id = ?input.company_id))]
    pub async fn link_message(
        &self,
        message_id: MessageId,
        input: &MessageInput,
    ) -> Result<MessageLinkReport, EngineError> {
        let mentions = self.detect_mentions(input).await?;

        let mut links_created = 0u64;
        let mut failures = Vec::new();

        if let Some(company_id) = input.company_id {
            for mention in &mentions {
                let link = CitationLink {
                    message_id,
                    product_id: mention.product_id,
                    company_id,
                    cited_at: Utc::now(),
                    source: format_source_tag(
                        &self.config.source_prefix,
                        mention.method,
                        mention.score,
                    ),
                };
                match self.writer.create(&link).await {
                    Ok(inserted) => {
                        links_created += inserted;
                        if inserted == 0 {
                            debug!(product_id = %mention.product_id, "citation already present");
                        }
                    }
                    Err(error) => {
                        warn!(product_id = %mention.product_id, %error, "citation write failed");
                        failures.push(LinkFailure {
                            product_id: mention.product_id,
                            reason: error.to_string(),
                        });
                    }
                }
            }
        }

        debug!(
            mentions = mentions.len(),
            links_created,
            failures = failures.len(),
            "message linked"
        );

        Ok(MessageLinkReport {
            message_id,
            mentions,
            links_created,
            failures,
        })
    }
}
