//! Product catalog entries and the per-batch catalog cache.
//!
//! A company's products are fetched once per ingestion batch, precomputed
//! into [`CatalogEntry`] values (normalized name, meaningful tokens,
//! normalized codes) and shared read-only from there. The cache is
//! caller-owned on purpose: a process-wide instance would keep serving a
//! stale catalog after product edits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::DetectorConfig;
use crate::error::EngineError;
use crate::normalize::{normalize_alphanumeric, normalize_for_matching};
use crate::tokenize::extract_meaningful_tokens;

/// Identifier of a catalog product.
pub type ProductId = Uuid;
/// Identifier of a company (catalog owner).
pub type CompanyId = Uuid;

/// One product row as stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub sku_code: Option<String>,
    pub ean_code: Option<String>,
    pub dun_code: Option<String>,
}

/// A matchable catalog entry, precomputed once per product.
///
/// Immutable after construction. All strings are already normalized, so
/// the detector compares them without touching the normalizer again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_id: ProductId,
    /// Space-preserving normalization of the product name.
    pub normalized_name: String,
    /// Meaningful tokens of `normalized_name`, in name order.
    pub name_tokens: Vec<String>,
    /// Alphanumeric normalizations of the SKU/EAN/DUN codes. Products
    /// carry at most three codes, hence the inline capacity.
    pub normalized_codes: SmallVec<[String; 3]>,
}

impl CatalogEntry {
    /// Build an entry from a product row.
    ///
    /// Codes that normalize to fewer than `min_code_len` characters are
    /// discarded here, so the detector never has to re-check length.
    pub fn from_product(product: &ProductRecord, min_code_len: usize) -> Self {
        let normalized_name = normalize_for_matching(&product.name);
        let name_tokens = extract_meaningful_tokens(&normalized_name);

        let mut normalized_codes = SmallVec::new();
        for code in [&product.sku_code, &product.ean_code, &product.dun_code]
            .into_iter()
            .flatten()
        {
            let normalized = normalize_alphanumeric(code);
            if normalized.len() >= min_code_len && !normalized_codes.contains(&normalized) {
                normalized_codes.push(normalized);
            }
        }

        Self {
            product_id: product.id,
            normalized_name,
            name_tokens,
            normalized_codes,
        }
    }
}

/// Read-only access to a company's product catalog.
#[async_trait]
pub trait ProductCatalogProvider: Send + Sync {
    /// All products of `company_id`, in stable catalog order. The order
    /// decides ties when ranked mentions share a score.
    async fn list_products(&self, company_id: CompanyId)
        -> Result<Vec<ProductRecord>, EngineError>;
}

/// Postgres-backed catalog provider.
///
/// Expects a `products` table with `id uuid`, `company_id uuid`,
/// `name text`, nullable `sku_code` / `ean_code` / `dun_code` text
/// columns and a `created_at` timestamp used for stable ordering.
pub struct PgProductCatalogProvider {
    pool: PgPool,
}

impl PgProductCatalogProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalogProvider for PgProductCatalogProvider {
    async fn list_products(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<ProductRecord>, EngineError> {
        let rows: Vec<(Uuid, String, Option<String>, Option<String>, Option<String>)> =
            sqlx::query_as(
                r#"
                SELECT id, name, sku_code, ean_code, dun_code
                FROM products
                WHERE company_id = $1
                ORDER BY created_at, id
                "#,
            )
            .bind(company_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, sku_code, ean_code, dun_code)| ProductRecord {
                id,
                name,
                sku_code,
                ean_code,
                dun_code,
            })
            .collect())
    }
}

/// In-memory catalog provider for tests and offline runs.
///
/// Counts fetches so callers can assert the once-per-batch population
/// contract of [`CatalogCache`], and can be told to fail its leading
/// fetches to exercise the all-or-nothing population path. Unknown
/// companies get an empty catalog.
#[derive(Default)]
pub struct InMemoryCatalogProvider {
    products: HashMap<CompanyId, Vec<ProductRecord>>,
    fetches: AtomicUsize,
    fail_first: AtomicUsize,
}

impl InMemoryCatalogProvider {
    pub fn new(products: HashMap<CompanyId, Vec<ProductRecord>>) -> Self {
        Self {
            products,
            fetches: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(0),
        }
    }

    /// Convenience constructor for the common single-company case.
    pub fn with_company(company_id: CompanyId, products: Vec<ProductRecord>) -> Self {
        Self::new(HashMap::from([(company_id, products)]))
    }

    /// A provider whose first `failures` fetches fail before it starts
    /// serving normally, the transient-outage shape of a catalog store.
    pub fn failing_first(
        failures: usize,
        products: HashMap<CompanyId, Vec<ProductRecord>>,
    ) -> Self {
        Self {
            products,
            fetches: AtomicUsize::new(0),
            fail_first: AtomicUsize::new(failures),
        }
    }

    /// Number of `list_products` calls served so far, failed ones
    /// included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCatalogProvider for InMemoryCatalogProvider {
    async fn list_products(
        &self,
        company_id: CompanyId,
    ) -> Result<Vec<ProductRecord>, EngineError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(EngineError::CatalogFetch {
                company_id,
                reason: "injected fetch failure".to_string(),
            });
        }
        Ok(self.products.get(&company_id).cloned().unwrap_or_default())
    }
}

/// Per-batch cache of built catalog entries, keyed by company.
///
/// Population is all-or-nothing: a failed fetch leaves no entry behind,
/// and the next call retries. Two tasks missing on the same company may
/// both fetch; the first inserted value wins and the loser is dropped,
/// which is harmless because both were built from the same rows.
pub struct CatalogCache {
    min_code_len: usize,
    entries: RwLock<HashMap<CompanyId, Arc<Vec<CatalogEntry>>>>,
}

impl CatalogCache {
    pub fn new(min_code_len: usize) -> Self {
        Self {
            min_code_len,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached entries for a company, fetching and building them on miss.
    #[instrument(skip(self, provider))]
    pub async fn get_entries(
        &self,
        provider: &dyn ProductCatalogProvider,
        company_id: CompanyId,
    ) -> Result<Arc<Vec<CatalogEntry>>, EngineError> {
        if let Some(cached) = self.entries.read().await.get(&company_id) {
            debug!(%company_id, "catalog cache hit");
            return Ok(Arc::clone(cached));
        }

        let products = provider.list_products(company_id).await?;
        let built: Vec<CatalogEntry> = products
            .iter()
            .map(|product| CatalogEntry::from_product(product, self.min_code_len))
            .collect();
        if built.is_empty() {
            warn!(%company_id, "company has no catalog products");
        }
        info!(%company_id, products = built.len(), "catalog cache populated");

        let mut entries = self.entries.write().await;
        let shared = entries
            .entry(company_id)
            .or_insert_with(|| Arc::new(built))
            .clone();
        Ok(shared)
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new(DetectorConfig::default().min_code_len)
    }
}
