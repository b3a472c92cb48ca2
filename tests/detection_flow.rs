//! End-to-end flow: message in, ranked mentions out, citation links
//! persisted.
//!
//! Everything runs against the in-memory provider and writer, with a
//! fixed catalog of Portuguese grocery products. Covers the tier
//! cascade, blank-input short-circuits, per-batch catalog caching,
//! idempotent relinking and the best-effort write path.

use std::collections::HashMap;
use std::sync::Arc;

use mention_engine::{
    CitationService, EngineError, InMemoryCatalogProvider, InMemoryLinkWriter, MentionMethod,
    MessageInput, ProductRecord, MAX_MENTIONS,
};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const COMPANY_A: Uuid = Uuid::from_u128(0xA);
const COMPANY_B: Uuid = Uuid::from_u128(0xB);
const COMPANY_C: Uuid = Uuid::from_u128(0xC);

const MOLHO_ESPECIAL: Uuid = Uuid::from_u128(1);
const TEMPERO_BAIANO: Uuid = Uuid::from_u128(2);
const FARINHA_MANDIOCA: Uuid = Uuid::from_u128(3);
const PIMENTA_FORTE: Uuid = Uuid::from_u128(4);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mention_engine=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn record(id: Uuid, name: &str, sku: Option<&str>, ean: Option<&str>) -> ProductRecord {
    ProductRecord {
        id,
        name: name.to_string(),
        sku_code: sku.map(str::to_string),
        ean_code: ean.map(str::to_string),
        dun_code: None,
    }
}

fn grocery_catalog() -> HashMap<Uuid, Vec<ProductRecord>> {
    HashMap::from([
        (
            COMPANY_A,
            vec![
                record(
                    MOLHO_ESPECIAL,
                    "Produto A - Molho Especial",
                    Some("A-002"),
                    None,
                ),
                record(
                    TEMPERO_BAIANO,
                    "Produto B - Tempero Baiano",
                    None,
                    Some("7891234567890"),
                ),
                record(
                    FARINHA_MANDIOCA,
                    "Farinha de Mandioca Torrada",
                    Some("F-300"),
                    None,
                ),
            ],
        ),
        (
            COMPANY_B,
            vec![record(PIMENTA_FORTE, "Molho de Pimenta Forte", None, None)],
        ),
        (
            COMPANY_C,
            (1..=10)
                .map(|n| {
                    record(
                        Uuid::from_u128(0xC0 + n),
                        "Molho Especial Defumado",
                        None,
                        None,
                    )
                })
                .collect(),
        ),
    ])
}

fn service() -> (
    CitationService,
    Arc<InMemoryCatalogProvider>,
    Arc<InMemoryLinkWriter>,
) {
    let provider = Arc::new(InMemoryCatalogProvider::new(grocery_catalog()));
    let writer = Arc::new(InMemoryLinkWriter::new());
    let service = CitationService::new(provider.clone(), writer.clone());
    (service, provider, writer)
}

fn message(text: &str, company_id: Uuid) -> MessageInput {
    MessageInput {
        message_text: Some(text.to_string()),
        response_text: None,
        company_id: Some(company_id),
    }
}

// ---------------------------------------------------------------------------
// Tier cascade through the service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn code_mention_flows_into_a_citation_link() {
    init_tracing();
    let (service, _, writer) = service();
    let message_id = Uuid::from_u128(0x100);

    let report = service
        .link_message(message_id, &message("Quanto custa o A-002?", COMPANY_A))
        .await
        .unwrap();

    assert_eq!(report.mentions.len(), 1);
    assert_eq!(report.mentions[0].product_id, MOLHO_ESPECIAL);
    assert_eq!(report.mentions[0].method, MentionMethod::CodeExact);
    assert_eq!(report.links_created, 1);
    assert!(report.failures.is_empty());

    let links = writer.links().await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].message_id, message_id);
    assert_eq!(links[0].product_id, MOLHO_ESPECIAL);
    assert_eq!(links[0].company_id, COMPANY_A);
    assert_eq!(links[0].source, "auto:code_exact:1.00");
}

#[tokio::test]
async fn fuzzy_mention_clears_the_gates() {
    init_tracing();
    let (service, _, _) = service();

    let mentions = service
        .detect_mentions(&message(
            "Gostaria do molho especial pra churrasco",
            COMPANY_A,
        ))
        .await
        .unwrap();

    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].product_id, MOLHO_ESPECIAL);
    assert_eq!(mentions[0].method, MentionMethod::NameFuzzy);
    // [molho, especial] both score 0.98: 0.98 * 0.6 + 1.0 * 0.4 = 0.988.
    assert!((mentions[0].score - 0.988).abs() < 1e-3);
}

#[tokio::test]
async fn fuzzy_source_tag_rounds_the_score() {
    let (service, _, writer) = service();

    service
        .link_message(
            Uuid::from_u128(0x101),
            &message("Tem tempero baiano?", COMPANY_A),
        )
        .await
        .unwrap();

    let links = writer.links().await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].product_id, TEMPERO_BAIANO);
    assert_eq!(links[0].source, "auto:name_fuzzy:0.99");
}

#[tokio::test]
async fn code_tier_wins_when_code_and_name_both_appear() {
    let (service, _, _) = service();

    let mentions = service
        .detect_mentions(&message(
            "O Produto A - Molho Especial (A-002) chegou",
            COMPANY_A,
        ))
        .await
        .unwrap();

    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].product_id, MOLHO_ESPECIAL);
    assert_eq!(mentions[0].method, MentionMethod::CodeExact);
    assert!((mentions[0].score - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn function_word_messages_match_nothing() {
    let (service, _, writer) = service();

    let report = service
        .link_message(
            Uuid::from_u128(0x102),
            &message("e de para com", COMPANY_A),
        )
        .await
        .unwrap();

    assert!(report.mentions.is_empty());
    assert_eq!(report.links_created, 0);
    assert!(writer.links().await.is_empty());
}

// ---------------------------------------------------------------------------
// Blank input short-circuits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blank_messages_skip_catalog_io() {
    let (service, provider, _) = service();

    let no_text = MessageInput {
        message_text: None,
        response_text: None,
        company_id: Some(COMPANY_A),
    };
    assert!(service.detect_mentions(&no_text).await.unwrap().is_empty());

    let punctuation_only = message("?!? ...", COMPANY_A);
    assert!(service
        .detect_mentions(&punctuation_only)
        .await
        .unwrap()
        .is_empty());

    let no_company = MessageInput {
        message_text: Some("Quanto custa o A-002?".to_string()),
        response_text: None,
        company_id: None,
    };
    assert!(service.detect_mentions(&no_company).await.unwrap().is_empty());

    assert_eq!(provider.fetch_count(), 0);
}

// ---------------------------------------------------------------------------
// Catalog caching across a batch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn catalog_is_fetched_once_per_company_per_batch() {
    init_tracing();
    let (service, provider, _) = service();

    for text in [
        "Quanto custa o A-002?",
        "Tem tempero baiano?",
        "chegou minha farinha de mandioca torrada?",
    ] {
        service
            .detect_mentions(&message(text, COMPANY_A))
            .await
            .unwrap();
    }
    service
        .detect_mentions(&message("quero molho de pimenta forte", COMPANY_B))
        .await
        .unwrap();

    assert_eq!(provider.fetch_count(), 2);
}

#[tokio::test]
async fn fetch_failure_propagates_and_the_next_call_retries() {
    init_tracing();
    let provider = Arc::new(InMemoryCatalogProvider::failing_first(1, grocery_catalog()));
    let service = CitationService::new(provider.clone(), Arc::new(InMemoryLinkWriter::new()));
    let input = message("Quanto custa o A-002?", COMPANY_A);

    let error = service.detect_mentions(&input).await.unwrap_err();
    assert!(matches!(error, EngineError::CatalogFetch { .. }));

    // The failed fetch cached nothing, so the retry hits the provider
    // again and detection completes.
    let mentions = service.detect_mentions(&input).await.unwrap();
    assert_eq!(provider.fetch_count(), 2);
    assert_eq!(mentions.len(), 1);
    assert_eq!(mentions[0].product_id, MOLHO_ESPECIAL);
    assert_eq!(mentions[0].method, MentionMethod::CodeExact);

    // After the successful fetch the batch serves from cache.
    service.detect_mentions(&input).await.unwrap();
    assert_eq!(provider.fetch_count(), 2);
}

// ---------------------------------------------------------------------------
// Ranking and the mention cap
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mention_list_caps_at_five_in_catalog_order() {
    let (service, _, _) = service();

    // Ten equal-scoring fuzzy matches; the stable sort keeps catalog
    // order and the cap keeps the first five.
    let mentions = service
        .detect_mentions(&message("molho bem especial bem defumado", COMPANY_C))
        .await
        .unwrap();

    assert_eq!(mentions.len(), MAX_MENTIONS);
    for (index, mention) in mentions.iter().enumerate() {
        assert_eq!(mention.product_id, Uuid::from_u128(0xC1 + index as u128));
        assert_eq!(mention.method, MentionMethod::NameFuzzy);
    }
}

// ---------------------------------------------------------------------------
// Idempotent relinking and best-effort writes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn relinking_a_message_creates_nothing_new() {
    let (service, _, writer) = service();
    let message_id = Uuid::from_u128(0x103);
    let input = message("Quanto custa o A-002?", COMPANY_A);

    let first = service.link_message(message_id, &input).await.unwrap();
    let second = service.link_message(message_id, &input).await.unwrap();

    assert_eq!(first.links_created, 1);
    assert_eq!(second.links_created, 0);
    assert_eq!(second.mentions.len(), first.mentions.len());
    assert!(second.failures.is_empty());
    assert_eq!(writer.links().await.len(), 1);
}

#[tokio::test]
async fn failed_write_keeps_the_other_links() {
    init_tracing();
    let provider = Arc::new(InMemoryCatalogProvider::new(grocery_catalog()));
    let writer = Arc::new(InMemoryLinkWriter::failing_for([TEMPERO_BAIANO]));
    let service = CitationService::new(provider, writer.clone());

    let report = service
        .link_message(
            Uuid::from_u128(0x104),
            &message(
                "Quanto custa o A-002? Tem também o tempero baiano?",
                COMPANY_A,
            ),
        )
        .await
        .unwrap();

    // Both products were detected; only one link could be written.
    assert_eq!(report.mentions.len(), 2);
    assert_eq!(report.mentions[0].product_id, MOLHO_ESPECIAL);
    assert_eq!(report.mentions[1].product_id, TEMPERO_BAIANO);
    assert_eq!(report.links_created, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].product_id, TEMPERO_BAIANO);

    let links = writer.links().await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].product_id, MOLHO_ESPECIAL);
}
