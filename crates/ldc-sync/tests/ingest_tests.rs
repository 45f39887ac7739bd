//! Batched ingestion against a mocked destination

mod common;

use common::{bearer, broker, mount_auth};
use ldc_common::ReportStatus;
use ldc_sync::config::IngestConfig;
use ldc_sync::error_sink::{ErrorSink, JsonFileErrorSink, MemoryErrorSink};
use ldc_sync::ingest::BatchIngestor;
use ldc_sync::model::Character;
use ldc_sync::pipeline::Pipeline;
use ldc_sync::transform::{transform_characters, CharacterRecord};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHARACTER_PATH: &str = "/api/v1/ingest/sources/lotr_characters/LotrCharacter";
const QUOTE_PATH: &str = "/api/v1/ingest/sources/lotr/LotrQuote";

fn characters(n: usize) -> Vec<Character> {
    (0..n)
        .map(|i| Character::new(format!("char-{}", i), format!("Hobbit {}", i)))
        .collect()
}

fn records(n: usize) -> Vec<CharacterRecord> {
    transform_characters(&characters(n)).records
}

async fn mount_accept(server: &MockServer, route: &str) {
    Mock::given(method("POST"))
        .and(path(route.to_string()))
        .and(header("authorization", bearer().as_str()))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"accepted": true})))
        .with_priority(5)
        .mount(server)
        .await;
}

async fn ingest_posts(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path().starts_with("/api/v1/ingest/sources/"))
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_450_records_with_failing_second_batch() {
    let server = MockServer::start().await;
    mount_auth(&server, 7200).await;

    // The second batch starts at record 200
    Mock::given(method("POST"))
        .and(path(CHARACTER_PATH))
        .and(body_string_contains(r#""characterId":"char-200""#))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_accept(&server, CHARACTER_PATH).await;

    let dir = TempDir::new().unwrap();
    let sink = Arc::new(JsonFileErrorSink::new(dir.path().join("errors.json")));
    let ingestor =
        BatchIngestor::new(broker(&server), sink.clone(), IngestConfig::default()).unwrap();

    let report = ingestor.ingest(&records(450)).await.unwrap();

    assert_eq!(report.status, ReportStatus::Partial);
    assert_eq!(report.total_batches, 3);
    assert_eq!(report.successful_batches, 2);
    assert_eq!(report.failed_batches, 1);
    assert_eq!(report.ingested_count, 250);
    assert_eq!(report.total_records, 450);

    let entries = sink.entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].batch_num, 2);
    assert_eq!(entries[0].record_count, 200);
    assert_eq!(entries[0].sample_ids, vec!["char-200", "char-201", "char-202"]);
    assert!(entries[0].error.contains("500"));

    let bodies = ingest_posts(&server).await;
    let sizes: Vec<usize> = bodies.iter().map(|b| b["data"].as_array().unwrap().len()).collect();
    assert_eq!(sizes, vec![200, 200, 50]);
    let first_ids: Vec<&str> = bodies
        .iter()
        .map(|b| b["data"][0]["characterId"].as_str().unwrap())
        .collect();
    assert_eq!(first_ids, vec!["char-0", "char-200", "char-400"]);
}

#[tokio::test]
async fn test_all_batches_succeed_leaves_sink_empty() {
    let server = MockServer::start().await;
    mount_auth(&server, 7200).await;
    mount_accept(&server, CHARACTER_PATH).await;

    let sink = Arc::new(MemoryErrorSink::new());
    let config = IngestConfig {
        batch_size: 3,
        ..IngestConfig::default()
    };
    let ingestor = BatchIngestor::new(broker(&server), sink.clone(), config).unwrap();

    let report = ingestor.ingest(&records(7)).await.unwrap();
    assert_eq!(report.status, ReportStatus::Success);
    assert_eq!(report.total_batches, 3);
    assert_eq!(report.ingested_count, 7);
    assert!(sink.entries().await.unwrap().is_empty());

    let body = &ingest_posts(&server).await[0];
    let record = body["data"][0].as_object().unwrap();
    assert_eq!(record.len(), 12);
    assert_eq!(record["race"], "");
}

#[tokio::test]
async fn test_every_batch_failing_is_error() {
    let server = MockServer::start().await;
    mount_auth(&server, 7200).await;

    Mock::given(method("POST"))
        .and(path(CHARACTER_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sink = Arc::new(MemoryErrorSink::new());
    let config = IngestConfig {
        batch_size: 2,
        ..IngestConfig::default()
    };
    let ingestor = BatchIngestor::new(broker(&server), sink.clone(), config).unwrap();

    let report = ingestor.ingest(&records(3)).await.unwrap();
    assert_eq!(report.status, ReportStatus::Error);
    assert_eq!(report.ingested_count, 0);
    assert_eq!(report.failed_batches, 2);
    assert_eq!(sink.entries().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_cardinality_checked_before_any_request() {
    let server = MockServer::start().await;
    mount_auth(&server, 7200).await;

    let config = IngestConfig {
        max_records: 5,
        ..IngestConfig::default()
    };
    let ingestor =
        BatchIngestor::new(broker(&server), Arc::new(MemoryErrorSink::new()), config).unwrap();

    let empty: Vec<CharacterRecord> = Vec::new();
    assert!(ingestor.ingest(&empty).await.unwrap_err().is_validation());
    assert!(ingestor.ingest(&records(6)).await.unwrap_err().is_validation());

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_auth_failure_ends_run_with_error_report() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let ingestor = BatchIngestor::new(
        broker(&server),
        Arc::new(MemoryErrorSink::new()),
        IngestConfig::default(),
    )
    .unwrap();

    let report = ingestor.ingest(&records(10)).await.unwrap();
    assert_eq!(report.status, ReportStatus::Error);
    assert!(report.error.unwrap().contains("bad credentials"));
    assert!(ingest_posts(&server).await.is_empty());
}

#[tokio::test]
async fn test_rejects_out_of_range_batch_size() {
    let server = MockServer::start().await;
    for batch_size in [0, 1001] {
        let config = IngestConfig {
            batch_size,
            ..IngestConfig::default()
        };
        assert!(
            BatchIngestor::new(broker(&server), Arc::new(MemoryErrorSink::new()), config).is_err()
        );
    }
}

#[tokio::test]
async fn test_pipeline_drops_invalid_characters() {
    let server = MockServer::start().await;
    mount_auth(&server, 7200).await;
    mount_accept(&server, CHARACTER_PATH).await;

    let ingestor = BatchIngestor::new(
        broker(&server),
        Arc::new(MemoryErrorSink::new()),
        IngestConfig::default(),
    )
    .unwrap();
    let pipeline = Pipeline::new(Arc::new(ingestor));

    let mut entities = characters(3);
    entities[1].name = None;

    let report = pipeline.ingest_characters(&entities).await.unwrap();
    assert_eq!(report.status, ReportStatus::Success);
    assert_eq!(report.ingested_count, 2);

    let nameless = vec![Character {
        name: None,
        ..Character::new("x", "")
    }];
    assert!(pipeline.ingest_characters(&nameless).await.unwrap_err().is_validation());
}

#[tokio::test]
async fn test_quote_pipeline() {
    let server = MockServer::start().await;
    mount_auth(&server, 7200).await;
    mount_accept(&server, QUOTE_PATH).await;

    let ingestor = BatchIngestor::new(
        broker(&server),
        Arc::new(MemoryErrorSink::new()),
        IngestConfig::default(),
    )
    .unwrap();
    let pipeline = Pipeline::new(Arc::new(ingestor));

    let report = pipeline.ingest_quotes(&characters(2)).await.unwrap();
    assert_eq!(report.status, ReportStatus::Warning);
    assert_eq!(report.ingested_count, 0);
    assert!(server.received_requests().await.unwrap().is_empty());

    let entities = vec![
        Character::new("frodo", "Frodo")
            .with_quote("I will take the Ring to Mordor.", "The Fellowship of the Ring")
            .with_quote("", "The Two Towers"),
        Character::new("sam", "Sam").with_quote("Po-tay-toes!", "The Two Towers"),
    ];
    let report = pipeline.ingest_quotes(&entities).await.unwrap();
    assert_eq!(report.status, ReportStatus::Success);
    assert_eq!(report.ingested_count, 2);

    let body = &ingest_posts(&server).await[0];
    assert_eq!(body["data"][0]["quoteId"], "frodo_0");
    assert_eq!(body["data"][1]["quoteId"], "sam_0");
    assert_eq!(body["data"][1]["characterName"], "Sam");
}
