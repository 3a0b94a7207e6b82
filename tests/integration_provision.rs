#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Provisioning a LanceDB collection from dataset files on disk

use semsearch::commands::{Target, provision_collection};
use semsearch::config::{Config, OllamaConfig, ProvisionConfig};
use semsearch::database::{Filter, IndexStore, SearchParams, SearchRequest, VectorStore};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DIMENSION: usize = 4;
const CATEGORIES: [&str; 3] = ["sports-watch", "it-life-hack", "movie-enter"];

fn create_test_config(temp_dir: &TempDir) -> Config {
    Config {
        ollama: OllamaConfig {
            embedding_dimension: DIMENSION as u32,
            ..OllamaConfig::default()
        },
        provision: ProvisionConfig {
            chunk_size: 3,
            parallelism: 2,
            retry_backoff_ms: 1,
            ..ProvisionConfig::default()
        },
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    }
}

/// Write `n` documents and vectors. Document `i` has id `1000 + i` and a
/// vector pointing mostly along axis `i % 3`.
fn write_dataset(dir: &Path, n: usize) -> (PathBuf, PathBuf) {
    let mut documents = String::new();
    let mut vectors = String::new();

    for i in 0..n {
        let category = CATEGORIES[i % CATEGORIES.len()];
        let doc = serde_json::json!({
            "id": 1000 + i,
            "date": format!("2012-09-{:02}T10:00:00+0900", i % 28 + 1),
            "category": category,
            "title": format!("{} 記事タイトル {}", category, i),
            "sentence": "本文です。".repeat(80),
            "url": format!("https://news.example.com/article/{}", i),
        });
        documents.push_str(&doc.to_string());
        documents.push('\n');

        let mut vector = vec![0.1_f32; DIMENSION];
        vector[i % 3] = 1.0;
        vector[3] = i as f32 / 100.0;
        vectors.push_str(&serde_json::to_string(&vector).expect("vector serializes"));
        vectors.push('\n');
    }

    let documents_path = dir.join("documents.jsonl");
    let vectors_path = dir.join("vectors.jsonl");
    fs::write(&documents_path, documents).expect("should write documents");
    fs::write(&vectors_path, vectors).expect("should write vectors");
    (documents_path, vectors_path)
}

fn target(temp_dir: &TempDir) -> Target {
    Target {
        collection: Some("livedoor".to_string()),
        index_uri: Some(temp_dir.path().join("index").to_string_lossy().into_owned()),
    }
}

#[tokio::test]
async fn provision_writes_report_and_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_test_config(&temp_dir);
    let (documents, vectors) = write_dataset(temp_dir.path(), 12);
    let output = temp_dir.path().join("reports").join("result.json");
    let target = target(&temp_dir);

    let report = provision_collection(&config, &target, &documents, &vectors, &output, None)
        .await
        .expect("provisioning should succeed");
    assert_eq!(report.document_count, 12);

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).expect("report exists"))
            .expect("report is JSON");
    assert_eq!(written["collection"], "livedoor");
    assert_eq!(written["document_count"], 12);
    assert!(written["upload_elapsed_time"].as_f64().is_some());
    assert!(written["search_elapsed_time"].as_f64().is_some());
    assert!(written["timestamp"].as_str().is_some_and(|t| t.contains('/')));

    let store = VectorStore::connect(target.index_uri.as_deref().expect("uri set"))
        .await
        .expect("should reopen store");
    assert_eq!(store.count("livedoor").await.expect("count"), 12);

    let records = store
        .retrieve("livedoor", &[1000], false, true)
        .await
        .expect("retrieve should succeed");
    let payload = records[0].payload.as_ref().expect("payload requested");
    assert_eq!(payload.title_summary.chars().count(), "sports-watch 記事タイトル 0".chars().count());
    assert_eq!(payload.sentence_summary.chars().count(), 300);
    assert_eq!(payload.sentence_length, "本文です。".repeat(80).len() as u64);
}

#[tokio::test]
async fn reprovision_is_idempotent_and_honours_limit() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_test_config(&temp_dir);
    let (documents, vectors) = write_dataset(temp_dir.path(), 9);
    let output = temp_dir.path().join("result.json");
    let target = target(&temp_dir);

    provision_collection(&config, &target, &documents, &vectors, &output, None)
        .await
        .expect("first run should succeed");
    provision_collection(&config, &target, &documents, &vectors, &output, Some(5))
        .await
        .expect("second run should succeed");

    let store = VectorStore::connect(target.index_uri.as_deref().expect("uri set"))
        .await
        .expect("should reopen store");
    assert_eq!(store.count("livedoor").await.expect("count"), 5);

    let records = store
        .retrieve("livedoor", &[1004, 1005], true, false)
        .await
        .expect("retrieve should succeed");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, 1004);
    // Document 4 was paired with the vector pointing along axis 1
    assert_eq!(records[0].vector.as_ref().map(|v| v[1]), Some(1.0));
}

#[tokio::test]
async fn zero_limit_loads_everything() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_test_config(&temp_dir);
    let (documents, vectors) = write_dataset(temp_dir.path(), 6);
    let output = temp_dir.path().join("result.json");

    let report = provision_collection(&config, &target(&temp_dir), &documents, &vectors, &output, Some(0))
        .await
        .expect("provisioning should succeed");

    assert_eq!(report.document_count, 6);
}

#[tokio::test]
async fn duplicate_ids_leave_no_collection() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_test_config(&temp_dir);
    let (documents, vectors) = write_dataset(temp_dir.path(), 3);
    let repeated = fs::read_to_string(&documents).expect("documents exist");
    let first = repeated.lines().next().expect("one line").to_string();
    fs::write(&documents, format!("{}{}\n", repeated, first)).expect("should write documents");
    let mut vector_lines = fs::read_to_string(&vectors).expect("vectors exist");
    vector_lines.push_str("[1.0, 0.1, 0.1, 0.0]\n");
    fs::write(&vectors, vector_lines).expect("should write vectors");
    let output = temp_dir.path().join("result.json");
    let target = target(&temp_dir);

    let err = provision_collection(&config, &target, &documents, &vectors, &output, None)
        .await
        .expect_err("duplicate ids should fail");

    assert!(format!("{:#}", err).contains("1000 appears more than once"), "{:#}", err);
    assert!(!output.exists());

    let store = VectorStore::connect(target.index_uri.as_deref().expect("uri set"))
        .await
        .expect("should reopen store");
    assert!(store.count("livedoor").await.is_err());
}

#[tokio::test]
async fn provisioned_collection_filters_by_category() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_test_config(&temp_dir);
    let (documents, vectors) = write_dataset(temp_dir.path(), 15);
    let output = temp_dir.path().join("result.json");
    let target = target(&temp_dir);

    provision_collection(&config, &target, &documents, &vectors, &output, None)
        .await
        .expect("provisioning should succeed");

    let store = VectorStore::connect(target.index_uri.as_deref().expect("uri set"))
        .await
        .expect("should reopen store");

    for category in CATEGORIES {
        let hits = store
            .search(
                "livedoor",
                &SearchRequest {
                    vector: vec![1.0, 0.1, 0.1, 0.0],
                    filter: Filter::Category(category.to_string()),
                    limit: 10,
                    params: SearchParams::default(),
                    with_vectors: false,
                    with_payload: true,
                },
            )
            .await
            .expect("search should succeed");

        assert_eq!(hits.len(), 5, "{}", category);
        assert!(
            hits.iter()
                .all(|h| h.payload.as_ref().is_some_and(|p| p.category == category))
        );
    }
}

#[tokio::test]
async fn wrong_embedding_size_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = create_test_config(&temp_dir);
    config.ollama.embedding_dimension = 768;
    let (documents, vectors) = write_dataset(temp_dir.path(), 3);
    let output = temp_dir.path().join("result.json");

    let err = provision_collection(&config, &target(&temp_dir), &documents, &vectors, &output, None)
        .await
        .expect_err("dimension mismatch should fail");

    assert!(format!("{:#}", err).contains("expected 768"), "{:#}", err);
    assert!(!output.exists(), "no report on failure");
}

#[tokio::test]
async fn misaligned_dataset_is_rejected() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = create_test_config(&temp_dir);
    let (documents, _) = write_dataset(temp_dir.path(), 4);
    let vectors = temp_dir.path().join("short.jsonl");
    fs::write(&vectors, "[1.0, 0.0, 0.0, 0.0]\n").expect("should write vectors");
    let output = temp_dir.path().join("result.json");

    let err = provision_collection(&config, &target(&temp_dir), &documents, &vectors, &output, None)
        .await
        .expect_err("misaligned input should fail");

    assert!(format!("{:#}", err).contains("aligned"), "{:#}", err);
    assert!(!output.exists());
}
