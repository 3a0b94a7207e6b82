use super::*;
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("should write fixture");
    path
}

#[test]
fn loads_documents_and_skips_blank_lines() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write(
        &dir,
        "documents.jsonl",
        concat!(
            r#"{"id":1,"date":"2012-09-01","category":"sports-watch","title":"A","sentence":"Body","url":"https://a"}"#,
            "\n\n",
            r#"{"id":2,"date":"2012-09-02","category":"movie-enter","title":"B","sentence":"Other","url":"https://b"}"#,
            "\n"
        ),
    );

    let documents = load_documents(&path).expect("should load documents");
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[1].id, 2);
    assert_eq!(documents[1].category, "movie-enter");
    assert!(documents[0].title_summary.is_empty());
}

#[test]
fn bad_document_reports_line_number() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write(
        &dir,
        "documents.jsonl",
        concat!(
            r#"{"id":1,"date":"d","category":"c","title":"t","sentence":"s","url":"u"}"#,
            "\n",
            r#"{"id":"two"}"#,
            "\n"
        ),
    );

    let err = load_documents(&path).expect_err("second line is invalid");
    assert!(format!("{}", err).contains("line 2"), "{:#}", err);
}

#[test]
fn loads_vectors() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write(&dir, "vectors.jsonl", "[0.1, 0.2]\n[0.3, 0.4]\n");

    let vectors = load_vectors(&path).expect("should load vectors");
    assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
}

#[test]
fn ragged_vectors_are_rejected() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write(&dir, "vectors.jsonl", "[0.1, 0.2]\n[0.3]\n");

    let err = load_vectors(&path).expect_err("dimensions differ");
    assert!(err.to_string().contains("Vector 2"), "{:#}", err);
}

#[test]
fn missing_file_is_an_error() {
    let dir = TempDir::new().expect("should create temp dir");
    let err = load_vectors(dir.path().join("absent.jsonl")).expect_err("no file");
    assert!(err.to_string().contains("Failed to open vector file"));
}
