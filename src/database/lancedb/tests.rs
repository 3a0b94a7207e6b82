use super::*;

fn point(id: u64, vector: Vec<f32>) -> Point {
    Point {
        id,
        vector,
        payload: Payload {
            id,
            date: "2012-01-01".to_string(),
            category: "topic-news".to_string(),
            title_summary: "title".to_string(),
            sentence_summary: "sentence".to_string(),
            sentence_length: 8,
            url: "https://example.com".to_string(),
        },
    }
}

#[test]
fn schema_carries_vector_dimension() {
    let schema = collection_schema(384);
    assert_eq!(schema_vector_dimension(&schema), Some(384));
    for column in PAYLOAD_COLUMNS {
        assert!(schema.column_with_name(column).is_some(), "{}", column);
    }
    assert!(schema.column_with_name("title").is_none());
}

#[test]
fn record_batch_preserves_rows() {
    let points = vec![point(7, vec![0.1, 0.2]), point(9, vec![0.3, 0.4])];
    let batch = points_to_record_batch(&points, 2).expect("should build batch");

    assert_eq!(batch.num_rows(), 2);

    let rows = parse_record_batch(&batch, true, true).expect("should parse batch");
    assert_eq!(rows[0].id, 7);
    assert_eq!(rows[0].vector, Some(vec![0.1, 0.2]));
    assert_eq!(rows[1].payload, Some(points[1].payload.clone()));
    assert_eq!(rows[1].distance, None);
}

#[test]
fn parse_without_optional_columns() {
    let points = vec![point(1, vec![1.0, 0.0])];
    let batch = points_to_record_batch(&points, 2).expect("should build batch");

    let rows = parse_record_batch(&batch, false, false).expect("should parse batch");
    assert_eq!(rows.len(), 1);
    assert!(rows[0].vector.is_none());
    assert!(rows[0].payload.is_none());
}

#[test]
fn record_batch_rejects_dimension_mismatch() {
    let points = vec![point(1, vec![1.0, 0.0]), point(2, vec![1.0])];
    let err = points_to_record_batch(&points, 2).expect_err("should reject short vector");
    assert!(matches!(
        err,
        SearchError::DimensionMismatch {
            expected: 2,
            actual: 1
        }
    ));
}
