// LanceDB vector database module
// Arrow schema and record batch conversion for collections stored in LanceDB

#[cfg(test)]
mod tests;

pub mod vector_store;

use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, StringArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

use super::{Payload, Point};
use crate::SearchError;

pub use vector_store::VectorStore;

pub(crate) const ID_COLUMN: &str = "id";
pub(crate) const VECTOR_COLUMN: &str = "vector";
pub(crate) const DISTANCE_COLUMN: &str = "_distance";

/// Payload columns in schema order
pub(crate) const PAYLOAD_COLUMNS: [&str; 7] = [
    "id",
    "date",
    "category",
    "title_summary",
    "sentence_summary",
    "sentence_length",
    "url",
];

fn vector_item_field() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, false))
}

/// Create the collection schema for vectors of the given dimension
pub(crate) fn collection_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(ID_COLUMN, DataType::UInt64, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(vector_item_field(), vector_dim as i32),
            false,
        ),
        Field::new("date", DataType::Utf8, false),
        Field::new("category", DataType::Utf8, false),
        Field::new("title_summary", DataType::Utf8, false),
        Field::new("sentence_summary", DataType::Utf8, false),
        Field::new("sentence_length", DataType::UInt64, false),
        Field::new("url", DataType::Utf8, false),
    ]))
}

/// Read the vector dimension out of a collection schema
pub(crate) fn schema_vector_dimension(schema: &Schema) -> Option<usize> {
    schema
        .field_with_name(VECTOR_COLUMN)
        .ok()
        .and_then(|field| match field.data_type() {
            DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
            _ => None,
        })
}

/// Build a RecordBatch from points. Every point must have `vector_dim` values.
pub(crate) fn points_to_record_batch(
    points: &[Point],
    vector_dim: usize,
) -> Result<RecordBatch, SearchError> {
    let len = points.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);
    let mut dates = Vec::with_capacity(len);
    let mut categories = Vec::with_capacity(len);
    let mut title_summaries = Vec::with_capacity(len);
    let mut sentence_summaries = Vec::with_capacity(len);
    let mut sentence_lengths = Vec::with_capacity(len);
    let mut urls = Vec::with_capacity(len);

    for point in points {
        if point.vector.len() != vector_dim {
            return Err(SearchError::DimensionMismatch {
                expected: vector_dim,
                actual: point.vector.len(),
            });
        }
        ids.push(point.id);
        flat_values.extend_from_slice(&point.vector);
        dates.push(point.payload.date.as_str());
        categories.push(point.payload.category.as_str());
        title_summaries.push(point.payload.title_summary.as_str());
        sentence_summaries.push(point.payload.sentence_summary.as_str());
        sentence_lengths.push(point.payload.sentence_length);
        urls.push(point.payload.url.as_str());
    }

    let vector_array = FixedSizeListArray::try_new(
        vector_item_field(),
        vector_dim as i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| SearchError::IndexStore(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(dates)),
        Arc::new(StringArray::from(categories)),
        Arc::new(StringArray::from(title_summaries)),
        Arc::new(StringArray::from(sentence_summaries)),
        Arc::new(UInt64Array::from(sentence_lengths)),
        Arc::new(StringArray::from(urls)),
    ];

    RecordBatch::try_new(collection_schema(vector_dim), arrays)
        .map_err(|e| SearchError::IndexStore(format!("Failed to create record batch: {}", e)))
}

/// One row pulled back out of a result batch
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BatchRow {
    pub id: u64,
    pub vector: Option<Vec<f32>>,
    pub payload: Option<Payload>,
    pub distance: Option<f32>,
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T, SearchError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| SearchError::IndexStore(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| SearchError::IndexStore(format!("Invalid {} column type", name)))
}

/// Parse a result batch. Vectors and payloads are only read when asked for;
/// the corresponding columns may be absent otherwise.
pub(crate) fn parse_record_batch(
    batch: &RecordBatch,
    with_vectors: bool,
    with_payload: bool,
) -> Result<Vec<BatchRow>, SearchError> {
    let ids = column::<UInt64Array>(batch, ID_COLUMN)?;

    let vectors = if with_vectors {
        Some(column::<FixedSizeListArray>(batch, VECTOR_COLUMN)?)
    } else {
        None
    };

    let payload_columns = if with_payload {
        Some((
            column::<StringArray>(batch, "date")?,
            column::<StringArray>(batch, "category")?,
            column::<StringArray>(batch, "title_summary")?,
            column::<StringArray>(batch, "sentence_summary")?,
            column::<UInt64Array>(batch, "sentence_length")?,
            column::<StringArray>(batch, "url")?,
        ))
    } else {
        None
    };

    let distances = batch
        .column_by_name(DISTANCE_COLUMN)
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let vector = match vectors {
            Some(list) => {
                let values = list.value(row);
                let values = values
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .ok_or_else(|| {
                        SearchError::IndexStore("Invalid vector item type".to_string())
                    })?;
                Some(values.values().to_vec())
            }
            None => None,
        };

        let payload = payload_columns.map(
            |(dates, categories, title_summaries, sentence_summaries, lengths, urls)| Payload {
                id: ids.value(row),
                date: dates.value(row).to_string(),
                category: categories.value(row).to_string(),
                title_summary: title_summaries.value(row).to_string(),
                sentence_summary: sentence_summaries.value(row).to_string(),
                sentence_length: lengths.value(row),
                url: urls.value(row).to_string(),
            },
        );

        let distance = distances.and_then(|d| (!d.is_null(row)).then(|| d.value(row)));

        rows.push(BatchRow {
            id: ids.value(row),
            vector,
            payload,
            distance,
        });
    }

    Ok(rows)
}
