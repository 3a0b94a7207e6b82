//! Collection provisioning.
//!
//! Replaces a collection wholesale: derive payload features, recreate the
//! collection, bulk upload, build field indexes and check the result with a
//! smoke-test search. The run either produces a ready collection and a
//! [`ProvisionReport`] or leaves no collection behind.


pub mod upload;

use chrono::Local;
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::SearchError;
use crate::config::ProvisionConfig;
use crate::database::{
    Distance, Document, FieldSchema, Filter, IndexStore, Payload, Point, SearchParams,
    SearchRequest,
};

pub use upload::BulkUploader;

/// Payload fields indexed after upload.
pub const FIELD_INDEXES: [(&str, FieldSchema); 5] = [
    ("id", FieldSchema::Integer),
    ("date", FieldSchema::Datetime),
    ("title", FieldSchema::Text),
    ("sentence_length", FieldSchema::Integer),
    ("category", FieldSchema::Keyword),
];

/// `2024/01/31 09:15:02.123456`
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.6f";

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("No documents to provision")]
    EmptyInput,

    #[error("{vectors} vectors but {documents} documents; inputs must be aligned by position")]
    MisalignedInput { vectors: usize, documents: usize },

    #[error("Document id {id} appears more than once")]
    DuplicateId { id: u64 },

    #[error("Vector {index} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Chunk {chunk} failed after {attempts} attempts: {source}")]
    UploadFailed {
        chunk: usize,
        attempts: u32,
        #[source]
        source: SearchError,
    },

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error(transparent)]
    Store(#[from] SearchError),
}

/// Outcome of a successful provisioning run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionReport {
    pub timestamp: String,
    #[serde(rename = "upload_elapsed_time", serialize_with = "as_secs")]
    pub upload_elapsed: Duration,
    #[serde(rename = "search_elapsed_time", serialize_with = "as_secs")]
    pub verification_elapsed: Duration,
    pub document_count: usize,
    pub collection: String,
}

fn as_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

pub struct Provisioner {
    store: Arc<dyn IndexStore>,
    config: ProvisionConfig,
    expected_dimension: Option<usize>,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("config", &self.config)
            .field("expected_dimension", &self.expected_dimension)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    #[inline]
    pub fn new(store: Arc<dyn IndexStore>, config: ProvisionConfig) -> Self {
        Self {
            store,
            config,
            expected_dimension: None,
        }
    }

    /// Reject vectors whose length differs from the embedder's output size.
    #[inline]
    #[must_use]
    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    fn check_dimensions(&self, vectors: &[Vec<f32>]) -> Result<usize, ProvisionError> {
        let dimension = self
            .expected_dimension
            .unwrap_or_else(|| vectors.first().map_or(0, Vec::len));

        if dimension == 0 {
            return Err(SearchError::InvalidInput("vectors have no dimensions".to_string()).into());
        }

        match vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension)
        {
            Some((index, v)) => Err(ProvisionError::DimensionMismatch {
                index,
                expected: dimension,
                actual: v.len(),
            }),
            None => Ok(dimension),
        }
    }

    /// Replace `collection` with the given documents and their vectors.
    ///
    /// `vectors[i]` belongs to `documents[i]`. With a `row_limit` only the
    /// first `row_limit` pairs are loaded.
    pub async fn provision(
        &self,
        mut vectors: Vec<Vec<f32>>,
        mut documents: Vec<Document>,
        collection: &str,
        row_limit: Option<usize>,
    ) -> Result<ProvisionReport, ProvisionError> {
        if vectors.len() != documents.len() {
            return Err(ProvisionError::MisalignedInput {
                vectors: vectors.len(),
                documents: documents.len(),
            });
        }
        if let Some(limit) = row_limit {
            vectors.truncate(limit);
            documents.truncate(limit);
        }
        if documents.is_empty() {
            return Err(ProvisionError::EmptyInput);
        }

        if let Some(id) = documents.iter().map(|d| d.id).duplicates().next() {
            return Err(ProvisionError::DuplicateId { id });
        }
        let dimension = self.check_dimensions(&vectors)?;

        info!(
            collection,
            documents = documents.len(),
            dimension,
            parallelism = self.config.parallelism,
            max_retries = self.config.max_retries,
            chunk_size = self.config.chunk_size,
            row_limit = ?row_limit,
            "Provisioning collection"
        );

        let points: Vec<Point> = documents
            .into_iter()
            .zip(vectors)
            .map(|(doc, vector)| {
                let doc = doc.with_derived_features();
                Point {
                    id: doc.id,
                    vector,
                    payload: Payload::from(&doc),
                }
            })
            .collect();

        self.store.delete_collection(collection).await?;
        self.store
            .create_collection(collection, dimension, Distance::Cosine)
            .await?;

        match self.load(collection, &points).await {
            Ok(report) => {
                info!(
                    collection = %report.collection,
                    document_count = report.document_count,
                    upload_elapsed_time = report.upload_elapsed.as_secs_f64(),
                    search_elapsed_time = report.verification_elapsed.as_secs_f64(),
                    timestamp = %report.timestamp,
                    "Provisioning complete"
                );
                Ok(report)
            }
            Err(e) => {
                error!("Provisioning {} failed: {}", collection, e);
                if let Err(cleanup) = self.store.delete_collection(collection).await {
                    warn!(
                        "Could not remove partial collection {}: {}",
                        collection, cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// Everything after the collection exists. Any error here leaves a partial
    /// collection that the caller must remove.
    async fn load(
        &self,
        collection: &str,
        points: &[Point],
    ) -> Result<ProvisionReport, ProvisionError> {
        let upload_start = Instant::now();
        let uploaded = BulkUploader::new(self.store.clone(), &self.config)
            .upload(collection, points)
            .await?;
        let upload_elapsed = upload_start.elapsed();
        info!(
            "Uploaded {} points to {} in {:?}",
            uploaded, collection, upload_elapsed
        );

        for (field, schema) in FIELD_INDEXES {
            self.store
                .create_field_index(collection, field, schema)
                .await?;
        }

        if points.len() >= self.config.vector_index_min_rows {
            self.store.create_vector_index(collection).await?;
        } else {
            debug!(
                "{} points is below {}; skipping vector index",
                points.len(),
                self.config.vector_index_min_rows
            );
        }

        let verification_start = Instant::now();
        self.verify(collection, points).await?;
        let verification_elapsed = verification_start.elapsed();

        Ok(ProvisionReport {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            upload_elapsed,
            verification_elapsed,
            document_count: uploaded,
            collection: collection.to_string(),
        })
    }

    async fn verify(&self, collection: &str, points: &[Point]) -> Result<(), ProvisionError> {
        let count = self.store.count(collection).await?;
        if count != points.len() as u64 {
            return Err(ProvisionError::VerificationFailed(format!(
                "{} holds {} points after uploading {}",
                collection,
                count,
                points.len()
            )));
        }

        let Some(first) = points.first() else {
            return Err(ProvisionError::EmptyInput);
        };

        let request = SearchRequest {
            vector: first.vector.clone(),
            filter: Filter::from_category(Some(&self.config.verification_category)),
            limit: self.config.verification_limit,
            params: SearchParams::default(),
            with_vectors: false,
            with_payload: true,
        };

        let hits = self
            .store
            .search(collection, &request)
            .await
            .map_err(|e| ProvisionError::VerificationFailed(format!("search failed: {}", e)))?;

        if hits.is_empty() {
            warn!(
                "Verification search on {} matched no {:?} documents",
                collection, request.filter
            );
        } else {
            debug!("Verification search returned {} hits", hits.len());
        }
        Ok(())
    }
}
