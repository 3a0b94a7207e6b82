//! Index store abstraction.
//!
//! The serving path and the provisioner both talk to the vector index through
//! [`IndexStore`]. Two implementations ship with the crate: [`lancedb::VectorStore`]
//! backed by LanceDB, and [`memory::MemoryStore`], an in-process brute-force
//! store used by tests and dry runs.


pub mod lancedb;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use self::lancedb::VectorStore;
pub use self::memory::MemoryStore;

/// A source document as read from the dataset.
///
/// The derived fields are empty until [`Document::with_derived_features`] runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub date: String,
    pub category: String,
    pub title: String,
    pub sentence: String,
    pub url: String,
    #[serde(default)]
    pub title_summary: String,
    #[serde(default)]
    pub sentence_summary: String,
    #[serde(default)]
    pub sentence_length: u64,
}

pub const TITLE_SUMMARY_CHARS: usize = 40;
pub const SENTENCE_SUMMARY_CHARS: usize = 300;

impl Document {
    /// Fill in `sentence_length` (bytes) and the character-bounded summaries.
    #[inline]
    #[must_use]
    pub fn with_derived_features(mut self) -> Self {
        self.sentence_length = self.sentence.len() as u64;
        self.title_summary = self.title.chars().take(TITLE_SUMMARY_CHARS).collect();
        self.sentence_summary = self
            .sentence
            .chars()
            .take(SENTENCE_SUMMARY_CHARS)
            .collect();
        self
    }
}

/// Metadata stored next to each vector. Mirrors exactly the fields that are
/// uploaded for a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub id: u64,
    pub date: String,
    pub category: String,
    pub title_summary: String,
    pub sentence_summary: String,
    pub sentence_length: u64,
    pub url: String,
}

impl From<&Document> for Payload {
    #[inline]
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            date: doc.date.clone(),
            category: doc.category.clone(),
            title_summary: doc.title_summary.clone(),
            sentence_summary: doc.sentence_summary.clone(),
            sentence_length: doc.sentence_length,
            url: doc.url.clone(),
        }
    }
}

/// One row of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: u64,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// A row returned by id lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

/// A ranked search hit. Higher scores are more similar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: u64,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
}

/// Kind of secondary index to build over a payload field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSchema {
    Integer,
    Datetime,
    Text,
    Keyword,
}

/// Payload predicate applied to a search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Filter {
    /// Match every point
    #[default]
    None,
    /// Exact match on the `category` field
    Category(String),
}

impl Filter {
    /// Build a filter from an optional category. Blank strings mean "no
    /// filter"; this is where loosely typed input gets normalized.
    #[inline]
    pub fn from_category(category: Option<&str>) -> Self {
        match category.map(str::trim) {
            Some(c) if !c.is_empty() => Self::Category(c.to_string()),
            _ => Self::None,
        }
    }

    #[inline]
    pub fn matches(&self, payload: &Payload) -> bool {
        match self {
            Self::None => true,
            Self::Category(category) => payload.category == *category,
        }
    }
}

/// ANN tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    /// Size of the HNSW candidate list. Higher means better recall and more
    /// latency.
    pub hnsw_ef: usize,
    /// Bypass the ANN index and compare against every vector
    pub exact: bool,
}

impl Default for SearchParams {
    #[inline]
    fn default() -> Self {
        Self {
            hnsw_ef: 128,
            exact: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub vector: Vec<f32>,
    pub filter: Filter,
    pub limit: usize,
    pub params: SearchParams,
    pub with_vectors: bool,
    pub with_payload: bool,
}

/// Operations the search and provisioning paths need from a vector index.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Drop a collection. Succeeds if it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Create an empty collection with a fixed vector size.
    async fn create_collection(&self, name: &str, vector_size: usize, distance: Distance)
    -> Result<()>;

    /// Append one chunk of points to an existing collection.
    async fn add_points(&self, name: &str, points: &[Point]) -> Result<()>;

    /// Build a secondary index over a payload field.
    async fn create_field_index(&self, name: &str, field: &str, schema: FieldSchema) -> Result<()>;

    /// Build the ANN index over the vector column.
    async fn create_vector_index(&self, name: &str) -> Result<()>;

    /// Look up points by id. Ids that do not exist are absent from the result.
    async fn retrieve(
        &self,
        name: &str,
        ids: &[u64],
        with_vectors: bool,
        with_payload: bool,
    ) -> Result<Vec<Record>>;

    /// Nearest-neighbour search, best match first.
    async fn search(&self, name: &str, request: &SearchRequest) -> Result<Vec<ScoredPoint>>;

    async fn count(&self, name: &str) -> Result<u64>;
}

/// Escape a value for use inside a single-quoted SQL string literal.
#[inline]
pub(crate) fn sql_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
