// In-process index store
// Brute-force cosine search over points held in memory

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    Distance, FieldSchema, IndexStore, Point, Record, ScoredPoint, SearchRequest,
};
use crate::{Result, SearchError};

#[derive(Debug, Default)]
struct Collection {
    dimension: usize,
    points: Vec<Point>,
    field_indexes: Vec<(String, FieldSchema)>,
    vector_indexed: bool,
}

/// Index store that keeps every collection in memory. Searches are always
/// exact, so the ANN parameters are accepted and ignored.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Field indexes built on a collection, in creation order.
    #[inline]
    pub async fn field_indexes(&self, name: &str) -> Option<Vec<(String, FieldSchema)>> {
        self.collections
            .read()
            .await
            .get(name)
            .map(|c| c.field_indexes.clone())
    }

    #[inline]
    pub async fn has_vector_index(&self, name: &str) -> bool {
        self.collections
            .read()
            .await
            .get(name)
            .is_some_and(|c| c.vector_indexed)
    }

    #[inline]
    pub async fn collection_exists(&self, name: &str) -> bool {
        self.collections.read().await.contains_key(name)
    }

    /// All points of a collection ordered by id.
    #[inline]
    pub async fn points(&self, name: &str) -> Option<Vec<Point>> {
        self.collections.read().await.get(name).map(|c| {
            let mut points = c.points.clone();
            points.sort_by_key(|p| p.id);
            points
        })
    }
}

fn missing(name: &str) -> SearchError {
    SearchError::CollectionNotFound(name.to_string())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine similarity; zero vectors are dissimilar to everything.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let na = norm(a);
    let nb = norm(b);
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot(a, b) / (na * nb)
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn delete_collection(&self, name: &str) -> Result<()> {
        if self.collections.write().await.remove(name).is_some() {
            debug!("Deleted in-memory collection {}", name);
        }
        Ok(())
    }

    async fn create_collection(
        &self,
        name: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(SearchError::IndexStore(format!(
                "collection {} already exists",
                name
            )));
        }
        debug!(
            "Creating in-memory collection {} ({} dims, {:?})",
            name, vector_size, distance
        );
        collections.insert(
            name.to_string(),
            Collection {
                dimension: vector_size,
                ..Collection::default()
            },
        );
        Ok(())
    }

    async fn add_points(&self, name: &str, points: &[Point]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != collection.dimension) {
            return Err(SearchError::DimensionMismatch {
                expected: collection.dimension,
                actual: bad.vector.len(),
            });
        }

        for point in points {
            collection.points.retain(|p| p.id != point.id);
            collection.points.push(point.clone());
        }
        Ok(())
    }

    async fn create_field_index(&self, name: &str, field: &str, schema: FieldSchema) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;
        collection
            .field_indexes
            .push((field.to_string(), schema));
        Ok(())
    }

    async fn create_vector_index(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| missing(name))?;
        collection.vector_indexed = true;
        Ok(())
    }

    async fn retrieve(
        &self,
        name: &str,
        ids: &[u64],
        with_vectors: bool,
        with_payload: bool,
    ) -> Result<Vec<Record>> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| missing(name))?;

        Ok(collection
            .points
            .iter()
            .filter(|p| ids.contains(&p.id))
            .map(|p| Record {
                id: p.id,
                vector: with_vectors.then(|| p.vector.clone()),
                payload: with_payload.then(|| p.payload.clone()),
            })
            .collect())
    }

    async fn search(&self, name: &str, request: &SearchRequest) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| missing(name))?;

        if request.vector.len() != collection.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: collection.dimension,
                actual: request.vector.len(),
            });
        }

        let mut hits: Vec<ScoredPoint> = collection
            .points
            .iter()
            .filter(|p| request.filter.matches(&p.payload))
            .map(|p| ScoredPoint {
                id: p.id,
                score: cosine_similarity(&request.vector, &p.vector),
                vector: request.with_vectors.then(|| p.vector.clone()),
                payload: request.with_payload.then(|| p.payload.clone()),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        hits.truncate(request.limit);
        Ok(hits)
    }

    async fn count(&self, name: &str) -> Result<u64> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| missing(name))?;
        Ok(collection.points.len() as u64)
    }
}
