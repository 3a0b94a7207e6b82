
use arrow::record_batch::{RecordBatch, RecordBatchIterator};
use async_trait::async_trait;
use futures::TryStreamExt;
use itertools::Itertools;
use lancedb::index::Index;
use lancedb::index::scalar::{BTreeIndexBuilder, BitmapIndexBuilder, FtsIndexBuilder};
use lancedb::index::vector::IvfHnswSqIndexBuilder;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{
    BatchRow, ID_COLUMN, PAYLOAD_COLUMNS, VECTOR_COLUMN, collection_schema, parse_record_batch,
    points_to_record_batch, schema_vector_dimension,
};
use crate::config::Config;
use crate::database::{
    Distance, FieldSchema, Filter, IndexStore, Point, Record, ScoredPoint, SearchRequest,
    sql_quote,
};
use crate::{Result, SearchError};

/// Index store backed by a LanceDB database. Each collection is one table.
pub struct VectorStore {
    connection: Connection,
    uri: String,
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore").field("uri", &self.uri).finish()
    }
}

fn store_error(context: &str, name: &str, e: lancedb::Error) -> SearchError {
    match e {
        lancedb::Error::TableNotFound { .. } => SearchError::CollectionNotFound(name.to_string()),
        e => SearchError::IndexStore(format!("{} ({}): {}", context, name, e)),
    }
}

impl VectorStore {
    /// Connect to the database configured in `config`
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        Self::connect(&config.index_uri()).await
    }

    /// Connect to a LanceDB URI. Local paths are created if missing.
    #[inline]
    pub async fn connect(uri: &str) -> Result<Self> {
        if !uri.contains("://") {
            std::fs::create_dir_all(Path::new(uri)).map_err(|e| {
                SearchError::IndexStore(format!(
                    "Failed to create vector database directory {}: {}",
                    uri, e
                ))
            })?;
        }

        debug!("Connecting to LanceDB at {}", uri);
        let connection = lancedb::connect(uri).execute().await.map_err(|e| {
            SearchError::IndexStore(format!("Failed to connect to LanceDB at {}: {}", uri, e))
        })?;

        info!("Vector store connected at {}", uri);
        Ok(Self {
            connection,
            uri: uri.to_string(),
        })
    }

    #[inline]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    async fn open_table(&self, name: &str) -> Result<Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| store_error("Failed to open collection", name, e))
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| SearchError::IndexStore(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.iter().any(|t| t == name))
    }

    /// Detect vector dimension from the collection schema
    async fn vector_dimension(&self, table: &Table) -> Result<usize> {
        let schema = table
            .schema()
            .await
            .map_err(|e| store_error("Failed to get schema", table.name(), e))?;

        schema_vector_dimension(&schema).ok_or_else(|| {
            SearchError::IndexStore(format!(
                "Could not determine vector dimension of {}",
                table.name()
            ))
        })
    }

    fn selected_columns(with_vectors: bool, with_payload: bool) -> Vec<&'static str> {
        let mut columns = vec![ID_COLUMN];
        if with_vectors {
            columns.push(VECTOR_COLUMN);
        }
        if with_payload {
            columns.extend(PAYLOAD_COLUMNS.iter().skip(1));
        }
        columns
    }

    async fn collect_rows(
        name: &str,
        stream: lancedb::arrow::SendableRecordBatchStream,
        with_vectors: bool,
        with_payload: bool,
    ) -> Result<Vec<BatchRow>> {
        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| store_error("Failed to read result stream", name, e))?;

        let mut rows = Vec::new();
        for batch in &batches {
            rows.extend(parse_record_batch(batch, with_vectors, with_payload)?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl IndexStore for VectorStore {
    async fn delete_collection(&self, name: &str) -> Result<()> {
        if self.table_exists(name).await? {
            info!("Dropping existing collection {}", name);
            self.connection
                .drop_table(name)
                .await
                .map_err(|e| store_error("Failed to drop collection", name, e))?;
        }
        Ok(())
    }

    async fn create_collection(
        &self,
        name: &str,
        vector_size: usize,
        distance: Distance,
    ) -> Result<()> {
        info!(
            "Creating collection {} with {} dimensions ({:?})",
            name, vector_size, distance
        );

        self.connection
            .create_empty_table(name, collection_schema(vector_size))
            .execute()
            .await
            .map_err(|e| store_error("Failed to create collection", name, e))?;
        Ok(())
    }

    async fn add_points(&self, name: &str, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            debug!("No points to add to {}", name);
            return Ok(());
        }

        let table = self.open_table(name).await?;
        let vector_dim = self.vector_dimension(&table).await?;
        let record_batch = points_to_record_batch(points, vector_dim)?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| store_error("Failed to add points", name, e))?;

        debug!("Added {} points to {}", points.len(), name);
        Ok(())
    }

    async fn create_field_index(&self, name: &str, field: &str, schema: FieldSchema) -> Result<()> {
        let table = self.open_table(name).await?;
        let table_schema = table
            .schema()
            .await
            .map_err(|e| store_error("Failed to get schema", name, e))?;

        // Indexing a field the payload does not carry is a no-op, not an error
        if table_schema.column_with_name(field).is_none() {
            warn!(
                "Field {} is not stored in {}; skipping {:?} index",
                field, name, schema
            );
            return Ok(());
        }

        let index = match schema {
            FieldSchema::Integer | FieldSchema::Datetime => {
                Index::BTree(BTreeIndexBuilder::default())
            }
            FieldSchema::Keyword => Index::Bitmap(BitmapIndexBuilder::default()),
            FieldSchema::Text => Index::FTS(FtsIndexBuilder::default()),
        };

        table
            .create_index(&[field], index)
            .execute()
            .await
            .map_err(|e| store_error(&format!("Failed to index field {}", field), name, e))?;

        debug!("Created {:?} index on {}.{}", schema, name, field);
        Ok(())
    }

    async fn create_vector_index(&self, name: &str) -> Result<()> {
        let table = self.open_table(name).await?;

        table
            .create_index(
                &[VECTOR_COLUMN],
                Index::IvfHnswSq(
                    IvfHnswSqIndexBuilder::default().distance_type(DistanceType::Cosine),
                ),
            )
            .execute()
            .await
            .map_err(|e| store_error("Failed to create vector index", name, e))?;

        info!("Vector index created on {}", name);
        Ok(())
    }

    async fn retrieve(
        &self,
        name: &str,
        ids: &[u64],
        with_vectors: bool,
        with_payload: bool,
    ) -> Result<Vec<Record>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let table = self.open_table(name).await?;
        let predicate = format!("{} IN ({})", ID_COLUMN, ids.iter().join(", "));

        let stream = table
            .query()
            .only_if(predicate)
            .limit(ids.len())
            .select(Select::columns(
                Self::selected_columns(with_vectors, with_payload).as_slice(),
            ))
            .execute()
            .await
            .map_err(|e| store_error("Failed to fetch points", name, e))?;

        let rows = Self::collect_rows(name, stream, with_vectors, with_payload).await?;
        debug!("Fetched {} of {} requested points", rows.len(), ids.len());

        Ok(rows
            .into_iter()
            .map(|row| Record {
                id: row.id,
                vector: row.vector,
                payload: row.payload,
            })
            .collect())
    }

    async fn search(&self, name: &str, request: &SearchRequest) -> Result<Vec<ScoredPoint>> {
        debug!(
            "Searching {} with limit {} and filter {:?}",
            name, request.limit, request.filter
        );

        let table = self.open_table(name).await?;
        let vector_dim = self.vector_dimension(&table).await?;
        if request.vector.len() != vector_dim {
            return Err(SearchError::DimensionMismatch {
                expected: vector_dim,
                actual: request.vector.len(),
            });
        }

        let mut query = table
            .vector_search(request.vector.as_slice())
            .map_err(|e| store_error("Failed to create vector search", name, e))?
            .column(VECTOR_COLUMN)
            .distance_type(DistanceType::Cosine)
            .limit(request.limit)
            .select(Select::columns(
                Self::selected_columns(request.with_vectors, request.with_payload).as_slice(),
            ));

        query = if request.params.exact {
            query.bypass_vector_index()
        } else {
            query.ef(request.params.hnsw_ef)
        };

        if let Filter::Category(category) = &request.filter {
            query = query.only_if(format!("category = {}", sql_quote(category)));
        }

        let stream = query
            .execute()
            .await
            .map_err(|e| store_error("Failed to execute search", name, e))?;

        let rows =
            Self::collect_rows(name, stream, request.with_vectors, request.with_payload).await?;

        let mut results: Vec<ScoredPoint> = rows
            .into_iter()
            .map(|row| ScoredPoint {
                id: row.id,
                // Cosine distance is 1 - similarity
                score: 1.0 - row.distance.unwrap_or(1.0),
                vector: row.vector,
                payload: row.payload,
            })
            .collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        debug!("Search on {} returned {} results", name, results.len());
        Ok(results)
    }

    async fn count(&self, name: &str) -> Result<u64> {
        let table = self.open_table(name).await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| store_error("Failed to count rows", name, e))?;

        Ok(count as u64)
    }
}
