//! Query composition.
//!
//! A query is some text, a set of reference document ids, or both. The
//! [`QueryComposer`] turns it into one query vector, runs a filtered
//! nearest-neighbour search and reports how long each stage took.


pub mod reference_ids;
pub mod vector;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::SearchConfig;
use crate::database::{Filter, IndexStore, ScoredPoint, SearchParams, SearchRequest};
use crate::embeddings::Embedder;
use crate::{Result, SearchError};

pub use reference_ids::parse_reference_ids;

/// One search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub text: Option<String>,
    pub reference_ids: BTreeSet<u64>,
    pub filter: Filter,
    pub limit: usize,
    pub with_vectors: bool,
    pub with_payload: bool,
}

impl QuerySpec {
    #[inline]
    pub fn new(limit: usize) -> Self {
        Self {
            text: None,
            reference_ids: BTreeSet::new(),
            filter: Filter::None,
            limit,
            with_vectors: false,
            with_payload: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_reference_ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.reference_ids = ids.into_iter().collect();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Blank or whitespace-only text counts as no text.
    fn query_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Wall-clock time spent in each stage. A stage that did not run is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    pub embedding: Option<Duration>,
    pub reference_fetch: Option<Duration>,
    pub search: Option<Duration>,
    pub total: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub results: Vec<ScoredPoint>,
    pub timings: Timings,
}

/// Resolves a [`QuerySpec`] into a query vector and searches one collection.
pub struct QueryComposer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
    collection: String,
    config: SearchConfig,
}

impl std::fmt::Debug for QueryComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryComposer")
            .field("collection", &self.collection)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl QueryComposer {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn IndexStore>,
        collection: impl Into<String>,
        config: SearchConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
            config,
        }
    }

    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn with_timeout<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.config.timeout(), fut)
            .await
            .map_err(|_| {
                SearchError::Timeout(format!(
                    "{} on {} after {:?}",
                    what,
                    self.collection,
                    self.config.timeout()
                ))
            })?
    }

    /// Average the stored vectors of the referenced documents. Ids that do
    /// not exist are skipped; if none resolve the result is `None`.
    async fn reference_vector(&self, ids: &BTreeSet<u64>) -> Result<Option<Vec<f32>>> {
        let ids: Vec<u64> = ids.iter().copied().collect();
        let records = self
            .with_timeout(
                "reference lookup",
                self.store.retrieve(&self.collection, &ids, true, false),
            )
            .await?;

        let vectors: Vec<Vec<f32>> = records.into_iter().filter_map(|r| r.vector).collect();
        if vectors.len() < ids.len() {
            debug!(
                "{} of {} reference ids resolved in {}",
                vectors.len(),
                ids.len(),
                self.collection
            );
        }
        vector::mean_vector(&vectors)
    }

    /// Build the query vector for `query` and run the search.
    pub async fn compose_and_search(&self, query: &QuerySpec) -> Result<SearchOutcome> {
        let start = Instant::now();
        let mut timings = Timings::default();

        let text_vector = match query.query_text() {
            Some(text) => {
                let embed_start = Instant::now();
                let v = self.embedder.encode(text).await?;
                timings.embedding = Some(embed_start.elapsed());
                Some(v)
            }
            None => None,
        };

        let reference_vector = if query.reference_ids.is_empty() {
            None
        } else {
            let fetch_start = Instant::now();
            let v = self.reference_vector(&query.reference_ids).await?;
            timings.reference_fetch = Some(fetch_start.elapsed());
            v
        };

        let query_vector = match (text_vector, reference_vector) {
            (Some(text), Some(reference)) => {
                vector::blend(&text, &reference, self.config.blend_weight)?
            }
            (Some(text), None) => text,
            (None, Some(reference)) => reference,
            (None, None) => {
                debug!("Query has neither text nor resolvable reference ids");
                return Ok(SearchOutcome::default());
            }
        };

        let request = SearchRequest {
            vector: query_vector,
            filter: query.filter.clone(),
            limit: query.limit,
            params: SearchParams {
                hnsw_ef: self.config.hnsw_ef,
                exact: self.config.exact,
            },
            with_vectors: query.with_vectors,
            with_payload: query.with_payload,
        };

        let search_start = Instant::now();
        let results = self
            .with_timeout("search", self.store.search(&self.collection, &request))
            .await?;
        timings.search = Some(search_start.elapsed());
        timings.total = Some(start.elapsed());

        info!(
            "Search on {} returned {} results in {:?}",
            self.collection,
            results.len(),
            start.elapsed()
        );

        Ok(SearchOutcome { results, timings })
    }
}
