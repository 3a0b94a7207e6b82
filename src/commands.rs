use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::SearchError;
use crate::config::{Config, validate_collection_name};
use crate::database::{Filter, IndexStore, ScoredPoint, VectorStore};
use crate::dataset::{load_documents, load_vectors};
use crate::embeddings::{Embedder, OllamaClient};
use crate::provision::{ProvisionReport, Provisioner};
use crate::search::{QueryComposer, QuerySpec, SearchOutcome, parse_reference_ids};

/// Where to find the collection. Unset fields fall back to the config file.
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub collection: Option<String>,
    pub index_uri: Option<String>,
}

impl Target {
    fn collection(&self, config: &Config) -> Result<String> {
        let collection = self
            .collection
            .clone()
            .unwrap_or_else(|| config.index.collection.clone());
        validate_collection_name(&collection)?;
        Ok(collection)
    }

    async fn open_store(&self, config: &Config) -> Result<VectorStore> {
        let uri = self
            .index_uri
            .clone()
            .unwrap_or_else(|| config.index_uri());
        VectorStore::connect(&uri)
            .await
            .with_context(|| format!("Failed to open vector index at {}", uri))
    }
}

/// Search options as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct SearchArgs {
    pub text: Option<String>,
    pub ids: Option<String>,
    pub category: Option<String>,
    pub limit: Option<usize>,
    pub with_vectors: bool,
    pub with_payload: bool,
}

impl SearchArgs {
    /// Normalize loosely typed input into a query. Noise in the id list is
    /// dropped and a blank category means no filter. A limit must be positive.
    #[inline]
    pub fn to_query(&self, default_limit: usize) -> crate::Result<QuerySpec> {
        let limit = self.limit.unwrap_or(default_limit);
        if limit == 0 {
            return Err(SearchError::InvalidInput(
                "result limit must be at least 1".to_string(),
            ));
        }

        Ok(QuerySpec {
            text: self.text.clone(),
            reference_ids: self
                .ids
                .as_deref()
                .map(parse_reference_ids)
                .unwrap_or_default(),
            filter: Filter::from_category(self.category.as_deref()),
            limit,
            with_vectors: self.with_vectors,
            with_payload: self.with_payload,
        })
    }
}

/// JSON body printed by `search`. Times are in seconds; a stage that did not
/// run is `null`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<ScoredPoint>,
    pub embedding_time: Option<f64>,
    pub reference_time: Option<f64>,
    pub search_time: Option<f64>,
    pub total_time: Option<f64>,
}

impl From<SearchOutcome> for SearchResponse {
    #[inline]
    fn from(outcome: SearchOutcome) -> Self {
        let secs = |d: Option<Duration>| d.map(|d| d.as_secs_f64());
        Self {
            results: outcome.results,
            embedding_time: secs(outcome.timings.embedding),
            reference_time: secs(outcome.timings.reference_fetch),
            search_time: secs(outcome.timings.search),
            total_time: secs(outcome.timings.total),
        }
    }
}

fn ollama_client(config: &Config) -> Result<OllamaClient> {
    OllamaClient::new(&config.ollama).context("Failed to create Ollama client")
}

/// Load a dataset from disk, replace the collection with it and write the
/// provisioning report to `output`.
#[inline]
pub async fn provision_collection(
    config: &Config,
    target: &Target,
    documents_path: &Path,
    vectors_path: &Path,
    output: &Path,
    limit: Option<usize>,
) -> Result<ProvisionReport> {
    let collection = target.collection(config)?;
    let documents = load_documents(documents_path)?;
    let vectors = load_vectors(vectors_path)?;
    info!(
        "Loaded {} documents and {} vectors",
        documents.len(),
        vectors.len()
    );

    let store: Arc<dyn IndexStore> = Arc::new(target.open_store(config).await?);
    provision_with_store(config, store, vectors, documents, &collection, output, limit).await
}

/// Provision from in-memory data into an already opened store. A `limit` of
/// zero loads everything.
#[inline]
pub async fn provision_with_store(
    config: &Config,
    store: Arc<dyn IndexStore>,
    vectors: Vec<Vec<f32>>,
    documents: Vec<crate::database::Document>,
    collection: &str,
    output: &Path,
    limit: Option<usize>,
) -> Result<ProvisionReport> {
    let limit = limit.filter(|&n| n > 0);
    let provisioner = Provisioner::new(store, config.provision.clone())
        .with_expected_dimension(config.ollama.embedding_dimension as usize);

    let report = provisioner
        .provision(vectors, documents, collection, limit)
        .await
        .with_context(|| format!("Failed to provision collection {}", collection))?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    fs::write(output, json)
        .with_context(|| format!("Failed to write report to {}", output.display()))?;

    println!(
        "Provisioned {} documents into {} (upload {:.3}s, verification {:.3}s)",
        report.document_count,
        report.collection,
        report.upload_elapsed.as_secs_f64(),
        report.verification_elapsed.as_secs_f64()
    );
    println!("Report written to {}", output.display());

    Ok(report)
}

/// Run one query against an already opened store and embedder.
#[inline]
pub async fn search_with(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn IndexStore>,
    collection: &str,
    args: &SearchArgs,
) -> Result<SearchResponse> {
    let composer = QueryComposer::new(embedder, store, collection, config.search.clone());
    let query = args
        .to_query(config.search.default_limit)
        .context("Invalid search arguments")?;

    match composer.compose_and_search(&query).await {
        Ok(outcome) => Ok(SearchResponse::from(outcome)),
        Err(e) if e.is_dependency_failure() => {
            warn!("Search dependency unavailable: {}", e);
            Err(e).context("Search backend unavailable")
        }
        Err(e) => Err(e).context("Search failed"),
    }
}

/// Search the configured collection and print the response as JSON.
#[inline]
pub async fn run_search(config: &Config, target: &Target, args: &SearchArgs) -> Result<()> {
    let collection = target.collection(config)?;
    let store: Arc<dyn IndexStore> = Arc::new(target.open_store(config).await?);
    let embedder: Arc<dyn Embedder> = Arc::new(ollama_client(config)?);

    let response = search_with(config, embedder, store, &collection, args).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&response).context("Failed to serialize results")?
    );
    Ok(())
}

/// Embed a sentence and print the vector as JSON.
#[inline]
pub async fn embed_sentence(config: &Config, sentence: &str) -> Result<()> {
    let client = ollama_client(config)?;
    let embedding = client
        .encode(sentence)
        .await
        .context("Failed to embed sentence")?;

    println!(
        "{}",
        serde_json::json!({ "embedding": embedding })
    );
    Ok(())
}
