// Chunked, bounded-parallel upload of points with per-chunk retry

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::ProvisionError;
use crate::SearchError;
use crate::config::ProvisionConfig;
use crate::database::{IndexStore, Point};

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// Uploads points to a collection in fixed-size chunks.
///
/// At most `parallelism` chunks are in flight. A chunk that fails is retried
/// up to `max_retries` more times with exponential backoff; a chunk that still
/// fails aborts the whole upload.
pub struct BulkUploader {
    store: Arc<dyn IndexStore>,
    chunk_size: usize,
    parallelism: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

impl std::fmt::Debug for BulkUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkUploader")
            .field("chunk_size", &self.chunk_size)
            .field("parallelism", &self.parallelism)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .finish_non_exhaustive()
    }
}

impl BulkUploader {
    #[inline]
    pub fn new(store: Arc<dyn IndexStore>, config: &ProvisionConfig) -> Self {
        Self {
            store,
            chunk_size: config.chunk_size.max(1),
            parallelism: config.parallelism.max(1),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }
    }

    fn progress_bar(total: u64) -> ProgressBar {
        if console::user_attended_stderr() {
            ProgressBar::new(total).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Uploading {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        }
    }

    async fn upload_chunk(
        &self,
        collection: &str,
        index: usize,
        chunk: &[Point],
    ) -> Result<usize, ProvisionError> {
        let attempts = self.max_retries + 1;
        let mut last_error: Option<SearchError> = None;

        for attempt in 1..=attempts {
            match self.store.add_points(collection, chunk).await {
                Ok(()) => {
                    debug!(
                        "Chunk {} ({} points) uploaded on attempt {}",
                        index,
                        chunk.len(),
                        attempt
                    );
                    return Ok(chunk.len());
                }
                Err(e) => {
                    warn!(
                        "Chunk {} failed, attempt {}/{}: {}",
                        index, attempt, attempts, e
                    );
                    last_error = Some(e);

                    if attempt < attempts {
                        let delay = self
                            .retry_backoff
                            .saturating_mul(EXPONENTIAL_BACKOFF_BASE.saturating_pow(attempt - 1));
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        error!("Chunk {} exhausted its retry budget", index);
        Err(ProvisionError::UploadFailed {
            chunk: index,
            attempts,
            source: last_error
                .unwrap_or_else(|| SearchError::IndexStore("upload failed".to_string())),
        })
    }

    /// Upload every point. Returns the number of points written.
    pub async fn upload(&self, collection: &str, points: &[Point]) -> Result<usize, ProvisionError> {
        let total_chunks = points.len().div_ceil(self.chunk_size);
        debug!(
            "Uploading {} points to {} in {} chunks ({} in flight)",
            points.len(),
            collection,
            total_chunks,
            self.parallelism
        );

        let bar = Self::progress_bar(points.len() as u64);
        bar.set_message(collection.to_string());

        let mut uploads = stream::iter(points.chunks(self.chunk_size).enumerate())
            .map(|(index, chunk)| self.upload_chunk(collection, index, chunk))
            .buffer_unordered(self.parallelism);

        let mut uploaded = 0;
        while let Some(result) = uploads.next().await {
            match result {
                Ok(n) => {
                    uploaded += n;
                    bar.inc(n as u64);
                }
                Err(e) => {
                    bar.abandon();
                    return Err(e);
                }
            }
        }

        bar.finish_and_clear();
        Ok(uploaded)
    }
}
