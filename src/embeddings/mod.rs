// Embeddings module
// Turns query text into vectors. The model itself is an external service.

pub mod ollama;

use async_trait::async_trait;

pub use ollama::OllamaClient;

/// Anything that maps text to a fixed-length vector.
///
/// Implementations must be deterministic for a given model version and must
/// always return vectors of the same dimensionality.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Encode a single piece of text.
    async fn encode(&self, text: &str) -> crate::Result<Vec<f32>>;
}
