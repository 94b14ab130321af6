//! Embedding requests and the per-book mean vector.

use serde_json::{Value, json};

use crate::analysis::error::{AnalysisError, AnalysisResult};
use crate::analysis::service::ServiceClient;
use crate::config::ServiceConfig;

const SERVICE: &str = "embedding";

/// A dense embedding. All vectors from one model share a dimension.
pub type EmbeddingVector = Vec<f32>;

/// Turns text into an embedding vector.
pub trait Embedder {
    fn embed(&self, text: &str) -> AnalysisResult<EmbeddingVector>;

    /// `embed`, with any failure logged and turned into `None`.
    fn get_embedding(&self, text: &str) -> Option<EmbeddingVector> {
        match self.embed(text) {
            Ok(vector) => Some(vector),
            Err(error) => {
                tracing::warn!(%error, "embedding request failed; dropping sample");
                None
            }
        }
    }
}

/// `Embedder` backed by `{base_url}/embeddings`.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: ServiceClient,
    model: String,
}

impl EmbeddingClient {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            client: ServiceClient::new(SERVICE, config),
            model: config.embedding_model.clone(),
        }
    }
}

impl Embedder for EmbeddingClient {
    fn embed(&self, text: &str) -> AnalysisResult<EmbeddingVector> {
        let body = json!({"model": self.model, "input": text});
        let response = self.client.post_json("/embeddings", &body)?;
        parse_embedding(&response).ok_or_else(|| {
            self.client
                .malformed("expected data[0].embedding to be an array of numbers")
        })
    }
}

/// Read `data[0].embedding` from an embeddings response.
fn parse_embedding(response: &Value) -> Option<EmbeddingVector> {
    response["data"][0]["embedding"]
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Component-wise mean of equally sized vectors.
///
/// Returns `Ok(None)` for an empty input and `DimensionMismatch` when any
/// vector's length differs from the first one's.
pub fn average_embedding(vectors: &[EmbeddingVector]) -> AnalysisResult<Option<EmbeddingVector>> {
    let Some(first) = vectors.first() else {
        return Ok(None);
    };
    let dim = first.len();
    let mut sums = vec![0.0f64; dim];

    for (index, vector) in vectors.iter().enumerate() {
        if vector.len() != dim {
            return Err(AnalysisError::DimensionMismatch {
                expected: dim,
                actual: vector.len(),
                index,
            });
        }
        for (sum, x) in sums.iter_mut().zip(vector) {
            *sum += f64::from(*x);
        }
    }

    let n = vectors.len() as f64;
    Ok(Some(sums.into_iter().map(|s| (s / n) as f32).collect()))
}
