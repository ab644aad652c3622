//! Embedding provider and vector helpers

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::EmbeddingError;

/// Turns text into embedding vectors
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier; ingestion and retrieval must agree on it
    fn model(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".into()))
    }
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Ollama `/api/embed` provider
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaEmbedder {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let endpoint = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(&endpoint)
            .timeout(self.timeout)
            .json(&OllamaEmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Request(format!("cannot reach {}: {}", endpoint, e)))?;

        let status = response.status();
        let payload: Value = response.json().await.map_err(|e| {
            EmbeddingError::InvalidResponse(format!("failed to parse /api/embed JSON: {e}"))
        })?;

        if !status.is_success() {
            return Err(EmbeddingError::Request(format!(
                "/api/embed returned status {}: {}",
                status.as_u16(),
                payload.get("error").and_then(|e| e.as_str()).unwrap_or("unknown error")
            )));
        }

        let embeddings = payload
            .get("embeddings")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse("response missing 'embeddings' array".into())
            })?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "{} embeddings returned for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        embeddings
            .iter()
            .enumerate()
            .map(|(index, vector)| parse_vector(vector, index))
            .collect()
    }
}

fn parse_vector(value: &Value, index: usize) -> Result<Vec<f32>, EmbeddingError> {
    let values = value.as_array().ok_or_else(|| {
        EmbeddingError::InvalidResponse(format!("embedding {index} is not an array"))
    })?;
    if values.is_empty() {
        return Err(EmbeddingError::InvalidResponse(format!(
            "embedding {index} is empty"
        )));
    }
    values
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                EmbeddingError::InvalidResponse(format!("embedding {index} has a non-numeric value"))
            })
        })
        .collect()
}

/// Little-endian f32 blob for database storage
pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Inverse of `embedding_to_blob`; `None` if the length is not a multiple of 4
pub fn blob_to_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Calculate cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance in [0, 2]; smaller is closer
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_blob_roundtrip_preserves_values() {
        let embedding = vec![0.25_f32, -1.5, 3.0];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob.len(), 12);
        assert_eq!(blob_to_embedding(&blob).unwrap(), embedding);
        assert!(blob_to_embedding(&blob[..5]).is_none());
    }

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[tokio::test]
    async fn test_ollama_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_json(json!({"model": "bge", "input": ["hello"]})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[0.1, 0.2, 0.3]]})),
            )
            .mount(&server)
            .await;

        let embedder = OllamaEmbedder::new(server.uri(), "bge");
        let vector = embedder.embed_one("hello").await.unwrap();
        assert_eq!(vector.len(), 3);
    }

    #[tokio::test]
    async fn test_ollama_missing_model_is_request_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "model \"bge\" not found"})),
            )
            .mount(&server)
            .await;

        let err = OllamaEmbedder::new(server.uri(), "bge")
            .embed_one("hello")
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Request(ref m) if m.contains("not found")));
    }
}
