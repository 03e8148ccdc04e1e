//! Embedding client: the `embed(text) → vector[D]` seam.
//!
//! The embedding backend is a shared resource with a small resource
//! envelope, so every call goes through a counting semaphore of capacity
//! `EMBED_CONCURRENCY` (default 2). The pool wrapper owns that gate;
//! callers never talk to the backend directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::types::EMBEDDING_DIM;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding timeout after {0:?}")]
    Timeout(Duration),
    #[error("embedding endpoint error: {message}")]
    Endpoint { message: String, retryable: bool },
    #[error("dimension mismatch: got {got}, expected {expected}")]
    Dimension { got: usize, expected: usize },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

impl EmbedError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Endpoint { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Dimension { .. } => false,
            Self::Config(_) => false,
        }
    }
}

/// The embedding seam. Implementations must be pure: the same text always
/// produces the same vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

// =============================================================================
// HTTP adapter
// =============================================================================

/// OpenAI-compatible `/embeddings` endpoint adapter.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbedError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbedError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
        })
    }
}

#[derive(Serialize)]
struct EmbedApiRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedApiResponse {
    data: Vec<EmbedDatum>,
}

#[derive(Deserialize)]
struct EmbedDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&EmbedApiRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::Endpoint {
                message: format!("HTTP {}", status.as_u16()),
                retryable: status.as_u16() == 429 || status.as_u16() >= 500,
            });
        }

        let parsed: EmbedApiResponse = response.json().await?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbedError::Endpoint {
                message: "empty embedding response".into(),
                retryable: false,
            })?;

        Ok(l2_normalize(&vector))
    }
}

// =============================================================================
// Deterministic embedder
// =============================================================================

/// Content-hash embedder: a pure function of the text, no backend.
///
/// Used in tests and as an offline fallback. Vectors are unit-length and
/// stable across runs, so retrieval ordering is reproducible.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            dims: EMBEDDING_DIM,
        }
    }

    pub fn with_dims(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        let mut reader = hasher.finalize_xof();

        let mut raw = vec![0u8; self.dims * 4];
        reader.fill(&mut raw);

        let vector: Vec<f32> = raw
            .chunks_exact(4)
            .map(|b| {
                let bits = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                // Map to [-1, 1).
                (bits as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect();

        Ok(l2_normalize(&vector))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

fn l2_normalize(vector: &[f32]) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter().map(|x| x / norm).collect()
    } else {
        vector.to_vec()
    }
}

/// Cosine similarity over unit vectors (dot product).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// =============================================================================
// Bounded pool
// =============================================================================

/// Semaphore-guarded embedder. At most `capacity` embedding requests are in
/// flight across all worker tasks; the backend never sees more.
pub struct EmbedPool {
    embedder: Arc<dyn Embedder>,
    semaphore: Arc<Semaphore>,
    call_timeout: Duration,
}

impl EmbedPool {
    pub fn new(embedder: Arc<dyn Embedder>, capacity: usize, call_timeout: Duration) -> Self {
        Self {
            embedder,
            semaphore: Arc::new(Semaphore::new(capacity.max(1))),
            call_timeout,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EmbedError::Config("embed pool closed".into()))?;

        timeout(self.call_timeout, self.embedder.embed(text))
            .await
            .unwrap_or(Err(EmbedError::Timeout(self.call_timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embedder_is_deterministic_and_unit_length() {
        let embedder = HashEmbedder::new();
        let a = embedder.embed("winter campaign").await.unwrap();
        let b = embedder.embed("winter campaign").await.unwrap();
        let c = embedder.embed("summer campaign").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), EMBEDDING_DIM);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn pool_bounds_concurrency() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct SlowEmbedder {
            in_flight: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl Embedder for SlowEmbedder {
            async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbedError> {
                let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(vec![1.0, 0.0])
            }

            fn dimensions(&self) -> usize {
                2
            }
        }

        let inner = Arc::new(SlowEmbedder {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pool = Arc::new(EmbedPool::new(
            inner.clone(),
            2,
            Duration::from_secs(5),
        ));

        let mut handles = Vec::new();
        for i in 0..8 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                pool.embed(&format!("text {i}")).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(inner.peak.load(Ordering::SeqCst) <= 2);
    }
}
