//! Environment-driven configuration.
//!
//! One `Config` value is built at entry and threaded through the pipeline;
//! no process-wide singletons.

use std::path::PathBuf;
use std::time::Duration;

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the OpenAI-compatible chat completions endpoint.
    pub llm_endpoint: String,
    /// Model id sent with every chat request.
    pub llm_model: String,
    /// Base URL of the embeddings endpoint.
    pub embed_endpoint: String,
    /// Embedding model id.
    pub embed_model: String,
    /// Concurrent embedding calls in flight (semaphore capacity).
    pub embed_concurrency: usize,
    /// Concurrent phase-2 chapter extractions in flight.
    pub llm_concurrency: usize,
    /// Root of all persisted state.
    pub data_dir: PathBuf,
    /// Per-call timeout for LLM and embedding requests.
    pub call_timeout: Duration,
    /// Confidence below which a minister's advice is flagged, never
    /// surfaced as authoritative.
    pub confidence_threshold: f64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            llm_endpoint: env_or("LLM_ENDPOINT", "http://localhost:11434/v1"),
            llm_model: env_or("LLM_MODEL", "qwen2.5:14b"),
            embed_endpoint: env_or("EMBED_ENDPOINT", "http://localhost:11434/v1"),
            embed_model: env_or("EMBED_MODEL", "nomic-embed-text"),
            embed_concurrency: env_parse("EMBED_CONCURRENCY", 2),
            llm_concurrency: env_parse("LLM_CONCURRENCY", 2),
            data_dir: PathBuf::from(env_or("DATA_DIR", ".counselor")),
            call_timeout: Duration::from_secs(env_parse("CALL_TIMEOUT_SECONDS", 120)),
            confidence_threshold: 0.65,
        }
    }

    /// Config rooted at an explicit data dir. Used by tests so nothing
    /// leaks between runs.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::from_env()
        }
    }

    pub fn books_dir(&self) -> PathBuf {
        self.data_dir.join("books")
    }

    pub fn book_dir(&self, book_id: &str) -> PathBuf {
        self.books_dir().join(book_id)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.books_dir().join("metadata")
    }

    pub fn vector_store_dir(&self) -> PathBuf {
        self.data_dir.join("vector_store")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    pub fn progress_ledger_path(&self) -> PathBuf {
        self.state_dir().join("ingest_progress.jsonl")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.state_dir().join("ingest_metrics.json")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.db")
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
