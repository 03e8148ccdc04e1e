//! Two-phase ingestion pipeline: book text → chapters → doctrine →
//! embedded, deduplicated chunks.
//!
//! Contracts:
//! - **Atomic per-commit**: `structure.json` and each `NN.json` land via
//!   temp-then-rename; the progress ledger appends are fsync'd per record.
//! - **Idempotent**: re-running on the same `(text, book_id, version)`
//!   inserts zero new chunks and reports them all as skipped duplicates.
//! - **Crash-safe resume**: a chunk is done only when the vector-store
//!   insert returned AND its hash is in the progress ledger; killing the
//!   process at any point and restarting converges on the same hash set.
//! - **Malformed model output** rejects the unit, never the run; unresolved
//!   chapters are listed at the end and the caller exits non-zero.

pub mod doctrine;
pub mod progress;
pub mod structure;
pub mod validate;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::chunking::{chunk_record, ChunkingParams};
use crate::config::Config;
use crate::embed::{EmbedError, EmbedPool};
use crate::gateway::{GatewayError, LlmGateway};
use crate::ingest::progress::{MetricsTracker, ProgressLedger};
use crate::ingest::validate::ValidationError;
use crate::types::Chunk;
use crate::vector_store::{StoreError, VectorStore};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("embedding: {0}")]
    Embed(#[from] EmbedError),
}

/// Write a JSON value to `path` atomically: serialize to a sibling temp
/// file, fsync, then rename over the target.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IngestError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("commit");
    let tmp = parent.join(format!(".tmp-{file_name}"));

    let json = serde_json::to_string_pretty(value)?;
    {
        use std::io::Write;
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub book_id: String,
    pub chapters: usize,
    pub doctrine_records: usize,
    pub total_chunks: usize,
    pub inserted: usize,
    pub skipped_duplicate: usize,
    /// Chapters whose extraction failed this run; retried on the next run.
    pub failed_chapters: Vec<u32>,
    /// Chunks whose embedding failed this run; retried on the next run.
    pub failed_chunks: usize,
}

impl IngestReport {
    /// True when every unit resolved. The CLI exits non-zero otherwise.
    pub fn fully_resolved(&self) -> bool {
        self.failed_chapters.is_empty() && self.failed_chunks == 0
    }
}

/// The pipeline driver. Holds the external seams and the cancellation
/// flag; all persistent state lives under the config's data dir.
pub struct Ingestor {
    gateway: Arc<dyn LlmGateway>,
    pool: Arc<EmbedPool>,
    config: Config,
    chunking: ChunkingParams,
    cancelled: Arc<AtomicBool>,
}

impl Ingestor {
    pub fn new(gateway: Arc<dyn LlmGateway>, pool: Arc<EmbedPool>, config: Config) -> Self {
        Self {
            gateway,
            pool,
            config,
            chunking: ChunkingParams::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cooperative cancellation: stop dispatching new units, drain
    /// in-flight ones. Atomic commit points keep the state resumable.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Ingest one book end to end. Resumable: phase-1 and per-chapter
    /// commits are skipped when already on disk, and chunks already in the
    /// progress ledger or the vector store are skipped as duplicates.
    pub async fn ingest_book(
        &self,
        book_id: &str,
        book_text: &str,
        store: &mut VectorStore,
    ) -> Result<IngestReport, IngestError> {
        let book_dir = self.config.book_dir(book_id);

        // Phase-1: durable chapter structure.
        let structure = structure::run_phase1(
            &self.gateway,
            &self.config.llm_model,
            book_id,
            book_text,
            &book_dir,
        )
        .await?;
        let chapters = structure.to_chapter_records(book_id);
        let chapter_count = chapters.len() as u32;

        // Phase-2: per-chapter doctrine, concurrent and independently
        // committed.
        let failed_chapters = doctrine::run_phase2(
            &self.gateway,
            &self.config.llm_model,
            &chapters,
            &book_dir,
            self.config.llm_concurrency,
            &self.cancelled,
        )
        .await?;

        // The corpus below this point comes from disk, not from the model.
        let records = doctrine::load_doctrine(book_id, &book_dir, chapter_count)?;

        // Chunk deterministically.
        let chunks: Vec<Chunk> = records
            .iter()
            .flat_map(|r| chunk_record(r, &self.chunking))
            .collect();

        // Embed + insert, deduplicating against both the progress ledger
        // (completed inserts since the last restart) and the vector store
        // (the permanent record).
        let mut ledger = ProgressLedger::open(self.config.progress_ledger_path())?;
        let mut metrics = MetricsTracker::new(self.config.metrics_path(), chunks.len());

        let mut inserted = 0usize;
        let mut skipped = 0usize;
        let mut failed_chunks = 0usize;

        let mut jobs: Vec<Chunk> = Vec::new();
        for chunk in chunks.iter() {
            if ledger.contains(&chunk.chunk_id) || store.contains(&chunk.chunk_id) {
                skipped += 1;
                metrics.skipped();
            } else {
                jobs.push(chunk.clone());
            }
        }
        metrics.write();

        let pool = self.pool.clone();
        let cancelled = self.cancelled.clone();
        let results = stream::iter(jobs)
            .take_while(|_| {
                let go = !cancelled.load(Ordering::SeqCst);
                async move { go }
            })
            .map(|chunk| {
                let pool = pool.clone();
                async move {
                    let embedded = embed_with_retry(&pool, &chunk.text).await;
                    (chunk, embedded)
                }
            })
            .buffer_unordered(self.config.embed_concurrency.max(1));
        futures::pin_mut!(results);

        // Inserts are serialized here: one writer, arrival order
        // irrelevant because identity is content-derived.
        while let Some((chunk, embedded)) = results.next().await {
            match embedded {
                Ok(vector) => {
                    let outcome = store.upsert(crate::types::EmbeddedChunk {
                        chunk: chunk.clone(),
                        vector,
                    })?;
                    match outcome {
                        crate::vector_store::UpsertOutcome::Inserted => {
                            ledger.append(&chunk.chunk_id)?;
                            inserted += 1;
                            metrics.completed();
                        }
                        crate::vector_store::UpsertOutcome::Duplicate => {
                            if !ledger.contains(&chunk.chunk_id) {
                                ledger.append(&chunk.chunk_id)?;
                            }
                            skipped += 1;
                            metrics.skipped();
                        }
                    }
                }
                Err(e) => {
                    eprintln!(
                        "[ingest] embed failed for chunk {}: {e}",
                        &chunk.chunk_id[..12]
                    );
                    failed_chunks += 1;
                }
            }
            metrics.write();
        }
        drop(results);

        let report = IngestReport {
            book_id: book_id.to_string(),
            chapters: chapters.len(),
            doctrine_records: records.len(),
            total_chunks: chunks.len(),
            inserted,
            skipped_duplicate: skipped,
            failed_chapters,
            failed_chunks,
        };

        eprintln!(
            "[ingest] {book_id}: {} chunks ({} inserted, {} skipped, {} failed), {} chapters unresolved",
            report.total_chunks,
            report.inserted,
            report.skipped_duplicate,
            report.failed_chunks,
            report.failed_chapters.len()
        );

        Ok(report)
    }
}

/// Embed with bounded backoff. Retries exhausted → per-unit failure; the
/// chunk stays out of both the store and the progress ledger so the next
/// run retries it.
async fn embed_with_retry(pool: &EmbedPool, text: &str) -> Result<Vec<f32>, EmbedError> {
    const MAX_RETRIES: u32 = 2;
    let mut last = None;

    for attempt in 0..=MAX_RETRIES {
        match pool.embed(text).await {
            Ok(vector) => return Ok(vector),
            Err(e) => {
                if !e.is_retryable() || attempt == MAX_RETRIES {
                    return Err(e);
                }
                let delay = Duration::from_millis(250 * 2u64.pow(attempt));
                last = Some(e);
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last.unwrap_or(EmbedError::Config("unreachable".into())))
}
