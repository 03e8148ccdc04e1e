//! Phase-2: per-chapter doctrine extraction.
//!
//! Chapters are independent: extraction runs concurrently up to the
//! configured bound, and each validated record commits atomically to its
//! own `NN.json`. A failed chapter is logged and skipped; the next run sees
//! the missing file and retries only those.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::gateway::{complete_json, LlmGateway, LlmRequest};
use crate::ingest::validate::{validate_doctrine, DoctrineFile};
use crate::ingest::{atomic_write_json, IngestError};
use crate::prompts;
use crate::types::{ChapterRecord, DoctrineRecord};

/// Zero-padded per-chapter commit path, e.g. `07.json`.
pub fn doctrine_path(book_dir: &Path, chapter_index: u32) -> PathBuf {
    book_dir.join(format!("{chapter_index:02}.json"))
}

/// Extract doctrine for every chapter that has no committed file yet.
/// Returns the chapter indices that failed this run.
pub async fn run_phase2(
    gateway: &Arc<dyn LlmGateway>,
    model: &str,
    chapters: &[ChapterRecord],
    book_dir: &Path,
    concurrency: usize,
    cancelled: &Arc<AtomicBool>,
) -> Result<Vec<u32>, IngestError> {
    let chapter_count = chapters.len() as u32;
    let pending: Vec<&ChapterRecord> = chapters
        .iter()
        .filter(|c| !doctrine_path(book_dir, c.chapter_index).exists())
        .collect();

    if pending.is_empty() {
        return Ok(Vec::new());
    }
    eprintln!(
        "[ingest] phase-2: {} of {} chapters pending",
        pending.len(),
        chapters.len()
    );

    let results: Vec<(u32, Result<(), IngestError>)> = stream::iter(pending)
        .take_while(|_| {
            let go = !cancelled.load(Ordering::SeqCst);
            async move { go }
        })
        .map(|chapter| {
            let gateway = gateway.clone();
            let model = model.to_string();
            let book_dir = book_dir.to_path_buf();
            async move {
                let result =
                    extract_chapter(&gateway, &model, chapter, chapter_count, &book_dir).await;
                (chapter.chapter_index, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut failed = Vec::new();
    for (index, result) in results {
        match result {
            Ok(()) => {}
            Err(e) => {
                eprintln!("[ingest] phase-2: chapter {index} failed: {e}");
                failed.push(index);
            }
        }
    }
    failed.sort_unstable();
    Ok(failed)
}

async fn extract_chapter(
    gateway: &Arc<dyn LlmGateway>,
    model: &str,
    chapter: &ChapterRecord,
    chapter_count: u32,
    book_dir: &Path,
) -> Result<(), IngestError> {
    let prompt = prompts::phase2_doctrine(chapter);
    let request = LlmRequest::new(model, prompt.to_messages(), "ingest::phase2");
    let value = complete_json(gateway, request).await?;

    let record = validate_doctrine(&value, &chapter.book_id, chapter.chapter_index, chapter_count)?;

    let file = DoctrineFile::from(&record);
    atomic_write_json(&doctrine_path(book_dir, chapter.chapter_index), &file)?;

    eprintln!(
        "[ingest] phase-2: chapter {:02} committed ({} domains, {} statements)",
        record.chapter_index,
        record.domains.len(),
        record.principles.len() + record.rules.len() + record.claims.len() + record.warnings.len(),
    );
    Ok(())
}

/// Load every committed doctrine file for a book, re-validating on the way
/// in. The pipeline output is fully reconstructable from these files
/// without the model.
pub fn load_doctrine(
    book_id: &str,
    book_dir: &Path,
    chapter_count: u32,
) -> Result<Vec<DoctrineRecord>, IngestError> {
    let mut records = Vec::new();
    for index in 1..=chapter_count {
        let path = doctrine_path(book_dir, index);
        if !path.exists() {
            continue;
        }
        let raw = std::fs::read_to_string(&path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let record = validate_doctrine(&value, book_id, index, chapter_count)?;
        records.push(record);
    }
    Ok(records)
}
