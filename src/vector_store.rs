//! Per-domain vector store with exact cosine search.
//!
//! Indices are partitioned by `Domain` because ministers are permissioned
//! per domain; cross-domain queries are unsupported by construction. One
//! append-only JSONL file per domain holds the embedded chunks; the whole
//! store is loaded into memory at open. Single writer (enforced with an
//! exclusive file lock), many readers.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::embed::cosine_similarity;
use crate::types::{Domain, EmbeddedChunk};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt store record: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("store is locked by another writer: {0}")]
    Locked(PathBuf),
    /// Same id, different content. The id is a content hash, so this means
    /// the store and the incoming chunk disagree about reality. Fatal;
    /// never auto-healed.
    #[error("chunk id collision with different content: {0}")]
    IdCollision(String),
    #[error("vector dimension mismatch: got {got}, store has {expected}")]
    Dimension { got: usize, expected: usize },
}

/// Result of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Duplicate,
}

/// One search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f32,
    pub payload: EmbeddedChunk,
}

struct DomainIndex {
    chunks: Vec<EmbeddedChunk>,
    file: File,
}

/// The store. `search`/`contains` take `&self`; `upsert` takes `&mut self`
/// so the single-writer rule is enforced by the borrow checker on top of
/// the file lock.
pub struct VectorStore {
    root: PathBuf,
    indices: BTreeMap<Domain, DomainIndex>,
    /// chunk_id → domain, across all indices.
    ids: HashMap<String, Domain>,
    dimensions: Option<usize>,
    _lock: File,
}

impl VectorStore {
    /// Open (or create) the store rooted at `root`, loading every domain
    /// index into memory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;

        let lock_path = root.join(".lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(lock_path))?;

        let mut indices = BTreeMap::new();
        let mut ids = HashMap::new();
        let mut dimensions = None;

        for domain in Domain::ALL {
            let dir = root.join(domain.as_str());
            std::fs::create_dir_all(&dir)?;
            let path = dir.join("chunks.jsonl");

            let mut chunks = Vec::new();
            if path.exists() {
                let reader = BufReader::new(File::open(&path)?);
                for line in reader.lines() {
                    let line = line?;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let chunk: EmbeddedChunk = serde_json::from_str(&line)?;
                    dimensions.get_or_insert(chunk.vector.len());
                    ids.insert(chunk.chunk.chunk_id.clone(), domain);
                    chunks.push(chunk);
                }
            }

            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            indices.insert(domain, DomainIndex { chunks, file });
        }

        Ok(Self {
            root,
            indices,
            ids,
            dimensions,
            _lock: lock,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Total embedded chunks across all domains.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.ids.contains_key(chunk_id)
    }

    /// Insert an embedded chunk into its domain index. Duplicates (same id,
    /// same text) are reported, not re-inserted; a same-id different-text
    /// chunk is a fatal integrity error.
    pub fn upsert(&mut self, chunk: EmbeddedChunk) -> Result<UpsertOutcome, StoreError> {
        if let Some(expected) = self.dimensions {
            if chunk.vector.len() != expected {
                return Err(StoreError::Dimension {
                    got: chunk.vector.len(),
                    expected,
                });
            }
        }

        if let Some(existing_domain) = self.ids.get(&chunk.chunk.chunk_id) {
            let index = &self.indices[existing_domain];
            let existing = index
                .chunks
                .iter()
                .find(|c| c.chunk.chunk_id == chunk.chunk.chunk_id);
            if let Some(existing) = existing {
                if existing.chunk.text != chunk.chunk.text {
                    return Err(StoreError::IdCollision(chunk.chunk.chunk_id));
                }
            }
            return Ok(UpsertOutcome::Duplicate);
        }

        let domain = chunk.chunk.domain;
        let line = serde_json::to_string(&chunk)?;
        let index = self
            .indices
            .get_mut(&domain)
            .expect("all domains initialized at open");

        // Durable before visible: the append hits disk before the chunk
        // joins the in-memory snapshot.
        writeln!(index.file, "{line}")?;
        index.file.sync_all()?;

        self.dimensions.get_or_insert(chunk.vector.len());
        self.ids.insert(chunk.chunk.chunk_id.clone(), domain);
        index.chunks.push(chunk);

        Ok(UpsertOutcome::Inserted)
    }

    /// Cosine search within one domain, optionally restricted to a book
    /// set. Results are in strictly descending score; ties break by
    /// ascending chunk id so identical queries produce identical orderings.
    pub fn search(
        &self,
        domain: Domain,
        query_vec: &[f32],
        k: usize,
        book_filter: Option<&BTreeSet<String>>,
    ) -> Vec<SearchHit> {
        let Some(index) = self.indices.get(&domain) else {
            return Vec::new();
        };

        let mut hits: Vec<SearchHit> = index
            .chunks
            .iter()
            .filter(|c| match book_filter {
                Some(books) => books.contains(&c.chunk.book_id),
                None => true,
            })
            .map(|c| SearchHit {
                chunk_id: c.chunk.chunk_id.clone(),
                score: cosine_similarity(query_vec, &c.vector),
                payload: c.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);
        hits
    }

    /// Chunk count within one domain.
    pub fn domain_len(&self, domain: Domain) -> usize {
        self.indices.get(&domain).map(|i| i.chunks.len()).unwrap_or(0)
    }

    /// Book ids present anywhere in the store, sorted.
    pub fn book_ids(&self) -> BTreeSet<String> {
        self.indices
            .values()
            .flat_map(|i| i.chunks.iter().map(|c| c.chunk.book_id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{chunk_id, Chunk, Lean, SourceSpan};

    fn embedded(book: &str, domain: Domain, text: &str, vector: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                chunk_id: chunk_id(book, text),
                book_id: book.into(),
                chapter_index: 1,
                domain,
                lean: Lean::Support,
                text: text.into(),
                source_span: SourceSpan { start: 0, end: text.len() },
            },
            vector,
        }
    }

    #[test]
    fn upsert_then_reopen_preserves_chunks() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = VectorStore::open(dir.path()).unwrap();
            let outcome = store
                .upsert(embedded("b1", Domain::Power, "leverage", vec![1.0, 0.0]))
                .unwrap();
            assert_eq!(outcome, UpsertOutcome::Inserted);
            let outcome = store
                .upsert(embedded("b1", Domain::Power, "leverage", vec![1.0, 0.0]))
                .unwrap();
            assert_eq!(outcome, UpsertOutcome::Duplicate);
        }
        let store = VectorStore::open(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains(&chunk_id("b1", "leverage")));
    }

    #[test]
    fn search_orders_by_score_then_chunk_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(dir.path()).unwrap();
        store
            .upsert(embedded("b1", Domain::Risk, "ruin first", vec![1.0, 0.0]))
            .unwrap();
        store
            .upsert(embedded("b1", Domain::Risk, "tail risk", vec![0.6, 0.8]))
            .unwrap();
        store
            .upsert(embedded("b2", Domain::Risk, "hedge always", vec![1.0, 0.0]))
            .unwrap();

        let hits = store.search(Domain::Risk, &[1.0, 0.0], 10, None);
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            let ordered = pair[0].score > pair[1].score
                || (pair[0].score == pair[1].score && pair[0].chunk_id < pair[1].chunk_id);
            assert!(ordered, "results must sort by (-score, chunk_id)");
        }
    }

    #[test]
    fn book_filter_restricts_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::open(dir.path()).unwrap();
        store
            .upsert(embedded("b1", Domain::Timing, "tempo", vec![1.0, 0.0]))
            .unwrap();
        store
            .upsert(embedded("b2", Domain::Timing, "windows", vec![1.0, 0.0]))
            .unwrap();

        let filter: BTreeSet<String> = ["b2".to_string()].into();
        let hits = store.search(Domain::Timing, &[1.0, 0.0], 10, Some(&filter));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload.chunk.book_id, "b2");
    }

    #[test]
    fn second_writer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let _store = VectorStore::open(dir.path()).unwrap();
        assert!(matches!(
            VectorStore::open(dir.path()),
            Err(StoreError::Locked(_))
        ));
    }
}
