//! Permissioned retrieval: per-minister domain/book ACL over the vector
//! store.
//!
//! The ACL is hard, not heuristic: searches only ever run against the
//! minister's allowed domains, and the book filter is intersected with the
//! minister's allowed books before it reaches the store. A chunk from a
//! `(domain, book)` outside the binding cannot appear in the result set by
//! construction.

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::embed::{EmbedError, EmbedPool};
use crate::types::{minister_binding, BookScope, Domain, Lean, MinisterId, Mode};
use crate::vector_store::VectorStore;

/// Minimum usable results before a retrieval counts as grounded.
pub const MIN_RESULTS: usize = 2;

/// Counter-doctrine weight in normal mode. War mode uses 1.0; quick mode
/// drops counter-doctrine entirely.
pub const NORMAL_COUNTER_WEIGHT: f64 = 0.5;

#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("embedding: {0}")]
    Embed(#[from] EmbedError),
}

/// One retrieved chunk with its relevance score and mode-adjusted weight.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub book_id: String,
    pub chapter_index: u32,
    pub domain: Domain,
    pub lean: Lean,
    pub text: String,
    pub score: f32,
    pub weight: f64,
}

/// Grounded retrieval partitioned by lean.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievedSet {
    pub support: Vec<RetrievedChunk>,
    pub counter: Vec<RetrievedChunk>,
    pub neutral: Vec<RetrievedChunk>,
}

impl RetrievedSet {
    pub fn len(&self) -> usize {
        self.support.len() + self.counter.len() + self.neutral.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> impl Iterator<Item = &RetrievedChunk> {
        self.support
            .iter()
            .chain(self.counter.iter())
            .chain(self.neutral.iter())
    }
}

/// Retrieval result: grounded doctrine, or an explicit signal that the
/// minister has too little to speak from.
#[derive(Debug, Clone)]
pub enum Retrieval {
    Grounded(RetrievedSet),
    InsufficientKnowledge,
}

/// Retrieve doctrine for one minister.
pub async fn retrieve_for_minister(
    store: &VectorStore,
    pool: &EmbedPool,
    minister: MinisterId,
    query: &str,
    k: usize,
    mode: Mode,
    book_filter: Option<&BTreeSet<String>>,
) -> Result<Retrieval, RetrieveError> {
    let binding = minister_binding(minister);

    // Intersect the caller's filter with the minister's allowed books.
    let effective_filter: Option<BTreeSet<String>> = match (&binding.allowed_books, book_filter) {
        (BookScope::All, None) => None,
        (BookScope::All, Some(f)) => Some(f.clone()),
        (BookScope::Only(allowed), None) => Some(allowed.clone()),
        (BookScope::Only(allowed), Some(f)) => {
            Some(allowed.intersection(f).cloned().collect())
        }
    };

    let query_vec = pool.embed(query).await?;

    let mut merged = Vec::new();
    for domain in &binding.allowed_domains {
        let hits = store.search(*domain, &query_vec, k, effective_filter.as_ref());
        merged.extend(hits);
    }

    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    merged.truncate(k);

    let mut set = RetrievedSet::default();
    for hit in merged {
        let chunk = &hit.payload.chunk;
        let retrieved = RetrievedChunk {
            chunk_id: chunk.chunk_id.clone(),
            book_id: chunk.book_id.clone(),
            chapter_index: chunk.chapter_index,
            domain: chunk.domain,
            lean: chunk.lean,
            text: chunk.text.clone(),
            score: hit.score,
            weight: 1.0,
        };
        match chunk.lean {
            Lean::Support => set.support.push(retrieved),
            Lean::Counter => set.counter.push(retrieved),
            Lean::Neutral => set.neutral.push(retrieved),
        }
    }

    // Mode shapes what each minister hears.
    match mode {
        Mode::Quick => {
            set.counter.clear();
            set.neutral.clear();
        }
        Mode::Normal => {
            for chunk in &mut set.counter {
                chunk.weight = NORMAL_COUNTER_WEIGHT;
            }
        }
        Mode::War => {}
    }

    if set.len() < MIN_RESULTS {
        return Ok(Retrieval::InsufficientKnowledge);
    }

    Ok(Retrieval::Grounded(set))
}
