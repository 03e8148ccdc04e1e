//! Book registry: descriptive metadata for every known book.
//!
//! Loaded once at startup from `books/metadata/*.yaml`; read-only at
//! runtime. Unknown books get defaults (empty domain/tone sets, all
//! priorities 0.5) so retrieval never fails on a missing file.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

use crate::types::BookMetadata;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid metadata in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
}

pub struct BookRegistry {
    books: BTreeMap<String, BookMetadata>,
}

impl BookRegistry {
    /// Load every `*.yaml` under the metadata directory. A missing
    /// directory is an empty registry, not an error.
    pub fn load(metadata_dir: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let dir = metadata_dir.as_ref();
        let mut books = BTreeMap::new();

        if dir.exists() {
            let mut entries: Vec<_> = std::fs::read_dir(dir)?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|e| {
                    e.path()
                        .extension()
                        .map(|ext| ext == "yaml" || ext == "yml")
                        .unwrap_or(false)
                })
                .collect();
            entries.sort_by_key(|e| e.path());

            for entry in entries {
                let path = entry.path();
                let raw = std::fs::read_to_string(&path)?;
                let mut meta: BookMetadata =
                    serde_yaml::from_str(&raw).map_err(|source| RegistryError::Parse {
                        path: path.display().to_string(),
                        source,
                    })?;
                if meta.book_id.is_empty() {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        meta.book_id = stem.to_string();
                    }
                }
                books.insert(meta.book_id.clone(), meta);
            }
        }

        Ok(Self { books })
    }

    /// Registry with no known books; everything resolves to defaults.
    pub fn empty() -> Self {
        Self {
            books: BTreeMap::new(),
        }
    }

    /// Registry built from in-memory metadata. Used by tests and by the
    /// war pipeline when a caller supplies explicit book descriptions.
    pub fn from_books(books: Vec<BookMetadata>) -> Self {
        Self {
            books: books.into_iter().map(|b| (b.book_id.clone(), b)).collect(),
        }
    }

    /// Metadata for one book; defaults for unknown ids.
    pub fn metadata(&self, book_id: &str) -> BookMetadata {
        self.books
            .get(book_id)
            .cloned()
            .unwrap_or_else(|| BookMetadata::unknown(book_id))
    }

    /// All known books, in stable id order.
    pub fn all_books(&self) -> Vec<&BookMetadata> {
        self.books.values().collect()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
