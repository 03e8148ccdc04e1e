//! Schema validators for the two ingestion phases.
//!
//! The only place the engine accepts unstructured model output is here:
//! anything outside the closed domain enumeration or the declared field
//! shapes is rejected as a per-unit validation failure, never silently
//! cast. Validation failure rejects the whole unit (the phase-1 output, or
//! one chapter); the unit is retried on the next run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{ChapterRecord, Domain, DoctrineRecord};

/// Chapter texts shorter than this are likely summaries, not verbatim
/// chapter text, and phase-1 is rejected wholesale.
const MIN_CHAPTER_CHARS: usize = 400;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("phase-1: {0}")]
    Structure(String),
    #[error("chapter {chapter}: {message}")]
    Doctrine { chapter: u32, message: String },
}

// =============================================================================
// Phase-1: structure.json
// =============================================================================

/// On-disk shape of `structure.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureFile {
    pub book_title: String,
    #[serde(default)]
    pub author: Option<String>,
    pub chapters: Vec<StructureChapter>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureChapter {
    pub chapter_index: u32,
    pub chapter_title: String,
    pub chapter_text: String,
}

/// Validate raw phase-1 model output. On success the whole structure is
/// accepted; on any failure the whole phase is rejected (no partial
/// commit).
pub fn validate_structure(value: &Value) -> Result<StructureFile, ValidationError> {
    let structure: StructureFile = serde_json::from_value(value.clone())
        .map_err(|e| ValidationError::Structure(format!("shape: {e}")))?;

    if structure.chapters.is_empty() {
        return Err(ValidationError::Structure("empty chapter list".into()));
    }

    for (i, chapter) in structure.chapters.iter().enumerate() {
        let expected = (i + 1) as u32;
        if chapter.chapter_index != expected {
            return Err(ValidationError::Structure(format!(
                "chapter indices must be dense 1..N: position {} has index {}",
                i + 1,
                chapter.chapter_index
            )));
        }
        if chapter.chapter_title.trim().is_empty() {
            return Err(ValidationError::Structure(format!(
                "chapter {expected} has an empty title"
            )));
        }
        if chapter.chapter_text.trim().is_empty() {
            return Err(ValidationError::Structure(format!(
                "chapter {expected} has empty text"
            )));
        }
        if chapter.chapter_text.len() < MIN_CHAPTER_CHARS {
            return Err(ValidationError::Structure(format!(
                "chapter {expected} text too short ({} chars): likely a summary, not the chapter",
                chapter.chapter_text.len()
            )));
        }
    }

    Ok(structure)
}

impl StructureFile {
    pub fn to_chapter_records(&self, book_id: &str) -> Vec<ChapterRecord> {
        self.chapters
            .iter()
            .map(|c| ChapterRecord {
                book_id: book_id.to_string(),
                chapter_index: c.chapter_index,
                title: c.chapter_title.clone(),
                text: c.chapter_text.clone(),
            })
            .collect()
    }
}

// =============================================================================
// Phase-2: NN.json
// =============================================================================

/// On-disk shape of a per-chapter doctrine file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctrineFile {
    pub chapter_index: u32,
    pub chapter_title: String,
    pub domains: Vec<String>,
    pub principles: Vec<String>,
    pub rules: Vec<String>,
    pub claims: Vec<String>,
    pub warnings: Vec<String>,
    pub cross_references: Vec<u32>,
}

/// Validate raw phase-2 model output for one chapter against the domain
/// enum and the book's chapter count.
pub fn validate_doctrine(
    value: &Value,
    book_id: &str,
    expected_index: u32,
    chapter_count: u32,
) -> Result<DoctrineRecord, ValidationError> {
    let err = |message: String| ValidationError::Doctrine {
        chapter: expected_index,
        message,
    };

    let file: DoctrineFile =
        serde_json::from_value(value.clone()).map_err(|e| err(format!("shape: {e}")))?;

    if file.chapter_index != expected_index {
        return Err(err(format!(
            "chapter_index {} does not match expected {}",
            file.chapter_index, expected_index
        )));
    }
    if file.chapter_title.trim().is_empty() {
        return Err(err("empty chapter_title".into()));
    }

    // Domains: closed enum, 1..=3.
    if file.domains.is_empty() || file.domains.len() > 3 {
        return Err(err(format!(
            "expected 1-3 domains, got {}",
            file.domains.len()
        )));
    }
    let mut domains = Vec::with_capacity(file.domains.len());
    for raw in &file.domains {
        let domain: Domain = raw
            .parse()
            .map_err(|_| err(format!("domain outside the closed enumeration: {raw:?}")))?;
        if !domains.contains(&domain) {
            domains.push(domain);
        }
    }

    // Every listed string must be non-empty.
    for (field, items) in [
        ("principles", &file.principles),
        ("rules", &file.rules),
        ("claims", &file.claims),
        ("warnings", &file.warnings),
    ] {
        for item in items {
            if item.trim().is_empty() {
                return Err(err(format!("empty string in {field}")));
            }
        }
    }

    // Content floor: core doctrine plus at least one assertion.
    if file.principles.is_empty() && file.rules.is_empty() {
        return Err(err("no principles or rules: missing core doctrine".into()));
    }
    if file.claims.is_empty() && file.warnings.is_empty() {
        return Err(err("no claims or warnings: missing assertions".into()));
    }

    // Cross-references resolve within the same book.
    for reference in &file.cross_references {
        if *reference == 0 || *reference > chapter_count {
            return Err(err(format!(
                "cross_reference {reference} points outside chapters 1..{chapter_count}"
            )));
        }
    }

    Ok(DoctrineRecord {
        book_id: book_id.to_string(),
        chapter_index: file.chapter_index,
        chapter_title: file.chapter_title,
        domains,
        principles: file.principles,
        rules: file.rules,
        claims: file.claims,
        warnings: file.warnings,
        cross_references: file.cross_references,
    })
}

impl From<&DoctrineRecord> for DoctrineFile {
    fn from(record: &DoctrineRecord) -> Self {
        Self {
            chapter_index: record.chapter_index,
            chapter_title: record.chapter_title.clone(),
            domains: record.domains.iter().map(|d| d.as_str().to_string()).collect(),
            principles: record.principles.clone(),
            rules: record.rules.clone(),
            claims: record.claims.clone(),
            warnings: record.warnings.clone(),
            cross_references: record.cross_references.clone(),
        }
    }
}
