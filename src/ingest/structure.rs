//! Phase-1: whole book → canonical chapter structure.
//!
//! One LLM call over the full book text. The validated result is written
//! to `structure.json` via temp-then-rename; that file is the durable
//! commit point for the phase. On validation failure the whole phase is
//! rejected — no partial commit.

use std::path::Path;
use std::sync::Arc;

use crate::gateway::{complete_json, LlmGateway, LlmRequest};
use crate::ingest::validate::{validate_structure, StructureFile};
use crate::ingest::{atomic_write_json, IngestError};
use crate::prompts;

pub const STRUCTURE_FILE: &str = "structure.json";

/// Run or resume phase-1 for a book. An existing committed `structure.json`
/// is loaded and re-validated instead of re-asking the model.
pub async fn run_phase1(
    gateway: &Arc<dyn LlmGateway>,
    model: &str,
    book_id: &str,
    book_text: &str,
    book_dir: &Path,
) -> Result<StructureFile, IngestError> {
    let path = book_dir.join(STRUCTURE_FILE);

    if path.exists() {
        let raw = std::fs::read_to_string(&path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let structure = validate_structure(&value)?;
        eprintln!(
            "[ingest] {book_id}: phase-1 already committed ({} chapters)",
            structure.chapters.len()
        );
        return Ok(structure);
    }

    eprintln!("[ingest] {book_id}: phase-1 structuring ({} chars)", book_text.len());

    let prompt = prompts::phase1_structure(book_text);
    let request = LlmRequest::new(model, prompt.to_messages(), "ingest::phase1");
    let value = complete_json(gateway, request).await?;

    let structure = validate_structure(&value)?;

    std::fs::create_dir_all(book_dir)?;
    atomic_write_json(&path, &structure)?;

    eprintln!(
        "[ingest] {book_id}: phase-1 committed ({} chapters)",
        structure.chapters.len()
    );
    Ok(structure)
}
