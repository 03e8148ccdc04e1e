//! Grounded synthesis: retrieved doctrine → one minister position.
//!
//! The model proposes; deterministic post-processing disposes. Everything
//! that matters for the invariants (citation dedup, confidence caps, the
//! Truth-only violations rule, the empty-retrieval override) happens here
//! in plain code, language-independent of whatever the model wrote.

use std::collections::BTreeSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::gateway::{complete_json, LlmGateway, LlmRequest};
use crate::prompts::{self, PromptChunk};
use crate::retrieve::{Retrieval, RetrievedSet};
use crate::types::{MinisterId, MinisterPosition, Stance};

/// Confidence cap when a position cites fewer than two distinct passages.
pub const THIN_CITATION_CAP: f64 = 0.6;

/// Narrative phrases stripped from justifications. The prompt forbids
/// them; the sanitizer enforces it.
const NARRATIVE_PHRASES: &[&str] = &[
    "i believe",
    "i feel that",
    "respectfully",
    "with all due respect",
    "honored members",
    "in my humble opinion",
    "if i may",
    "as your counselor",
];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("whitespace regex"));

/// Raw model output shape for a position.
#[derive(Debug, Deserialize)]
struct PositionFile {
    stance: String,
    justification: String,
    #[serde(default)]
    doctrine_ids: Vec<String>,
    #[serde(default)]
    violations: Vec<String>,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    confidence: f64,
}

fn parse_stance(raw: &str) -> Option<Stance> {
    match raw.trim().to_uppercase().as_str() {
        "ADVANCE" => Some(Stance::Advance),
        "DELAY" => Some(Stance::Delay),
        "AVOID" => Some(Stance::Avoid),
        "CONDITIONAL" => Some(Stance::Conditional),
        "NEEDS_DATA" => Some(Stance::NeedsData),
        "ABSTAIN" => Some(Stance::Abstain),
        "STOP" => Some(Stance::Stop),
        _ => None,
    }
}

/// Strip narrative phrasing, collapse the leftover whitespace.
pub fn sanitize_justification(text: &str) -> String {
    let mut out = text.to_string();
    for phrase in NARRATIVE_PHRASES {
        let pattern = Regex::new(&format!(r"(?i){}\s*,?\s*", regex::escape(phrase)))
            .expect("phrase regex");
        out = pattern.replace_all(&out, "").to_string();
    }
    WHITESPACE.replace_all(out.trim(), " ").to_string()
}

/// The NEEDS_DATA position used whenever a minister has nothing grounded
/// to say.
pub fn needs_data_position(minister: MinisterId, justification: &str) -> MinisterPosition {
    MinisterPosition {
        minister,
        stance: Stance::NeedsData,
        justification: justification.to_string(),
        doctrine_ids: Vec::new(),
        unique_doctrine_count: 0,
        violations: Vec::new(),
        confidence: 0.0,
        constraints: Vec::new(),
    }
}

/// Deterministic post-processing over a parsed model position.
///
/// - citations are restricted to chunks that were actually retrieved, then
///   deduplicated preserving first-seen order
/// - `confidence` clamps to [0,1] and caps at 0.6 under two distinct
///   citations
/// - only Truth keeps `violations`; nonempty violations force STOP and add
///   the factual-inconsistency constraint
#[allow(clippy::too_many_arguments)]
pub fn finalize_position(
    minister: MinisterId,
    retrieved: &RetrievedSet,
    stance: Stance,
    justification: String,
    doctrine_ids: Vec<String>,
    violations: Vec<String>,
    constraints: Vec<String>,
    confidence: f64,
) -> MinisterPosition {
    let known: BTreeSet<&str> = retrieved.all().map(|c| c.chunk_id.as_str()).collect();

    let mut seen = BTreeSet::new();
    let mut cited = Vec::new();
    for id in doctrine_ids {
        if known.contains(id.as_str()) && seen.insert(id.clone()) {
            cited.push(id);
        }
    }
    let unique = cited.len();

    let mut confidence = confidence.clamp(0.0, 1.0);
    if unique < 2 {
        confidence = confidence.min(THIN_CITATION_CAP);
    }

    let violations = if minister == MinisterId::Truth {
        violations
            .into_iter()
            .filter(|v| !v.trim().is_empty())
            .collect()
    } else {
        Vec::new()
    };

    let mut stance = stance;
    let mut constraints = constraints;
    if !violations.is_empty() {
        stance = Stance::Stop;
        constraints.push("factual inconsistencies detected".to_string());
    }

    MinisterPosition {
        minister,
        stance,
        justification: sanitize_justification(&justification),
        doctrine_ids: cited,
        unique_doctrine_count: unique,
        violations,
        confidence,
        constraints,
    }
}

fn to_prompt(chunks: &[crate::retrieve::RetrievedChunk]) -> Vec<PromptChunk<'_>> {
    chunks
        .iter()
        .map(|c| PromptChunk {
            chunk_id: &c.chunk_id,
            book_id: &c.book_id,
            text: &c.text,
        })
        .collect()
}

/// Produce one minister's position for the situation.
///
/// Synthesis failures (schema violations, gateway errors) degrade to
/// NEEDS_DATA — they never abort the debate.
pub async fn synthesize_position(
    gateway: &Arc<dyn LlmGateway>,
    model: &str,
    minister: MinisterId,
    situation: &str,
    retrieval: &Retrieval,
) -> MinisterPosition {
    let retrieved = match retrieval {
        Retrieval::InsufficientKnowledge => {
            return needs_data_position(minister, "no doctrine available for this domain");
        }
        Retrieval::Grounded(set) => set,
    };

    let support = to_prompt(&retrieved.support);
    let counter = to_prompt(&retrieved.counter);
    let neutral = to_prompt(&retrieved.neutral);
    let prompt = prompts::minister_synthesis(minister, situation, &support, &counter, &neutral);

    let request = LlmRequest::new(model, prompt.to_messages(), "synthesize::minister");
    let value = match complete_json(gateway, request).await {
        Ok(value) => value,
        Err(e) => {
            eprintln!("[synthesize] {minister}: {e}; degrading to NEEDS_DATA");
            return needs_data_position(minister, "synthesis failed validation");
        }
    };

    let file: PositionFile = match serde_json::from_value(value) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("[synthesize] {minister}: bad schema ({e}); degrading to NEEDS_DATA");
            return needs_data_position(minister, "synthesis failed validation");
        }
    };

    let Some(stance) = parse_stance(&file.stance) else {
        eprintln!(
            "[synthesize] {minister}: unknown stance {:?}; degrading to NEEDS_DATA",
            file.stance
        );
        return needs_data_position(minister, "synthesis failed validation");
    };

    finalize_position(
        minister,
        retrieved,
        stance,
        file.justification,
        file.doctrine_ids,
        file.violations,
        file.constraints,
        file.confidence,
    )
}
