//! War-mode pipeline: constraint gate → biased council → biased retrieval
//! → debate → deterministic speech filter.
//!
//! All four gates are deterministic — no model decides what gets blocked,
//! who speaks, which books are on the shelf, or what gets filtered. A
//! blocked goal terminates before any retrieval or debate happens.

pub mod council;
pub mod gate;
pub mod shelf;
pub mod speech;

use serde::Serialize;
use thiserror::Error;

use crate::debate::{conduct_debate, DebateContext, DebateError};
use crate::registry::BookRegistry;
use crate::types::{DebateProceedings, Domain, MinisterId};

pub use council::{audit as council_audit, select_council, CouncilAudit};
pub use gate::{evaluate as evaluate_gate, Feasibility, Posture, WarAssessment, WarContext};
pub use shelf::{select_books, BookScore};
pub use speech::{filter_speech, FilterAudit};

#[derive(Debug, Error)]
pub enum WarError {
    #[error("debate: {0}")]
    Debate(#[from] DebateError),
    #[error("war shelf too thin: {positive} book(s) scored above zero (need {min})")]
    InsufficientBooks { positive: usize, min: usize },
}

/// A war query: the gate context plus the domain tags driving council and
/// shelf selection.
#[derive(Debug, Clone)]
pub struct WarQuery {
    pub context: WarContext,
    pub domain_tags: Vec<Domain>,
}

/// Full, auditable war proceedings.
#[derive(Debug, Serialize)]
pub struct WarProceedings {
    pub assessment: WarAssessment,
    pub council: Vec<MinisterId>,
    pub council_audit: CouncilAudit,
    pub shelf: Vec<String>,
    pub book_scores: Vec<BookScore>,
    pub debate: DebateProceedings,
    /// One audit per position, original text preserved.
    pub filter_audits: Vec<FilterAudit>,
}

/// Pipeline outcome: blocked at the gate, or completed proceedings.
#[derive(Debug)]
pub enum WarOutcome {
    Blocked(WarAssessment),
    Completed(Box<WarProceedings>),
}

/// Run the war pipeline.
pub async fn run_war_pipeline(
    ctx: &DebateContext<'_>,
    registry: &BookRegistry,
    query: &WarQuery,
) -> Result<WarOutcome, WarError> {
    // Gate 1: hard constraints.
    let assessment = gate::evaluate(&query.context);
    if assessment.feasibility == Feasibility::Blocked {
        eprintln!(
            "[war] goal blocked: {}",
            assessment.stop_reason.as_deref().unwrap_or("constraint")
        );
        return Ok(WarOutcome::Blocked(assessment));
    }

    // Gate 2: council selection.
    let council = council::select_council(&query.domain_tags);
    let council_audit = council::audit(&council);
    eprintln!(
        "[war] council: {} (leverage {}, soft {})",
        council
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        council_audit.leverage_count,
        council_audit.soft_count
    );

    // Gate 3: book bias. Books known to the registry are scored; the shelf
    // constrains every retrieval below.
    let books: Vec<_> = registry.all_books().into_iter().cloned().collect();
    let (shelf, book_scores) = shelf::select_books(&books);
    if shelf.len() < shelf::MIN_BOOKS {
        return Err(WarError::InsufficientBooks {
            positive: shelf.len(),
            min: shelf::MIN_BOOKS,
        });
    }
    eprintln!(
        "[war] shelf: {}",
        shelf.iter().cloned().collect::<Vec<_>>().join(", ")
    );

    // Debate over the biased shelf.
    let war_ctx = DebateContext {
        gateway: ctx.gateway,
        model: ctx.model,
        store: ctx.store,
        pool: ctx.pool,
        k: ctx.k,
        mode: crate::types::Mode::War,
        book_filter: Some(&shelf),
        confidence_threshold: ctx.confidence_threshold,
    };
    let mut debate = conduct_debate(&war_ctx, &council, &query.context.goal).await?;

    // Gate 4: deterministic speech filter over each position.
    let mut filter_audits = Vec::with_capacity(debate.positions.len());
    for position in &mut debate.positions {
        let audit = speech::filter_speech(position.minister, &position.justification);
        position.justification = audit.filtered_text.clone();
        filter_audits.push(audit);
    }

    Ok(WarOutcome::Completed(Box::new(WarProceedings {
        assessment,
        council,
        council_audit,
        shelf: shelf.into_iter().collect(),
        book_scores,
        debate,
        filter_audits,
    })))
}
