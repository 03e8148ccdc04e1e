//! War-mode council selection.
//!
//! Reshapes who speaks without touching doctrine: leverage-heavy voices
//! dominate, soft voices stay peripheral, and the guardrails (Truth, Risk)
//! are always heard. Selection is a pure function of the query's domain
//! tags — same tags, same council.

use serde::Serialize;

use crate::types::{minister_binding, Domain, MinisterId};

/// Ministers preferred in war councils, in priority order. Truth and Risk
/// are listed for completeness; the hard rules below seat them first.
pub const PREFERRED: &[MinisterId] = &[
    MinisterId::Power,
    MinisterId::Psychology,
    MinisterId::Conflict,
    MinisterId::Intelligence,
    MinisterId::Narrative,
    MinisterId::Timing,
    MinisterId::Optionality,
    MinisterId::Truth,
    MinisterId::Risk,
];

/// Included only when their domain is in the query's tags and room remains.
pub const CONDITIONAL: &[MinisterId] = &[
    MinisterId::Legitimacy,
    MinisterId::Technology,
    MinisterId::Data,
];

/// Excluded unless needed to reach the minimum council size.
pub const DEPRIORITIZED: &[MinisterId] = &[
    MinisterId::Diplomacy,
    MinisterId::Discipline,
    MinisterId::Adaptation,
];

pub const MIN_COUNCIL: usize = 3;
pub const MAX_COUNCIL: usize = 5;

/// Audit record for one selection, kept for transparency.
#[derive(Debug, Clone, Serialize)]
pub struct CouncilAudit {
    pub selected: Vec<MinisterId>,
    pub leverage_count: usize,
    pub soft_count: usize,
    pub guardrails_present: bool,
}

/// A minister is relevant when its permissioned domains intersect the
/// query's tags.
fn relevant(minister: MinisterId, tags: &[Domain]) -> bool {
    let binding = minister_binding(minister);
    tags.iter().any(|tag| binding.allowed_domains.contains(tag))
}

/// Select the war council for the given domain tags.
pub fn select_council(tags: &[Domain]) -> Vec<MinisterId> {
    let mut selected: Vec<MinisterId> = Vec::new();

    // Guardrails are seated before anyone else.
    selected.push(MinisterId::Truth);
    selected.push(MinisterId::Risk);

    // Preferred ministers matching the domain tags.
    for &minister in PREFERRED {
        if selected.len() >= MAX_COUNCIL {
            break;
        }
        if !selected.contains(&minister) && relevant(minister, tags) {
            selected.push(minister);
        }
    }

    // Conditional ministers, domain-relevant only.
    for &minister in CONDITIONAL {
        if selected.len() >= MAX_COUNCIL {
            break;
        }
        if !selected.contains(&minister) && relevant(minister, tags) {
            selected.push(minister);
        }
    }

    // Reach the minimum from the preferred bench, then — only if the bench
    // somehow runs dry — from the deprioritized ministers.
    for &minister in PREFERRED.iter().chain(DEPRIORITIZED) {
        if selected.len() >= MIN_COUNCIL {
            break;
        }
        if !selected.contains(&minister) {
            selected.push(minister);
        }
    }

    selected.truncate(MAX_COUNCIL);
    selected
}

/// Build the audit record for a selection.
pub fn audit(selected: &[MinisterId]) -> CouncilAudit {
    let guardrails = [MinisterId::Truth, MinisterId::Risk];
    let leverage = selected
        .iter()
        .filter(|m| !guardrails.contains(m) && !DEPRIORITIZED.contains(m))
        .count();
    let soft = selected
        .iter()
        .filter(|m| DEPRIORITIZED.contains(m))
        .count();

    CouncilAudit {
        selected: selected.to_vec(),
        leverage_count: leverage,
        soft_count: soft,
        guardrails_present: guardrails.iter().all(|g| selected.contains(g)),
    }
}
