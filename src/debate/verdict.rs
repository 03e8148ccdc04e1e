//! Final-verdict framing.
//!
//! The framer never invents strategy: it enforces the tribunal verdict
//! when one exists, otherwise adopts a two-thirds majority stance, and in
//! all cases only composes elements the ministers already produced.

use std::collections::BTreeMap;

use crate::types::{
    MinisterPosition, Stance, TribunalDecision, TribunalVerdict,
};

/// Frame the final verdict text from the position set.
///
/// Pure function of the *set*: positions are re-sorted by minister before
/// composition so arrival order cannot leak into the output.
pub fn frame_final_verdict(
    positions: &[MinisterPosition],
    tribunal: Option<&TribunalVerdict>,
    confidence_threshold: f64,
) -> String {
    let mut sorted: Vec<&MinisterPosition> = positions.iter().collect();
    sorted.sort_by_key(|p| p.minister);

    let mut lines = Vec::new();

    if let Some(verdict) = tribunal {
        match verdict.decision {
            TribunalDecision::Silence => {
                lines.push("VERDICT: SILENCE".to_string());
                lines.push("The council is silent. No action is recommended.".to_string());
            }
            TribunalDecision::DelayPendingData => {
                lines.push("VERDICT: DELAY_PENDING_DATA".to_string());
                lines.push("Gather the following before deciding:".to_string());
                for item in &verdict.required_data {
                    lines.push(format!("  - {item}"));
                }
            }
            TribunalDecision::Abort => {
                lines.push("VERDICT: ABORT".to_string());
                lines.push(format!("Tribunal: {}", verdict.reasoning));
            }
            TribunalDecision::Escalate => {
                lines.push("VERDICT: ESCALATE".to_string());
                lines.push(format!(
                    "The decision is yours alone to take: {}",
                    verdict.reasoning
                ));
            }
            TribunalDecision::AllowWithConstraints => {
                lines.push("VERDICT: ALLOW_WITH_CONSTRAINTS".to_string());
                lines.push("Proceed only under every constraint below:".to_string());
                for constraint in &verdict.constraints {
                    lines.push(format!("  - {constraint}"));
                }
            }
        }
    } else {
        lines.push(format!("VERDICT: {}", majority_stance(&sorted)));
    }

    // The council's voices, in stable order.
    lines.push(String::new());
    lines.push("Council positions:".to_string());
    for position in &sorted {
        lines.push(format!(
            "  {} — {} (confidence {:.2}, {} citations)",
            position.minister,
            position.stance,
            position.confidence,
            position.unique_doctrine_count
        ));
    }

    // Low-confidence advice is surfaced but never authoritative.
    let flagged: Vec<String> = sorted
        .iter()
        .filter(|p| p.confidence < confidence_threshold)
        .map(|p| p.minister.to_string())
        .collect();
    if !flagged.is_empty() {
        lines.push(format!(
            "Flagged (below confidence threshold, advisory only): {}",
            flagged.join(", ")
        ));
    }

    lines.join("\n")
}

/// Adopt the majority stance only when at least two thirds of positions
/// share it; otherwise CONDITIONAL.
fn majority_stance(sorted: &[&MinisterPosition]) -> Stance {
    if sorted.is_empty() {
        return Stance::Conditional;
    }

    let mut counts: BTreeMap<&str, (Stance, usize)> = BTreeMap::new();
    for position in sorted {
        counts
            .entry(position.stance.as_str())
            .and_modify(|(_, n)| *n += 1)
            .or_insert((position.stance, 1));
    }

    counts
        .values()
        .find(|(_, n)| *n * 3 >= sorted.len() * 2)
        .map(|(stance, _)| *stance)
        .unwrap_or(Stance::Conditional)
}
