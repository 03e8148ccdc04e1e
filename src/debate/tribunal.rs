//! The tribunal: a constrained mapping from typed conflicts to one of five
//! verdicts.
//!
//! Convened iff the conflict list is nonempty. The priority order is
//! fixed: factual uncertainty outranks vetoes, vetoes outrank
//! irreversibility, and a bare stance clash allows the action under the
//! union of every position's constraints.

use std::collections::BTreeSet;

use crate::types::{
    ConflictEvent, ConflictKind, MinisterId, MinisterPosition, TribunalDecision, TribunalVerdict,
};

/// Map conflicts to a verdict. Returns `None` when there is nothing to
/// rule on.
pub fn convene(
    conflicts: &[ConflictEvent],
    positions: &[MinisterPosition],
) -> Option<TribunalVerdict> {
    if conflicts.is_empty() {
        return None;
    }

    let has = |kind: ConflictKind| conflicts.iter().any(|c| c.kind == kind);

    if has(ConflictKind::FactualUncertainty) {
        // Required data comes from Truth's violations: each one names a
        // fact that must be settled before the decision can proceed.
        let required_data: Vec<String> = positions
            .iter()
            .filter(|p| p.minister == MinisterId::Truth)
            .flat_map(|p| p.violations.iter().cloned())
            .collect();

        return Some(TribunalVerdict {
            decision: TribunalDecision::DelayPendingData,
            constraints: Vec::new(),
            required_data,
            reasoning: "factual uncertainty on the record; resolve before acting".into(),
        });
    }

    if has(ConflictKind::VetoConflict) {
        let vetoers: Vec<String> = conflicts
            .iter()
            .filter(|c| c.kind == ConflictKind::VetoConflict)
            .flat_map(|c| c.parties.iter().map(|m| m.to_string()))
            .collect();
        return Some(TribunalVerdict {
            decision: TribunalDecision::Abort,
            constraints: Vec::new(),
            required_data: Vec::new(),
            reasoning: format!("veto from: {}", vetoers.join(", ")),
        });
    }

    if has(ConflictKind::IrreversibilityConflict) {
        return Some(TribunalVerdict {
            decision: TribunalDecision::Escalate,
            constraints: Vec::new(),
            required_data: Vec::new(),
            reasoning: "irreversible action under dispute; escalate to the sovereign".into(),
        });
    }

    if has(ConflictKind::StanceConflict) {
        // Union of every position's constraints, deduplicated and in a
        // stable order.
        let constraints: BTreeSet<String> = positions
            .iter()
            .flat_map(|p| p.constraints.iter().cloned())
            .collect();
        return Some(TribunalVerdict {
            decision: TribunalDecision::AllowWithConstraints,
            constraints: constraints.into_iter().collect(),
            required_data: Vec::new(),
            reasoning: "confident stances diverge; allowed under the combined constraints".into(),
        });
    }

    // Conflicts that map to no ruling: the tribunal stays silent.
    Some(TribunalVerdict {
        decision: TribunalDecision::Silence,
        constraints: Vec::new(),
        required_data: Vec::new(),
        reasoning: "no actionable ruling".into(),
    })
}
