//! Typed conflict detection over minister positions.
//!
//! Pure function of the position set. Positions are scanned in minister
//! enum order, so the emitted conflict list is invariant under permutation
//! of the input.

use crate::types::{
    ConflictEvent, ConflictKind, MinisterId, MinisterPosition, Severity, Stance,
};

/// Both parties must be above this confidence for a stance clash to count.
pub const STANCE_CONFLICT_FLOOR: f64 = 0.65;

/// Above this on both sides, a stance clash is HIGH rather than MEDIUM.
const STANCE_CONFLICT_HIGH: f64 = 0.8;

/// Markers of irreversibility in Risk's justification.
const IRREVERSIBILITY_MARKERS: &[&str] = &[
    "irreversib",
    "cannot be undone",
    "no way back",
    "point of no return",
    "one-way door",
];

/// Detect every typed conflict in the position set.
pub fn detect_conflicts(positions: &[MinisterPosition]) -> Vec<ConflictEvent> {
    let mut sorted: Vec<&MinisterPosition> = positions.iter().collect();
    sorted.sort_by_key(|p| p.minister);

    let mut conflicts = Vec::new();

    // STANCE_CONFLICT: ADVANCE vs AVOID, both confident.
    for (i, a) in sorted.iter().enumerate() {
        for b in sorted.iter().skip(i + 1) {
            let clash = matches!(
                (a.stance, b.stance),
                (Stance::Advance, Stance::Avoid) | (Stance::Avoid, Stance::Advance)
            );
            if clash
                && a.confidence > STANCE_CONFLICT_FLOOR
                && b.confidence > STANCE_CONFLICT_FLOOR
            {
                let severity = if a.confidence > STANCE_CONFLICT_HIGH
                    && b.confidence > STANCE_CONFLICT_HIGH
                {
                    Severity::High
                } else {
                    Severity::Medium
                };
                conflicts.push(ConflictEvent {
                    kind: ConflictKind::StanceConflict,
                    severity,
                    parties: vec![a.minister, b.minister],
                    reason: format!(
                        "{} holds {} at {:.2} while {} holds {} at {:.2}",
                        a.minister, a.stance, a.confidence, b.minister, b.stance, b.confidence
                    ),
                });
            }
        }
    }

    // VETO_CONFLICT: a STOP from a veto-bearing minister.
    for position in &sorted {
        if position.stance == Stance::Stop && position.minister.has_veto() {
            conflicts.push(ConflictEvent {
                kind: ConflictKind::VetoConflict,
                severity: Severity::High,
                parties: vec![position.minister],
                reason: format!("{} issued STOP", position.minister),
            });
        }
    }

    // FACTUAL_UNCERTAINTY: any position carrying violations.
    for position in &sorted {
        if !position.violations.is_empty() {
            conflicts.push(ConflictEvent {
                kind: ConflictKind::FactualUncertainty,
                severity: Severity::High,
                parties: vec![position.minister],
                reason: format!(
                    "{} reports {} factual violation(s)",
                    position.minister,
                    position.violations.len()
                ),
            });
        }
    }

    // IRREVERSIBILITY_CONFLICT: Risk warns of irreversibility while another
    // minister pushes ADVANCE.
    let risk_warns = sorted.iter().any(|p| {
        p.minister == MinisterId::Risk && {
            let text = p.justification.to_lowercase();
            IRREVERSIBILITY_MARKERS.iter().any(|m| text.contains(m))
        }
    });
    if risk_warns {
        for position in &sorted {
            if position.minister != MinisterId::Risk && position.stance == Stance::Advance {
                conflicts.push(ConflictEvent {
                    kind: ConflictKind::IrreversibilityConflict,
                    severity: Severity::High,
                    parties: vec![MinisterId::Risk, position.minister],
                    reason: format!(
                        "risk warns of irreversibility while {} advances",
                        position.minister
                    ),
                });
            }
        }
    }

    conflicts
}
