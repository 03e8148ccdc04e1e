//! Calibration: bounded adjustments from detected patterns and resolved
//! outcomes.
//!
//! Two layers. War patterns shape N's posture through clamped
//! multiplicative steps — a single pattern can shade the posture, never
//! collapse it. Resolved outcomes move per-minister per-domain confidence
//! in ±0.05 steps from a 0.50 start, so no minister accumulates permanent
//! authority.

use std::collections::BTreeMap;

use crate::types::{
    DecisionEvent, Outcome, OutcomeResult, Pattern, PatternKind, WarPosture,
};

pub const CAUTION_STEP: f64 = 0.7;
pub const CAUTION_FLOOR: f64 = 0.3;
pub const URGENCY_STEP: f64 = 1.5;
pub const URGENCY_CEIL: f64 = 3.0;
pub const BLUNTNESS_STEP: f64 = 1.3;
pub const BLUNTNESS_CEIL: f64 = 2.0;

pub const INITIAL_CONFIDENCE: f64 = 0.5;
const CORRECT_ADJUSTMENT: f64 = 0.05;
const INCORRECT_ADJUSTMENT: f64 = -0.05;

/// Apply war patterns to N's posture. One clamped step per pattern row.
pub fn apply_war_patterns(mut posture: WarPosture, patterns: &[Pattern]) -> WarPosture {
    for pattern in patterns {
        match pattern.kind {
            PatternKind::WarEscalationBias => {
                posture.caution = (posture.caution * CAUTION_STEP).max(CAUTION_FLOOR);
            }
            PatternKind::WarFalseUrgencyLoop => {
                posture.urgency_threshold =
                    (posture.urgency_threshold * URGENCY_STEP).min(URGENCY_CEIL);
            }
            PatternKind::WarRepeatedOverrides => {
                posture.bluntness = (posture.bluntness * BLUNTNESS_STEP).min(BLUNTNESS_CEIL);
            }
            _ => {}
        }
    }
    posture
}

/// Rebuild per-minister per-domain confidence from the full ledger.
///
/// Derived state: starting every pair at 0.50 and replaying all resolved
/// events gives the same result as incremental updates, and survives
/// ledger restores.
pub fn recalibrate_ministers(
    events: &[DecisionEvent],
    outcomes: &[Outcome],
) -> BTreeMap<(String, String), f64> {
    let outcome_by_event: BTreeMap<&str, &Outcome> = outcomes
        .iter()
        .map(|o| (o.event_id.as_str(), o))
        .collect();

    let mut calibrations: BTreeMap<(String, String), f64> = BTreeMap::new();

    for event in events {
        let Some(outcome) = outcome_by_event.get(event.event_id.as_str()) else {
            continue;
        };
        let adjustment = match outcome.result {
            OutcomeResult::Success => CORRECT_ADJUSTMENT,
            OutcomeResult::Partial => 0.0,
            OutcomeResult::Failure => INCORRECT_ADJUSTMENT,
        };

        for minister in &event.ministers_called {
            let key = (minister.as_str().to_string(), event.domain.to_string());
            let current = calibrations
                .get(&key)
                .copied()
                .unwrap_or(INITIAL_CONFIDENCE);
            calibrations.insert(key, (current + adjustment).clamp(0.0, 1.0));
        }
    }

    calibrations
}

/// Human-readable learning summary printed after an outcome is recorded.
pub fn render_learning_summary(
    patterns: &[Pattern],
    posture: &WarPosture,
    calibrations: &BTreeMap<(String, String), f64>,
) -> String {
    let mut lines = Vec::new();

    if patterns.is_empty() {
        lines.push("No recurring patterns detected yet.".to_string());
    } else {
        lines.push(format!("Patterns detected: {}", patterns.len()));
        for pattern in patterns {
            lines.push(format!(
                "  - {} (x{}): {}",
                pattern.kind.as_str(),
                pattern.frequency,
                pattern.description
            ));
        }
    }

    lines.push(format!(
        "War posture: caution {:.2}, urgency threshold {:.2}, bluntness {:.2}",
        posture.caution, posture.urgency_threshold, posture.bluntness
    ));

    let mut shifted: Vec<_> = calibrations
        .iter()
        .filter(|(_, c)| (**c - INITIAL_CONFIDENCE).abs() > 1e-9)
        .collect();
    shifted.sort_by(|a, b| a.0.cmp(b.0));
    if !shifted.is_empty() {
        lines.push("Minister calibration shifts:".to_string());
        for ((minister, domain), confidence) in shifted {
            lines.push(format!("  - {minister} in {domain}: {confidence:.2}"));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Domain, MinisterId, Mode, Stakes};

    fn pattern(kind: PatternKind) -> Pattern {
        Pattern {
            pattern_id: format!("{}:test", kind.as_str()),
            kind,
            description: "test".into(),
            domain: Some(Domain::Diplomacy),
            frequency: 3,
            last_seen: "2026-01-01T00:00:00Z".into(),
            last_outcome: Some(OutcomeResult::Failure),
        }
    }

    #[test]
    fn escalation_bias_reduces_caution_with_floor() {
        let posture = apply_war_patterns(
            WarPosture::default(),
            &[pattern(PatternKind::WarEscalationBias)],
        );
        assert!((posture.caution - 0.7).abs() < 1e-9);

        // Many repeats bottom out at the floor instead of collapsing.
        let many: Vec<Pattern> = (0..10)
            .map(|_| pattern(PatternKind::WarEscalationBias))
            .collect();
        let posture = apply_war_patterns(WarPosture::default(), &many);
        assert!((posture.caution - CAUTION_FLOOR).abs() < 1e-9);
    }

    #[test]
    fn urgency_and_bluntness_respect_ceilings() {
        let many: Vec<Pattern> = (0..10)
            .flat_map(|_| {
                vec![
                    pattern(PatternKind::WarFalseUrgencyLoop),
                    pattern(PatternKind::WarRepeatedOverrides),
                ]
            })
            .collect();
        let posture = apply_war_patterns(WarPosture::default(), &many);
        assert!((posture.urgency_threshold - URGENCY_CEIL).abs() < 1e-9);
        assert!((posture.bluntness - BLUNTNESS_CEIL).abs() < 1e-9);
    }

    #[test]
    fn minister_confidence_moves_in_bounded_steps() {
        let event = DecisionEvent {
            event_id: "e1".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
            domain: Domain::Risk,
            stakes: Stakes::High,
            emotional_load: 0.2,
            urgency: 0.4,
            mode: Mode::Normal,
            ministers_called: vec![MinisterId::Risk, MinisterId::Truth],
            verdict_summary: "v".into(),
            posture: "conditional".into(),
            illusions_detected: Vec::new(),
            contradictions_found: 0,
            sovereign_action: None,
            action_followed_counsel: Some(true),
            override_reason: None,
        };
        let outcome = Outcome {
            event_id: "e1".into(),
            resolved_at: "2026-01-02T00:00:00Z".into(),
            result: OutcomeResult::Success,
            damage: 0.0,
            benefit: 0.8,
            lessons: Vec::new(),
        };

        let calibrations = recalibrate_ministers(&[event], &[outcome]);
        assert!(
            (calibrations[&("risk".to_string(), "risk".to_string())] - 0.55).abs() < 1e-9
        );
        assert!(
            (calibrations[&("truth".to_string(), "risk".to_string())] - 0.55).abs() < 1e-9
        );
    }
}
