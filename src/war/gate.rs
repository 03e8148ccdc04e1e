//! War-mode constraint gate.
//!
//! A posture filter and pressure amplifier, not a tactics generator. Soft
//! biases are suppressed elsewhere; this gate enforces the hard
//! constraints that are never suppressed: no illegal action, no targeting
//! of specific individuals. Deterministic — no model decides what gets
//! blocked.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Domain, Reversibility};

/// Forbidden-intent signals. Any match blocks the pipeline before
/// retrieval or debate.
pub const FORBIDDEN_SIGNALS: &[&str] = &[
    "destroy reputation",
    "sabotage relationship",
    "coerce",
    "blackmail",
    "defame",
    "frame someone",
    "frame them",
    "harm specific",
    "target individual",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    Viable,
    Blocked,
}

/// Safe postures the gate can recommend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    Halt,
    WithdrawAndReposition,
    SlowDownAndDesignExits,
    ApplyPressureStructurally,
}

impl Posture {
    pub fn as_str(self) -> &'static str {
        match self {
            Posture::Halt => "halt",
            Posture::WithdrawAndReposition => "withdraw_and_reposition",
            Posture::SlowDownAndDesignExits => "slow_down_and_design_exits",
            Posture::ApplyPressureStructurally => "apply_pressure_structurally",
        }
    }
}

/// Input to the gate.
#[derive(Debug, Clone)]
pub struct WarContext {
    pub goal: String,
    pub domain: Domain,
    pub arena: String,
    pub reversibility: Reversibility,
    pub urgency: f64,
    pub emotional_load: f64,
}

/// Gate output: feasibility, the signals that matched, the leverage and
/// cost picture, and the recommended posture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarAssessment {
    pub feasibility: Feasibility,
    pub matched_signals: Vec<String>,
    pub leverage_map: Vec<String>,
    pub cost_profile: BTreeMap<String, String>,
    pub recommended_posture: Posture,
    pub stop_reason: Option<String>,
}

/// Evaluate the gate. Blocked goals terminate the pipeline here.
pub fn evaluate(context: &WarContext) -> WarAssessment {
    let matched = check_constraints(&context.goal);

    if !matched.is_empty() {
        return WarAssessment {
            feasibility: Feasibility::Blocked,
            stop_reason: Some(format!("constraint violation: {}", matched.join(", "))),
            matched_signals: matched,
            leverage_map: Vec::new(),
            cost_profile: BTreeMap::new(),
            recommended_posture: Posture::Halt,
        };
    }

    let leverage = derive_leverage(context);
    let cost = estimate_cost(context);
    let posture = decide_posture(context, &leverage);

    WarAssessment {
        feasibility: Feasibility::Viable,
        matched_signals: Vec::new(),
        leverage_map: leverage,
        cost_profile: cost,
        recommended_posture: posture,
        stop_reason: None,
    }
}

fn check_constraints(goal: &str) -> Vec<String> {
    let goal_lower = goal.to_lowercase();
    FORBIDDEN_SIGNALS
        .iter()
        .filter(|signal| goal_lower.contains(*signal))
        .map(|signal| format!("forbidden_intent:{signal}"))
        .collect()
}

/// Safe, legal moves available in this context.
fn derive_leverage(context: &WarContext) -> Vec<String> {
    let mut leverage = Vec::new();

    if matches!(context.arena.as_str(), "career" | "social" | "status") {
        leverage.extend([
            "skill_compounding".to_string(),
            "environment_selection".to_string(),
            "signal_control".to_string(),
            "optional_exit".to_string(),
        ]);
    }
    if context.reversibility == Reversibility::Reversible {
        leverage.push("fast_iteration".to_string());
    }
    if context.urgency > 0.7 {
        leverage.push("tempo_advantage".to_string());
    }
    if context.emotional_load < 0.5 {
        leverage.push("decision_clarity".to_string());
    }

    leverage
}

fn estimate_cost(context: &WarContext) -> BTreeMap<String, String> {
    let mut cost = BTreeMap::new();
    cost.insert("reputational".to_string(), "medium".to_string());
    cost.insert(
        "emotional".to_string(),
        if context.emotional_load > 0.6 {
            "high".to_string()
        } else {
            "manageable".to_string()
        },
    );
    cost.insert(
        "reversibility".to_string(),
        context.reversibility.as_str().to_string(),
    );
    cost.insert(
        "time_cost".to_string(),
        if context.urgency > 0.7 {
            "low".to_string()
        } else {
            "medium".to_string()
        },
    );
    cost
}

fn decide_posture(context: &WarContext, leverage: &[String]) -> Posture {
    if leverage.is_empty() {
        return Posture::WithdrawAndReposition;
    }
    if context.reversibility == Reversibility::Irreversible && context.urgency > 0.7 {
        return Posture::SlowDownAndDesignExits;
    }
    if context.emotional_load > 0.7 {
        return Posture::WithdrawAndReposition;
    }
    Posture::ApplyPressureStructurally
}
