//! Mode routing and the top-level counsel engine.
//!
//! The router is a dispatch over the three modes. Quick is a strategy
//! flag, not a separate engine: three ministers, one-shot synthesis, no
//! tribunal theatrics, and automatic escalation to normal when the
//! situation is too hot for a fast answer. War layers its four gates on
//! top of the normal debate. Everything the engine does ends in the
//! ledger.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::debate::{conduct_debate, DebateContext, DebateError};
use crate::embed::EmbedPool;
use crate::gateway::LlmGateway;
use crate::ledger::{
    apply_war_patterns, detect_patterns, recalibrate_ministers, render_learning_summary, Ledger,
    LedgerError,
};
use crate::registry::BookRegistry;
use crate::types::{
    domain_owners, DebateProceedings, DecisionEvent, Domain, MinisterId, Mode, Outcome,
    OutcomeResult, Pattern, Reversibility, Stakes, TribunalDecision, WarPosture,
};
use crate::war::{run_war_pipeline, WarAssessment, WarContext, WarError, WarOutcome, WarQuery};
use crate::vector_store::VectorStore;

/// Internal risk score above which quick mode refuses to stay quick.
pub const QUICK_RISK_THRESHOLD: f64 = 0.6;

/// Retrieval depth per minister.
const RETRIEVAL_K: usize = 5;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
    #[error("debate: {0}")]
    Debate(#[from] DebateError),
    #[error("war: {0}")]
    War(#[from] WarError),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}

/// One counsel request, mode included.
#[derive(Debug, Clone)]
pub struct CounselRequest {
    pub situation: String,
    pub domain: Domain,
    pub mode: Mode,
    pub stakes: Stakes,
    pub urgency: f64,
    pub emotional_load: f64,
    pub fatigue: f64,
    pub arena: Option<String>,
    pub reversibility: Option<Reversibility>,
    pub constraints: Vec<String>,
    pub log_memory: bool,
    pub analyze_patterns: bool,
}

/// The engine's answer.
#[derive(Debug)]
pub struct CounselReply {
    /// The mode actually executed (quick may escalate to normal).
    pub mode: Mode,
    pub proceedings: Option<DebateProceedings>,
    /// War-mode gate assessment; present for war requests.
    pub war_assessment: Option<WarAssessment>,
    /// Full auditable war proceedings (council audit, shelf, filter
    /// audits) when the war pipeline completed.
    pub war_proceedings: Option<Box<crate::war::WarProceedings>>,
    /// Set when the war gate blocked the goal.
    pub blocked: bool,
    pub event_id: Option<String>,
    pub patterns: Option<Vec<Pattern>>,
    pub posture: String,
}

/// Everything the engine needs, threaded explicitly — no process-wide
/// singletons, so tests are reproducible.
pub struct Engine {
    pub gateway: Arc<dyn LlmGateway>,
    pub pool: Arc<EmbedPool>,
    pub store: VectorStore,
    pub registry: BookRegistry,
    pub ledger: Ledger,
    pub config: Config,
}

impl Engine {
    /// Resolve the execution mode. Quick escalates to normal when the
    /// situation outruns a fast answer; normal and war pass through.
    pub fn resolve_mode(&self, request: &CounselRequest) -> Mode {
        if request.mode != Mode::Quick {
            return request.mode;
        }
        if quick_risk_score(request) > QUICK_RISK_THRESHOLD {
            eprintln!("[router] quick escalated to normal (risk score over threshold)");
            return Mode::Normal;
        }
        Mode::Quick
    }

    /// Run counsel end to end: route, deliberate, record.
    pub async fn counsel(&self, request: CounselRequest) -> Result<CounselReply, EngineError> {
        let mode = self.resolve_mode(&request);

        let reply = match mode {
            Mode::Quick => self.run_quick(&request).await?,
            Mode::Normal => self.run_normal(&request).await?,
            Mode::War => self.run_war(&request).await?,
        };

        let mut reply = reply;

        if request.log_memory || reply.blocked {
            let event_id = self.record_event(&request, &reply).await?;
            reply.event_id = Some(event_id);
        }

        if request.analyze_patterns {
            let events = self.ledger.list_events().await?;
            let outcomes = self.ledger.list_outcomes().await?;
            reply.patterns = Some(detect_patterns(&events, &outcomes));
        }

        Ok(reply)
    }

    fn debate_context(&self, mode: Mode) -> DebateContext<'_> {
        DebateContext {
            gateway: &self.gateway,
            model: &self.config.llm_model,
            store: &self.store,
            pool: &self.pool,
            k: RETRIEVAL_K,
            mode,
            book_filter: None,
            confidence_threshold: self.config.confidence_threshold,
        }
    }

    /// Quick: Truth, Optionality, and the domain's first owner. One-shot
    /// positions, framed directly.
    async fn run_quick(&self, request: &CounselRequest) -> Result<CounselReply, EngineError> {
        let mut council = vec![MinisterId::Truth, MinisterId::Optionality];
        if let Some(owner) = domain_owners(request.domain).into_iter().next() {
            if !council.contains(&owner) {
                council.push(owner);
            }
        }

        let ctx = self.debate_context(Mode::Quick);
        let proceedings = conduct_debate(&ctx, &council, &request.situation).await?;
        let posture = posture_of(&proceedings);

        Ok(CounselReply {
            mode: Mode::Quick,
            proceedings: Some(proceedings),
            war_assessment: None,
            war_proceedings: None,
            blocked: false,
            event_id: None,
            patterns: None,
            posture,
        })
    }

    /// Normal: the domain's owners plus the guardrail ministers, full
    /// debate with conflicts and tribunal.
    async fn run_normal(&self, request: &CounselRequest) -> Result<CounselReply, EngineError> {
        let mut council = domain_owners(request.domain);
        for guardrail in [MinisterId::Truth, MinisterId::Risk] {
            if !council.contains(&guardrail) {
                council.push(guardrail);
            }
        }
        council.sort();
        council.truncate(5);

        let ctx = self.debate_context(Mode::Normal);
        let proceedings = conduct_debate(&ctx, &council, &request.situation).await?;
        let posture = posture_of(&proceedings);

        Ok(CounselReply {
            mode: Mode::Normal,
            proceedings: Some(proceedings),
            war_assessment: None,
            war_proceedings: None,
            blocked: false,
            event_id: None,
            patterns: None,
            posture,
        })
    }

    /// War: constraint gate, biased council, biased shelf, filtered
    /// proceedings.
    async fn run_war(&self, request: &CounselRequest) -> Result<CounselReply, EngineError> {
        let arena = request
            .arena
            .clone()
            .ok_or_else(|| EngineError::InvalidRequest("war mode requires --arena".into()))?;
        let reversibility = request.reversibility.ok_or_else(|| {
            EngineError::InvalidRequest("war mode requires --reversibility".into())
        })?;

        let query = WarQuery {
            context: WarContext {
                goal: request.situation.clone(),
                domain: request.domain,
                arena,
                reversibility,
                urgency: request.urgency,
                emotional_load: request.emotional_load,
            },
            domain_tags: vec![request.domain],
        };

        let ctx = self.debate_context(Mode::War);
        match run_war_pipeline(&ctx, &self.registry, &query).await? {
            WarOutcome::Blocked(assessment) => Ok(CounselReply {
                mode: Mode::War,
                proceedings: None,
                posture: assessment.recommended_posture.as_str().to_string(),
                war_assessment: Some(assessment),
                war_proceedings: None,
                blocked: true,
                event_id: None,
                patterns: None,
            }),
            WarOutcome::Completed(proceedings) => {
                let posture = proceedings.assessment.recommended_posture.as_str().to_string();
                Ok(CounselReply {
                    mode: Mode::War,
                    war_assessment: Some(proceedings.assessment.clone()),
                    proceedings: Some(proceedings.debate.clone()),
                    war_proceedings: Some(proceedings),
                    blocked: false,
                    event_id: None,
                    patterns: None,
                    posture,
                })
            }
        }
    }

    /// Record the decision event. Blocked goals are recorded too — the
    /// audit trail is part of the guardrail, not an error path.
    async fn record_event(
        &self,
        request: &CounselRequest,
        reply: &CounselReply,
    ) -> Result<String, EngineError> {
        let event_id = Uuid::new_v4().to_string();

        let (verdict_summary, illusions, contradictions, ministers) = match &reply.proceedings {
            Some(p) => (
                p.final_verdict.clone(),
                p.positions
                    .iter()
                    .flat_map(|pos| pos.violations.iter().cloned())
                    .collect(),
                p.conflicts.len() as u32,
                p.positions.iter().map(|pos| pos.minister).collect(),
            ),
            None => (
                reply
                    .war_assessment
                    .as_ref()
                    .and_then(|a| a.stop_reason.clone())
                    .unwrap_or_else(|| "blocked".into()),
                Vec::new(),
                0,
                Vec::new(),
            ),
        };

        let event = DecisionEvent {
            event_id: event_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            domain: request.domain,
            stakes: request.stakes,
            emotional_load: request.emotional_load,
            urgency: request.urgency,
            mode: reply.mode,
            ministers_called: ministers,
            verdict_summary,
            posture: reply.posture.clone(),
            illusions_detected: illusions,
            contradictions_found: contradictions,
            sovereign_action: None,
            action_followed_counsel: None,
            override_reason: None,
        };
        self.ledger.insert_event(event).await?;
        Ok(event_id)
    }

    /// Resolve an outcome: append it, rebuild the derived tables, return
    /// the learning summary.
    pub async fn record_outcome(
        &self,
        event_id: &str,
        result: OutcomeResult,
        damage: f64,
        benefit: f64,
        lessons: Vec<String>,
    ) -> Result<String, EngineError> {
        if self.ledger.get_event(event_id).await?.is_none() {
            return Err(EngineError::UnknownEvent(event_id.to_string()));
        }

        self.ledger
            .insert_outcome(Outcome {
                event_id: event_id.to_string(),
                resolved_at: chrono::Utc::now().to_rfc3339(),
                result,
                damage,
                benefit,
                lessons,
            })
            .await?;

        // Derived state is rebuilt wholesale from events + outcomes.
        let events = self.ledger.list_events().await?;
        let outcomes = self.ledger.list_outcomes().await?;

        let patterns = detect_patterns(&events, &outcomes);
        self.ledger.replace_patterns(patterns.clone()).await?;

        let posture = apply_war_patterns(WarPosture::default(), &patterns);
        self.ledger.set_war_posture(posture).await?;

        let calibrations = recalibrate_ministers(&events, &outcomes);
        for ((subject, domain), confidence) in &calibrations {
            self.ledger
                .set_calibration(subject, domain, *confidence)
                .await?;
        }

        Ok(render_learning_summary(&patterns, &posture, &calibrations))
    }
}

/// The quick engine's internal risk score: the hottest of the state
/// signals, with stakes mapped onto the same scale.
pub fn quick_risk_score(request: &CounselRequest) -> f64 {
    let stakes_score: f64 = match request.stakes {
        Stakes::Low => 0.2,
        Stakes::Medium => 0.4,
        Stakes::High => 0.8,
        Stakes::Existential => 1.0,
    };
    stakes_score
        .max(request.emotional_load)
        .max(request.urgency.min(1.0) * 0.85)
        .max(request.fatigue.min(1.0) * 0.85)
}

/// The posture string recorded in the ledger for a debate.
fn posture_of(proceedings: &DebateProceedings) -> String {
    match &proceedings.tribunal_verdict {
        Some(verdict) => match verdict.decision {
            TribunalDecision::AllowWithConstraints => "allow_with_constraints".into(),
            TribunalDecision::DelayPendingData => "delay_pending_data".into(),
            TribunalDecision::Escalate => "escalate".into(),
            TribunalDecision::Abort => "abort".into(),
            TribunalDecision::Silence => "silence".into(),
        },
        None => proceedings
            .final_verdict
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("VERDICT: "))
            .unwrap_or("conditional")
            .to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: Mode) -> CounselRequest {
        CounselRequest {
            situation: "situation".into(),
            domain: Domain::Strategy,
            mode,
            stakes: Stakes::Low,
            urgency: 0.2,
            emotional_load: 0.2,
            fatigue: 0.2,
            arena: None,
            reversibility: None,
            constraints: Vec::new(),
            log_memory: false,
            analyze_patterns: false,
        }
    }

    #[test]
    fn quick_stays_quick_when_calm() {
        let req = request(Mode::Quick);
        assert!(quick_risk_score(&req) <= QUICK_RISK_THRESHOLD);
    }

    #[test]
    fn quick_escalates_on_hot_signals() {
        let mut req = request(Mode::Quick);
        req.stakes = Stakes::High;
        assert!(quick_risk_score(&req) > QUICK_RISK_THRESHOLD);

        let mut req = request(Mode::Quick);
        req.emotional_load = 0.7;
        assert!(quick_risk_score(&req) > QUICK_RISK_THRESHOLD);

        let mut req = request(Mode::Quick);
        req.urgency = 0.8;
        assert!(quick_risk_score(&req) > QUICK_RISK_THRESHOLD);

        let mut req = request(Mode::Quick);
        req.fatigue = 0.8;
        assert!(quick_risk_score(&req) > QUICK_RISK_THRESHOLD);
    }
}
