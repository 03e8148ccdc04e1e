//! Ledger invariants and the learning loop: append-only events, one
//! outcome per event, pattern detection over the ledger, and bounded
//! posture calibration.

use std::sync::Arc;
use std::time::Duration;

use counselor::config::Config;
use counselor::embed::{EmbedPool, HashEmbedder};
use counselor::gateway::{GatewayError, LlmGateway, LlmRequest, LlmResponse};
use counselor::ledger::{Ledger, LedgerError};
use counselor::registry::BookRegistry;
use counselor::router::Engine;
use counselor::types::{
    DecisionEvent, Domain, MinisterId, Mode, Outcome, OutcomeResult, PatternKind, Stakes,
};
use counselor::vector_store::VectorStore;

struct SilentLlm;

#[async_trait::async_trait]
impl LlmGateway for SilentLlm {
    async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, GatewayError> {
        Err(GatewayError::invalid_request("not used in this test"))
    }
}

fn event(id: &str, domain: Domain, mode: Mode, posture: &str) -> DecisionEvent {
    DecisionEvent {
        event_id: id.into(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        domain,
        stakes: Stakes::High,
        emotional_load: 0.4,
        urgency: 0.5,
        mode,
        ministers_called: vec![MinisterId::Truth, MinisterId::Risk],
        verdict_summary: "counsel issued".into(),
        posture: posture.into(),
        illusions_detected: Vec::new(),
        contradictions_found: 1,
        sovereign_action: None,
        action_followed_counsel: None,
        override_reason: None,
    }
}

fn outcome(id: &str, result: OutcomeResult, damage: f64) -> Outcome {
    Outcome {
        event_id: id.into(),
        resolved_at: chrono::Utc::now().to_rfc3339(),
        result,
        damage,
        benefit: 0.1,
        lessons: vec!["exit was blocked".into()],
    }
}

#[tokio::test]
async fn events_are_append_only_at_the_sql_layer() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(dir.path().join("ledger.db")).unwrap();
    ledger
        .insert_event(event("e1", Domain::Power, Mode::Normal, "conditional"))
        .await
        .unwrap();

    // Direct UPDATE and DELETE attempts must fail on the trigger.
    let conn = rusqlite::Connection::open(dir.path().join("ledger.db")).unwrap();
    let update = conn.execute("UPDATE events SET verdict = 'rewritten' WHERE event_id = 'e1'", []);
    assert!(update.is_err());
    let delete = conn.execute("DELETE FROM events WHERE event_id = 'e1'", []);
    assert!(delete.is_err());

    // The row is untouched.
    let verdict: String = conn
        .query_row(
            "SELECT verdict FROM events WHERE event_id = 'e1'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(verdict, "counsel issued");
}

#[tokio::test]
async fn one_outcome_per_event_and_events_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(dir.path().join("ledger.db")).unwrap();
    ledger
        .insert_event(event("e1", Domain::Risk, Mode::Normal, "delay"))
        .await
        .unwrap();

    ledger
        .insert_outcome(outcome("e1", OutcomeResult::Partial, 0.2))
        .await
        .unwrap();

    let second = ledger
        .insert_outcome(outcome("e1", OutcomeResult::Success, 0.0))
        .await;
    assert!(matches!(second, Err(LedgerError::DuplicateOutcome(_))));

    let orphan = ledger
        .insert_outcome(outcome("missing", OutcomeResult::Failure, 0.9))
        .await;
    assert!(matches!(orphan, Err(LedgerError::UnknownEvent(_))));
}

#[tokio::test]
async fn overrides_are_policy_rows_not_errors() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(dir.path().join("ledger.db")).unwrap();
    ledger
        .insert_event(event("e1", Domain::Timing, Mode::Normal, "delay"))
        .await
        .unwrap();

    ledger
        .record_override("e1", "moved immediately anyway", Some("window felt short"))
        .await
        .unwrap();

    let missing = ledger.record_override("nope", "x", None).await;
    assert!(matches!(missing, Err(LedgerError::UnknownEvent(_))));
}

fn idle_engine(dir: &std::path::Path) -> Engine {
    let config = Config::with_data_dir(dir);
    Engine {
        gateway: Arc::new(SilentLlm),
        pool: Arc::new(EmbedPool::new(
            Arc::new(HashEmbedder::new()),
            2,
            Duration::from_secs(5),
        )),
        store: VectorStore::open(config.vector_store_dir()).unwrap(),
        registry: BookRegistry::empty(),
        ledger: Ledger::open(config.ledger_path()).unwrap(),
        config,
    }
}

#[tokio::test]
async fn repeated_war_failures_calibrate_posture_within_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let engine = idle_engine(dir.path());

    // Three escalation-postured war decisions in the same domain.
    for i in 1..=3 {
        engine
            .ledger
            .insert_event(event(
                &format!("e{i}"),
                Domain::Diplomacy,
                Mode::War,
                "apply_pressure_structurally",
            ))
            .await
            .unwrap();
    }

    // Each resolves as failure with heavy damage; the last recomputation
    // carries the full pattern set.
    let mut summary = String::new();
    for i in 1..=3 {
        summary = engine
            .record_outcome(&format!("e{i}"), OutcomeResult::Failure, 0.7, 0.1, vec![])
            .await
            .unwrap();
    }

    let patterns = engine.ledger.list_patterns().await.unwrap();
    let bias = patterns
        .iter()
        .find(|p| p.kind == PatternKind::WarEscalationBias)
        .expect("war escalation bias detected");
    assert_eq!(bias.frequency, 3);
    assert_eq!(bias.domain, Some(Domain::Diplomacy));

    // Posture: one bounded step down from 1.0, floored at 0.3.
    let posture = engine.ledger.get_war_posture().await.unwrap();
    assert!(posture.caution <= 0.7);
    assert!(posture.caution >= 0.3);

    // Ministers on failing events lose confidence in bounded steps.
    let truth = engine
        .ledger
        .get_calibration("truth", "diplomacy")
        .await
        .unwrap();
    assert!((truth - 0.35).abs() < 1e-9);

    assert!(summary.contains("war_escalation_bias"));
    assert!(summary.contains("caution"));
}

#[tokio::test]
async fn unknown_event_outcome_is_a_user_error() {
    let dir = tempfile::tempdir().unwrap();
    let engine = idle_engine(dir.path());
    let result = engine
        .record_outcome("missing", OutcomeResult::Success, 0.0, 1.0, vec![])
        .await;
    assert!(matches!(
        result,
        Err(counselor::router::EngineError::UnknownEvent(_))
    ));
}
