//! Debate engine end-to-end against a scripted gateway: grounded
//! positions, typed conflicts, tribunal rulings, and the position
//! invariants that survive post-processing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use counselor::debate::{conduct_debate, DebateContext};
use counselor::embed::{EmbedPool, Embedder, HashEmbedder};
use counselor::gateway::{GatewayError, LlmGateway, LlmRequest, LlmResponse};
use counselor::types::{
    chunk_id, Chunk, ConflictKind, Domain, EmbeddedChunk, Lean, MinisterId, Mode, SourceSpan,
    Stance, TribunalDecision,
};
use counselor::vector_store::VectorStore;
use serde_json::json;

struct ScriptedLlm {
    responses: Mutex<Vec<(String, String)>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<(String, String)>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
        })
    }
}

#[async_trait::async_trait]
impl LlmGateway for ScriptedLlm {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, GatewayError> {
        let text: String = req
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let guard = self.responses.lock().unwrap();
        for (needle, body) in guard.iter() {
            if text.contains(needle.as_str()) {
                return Ok(LlmResponse {
                    content: body.clone(),
                    input_tokens: 10,
                    output_tokens: 10,
                    latency: Duration::from_millis(1),
                });
            }
        }
        Err(GatewayError::invalid_request("no scripted response"))
    }
}

fn embedded(book: &str, domain: Domain, text: &str) -> EmbeddedChunk {
    let embedder = HashEmbedder::new();
    let vector = futures::executor::block_on(embedder.embed(text)).unwrap();
    EmbeddedChunk {
        chunk: Chunk {
            chunk_id: chunk_id(book, text),
            book_id: book.into(),
            chapter_index: 1,
            domain,
            lean: Lean::Support,
            text: text.into(),
            source_span: SourceSpan {
                start: 0,
                end: text.len(),
            },
        },
        vector,
    }
}

/// Seed two chunks in every domain the test council retrieves from, and
/// return the ids of the strategy pair for citation.
fn seed_store(dir: &std::path::Path) -> (VectorStore, Vec<String>) {
    let mut store = VectorStore::open(dir).unwrap();
    let mut strategy_ids = Vec::new();

    for (domain, a, b) in [
        (
            Domain::Strategy,
            "strike where the enemy is absent",
            "avoid strength, attack weakness",
        ),
        (Domain::Power, "hold the court's attention", "never outshine the master"),
        (Domain::Risk, "ruin is the only unrecoverable loss", "survive first, profit later"),
        (
            Domain::Intelligence,
            "verify before you trust a report",
            "all warfare is based on information",
        ),
        (Domain::Psychology, "pressure reveals character", "never argue with momentum"),
        (Domain::Law, "paper beats memory", "contracts outlive goodwill"),
        (Domain::Adaptation, "water shapes itself to the ground", "rigidity breaks first"),
    ] {
        for text in [a, b] {
            let chunk = embedded("b1", domain, text);
            if domain == Domain::Strategy {
                strategy_ids.push(chunk.chunk.chunk_id.clone());
            }
            store.upsert(chunk).unwrap();
        }
    }

    (store, strategy_ids)
}

fn position_json(stance: &str, ids: &[String], confidence: f64, violations: Vec<&str>) -> String {
    json!({
        "stance": stance,
        "justification": "doctrine indicates the flank is exposed and the window is short",
        "doctrine_ids": ids,
        "violations": violations,
        "constraints": ["keep an exit route"],
        "confidence": confidence
    })
    .to_string()
}

fn pool() -> EmbedPool {
    EmbedPool::new(Arc::new(HashEmbedder::new()), 2, Duration::from_secs(5))
}

#[tokio::test]
async fn factual_uncertainty_delays_pending_truths_violations() {
    let dir = tempfile::tempdir().unwrap();
    let (store, ids) = seed_store(dir.path());
    let pool = pool();

    let gateway = ScriptedLlm::new(vec![
        (
            "You are the power minister".into(),
            position_json("ADVANCE", &ids, 0.9, vec![]),
        ),
        (
            "You are the risk minister".into(),
            position_json("AVOID", &ids, 0.9, vec![]),
        ),
        (
            "You are the truth minister".into(),
            position_json(
                "ADVANCE",
                &ids,
                0.9,
                vec!["the claimed deadline contradicts the filings"],
            ),
        ),
    ]);

    let gateway: Arc<dyn LlmGateway> = gateway;
    let ctx = DebateContext {
        gateway: &gateway,
        model: "test-model",
        store: &store,
        pool: &pool,
        k: 5,
        mode: Mode::Normal,
        book_filter: None,
        confidence_threshold: 0.65,
    };

    let proceedings = conduct_debate(
        &ctx,
        &[MinisterId::Power, MinisterId::Risk, MinisterId::Truth],
        "should we sign before the quarter closes",
    )
    .await
    .unwrap();

    // Truth's violations forced STOP.
    let truth = proceedings
        .positions
        .iter()
        .find(|p| p.minister == MinisterId::Truth)
        .unwrap();
    assert_eq!(truth.stance, Stance::Stop);

    // Conflicts include the stance clash and factual uncertainty.
    assert!(proceedings
        .conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::StanceConflict));
    assert!(proceedings
        .conflicts
        .iter()
        .any(|c| c.kind == ConflictKind::FactualUncertainty));

    // Factual uncertainty outranks the veto: delay pending data.
    let verdict = proceedings.tribunal_verdict.unwrap();
    assert_eq!(verdict.decision, TribunalDecision::DelayPendingData);
    assert_eq!(
        verdict.required_data,
        vec!["the claimed deadline contradicts the filings".to_string()]
    );
    assert!(proceedings.final_verdict.contains("DELAY_PENDING_DATA"));
}

#[tokio::test]
async fn position_invariants_hold_after_postprocessing() {
    let dir = tempfile::tempdir().unwrap();
    let (store, ids) = seed_store(dir.path());
    let pool = pool();

    // Power over-claims: duplicate citations and an invented id.
    let cited = vec![ids[0].clone(), ids[0].clone(), "invented".to_string()];
    let gateway = ScriptedLlm::new(vec![(
        "You are the power minister".into(),
        position_json("ADVANCE", &cited, 0.95, vec![]),
    )]);

    let gateway: Arc<dyn LlmGateway> = gateway;
    let ctx = DebateContext {
        gateway: &gateway,
        model: "test-model",
        store: &store,
        pool: &pool,
        k: 5,
        mode: Mode::Normal,
        book_filter: None,
        confidence_threshold: 0.65,
    };

    let proceedings = conduct_debate(&ctx, &[MinisterId::Power], "press the advantage")
        .await
        .unwrap();
    let position = &proceedings.positions[0];

    assert_eq!(
        position.unique_doctrine_count,
        position
            .doctrine_ids
            .iter()
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    );
    assert_eq!(position.unique_doctrine_count, 1);
    assert!(position.confidence <= 0.6);
}

#[tokio::test]
async fn ministers_without_doctrine_answer_needs_data() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = VectorStore::open(dir.path()).unwrap();
    // One lonely chunk in a domain nobody on this council owns.
    store
        .upsert(embedded("b1", Domain::Resources, "stockpile before winter"))
        .unwrap();
    let pool = pool();

    let gateway = ScriptedLlm::new(Vec::new());
    let gateway: Arc<dyn LlmGateway> = gateway;
    let ctx = DebateContext {
        gateway: &gateway,
        model: "test-model",
        store: &store,
        pool: &pool,
        k: 5,
        mode: Mode::Normal,
        book_filter: None,
        confidence_threshold: 0.65,
    };

    let proceedings = conduct_debate(&ctx, &[MinisterId::Timing], "when do we move")
        .await
        .unwrap();
    let position = &proceedings.positions[0];
    assert_eq!(position.stance, Stance::NeedsData);
    assert_eq!(position.confidence, 0.0);
    assert_eq!(position.justification, "no doctrine available for this domain");
}

#[tokio::test]
async fn debate_verdict_is_invariant_under_council_order() {
    let dir = tempfile::tempdir().unwrap();
    let (store, ids) = seed_store(dir.path());
    let pool = pool();

    let script = vec![
        (
            "You are the power minister".into(),
            position_json("ADVANCE", &ids, 0.9, vec![]),
        ),
        (
            "You are the risk minister".into(),
            position_json("ADVANCE", &ids, 0.8, vec![]),
        ),
        (
            "You are the timing minister".into(),
            position_json("ADVANCE", &ids, 0.7, vec![]),
        ),
    ];

    let run = |order: Vec<MinisterId>| {
        let gateway = ScriptedLlm::new(script.clone());
        let store = &store;
        let pool = &pool;
        async move {
            let gateway: Arc<dyn LlmGateway> = gateway;
            let ctx = DebateContext {
                gateway: &gateway,
                model: "test-model",
                store,
                pool,
                k: 5,
                mode: Mode::Normal,
                book_filter: None,
                confidence_threshold: 0.65,
            };
            conduct_debate(&ctx, &order, "press the advantage")
                .await
                .unwrap()
        }
    };

    let forward = run(vec![MinisterId::Power, MinisterId::Risk, MinisterId::Timing]).await;
    let backward = run(vec![MinisterId::Timing, MinisterId::Risk, MinisterId::Power]).await;

    assert_eq!(forward.final_verdict, backward.final_verdict);
    assert_eq!(forward.positions, backward.positions);
    assert_eq!(forward.conflicts, backward.conflicts);
    assert!(forward.final_verdict.starts_with("VERDICT: ADVANCE"));
}
