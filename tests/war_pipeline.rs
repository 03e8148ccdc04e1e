//! War pipeline end-to-end: the constraint gate blocks before any
//! retrieval, the council and shelf obey their bounds, and the speech
//! filter rewrites refusals while preserving the originals for audit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use counselor::debate::DebateContext;
use counselor::embed::{EmbedError, EmbedPool, Embedder, HashEmbedder};
use counselor::gateway::{GatewayError, LlmGateway, LlmRequest, LlmResponse};
use counselor::registry::BookRegistry;
use counselor::types::{
    chunk_id, BookMetadata, Chunk, Domain, EmbeddedChunk, Lean, MinisterId, Mode, ModePriority,
    Reversibility, SourceSpan, Tone,
};
use counselor::vector_store::VectorStore;
use counselor::war::{
    run_war_pipeline, Feasibility, Posture, WarContext, WarError, WarOutcome, WarQuery,
};
use serde_json::json;

// =============================================================================
// Counting fakes
// =============================================================================

struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Embedder for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }
}

struct ScriptedLlm {
    responses: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    fn new(responses: Vec<(String, String)>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl LlmGateway for ScriptedLlm {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
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

// =============================================================================
// Fixture
// =============================================================================

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

fn book(id: &str, domains: &[Domain], tones: &[Tone], war: f64) -> BookMetadata {
    BookMetadata {
        book_id: id.into(),
        domains: domains.iter().copied().collect(),
        tones: tones.iter().copied().collect(),
        priority: ModePriority {
            normal: 0.5,
            war,
            quick: 0.5,
        },
    }
}

fn seeded_registry() -> BookRegistry {
    BookRegistry::from_books(vec![
        book("hard_lines", &[Domain::Power, Domain::Conflict], &[Tone::Cold], 1.0),
        book("long_game", &[Domain::Strategy, Domain::Timing], &[Tone::Strategic], 0.9),
        book("soft_paths", &[Domain::Morality], &[Tone::Therapeutic], 1.0),
    ])
}

fn seeded_store(dir: &std::path::Path) -> VectorStore {
    let mut store = VectorStore::open(dir).unwrap();
    for (book, domain, texts) in [
        (
            "hard_lines",
            Domain::Power,
            ["apply pressure at the hinge", "never threaten what you cannot do"],
        ),
        (
            "hard_lines",
            Domain::Conflict,
            ["escalate only on your own tempo", "a siege beats a storm"],
        ),
        (
            "long_game",
            Domain::Strategy,
            ["position decides before contact", "trade space for time"],
        ),
        (
            "long_game",
            Domain::Intelligence,
            ["count the other side's exits", "watch supply, not speeches"],
        ),
        (
            "long_game",
            Domain::Risk,
            ["price the irreversible separately", "cap every downside first"],
        ),
        (
            "long_game",
            Domain::Psychology,
            ["let urgency cool before committing", "mirror calm, not panic"],
        ),
        (
            "long_game",
            Domain::Law,
            ["paper the agreement early", "venue shapes the verdict"],
        ),
    ] {
        for text in texts {
            store.upsert(embedded(book, domain, text)).unwrap();
        }
    }
    store
}

fn position_json(stance: &str, justification: &str) -> String {
    json!({
        "stance": stance,
        "justification": justification,
        "doctrine_ids": [],
        "violations": [],
        "constraints": [],
        "confidence": 0.5
    })
    .to_string()
}

fn war_query(goal: &str, domain: Domain) -> WarQuery {
    WarQuery {
        context: WarContext {
            goal: goal.into(),
            domain,
            arena: "career".into(),
            reversibility: Reversibility::Reversible,
            urgency: 0.5,
            emotional_load: 0.3,
        },
        domain_tags: vec![domain],
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn forbidden_goal_blocks_before_any_retrieval_or_debate() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());
    let registry = seeded_registry();

    let embedder = Arc::new(CountingEmbedder {
        inner: HashEmbedder::new(),
        calls: AtomicUsize::new(0),
    });
    let pool = EmbedPool::new(embedder.clone(), 2, Duration::from_secs(5));
    let gateway = ScriptedLlm::new(Vec::new());
    let gateway_dyn: Arc<dyn LlmGateway> = gateway.clone();

    let ctx = DebateContext {
        gateway: &gateway_dyn,
        model: "test-model",
        store: &store,
        pool: &pool,
        k: 5,
        mode: Mode::War,
        book_filter: None,
        confidence_threshold: 0.65,
    };

    let outcome = run_war_pipeline(
        &ctx,
        &registry,
        &war_query("target individual politicians and frame them", Domain::Power),
    )
    .await
    .unwrap();

    let WarOutcome::Blocked(assessment) = outcome else {
        panic!("expected blocked outcome");
    };
    assert_eq!(assessment.feasibility, Feasibility::Blocked);
    assert_eq!(assessment.recommended_posture, Posture::Halt);
    assert!(assessment
        .matched_signals
        .iter()
        .any(|s| s.contains("target individual")));

    // Nothing downstream ran.
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn council_and_shelf_obey_their_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());
    let registry = seeded_registry();
    let pool = EmbedPool::new(Arc::new(HashEmbedder::new()), 2, Duration::from_secs(5));

    // Every minister the council can seat answers with a clean position.
    let script: Vec<(String, String)> = MinisterId::ALL
        .iter()
        .map(|m| {
            (
                format!("You are the {m} minister"),
                position_json("CONDITIONAL", "Costs: time. Risks: churn. Exit: stand down."),
            )
        })
        .collect();
    let gateway: Arc<dyn LlmGateway> = ScriptedLlm::new(script);

    let ctx = DebateContext {
        gateway: &gateway,
        model: "test-model",
        store: &store,
        pool: &pool,
        k: 5,
        mode: Mode::War,
        book_filter: None,
        confidence_threshold: 0.65,
    };

    let outcome = run_war_pipeline(
        &ctx,
        &registry,
        &war_query("strengthen our negotiating position", Domain::Diplomacy),
    )
    .await
    .unwrap();

    let WarOutcome::Completed(proceedings) = outcome else {
        panic!("expected completed proceedings");
    };

    // Council: guardrails present, size in [3,5], Diplomacy stays out even
    // for a diplomacy-tagged query.
    assert!(proceedings.council.contains(&MinisterId::Truth));
    assert!(proceedings.council.contains(&MinisterId::Risk));
    assert!(proceedings.council.len() >= 3 && proceedings.council.len() <= 5);
    assert!(!proceedings.council.contains(&MinisterId::Diplomacy));
    assert!(proceedings.council_audit.guardrails_present);

    // Shelf: bounded, and the negative-scoring book is never on it.
    assert!(proceedings.shelf.len() >= 2 && proceedings.shelf.len() <= 5);
    assert!(!proceedings.shelf.contains(&"soft_paths".to_string()));
    assert!(proceedings
        .book_scores
        .iter()
        .any(|s| s.book_id == "soft_paths" && s.score <= 0.0));
}

#[tokio::test]
async fn speech_filter_rewrites_refusals_but_never_truth() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());
    let registry = seeded_registry();
    let pool = EmbedPool::new(Arc::new(HashEmbedder::new()), 2, Duration::from_secs(5));

    let refusal = "I cannot help with this because this is unethical and wrong";
    let script: Vec<(String, String)> = MinisterId::ALL
        .iter()
        .map(|m| {
            (
                format!("You are the {m} minister"),
                position_json("AVOID", refusal),
            )
        })
        .collect();
    let gateway: Arc<dyn LlmGateway> = ScriptedLlm::new(script);

    let ctx = DebateContext {
        gateway: &gateway,
        model: "test-model",
        store: &store,
        pool: &pool,
        k: 5,
        mode: Mode::War,
        book_filter: None,
        confidence_threshold: 0.65,
    };

    let outcome = run_war_pipeline(
        &ctx,
        &registry,
        &war_query("stabilize the team through the reorg", Domain::Psychology),
    )
    .await
    .unwrap();
    let WarOutcome::Completed(proceedings) = outcome else {
        panic!("expected completed proceedings");
    };

    let audit_for = |minister: MinisterId| {
        proceedings
            .filter_audits
            .iter()
            .find(|a| a.minister == minister)
    };

    // Psychology is on the council for a psychology-tagged query and gets
    // filtered; the original text survives in the audit record.
    let psychology = audit_for(MinisterId::Psychology).expect("psychology seated");
    assert!(psychology.was_filtered);
    assert!(psychology.phrases_removed.len() >= 2);
    assert!(psychology.filtered_text.contains("[REFUSAL_REMOVED]"));
    assert_eq!(psychology.original_text, refusal);

    // Truth is seated by the hard rules and is untouched.
    let truth = audit_for(MinisterId::Truth).expect("truth seated");
    assert!(!truth.was_filtered);
    assert_eq!(truth.filtered_text, truth.original_text);

    // The filtered text is what the proceedings carry.
    let psychology_position = proceedings
        .debate
        .positions
        .iter()
        .find(|p| p.minister == MinisterId::Psychology)
        .unwrap();
    assert!(psychology_position.justification.contains("[REFUSAL_REMOVED]"));
}

#[tokio::test]
async fn thin_shelf_refuses_war_retrieval() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store(dir.path());
    // Only one book scores positive.
    let registry = BookRegistry::from_books(vec![
        book("hard_lines", &[Domain::Power], &[Tone::Cold], 1.0),
        book("soft_paths", &[Domain::Morality], &[Tone::Therapeutic], 1.0),
    ]);
    let pool = EmbedPool::new(Arc::new(HashEmbedder::new()), 2, Duration::from_secs(5));
    let gateway: Arc<dyn LlmGateway> = ScriptedLlm::new(Vec::new());

    let ctx = DebateContext {
        gateway: &gateway,
        model: "test-model",
        store: &store,
        pool: &pool,
        k: 5,
        mode: Mode::War,
        book_filter: None,
        confidence_threshold: 0.65,
    };

    let result = run_war_pipeline(
        &ctx,
        &registry,
        &war_query("press the advantage", Domain::Power),
    )
    .await;
    assert!(matches!(
        result,
        Err(WarError::InsufficientBooks { positive: 1, .. })
    ));
}
