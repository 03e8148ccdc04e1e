//! Core data model for the counsel engine.
//!
//! Everything here is either content-derived (chunk ids), a closed
//! enumeration (domains, tones, ministers, stances), or an immutable record
//! written once by the ingestion pipeline or the ledger. Nothing depends on
//! wall-clock for identity.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ingestion schema version. Changing this is the only way to re-embed an
/// already-ingested book: it flows into every chunk id.
pub const INGEST_VERSION: &str = "v1";

/// Embedding dimensionality expected from the embedding backend.
pub const EMBEDDING_DIM: usize = 384;

// =============================================================================
// Domains & tones
// =============================================================================

/// Closed enumeration of doctrine domains. No other tags are accepted;
/// validation rejects anything outside this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Strategy,
    Power,
    Conflict,
    Deception,
    Psychology,
    Leadership,
    Organization,
    Intelligence,
    Timing,
    Risk,
    Resources,
    Law,
    Morality,
    Diplomacy,
    Adaptation,
}

impl Domain {
    pub const ALL: [Domain; 15] = [
        Domain::Strategy,
        Domain::Power,
        Domain::Conflict,
        Domain::Deception,
        Domain::Psychology,
        Domain::Leadership,
        Domain::Organization,
        Domain::Intelligence,
        Domain::Timing,
        Domain::Risk,
        Domain::Resources,
        Domain::Law,
        Domain::Morality,
        Domain::Diplomacy,
        Domain::Adaptation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Strategy => "strategy",
            Domain::Power => "power",
            Domain::Conflict => "conflict",
            Domain::Deception => "deception",
            Domain::Psychology => "psychology",
            Domain::Leadership => "leadership",
            Domain::Organization => "organization",
            Domain::Intelligence => "intelligence",
            Domain::Timing => "timing",
            Domain::Risk => "risk",
            Domain::Resources => "resources",
            Domain::Law => "law",
            Domain::Morality => "morality",
            Domain::Diplomacy => "diplomacy",
            Domain::Adaptation => "adaptation",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown domain: {s}"))
    }
}

/// Book tone tags used by metadata and the war-mode book bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Dark,
    Strategic,
    Cold,
    Competitive,
    Amoral,
    Moral,
    Cautionary,
    Therapeutic,
    Inspiring,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Dark => "dark",
            Tone::Strategic => "strategic",
            Tone::Cold => "cold",
            Tone::Competitive => "competitive",
            Tone::Amoral => "amoral",
            Tone::Moral => "moral",
            Tone::Cautionary => "cautionary",
            Tone::Therapeutic => "therapeutic",
            Tone::Inspiring => "inspiring",
        }
    }
}

// =============================================================================
// Ministers
// =============================================================================

/// Closed enumeration of the fifteen ministers. Behavior differences
/// (Truth's never-filter rule, veto rights) are data keyed on this enum,
/// never subclass overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinisterId {
    Power,
    Psychology,
    Conflict,
    Diplomacy,
    Risk,
    Optionality,
    Timing,
    Technology,
    Data,
    Adaptation,
    Discipline,
    Legitimacy,
    Truth,
    Intelligence,
    Narrative,
}

impl MinisterId {
    pub const ALL: [MinisterId; 15] = [
        MinisterId::Power,
        MinisterId::Psychology,
        MinisterId::Conflict,
        MinisterId::Diplomacy,
        MinisterId::Risk,
        MinisterId::Optionality,
        MinisterId::Timing,
        MinisterId::Technology,
        MinisterId::Data,
        MinisterId::Adaptation,
        MinisterId::Discipline,
        MinisterId::Legitimacy,
        MinisterId::Truth,
        MinisterId::Intelligence,
        MinisterId::Narrative,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MinisterId::Power => "power",
            MinisterId::Psychology => "psychology",
            MinisterId::Conflict => "conflict",
            MinisterId::Diplomacy => "diplomacy",
            MinisterId::Risk => "risk",
            MinisterId::Optionality => "optionality",
            MinisterId::Timing => "timing",
            MinisterId::Technology => "technology",
            MinisterId::Data => "data",
            MinisterId::Adaptation => "adaptation",
            MinisterId::Discipline => "discipline",
            MinisterId::Legitimacy => "legitimacy",
            MinisterId::Truth => "truth",
            MinisterId::Intelligence => "intelligence",
            MinisterId::Narrative => "narrative",
        }
    }

    /// Ministers whose STOP carries veto weight in the tribunal.
    pub fn has_veto(self) -> bool {
        matches!(
            self,
            MinisterId::Risk | MinisterId::Truth | MinisterId::Optionality
        )
    }
}

impl fmt::Display for MinisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MinisterId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MinisterId::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown minister: {s}"))
    }
}

/// Which books a minister may retrieve from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookScope {
    /// Every book in the store.
    All,
    /// Only the named books.
    Only(BTreeSet<String>),
}

impl BookScope {
    pub fn permits(&self, book_id: &str) -> bool {
        match self {
            BookScope::All => true,
            BookScope::Only(books) => books.contains(book_id),
        }
    }
}

/// Per-minister retrieval permissions. Immutable at runtime; the retriever
/// treats this as a hard ACL, not a heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinisterBinding {
    pub minister: MinisterId,
    pub allowed_domains: BTreeSet<Domain>,
    pub allowed_books: BookScope,
}

fn domains(list: &[Domain]) -> BTreeSet<Domain> {
    list.iter().copied().collect()
}

/// The canonical minister → domain binding table.
pub fn minister_binding(minister: MinisterId) -> MinisterBinding {
    let allowed_domains = match minister {
        MinisterId::Power => domains(&[Domain::Power, Domain::Leadership, Domain::Strategy]),
        MinisterId::Psychology => domains(&[Domain::Psychology, Domain::Deception]),
        MinisterId::Conflict => domains(&[Domain::Conflict, Domain::Strategy]),
        MinisterId::Diplomacy => domains(&[Domain::Diplomacy, Domain::Morality]),
        MinisterId::Risk => domains(&[Domain::Risk, Domain::Strategy]),
        MinisterId::Optionality => domains(&[Domain::Risk, Domain::Adaptation]),
        MinisterId::Timing => domains(&[Domain::Timing, Domain::Strategy]),
        MinisterId::Technology => domains(&[Domain::Resources, Domain::Organization]),
        MinisterId::Data => domains(&[Domain::Intelligence, Domain::Risk]),
        MinisterId::Adaptation => domains(&[Domain::Adaptation, Domain::Timing]),
        MinisterId::Discipline => domains(&[Domain::Organization, Domain::Leadership]),
        MinisterId::Legitimacy => domains(&[Domain::Law, Domain::Morality]),
        MinisterId::Truth => domains(&[Domain::Intelligence, Domain::Psychology, Domain::Law]),
        MinisterId::Intelligence => domains(&[Domain::Intelligence, Domain::Deception]),
        MinisterId::Narrative => domains(&[Domain::Deception, Domain::Psychology]),
    };
    MinisterBinding {
        minister,
        allowed_domains,
        allowed_books: BookScope::All,
    }
}

/// Ministers that own a given domain, in enum order. Used by the quick
/// engine to pick the domain's strongest voice.
pub fn domain_owners(domain: Domain) -> Vec<MinisterId> {
    MinisterId::ALL
        .iter()
        .copied()
        .filter(|m| minister_binding(*m).allowed_domains.contains(&domain))
        .collect()
}

// =============================================================================
// Doctrine records
// =============================================================================

/// One chapter as produced by phase-1 structuring. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRecord {
    pub book_id: String,
    pub chapter_index: u32,
    pub title: String,
    pub text: String,
}

/// Extracted doctrine for one chapter. Immutable once written.
///
/// Invariants enforced at validation: 1–3 domains from the closed enum,
/// every cross-reference resolves to a chapter in the same book, list
/// fields contain only non-empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctrineRecord {
    pub book_id: String,
    pub chapter_index: u32,
    pub chapter_title: String,
    pub domains: Vec<Domain>,
    pub principles: Vec<String>,
    pub rules: Vec<String>,
    pub claims: Vec<String>,
    pub warnings: Vec<String>,
    pub cross_references: Vec<u32>,
}

impl DoctrineRecord {
    /// The domain a chunk derived from this record is filed under.
    pub fn primary_domain(&self) -> Option<Domain> {
        self.domains.first().copied()
    }
}

/// Retrieval hint attached to a chunk at ingestion time, derived from which
/// doctrine field the text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lean {
    /// Principles and rules: material that advances a course of action.
    Support,
    /// Warnings: material that opposes or cautions.
    Counter,
    /// Claims: descriptive material.
    Neutral,
}

/// Character span of a chunk inside the assembled doctrine text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

/// A deterministic slice of doctrine text, keyed by content hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub book_id: String,
    pub chapter_index: u32,
    pub domain: Domain,
    pub lean: Lean,
    pub text: String,
    pub source_span: SourceSpan,
}

/// Content-derived chunk identity: same `(book, version, text)` always
/// produces the same id.
pub fn chunk_id(book_id: &str, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(book_id.as_bytes());
    hasher.update(b":");
    hasher.update(INGEST_VERSION.as_bytes());
    hasher.update(b":");
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// A chunk plus its embedding vector, as stored in the per-domain index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

// =============================================================================
// Book metadata
// =============================================================================

/// Per-mode retrieval priority for a book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModePriority {
    #[serde(default = "default_priority")]
    pub normal: f64,
    #[serde(default = "default_priority")]
    pub war: f64,
    #[serde(default = "default_priority")]
    pub quick: f64,
}

fn default_priority() -> f64 {
    0.5
}

impl Default for ModePriority {
    fn default() -> Self {
        Self {
            normal: 0.5,
            war: 0.5,
            quick: 0.5,
        }
    }
}

/// Descriptive metadata for a book, loaded from
/// `books/metadata/<book_id>.yaml`. Unknown books get the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookMetadata {
    #[serde(default)]
    pub book_id: String,
    #[serde(default)]
    pub domains: BTreeSet<Domain>,
    #[serde(default)]
    pub tones: BTreeSet<Tone>,
    #[serde(default)]
    pub priority: ModePriority,
}

impl BookMetadata {
    pub fn unknown(book_id: impl Into<String>) -> Self {
        Self {
            book_id: book_id.into(),
            domains: BTreeSet::new(),
            tones: BTreeSet::new(),
            priority: ModePriority::default(),
        }
    }
}

// =============================================================================
// Positions, conflicts, verdicts
// =============================================================================

/// A minister's stance on the decision under counsel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stance {
    Advance,
    Delay,
    Avoid,
    Conditional,
    NeedsData,
    Abstain,
    Stop,
}

impl Stance {
    pub fn as_str(self) -> &'static str {
        match self {
            Stance::Advance => "ADVANCE",
            Stance::Delay => "DELAY",
            Stance::Avoid => "AVOID",
            Stance::Conditional => "CONDITIONAL",
            Stance::NeedsData => "NEEDS_DATA",
            Stance::Abstain => "ABSTAIN",
            Stance::Stop => "STOP",
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One minister's structured position, after post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinisterPosition {
    pub minister: MinisterId,
    pub stance: Stance,
    pub justification: String,
    /// Doctrine citations, deduplicated while preserving first-seen order.
    pub doctrine_ids: Vec<String>,
    pub unique_doctrine_count: usize,
    /// Factual violations. Only Truth may populate this.
    pub violations: Vec<String>,
    pub confidence: f64,
    pub constraints: Vec<String>,
}

/// Typed conflict between minister positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    StanceConflict,
    VetoConflict,
    FactualUncertainty,
    IrreversibilityConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEvent {
    pub kind: ConflictKind,
    pub severity: Severity,
    pub parties: Vec<MinisterId>,
    pub reason: String,
}

/// The five verdicts the tribunal may hand down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TribunalDecision {
    AllowWithConstraints,
    DelayPendingData,
    Escalate,
    Abort,
    Silence,
}

impl TribunalDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            TribunalDecision::AllowWithConstraints => "ALLOW_WITH_CONSTRAINTS",
            TribunalDecision::DelayPendingData => "DELAY_PENDING_DATA",
            TribunalDecision::Escalate => "ESCALATE",
            TribunalDecision::Abort => "ABORT",
            TribunalDecision::Silence => "SILENCE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TribunalVerdict {
    pub decision: TribunalDecision,
    pub constraints: Vec<String>,
    pub required_data: Vec<String>,
    pub reasoning: String,
}

/// Full output of one debate: positions, detected conflicts, the tribunal's
/// ruling when one was needed, and the framed final verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebateProceedings {
    pub positions: Vec<MinisterPosition>,
    pub conflicts: Vec<ConflictEvent>,
    pub tribunal_verdict: Option<TribunalVerdict>,
    pub final_verdict: String,
}

// =============================================================================
// Decision context
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stakes {
    Low,
    Medium,
    High,
    Existential,
}

impl Stakes {
    pub fn as_str(self) -> &'static str {
        match self {
            Stakes::Low => "low",
            Stakes::Medium => "medium",
            Stakes::High => "high",
            Stakes::Existential => "existential",
        }
    }
}

impl FromStr for Stakes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Stakes::Low),
            "medium" => Ok(Stakes::Medium),
            "high" => Ok(Stakes::High),
            "existential" => Ok(Stakes::Existential),
            other => Err(format!("unknown stakes: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reversibility {
    Reversible,
    PartiallyReversible,
    Irreversible,
}

impl Reversibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Reversibility::Reversible => "reversible",
            Reversibility::PartiallyReversible => "partially_reversible",
            Reversibility::Irreversible => "irreversible",
        }
    }
}

impl FromStr for Reversibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reversible" => Ok(Reversibility::Reversible),
            "partially_reversible" => Ok(Reversibility::PartiallyReversible),
            "irreversible" => Ok(Reversibility::Irreversible),
            other => Err(format!("unknown reversibility: {other}")),
        }
    }
}

/// Deliberation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Quick,
    Normal,
    War,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Quick => "quick",
            Mode::Normal => "normal",
            Mode::War => "war",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quick" => Ok(Mode::Quick),
            "normal" => Ok(Mode::Normal),
            "war" => Ok(Mode::War),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

// =============================================================================
// Ledger rows
// =============================================================================

/// One immutable decision record. Append-only: the ledger forbids UPDATE
/// on this table at the SQL layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub event_id: String,
    pub timestamp: String,
    pub domain: Domain,
    pub stakes: Stakes,
    pub emotional_load: f64,
    pub urgency: f64,
    pub mode: Mode,
    pub ministers_called: Vec<MinisterId>,
    pub verdict_summary: String,
    pub posture: String,
    pub illusions_detected: Vec<String>,
    pub contradictions_found: u32,
    pub sovereign_action: Option<String>,
    pub action_followed_counsel: Option<bool>,
    pub override_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    Success,
    Partial,
    Failure,
}

impl OutcomeResult {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeResult::Success => "success",
            OutcomeResult::Partial => "partial",
            OutcomeResult::Failure => "failure",
        }
    }
}

impl FromStr for OutcomeResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "success" => Ok(OutcomeResult::Success),
            "partial" => Ok(OutcomeResult::Partial),
            "failure" => Ok(OutcomeResult::Failure),
            other => Err(format!("unknown outcome result: {other}")),
        }
    }
}

/// Resolution of a past decision. At most one per event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub event_id: String,
    pub resolved_at: String,
    pub result: OutcomeResult,
    pub damage: f64,
    pub benefit: f64,
    pub lessons: Vec<String>,
}

/// Pattern kinds the detector can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    RepetitionLoop,
    OverrideLoop,
    EmotionalLoop,
    OutcomePattern,
    WarEscalationBias,
    WarFalseUrgencyLoop,
    WarRepeatedOverrides,
}

impl PatternKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::RepetitionLoop => "repetition_loop",
            PatternKind::OverrideLoop => "override_loop",
            PatternKind::EmotionalLoop => "emotional_loop",
            PatternKind::OutcomePattern => "outcome_pattern",
            PatternKind::WarEscalationBias => "war_escalation_bias",
            PatternKind::WarFalseUrgencyLoop => "war_false_urgency_loop",
            PatternKind::WarRepeatedOverrides => "war_repeated_overrides",
        }
    }
}

/// A derived signal over the ledger. Never authoritative; always
/// rebuildable from events + outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_id: String,
    pub kind: PatternKind,
    pub description: String,
    pub domain: Option<Domain>,
    pub frequency: u32,
    pub last_seen: String,
    pub last_outcome: Option<OutcomeResult>,
}

/// Per-minister (or "n") per-domain confidence, adjusted in bounded steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub subject: String,
    pub domain: String,
    pub confidence: f64,
    pub updated_at: String,
}

/// N's war posture, shaped by detected war patterns. All multipliers start
/// at 1.0 and move in clamped multiplicative steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarPosture {
    pub caution: f64,
    pub urgency_threshold: f64,
    pub bluntness: f64,
}

impl Default for WarPosture {
    fn default() -> Self {
        Self {
            caution: 1.0,
            urgency_threshold: 1.0,
            bluntness: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic_and_version_scoped() {
        let a = chunk_id("b1", "the text");
        let b = chunk_id("b1", "the text");
        assert_eq!(a, b);
        assert_ne!(a, chunk_id("b2", "the text"));
        assert_ne!(a, chunk_id("b1", "other text"));
    }

    #[test]
    fn every_domain_has_an_owner() {
        for domain in Domain::ALL {
            assert!(
                !domain_owners(domain).is_empty(),
                "domain {domain} has no minister"
            );
        }
    }

    #[test]
    fn veto_ministers_are_risk_truth_optionality() {
        let vetoers: Vec<_> = MinisterId::ALL
            .iter()
            .copied()
            .filter(|m| m.has_veto())
            .collect();
        assert_eq!(
            vetoers,
            vec![MinisterId::Risk, MinisterId::Optionality, MinisterId::Truth]
        );
    }

    #[test]
    fn domain_round_trips_through_serde() {
        for domain in Domain::ALL {
            let json = serde_json::to_string(&domain).unwrap();
            let back: Domain = serde_json::from_str(&json).unwrap();
            assert_eq!(domain, back);
        }
    }
}
