//! Append-only decision ledger.
//!
//! SQLite-backed: three written tables (events, outcomes, overrides) and
//! two derived (patterns, calibrations). The events table is INSERT-only —
//! UPDATE and DELETE are rejected by triggers at the SQL layer, so even a
//! buggy caller cannot rewrite history. Writes are atomic per row.

pub mod calibration;
pub mod patterns;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::types::{
    DecisionEvent, Domain, Mode, Outcome, Pattern, PatternKind, Stakes, WarPosture,
};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("ledger lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    #[error("outcome already recorded for event {0}")]
    DuplicateOutcome(String),
}

const SCHEMA: &str = "
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;
PRAGMA foreign_keys=ON;

CREATE TABLE IF NOT EXISTS events (
  event_id TEXT PRIMARY KEY,
  timestamp TEXT NOT NULL,
  domain TEXT NOT NULL,
  stakes TEXT NOT NULL,
  emotional_load REAL NOT NULL,
  urgency REAL NOT NULL,
  mode TEXT NOT NULL,
  ministers_called TEXT NOT NULL,
  verdict TEXT NOT NULL,
  posture TEXT NOT NULL,
  illusions_detected TEXT NOT NULL,
  contradictions_found INTEGER NOT NULL,
  sovereign_action TEXT,
  action_followed_counsel INTEGER,
  override_reason TEXT
);

CREATE TRIGGER IF NOT EXISTS events_append_only_update
BEFORE UPDATE ON events
BEGIN
  SELECT RAISE(ABORT, 'events are append-only');
END;

CREATE TRIGGER IF NOT EXISTS events_append_only_delete
BEFORE DELETE ON events
BEGIN
  SELECT RAISE(ABORT, 'events are append-only');
END;

CREATE TABLE IF NOT EXISTS outcomes (
  event_id TEXT PRIMARY KEY REFERENCES events(event_id),
  resolved_at TEXT NOT NULL,
  result TEXT NOT NULL,
  damage REAL NOT NULL,
  benefit REAL NOT NULL,
  lessons TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS overrides (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  event_id TEXT NOT NULL REFERENCES events(event_id),
  recorded_at TEXT NOT NULL,
  sovereign_action TEXT NOT NULL,
  reason TEXT
);

CREATE TABLE IF NOT EXISTS patterns (
  pattern_id TEXT PRIMARY KEY,
  kind TEXT NOT NULL,
  description TEXT NOT NULL,
  domain TEXT,
  frequency INTEGER NOT NULL,
  last_seen TEXT NOT NULL,
  last_outcome TEXT
);

CREATE TABLE IF NOT EXISTS calibrations (
  subject TEXT NOT NULL,
  domain TEXT NOT NULL,
  confidence REAL NOT NULL,
  updated_at TEXT NOT NULL,
  PRIMARY KEY (subject, domain)
);

CREATE TABLE IF NOT EXISTS war_posture (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  caution REAL NOT NULL,
  urgency_threshold REAL NOT NULL,
  bluntness REAL NOT NULL,
  updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_domain ON events(domain);
CREATE INDEX IF NOT EXISTS idx_overrides_event ON overrides(event_id);
";

/// The ledger handle. Single writer by convention (one process, one
/// connection); readers share the same connection behind the mutex.
#[derive(Clone)]
pub struct Ledger {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl Ledger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&Connection) -> Result<R, LedgerError>,
    {
        let guard = self.conn.lock().map_err(|_| LedgerError::Poisoned)?;
        f(&guard)
    }

    async fn blocking<F, R>(&self, f: F) -> Result<R, LedgerError>
    where
        F: FnOnce(&Ledger) -> Result<R, LedgerError> + Send + 'static,
        R: Send + 'static,
    {
        let ledger = self.clone();
        tokio::task::spawn_blocking(move || f(&ledger))
            .await
            .map_err(|e| LedgerError::Join(e.to_string()))?
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Append one decision event. The row is immutable from here on.
    pub async fn insert_event(&self, event: DecisionEvent) -> Result<(), LedgerError> {
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                let ministers = serde_json::to_string(&event.ministers_called)
                    .map_err(|e| LedgerError::Serde(e.to_string()))?;
                let illusions = serde_json::to_string(&event.illusions_detected)
                    .map_err(|e| LedgerError::Serde(e.to_string()))?;
                conn.execute(
                    "INSERT INTO events (
                       event_id, timestamp, domain, stakes, emotional_load, urgency, mode,
                       ministers_called, verdict, posture, illusions_detected,
                       contradictions_found, sovereign_action, action_followed_counsel,
                       override_reason
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    params![
                        event.event_id,
                        event.timestamp,
                        event.domain.as_str(),
                        event.stakes.as_str(),
                        event.emotional_load,
                        event.urgency,
                        event.mode.as_str(),
                        ministers,
                        event.verdict_summary,
                        event.posture,
                        illusions,
                        event.contradictions_found,
                        event.sovereign_action,
                        event.action_followed_counsel.map(|b| b as i64),
                        event.override_reason,
                    ],
                )?;
                Ok(())
            })
        })
        .await
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Option<DecisionEvent>, LedgerError> {
        let event_id = event_id.to_string();
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                conn.query_row(
                    &format!("SELECT {EVENT_COLUMNS} FROM events WHERE event_id = ?1"),
                    params![event_id],
                    row_to_event,
                )
                .optional()
                .map_err(LedgerError::from)
            })
        })
        .await
    }

    /// All events in insertion order.
    pub async fn list_events(&self) -> Result<Vec<DecisionEvent>, LedgerError> {
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events ORDER BY rowid"
                ))?;
                let rows = stmt.query_map([], row_to_event)?;
                let mut events = Vec::new();
                for row in rows {
                    events.push(row?);
                }
                Ok(events)
            })
        })
        .await
    }

    // =========================================================================
    // Outcomes & overrides
    // =========================================================================

    /// Record the resolution of a decision. At most one per event; a second
    /// attempt is an error, not an update.
    pub async fn insert_outcome(&self, outcome: Outcome) -> Result<(), LedgerError> {
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                let exists: bool = conn
                    .query_row(
                        "SELECT 1 FROM events WHERE event_id = ?1",
                        params![outcome.event_id],
                        |_| Ok(true),
                    )
                    .optional()?
                    .unwrap_or(false);
                if !exists {
                    return Err(LedgerError::UnknownEvent(outcome.event_id.clone()));
                }

                let lessons = serde_json::to_string(&outcome.lessons)
                    .map_err(|e| LedgerError::Serde(e.to_string()))?;
                let inserted = conn.execute(
                    "INSERT OR IGNORE INTO outcomes
                       (event_id, resolved_at, result, damage, benefit, lessons)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        outcome.event_id,
                        outcome.resolved_at,
                        outcome.result.as_str(),
                        outcome.damage.clamp(0.0, 1.0),
                        outcome.benefit.clamp(0.0, 1.0),
                        lessons,
                    ],
                )?;
                if inserted == 0 {
                    return Err(LedgerError::DuplicateOutcome(outcome.event_id.clone()));
                }
                Ok(())
            })
        })
        .await
    }

    pub async fn list_outcomes(&self) -> Result<Vec<Outcome>, LedgerError> {
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT event_id, resolved_at, result, damage, benefit, lessons
                     FROM outcomes ORDER BY rowid",
                )?;
                let rows = stmt.query_map([], |row| {
                    let result: String = row.get(2)?;
                    let lessons: String = row.get(5)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        result,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                        lessons,
                    ))
                })?;

                let mut outcomes = Vec::new();
                for row in rows {
                    let (event_id, resolved_at, result, damage, benefit, lessons) = row?;
                    outcomes.push(Outcome {
                        event_id,
                        resolved_at,
                        result: result
                            .parse()
                            .map_err(|e: String| LedgerError::Serde(e))?,
                        damage,
                        benefit,
                        lessons: serde_json::from_str(&lessons)
                            .map_err(|e| LedgerError::Serde(e.to_string()))?,
                    });
                }
                Ok(outcomes)
            })
        })
        .await
    }

    /// Record that the sovereign went their own way. Not an error — policy,
    /// recorded as its own row.
    pub async fn record_override(
        &self,
        event_id: &str,
        sovereign_action: &str,
        reason: Option<&str>,
    ) -> Result<(), LedgerError> {
        let event_id = event_id.to_string();
        let sovereign_action = sovereign_action.to_string();
        let reason = reason.map(|r| r.to_string());
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                let exists: bool = conn
                    .query_row(
                        "SELECT 1 FROM events WHERE event_id = ?1",
                        params![event_id],
                        |_| Ok(true),
                    )
                    .optional()?
                    .unwrap_or(false);
                if !exists {
                    return Err(LedgerError::UnknownEvent(event_id.clone()));
                }
                conn.execute(
                    "INSERT INTO overrides (event_id, recorded_at, sovereign_action, reason)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        event_id,
                        chrono::Utc::now().to_rfc3339(),
                        sovereign_action,
                        reason
                    ],
                )?;
                Ok(())
            })
        })
        .await
    }

    // =========================================================================
    // Derived tables
    // =========================================================================

    /// Replace the derived pattern set. Patterns are rebuildable from
    /// events + outcomes, so a full rewrite is the honest operation.
    pub async fn replace_patterns(&self, patterns: Vec<Pattern>) -> Result<(), LedgerError> {
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                conn.execute("DELETE FROM patterns", [])?;
                let mut stmt = conn.prepare(
                    "INSERT INTO patterns
                       (pattern_id, kind, description, domain, frequency, last_seen, last_outcome)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;
                for p in &patterns {
                    stmt.execute(params![
                        p.pattern_id,
                        p.kind.as_str(),
                        p.description,
                        p.domain.map(|d| d.as_str()),
                        p.frequency,
                        p.last_seen,
                        p.last_outcome.map(|o| o.as_str()),
                    ])?;
                }
                Ok(())
            })
        })
        .await
    }

    pub async fn list_patterns(&self) -> Result<Vec<Pattern>, LedgerError> {
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT pattern_id, kind, description, domain, frequency, last_seen, last_outcome
                     FROM patterns ORDER BY pattern_id",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                })?;

                let mut patterns = Vec::new();
                for row in rows {
                    let (pattern_id, kind, description, domain, frequency, last_seen, last_outcome) =
                        row?;
                    patterns.push(Pattern {
                        pattern_id,
                        kind: parse_pattern_kind(&kind)?,
                        description,
                        domain: domain
                            .map(|d| d.parse().map_err(LedgerError::Serde))
                            .transpose()?,
                        frequency,
                        last_seen,
                        last_outcome: last_outcome
                            .map(|o| o.parse().map_err(LedgerError::Serde))
                            .transpose()?,
                    });
                }
                Ok(patterns)
            })
        })
        .await
    }

    /// Calibration for a subject/domain pair; 0.50 when never adjusted.
    pub async fn get_calibration(&self, subject: &str, domain: &str) -> Result<f64, LedgerError> {
        let subject = subject.to_string();
        let domain = domain.to_string();
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT confidence FROM calibrations WHERE subject = ?1 AND domain = ?2",
                        params![subject, domain],
                        |row| row.get(0),
                    )
                    .optional()?
                    .unwrap_or(0.5))
            })
        })
        .await
    }

    pub async fn set_calibration(
        &self,
        subject: &str,
        domain: &str,
        confidence: f64,
    ) -> Result<(), LedgerError> {
        let subject = subject.to_string();
        let domain = domain.to_string();
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO calibrations (subject, domain, confidence, updated_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(subject, domain)
                     DO UPDATE SET confidence = excluded.confidence,
                                   updated_at = excluded.updated_at",
                    params![
                        subject,
                        domain,
                        confidence.clamp(0.0, 1.0),
                        chrono::Utc::now().to_rfc3339()
                    ],
                )?;
                Ok(())
            })
        })
        .await
    }

    pub async fn get_war_posture(&self) -> Result<WarPosture, LedgerError> {
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                Ok(conn
                    .query_row(
                        "SELECT caution, urgency_threshold, bluntness FROM war_posture WHERE id = 1",
                        [],
                        |row| {
                            Ok(WarPosture {
                                caution: row.get(0)?,
                                urgency_threshold: row.get(1)?,
                                bluntness: row.get(2)?,
                            })
                        },
                    )
                    .optional()?
                    .unwrap_or_default())
            })
        })
        .await
    }

    pub async fn set_war_posture(&self, posture: WarPosture) -> Result<(), LedgerError> {
        self.blocking(move |ledger| {
            ledger.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO war_posture (id, caution, urgency_threshold, bluntness, updated_at)
                     VALUES (1, ?1, ?2, ?3, ?4)
                     ON CONFLICT(id)
                     DO UPDATE SET caution = excluded.caution,
                                   urgency_threshold = excluded.urgency_threshold,
                                   bluntness = excluded.bluntness,
                                   updated_at = excluded.updated_at",
                    params![
                        posture.caution,
                        posture.urgency_threshold,
                        posture.bluntness,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )?;
                Ok(())
            })
        })
        .await
    }
}

const EVENT_COLUMNS: &str = "event_id, timestamp, domain, stakes, emotional_load, urgency, mode, \
                             ministers_called, verdict, posture, illusions_detected, \
                             contradictions_found, sovereign_action, action_followed_counsel, \
                             override_reason";

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<DecisionEvent> {
    let domain: String = row.get(2)?;
    let stakes: String = row.get(3)?;
    let mode: String = row.get(6)?;
    let ministers: String = row.get(7)?;
    let illusions: String = row.get(10)?;

    Ok(DecisionEvent {
        event_id: row.get(0)?,
        timestamp: row.get(1)?,
        domain: domain.parse::<Domain>().unwrap_or(Domain::Strategy),
        stakes: stakes.parse::<Stakes>().unwrap_or(Stakes::Medium),
        emotional_load: row.get(4)?,
        urgency: row.get(5)?,
        mode: mode.parse::<Mode>().unwrap_or(Mode::Normal),
        ministers_called: serde_json::from_str(&ministers).unwrap_or_default(),
        verdict_summary: row.get(8)?,
        posture: row.get(9)?,
        illusions_detected: serde_json::from_str(&illusions).unwrap_or_default(),
        contradictions_found: row.get(11)?,
        sovereign_action: row.get(12)?,
        action_followed_counsel: row
            .get::<_, Option<i64>>(13)?
            .map(|v| v != 0),
        override_reason: row.get(14)?,
    })
}

fn parse_pattern_kind(raw: &str) -> Result<PatternKind, LedgerError> {
    match raw {
        "repetition_loop" => Ok(PatternKind::RepetitionLoop),
        "override_loop" => Ok(PatternKind::OverrideLoop),
        "emotional_loop" => Ok(PatternKind::EmotionalLoop),
        "outcome_pattern" => Ok(PatternKind::OutcomePattern),
        "war_escalation_bias" => Ok(PatternKind::WarEscalationBias),
        "war_false_urgency_loop" => Ok(PatternKind::WarFalseUrgencyLoop),
        "war_repeated_overrides" => Ok(PatternKind::WarRepeatedOverrides),
        other => Err(LedgerError::Serde(format!("unknown pattern kind: {other}"))),
    }
}

pub use calibration::{apply_war_patterns, recalibrate_ministers, render_learning_summary};
pub use patterns::detect_patterns;
