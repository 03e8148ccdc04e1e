//! Ingestion progress ledger and advisory metrics.
//!
//! The progress ledger is an append-only JSON-lines file recording one
//! `{chunk_id, ts}` entry per completed insert. A chunk counts as done only
//! when the vector-store insert has returned AND its entry is on disk here;
//! each append is flushed and fsync'd before the next chunk is dispatched,
//! so a crash leaves either a complete entry or no entry.
//!
//! Metrics are advisory only: they never affect correctness.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct ProgressEntry {
    chunk_id: String,
    ts: String,
}

/// Append-only record of completed chunk inserts, surviving restarts.
pub struct ProgressLedger {
    path: PathBuf,
    file: File,
    seen: HashSet<String>,
}

impl ProgressLedger {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut seen = HashSet::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                // A torn final line from a crash mid-write is skipped; the
                // chunk it described was not completed.
                if let Ok(entry) = serde_json::from_str::<ProgressEntry>(&line) {
                    seen.insert(entry.chunk_id);
                }
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file, seen })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.seen.contains(chunk_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Record one completed insert. Flush + fsync before returning.
    pub fn append(&mut self, chunk_id: &str) -> std::io::Result<()> {
        let entry = ProgressEntry {
            chunk_id: chunk_id.to_string(),
            ts: chrono::Utc::now().to_rfc3339(),
        };
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        self.file.sync_all()?;
        self.seen.insert(chunk_id.to_string());
        Ok(())
    }

    /// The completed chunk-id set, for resume equality checks.
    pub fn chunk_ids(&self) -> &HashSet<String> {
        &self.seen
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Advisory progress snapshot written to `state/ingest_metrics.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestMetrics {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub rate_per_sec: f64,
    /// None until `rate_per_sec > 0`.
    pub eta_seconds: Option<f64>,
    pub percent_complete: f64,
}

/// Tracks throughput across one ingestion run and snapshots it to disk.
pub struct MetricsTracker {
    path: PathBuf,
    started: Instant,
    total: usize,
    completed: usize,
    skipped: usize,
}

impl MetricsTracker {
    pub fn new(path: impl AsRef<Path>, total: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            started: Instant::now(),
            total,
            completed: 0,
            skipped: 0,
        }
    }

    pub fn completed(&mut self) {
        self.completed += 1;
    }

    pub fn skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn snapshot(&self) -> IngestMetrics {
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.completed as f64 / elapsed
        } else {
            0.0
        };
        let remaining = self
            .total
            .saturating_sub(self.completed)
            .saturating_sub(self.skipped);
        let eta = if rate > 0.0 {
            Some(remaining as f64 / rate)
        } else {
            None
        };
        let done = self.completed + self.skipped;
        let percent = if self.total > 0 {
            done as f64 / self.total as f64 * 100.0
        } else {
            100.0
        };

        IngestMetrics {
            total: self.total,
            completed: self.completed,
            skipped: self.skipped,
            rate_per_sec: rate,
            eta_seconds: eta,
            percent_complete: percent,
        }
    }

    /// Write the current snapshot. Best-effort: metrics never fail the run.
    pub fn write(&self) {
        let snapshot = self.snapshot();
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(&snapshot) {
            let _ = std::fs::write(&self.path, json);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_survives_reopen_and_skips_torn_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.jsonl");

        {
            let mut ledger = ProgressLedger::open(&path).unwrap();
            ledger.append("aaa").unwrap();
            ledger.append("bbb").unwrap();
        }

        // Simulate a crash mid-append: torn trailing line.
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            write!(file, "{{\"chunk_id\": \"ccc\"").unwrap();
        }

        let ledger = ProgressLedger::open(&path).unwrap();
        assert!(ledger.contains("aaa"));
        assert!(ledger.contains("bbb"));
        assert!(!ledger.contains("ccc"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn eta_is_null_until_rate_positive() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = MetricsTracker::new(dir.path().join("metrics.json"), 10);
        let snap = tracker.snapshot();
        assert_eq!(snap.completed, 0);
        assert!(snap.eta_seconds.is_none());

        let mut tracker = MetricsTracker::new(dir.path().join("metrics.json"), 10);
        tracker.completed();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let snap = tracker.snapshot();
        assert!(snap.rate_per_sec > 0.0);
        assert!(snap.eta_seconds.is_some());
    }
}
