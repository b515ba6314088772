//! Run and per-database summaries.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// What happened to one object or trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Script files were written.
    Written,
    /// The target key was already in the ledger.
    Duplicate,
    /// Not scriptable as text (CLR, extended, encrypted).
    Skipped,
    /// Scripting or writing failed.
    Failed,
}

/// Lock-free counters shared by the workers of one database.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    written: AtomicUsize,
    duplicates: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    triggers: AtomicUsize,
}

impl Counters {
    pub(crate) fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Written => &self.written,
            Outcome::Duplicate => &self.duplicates,
            Outcome::Skipped => &self.skipped,
            Outcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_trigger(&self) {
        self.triggers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, database: &str, objects_total: usize) -> DatabaseSummary {
        DatabaseSummary {
            database: database.to_string(),
            objects_total,
            triggers_total: self.triggers.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Result of exporting one database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSummary {
    pub database: String,

    /// Catalog objects enumerated (triggers excluded).
    pub objects_total: usize,

    /// Triggers found on exported tables.
    pub triggers_total: usize,

    /// Objects and triggers written to disk.
    pub written: usize,

    /// Objects and triggers whose target name was already produced.
    pub duplicates: usize,

    /// Objects that cannot be scripted as text.
    pub skipped: usize,

    /// Objects that failed to script or write.
    pub failed: usize,
}

/// Result of an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Final status: "completed", "failed" or "cancelled".
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Databases that were exported.
    pub databases: Vec<DatabaseSummary>,

    /// Requested databases absent from the server.
    pub missing_databases: Vec<String>,

    /// Databases whose export aborted, with the reason.
    pub failed_databases: Vec<(String, String)>,
}

impl ExportSummary {
    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn objects_written(&self) -> usize {
        self.databases.iter().map(|d| d.written).sum()
    }

    pub fn objects_failed(&self) -> usize {
        self.databases.iter().map(|d| d.failed).sum()
    }
}
