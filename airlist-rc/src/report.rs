//! Per-day activity log and summary rendering
//!
//! Accumulates the day's successful additions and terminal failures,
//! and renders them into the plain-text summary handed to the notifier
//! on daily rollover and window exit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// A track successfully added to the target collection
#[derive(Debug, Clone, Serialize)]
pub struct AddedRecord {
    pub at: DateTime<Utc>,
    /// Title and artist as broadcast
    pub title: String,
    pub artist: String,
    /// Title/artist line as known to the catalog, when available
    pub catalog_title: Option<String>,
    pub catalog_id: String,
}

/// A lookup or insert that terminally failed
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub at: DateTime<Utc>,
    pub title: String,
    pub artist: String,
    pub reason: String,
}

/// One day's worth of reconciliation activity
pub struct DailyLog {
    date: NaiveDate,
    added: Vec<AddedRecord>,
    failures: Vec<FailureRecord>,
}

impl DailyLog {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            added: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record_added(&mut self, record: AddedRecord) {
        self.added.push(record);
    }

    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failures.push(record);
    }

    pub fn added_count(&self) -> usize {
        self.added.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Most recent additions, newest last, capped at `limit`
    pub fn recent_added(&self, limit: usize) -> Vec<AddedRecord> {
        let start = self.added.len().saturating_sub(limit);
        self.added[start..].to_vec()
    }

    /// Most recent terminal failures, newest last, capped at `limit`
    pub fn recent_failures(&self, limit: usize) -> Vec<FailureRecord> {
        let start = self.failures.len().saturating_sub(limit);
        self.failures[start..].to_vec()
    }

    /// Render the full daily summary as plain text
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Daily summary for {}\n", self.date));

        if self.added.is_empty() && self.failures.is_empty() {
            out.push_str("No tracks processed or failed today.\n");
            return out;
        }

        if self.added.is_empty() {
            out.push_str("No tracks were added today.\n");
        } else {
            out.push_str(&format!("Added {} track(s):\n", self.added.len()));
            for record in &self.added {
                let catalog_note = record
                    .catalog_title
                    .as_deref()
                    .map(|t| format!(" as '{}'", t))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "  - {} '{}' by '{}'{} ({})\n",
                    record.at.format("%H:%M:%S"),
                    record.title,
                    record.artist,
                    catalog_note,
                    record.catalog_id,
                ));
            }
        }

        if self.failures.is_empty() {
            out.push_str("No unresolved failures recorded today.\n");
        } else {
            out.push_str(&format!("Failed to resolve {} track(s):\n", self.failures.len()));
            for record in &self.failures {
                out.push_str(&format!(
                    "  - {} '{}' by '{}': {}\n",
                    record.at.format("%H:%M:%S"),
                    record.title,
                    record.artist,
                    record.reason,
                ));
            }
        }

        out
    }

    /// Short end-of-session line for window exits
    pub fn render_session(&self) -> String {
        format!(
            "Session ended: {} added, {} failed so far on {}",
            self.added.len(),
            self.failures.len(),
            self.date,
        )
    }

    /// Clear the accumulators for a new day
    pub fn roll_over(&mut self, date: NaiveDate) {
        self.date = date;
        self.added.clear();
        self.failures.clear();
    }
}
