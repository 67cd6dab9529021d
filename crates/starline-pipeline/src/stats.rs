//! Per-run counters logged when a stage finishes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageStats {
    pub stage: String,
    /// Tables or artifacts looked at
    pub tables_seen: i64,
    /// Artifacts written (extract, transform) or loaded (load)
    pub artifacts_written: i64,
    /// Tables with nothing to do
    pub tables_skipped: i64,
    pub rows_processed: i64,
    pub bytes_written: i64,
    pub duration_secs: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageStats {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn inc_written(&mut self, rows: usize, bytes: i64) {
        self.tables_seen += 1;
        self.artifacts_written += 1;
        self.rows_processed += rows as i64;
        self.bytes_written += bytes;
    }

    pub fn inc_skipped(&mut self) {
        self.tables_seen += 1;
        self.tables_skipped += 1;
    }

    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
        if let (Some(start), Some(end)) = (self.started_at, self.completed_at) {
            self.duration_secs = (end - start).num_milliseconds() as f64 / 1000.0;
        }
    }

    /// Finish the run and emit the summary line
    pub fn log_summary(&mut self) {
        self.complete();
        info!(
            stage = %self.stage,
            tables = self.tables_seen,
            written = self.artifacts_written,
            skipped = self.tables_skipped,
            rows = self.rows_processed,
            bytes = self.bytes_written,
            duration_secs = self.duration_secs,
            "Stage complete"
        );
    }
}
