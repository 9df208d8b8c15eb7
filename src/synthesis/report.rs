use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one top-level trace request.
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    /// Slug the run was started for
    pub root: String,
    /// Trace all synthesized spans belong to
    pub trace_id: Option<String>,
    /// Builds that produced a span, in the order they were closed
    pub builds: Vec<TracedBuild>,
    /// Triggered builds that were reached but not traced
    pub skipped: Vec<SkippedBuild>,
    /// Total number of spans emitted
    pub spans: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TracedBuild {
    pub slug: String,
    pub url: String,
    /// Trigger hops below the root build
    pub depth: usize,
    /// Command jobs that became spans
    pub job_spans: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TracedBuild {
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedBuild {
    pub slug: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    NotFinished,
    MaxDepth,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFinished => f.write_str("not finished"),
            Self::MaxDepth => f.write_str("too deep"),
        }
    }
}
