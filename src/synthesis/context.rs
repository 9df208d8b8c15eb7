use std::collections::HashSet;

use super::report::{SkipReason, SkippedBuild, TraceReport, TracedBuild};
use crate::providers::buildkite::BuildSlug;
use crate::telemetry::TraceId;

/// State owned by a single top-level trace request and threaded by reference
/// through every recursive call. Dropped when the request returns.
#[derive(Debug, Default)]
pub struct TraversalContext {
    visited: HashSet<String>,
    depth: usize,
    trace_id: Option<TraceId>,
    builds: Vec<TracedBuild>,
    skipped: Vec<SkippedBuild>,
    spans: usize,
}

impl TraversalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, slug: &BuildSlug) -> bool {
        self.visited.contains(&slug.to_string())
    }

    /// Returns `false` if the build was already visited.
    pub fn mark_visited(&mut self, slug: &BuildSlug) -> bool {
        self.visited.insert(slug.to_string())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(super) fn descend(&mut self) {
        self.depth += 1;
    }

    pub(super) fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(super) fn record_trace(&mut self, trace_id: TraceId) {
        self.trace_id.get_or_insert(trace_id);
    }

    pub(super) fn record_span(&mut self) {
        self.spans += 1;
    }

    pub(super) fn record_build(&mut self, build: TracedBuild) {
        self.builds.push(build);
    }

    /// Each build is listed once, with the first reason it was skipped for.
    pub(super) fn record_skip(&mut self, slug: &BuildSlug, reason: SkipReason) {
        let slug = slug.to_string();
        if self.skipped.iter().any(|skipped| skipped.slug == slug) {
            return;
        }
        self.skipped.push(SkippedBuild { slug, reason });
    }

    pub fn into_report(self, root: &BuildSlug) -> TraceReport {
        TraceReport {
            root: root.to_string(),
            trace_id: self.trace_id.map(|id| id.to_string()),
            builds: self.builds,
            skipped: self.skipped,
            spans: self.spans,
        }
    }
}
