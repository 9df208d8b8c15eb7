use futures::future::{BoxFuture, FutureExt};
use log::{debug, info, warn};

use super::context::TraversalContext;
use super::report::{SkipReason, TraceReport, TracedBuild};
use super::TracerScope;
use crate::error::{CITraceError, Result};
use crate::providers::buildkite::types::{Build, CommandJob, Job};
use crate::providers::buildkite::{BuildFetcher, BuildSlug};
use crate::telemetry::{SpanContext, Tags, Tracer, TracerFactory};

pub const DEFAULT_MAX_DEPTH: usize = 32;

/// What a single `trace_build` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Traced,
    AlreadyVisited,
    NotReady,
    TooDeep,
}

/// Synthesizes a span tree for a finished build and every build it triggered,
/// using the historical timestamps of the build records.
pub struct TraceTreeBuilder<'a> {
    fetcher: &'a dyn BuildFetcher,
    tracers: &'a dyn TracerFactory,
    scope: TracerScope,
    max_depth: usize,
}

impl<'a> TraceTreeBuilder<'a> {
    pub fn new(fetcher: &'a dyn BuildFetcher, tracers: &'a dyn TracerFactory) -> Self {
        Self {
            fetcher,
            tracers,
            scope: TracerScope::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub fn with_scope(mut self, scope: TracerScope) -> Self {
        self.scope = scope;
        self
    }

    /// Maximum number of trigger hops followed below the root build.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Trace `slug` and everything it triggered.
    ///
    /// # Errors
    ///
    /// Returns `CITraceError::NotReady` if the root build has not finished, and
    /// propagates any fetch, decode or tracer error from anywhere in the tree.
    pub async fn trace(&self, slug: &BuildSlug) -> Result<TraceReport> {
        let mut ctx = TraversalContext::new();

        match self.trace_build(slug.clone(), None, &mut ctx).await? {
            Visit::NotReady => Err(CITraceError::NotReady(slug.to_string())),
            _ => Ok(ctx.into_report(slug)),
        }
    }

    /// Trace one build under `parent`. A build already in `ctx` is a no-op.
    pub fn trace_build<'s>(
        &'s self,
        slug: BuildSlug,
        parent: Option<SpanContext>,
        ctx: &'s mut TraversalContext,
    ) -> BoxFuture<'s, Result<Visit>> {
        async move {
            if ctx.is_visited(&slug) {
                debug!("Build {slug} already traced, skipping");
                return Ok(Visit::AlreadyVisited);
            }

            if ctx.depth() > self.max_depth {
                warn!(
                    "Not tracing {slug}, trigger chain deeper than {} builds",
                    self.max_depth
                );
                ctx.record_skip(&slug, SkipReason::MaxDepth);
                return Ok(Visit::TooDeep);
            }

            ctx.mark_visited(&slug);

            info!("Fetching jobs for {slug}");
            let build = self.fetcher.fetch(&slug).await?;

            let Some(finished) = build.finished_at else {
                info!("Not tracing {slug}, build not finished");
                ctx.record_skip(&slug, SkipReason::NotFinished);
                return Ok(Visit::NotReady);
            };
            let started = build.span_start().unwrap_or(finished);

            let tracer = self.tracers.tracer(&slug.pipeline_slug())?;

            let tags = Tags::from([
                ("URL".to_string(), build.url.clone()),
                ("build.slug".to_string(), slug.to_string()),
                ("build.uuid".to_string(), build.uuid.clone()),
            ]);
            let build_span = tracer.start_span(
                format!("Build {}", build.uuid),
                parent.as_ref(),
                started,
                tags,
            );
            let build_ctx = build_span.context();
            ctx.record_trace(build_ctx.trace_id());

            let mut job_spans = 0;
            for job in &build.jobs {
                let command = match job {
                    Job::Wait(_) => {
                        info!("Found a wait, moving to next group");
                        continue;
                    }
                    Job::Command(command) => command,
                };

                let traced = match self.scope {
                    TracerScope::Pipeline => {
                        self.trace_command(&build, command, &tracer, &build_ctx, ctx)
                            .await?
                    }
                    TracerScope::JobLabel => {
                        let job_tracer = self.tracers.tracer(command.display_name())?;
                        let traced = self
                            .trace_command(&build, command, &job_tracer, &build_ctx, ctx)
                            .await?;
                        release(job_tracer).await;
                        traced
                    }
                };

                if traced {
                    job_spans += 1;
                }
            }

            build_span.finish(finished);
            ctx.record_span();
            release(tracer).await;

            ctx.record_build(TracedBuild {
                slug: slug.to_string(),
                url: build.url.clone(),
                depth: ctx.depth(),
                job_spans,
                started_at: started,
                finished_at: finished,
            });

            Ok(Visit::Traced)
        }
        .boxed()
    }

    /// Emit the span of one command job, nesting its triggered build inside
    /// it. Returns whether a span was emitted.
    async fn trace_command(
        &self,
        build: &Build,
        command: &CommandJob,
        tracer: &Tracer,
        parent: &SpanContext,
        ctx: &mut TraversalContext,
    ) -> Result<bool> {
        let (Some(started), Some(finished)) = (command.started_at, command.finished_at) else {
            warn!(
                "Job {} in {} has no start or finish time, skipping",
                command.display_name(),
                build.slug
            );
            return Ok(false);
        };

        let name = match self.scope {
            TracerScope::Pipeline => command.display_name().to_string(),
            TracerScope::JobLabel => "Execute".to_string(),
        };
        let tags = Tags::from([
            ("UUID".to_string(), command.uuid.clone()),
            ("command".to_string(), command.command.clone()),
            ("state".to_string(), command.state.to_string()),
            ("URL".to_string(), build.url.clone()),
        ]);

        let span = tracer.start_span(name, Some(parent), started, tags);

        if let Some(child) = &command.triggered {
            ctx.descend();
            let visit = self
                .trace_build(child.clone(), Some(span.context()), ctx)
                .await;
            ctx.ascend();

            if visit? == Visit::NotReady {
                info!("Skipping triggered build {child}, not finished yet");
            }
        }

        span.finish(finished);
        ctx.record_span();

        Ok(true)
    }
}

async fn release(tracer: Tracer) {
    let service = tracer.service().to_string();
    match tracer.release().await {
        Ok(()) => debug!("Flushed spans for {service}"),
        Err(e) => warn!("Failed to flush spans for {service}: {e}"),
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use mockito::Matcher;
    use opentelemetry_sdk::trace::SpanData;
    use serde_json::json;

    use super::*;
    use crate::auth::Token;
    use crate::providers::buildkite::types::{JobState, WaitJob};
    use crate::providers::buildkite::{ApiSource, BuildkiteClient, BuildkiteFetcher};
    use crate::synthesis::SkippedBuild;
    use crate::telemetry::testing::{attribute, parent_of, RecordedSpans};
    use crate::telemetry::{OtelTracerFactory, SpanSink};

    #[derive(Default)]
    struct StaticFetcher {
        builds: HashMap<String, Build>,
        fetched: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        fn with(mut self, build: Build) -> Self {
            self.builds.insert(build.slug.to_string(), build);
            self
        }

        fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BuildFetcher for StaticFetcher {
        async fn fetch(&self, slug: &BuildSlug) -> Result<Build> {
            self.fetched.lock().unwrap().push(slug.to_string());
            self.builds
                .get(&slug.to_string())
                .cloned()
                .ok_or_else(|| CITraceError::BuildNotFound(slug.to_string()))
        }
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn build(slug: &str, scheduled: u32, finished: Option<u32>, jobs: Vec<Job>) -> Build {
        let slug = BuildSlug::parse(slug).unwrap();
        Build {
            uuid: format!("uuid-{}", slug.number),
            url: format!(
                "https://buildkite.com/{}/{}/builds/{}",
                slug.organization, slug.pipeline, slug.number
            ),
            slug,
            created_at: Some(at(scheduled)),
            scheduled_at: Some(at(scheduled)),
            started_at: Some(at(scheduled)),
            finished_at: finished.map(at),
            jobs,
        }
    }

    fn command(uuid: &str, started: u32, finished: u32, triggered: Option<&str>) -> Job {
        Job::Command(CommandJob {
            uuid: uuid.to_string(),
            label: format!("job {uuid}"),
            state: JobState::Passed,
            command: "make".to_string(),
            created_at: Some(at(started)),
            runnable_at: None,
            started_at: Some(at(started)),
            finished_at: Some(at(finished)),
            triggered: triggered.map(|s| BuildSlug::parse(s).unwrap()),
        })
    }

    fn wait() -> Job {
        Job::Wait(WaitJob {
            uuid: "wait".to_string(),
            state: JobState::Passed,
        })
    }

    fn recording() -> (RecordedSpans, OtelTracerFactory) {
        let recorded = RecordedSpans::default();
        let factory = OtelTracerFactory::new(SpanSink::Recording(recorded.clone()));
        (recorded, factory)
    }

    fn span_named<'s>(spans: &'s [(String, SpanData)], name: &str) -> &'s (String, SpanData) {
        spans
            .iter()
            .find(|(_, span)| span.name == name)
            .unwrap_or_else(|| panic!("no span named {name}"))
    }

    fn names(spans: &[(String, SpanData)]) -> Vec<&str> {
        spans.iter().map(|(_, span)| &*span.name).collect()
    }

    fn times(span: &SpanData) -> (DateTime<Utc>, DateTime<Utc>) {
        (span.start_time.into(), span.end_time.into())
    }

    fn slug(s: &str) -> BuildSlug {
        BuildSlug::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_wait_and_command_yield_one_child_span() {
        let fetcher = StaticFetcher::default().with(build(
            "acme/app/1",
            0,
            Some(30),
            vec![wait(), command("c1", 5, 20, None)],
        ));
        let (recorded, factory) = recording();

        let report = TraceTreeBuilder::new(&fetcher, &factory)
            .trace(&slug("acme/app/1"))
            .await
            .unwrap();

        let spans = recorded.spans();
        assert_eq!(spans.len(), 2);

        let (service, root) = span_named(&spans, "Build uuid-1");
        assert_eq!(service, "acme/app");
        assert_eq!(parent_of(root), None);
        assert_eq!(times(root), (at(0), at(30)));
        assert_eq!(
            attribute(root, "URL").as_deref(),
            Some("https://buildkite.com/acme/app/builds/1")
        );

        let (_, job) = span_named(&spans, "job c1");
        assert_eq!(parent_of(job), Some(root.span_context.span_id()));
        assert_eq!(job.span_context.trace_id(), root.span_context.trace_id());
        assert_eq!(times(job), (at(5), at(20)));
        assert_eq!(attribute(job, "UUID").as_deref(), Some("c1"));
        assert_eq!(attribute(job, "command").as_deref(), Some("make"));
        assert_eq!(attribute(job, "state").as_deref(), Some("PASSED"));

        assert_eq!(report.spans, 2);
        assert_eq!(report.builds.len(), 1);
        assert_eq!(report.builds[0].job_spans, 1);
        assert_eq!(
            report.trace_id,
            Some(root.span_context.trace_id().to_string())
        );
    }

    #[tokio::test]
    async fn test_triggered_build_nests_under_its_job() {
        let fetcher = StaticFetcher::default()
            .with(build(
                "acme/app/1",
                0,
                Some(50),
                vec![command("c1", 5, 40, Some("acme/deploy/2"))],
            ))
            .with(build(
                "acme/deploy/2",
                10,
                Some(35),
                vec![command("c2", 12, 30, None)],
            ));
        let (recorded, factory) = recording();

        let report = TraceTreeBuilder::new(&fetcher, &factory)
            .trace(&slug("acme/app/1"))
            .await
            .unwrap();

        let spans = recorded.spans();
        // Stack discipline: innermost spans close first
        assert_eq!(
            names(&spans),
            ["job c2", "Build uuid-2", "job c1", "Build uuid-1"]
        );

        let (_, b1) = span_named(&spans, "Build uuid-1");
        let (_, c1) = span_named(&spans, "job c1");
        let (b2_service, b2) = span_named(&spans, "Build uuid-2");
        let (_, c2) = span_named(&spans, "job c2");

        assert_eq!(parent_of(c1), Some(b1.span_context.span_id()));
        assert_eq!(parent_of(b2), Some(c1.span_context.span_id()));
        assert_eq!(parent_of(c2), Some(b2.span_context.span_id()));
        assert_eq!(b2_service, "acme/deploy");
        assert!(spans
            .iter()
            .all(|(_, s)| s.span_context.trace_id() == b1.span_context.trace_id()));
        assert_eq!(times(b2), (at(10), at(35)));

        assert_eq!(report.spans, 4);
        let depths: Vec<_> = report.builds.iter().map(|b| (b.slug.as_str(), b.depth)).collect();
        assert_eq!(depths, [("acme/deploy/2", 1), ("acme/app/1", 0)]);
    }

    #[tokio::test]
    async fn test_self_triggering_build_terminates() {
        let fetcher = StaticFetcher::default().with(build(
            "acme/app/1",
            0,
            Some(30),
            vec![command("c1", 5, 20, Some("acme/app/1"))],
        ));
        let (recorded, factory) = recording();

        let report = TraceTreeBuilder::new(&fetcher, &factory)
            .trace(&slug("acme/app/1"))
            .await
            .unwrap();

        assert_eq!(fetcher.fetched(), ["acme/app/1"]);
        assert_eq!(recorded.spans().len(), 2);
        assert_eq!(report.builds.len(), 1);
    }

    #[tokio::test]
    async fn test_indirect_trigger_cycle_terminates() {
        let fetcher = StaticFetcher::default()
            .with(build(
                "acme/app/1",
                0,
                Some(50),
                vec![command("c1", 5, 40, Some("acme/other/2"))],
            ))
            .with(build(
                "acme/other/2",
                10,
                Some(35),
                vec![command("c2", 12, 30, Some("acme/app/1"))],
            ));
        let (recorded, factory) = recording();

        let report = TraceTreeBuilder::new(&fetcher, &factory)
            .trace(&slug("acme/app/1"))
            .await
            .unwrap();

        assert_eq!(fetcher.fetched(), ["acme/app/1", "acme/other/2"]);
        assert_eq!(recorded.spans().len(), 4);
        assert_eq!(report.builds.len(), 2);
    }

    #[tokio::test]
    async fn test_second_visit_with_same_context_is_noop() {
        let fetcher = StaticFetcher::default().with(build(
            "acme/app/1",
            0,
            Some(30),
            vec![command("c1", 5, 20, None)],
        ));
        let (recorded, factory) = recording();
        let builder = TraceTreeBuilder::new(&fetcher, &factory);
        let mut ctx = TraversalContext::new();

        let first = builder
            .trace_build(slug("acme/app/1"), None, &mut ctx)
            .await
            .unwrap();
        let second = builder
            .trace_build(slug("acme/app/1"), None, &mut ctx)
            .await
            .unwrap();

        assert_eq!(first, Visit::Traced);
        assert_eq!(second, Visit::AlreadyVisited);
        assert_eq!(fetcher.fetched().len(), 1);
        assert_eq!(recorded.spans().len(), 2);
    }

    #[tokio::test]
    async fn test_unfinished_root_opens_no_span() {
        let fetcher = StaticFetcher::default().with(build(
            "acme/app/1",
            0,
            None,
            vec![command("c1", 5, 20, None)],
        ));
        let (recorded, factory) = recording();

        let err = TraceTreeBuilder::new(&fetcher, &factory)
            .trace(&slug("acme/app/1"))
            .await
            .unwrap_err();

        assert!(matches!(err, CITraceError::NotReady(ref s) if s == "acme/app/1"));
        assert!(recorded.spans().is_empty());
    }

    #[tokio::test]
    async fn test_unfinished_triggered_build_is_skipped() {
        let fetcher = StaticFetcher::default()
            .with(build(
                "acme/app/1",
                0,
                Some(50),
                vec![
                    command("c1", 5, 40, Some("acme/deploy/2")),
                    command("c3", 41, 45, None),
                ],
            ))
            .with(build(
                "acme/deploy/2",
                10,
                None,
                vec![command("c2", 12, 30, None)],
            ));
        let (recorded, factory) = recording();

        let report = TraceTreeBuilder::new(&fetcher, &factory)
            .trace(&slug("acme/app/1"))
            .await
            .unwrap();

        let spans = recorded.spans();
        assert_eq!(names(&spans), ["job c1", "job c3", "Build uuid-1"]);
        assert_eq!(report.skipped.len(), 1);
        let SkippedBuild { slug, reason } = &report.skipped[0];
        assert_eq!(slug, "acme/deploy/2");
        assert_eq!(*reason, SkipReason::NotFinished);
    }

    #[tokio::test]
    async fn test_job_label_scope_uses_tracer_per_job() {
        let fetcher = StaticFetcher::default().with(build(
            "acme/app/1",
            0,
            Some(30),
            vec![command("c1", 5, 10, None), wait(), command("c2", 11, 20, None)],
        ));
        let (recorded, factory) = recording();

        TraceTreeBuilder::new(&fetcher, &factory)
            .with_scope(TracerScope::JobLabel)
            .trace(&slug("acme/app/1"))
            .await
            .unwrap();

        let spans = recorded.spans();
        let services: Vec<_> = spans
            .iter()
            .map(|(service, s)| (service.as_str(), &*s.name))
            .collect();
        assert_eq!(
            services,
            [
                ("job c1", "Execute"),
                ("job c2", "Execute"),
                ("acme/app", "Build uuid-1"),
            ]
        );
        let (_, root) = span_named(&spans, "Build uuid-1");
        assert!(spans[..2]
            .iter()
            .all(|(_, s)| parent_of(s) == Some(root.span_context.span_id())));
    }

    #[tokio::test]
    async fn test_max_depth_cuts_off_trigger_chain() {
        let fetcher = StaticFetcher::default()
            .with(build(
                "acme/a/1",
                0,
                Some(50),
                vec![command("c1", 1, 49, Some("acme/b/1"))],
            ))
            .with(build(
                "acme/b/1",
                2,
                Some(48),
                vec![command("c2", 3, 47, Some("acme/c/1"))],
            ))
            .with(build("acme/c/1", 4, Some(46), vec![]));
        let (recorded, factory) = recording();

        let report = TraceTreeBuilder::new(&fetcher, &factory)
            .with_max_depth(1)
            .trace(&slug("acme/a/1"))
            .await
            .unwrap();

        assert_eq!(fetcher.fetched(), ["acme/a/1", "acme/b/1"]);
        assert_eq!(report.builds.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].reason, SkipReason::MaxDepth);
        assert_eq!(recorded.spans().len(), 4);
    }

    #[tokio::test]
    async fn test_build_cut_off_on_two_paths_is_skipped_once() {
        let fetcher = StaticFetcher::default()
            .with(build(
                "acme/a/1",
                0,
                Some(50),
                vec![
                    command("c1", 1, 20, Some("acme/b/1")),
                    command("c2", 21, 40, Some("acme/b/2")),
                ],
            ))
            .with(build(
                "acme/b/1",
                2,
                Some(19),
                vec![command("c3", 3, 18, Some("acme/c/1"))],
            ))
            .with(build(
                "acme/b/2",
                22,
                Some(39),
                vec![command("c4", 23, 38, Some("acme/c/1"))],
            ))
            .with(build("acme/c/1", 4, Some(17), vec![]));
        let (_recorded, factory) = recording();

        let report = TraceTreeBuilder::new(&fetcher, &factory)
            .with_max_depth(1)
            .trace(&slug("acme/a/1"))
            .await
            .unwrap();

        assert_eq!(report.builds.len(), 3);
        let skipped: Vec<_> = report
            .skipped
            .iter()
            .map(|s| (s.slug.as_str(), s.reason))
            .collect();
        assert_eq!(skipped, [("acme/c/1", SkipReason::MaxDepth)]);
    }

    #[tokio::test]
    async fn test_fetch_error_in_triggered_build_aborts_run() {
        let fetcher = StaticFetcher::default().with(build(
            "acme/app/1",
            0,
            Some(30),
            vec![command("c1", 5, 20, Some("acme/gone/9"))],
        ));
        let (_recorded, factory) = recording();

        let err = TraceTreeBuilder::new(&fetcher, &factory)
            .trace(&slug("acme/app/1"))
            .await
            .unwrap_err();

        assert!(matches!(err, CITraceError::BuildNotFound(ref s) if s == "acme/gone/9"));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_job_without_timestamps_is_not_traced() {
        let mut unstarted = command("c1", 5, 20, Some("acme/deploy/2"));
        if let Job::Command(job) = &mut unstarted {
            job.started_at = None;
        }
        let fetcher = StaticFetcher::default().with(build(
            "acme/app/1",
            0,
            Some(30),
            vec![unstarted, command("c2", 21, 25, None)],
        ));
        let (recorded, factory) = recording();

        let report = TraceTreeBuilder::new(&fetcher, &factory)
            .trace(&slug("acme/app/1"))
            .await
            .unwrap();

        assert_eq!(fetcher.fetched(), ["acme/app/1"]);
        assert_eq!(report.builds[0].job_spans, 1);
        assert_eq!(recorded.spans().len(), 2);
    }

    fn client_for(server: &mockito::Server) -> BuildkiteClient {
        BuildkiteClient::new(
            &format!("{}/v1", server.url()),
            &format!("{}/v2/", server.url()),
            Some(Token::from("bk-secret")),
        )
        .unwrap()
    }

    /// Trace the root build through the Buildkite client and return the
    /// spans of the upstream trigger job and the downstream build.
    async fn trace_through(
        server: &mockito::Server,
        source: ApiSource,
    ) -> (TraceReport, SpanData, SpanData) {
        let fetcher = BuildkiteFetcher::new(client_for(server), source);
        let (recorded, factory) = recording();

        let report = TraceTreeBuilder::new(&fetcher, &factory)
            .trace(&slug("acme/app/1"))
            .await
            .unwrap();

        let spans = recorded.spans();
        let (_, trigger) = span_named(&spans, "Deploy");
        let (service, downstream) = span_named(&spans, "Build b-2");
        assert_eq!(service, "acme/deploy");
        (report, trigger.clone(), downstream.clone())
    }

    #[tokio::test]
    async fn test_graphql_trigger_job_parents_downstream_build() {
        let mut server = mockito::Server::new_async().await;
        let upstream = json!({ "data": { "build": {
            "uuid": "b-1",
            "url": "https://buildkite.com/acme/app/builds/1",
            "scheduledAt": "2024-03-01T12:00:00Z",
            "finishedAt": "2024-03-01T12:50:00Z",
            "jobs": { "edges": [
                { "node": {
                    "__typename": "JobTypeTrigger",
                    "uuid": "t1",
                    "label": "Deploy",
                    "state": "PASSED",
                    "runnableAt": "2024-03-01T12:05:00Z",
                    "finishedAt": "2024-03-01T12:40:00Z",
                    "triggered": { "url": "https://buildkite.com/acme/deploy/builds/2" }
                } },
                { "node": {
                    "__typename": "JobTypeCommand",
                    "uuid": "c0",
                    "label": "Build",
                    "command": "make",
                    "state": "PASSED",
                    "startedAt": "2024-03-01T12:01:00Z",
                    "finishedAt": "2024-03-01T12:04:00Z"
                } }
            ] }
        } } });
        let downstream = json!({ "data": { "build": {
            "uuid": "b-2",
            "url": "https://buildkite.com/acme/deploy/builds/2",
            "createdAt": "2024-03-01T12:06:00Z",
            "finishedAt": "2024-03-01T12:35:00Z",
            "jobs": { "edges": [
                { "node": {
                    "__typename": "JobTypeCommand",
                    "uuid": "c2",
                    "label": "Ship",
                    "command": "./ship",
                    "state": "PASSED",
                    "startedAt": "2024-03-01T12:10:00Z",
                    "finishedAt": "2024-03-01T12:30:00Z"
                } }
            ] }
        } } });

        for (slug, body) in [("acme/app/1", upstream), ("acme/deploy/2", downstream)] {
            server
                .mock("POST", "/v1")
                .match_body(Matcher::PartialJson(json!({ "variables": { "slug": slug } })))
                .with_status(200)
                .with_body(body.to_string())
                .create_async()
                .await;
        }

        let (report, trigger, downstream) = trace_through(&server, ApiSource::GraphQl).await;

        assert_eq!(parent_of(&downstream), Some(trigger.span_context.span_id()));
        assert_eq!(
            downstream.span_context.trace_id(),
            trigger.span_context.trace_id()
        );
        assert_eq!(
            times(&trigger).0,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap()
        );
        assert_eq!(report.spans, 5);
        assert_eq!(report.builds.len(), 2);
    }

    #[tokio::test]
    async fn test_rest_trigger_job_parents_downstream_build() {
        let mut server = mockito::Server::new_async().await;
        let upstream = json!({
            "id": "b-1",
            "web_url": "https://buildkite.com/acme/app/builds/1",
            "scheduled_at": "2024-03-01T12:00:00Z",
            "finished_at": "2024-03-01T12:50:00Z",
            "jobs": [
                {
                    "id": "t1",
                    "type": "trigger",
                    "name": "Deploy",
                    "state": "passed",
                    "started_at": "2024-03-01T12:05:00Z",
                    "finished_at": "2024-03-01T12:40:00Z",
                    "triggered_build": {
                        "id": "b-2",
                        "number": 2,
                        "url": "https://api.buildkite.com/v2/organizations/acme/pipelines/deploy/builds/2",
                        "web_url": "https://buildkite.com/acme/deploy/builds/2"
                    }
                }
            ]
        });
        let downstream = json!({
            "id": "b-2",
            "web_url": "https://buildkite.com/acme/deploy/builds/2",
            "created_at": "2024-03-01T12:06:00Z",
            "finished_at": "2024-03-01T12:35:00Z",
            "jobs": [
                {
                    "id": "c2",
                    "type": "script",
                    "name": "Ship",
                    "command": "./ship",
                    "state": "passed",
                    "started_at": "2024-03-01T12:10:00Z",
                    "finished_at": "2024-03-01T12:30:00Z"
                }
            ]
        });

        for (path, body) in [
            ("/v2/organizations/acme/pipelines/app/builds/1", upstream),
            ("/v2/organizations/acme/pipelines/deploy/builds/2", downstream),
        ] {
            server
                .mock("GET", path)
                .with_status(200)
                .with_body(body.to_string())
                .create_async()
                .await;
        }

        let (report, trigger, downstream) = trace_through(&server, ApiSource::Rest).await;

        assert_eq!(parent_of(&downstream), Some(trigger.span_context.span_id()));
        assert_eq!(report.spans, 4);
        let depths: Vec<_> = report.builds.iter().map(|b| (b.slug.as_str(), b.depth)).collect();
        assert_eq!(depths, [("acme/deploy/2", 1), ("acme/app/1", 0)]);
    }
}
