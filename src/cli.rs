use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::{Config, ExporterKind};
use crate::output::{print_summary, TraceProgress};
use crate::providers::buildkite::{ApiSource, BuildSlug, BuildkiteClient, BuildkiteFetcher};
use crate::synthesis::{TraceReport, TraceTreeBuilder, TracerScope};
use crate::telemetry::{OtelTracerFactory, SpanSink};

#[derive(Parser)]
#[command(name = "citrace")]
#[command(author, version, about = "Retroactive distributed tracing for CI builds", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write the JSON trace report to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a trace for a finished Buildkite build and its triggered builds
    Buildkite {
        /// Build to trace, as organization/pipeline/number
        #[arg(short, long)]
        slug: BuildSlug,

        #[arg(short, long, env = "BUILDKITE_TOKEN", hide_env_values = true)]
        token: Option<String>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum)]
        source: Option<ApiSource>,

        /// OTLP/HTTP traces endpoint
        #[arg(short, long)]
        endpoint: Option<String>,

        #[arg(long, value_enum)]
        scope: Option<TracerScope>,

        #[arg(long)]
        max_depth: Option<usize>,

        /// Log spans instead of sending them to the collector
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

/// Effective settings for one run: config file values with flags on top.
#[derive(Debug)]
struct Settings {
    token: Option<String>,
    graphql_url: String,
    rest_url: String,
    jobs_per_build: usize,
    source: ApiSource,
    endpoint: String,
    exporter: ExporterKind,
    scope: TracerScope,
    max_depth: usize,
}

impl Settings {
    fn resolve(config: Config, command: &Commands) -> Self {
        let Commands::Buildkite {
            token,
            source,
            endpoint,
            scope,
            max_depth,
            dry_run,
            ..
        } = command;

        Self {
            token: token.clone().or(config.buildkite.token),
            graphql_url: config.buildkite.graphql_url,
            rest_url: config.buildkite.rest_url,
            jobs_per_build: config.buildkite.jobs_per_build,
            source: source.unwrap_or(config.buildkite.source),
            endpoint: endpoint.clone().unwrap_or(config.tracing.endpoint),
            exporter: if *dry_run {
                ExporterKind::Log
            } else {
                config.tracing.exporter
            },
            scope: scope.unwrap_or(config.tracing.scope),
            max_depth: max_depth.unwrap_or(config.tracing.max_depth),
        }
    }

    fn span_sink(&self) -> Result<SpanSink> {
        Ok(match self.exporter {
            ExporterKind::Otlp => SpanSink::otlp(&self.endpoint)?,
            ExporterKind::Log => SpanSink::Log,
        })
    }
}

impl Cli {
    async fn execute_buildkite(&self, slug: &BuildSlug, settings: Settings) -> Result<()> {
        info!("Tracing Buildkite build: {slug}");

        let token = settings.token.as_deref().map(Token::from);
        let client = BuildkiteClient::new(&settings.graphql_url, &settings.rest_url, token)?
            .with_jobs_per_build(settings.jobs_per_build);
        let fetcher = BuildkiteFetcher::new(client, settings.source);

        let sink = settings.span_sink()?;
        if let SpanSink::Otlp(endpoint) = &sink {
            info!("Exporting spans to {endpoint}");
        }
        let tracers = OtelTracerFactory::new(sink);

        let builder = TraceTreeBuilder::new(&fetcher, &tracers)
            .with_scope(settings.scope)
            .with_max_depth(settings.max_depth);

        let progress = TraceProgress::start(&slug.to_string());
        let report = match builder.trace(slug).await {
            Ok(report) => {
                progress.finish(report.spans);
                report
            }
            Err(e) => {
                progress.abandon();
                return Err(e.into());
            }
        };

        print_summary(&report);
        self.write_report(&report)?;

        Ok(())
    }

    fn write_report(&self, report: &TraceReport) -> Result<()> {
        let Some(output_path) = &self.output else {
            return Ok(());
        };

        let json_output = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };

        std::fs::write(output_path, json_output)?;
        info!("Trace report written to: {}", output_path.display());

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let Commands::Buildkite { slug, config, .. } = &self.command;
        let config = Config::load(config.as_deref())?;
        let settings = Settings::resolve(config, &self.command);
        self.execute_buildkite(slug, settings).await
    }
}
