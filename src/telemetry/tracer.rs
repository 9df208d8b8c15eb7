use chrono::{DateTime, Utc};
use log::debug;
use opentelemetry::trace::{
    SpanContext, SpanKind, TraceContextExt as _, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::{Sampler, SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;

use super::exporter::{otlp_exporter, LogExporter, SpanSink};
use super::span::{Span, Tags};
use crate::error::{CITraceError, Result};

/// Hands out tracers scoped to a service name.
pub trait TracerFactory: Send + Sync {
    /// # Errors
    ///
    /// Returns `CITraceError::TracerInit` if a tracer cannot be built for `service`.
    fn tracer(&self, service: &str) -> Result<Tracer>;
}

/// Tracer of one service, backed by its own always-on provider.
pub struct Tracer {
    service: String,
    provider: SdkTracerProvider,
    tracer: SdkTracer,
}

impl Tracer {
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Open a span with an explicit start time. `parent` makes it a child-of
    /// that span and places it in the same trace.
    pub fn start_span(
        &self,
        name: impl Into<String>,
        parent: Option<&SpanContext>,
        start: DateTime<Utc>,
        tags: Tags,
    ) -> Span<'_> {
        let name = name.into();
        let attributes: Vec<KeyValue> = tags
            .into_iter()
            .map(|(key, value)| KeyValue::new(key, value))
            .collect();

        let parent_cx = parent.map_or_else(Context::new, |p| {
            Context::new().with_remote_span_context(p.clone())
        });

        let inner = self
            .tracer
            .span_builder(name.clone())
            .with_kind(SpanKind::Internal)
            .with_start_time(start)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &parent_cx);

        Span::new(self, name, parent.map(SpanContext::span_id), inner)
    }

    /// Flush and shut down the provider. Consumes the tracer, so it runs at
    /// most once and never while one of its spans is still open.
    ///
    /// # Errors
    ///
    /// Returns `CITraceError::Export` if the exporter fails to flush.
    pub async fn release(self) -> Result<()> {
        let Self {
            service,
            provider,
            tracer,
        } = self;
        drop(tracer);

        tokio::task::spawn_blocking(move || provider.shutdown())
            .await
            .map_err(|e| CITraceError::Export(format!("Flushing {service} failed: {e}")))?
            .map_err(|e| CITraceError::Export(format!("Flushing {service} failed: {e}")))?;

        debug!("Released tracer");
        Ok(())
    }
}

/// Builds one OpenTelemetry tracer provider per service, all exporting to the
/// same sink.
pub struct OtelTracerFactory {
    sink: SpanSink,
}

impl OtelTracerFactory {
    pub fn new(sink: SpanSink) -> Self {
        Self { sink }
    }
}

impl TracerFactory for OtelTracerFactory {
    fn tracer(&self, service: &str) -> Result<Tracer> {
        if service.trim().is_empty() {
            return Err(CITraceError::TracerInit(
                "service name must not be empty".to_string(),
            ));
        }

        let builder = SdkTracerProvider::builder()
            .with_sampler(Sampler::AlwaysOn)
            .with_resource(
                Resource::builder()
                    .with_service_name(service.to_string())
                    .build(),
            );

        let provider = match &self.sink {
            SpanSink::Otlp(endpoint) => builder.with_batch_exporter(otlp_exporter(endpoint)?),
            SpanSink::Log => builder.with_simple_exporter(LogExporter::new(service)),
            #[cfg(test)]
            SpanSink::Recording(spans) => builder.with_simple_exporter(spans.exporter(service)),
        }
        .build();

        Ok(Tracer {
            service: service.to_string(),
            tracer: provider.tracer(env!("CARGO_PKG_NAME")),
            provider,
        })
    }
}
