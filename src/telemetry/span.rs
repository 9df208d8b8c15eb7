use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::info;
use opentelemetry::trace::{Span as _, SpanContext, SpanId};
use opentelemetry_sdk::trace::Span as SdkSpan;

use super::tracer::Tracer;

pub type Tags = IndexMap<String, String>;

/// An open span. Dropping it without calling [`Span::finish`] ends it at the
/// drop time, so callers always finish explicitly.
pub struct Span<'t> {
    tracer: &'t Tracer,
    name: String,
    parent_span_id: Option<SpanId>,
    inner: SdkSpan,
}

impl<'t> Span<'t> {
    pub(super) fn new(
        tracer: &'t Tracer,
        name: String,
        parent_span_id: Option<SpanId>,
        inner: SdkSpan,
    ) -> Self {
        Self {
            tracer,
            name,
            parent_span_id,
            inner,
        }
    }

    pub fn context(&self) -> SpanContext {
        self.inner.span_context().clone()
    }

    /// Close the span at an explicit, historical finish time.
    pub fn finish(mut self, end: DateTime<Utc>) {
        let context = self.inner.span_context();
        info!(
            "Reporting span {}:{}:{}:1 {} {}",
            context.trace_id(),
            context.span_id(),
            self.parent_span_id
                .map_or_else(|| "0".to_string(), |id| id.to_string()),
            self.tracer.service(),
            self.name
        );

        self.inner.end_with_timestamp(end.into());
    }
}
