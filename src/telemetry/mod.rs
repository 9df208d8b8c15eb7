mod exporter;
mod span;
mod tracer;

pub use exporter::SpanSink;
pub use opentelemetry::trace::{SpanContext, TraceId};
pub use span::{Span, Tags};
pub use tracer::{OtelTracerFactory, Tracer, TracerFactory};
