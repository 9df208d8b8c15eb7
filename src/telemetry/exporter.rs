use chrono::{DateTime, Utc};
use log::info;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use url::Url;

use crate::error::{CITraceError, Result};

/// Where the spans of every tracer end up.
#[derive(Debug, Clone)]
pub enum SpanSink {
    /// OTLP/HTTP traces endpoint of a collector (Jaeger, Tempo, the
    /// OpenTelemetry Collector)
    Otlp(Url),
    /// Dry run: spans are only logged
    Log,
    #[cfg(test)]
    Recording(super::testing::RecordedSpans),
}

impl SpanSink {
    /// # Errors
    ///
    /// Returns `CITraceError::TracerInit` if `endpoint` is not an http(s) URL.
    pub fn otlp(endpoint: &str) -> Result<Self> {
        let url = Url::parse(endpoint)
            .map_err(|e| CITraceError::TracerInit(format!("Invalid collector endpoint: {e}")))?;

        match url.scheme() {
            "http" | "https" => Ok(Self::Otlp(url)),
            scheme => Err(CITraceError::TracerInit(format!(
                "Unsupported collector scheme: {scheme}"
            ))),
        }
    }
}

/// Build the OTLP/HTTP exporter on a plain thread: its blocking HTTP client
/// must not be created on a runtime worker.
pub(super) fn otlp_exporter(endpoint: &Url) -> Result<opentelemetry_otlp::SpanExporter> {
    let endpoint = endpoint.to_string();

    std::thread::spawn(move || {
        opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
    })
    .join()
    .map_err(|_| CITraceError::TracerInit("OTLP exporter setup panicked".to_string()))?
    .map_err(|e| CITraceError::TracerInit(format!("Failed to create OTLP exporter: {e}")))
}

/// Logs spans instead of sending them anywhere.
#[derive(Debug)]
pub struct LogExporter {
    service: String,
}

impl LogExporter {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl SpanExporter for LogExporter {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        for span in &batch {
            let start = DateTime::<Utc>::from(span.start_time);
            let end = DateTime::<Utc>::from(span.end_time);
            info!(
                "[dry-run] {} {:?} {} -> {} ({}s)",
                self.service,
                span.name,
                start.to_rfc3339(),
                end.to_rfc3339(),
                (end - start).num_seconds()
            );
        }
        Ok(())
    }
}
