//! Telemetry setup for OpenTelemetry integration
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name (default: metarepo)
//!
//! ```text
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 \
//! OTEL_SERVICE_NAME=metarepo-dev \
//!     ./metarepo
//! ```

use anyhow::Result;

/// OpenTelemetry layer, present only when an OTLP endpoint is configured
#[cfg(feature = "telemetry")]
pub fn layer<S>(
) -> Result<Option<tracing_opentelemetry::OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>>>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;

    let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return Ok(None);
    };
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "metarepo".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(Some(tracing_opentelemetry::layer().with_tracer(tracer)))
}

/// Without the `telemetry` feature an endpoint is ignored
#[cfg(not(feature = "telemetry"))]
pub fn layer() -> Result<Option<tracing_subscriber::layer::Identity>> {
    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        // Subscriber is not installed yet
        eprintln!("OTEL_EXPORTER_OTLP_ENDPOINT set but feature 'telemetry' not enabled");
    }
    Ok(None)
}
