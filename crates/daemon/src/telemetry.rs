//! Telemetry setup for OpenTelemetry integration

use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;

/// OpenTelemetry layer, when configured
///
/// # Environment Variables
///
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP/HTTP endpoint (e.g., http://localhost:4318)
/// - `OTEL_SERVICE_NAME`: Service name (default: devicehub)
///
/// # Example
///
/// ```text
/// OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4318 \
/// OTEL_SERVICE_NAME=devicehub-warehouse \
///     ./devicehub
/// ```
#[cfg(feature = "telemetry")]
pub fn otel_layer<S>(
) -> Option<tracing_opentelemetry::OpenTelemetryLayer<S, opentelemetry_sdk::trace::Tracer>>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;

    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok()?;
    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "devicehub".to_string());

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(&endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            // Logging is not up yet
            eprintln!("OpenTelemetry exporter for {} failed: {}", endpoint, e);
            return None;
        }
    };

    let provider = opentelemetry_sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio)
        .with_resource(opentelemetry_sdk::Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Some(tracing_opentelemetry::layer().with_tracer(tracer))
}

#[cfg(not(feature = "telemetry"))]
pub fn otel_layer<S>() -> Option<tracing_subscriber::layer::Identity>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        eprintln!("OpenTelemetry endpoint set but feature 'telemetry' not enabled");
        eprintln!("Rebuild with: cargo build --features telemetry");
    }
    None
}
