use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_semantic_conventions::SCHEMA_URL;
use opentelemetry_semantic_conventions::attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION};
use std::env;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// OTLP transport, picked from `OTEL_EXPORTER_OTLP_PROTOCOL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OtlpProtocol {
    Http,
    Grpc,
}

impl OtlpProtocol {
    /// `None` unless any `OTEL_EXPORTER_OTLP_*` variable is set.
    fn from_env() -> Option<Self> {
        let enabled = [
            "OTEL_EXPORTER_OTLP_ENDPOINT",
            "OTEL_EXPORTER_OTLP_HEADERS",
            "OTEL_EXPORTER_OTLP_PROTOCOL",
        ]
        .iter()
        .any(|var| env::var(var).is_ok());
        if !enabled {
            return None;
        }
        let protocol = match env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
            Ok("grpc") => OtlpProtocol::Grpc,
            _ => OtlpProtocol::Http,
        };
        Some(protocol)
    }
}

/// Logging setup for the process. Flushes exported spans on drop.
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Installs the global subscriber.
    ///
    /// Logs go to stderr, filtered by `RUST_LOG` (default `info`). Spans are
    /// additionally exported over OTLP when the standard `OTEL_EXPORTER_OTLP_*`
    /// variables are present.
    pub fn init(service_name: &'static str, service_version: &'static str) -> Self {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = fmt::layer().with_writer(std::io::stderr);

        let tracer_provider = OtlpProtocol::from_env().and_then(|protocol| {
            match tracer_provider(protocol, service_name, service_version) {
                Ok(provider) => Some((protocol, provider)),
                Err(err) => {
                    eprintln!("Failed to build OTLP span exporter: {err}");
                    None
                }
            }
        });

        let otel_layer = tracer_provider
            .as_ref()
            .map(|(_, provider)| OpenTelemetryLayer::new(provider.tracer("x402-paywall")));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(otel_layer)
            .init();

        match &tracer_provider {
            Some((protocol, _)) => tracing::debug!(?protocol, "OpenTelemetry span export enabled"),
            None => tracing::debug!("OpenTelemetry is not enabled"),
        }

        Self {
            tracer_provider: tracer_provider.map(|(_, provider)| provider),
        }
    }
}

fn tracer_provider(
    protocol: OtlpProtocol,
    service_name: &'static str,
    service_version: &'static str,
) -> Result<SdkTracerProvider, opentelemetry_otlp::ExporterBuildError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder();
    let exporter = match protocol {
        OtlpProtocol::Http => exporter.with_http().build()?,
        OtlpProtocol::Grpc => exporter.with_tonic().build()?,
    };
    let deployment_env = env::var("DEPLOYMENT_ENV").unwrap_or_else(|_| "develop".to_string());
    let resource = Resource::builder()
        .with_service_name(service_name)
        .with_schema_url(
            [
                KeyValue::new(SERVICE_VERSION, service_version),
                KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment_env),
            ],
            SCHEMA_URL,
        )
        .build();
    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_batch_exporter(exporter)
        .build())
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take() {
            if let Err(err) = provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}
