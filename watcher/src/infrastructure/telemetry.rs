use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, propagation::TraceContextPropagator, trace::Sampler};
use opentelemetry_semantic_conventions::resource;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use super::config::TelemetrySettings;

/// Builder for setting up logging and tracing.
pub struct TelemetryBuilder {
    service_name: String,
    service_version: String,
    otlp_endpoint: Option<String>,
    log_level: String,
    json: bool,
    sampling_ratio: f64,
}

impl TelemetryBuilder {
    /// Creates a builder logging JSON at `info` without trace export.
    pub fn new(service_name: impl Into<String>, service_version: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: service_version.into(),
            otlp_endpoint: None,
            log_level: "info".to_string(),
            json: true,
            sampling_ratio: 1.0,
        }
    }

    /// Applies the telemetry section of the settings.
    #[must_use]
    pub fn from_settings(settings: &TelemetrySettings, service_version: impl Into<String>) -> Self {
        let builder = Self::new(settings.service_name.clone(), service_version)
            .with_log_level(settings.level.clone())
            .with_json(settings.json)
            .with_sampling_ratio(settings.sampling_ratio);
        match settings.otlp_endpoint.as_deref().filter(|e| !e.is_empty()) {
            Some(endpoint) => builder.with_tracing(endpoint),
            None => builder,
        }
    }

    /// Exports spans to an OTLP collector.
    #[must_use]
    pub fn with_tracing(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Sets the default log filter.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Chooses JSON or human-readable log lines.
    #[must_use]
    pub const fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Sets the trace sampling ratio.
    #[must_use]
    pub const fn with_sampling_ratio(mut self, ratio: f64) -> Self {
        self.sampling_ratio = ratio;
        self
    }

    /// Installs the global subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The OTLP span exporter cannot be built
    /// - The tracing subscriber cannot be initialized
    pub fn init(self) -> Result<()> {
        opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level));

        let fmt_layer = if self.json {
            fmt::layer().json().with_span_events(FmtSpan::CLOSE).boxed()
        } else {
            fmt::layer().with_span_events(FmtSpan::CLOSE).boxed()
        };

        let registry = Registry::default().with(env_filter).with(fmt_layer);

        let Some(endpoint) = self.otlp_endpoint else {
            return registry.try_init().context("Failed to init subscriber");
        };

        let resource = Resource::builder()
            .with_attributes(vec![
                opentelemetry::KeyValue::new(resource::SERVICE_NAME, self.service_name.clone()),
                opentelemetry::KeyValue::new(resource::SERVICE_VERSION, self.service_version),
            ])
            .build();

        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .context("Failed to build OTLP span exporter")?;

        let processor = opentelemetry_sdk::trace::BatchSpanProcessor::builder(exporter).build();

        let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_span_processor(processor)
            .with_resource(resource)
            .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                self.sampling_ratio,
            ))))
            .build();

        opentelemetry::global::set_tracer_provider(provider.clone());

        let tracer = provider.tracer(self.service_name);
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        registry
            .with(telemetry_layer)
            .try_init()
            .context("Failed to init subscriber")
    }
}
