use anyhow::Context;
use opentelemetry::global;
use opentelemetry::sdk::propagation::BaggagePropagator;
use opentelemetry::sdk::propagation::TextMapCompositePropagator;
use opentelemetry::sdk::propagation::TraceContextPropagator;
use opentelemetry::sdk::trace;
use opentelemetry::sdk::Resource;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

const OTLP_ENDPOINT_VARIABLE: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Installs the global subscriber: JSON lines on stdout filtered by
/// `RUST_LOG` (default `info`), plus an OTLP exporter when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
pub fn config_telemetry(service_name: &'static str) -> anyhow::Result<()> {
    // Needed to forward ordinary log statements to our tracing subscriber.
    tracing_log::LogTracer::init().context("Failed to initialize log tracer")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_thread_names(true),
    );

    let otel_layer = match std::env::var(OTLP_ENDPOINT_VARIABLE) {
        Ok(_) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_env())
                .with_trace_config(trace::config().with_resource(Resource::new(vec![
                    KeyValue::new("service.name", service_name),
                ])))
                .install_batch(opentelemetry::runtime::Tokio)
                .context("Failed to initialize otlp tracer.")?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        Err(_) => None,
    };

    tracing::subscriber::set_global_default(subscriber.with(otel_layer))
        .context("Failed to install `tracing` subscriber")?;

    let composite_propagator = TextMapCompositePropagator::new(vec![
        Box::new(BaggagePropagator::new()),
        Box::new(TraceContextPropagator::new()),
    ]);
    global::set_text_map_propagator(composite_propagator);

    tracing::info!(service_name, "telemetry configured");
    Ok(())
}

pub fn shutdown_global_tracer_provider() {
    global::shutdown_tracer_provider();
}
