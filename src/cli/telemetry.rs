//! Console logging plus optional OTLP/gRPC span export.

use anyhow::{anyhow, Context, Result};
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    propagation::TraceContextPropagator,
    trace::{SdkTracerProvider, Tracer},
    Resource,
};
use std::{env::var, sync::OnceLock, time::Duration};
use tonic::{
    metadata::{MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};
use ulid::Ulid;
use url::Url;

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Collector address; a bare `host:port` is taken as https.
fn collector_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let url = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("https://{raw}"))
    };
    let url = url.with_context(|| format!("Invalid OTLP endpoint: {raw}"))?;
    if url.host_str().is_none() {
        return Err(anyhow!("OTLP endpoint must include a host: {raw}"));
    }
    Ok(url)
}

/// `OTEL_EXPORTER_OTLP_HEADERS` (`k1=v1,k2=v2`) as gRPC metadata.
fn collector_metadata(raw: &str) -> Result<MetadataMap> {
    let mut meta = MetadataMap::new();
    for (key, value) in raw.split(',').filter_map(|pair| pair.split_once('=')) {
        let key = key.trim().to_ascii_lowercase();
        let name = MetadataKey::from_bytes(key.as_bytes())
            .map_err(|e| anyhow!("invalid OTLP header name {key}: {e}"))?;
        let value: MetadataValue<_> = value
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid OTLP header value for {key}: {e}"))?;
        meta.insert(name, value);
    }
    Ok(meta)
}

fn init_tracer(endpoint: &Url) -> Result<Tracer> {
    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.as_str().trim_end_matches('/'))
        .with_compression(Compression::Gzip)
        .with_timeout(Duration::from_secs(3));

    if endpoint.scheme() == "https" {
        if let Some(host) = endpoint.host_str() {
            let tls = ClientTlsConfig::new()
                .domain_name(host.to_string())
                .with_native_roots();
            builder = builder.with_tls_config(tls);
        }
    }

    if let Ok(headers) = var("OTEL_EXPORTER_OTLP_HEADERS") {
        builder = builder.with_metadata(collector_metadata(&headers)?);
    }

    let exporter = builder.build()?;

    let trace_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder_empty()
                .with_attributes(vec![
                    KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                    KeyValue::new("service.instance.id", Ulid::new().to_string()),
                ])
                .build(),
        )
        .build();

    // Kept for shutdown_tracer.
    let _ = TRACER_PROVIDER.set(trace_provider.clone());

    global::set_tracer_provider(trace_provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    Ok(trace_provider.tracer(env!("CARGO_PKG_NAME")))
}

/// Initialize logging and, when `OTEL_EXPORTER_OTLP_ENDPOINT` is set, the OTLP/gRPC exporter.
///
/// # Errors
///
/// Returns an error if tracer or subscriber initialization fails
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let verbosity_level = verbosity_level.unwrap_or(Level::ERROR);

    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .pretty();

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?);

    if let Ok(raw) = var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        let tracer = init_tracer(&collector_url(&raw)?)?;
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        let subscriber = Registry::default()
            .with(fmt_layer)
            .with(otel_layer)
            .with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(fmt_layer).with(filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

/// Flush and stop the tracer provider; a no-op when tracing was never enabled.
pub fn shutdown_tracer() {
    if let Some(tp) = TRACER_PROVIDER.get() {
        debug!("shutting down tracer provider");
        if let Err(err) = tp.shutdown() {
            debug!("tracer provider shutdown failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_url_defaults_to_https() -> Result<()> {
        assert_eq!(
            collector_url("otel.huddle.dev:4317")?.as_str(),
            "https://otel.huddle.dev:4317/"
        );
        assert_eq!(
            collector_url(" http://localhost:4317 ")?.scheme(),
            "http"
        );
        assert!(collector_url("https://").is_err());
        Ok(())
    }

    #[test]
    fn collector_metadata_skips_malformed_pairs() -> Result<()> {
        assert!(collector_metadata("")?.is_empty());

        let meta = collector_metadata("Authorization = Bearer abc , malformed, x-key=a=b")?;
        assert_eq!(meta.len(), 2);
        assert_eq!(
            meta.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer abc")
        );
        assert_eq!(meta.get("x-key").and_then(|v| v.to_str().ok()), Some("a=b"));
        Ok(())
    }

    #[test]
    fn collector_metadata_rejects_bad_names() {
        assert!(collector_metadata("bad name=value").is_err());
    }

    #[test]
    fn shutdown_without_tracer_is_a_no_op() {
        shutdown_tracer();
    }
}
