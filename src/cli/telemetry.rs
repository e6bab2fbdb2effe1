//! Logging and optional OTLP trace export.
//!
//! Spans are exported only when `OTEL_EXPORTER_OTLP_ENDPOINT` is set; otherwise
//! logs go to stderr and nothing leaves the process.

use anyhow::{Result, anyhow};
use base64ct::{Base64, Encoding};
use once_cell::sync::OnceCell;
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{Compression, WithExportConfig, WithTonicConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, Tracer},
};
use std::{collections::HashMap, env, time::Duration};
use tonic::{
    metadata::{Ascii, Binary, MetadataKey, MetadataMap, MetadataValue},
    transport::ClientTlsConfig,
};
use tracing::{Level, debug};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};
use ulid::Ulid;
use url::Url;

use crate::GIT_COMMIT_HASH;

static TRACER_PROVIDER: OnceCell<SdkTracerProvider> = OnceCell::new();

const ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

/// Exporter settings read from the standard `OTEL_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExportConfig {
    endpoint: String,
    headers: HashMap<String, String>,
    service_name: String,
    instance_id: String,
}

impl ExportConfig {
    /// `None` when no endpoint is configured.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let endpoint = lookup(ENDPOINT_VAR).filter(|value| !value.trim().is_empty())?;

        Some(Self {
            endpoint: normalize_endpoint(&endpoint),
            headers: lookup("OTEL_EXPORTER_OTLP_HEADERS")
                .map(|raw| parse_headers_env(&raw))
                .unwrap_or_default(),
            service_name: lookup("OTEL_SERVICE_NAME")
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
            instance_id: lookup("OTEL_SERVICE_INSTANCE_ID")
                .unwrap_or_else(|| Ulid::new().to_string()),
        })
    }

    fn from_env() -> Option<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new("service.name", self.service_name.clone()),
                KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                KeyValue::new("service.instance.id", self.instance_id.clone()),
                KeyValue::new("vcs.revision", GIT_COMMIT_HASH),
            ])
            .build()
    }

    /// Host to verify against when the collector is reached over TLS.
    fn tls_domain(&self) -> Option<String> {
        let url = Url::parse(&self.endpoint).ok()?;
        if url.scheme() != "https" {
            return None;
        }
        url.host_str().map(str::to_string)
    }
}

/// `k1=v1,k2=v2`; pairs without `=` are dropped.
fn parse_headers_env(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Keys ending in `-bin` carry base64 values and become binary metadata.
fn headers_to_metadata(headers: &HashMap<String, String>) -> Result<MetadataMap> {
    let mut metadata = MetadataMap::with_capacity(headers.len());

    for (name, value) in headers {
        let name = name.to_ascii_lowercase();

        if name.ends_with("-bin") {
            let bytes = Base64::decode_vec(value)
                .map_err(|e| anyhow!("failed to base64-decode value for key {name}: {e}"))?;
            let key = MetadataKey::<Binary>::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("invalid binary metadata key {name}: {e}"))?;
            metadata.insert_bin(key, MetadataValue::from_bytes(&bytes));
        } else {
            let key = MetadataKey::<Ascii>::from_bytes(name.as_bytes())
                .map_err(|e| anyhow!("invalid ASCII metadata key {name}: {e}"))?;
            let value: MetadataValue<Ascii> = value
                .parse()
                .map_err(|e| anyhow!("invalid ASCII metadata value for key {name}: {e}"))?;
            metadata.insert(key, value);
        }
    }

    Ok(metadata)
}

/// A bare `host:port` means gRPC over TLS.
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

fn init_tracer(config: &ExportConfig) -> Result<Tracer> {
    let mut builder = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.endpoint)
        .with_compression(Compression::Gzip)
        .with_timeout(EXPORT_TIMEOUT);

    if let Some(domain) = config.tls_domain() {
        builder = builder.with_tls_config(
            ClientTlsConfig::new()
                .domain_name(domain)
                .with_native_roots(),
        );
    }

    if !config.headers.is_empty() {
        builder = builder.with_metadata(headers_to_metadata(&config.headers)?);
    }

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(builder.build()?)
        .with_resource(config.resource())
        .build();

    let _ = TRACER_PROVIDER.set(provider.clone());
    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));

    debug!(endpoint = %config.endpoint, service = %config.service_name, "OTLP export enabled");
    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

fn env_filter(verbosity_level: Level) -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(verbosity_level.into())
        .from_env_lossy()
        .add_directive("hyper=error".parse()?)
        .add_directive("tokio=error".parse()?)
        .add_directive("opentelemetry_sdk=warn".parse()?))
}

/// Installs the global subscriber: pretty stderr logs, plus OTLP export when
/// an endpoint is configured.
///
/// # Errors
///
/// Returns an error if the exporter or the subscriber cannot be installed.
pub fn init(verbosity_level: Option<Level>) -> Result<()> {
    let fmt_layer = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .pretty();
    let filter = env_filter(verbosity_level.unwrap_or(Level::ERROR))?;

    if let Some(config) = ExportConfig::from_env() {
        let otel_layer = tracing_opentelemetry::layer().with_tracer(init_tracer(&config)?);
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

/// Flush and stop the exporter; no-op when tracing was never enabled.
pub fn shutdown_tracer() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        debug!("shutting down tracer provider");
        let _ = provider.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value).to_string())
        }
    }

    #[test]
    fn no_endpoint_means_no_export() {
        assert_eq!(ExportConfig::from_lookup(lookup(&[])), None);
        assert_eq!(ExportConfig::from_lookup(lookup(&[(ENDPOINT_VAR, "  ")])), None);
    }

    #[test]
    fn service_name_defaults_to_the_package() {
        let config = ExportConfig::from_lookup(lookup(&[(ENDPOINT_VAR, "http://localhost:4317")]));
        assert!(config.is_some_and(|c| c.service_name == env!("CARGO_PKG_NAME")
            && c.headers.is_empty()
            && !c.instance_id.is_empty()));
    }

    #[test]
    fn explicit_service_identity_wins() {
        let config = ExportConfig::from_lookup(lookup(&[
            (ENDPOINT_VAR, "collector.example.com:4317"),
            ("OTEL_SERVICE_NAME", "frontgate-edge"),
            ("OTEL_SERVICE_INSTANCE_ID", "edge-1"),
            ("OTEL_EXPORTER_OTLP_HEADERS", "x-team=web"),
        ]));
        assert!(config.is_some_and(|c| c.service_name == "frontgate-edge"
            && c.instance_id == "edge-1"
            && c.endpoint == "https://collector.example.com:4317"
            && c.headers.get("x-team").map(String::as_str) == Some("web")));
    }

    #[test]
    fn tls_only_for_https_endpoints() {
        let tls = ExportConfig::from_lookup(lookup(&[(ENDPOINT_VAR, "collector.example.com:4317")]));
        assert_eq!(
            tls.and_then(|c| c.tls_domain()).as_deref(),
            Some("collector.example.com")
        );

        let plain = ExportConfig::from_lookup(lookup(&[(ENDPOINT_VAR, "http://localhost:4317")]));
        assert_eq!(plain.and_then(|c| c.tls_domain()), None);
    }

    #[test]
    fn headers_env_pairs() {
        let result = parse_headers_env(" key1 = value1 ,malformed,key2=a=b");
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("key1").map(String::as_str), Some("value1"));
        assert_eq!(result.get("key2").map(String::as_str), Some("a=b"));
        assert!(parse_headers_env("").is_empty());
    }

    #[test]
    fn metadata_ascii_and_binary() -> Result<()> {
        let headers = HashMap::from([
            ("Authorization".to_string(), "Bearer token123".to_string()),
            ("custom-bin".to_string(), "YmluYXJ5IGRhdGE=".to_string()),
        ]);
        let metadata = headers_to_metadata(&headers)?;
        assert_eq!(metadata.len(), 2);
        assert!(metadata.get("authorization").is_some());
        Ok(())
    }

    #[test]
    fn metadata_rejects_bad_base64() {
        let headers = HashMap::from([("custom-bin".to_string(), "not-valid!!".to_string())]);
        let err = headers_to_metadata(&headers).err();
        assert!(err.is_some_and(|err| err.to_string().contains("failed to base64-decode")));
    }

    #[test]
    fn endpoints_default_to_https() {
        assert_eq!(
            normalize_endpoint("http://localhost:4317"),
            "http://localhost:4317"
        );
        assert_eq!(
            normalize_endpoint(" collector.example.com:4317/ "),
            "https://collector.example.com:4317"
        );
    }

    #[test]
    fn filter_builds_for_every_level() {
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            assert!(env_filter(level).is_ok());
        }
    }

    #[test]
    fn shutdown_without_provider_is_a_no_op() {
        shutdown_tracer();
    }
}
