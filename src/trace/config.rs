use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::trace::error::TraceError;
use crate::trace::tls::{PemSource, TlsConfig, TlsSettings};

/// Default collector address for OTLP/gRPC
pub const DEFAULT_GRPC_ENDPOINT: &str = "localhost:4317";
/// Default collector URL for OTLP/HTTP
pub const DEFAULT_HTTP_ENDPOINT: &str = "http://localhost:4318/v1/traces";
pub const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 10;

pub const ENV_ENABLED: &str = "RUNTIME_TRACE_ENABLED";
pub const ENV_PROTOCOL: &str = "RUNTIME_TRACE_PROTOCOL";
pub const ENV_ENDPOINT: &str = "RUNTIME_TRACE_ENDPOINT";
pub const ENV_FLUSH_ON_EXIT: &str = "RUNTIME_TRACE_FLUSH_ON_EXIT";
pub const ENV_SERVICE_NAME: &str = "RUNTIME_TRACE_SERVICE_NAME";
pub const ENV_EXPORT_TIMEOUT_SECS: &str = "RUNTIME_TRACE_EXPORT_TIMEOUT_SECS";
pub const ENV_TLS_CA: &str = "RUNTIME_TRACE_TLS_CA";
pub const ENV_TLS_CLIENT_CERT: &str = "RUNTIME_TRACE_TLS_CLIENT_CERT";
pub const ENV_TLS_CLIENT_KEY: &str = "RUNTIME_TRACE_TLS_CLIENT_KEY";

/// Export transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Protocol {
    /// OTLP over gRPC, endpoint is a bare `host:port`
    #[default]
    Grpc,
    /// OTLP over HTTP (binary protobuf), endpoint is a full URL
    Http,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grpc => "grpc",
            Self::Http => "http",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Grpc => DEFAULT_GRPC_ENDPOINT,
            Self::Http => DEFAULT_HTTP_ENDPOINT,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grpc" => Ok(Self::Grpc),
            "http" => Ok(Self::Http),
            other => Err(TraceError::config(format!(
                "unknown trace protocol {other:?}, expected \"http\" or \"grpc\""
            ))),
        }
    }
}

impl TryFrom<String> for Protocol {
    type Error = TraceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The `runtime.trace` configuration section as written by the operator.
///
/// Every field has a default, so a missing section is a valid (disabled)
/// configuration. Call [`TraceConfig::resolve`] to validate it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub enabled: bool,
    pub protocol: Protocol,
    pub endpoint: Option<String>,
    pub flush_on_exit: bool,
    pub service_name: String,
    pub export_timeout_secs: u64,
    pub tls: TlsConfig,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            protocol: Protocol::default(),
            endpoint: None,
            flush_on_exit: true,
            service_name: env!("CARGO_PKG_NAME").to_string(),
            export_timeout_secs: DEFAULT_EXPORT_TIMEOUT_SECS,
            tls: TlsConfig::default(),
        }
    }
}

impl TraceConfig {
    /// Read the `runtime.trace` section of a nested configuration mapping.
    ///
    /// A missing (or null) section yields the defaults.
    pub fn from_value(root: &serde_json::Value) -> Result<Self, TraceError> {
        let section = root.get("runtime").and_then(|runtime| runtime.get("trace"));

        match section {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(section) => Self::deserialize(section).map_err(|e| {
                TraceError::config(format!("invalid runtime.trace section: {e}"))
            }),
        }
    }

    /// Create config from environment variables on top of the defaults
    pub fn from_env() -> Result<Self, TraceError> {
        Self::default().with_env_overrides()
    }

    /// Apply `RUNTIME_TRACE_*` environment variables over this config
    pub fn with_env_overrides(mut self) -> Result<Self, TraceError> {
        if let Some(value) = env_var(ENV_ENABLED) {
            self.enabled = parse_bool(ENV_ENABLED, &value)?;
        }
        if let Some(value) = env_var(ENV_PROTOCOL) {
            self.protocol = value.parse()?;
        }
        if let Some(value) = env_var(ENV_ENDPOINT) {
            self.endpoint = Some(value);
        }
        if let Some(value) = env_var(ENV_FLUSH_ON_EXIT) {
            self.flush_on_exit = parse_bool(ENV_FLUSH_ON_EXIT, &value)?;
        }
        if let Some(value) = env_var(ENV_SERVICE_NAME) {
            self.service_name = value;
        }
        if let Some(value) = env_var(ENV_EXPORT_TIMEOUT_SECS) {
            self.export_timeout_secs = value.trim().parse().map_err(|_| {
                TraceError::config(format!(
                    "{ENV_EXPORT_TIMEOUT_SECS} must be a whole number of seconds, got {value:?}"
                ))
            })?;
        }
        if let Some(value) = env_var(ENV_TLS_CA) {
            self.tls.ca = Some(PemSource::Text(value));
        }
        if let Some(value) = env_var(ENV_TLS_CLIENT_CERT) {
            self.tls.client_cert = Some(PemSource::Text(value));
        }
        if let Some(value) = env_var(ENV_TLS_CLIENT_KEY) {
            self.tls.client_key = Some(PemSource::Text(value));
        }
        Ok(self)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_flush_on_exit(mut self, flush_on_exit: bool) -> Self {
        self.flush_on_exit = flush_on_exit;
        self
    }

    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }

    pub fn with_export_timeout_secs(mut self, secs: u64) -> Self {
        self.export_timeout_secs = secs;
        self
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Validate into [`TraceSettings`]. Pure: no file or network access.
    pub fn resolve(self) -> Result<TraceSettings, TraceError> {
        let endpoint = self
            .endpoint
            .map(|endpoint| endpoint.trim().to_string())
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or_else(|| self.protocol.default_endpoint().to_string());

        let settings = TraceSettings {
            enabled: self.enabled,
            protocol: self.protocol,
            endpoint,
            flush_on_exit: self.flush_on_exit,
            service_name: self.service_name,
            export_timeout: Duration::from_secs(self.export_timeout_secs),
            tls: if self.enabled { self.tls.resolve()? } else { None },
        };
        settings.validate()?;
        Ok(settings)
    }
}

/// Validated trace settings, the input of `configure()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSettings {
    pub enabled: bool,
    pub protocol: Protocol,
    /// Full URL for http, bare `host:port` for grpc
    pub endpoint: String,
    pub flush_on_exit: bool,
    pub service_name: String,
    pub export_timeout: Duration,
    pub tls: Option<TlsSettings>,
}

impl TraceSettings {
    /// Settings that install the no-op provider
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            protocol: Protocol::default(),
            endpoint: DEFAULT_GRPC_ENDPOINT.to_string(),
            flush_on_exit: false,
            service_name: env!("CARGO_PKG_NAME").to_string(),
            export_timeout: Duration::from_secs(DEFAULT_EXPORT_TIMEOUT_SECS),
            tls: None,
        }
    }

    /// Resolve settings from the `runtime.trace` section of a nested mapping
    pub fn from_config(root: &serde_json::Value) -> Result<Self, TraceError> {
        TraceConfig::from_value(root)?.resolve()
    }

    /// Check the endpoint shape against the protocol.
    ///
    /// Disabled settings are always valid; nothing downstream reads them.
    pub fn validate(&self) -> Result<(), TraceError> {
        if !self.enabled {
            return Ok(());
        }
        if self.service_name.trim().is_empty() {
            return Err(TraceError::config("service_name must not be empty"));
        }
        if self.export_timeout.is_zero() {
            return Err(TraceError::config("export timeout must be greater than zero"));
        }

        match self.protocol {
            Protocol::Http => {
                let url = validate_http_endpoint(&self.endpoint)?;
                if url.scheme() == "http" && self.tls.is_some() {
                    warn!(
                        endpoint = %self.endpoint,
                        "TLS material configured for a plaintext http endpoint; it will not be used"
                    );
                }
                Ok(())
            }
            Protocol::Grpc => validate_grpc_endpoint(&self.endpoint),
        }
    }
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self::disabled()
    }
}

fn validate_http_endpoint(endpoint: &str) -> Result<Url, TraceError> {
    let url = Url::parse(endpoint).map_err(|e| {
        TraceError::config(format!("http endpoint {endpoint:?} is not a valid URL: {e}"))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(TraceError::config(format!(
            "http endpoint {endpoint:?} must use the http or https scheme"
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(TraceError::config(format!(
            "http endpoint {endpoint:?} has no host"
        )));
    }
    if url.path().is_empty() || url.path() == "/" {
        return Err(TraceError::config(format!(
            "http endpoint {endpoint:?} must include the export path, e.g. /v1/traces"
        )));
    }
    Ok(url)
}

fn validate_grpc_endpoint(endpoint: &str) -> Result<(), TraceError> {
    if endpoint.contains("://") {
        return Err(TraceError::config(format!(
            "grpc endpoint {endpoint:?} must be a bare host:port, not a URL"
        )));
    }
    if endpoint.contains(&['/', '?', '#'][..]) {
        return Err(TraceError::config(format!(
            "grpc endpoint {endpoint:?} must not carry a path"
        )));
    }

    let (host, port) = endpoint.rsplit_once(':').ok_or_else(|| {
        TraceError::config(format!("grpc endpoint {endpoint:?} is missing a port"))
    })?;
    if host.is_empty() {
        return Err(TraceError::config(format!(
            "grpc endpoint {endpoint:?} is missing a host"
        )));
    }
    port.parse::<u16>().map_err(|_| {
        TraceError::config(format!("grpc endpoint {endpoint:?} has an invalid port"))
    })?;

    Url::parse(&format!("http://{endpoint}")).map_err(|e| {
        TraceError::config(format!("grpc endpoint {endpoint:?} is not a valid authority: {e}"))
    })?;
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn parse_bool(name: &str, value: &str) -> Result<bool, TraceError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(TraceError::config(format!(
            "{name} must be a boolean, got {value:?}"
        ))),
    }
}
