use opentelemetry_otlp::{SpanExporter, WithExportConfig, WithTonicConfig};
use tonic::transport::{Certificate, ClientTlsConfig, Identity};

use crate::trace::config::TraceSettings;
use crate::trace::error::TraceError;
use crate::trace::export::ExporterFactory;
use crate::trace::tls::ResolvedTls;

/// OTLP over gRPC through tonic
pub(crate) struct GrpcExporterFactory;

impl ExporterFactory for GrpcExporterFactory {
    fn build_exporter(
        &self,
        settings: &TraceSettings,
        tls: Option<ResolvedTls>,
    ) -> Result<SpanExporter, TraceError> {
        let endpoint = endpoint_uri(&settings.endpoint, tls.is_some());

        let mut builder = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .with_timeout(settings.export_timeout);

        if let Some(tls) = tls {
            builder = builder.with_tls_config(client_tls_config(tls));
        }

        Ok(builder.build()?)
    }
}

/// `host:port` as the URI tonic dials. The scheme selects TLS.
fn endpoint_uri(endpoint: &str, secure: bool) -> String {
    let scheme = if secure { "https" } else { "http" };
    format!("{scheme}://{endpoint}")
}

fn client_tls_config(tls: ResolvedTls) -> ClientTlsConfig {
    match tls {
        ResolvedTls::ServerAuth { ca } => {
            ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca))
        }
        ResolvedTls::Mutual { ca, cert, key } => {
            let config = ClientTlsConfig::new().identity(Identity::from_pem(cert, key));
            match ca {
                Some(ca) => config.ca_certificate(Certificate::from_pem(ca)),
                None => config.with_native_roots(),
            }
        }
    }
}
