use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig, WithHttpConfig};
use reqwest::blocking::Client;
use reqwest::{Certificate, Identity};

use crate::trace::config::TraceSettings;
use crate::trace::error::TraceError;
use crate::trace::export::ExporterFactory;
use crate::trace::tls::ResolvedTls;

/// OTLP/HTTP with binary protobuf bodies through a blocking reqwest client
pub(crate) struct HttpExporterFactory;

impl ExporterFactory for HttpExporterFactory {
    fn build_exporter(
        &self,
        settings: &TraceSettings,
        tls: Option<ResolvedTls>,
    ) -> Result<SpanExporter, TraceError> {
        // The blocking client starts its own runtime and must neither be
        // created nor dropped on a thread that is already driving one.
        let endpoint = settings.endpoint.clone();
        let timeout = settings.export_timeout;
        std::thread::spawn(move || -> Result<SpanExporter, TraceError> {
            let client = build_client(tls)?;
            Ok(SpanExporter::builder()
                .with_http()
                .with_protocol(Protocol::HttpBinary)
                .with_endpoint(endpoint)
                .with_timeout(timeout)
                .with_http_client(client)
                .build()?)
        })
        .join()
        .map_err(|_| TraceError::Init("http exporter construction panicked".to_string()))?
    }
}

fn build_client(tls: Option<ResolvedTls>) -> Result<Client, TraceError> {
    let mut builder = Client::builder().use_rustls_tls();

    match tls {
        None => {}
        Some(ResolvedTls::ServerAuth { ca }) => {
            for cert in root_certificates(&ca)? {
                builder = builder.add_root_certificate(cert);
            }
        }
        Some(ResolvedTls::Mutual { ca, cert, key }) => {
            if let Some(ca) = ca {
                for cert in root_certificates(&ca)? {
                    builder = builder.add_root_certificate(cert);
                }
            }
            builder = builder.identity(identity(cert, key)?);
        }
    }

    builder
        .build()
        .map_err(|e| TraceError::config(format!("failed to build http client: {e}")))
}

fn root_certificates(pem: &[u8]) -> Result<Vec<Certificate>, TraceError> {
    Certificate::from_pem_bundle(pem)
        .map_err(|e| TraceError::config(format!("tls.ca rejected: {e}")))
}

/// reqwest expects the certificate chain and the key in one PEM buffer.
fn identity(cert: Vec<u8>, key: Vec<u8>) -> Result<Identity, TraceError> {
    let mut pem = cert;
    if !pem.ends_with(b"\n") {
        pem.push(b'\n');
    }
    pem.extend_from_slice(&key);

    Identity::from_pem(&pem)
        .map_err(|e| TraceError::config(format!("tls client identity rejected: {e}")))
}
