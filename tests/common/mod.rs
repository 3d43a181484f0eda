//! Mock collectors and certificates shared by the integration tests.
#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use opentelemetry_proto::tonic::collector::trace::v1::{
    trace_service_server::{TraceService, TraceServiceServer},
    ExportTraceServiceRequest, ExportTraceServiceResponse,
};
use opentelemetry_proto::tonic::common::v1::any_value;
use prost::Message;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tempfile::NamedTempFile;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::ServerTlsConfig;

type Requests = Arc<Mutex<Vec<ExportTraceServiceRequest>>>;

static SERIAL: Mutex<()> = Mutex::new(());

/// Serialize access to the process-wide provider within one test binary.
pub fn serial() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    // The OTLP exporter lets these override the configured endpoint.
    std::env::remove_var("OTEL_EXPORTER_OTLP_ENDPOINT");
    std::env::remove_var("OTEL_EXPORTER_OTLP_TRACES_ENDPOINT");
    guard
}

#[derive(Clone, Default)]
struct MockTraceService {
    requests: Requests,
}

#[tonic::async_trait]
impl TraceService for MockTraceService {
    async fn export(
        &self,
        request: tonic::Request<ExportTraceServiceRequest>,
    ) -> Result<tonic::Response<ExportTraceServiceResponse>, tonic::Status> {
        self.requests.lock().unwrap().push(request.into_inner());
        Ok(tonic::Response::new(ExportTraceServiceResponse {
            partial_success: None,
        }))
    }
}

async fn receive_http(State(requests): State<Requests>, body: Bytes) -> StatusCode {
    match ExportTraceServiceRequest::decode(body) {
        Ok(request) => {
            requests.lock().unwrap().push(request);
            StatusCode::OK
        }
        Err(_) => StatusCode::BAD_REQUEST,
    }
}

/// A collector running on its own runtime, so tests stay synchronous.
pub struct Collector {
    pub addr: SocketAddr,
    secure: bool,
    requests: Requests,
    _runtime: tokio::runtime::Runtime,
}

impl Collector {
    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("collector runtime")
    }

    pub fn grpc(tls: Option<ServerTlsConfig>) -> Self {
        let runtime = Self::runtime();
        let requests = Requests::default();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .expect("failed to bind");
        let addr = listener.local_addr().unwrap();

        let service = TraceServiceServer::new(MockTraceService {
            requests: requests.clone(),
        });
        runtime.spawn(async move {
            let mut server = tonic::transport::Server::builder();
            if let Some(tls) = tls {
                server = server.tls_config(tls).expect("failed to set tls config");
            }
            server
                .add_service(service)
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .expect("grpc collector failed")
        });

        Self {
            addr,
            secure: false,
            requests,
            _runtime: runtime,
        }
    }

    pub fn http() -> Self {
        let runtime = Self::runtime();
        let requests = Requests::default();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .expect("failed to bind");
        let addr = listener.local_addr().unwrap();

        let app = Self::http_app(&requests);
        runtime.spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("http collector failed")
        });

        Self {
            addr,
            secure: false,
            requests,
            _runtime: runtime,
        }
    }

    /// OTLP/HTTP over TLS with `server` as its identity. With `client_ca`,
    /// only clients presenting a certificate signed by it are accepted.
    pub fn https(server: &CertChain, client_ca: Option<&str>) -> Self {
        let runtime = Self::runtime();
        let requests = Requests::default();
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind");
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let tls = RustlsConfig::from_config(Arc::new(server_tls(server, client_ca)));
        let app = Self::http_app(&requests);
        runtime.spawn(async move {
            axum_server::from_tcp_rustls(listener, tls)
                .serve(app.into_make_service())
                .await
                .expect("https collector failed")
        });

        Self {
            addr,
            secure: true,
            requests,
            _runtime: runtime,
        }
    }

    fn http_app(requests: &Requests) -> Router {
        Router::new()
            .route("/v1/traces", post(receive_http))
            .with_state(requests.clone())
    }

    /// `localhost:port`, the grpc endpoint form. TLS needs a host name.
    pub fn authority(&self) -> String {
        format!("localhost:{}", self.addr.port())
    }

    pub fn traces_url(&self) -> String {
        if self.secure {
            format!("https://{}/v1/traces", self.authority())
        } else {
            format!("http://{}/v1/traces", self.addr)
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn span_names(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .flat_map(|request| request.resource_spans.iter())
            .flat_map(|resource_spans| resource_spans.scope_spans.iter())
            .flat_map(|scope_spans| scope_spans.spans.iter())
            .map(|span| span.name.clone())
            .collect()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .flat_map(|request| request.resource_spans.iter())
            .filter_map(|resource_spans| resource_spans.resource.as_ref())
            .flat_map(|resource| resource.attributes.iter())
            .filter(|kv| kv.key == "service.name")
            .filter_map(|kv| match kv.value.as_ref()?.value.as_ref()? {
                any_value::Value::StringValue(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Poll until every name in `expected` has been received.
    pub fn wait_for_spans(&self, expected: &[&str]) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let names = self.span_names();
            if expected.iter().all(|name| names.iter().any(|n| n == name)) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

/// A CA and a leaf certificate for `localhost` signed by it.
pub struct CertChain {
    pub ca: String,
    pub cert: String,
    pub key: String,
}

pub fn generate_chain(ca_name: &str) -> CertChain {
    let ca_key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec![ca_name.to_string()]).unwrap();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.distinguished_name.push(DnType::CommonName, ca_name);
    let ca_cert = params.self_signed(&ca_key).unwrap();

    let mut params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
    params
        .distinguished_name
        .push(DnType::OrganizationName, "otel-runtime");
    params.distinguished_name.push(DnType::CommonName, "localhost");
    let cert_key = KeyPair::generate().unwrap();
    let cert = params.signed_by(&cert_key, &ca_cert, &ca_key).unwrap();

    CertChain {
        ca: ca_cert.pem(),
        cert: cert.pem(),
        key: cert_key.serialize_pem(),
    }
}

fn server_tls(server: &CertChain, client_ca: Option<&str>) -> ServerConfig {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .unwrap();

    let builder = match client_ca {
        Some(ca) => {
            let mut roots = RootCertStore::empty();
            for cert in certificates(ca) {
                roots.add(cert).unwrap();
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
                .build()
                .unwrap();
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    builder
        .with_single_cert(certificates(&server.cert), private_key(&server.key))
        .unwrap()
}

fn certificates(pem: &str) -> Vec<CertificateDer<'static>> {
    rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<Result<_, _>>()
        .unwrap()
}

fn private_key(pem: &str) -> PrivateKeyDer<'static> {
    rustls_pemfile::private_key(&mut pem.as_bytes())
        .unwrap()
        .expect("no private key in pem")
}

pub fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}
