//! TLS material for the exporter transport.
//!
//! Credentials arrive either as inline PEM text or as a filesystem path.
//! Configuration classifies each value into a [`PemMaterial`] up front, and
//! [`TlsSettings::resolve`] turns the set into raw bytes when the exporter is
//! about to be built. Nothing here caches file contents, so rotated
//! credentials on disk are picked up by the next `configure()`.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::trace::error::TraceError;

const PEM_ARMOR: &str = "-----BEGIN";

/// A PEM credential, either carried inline or referenced by path.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PemMaterial {
    Inline(String),
    Path(PathBuf),
}

impl PemMaterial {
    pub fn inline(pem: impl Into<String>) -> Self {
        Self::Inline(pem.into())
    }

    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// Read the material into raw PEM bytes.
    ///
    /// Inline material is returned verbatim; path material is read in full
    /// and the file handle is closed before returning.
    pub fn resolve(&self) -> Result<Vec<u8>, TraceError> {
        match self {
            Self::Inline(pem) => Ok(pem.as_bytes().to_vec()),
            Self::Path(path) => std::fs::read(path).map_err(|source| TraceError::Io {
                path: path.clone(),
                source,
            }),
        }
    }
}

// Inline material is secret; only ever print its length.
impl fmt::Debug for PemMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(pem) => write!(f, "Inline(<{} bytes>)", pem.len()),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

/// A TLS value as written in configuration: a bare string, or an explicit
/// `{inline: ..}` / `{path: ..}` mapping.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PemSource {
    Text(String),
    Tagged(PemMaterial),
}

impl PemSource {
    /// Decide what a configured value refers to.
    ///
    /// Empty strings mean "not configured". Strings carrying a PEM armor line
    /// are inline material; every other string is a path.
    pub fn classify(self) -> Option<PemMaterial> {
        match self {
            Self::Tagged(material) => Some(material),
            Self::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.contains(PEM_ARMOR) {
                    Some(PemMaterial::Inline(text))
                } else {
                    Some(PemMaterial::Path(PathBuf::from(trimmed)))
                }
            }
        }
    }
}

impl fmt::Debug for PemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.clone().classify() {
            Some(material) => material.fmt(f),
            None => f.write_str("<empty>"),
        }
    }
}

impl From<&str> for PemSource {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<PemMaterial> for PemSource {
    fn from(material: PemMaterial) -> Self {
        Self::Tagged(material)
    }
}

/// The `tls` block of the trace configuration, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub ca: Option<PemSource>,
    pub client_cert: Option<PemSource>,
    pub client_key: Option<PemSource>,
}

impl TlsConfig {
    pub fn with_ca(mut self, ca: impl Into<PemSource>) -> Self {
        self.ca = Some(ca.into());
        self
    }

    pub fn with_client_identity(
        mut self,
        cert: impl Into<PemSource>,
        key: impl Into<PemSource>,
    ) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    /// Classify every field and check the client pair is complete.
    ///
    /// Returns `Ok(None)` when nothing is configured, which means plaintext
    /// transport.
    pub fn resolve(self) -> Result<Option<TlsSettings>, TraceError> {
        TlsSettings::new(
            self.ca.and_then(PemSource::classify),
            self.client_cert.and_then(PemSource::classify),
            self.client_key.and_then(PemSource::classify),
        )
    }
}

/// Validated TLS settings. Client certificate and key are both-or-neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsSettings {
    ca: Option<PemMaterial>,
    client_cert: Option<PemMaterial>,
    client_key: Option<PemMaterial>,
}

impl TlsSettings {
    pub fn new(
        ca: Option<PemMaterial>,
        client_cert: Option<PemMaterial>,
        client_key: Option<PemMaterial>,
    ) -> Result<Option<Self>, TraceError> {
        match (&ca, &client_cert, &client_key) {
            (None, None, None) => Ok(None),
            (_, Some(_), None) => Err(TraceError::config(
                "tls.client_cert is set but tls.client_key is missing",
            )),
            (_, None, Some(_)) => Err(TraceError::config(
                "tls.client_key is set but tls.client_cert is missing",
            )),
            _ => Ok(Some(Self {
                ca,
                client_cert,
                client_key,
            })),
        }
    }

    pub fn ca(&self) -> Option<&PemMaterial> {
        self.ca.as_ref()
    }

    pub fn client_cert(&self) -> Option<&PemMaterial> {
        self.client_cert.as_ref()
    }

    pub fn client_key(&self) -> Option<&PemMaterial> {
        self.client_key.as_ref()
    }

    pub fn is_mutual(&self) -> bool {
        self.client_cert.is_some()
    }

    /// Load every configured credential and check it parses as PEM.
    pub fn resolve(&self) -> Result<ResolvedTls, TraceError> {
        let ca = self.ca.as_ref().map(PemMaterial::resolve).transpose()?;
        if let Some(ca) = &ca {
            ensure_certificates("tls.ca", ca)?;
        }

        match (&self.client_cert, &self.client_key) {
            (Some(cert), Some(key)) => {
                let cert = cert.resolve()?;
                ensure_certificates("tls.client_cert", &cert)?;
                let key = key.resolve()?;
                ensure_private_key("tls.client_key", &key)?;
                Ok(ResolvedTls::Mutual { ca, cert, key })
            }
            _ => match ca {
                Some(ca) => Ok(ResolvedTls::ServerAuth { ca }),
                None => Err(TraceError::config("tls settings carry no material")),
            },
        }
    }
}

/// Credential bytes for one exporter build. Consumed by value and dropped
/// once the transport is constructed.
pub enum ResolvedTls {
    /// Verify the collector against `ca`; no client certificate.
    ServerAuth { ca: Vec<u8> },
    /// Present `cert`/`key` to the collector. Without `ca` the platform roots
    /// verify the server.
    Mutual {
        ca: Option<Vec<u8>>,
        cert: Vec<u8>,
        key: Vec<u8>,
    },
}

impl ResolvedTls {
    pub fn is_mutual(&self) -> bool {
        matches!(self, Self::Mutual { .. })
    }
}

impl fmt::Debug for ResolvedTls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServerAuth { .. } => f.write_str("ServerAuth"),
            Self::Mutual { ca, .. } => f
                .debug_struct("Mutual")
                .field("custom_ca", &ca.is_some())
                .finish_non_exhaustive(),
        }
    }
}

fn ensure_certificates(field: &str, pem: &[u8]) -> Result<(), TraceError> {
    let mut reader = pem;
    let mut found = 0usize;
    for cert in rustls_pemfile::certs(&mut reader) {
        cert.map_err(|e| TraceError::config(format!("{field} is not valid PEM: {e}")))?;
        found += 1;
    }
    if found == 0 {
        return Err(TraceError::config(format!(
            "{field} does not contain a PEM certificate"
        )));
    }
    Ok(())
}

fn ensure_private_key(field: &str, pem: &[u8]) -> Result<(), TraceError> {
    let mut reader = pem;
    match rustls_pemfile::private_key(&mut reader) {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(TraceError::config(format!(
            "{field} does not contain a PEM private key"
        ))),
        Err(e) => Err(TraceError::config(format!("{field} is not valid PEM: {e}"))),
    }
}
