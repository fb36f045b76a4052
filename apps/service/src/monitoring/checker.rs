use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use x509_parser::prelude::{FromDer, X509Certificate};

use super::address::{TLS_PORT, normalize_address, tls_host};
use super::types::{CertificateOutcome, Reachability};

/// Checker trait for the two independent probes run against a target
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    type Outcome: Send;

    /// Perform the check. Failures are part of the outcome, never an `Err`.
    async fn check(&self, target: &str) -> Self::Outcome;
}

/// HTTP(S) reachability checker
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(timeout_duration: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout_duration).build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    type Outcome = Reachability;

    async fn check(&self, target: &str) -> Reachability {
        let url = normalize_address(target);

        match self.client.get(&url).send().await {
            Ok(response) => {
                let status_code = response.status().as_u16();
                tracing::debug!(%url, status_code, "HTTP check answered");
                Reachability::Responded(status_code)
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "HTTP check failed");
                Reachability::Failed(format!("HTTP request failed: {e}"))
            }
        }
    }
}

/// TLS certificate checker
///
/// Dials the bare host on port 443, completes a verified handshake against
/// the Mozilla root set and reads `notAfter` from the leaf certificate. The
/// timeout covers connect and handshake together.
pub struct TlsChecker {
    connector: TlsConnector,
    timeout_duration: Duration,
    port: u16,
}

impl TlsChecker {
    pub fn new(timeout_duration: Duration) -> Result<Self> {
        Self::with_port(timeout_duration, TLS_PORT)
    }

    /// Dial a port other than 443. Used by tests.
    pub fn with_port(timeout_duration: Duration, port: u16) -> Result<Self> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        Self::with_roots(timeout_duration, port, root_store)
    }

    /// Trust `root_store` instead of the Mozilla root set.
    pub fn with_roots(
        timeout_duration: Duration,
        port: u16,
        root_store: RootCertStore,
    ) -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self { connector: TlsConnector::from(Arc::new(config)), timeout_duration, port })
    }

    async fn handshake(&self, target: &str) -> Result<CertificateOutcome> {
        let host = tls_host(target)?;
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| anyhow!("Invalid server name {host:?}: {e}"))?;

        let stream = TcpStream::connect((host.as_str(), self.port))
            .await
            .map_err(|e| anyhow!("TCP connection to {host}:{} failed: {e}", self.port))?;

        let tls_stream = self
            .connector
            .connect(server_name, stream)
            .await
            .map_err(|e| anyhow!("TLS handshake with {host} failed: {e}"))?;

        let (_, connection) = tls_stream.get_ref();
        match connection.peer_certificates().and_then(|certs| certs.first()) {
            Some(leaf) => Ok(CertificateOutcome::Expires(leaf_expiry(leaf.as_ref())?)),
            None => Ok(CertificateOutcome::NoCertificate),
        }
    }
}

#[async_trait::async_trait]
impl Checker for TlsChecker {
    type Outcome = CertificateOutcome;

    async fn check(&self, target: &str) -> CertificateOutcome {
        match timeout(self.timeout_duration, self.handshake(target)).await {
            Ok(Ok(outcome)) => {
                tracing::debug!(address = %target, ?outcome, "TLS check completed");
                outcome
            }
            Ok(Err(e)) => {
                tracing::debug!(address = %target, error = %e, "TLS check failed");
                CertificateOutcome::Failed(e.to_string())
            }
            Err(_) => {
                tracing::debug!(address = %target, "TLS check timed out");
                CertificateOutcome::Failed("TLS handshake timeout".to_string())
            }
        }
    }
}

/// `notAfter` of a DER encoded certificate.
pub fn leaf_expiry(der: &[u8]) -> Result<DateTime<Utc>> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| anyhow!("Failed to parse certificate: {e:?}"))?;

    let not_after = cert.validity().not_after.timestamp();
    DateTime::from_timestamp(not_after, 0)
        .ok_or_else(|| anyhow!("Certificate expiry {not_after} is out of range"))
}
