use anyhow::Result;
use std::time::Duration;

use super::checker::{Checker, HttpChecker, TlsChecker};
use super::types::Probe;

/// Runs both probes against one target
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &str) -> Probe;
}

/// Monitoring executor - the network-backed prober
pub struct MonitoringExecutor {
    http_checker: HttpChecker,
    tls_checker: TlsChecker,
}

impl MonitoringExecutor {
    /// Create a new monitoring executor; both checks share `timeout_duration`
    pub fn new(timeout_duration: Duration) -> Result<Self> {
        Ok(Self {
            http_checker: HttpChecker::new(timeout_duration)?,
            tls_checker: TlsChecker::new(timeout_duration)?,
        })
    }

    pub fn with_checkers(http_checker: HttpChecker, tls_checker: TlsChecker) -> Self {
        Self { http_checker, tls_checker }
    }
}

#[async_trait::async_trait]
impl Prober for MonitoringExecutor {
    async fn probe(&self, target: &str) -> Probe {
        // Both run to completion regardless of how the other one ends.
        let (reachability, certificate) =
            tokio::join!(self.http_checker.check(target), self.tls_checker.check(target));

        Probe { reachability, certificate }
    }
}
