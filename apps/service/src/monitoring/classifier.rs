//! Maps raw probe outcomes onto the persisted status taxonomy.

use chrono::{DateTime, Utc};

use super::types::{CertExpiry, CertificateOutcome, MonitorStatus, Probe, Reachability};
use crate::database::models::Observation;

pub fn classify_reachability(reachability: &Reachability) -> MonitorStatus {
    match reachability {
        Reachability::Responded(code) if (200..=299).contains(code) => MonitorStatus::Up,
        Reachability::Responded(code) => MonitorStatus::DownHttp(*code),
        Reachability::Failed(_) => MonitorStatus::DownTimeoutOrError,
    }
}

pub fn classify_certificate(certificate: &CertificateOutcome) -> CertExpiry {
    match certificate {
        CertificateOutcome::Expires(at) => CertExpiry::Expires(*at),
        CertificateOutcome::NoCertificate => CertExpiry::NoCertificate,
        CertificateOutcome::Failed(_) => CertExpiry::Error,
    }
}

/// Build the observation for one monitor.
///
/// `checked_at` is captured by the caller before probing and is the only
/// timestamp that ends up in the record.
pub fn classify(monitor_id: i64, probe: &Probe, checked_at: DateTime<Utc>) -> Observation {
    Observation {
        monitor_id,
        status: classify_reachability(&probe.reachability),
        ssl_expiry: classify_certificate(&probe.certificate),
        checked_at,
    }
}
