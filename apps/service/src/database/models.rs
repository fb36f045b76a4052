use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::types::{CertExpiry, MonitorStatus};

/// Monitor model - a tracked endpoint and its latest checked state
///
/// `status`, `ssl_expiry` and `last_checked` stay `None` until the first sweep
/// that reaches the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i64,
    pub url: String,
    pub status: Option<MonitorStatus>,
    pub ssl_expiry: Option<CertExpiry>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl Monitor {
    pub fn is_pending(&self) -> bool {
        self.last_checked.is_none()
    }
}

/// Observation model - one immutable history row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub monitor_id: i64,
    pub status: MonitorStatus,
    pub ssl_expiry: CertExpiry,
    pub checked_at: DateTime<Utc>,
}

/// Convert a UTC timestamp to Unix milliseconds for storage
pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert stored Unix milliseconds back to a UTC timestamp
pub fn i64_to_timestamp(millis: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow::anyhow!("Stored timestamp {millis} is out of range"))
}
