use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Layout used when persisting and displaying certificate expiry times.
pub const EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const NO_CERTIFICATE: &str = "no certificate found";
const CERTIFICATE_ERROR: &str = "error or timeout checking SSL";

/// Status of a monitor after its most recent check.
///
/// A monitor that has never been checked carries no status at all
/// (`Option::None`), so there is no pending variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MonitorStatus {
    Up,
    DownTimeoutOrError,
    DownHttp(u16),
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorStatus::Up => write!(f, "UP"),
            MonitorStatus::DownTimeoutOrError => write!(f, "DOWN_TIMEOUT_OR_ERROR"),
            MonitorStatus::DownHttp(code) => write!(f, "DOWN_HTTP_{code}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised value: {0:?}")]
pub struct ParseValueError(pub String);

impl FromStr for MonitorStatus {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UP" => Ok(MonitorStatus::Up),
            "DOWN_TIMEOUT_OR_ERROR" => Ok(MonitorStatus::DownTimeoutOrError),
            other => other
                .strip_prefix("DOWN_HTTP_")
                .and_then(|code| code.parse().ok())
                .map(MonitorStatus::DownHttp)
                .ok_or_else(|| ParseValueError(other.to_string())),
        }
    }
}

impl From<MonitorStatus> for String {
    fn from(status: MonitorStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for MonitorStatus {
    type Error = ParseValueError;

    fn try_from(value: String) -> Result<Self, ParseValueError> {
        value.parse()
    }
}

/// Certificate health as recorded on a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CertExpiry {
    /// Leaf certificate `notAfter`, second precision.
    Expires(DateTime<Utc>),
    NoCertificate,
    Error,
}

impl fmt::Display for CertExpiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertExpiry::Expires(at) => write!(f, "{}", at.format(EXPIRY_FORMAT)),
            CertExpiry::NoCertificate => f.write_str(NO_CERTIFICATE),
            CertExpiry::Error => f.write_str(CERTIFICATE_ERROR),
        }
    }
}

impl FromStr for CertExpiry {
    type Err = ParseValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            NO_CERTIFICATE => Ok(CertExpiry::NoCertificate),
            CERTIFICATE_ERROR => Ok(CertExpiry::Error),
            other => NaiveDateTime::parse_from_str(other, EXPIRY_FORMAT)
                .map(|naive| CertExpiry::Expires(naive.and_utc()))
                .map_err(|_| ParseValueError(other.to_string())),
        }
    }
}

impl From<CertExpiry> for String {
    fn from(expiry: CertExpiry) -> Self {
        expiry.to_string()
    }
}

impl TryFrom<String> for CertExpiry {
    type Error = ParseValueError;

    fn try_from(value: String) -> Result<Self, ParseValueError> {
        value.parse()
    }
}

/// Raw outcome of the HTTP reachability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reachability {
    /// The target answered with this status code.
    Responded(u16),
    /// Transport error or timeout.
    Failed(String),
}

/// Raw outcome of the TLS certificate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateOutcome {
    Expires(DateTime<Utc>),
    NoCertificate,
    Failed(String),
}

/// Both raw outcomes for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub reachability: Reachability,
    pub certificate: CertificateOutcome,
}
