//! Certificate and availability monitoring engine.
//!
//! Monitors are swept on a fixed period: each one gets an HTTP reachability
//! check and an independent TLS certificate check, the outcomes are
//! classified, and the result is written back as current state plus one
//! history row.

pub mod config;
pub mod database;
pub mod history;
pub mod monitoring;
pub mod pool;

pub use config::Config;
pub use database::models::{Monitor, Observation};
pub use database::{DatabaseImpl, MonitorStore};
pub use history::{HistoryError, history};
pub use monitoring::{CertExpiry, MonitorStatus, MonitoringScheduler, SweepReport};
