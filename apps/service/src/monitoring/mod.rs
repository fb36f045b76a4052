/// Monitoring engine module - probes targets and records what it saw
///
/// This module is responsible for:
/// - Normalizing monitor addresses
/// - Running the HTTP reachability and TLS certificate checks
/// - Classifying raw outcomes into statuses
/// - Sweeping every monitor on a fixed period
pub mod address;
pub mod checker;
pub mod classifier;
pub mod clock;
pub mod executor;
pub mod scheduler;
pub mod types;

pub use clock::{Clock, SystemClock};
pub use executor::{MonitoringExecutor, Prober};
pub use scheduler::{MonitoringScheduler, SweepReport};
pub use types::{CertExpiry, MonitorStatus};
