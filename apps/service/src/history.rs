//! History lookups for a single monitor.
//!
//! An unknown monitor and a known monitor that has not been swept yet are
//! reported as two different errors. Callers that only care about "nothing to
//! show" can use [`HistoryError::is_not_found`].

use thiserror::Error;

use crate::database::MonitorStore;
use crate::database::models::Observation;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Monitor {0} not found")]
    MonitorNotFound(i64),

    #[error("Monitor {0} has no recorded history")]
    NoHistory(i64),

    #[error("Failed to retrieve monitor history: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl HistoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, HistoryError::MonitorNotFound(_) | HistoryError::NoHistory(_))
    }
}

/// Observations for `monitor_id`, oldest first. Never returns an empty list.
pub async fn history(
    store: &dyn MonitorStore,
    monitor_id: i64,
) -> Result<Vec<Observation>, HistoryError> {
    let observations = store.query_history(monitor_id).await?;

    if !observations.is_empty() {
        return Ok(observations);
    }

    match store.get_monitor(monitor_id).await? {
        Some(_) => {
            tracing::debug!(monitor_id, "No history recorded yet");
            Err(HistoryError::NoHistory(monitor_id))
        }
        None => {
            tracing::debug!(monitor_id, "History requested for unknown monitor");
            Err(HistoryError::MonitorNotFound(monitor_id))
        }
    }
}
