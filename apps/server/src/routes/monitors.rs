use actix_web::{HttpResponse, Responder, delete, get, post, web};
use certwatch_service::monitoring::address::clean_address;
use certwatch_service::{CertExpiry, MonitorStatus, MonitorStore, Observation, history};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

macros_utils::routes! {
    route list_monitors,
    route create_monitor,
    route delete_monitor,
    route monitor_history,
}

#[derive(Debug, Deserialize)]
pub struct CreateMonitorRequest {
    pub url: String,
}

/// One history row as served to clients
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: MonitorStatus,
    pub ssl_expiry: CertExpiry,
    pub checked_at: DateTime<Utc>,
}

impl From<Observation> for HistoryEntry {
    fn from(observation: Observation) -> Self {
        Self {
            status: observation.status,
            ssl_expiry: observation.ssl_expiry,
            checked_at: observation.checked_at,
        }
    }
}

#[get("/monitors")]
pub async fn list_monitors(
    store: web::Data<dyn MonitorStore>,
) -> Result<impl Responder, ApiError> {
    let monitors = store.list_monitors().await?;
    Ok(HttpResponse::Ok().json(monitors))
}

/// Register a monitor. It stays pending until the next sweep reaches it.
#[post("/monitors")]
pub async fn create_monitor(
    store: web::Data<dyn MonitorStore>,
    body: web::Json<CreateMonitorRequest>,
) -> Result<impl Responder, ApiError> {
    let url = clean_address(&body.url)
        .ok_or_else(|| ApiError::BadRequest("url must not be empty".into()))?;

    let monitor = store.create_monitor(url).await?;
    tracing::info!(monitor_id = monitor.id, url = %monitor.url, "Monitor registered");

    Ok(HttpResponse::Created().json(monitor))
}

#[delete("/monitors/{id}")]
pub async fn delete_monitor(
    store: web::Data<dyn MonitorStore>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let id = path.into_inner();

    if !store.delete_monitor(id).await? {
        return Err(ApiError::NotFound(format!("Monitor {id} not found")));
    }
    tracing::info!(monitor_id = id, "Monitor deleted");

    Ok(HttpResponse::NoContent().finish())
}

#[get("/monitors/{id}/history")]
pub async fn monitor_history(
    store: web::Data<dyn MonitorStore>,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let observations = history(store.get_ref(), path.into_inner()).await?;
    let entries: Vec<HistoryEntry> = observations.into_iter().map(HistoryEntry::from).collect();

    Ok(HttpResponse::Ok().json(entries))
}
