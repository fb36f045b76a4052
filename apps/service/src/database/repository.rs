use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Row, params};

use super::models::{Monitor, Observation, i64_to_timestamp, timestamp_to_i64};
use crate::monitoring::types::{CertExpiry, MonitorStatus};
use crate::pool::LibsqlPool;

/// Store contract shared by the sweep scheduler, the history query and the
/// request handlers. Every operation stands on its own; none of them spans a
/// transaction across calls.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Snapshot of all monitors, ordered by id. Rows that cannot be decoded
    /// are logged and left out.
    async fn list_monitors(&self) -> Result<Vec<Monitor>>;

    /// Get a monitor by id
    async fn get_monitor(&self, id: i64) -> Result<Option<Monitor>>;

    /// Register a new monitor in the pending state
    async fn create_monitor(&self, url: &str) -> Result<Monitor>;

    /// Delete a monitor and its history; `false` when no such monitor exists
    async fn delete_monitor(&self, id: i64) -> Result<bool>;

    /// Overwrite the current state of one monitor
    async fn update_monitor(
        &self,
        id: i64,
        status: MonitorStatus,
        ssl_expiry: CertExpiry,
        checked_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Append one history row
    async fn append_history(&self, observation: &Observation) -> Result<()>;

    /// History of one monitor, oldest first
    async fn query_history(&self, monitor_id: i64) -> Result<Vec<Observation>>;
}

/// LibSQL database implementation
pub struct DatabaseImpl {
    pool: LibsqlPool,
}

impl DatabaseImpl {
    /// Create a new database instance from a pool
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    /// Get a connection from the pool
    async fn get_conn(&self) -> Result<deadpool::managed::Object<crate::pool::LibsqlManager>> {
        self.pool.get().await.map_err(|e| anyhow!("Failed to get database connection: {e}"))
    }
}

const MONITOR_COLUMNS: &str = "id, url, status, ssl_expiry, last_checked";

fn monitor_from_row(row: &Row) -> Result<Monitor> {
    let status: Option<String> = row.get(2)?;
    let ssl_expiry: Option<String> = row.get(3)?;
    let last_checked: Option<i64> = row.get(4)?;

    Ok(Monitor {
        id: row.get(0)?,
        url: row.get(1)?,
        status: status.map(|s| s.parse::<MonitorStatus>()).transpose()?,
        ssl_expiry: ssl_expiry.map(|s| s.parse::<CertExpiry>()).transpose()?,
        last_checked: last_checked.map(i64_to_timestamp).transpose()?,
    })
}

#[async_trait]
impl MonitorStore for DatabaseImpl {
    async fn list_monitors(&self) -> Result<Vec<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {MONITOR_COLUMNS} FROM monitors ORDER BY id"))
            .await?;

        let mut rows = stmt.query(()).await?;
        let mut monitors = Vec::new();

        while let Some(row) = rows.next().await? {
            match monitor_from_row(&row) {
                Ok(monitor) => monitors.push(monitor),
                // One undecodable row must not hide the rest of the listing.
                Err(e) => {
                    let id = row.get::<i64>(0).ok();
                    tracing::warn!(monitor_id = ?id, "Skipping unreadable monitor row: {e:#}");
                }
            }
        }

        Ok(monitors)
    }

    async fn get_monitor(&self, id: i64) -> Result<Option<Monitor>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(&format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE id = ?"))
            .await?;

        let mut rows = stmt.query(params![id]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(monitor_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_monitor(&self, url: &str) -> Result<Monitor> {
        let conn = self.get_conn().await?;
        let created_at = timestamp_to_i64(Utc::now());

        conn.execute(
            "INSERT INTO monitors (url, created_at) VALUES (?, ?)",
            params![url, created_at],
        )
        .await?;

        Ok(Monitor {
            id: conn.last_insert_rowid(),
            url: url.to_string(),
            status: None,
            ssl_expiry: None,
            last_checked: None,
        })
    }

    async fn delete_monitor(&self, id: i64) -> Result<bool> {
        let conn = self.get_conn().await?;

        // History goes first so the delete does not depend on the cascade.
        conn.execute("DELETE FROM monitor_history WHERE monitor_id = ?", params![id])
            .await
            .context("Failed to delete monitor history")?;

        let deleted = conn
            .execute("DELETE FROM monitors WHERE id = ?", params![id])
            .await
            .context("Failed to delete monitor")?;

        Ok(deleted > 0)
    }

    async fn update_monitor(
        &self,
        id: i64,
        status: MonitorStatus,
        ssl_expiry: CertExpiry,
        checked_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.get_conn().await?;

        let updated = conn
            .execute(
                "UPDATE monitors SET status = ?, ssl_expiry = ?, last_checked = ? WHERE id = ?",
                params![
                    status.to_string(),
                    ssl_expiry.to_string(),
                    timestamp_to_i64(checked_at),
                    id
                ],
            )
            .await?;

        if updated == 0 {
            return Err(anyhow!("Monitor {id} no longer exists"));
        }

        Ok(())
    }

    async fn append_history(&self, observation: &Observation) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.execute(
            "INSERT INTO monitor_history (monitor_id, status, ssl_expiry, checked_at) VALUES (?, ?, ?, ?)",
            params![
                observation.monitor_id,
                observation.status.to_string(),
                observation.ssl_expiry.to_string(),
                timestamp_to_i64(observation.checked_at)
            ],
        )
        .await?;

        Ok(())
    }

    async fn query_history(&self, monitor_id: i64) -> Result<Vec<Observation>> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(
                "SELECT monitor_id, status, ssl_expiry, checked_at FROM monitor_history \
                 WHERE monitor_id = ? ORDER BY checked_at ASC, id ASC",
            )
            .await?;

        let mut rows = stmt.query(params![monitor_id]).await?;
        let mut history = Vec::new();

        while let Some(row) = rows.next().await? {
            let status: String = row.get(1)?;
            let ssl_expiry: String = row.get(2)?;
            let checked_at: i64 = row.get(3)?;

            history.push(Observation {
                monitor_id: row.get(0)?,
                status: status.parse()?,
                ssl_expiry: ssl_expiry.parse()?,
                checked_at: i64_to_timestamp(checked_at)?,
            });
        }

        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{LibsqlPool, open_local};
    use chrono::{Duration, TimeZone};
    use tempfile::{TempDir, tempdir};

    /// Helper to create test database pool; the directory must outlive the pool
    async fn create_test_database() -> Result<(LibsqlPool, TempDir)> {
        let temp_dir = tempdir()?;
        let db_path = temp_dir.path().join("test.db");

        let pool = open_local(db_path.to_string_lossy().as_ref(), 4).await?;

        let conn = pool.get().await.map_err(|e| anyhow!("{e}"))?;
        crate::database::initialize_database(&conn).await?;

        Ok((pool, temp_dir))
    }

    #[tokio::test]
    async fn test_create_and_list_pending_monitors() -> Result<()> {
        let (pool, _dir) = create_test_database().await?;
        let store = DatabaseImpl::new_from_pool(pool);

        let first = store.create_monitor("example.com").await?;
        let second = store.create_monitor("https://example.org").await?;
        assert_ne!(first.id, second.id);

        let monitors = store.list_monitors().await?;
        assert_eq!(monitors, vec![first.clone(), second]);
        assert!(monitors[0].is_pending());
        assert_eq!(store.get_monitor(first.id).await?, Some(first));
        assert_eq!(store.get_monitor(9999).await?, None);

        Ok(())
    }

    /// Corrupt one column of a stored monitor behind the store's back.
    async fn write_raw(pool: &LibsqlPool, sql: &str, id: i64) -> Result<()> {
        let conn = pool.get().await.map_err(|e| anyhow!("{e}"))?;
        conn.execute(sql, params![id]).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_list_skips_undecodable_rows() -> Result<()> {
        let (pool, _dir) = create_test_database().await?;
        let store = DatabaseImpl::new_from_pool(pool.clone());

        let good = store.create_monitor("example.com").await?;
        let bad_status = store.create_monitor("example.org").await?;
        let bad_timestamp = store.create_monitor("example.net").await?;
        write_raw(
            &pool,
            "UPDATE monitors SET status = 'DOWN (HTTP 404)' WHERE id = ?",
            bad_status.id,
        )
        .await?;
        write_raw(
            &pool,
            "UPDATE monitors SET last_checked = 9223372036854775807 WHERE id = ?",
            bad_timestamp.id,
        )
        .await?;

        assert_eq!(store.list_monitors().await?, vec![good]);
        assert!(store.get_monitor(bad_status.id).await.is_err());
        assert!(store.get_monitor(bad_timestamp.id).await.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_update_overwrites_current_state() -> Result<()> {
        let (pool, _dir) = create_test_database().await?;
        let store = DatabaseImpl::new_from_pool(pool);
        let monitor = store.create_monitor("example.com").await?;

        let checked_at = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let expiry = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
        store
            .update_monitor(monitor.id, MonitorStatus::Up, CertExpiry::Expires(expiry), checked_at)
            .await?;
        store
            .update_monitor(
                monitor.id,
                MonitorStatus::DownHttp(502),
                CertExpiry::Error,
                checked_at + Duration::seconds(5),
            )
            .await?;

        let stored = store.get_monitor(monitor.id).await?.unwrap();
        assert_eq!(stored.status, Some(MonitorStatus::DownHttp(502)));
        assert_eq!(stored.ssl_expiry, Some(CertExpiry::Error));
        assert_eq!(stored.last_checked, Some(checked_at + Duration::seconds(5)));

        Ok(())
    }

    #[tokio::test]
    async fn test_update_of_missing_monitor_fails() -> Result<()> {
        let (pool, _dir) = create_test_database().await?;
        let store = DatabaseImpl::new_from_pool(pool);

        let result =
            store.update_monitor(42, MonitorStatus::Up, CertExpiry::NoCertificate, Utc::now()).await;
        assert!(result.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_history_is_oldest_first() -> Result<()> {
        let (pool, _dir) = create_test_database().await?;
        let store = DatabaseImpl::new_from_pool(pool);
        let monitor = store.create_monitor("example.com").await?;

        let base = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        // Appended out of order on purpose.
        let rows = [
            (10, MonitorStatus::Up),
            (0, MonitorStatus::DownTimeoutOrError),
            (5, MonitorStatus::DownHttp(500)),
        ];
        for (offset, status) in rows {
            store
                .append_history(&Observation {
                    monitor_id: monitor.id,
                    status,
                    ssl_expiry: CertExpiry::Error,
                    checked_at: base + Duration::seconds(offset),
                })
                .await?;
        }

        let history = store.query_history(monitor.id).await?;
        let statuses: Vec<_> = history.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![MonitorStatus::DownTimeoutOrError, MonitorStatus::DownHttp(500), MonitorStatus::Up]
        );
        assert!(history.windows(2).all(|w| w[0].checked_at <= w[1].checked_at));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_removes_monitor_and_history() -> Result<()> {
        let (pool, _dir) = create_test_database().await?;
        let store = DatabaseImpl::new_from_pool(pool);
        let monitor = store.create_monitor("example.com").await?;
        store
            .append_history(&Observation {
                monitor_id: monitor.id,
                status: MonitorStatus::Up,
                ssl_expiry: CertExpiry::NoCertificate,
                checked_at: Utc::now(),
            })
            .await?;

        assert!(store.delete_monitor(monitor.id).await?);
        assert!(store.get_monitor(monitor.id).await?.is_none());
        assert!(store.query_history(monitor.id).await?.is_empty());

        assert!(!store.delete_monitor(monitor.id).await?);

        Ok(())
    }
}
