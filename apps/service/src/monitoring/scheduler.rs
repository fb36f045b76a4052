use anyhow::{Context, Result};
use futures::{FutureExt, StreamExt, stream};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::classifier::classify;
use super::clock::{Clock, SystemClock};
use super::executor::{MonitoringExecutor, Prober};
use crate::config::MonitoringConfig;
use crate::database::MonitorStore;
use crate::database::models::{Monitor, Observation};

/// Counts for one completed sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Monitors in the listing snapshot taken at sweep start
    pub listed: usize,
    /// Monitors whose state update and history row were both written
    pub recorded: usize,
    /// Monitors skipped for this cycle because a write failed or the check panicked
    pub failed: usize,
}

/// Monitoring scheduler - runs a full sweep over every monitor on a fixed period
///
/// Idle until the timer fires, then sweeps all monitors from one listing
/// snapshot, then idle again. Stops only when the cancellation token fires;
/// a sweep already in progress runs to completion first.
pub struct MonitoringScheduler {
    store: Arc<dyn MonitorStore>,
    prober: Arc<dyn Prober>,
    clock: Arc<dyn Clock>,
    period: Duration,
    max_concurrent_checks: usize,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler that checks monitors one at a time
    pub fn new(store: Arc<dyn MonitorStore>, prober: Arc<dyn Prober>, period: Duration) -> Self {
        Self { store, prober, clock: Arc::new(SystemClock), period, max_concurrent_checks: 1 }
    }

    /// Network-backed scheduler configured from the `[monitoring]` section
    pub fn from_config(config: &MonitoringConfig, store: Arc<dyn MonitorStore>) -> Result<Self> {
        let executor = MonitoringExecutor::new(config.timeout())?;
        Ok(Self::new(store, Arc::new(executor), config.interval())
            .with_max_concurrent_checks(config.max_concurrent_checks))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Probe up to `limit` monitors at once within a sweep
    pub fn with_max_concurrent_checks(mut self, limit: usize) -> Self {
        self.max_concurrent_checks = limit.max(1);
        self
    }

    /// Run one sweep.
    ///
    /// Fails only when the listing itself fails; per-monitor failures are
    /// logged and counted in the report.
    pub async fn run_sweep(&self) -> Result<SweepReport> {
        let monitors = self.store.list_monitors().await.context("Failed to list monitors")?;
        let listed = monitors.len();
        debug!(listed, "Starting sweep");

        let recorded = stream::iter(monitors)
            .map(|monitor| self.check_isolated(monitor))
            .buffer_unordered(self.max_concurrent_checks)
            .filter(|recorded| futures::future::ready(*recorded))
            .count()
            .await;

        Ok(SweepReport { listed, recorded, failed: listed - recorded })
    }

    /// Probe, classify and persist one monitor.
    ///
    /// The update and the history append for one monitor always happen in this
    /// order within a single future, so writes per monitor id never interleave.
    async fn check_monitor(&self, monitor: &Monitor) -> Result<Observation> {
        let checked_at = self.clock.now();
        let probe = self.prober.probe(&monitor.url).await;
        let observation = classify(monitor.id, &probe, checked_at);

        self.store
            .update_monitor(monitor.id, observation.status, observation.ssl_expiry, checked_at)
            .await
            .context("Failed to update monitor")?;

        self.store
            .append_history(&observation)
            .await
            .context("Failed to insert monitor history")?;

        Ok(observation)
    }

    async fn check_isolated(&self, monitor: Monitor) -> bool {
        match AssertUnwindSafe(self.check_monitor(&monitor)).catch_unwind().await {
            Ok(Ok(observation)) => {
                debug!(
                    monitor_id = monitor.id,
                    url = %monitor.url,
                    status = %observation.status,
                    ssl_expiry = %observation.ssl_expiry,
                    "Monitor checked"
                );
                true
            }
            Ok(Err(e)) => {
                warn!(monitor_id = monitor.id, url = %monitor.url, "{e:#}");
                false
            }
            Err(_) => {
                error!(monitor_id = monitor.id, url = %monitor.url, "Monitor check panicked");
                false
            }
        }
    }

    /// Sweep every `period` until `shutdown` is cancelled.
    ///
    /// The first sweep happens one period after start.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut timer = interval_at(Instant::now() + self.period, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_ms = self.period.as_millis() as u64, "Monitoring scheduler started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            match self.run_sweep().await {
                Ok(report) => info!(
                    listed = report.listed,
                    recorded = report.recorded,
                    failed = report.failed,
                    "Sweep completed"
                ),
                Err(e) => error!("Skipping sweep: {e:#}"),
            }
        }

        info!("Monitoring scheduler stopped");
    }

    /// Spawn [`run`](Self::run) as a background task
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{
        CertExpiry, CertificateOutcome, MonitorStatus, Probe, Reachability,
    };
    use anyhow::anyhow;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct State {
        monitors: BTreeMap<i64, Monitor>,
        history: Vec<Observation>,
        next_id: i64,
    }

    /// In-memory store with failure injection
    #[derive(Default)]
    struct MemoryStore {
        state: Mutex<State>,
        fail_list: AtomicBool,
        fail_update: Mutex<HashSet<i64>>,
        fail_append: Mutex<HashSet<i64>>,
    }

    impl MemoryStore {
        fn with_urls(urls: &[&str]) -> Arc<Self> {
            let store = Self::default();
            {
                let mut state = store.state.lock().unwrap();
                for url in urls {
                    state.next_id += 1;
                    let id = state.next_id;
                    state.monitors.insert(
                        id,
                        Monitor {
                            id,
                            url: url.to_string(),
                            status: None,
                            ssl_expiry: None,
                            last_checked: None,
                        },
                    );
                }
            }
            Arc::new(store)
        }

        fn monitor(&self, id: i64) -> Monitor {
            self.state.lock().unwrap().monitors[&id].clone()
        }

        fn history_of(&self, id: i64) -> Vec<Observation> {
            let state = self.state.lock().unwrap();
            state.history.iter().filter(|o| o.monitor_id == id).cloned().collect()
        }

        fn history_len(&self) -> usize {
            self.state.lock().unwrap().history.len()
        }
    }

    #[async_trait::async_trait]
    impl MonitorStore for MemoryStore {
        async fn list_monitors(&self) -> Result<Vec<Monitor>> {
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(anyhow!("connection reset"));
            }
            Ok(self.state.lock().unwrap().monitors.values().cloned().collect())
        }

        async fn get_monitor(&self, id: i64) -> Result<Option<Monitor>> {
            Ok(self.state.lock().unwrap().monitors.get(&id).cloned())
        }

        async fn create_monitor(&self, url: &str) -> Result<Monitor> {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let monitor = Monitor {
                id: state.next_id,
                url: url.to_string(),
                status: None,
                ssl_expiry: None,
                last_checked: None,
            };
            state.monitors.insert(monitor.id, monitor.clone());
            Ok(monitor)
        }

        async fn delete_monitor(&self, id: i64) -> Result<bool> {
            let mut state = self.state.lock().unwrap();
            state.history.retain(|o| o.monitor_id != id);
            Ok(state.monitors.remove(&id).is_some())
        }

        async fn update_monitor(
            &self,
            id: i64,
            status: MonitorStatus,
            ssl_expiry: CertExpiry,
            checked_at: DateTime<Utc>,
        ) -> Result<()> {
            if self.fail_update.lock().unwrap().contains(&id) {
                return Err(anyhow!("disk full"));
            }
            let mut state = self.state.lock().unwrap();
            let monitor = state.monitors.get_mut(&id).ok_or_else(|| anyhow!("missing"))?;
            monitor.status = Some(status);
            monitor.ssl_expiry = Some(ssl_expiry);
            monitor.last_checked = Some(checked_at);
            Ok(())
        }

        async fn append_history(&self, observation: &Observation) -> Result<()> {
            if self.fail_append.lock().unwrap().contains(&observation.monitor_id) {
                return Err(anyhow!("disk full"));
            }
            self.state.lock().unwrap().history.push(observation.clone());
            Ok(())
        }

        async fn query_history(&self, monitor_id: i64) -> Result<Vec<Observation>> {
            Ok(self.history_of(monitor_id))
        }
    }

    /// Prober answering from a table; unknown targets are up without a certificate
    #[derive(Default)]
    struct FakeProber {
        probes: HashMap<String, Probe>,
        panics_on: HashSet<String>,
    }

    impl FakeProber {
        fn with(
            mut self,
            url: &str,
            reachability: Reachability,
            certificate: CertificateOutcome,
        ) -> Self {
            self.probes.insert(url.to_string(), Probe { reachability, certificate });
            self
        }
    }

    #[async_trait::async_trait]
    impl Prober for FakeProber {
        async fn probe(&self, target: &str) -> Probe {
            if self.panics_on.contains(target) {
                panic!("prober blew up on {target}");
            }
            self.probes.get(target).cloned().unwrap_or(Probe {
                reachability: Reachability::Responded(200),
                certificate: CertificateOutcome::NoCertificate,
            })
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn scheduler(store: Arc<MemoryStore>, prober: FakeProber) -> MonitoringScheduler {
        MonitoringScheduler::new(store, Arc::new(prober), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_sweep_writes_one_update_and_one_record_per_monitor() {
        let store = MemoryStore::with_urls(&["a.example", "b.example", "c.example"]);
        let expiry = Utc.with_ymd_and_hms(2027, 3, 1, 0, 0, 0).unwrap();
        let prober = FakeProber::default()
            .with("a.example", Reachability::Responded(200), CertificateOutcome::Expires(expiry))
            .with("b.example", Reachability::Responded(404), CertificateOutcome::NoCertificate)
            .with(
                "c.example",
                Reachability::Failed("timeout".into()),
                CertificateOutcome::Failed("timeout".into()),
            );

        let report = scheduler(store.clone(), prober).run_sweep().await.unwrap();

        assert_eq!(report, SweepReport { listed: 3, recorded: 3, failed: 0 });
        assert_eq!(store.history_len(), 3);

        let a = store.monitor(1);
        assert_eq!(a.status, Some(MonitorStatus::Up));
        assert_eq!(a.ssl_expiry, Some(CertExpiry::Expires(expiry)));

        let b = store.monitor(2);
        assert_eq!(b.status.unwrap().to_string(), "DOWN_HTTP_404");
        assert_eq!(b.ssl_expiry.unwrap().to_string(), "no certificate found");

        let c = store.monitor(3);
        assert_eq!(c.status, Some(MonitorStatus::DownTimeoutOrError));
        assert_eq!(c.ssl_expiry.unwrap().to_string(), "error or timeout checking SSL");
    }

    #[tokio::test]
    async fn test_failed_write_on_one_monitor_does_not_stop_the_sweep() {
        let store = MemoryStore::with_urls(&["a.example", "b.example", "c.example"]);
        store.fail_update.lock().unwrap().insert(1);
        store.fail_append.lock().unwrap().insert(2);

        let report = scheduler(store.clone(), FakeProber::default()).run_sweep().await.unwrap();

        assert_eq!(report, SweepReport { listed: 3, recorded: 1, failed: 2 });

        // A failed update skips that monitor's history row for the cycle.
        assert!(store.monitor(1).is_pending());
        assert!(store.history_of(1).is_empty());

        // The update for b landed even though its history append failed.
        assert_eq!(store.monitor(2).status, Some(MonitorStatus::Up));
        assert!(store.history_of(2).is_empty());

        assert_eq!(store.monitor(3).status, Some(MonitorStatus::Up));
        assert_eq!(store.history_of(3).len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_isolated() {
        let store = MemoryStore::with_urls(&["boom.example", "fine.example"]);
        let mut prober = FakeProber::default();
        prober.panics_on.insert("boom.example".to_string());

        let report = scheduler(store.clone(), prober).run_sweep().await.unwrap();

        assert_eq!(report, SweepReport { listed: 2, recorded: 1, failed: 1 });
        assert_eq!(store.monitor(2).status, Some(MonitorStatus::Up));
    }

    #[tokio::test]
    async fn test_listing_failure_skips_the_sweep() {
        let store = MemoryStore::with_urls(&["a.example"]);
        store.fail_list.store(true, Ordering::SeqCst);

        let result = scheduler(store.clone(), FakeProber::default()).run_sweep().await;

        assert!(result.is_err());
        assert_eq!(store.history_len(), 0);
        assert!(store.monitor(1).is_pending());
    }

    #[tokio::test]
    async fn test_state_and_history_share_one_timestamp() {
        let store = MemoryStore::with_urls(&["a.example"]);
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap();

        scheduler(store.clone(), FakeProber::default())
            .with_clock(Arc::new(FixedClock(now)))
            .run_sweep()
            .await
            .unwrap();

        let monitor = store.monitor(1);
        let history = store.history_of(1);
        assert_eq!(monitor.last_checked, Some(now));
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].checked_at, now);
        assert_eq!(Some(history[0].status), monitor.status);
    }

    #[tokio::test]
    async fn test_concurrent_sweep_records_every_monitor() {
        let urls: Vec<String> = (0..20).map(|i| format!("host{i}.example")).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let store = MemoryStore::with_urls(&refs);

        let report = scheduler(store.clone(), FakeProber::default())
            .with_max_concurrent_checks(8)
            .run_sweep()
            .await
            .unwrap();

        assert_eq!(report.recorded, 20);
        for id in 1..=20 {
            assert_eq!(store.history_of(id).len(), 1);
        }
    }

    #[tokio::test]
    async fn test_empty_store_sweeps_nothing() {
        let store = MemoryStore::with_urls(&[]);
        let report = scheduler(store, FakeProber::default()).run_sweep().await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_waits_one_period_then_sweeps_until_cancelled() {
        let store = MemoryStore::with_urls(&["a.example"]);
        let shutdown = CancellationToken::new();
        let handle = scheduler(store.clone(), FakeProber::default()).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(store.history_len(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.history_len(), 2);

        shutdown.cancel();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.history_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_listing_failures() {
        let store = MemoryStore::with_urls(&["a.example"]);
        store.fail_list.store(true, Ordering::SeqCst);
        let shutdown = CancellationToken::new();
        let handle = scheduler(store.clone(), FakeProber::default()).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(11_000)).await;
        assert_eq!(store.history_len(), 0);
        assert!(!handle.is_finished());

        store.fail_list.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.history_len(), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
