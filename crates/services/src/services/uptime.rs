//! Periodic HEAD probes of each task's domain.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use board_protocol::task::{Task, UptimeStatus};
use db::{DbErr, DbPool, models::task::TaskRepository};
use futures::future::join_all;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

pub const MAX_DOMAINS_PER_TICK: u64 = 100;
pub const BATCH_SIZE: usize = 20;
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const BATCH_PAUSE: Duration = Duration::from_millis(100);

#[async_trait]
pub trait Probe: Send + Sync {
    /// `true` when the site answered in time. Never fails.
    async fn probe(&self, url: &str) -> bool;
}

/// Plain HEAD request; anything below 500 counts as up.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .user_agent("vibeweb-uptime/1.0")
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> bool {
        let request = self.client.head(url).send();
        match tokio::time::timeout(PROBE_TIMEOUT, request).await {
            Ok(Ok(response)) => !response.status().is_server_error(),
            Ok(Err(err)) => {
                tracing::debug!(url, error = %err, "uptime probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(url, "uptime probe timed out");
                false
            }
        }
    }
}

/// URL to probe for a stored domain. Bare hosts are assumed to be HTTPS.
pub fn probe_url(domain: &str) -> Option<String> {
    let domain = domain.trim();
    if domain.is_empty() {
        return None;
    }
    let candidate = if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    };
    url::Url::parse(&candidate).ok().map(String::from)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UptimeReport {
    pub checked: usize,
    pub up: usize,
    pub down: usize,
}

#[derive(Clone)]
pub struct UptimeMonitor {
    db: DbPool,
    probe: Arc<dyn Probe>,
    batch_pause: Duration,
}

impl UptimeMonitor {
    pub fn new(db: DbPool, probe: Arc<dyn Probe>) -> Self {
        Self {
            db,
            probe,
            batch_pause: BATCH_PAUSE,
        }
    }

    /// One sweep: up to [`MAX_DOMAINS_PER_TICK`] tasks, probed
    /// [`BATCH_SIZE`] at a time.
    pub async fn run_once(&self) -> Result<UptimeReport, DbErr> {
        let tasks = TaskRepository::find_with_domain(&self.db, MAX_DOMAINS_PER_TICK).await?;
        let mut report = UptimeReport::default();

        for (index, batch) in tasks.chunks(BATCH_SIZE).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.batch_pause).await;
            }
            let results = join_all(batch.iter().map(|task| self.check(task))).await;
            for (task, status) in batch.iter().zip(results) {
                report.checked += 1;
                match status {
                    UptimeStatus::Up => report.up += 1,
                    UptimeStatus::Down => report.down += 1,
                }
                if let Err(err) = TaskRepository::set_uptime_status(&self.db, task.id, status).await
                {
                    tracing::warn!(task_id = task.id, error = %err, "failed to store uptime status");
                }
            }
        }

        Ok(report)
    }

    async fn check(&self, task: &Task) -> UptimeStatus {
        let Some(url) = task.domain.as_deref().and_then(probe_url) else {
            return UptimeStatus::Down;
        };
        if self.probe.probe(&url).await {
            UptimeStatus::Up
        } else {
            UptimeStatus::Down
        }
    }

    /// Runs a sweep every `interval` until `shutdown` flips to true. The first
    /// sweep happens one interval after start.
    pub fn spawn(self, interval: Duration, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tracing::info!("Uptime monitor interval set to {}s", interval.as_secs());
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                        continue;
                    }
                }
                match self.run_once().await {
                    Ok(report) => tracing::debug!(
                        checked = report.checked,
                        up = report.up,
                        down = report.down,
                        "uptime sweep finished"
                    ),
                    Err(err) => tracing::warn!(error = %err, "uptime sweep failed"),
                }
            }
            tracing::debug!("uptime monitor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use board_protocol::task::{Hosting, PaymentStatus, Stage};
    use db::models::task::TaskFields;
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    #[derive(Default)]
    struct FakeProbe {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Probe for FakeProbe {
        async fn probe(&self, url: &str) -> bool {
            self.seen.lock().unwrap().push(url.to_string());
            !url.contains("down")
        }
    }

    fn fields(client: &str, domain: Option<&str>) -> TaskFields {
        TaskFields {
            client: client.to_string(),
            contact: None,
            project_type: None,
            stack: None,
            domain: domain.map(str::to_string),
            description: None,
            price: 0.0,
            payment_status: PaymentStatus::Pending,
            deadline: None,
            deadline_timestamp: None,
            hosting: Hosting::Sim,
            col_id: Stage::Live,
            order_position: 0,
            is_recurring: false,
            assets_link: None,
            public_uuid: None,
        }
    }

    #[test]
    fn bare_domains_get_https() {
        assert_eq!(
            probe_url("acme.com").as_deref(),
            Some("https://acme.com/")
        );
        assert_eq!(
            probe_url("http://acme.com/shop").as_deref(),
            Some("http://acme.com/shop")
        );
        assert_eq!(probe_url("  "), None);
    }

    #[tokio::test]
    async fn sweep_records_status_per_task() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        let up = TaskRepository::create(&db, Some(1), None, &fields("Up", Some("acme.com")))
            .await
            .unwrap();
        let down = TaskRepository::create(&db, Some(2), None, &fields("Down", Some("down.acme.com")))
            .await
            .unwrap();
        let skipped = TaskRepository::create(&db, Some(3), None, &fields("None", None))
            .await
            .unwrap();

        let probe = Arc::new(FakeProbe::default());
        let monitor = UptimeMonitor::new(db.clone(), probe.clone());
        let report = monitor.run_once().await.unwrap();

        assert_eq!(report, UptimeReport { checked: 2, up: 1, down: 1 });
        assert_eq!(probe.seen.lock().unwrap().len(), 2);

        let status = |id| {
            let db = db.clone();
            async move {
                TaskRepository::find_by_id(&db, id)
                    .await
                    .unwrap()
                    .unwrap()
                    .uptime_status
            }
        };
        assert_eq!(status(up.id).await, Some(UptimeStatus::Up));
        assert_eq!(status(down.id).await, Some(UptimeStatus::Down));
        assert_eq!(status(skipped.id).await, None);
    }

    #[tokio::test]
    async fn sweep_is_capped_and_batched() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        for id in 1..=105 {
            TaskRepository::create(&db, Some(id), None, &fields("Site", Some("acme.com")))
                .await
                .unwrap();
        }

        let probe = Arc::new(FakeProbe::default());
        let mut monitor = UptimeMonitor::new(db, probe.clone());
        monitor.batch_pause = Duration::from_millis(1);
        let report = monitor.run_once().await.unwrap();
        assert_eq!(report.checked, MAX_DOMAINS_PER_TICK as usize);
    }

    #[tokio::test]
    async fn spawned_monitor_stops_on_shutdown() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        let (tx, rx) = watch::channel(false);
        let handle = UptimeMonitor::new(db, Arc::new(FakeProbe::default()))
            .spawn(Duration::from_secs(3600), rx);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
