//! Background job scheduler (spec §4.13): price monitoring on an interval
//! and two cron-triggered jobs, registered against `tokio-cron-scheduler`
//! the way the teacher drives its own stream-sync jobs.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::error::{Error, Result};
use crate::notifications::NotificationManager;
use crate::pricing::{self, PriceMonitor};
use crate::product_search::CatalogGateway;

const PRICE_MONITORING_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
const DAILY_PRICE_CHECK_CRON: &str = "0 0 0 * * *";
const CLEANUP_PRICE_HISTORY_CRON: &str = "0 0 15 * * *";

pub struct Scheduler {
    db: PgPool,
    catalog: Arc<dyn CatalogGateway>,
    notifier: Arc<NotificationManager>,
    scheduler: JobScheduler,
}

impl Scheduler {
    pub async fn new(db: PgPool, catalog: Arc<dyn CatalogGateway>, notifier: Arc<NotificationManager>) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| Error::Other(format!("failed to create scheduler: {e}")))?;

        Ok(Self { db, catalog, notifier, scheduler })
    }

    /// Arms the default job set. Idempotent per spec §4.13 in the sense that
    /// each job awaits its own previous run to finish before firing again;
    /// `tokio-cron-scheduler` enforces this by running the job body inline.
    pub async fn start(&self) -> Result<()> {
        let price_monitoring = {
            let db = self.db.clone();
            let catalog = self.catalog.clone();
            let notifier = self.notifier.clone();
            Job::new_repeated_async(PRICE_MONITORING_INTERVAL, move |_uuid, _lock| {
                let db = db.clone();
                let catalog = catalog.clone();
                let notifier = notifier.clone();
                Box::pin(async move {
                    run_price_monitoring(&db, catalog.as_ref(), &notifier, "price_monitoring").await;
                })
            })
            .map_err(|e| Error::Other(format!("failed to create price_monitoring job: {e}")))?
        };
        self.scheduler
            .add(price_monitoring)
            .await
            .map_err(|e| Error::Other(format!("failed to add price_monitoring job: {e}")))?;

        let daily_price_check = {
            let db = self.db.clone();
            let catalog = self.catalog.clone();
            let notifier = self.notifier.clone();
            Job::new_async(DAILY_PRICE_CHECK_CRON, move |_uuid, _lock| {
                let db = db.clone();
                let catalog = catalog.clone();
                let notifier = notifier.clone();
                Box::pin(async move {
                    run_price_monitoring(&db, catalog.as_ref(), &notifier, "daily_price_check").await;
                })
            })
            .map_err(|e| Error::Other(format!("failed to create daily_price_check job: {e}")))?
        };
        self.scheduler
            .add(daily_price_check)
            .await
            .map_err(|e| Error::Other(format!("failed to add daily_price_check job: {e}")))?;

        let cleanup = {
            let db = self.db.clone();
            Job::new_async(CLEANUP_PRICE_HISTORY_CRON, move |_uuid, _lock| {
                let db = db.clone();
                Box::pin(async move {
                    tracing::info!("cleanup_price_history started");
                    match pricing::cleanup_price_history(&db).await {
                        Ok(deleted) => tracing::info!(deleted, "cleanup_price_history completed"),
                        Err(e) => tracing::error!(error = %e, "cleanup_price_history failed"),
                    }
                })
            })
            .map_err(|e| Error::Other(format!("failed to create cleanup_price_history job: {e}")))?
        };
        self.scheduler
            .add(cleanup)
            .await
            .map_err(|e| Error::Other(format!("failed to add cleanup_price_history job: {e}")))?;

        self.scheduler
            .start()
            .await
            .map_err(|e| Error::Other(format!("failed to start scheduler: {e}")))?;

        tracing::info!("scheduler started with 3 jobs");
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| Error::Other(format!("failed to stop scheduler: {e}")))?;
        tracing::info!("scheduler stopped");
        Ok(())
    }

    /// Manual trigger for `price_monitoring` (spec §4.13); blocks until the
    /// run completes and returns its summary.
    pub async fn trigger_price_monitoring(&self) -> Result<pricing::CheckAllResult> {
        let monitor = PriceMonitor::new(&self.db, self.catalog.as_ref(), &self.notifier);
        monitor.check_all_wishlist_prices().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_expressions_carry_a_seconds_field() {
        assert_eq!(DAILY_PRICE_CHECK_CRON.split_whitespace().count(), 6);
        assert_eq!(CLEANUP_PRICE_HISTORY_CRON.split_whitespace().count(), 6);
    }

    #[test]
    fn price_monitoring_interval_is_six_hours() {
        assert_eq!(PRICE_MONITORING_INTERVAL, Duration::from_secs(6 * 60 * 60));
    }
}

async fn run_price_monitoring(db: &PgPool, catalog: &dyn CatalogGateway, notifier: &NotificationManager, job_name: &str) {
    tracing::info!(job = job_name, "price monitoring job started");
    let monitor = PriceMonitor::new(db, catalog, notifier);
    match monitor.check_all_wishlist_prices().await {
        Ok(result) => tracing::info!(
            job = job_name,
            checked = result.checked,
            updated = result.updated,
            alerts_sent = result.alerts_sent,
            errors = result.errors,
            "price monitoring job completed"
        ),
        Err(e) => tracing::error!(job = job_name, error = %e, "price monitoring job failed"),
    }
}
