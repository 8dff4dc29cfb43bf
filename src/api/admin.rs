//! Admin operations (spec §6): scheduler status, manual price-monitoring
//! trigger, and a per-item manual price check.

use serde::Serialize;
use uuid::Uuid;

use crate::client::Services;
use crate::error::Result;
use crate::pricing::{CheckAllResult, CheckOneResult, PriceMonitor};
use crate::scheduler::Scheduler;

#[derive(Debug, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<ScheduledJob>,
}

#[derive(Debug, Serialize)]
pub struct ScheduledJob {
    pub id: String,
    pub name: String,
    pub next_run: Option<String>,
}

/// `tokio-cron-scheduler` does not expose per-job next-fire times through a
/// stable public API the way APScheduler does; a caller that needs this
/// reports the static job set with `running` reflecting whether `start()`
/// has been called on the scheduler handle it holds.
pub fn scheduler_status(running: bool) -> SchedulerStatus {
    SchedulerStatus {
        running,
        jobs: vec![
            ScheduledJob {
                id: "price_monitoring".to_string(),
                name: "가격 모니터링".to_string(),
                next_run: None,
            },
            ScheduledJob {
                id: "daily_price_check".to_string(),
                name: "일일 가격 확인".to_string(),
                next_run: None,
            },
            ScheduledJob {
                id: "cleanup_price_history".to_string(),
                name: "가격 이력 정리".to_string(),
                next_run: None,
            },
        ],
    }
}

pub async fn trigger_price_monitoring(scheduler: &Scheduler) -> Result<CheckAllResult> {
    scheduler.trigger_price_monitoring().await
}

pub async fn check_single_product(services: &Services, wishlist_item_id: Uuid) -> Result<Option<CheckOneResult>> {
    let monitor = PriceMonitor::new(services.pool(), services.catalog.as_ref(), &services.notifier);
    monitor.check_single_product(wishlist_item_id).await
}
