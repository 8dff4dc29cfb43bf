//! Price monitor (spec §4.11): rechecks wishlist prices against the catalog,
//! records history, and hands off to the notification dispatcher.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{PriceHistory, WishlistItem, PRICE_HISTORY_RETENTION_DAYS};
use crate::notifications::NotificationManager;
use crate::product_search::{CatalogGateway, SearchParams};

const CHECK_DISPLAY: usize = 5;
const LOOKBACK_DAYS: i64 = 90;

#[derive(Debug, Default, serde::Serialize)]
pub struct CheckAllResult {
    pub checked: u32,
    pub updated: u32,
    pub alerts_sent: u32,
    pub errors: u32,
}

pub struct CheckOneResult {
    pub current_price: i64,
    pub lowest_90days: i64,
    pub updated: bool,
}

pub struct PriceMonitor<'a> {
    pool: &'a PgPool,
    catalog: &'a dyn CatalogGateway,
    notifier: &'a NotificationManager,
}

impl<'a> PriceMonitor<'a> {
    pub fn new(pool: &'a PgPool, catalog: &'a dyn CatalogGateway, notifier: &'a NotificationManager) -> Self {
        PriceMonitor { pool, catalog, notifier }
    }

    pub async fn check_all_wishlist_prices(&self) -> Result<CheckAllResult> {
        let items: Vec<WishlistItem> = sqlx::query_as(
            "SELECT * FROM wishlist_items WHERE notification_enabled = true",
        )
        .fetch_all(self.pool)
        .await?;

        let mut result = CheckAllResult::default();
        for item in &items {
            result.checked += 1;
            match self.check_item_price(item).await {
                Ok(Some(outcome)) => {
                    if outcome.updated {
                        result.updated += 1;
                    }
                    if should_send_alert(item, outcome.current_price, outcome.lowest_90days) {
                        match self.dispatch_alert(item, outcome.current_price, outcome.lowest_90days).await {
                            Ok(true) => result.alerts_sent += 1,
                            Ok(false) => {}
                            Err(e) => {
                                tracing::error!(error = %e, item = %item.product_name, "price alert dispatch failed");
                                result.errors += 1;
                            }
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, item = %item.product_name, "price check failed");
                    result.errors += 1;
                }
            }
        }

        Ok(result)
    }

    /// Manual single-item trigger (the admin "check this one now" path).
    pub async fn check_single_product(&self, wishlist_item_id: Uuid) -> Result<Option<CheckOneResult>> {
        let item: Option<WishlistItem> =
            sqlx::query_as("SELECT * FROM wishlist_items WHERE id = $1")
                .bind(wishlist_item_id)
                .fetch_optional(self.pool)
                .await?;

        let Some(item) = item else {
            return Ok(None);
        };

        let outcome = self.check_item_price(&item).await?;
        Ok(outcome)
    }

    async fn check_item_price(&self, item: &WishlistItem) -> Result<Option<CheckOneResult>> {
        let mut params = SearchParams::new(item.product_name.clone());
        params.display = CHECK_DISPLAY;

        let search = self.catalog.search(&params).await?;
        let Some(first) = search.items.first() else {
            return Ok(None);
        };
        let current_price = first.low_price;

        if current_price == item.current_price {
            return Ok(None);
        }

        sqlx::query("INSERT INTO price_history (id, wishlist_item_id, price, recorded_at) VALUES ($1, $2, $3, now())")
            .bind(Uuid::new_v4())
            .bind(item.id)
            .bind(current_price)
            .execute(self.pool)
            .await?;

        let lowest_90days = self.calculate_lowest_90days(item.id, current_price).await?;

        sqlx::query(
            "UPDATE wishlist_items SET current_price = $1, lowest_price_90days = $2, updated_at = now() WHERE id = $3",
        )
        .bind(current_price)
        .bind(lowest_90days)
        .bind(item.id)
        .execute(self.pool)
        .await?;

        Ok(Some(CheckOneResult {
            current_price,
            lowest_90days,
            updated: true,
        }))
    }

    async fn calculate_lowest_90days(&self, wishlist_item_id: Uuid, current_price: i64) -> Result<i64> {
        let cutoff = Utc::now() - Duration::days(LOOKBACK_DAYS);
        let history: Vec<PriceHistory> = sqlx::query_as(
            "SELECT * FROM price_history WHERE wishlist_item_id = $1 AND recorded_at >= $2",
        )
        .bind(wishlist_item_id)
        .bind(cutoff)
        .fetch_all(self.pool)
        .await?;

        let lowest = history
            .iter()
            .map(|h| h.price)
            .min()
            .map(|min_history| min_history.min(current_price))
            .unwrap_or(current_price);

        Ok(lowest)
    }

    async fn dispatch_alert(&self, item: &WishlistItem, current_price: i64, lowest_90days: i64) -> Result<bool> {
        let Some(owner) = self.fetch_owner(item.user_id).await? else {
            return Ok(false);
        };
        self.notifier
            .send_price_alert(self.pool, &owner, item, current_price, lowest_90days)
            .await
    }

    async fn fetch_owner(&self, user_id: Uuid) -> Result<Option<crate::models::User>> {
        let user: Option<crate::models::User> =
            sqlx::query_as("SELECT * FROM users WHERE id = $1 AND is_active = true")
                .bind(user_id)
                .fetch_optional(self.pool)
                .await?;
        Ok(user)
    }
}

fn should_send_alert(item: &WishlistItem, current_price: i64, lowest_90days: i64) -> bool {
    if current_price <= lowest_90days {
        return true;
    }
    matches!(item.target_price, Some(target) if current_price <= target)
}

/// Deletes `PriceHistory` rows older than the retention window (spec §4.11 cleanup).
pub async fn cleanup_price_history(pool: &PgPool) -> Result<u64> {
    let cutoff = Utc::now() - Duration::days(PRICE_HISTORY_RETENTION_DAYS);
    let result = sqlx::query("DELETE FROM price_history WHERE recorded_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(current_price: i64, target_price: Option<i64>) -> WishlistItem {
        WishlistItem {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            product_id: "p1".to_string(),
            product_name: "노트북".to_string(),
            image: None,
            link: None,
            mall: None,
            category: None,
            current_price,
            target_price,
            lowest_price_90days: None,
            notification_enabled: true,
            last_notified_at: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn alert_fires_when_at_90day_low() {
        assert!(should_send_alert(&item(900_000, None), 900_000, 900_000));
    }

    #[test]
    fn alert_fires_when_under_target_even_above_90day_low() {
        assert!(should_send_alert(&item(900_000, Some(950_000)), 900_000, 850_000));
    }

    #[test]
    fn no_alert_when_above_low_and_no_target() {
        assert!(!should_send_alert(&item(900_000, None), 900_000, 850_000));
    }
}
