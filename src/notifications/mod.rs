//! Notification dispatch (spec §4.12): messenger push first, email fallback,
//! a 24h per-item cooldown, and a bulk form for the price monitor's fan-out.

pub mod email;
pub mod messenger;

use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::config::Settings;
use crate::error::Result;
use crate::models::{User, WishlistItem};
use email::{EmailChannel, SmtpEmailChannel};
use messenger::{HttpMessengerChannel, MessengerChannel};

const MIN_NOTIFICATION_INTERVAL_HOURS: i64 = 24;

pub struct NotificationManager {
    messenger: Box<dyn MessengerChannel>,
    email: Option<Box<dyn EmailChannel>>,
}

#[derive(Debug, Default)]
pub struct BulkResult {
    pub sent: u32,
    pub failed: u32,
    pub skipped: u32,
}

pub struct Alert<'a> {
    pub user: &'a User,
    pub item: &'a WishlistItem,
    pub current_price: i64,
    pub lowest_price: i64,
}

impl NotificationManager {
    pub fn new(settings: &Settings) -> Self {
        NotificationManager {
            messenger: Box::new(HttpMessengerChannel::new()),
            email: SmtpEmailChannel::new(settings).map(|c| Box::new(c) as Box<dyn EmailChannel>),
        }
    }

    fn should_send_notification(&self, item: &WishlistItem) -> bool {
        if !item.notification_enabled {
            return false;
        }
        if let Some(last) = item.last_notified_at {
            if Utc::now() - last < Duration::hours(MIN_NOTIFICATION_INTERVAL_HOURS) {
                return false;
            }
        }
        true
    }

    pub async fn send_price_alert(
        &self,
        pool: &PgPool,
        user: &User,
        item: &WishlistItem,
        current_price: i64,
        lowest_price: i64,
    ) -> Result<bool> {
        if !self.should_send_notification(item) {
            tracing::debug!(product = %item.product_name, "notification skipped, recently sent");
            return Ok(false);
        }

        let mut success = false;

        if user.kakao_notification_enabled {
            if let Some(token) = &user.messenger_access_token {
                success = self
                    .messenger
                    .send_price_alert(
                        token,
                        &item.product_name,
                        current_price,
                        lowest_price,
                        item.link.as_deref().unwrap_or(""),
                    )
                    .await;
                if success {
                    tracing::info!(product = %item.product_name, "messenger price alert sent");
                }
            }
        }

        if !success && user.email_notification_enabled {
            let destination = user.notification_email.as_ref().or(user.email.as_ref());
            if let (Some(email), Some(channel)) = (destination, &self.email) {
                success = channel
                    .send_price_alert(
                        email,
                        &item.product_name,
                        current_price,
                        lowest_price,
                        item.link.as_deref().unwrap_or(""),
                        item.image.as_deref(),
                    )
                    .await;
                if success {
                    tracing::info!(product = %item.product_name, "email price alert sent");
                }
            }
        }

        if success {
            sqlx::query("UPDATE wishlist_items SET last_notified_at = now() WHERE id = $1")
                .bind(item.id)
                .execute(pool)
                .await?;
        }

        Ok(success)
    }

    pub async fn send_bulk_price_alerts(&self, pool: &PgPool, alerts: &[Alert<'_>]) -> BulkResult {
        let mut result = BulkResult::default();
        for alert in alerts {
            match self
                .send_price_alert(pool, alert.user, alert.item, alert.current_price, alert.lowest_price)
                .await
            {
                Ok(true) => result.sent += 1,
                Ok(false) => result.skipped += 1,
                Err(e) => {
                    tracing::error!(error = %e, "bulk price alert failed");
                    result.failed += 1;
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn item(notification_enabled: bool, last_notified_at: Option<chrono::DateTime<Utc>>) -> WishlistItem {
        WishlistItem {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            product_id: "p1".to_string(),
            product_name: "노트북".to_string(),
            image: None,
            link: None,
            mall: None,
            category: None,
            current_price: 900_000,
            target_price: None,
            lowest_price_90days: None,
            notification_enabled,
            last_notified_at,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn fake_manager() -> NotificationManager {
        NotificationManager {
            messenger: Box::new(messenger::HttpMessengerChannel::new()),
            email: None,
        }
    }

    #[test]
    fn disabled_item_never_notifies() {
        let manager = fake_manager();
        assert!(!manager.should_send_notification(&item(false, None)));
    }

    #[test]
    fn recent_notification_is_skipped() {
        let manager = fake_manager();
        assert!(!manager.should_send_notification(&item(true, Some(Utc::now()))));
    }

    #[test]
    fn stale_notification_allows_resend() {
        let manager = fake_manager();
        let old = Utc::now() - Duration::hours(25);
        assert!(manager.should_send_notification(&item(true, Some(old))));
    }
}
