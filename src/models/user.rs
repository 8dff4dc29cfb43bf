//! Persisted entities: `User`, `WishlistItem`, `PriceHistory`, `PurchaseRecord`,
//! `ProductRating` (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Typing-only: which identity provider issued the account. No token-exchange
/// flow is implemented here (SPEC_FULL.md §B); this exists so `provider` has a
/// closed shape instead of a bare string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Kakao,
    Naver,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub profile_image: Option<String>,
    pub provider: SocialProvider,
    pub provider_id: String,
    pub messenger_platform_id: Option<String>,
    pub messenger_access_token: Option<String>,
    pub messenger_refresh_token: Option<String>,
    pub messenger_token_expires_at: Option<DateTime<Utc>>,
    pub kakao_notification_enabled: bool,
    pub email_notification_enabled: bool,
    pub notification_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Per-user wishlist cap (spec §3).
pub const WISHLIST_LIMIT: usize = 20;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: String,
    pub product_name: String,
    pub image: Option<String>,
    pub link: Option<String>,
    pub mall: Option<String>,
    pub category: Option<String>,
    pub current_price: i64,
    pub target_price: Option<i64>,
    pub lowest_price_90days: Option<i64>,
    pub notification_enabled: bool,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct PriceHistory {
    pub id: Uuid,
    pub wishlist_item_id: Uuid,
    pub price: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Retention window for `PriceHistory` rows (spec §4.11 cleanup).
pub const PRICE_HISTORY_RETENTION_DAYS: i64 = 180;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_name: String,
    pub category: Option<String>,
    pub mall: Option<String>,
    pub price: i64,
    pub quantity: i32,
    pub purchased_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct ProductRating {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: String,
    pub product_name: Option<String>,
    pub product_image: Option<String>,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseStatistics {
    pub total_purchases: i64,
    pub total_spent: i64,
    pub average_price: f64,
    pub categories: std::collections::HashMap<String, i64>,
    pub monthly_spending: std::collections::HashMap<String, i64>,
}
