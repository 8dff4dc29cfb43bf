//! Wishlist CRUD (spec §6 wishlist operations).

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{WishlistItem, WISHLIST_LIMIT};

pub struct CreateWishlistItem {
    pub product_id: String,
    pub product_name: String,
    pub image: Option<String>,
    pub link: Option<String>,
    pub mall: Option<String>,
    pub category: Option<String>,
    pub current_price: i64,
    pub target_price: Option<i64>,
    pub notification_enabled: bool,
    pub notes: Option<String>,
}

pub struct UpdateWishlistItem {
    pub target_price: Option<Option<i64>>,
    pub notification_enabled: Option<bool>,
    pub notes: Option<Option<String>>,
}

pub async fn list(pool: &PgPool, user_id: Uuid) -> Result<Vec<WishlistItem>> {
    let items = sqlx::query_as("SELECT * FROM wishlist_items WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(items)
}

pub async fn create(pool: &PgPool, user_id: Uuid, input: CreateWishlistItem) -> Result<WishlistItem> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wishlist_items WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if count as usize >= WISHLIST_LIMIT {
        return Err(Error::Conflict("wishlist is full".into()));
    }

    let (duplicate,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM wishlist_items WHERE user_id = $1 AND product_id = $2",
    )
    .bind(user_id)
    .bind(&input.product_id)
    .fetch_one(pool)
    .await?;
    if duplicate > 0 {
        return Err(Error::Conflict("product already in wishlist".into()));
    }

    let item: WishlistItem = sqlx::query_as(
        "INSERT INTO wishlist_items \
         (id, user_id, product_id, product_name, image, link, mall, category, \
          current_price, target_price, lowest_price_90days, notification_enabled, \
          last_notified_at, notes, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $9, $11, NULL, $12, now(), now()) \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&input.product_id)
    .bind(&input.product_name)
    .bind(&input.image)
    .bind(&input.link)
    .bind(&input.mall)
    .bind(&input.category)
    .bind(input.current_price)
    .bind(input.target_price)
    .bind(input.notification_enabled)
    .bind(&input.notes)
    .fetch_one(pool)
    .await?;

    sqlx::query("INSERT INTO price_history (id, wishlist_item_id, price, recorded_at) VALUES ($1, $2, $3, now())")
        .bind(Uuid::new_v4())
        .bind(item.id)
        .bind(input.current_price)
        .execute(pool)
        .await?;

    Ok(item)
}

pub async fn update(pool: &PgPool, user_id: Uuid, item_id: Uuid, input: UpdateWishlistItem) -> Result<WishlistItem> {
    let existing = get_owned(pool, user_id, item_id).await?;

    let target_price = input.target_price.unwrap_or(existing.target_price);
    let notification_enabled = input.notification_enabled.unwrap_or(existing.notification_enabled);
    let notes = input.notes.unwrap_or(existing.notes);

    let item: WishlistItem = sqlx::query_as(
        "UPDATE wishlist_items SET target_price = $1, notification_enabled = $2, notes = $3, updated_at = now() \
         WHERE id = $4 AND user_id = $5 RETURNING *",
    )
    .bind(target_price)
    .bind(notification_enabled)
    .bind(&notes)
    .bind(item_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(item)
}

pub async fn delete(pool: &PgPool, user_id: Uuid, item_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM wishlist_items WHERE id = $1 AND user_id = $2")
        .bind(item_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound("wishlist item not found".into()));
    }
    Ok(())
}

async fn get_owned(pool: &PgPool, user_id: Uuid, item_id: Uuid) -> Result<WishlistItem> {
    let item: Option<WishlistItem> =
        sqlx::query_as("SELECT * FROM wishlist_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    item.ok_or_else(|| Error::NotFound("wishlist item not found".into()))
}

/// Price-history query, ascending by time (spec §6).
pub async fn price_history(
    pool: &PgPool,
    user_id: Uuid,
    item_id: Uuid,
    days: i64,
) -> Result<Vec<crate::models::PriceHistory>> {
    get_owned(pool, user_id, item_id).await?;
    let cutoff = Utc::now() - Duration::days(days);
    let history = sqlx::query_as(
        "SELECT * FROM price_history WHERE wishlist_item_id = $1 AND recorded_at >= $2 ORDER BY recorded_at ASC",
    )
    .bind(item_id)
    .bind(cutoff)
    .fetch_all(pool)
    .await?;
    Ok(history)
}

pub const DEFAULT_PRICE_HISTORY_DAYS: i64 = 90;
