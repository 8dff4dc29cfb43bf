//! Purchase record CRUD plus statistics (spec §6).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{PurchaseRecord, PurchaseStatistics};

pub struct CreatePurchaseRecord {
    pub product_name: String,
    pub category: Option<String>,
    pub mall: Option<String>,
    pub price: i64,
    pub quantity: i32,
    pub purchased_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

pub struct UpdatePurchaseRecord {
    pub category: Option<Option<String>>,
    pub mall: Option<Option<String>>,
    pub price: Option<i64>,
    pub quantity: Option<i32>,
    pub notes: Option<Option<String>>,
}

pub async fn list(pool: &PgPool, user_id: Uuid) -> Result<Vec<PurchaseRecord>> {
    let records = sqlx::query_as("SELECT * FROM purchase_records WHERE user_id = $1 ORDER BY purchased_at DESC")
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(records)
}

pub async fn create(pool: &PgPool, user_id: Uuid, input: CreatePurchaseRecord) -> Result<PurchaseRecord> {
    let purchased_at = input.purchased_at.unwrap_or_else(Utc::now);
    let record: PurchaseRecord = sqlx::query_as(
        "INSERT INTO purchase_records (id, user_id, product_name, category, mall, price, quantity, purchased_at, notes) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&input.product_name)
    .bind(&input.category)
    .bind(&input.mall)
    .bind(input.price)
    .bind(input.quantity)
    .bind(purchased_at)
    .bind(&input.notes)
    .fetch_one(pool)
    .await?;
    Ok(record)
}

async fn get_owned(pool: &PgPool, user_id: Uuid, record_id: Uuid) -> Result<PurchaseRecord> {
    let record: Option<PurchaseRecord> =
        sqlx::query_as("SELECT * FROM purchase_records WHERE id = $1 AND user_id = $2")
            .bind(record_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    record.ok_or_else(|| Error::NotFound("purchase record not found".into()))
}

pub async fn update(pool: &PgPool, user_id: Uuid, record_id: Uuid, input: UpdatePurchaseRecord) -> Result<PurchaseRecord> {
    let existing = get_owned(pool, user_id, record_id).await?;

    let category = input.category.unwrap_or(existing.category);
    let mall = input.mall.unwrap_or(existing.mall);
    let price = input.price.unwrap_or(existing.price);
    let quantity = input.quantity.unwrap_or(existing.quantity);
    let notes = input.notes.unwrap_or(existing.notes);

    let record: PurchaseRecord = sqlx::query_as(
        "UPDATE purchase_records SET category = $1, mall = $2, price = $3, quantity = $4, notes = $5 \
         WHERE id = $6 AND user_id = $7 RETURNING *",
    )
    .bind(&category)
    .bind(&mall)
    .bind(price)
    .bind(quantity)
    .bind(&notes)
    .bind(record_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(record)
}

pub async fn delete(pool: &PgPool, user_id: Uuid, record_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM purchase_records WHERE id = $1 AND user_id = $2")
        .bind(record_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound("purchase record not found".into()));
    }
    Ok(())
}

pub async fn statistics(pool: &PgPool, user_id: Uuid) -> Result<PurchaseStatistics> {
    let (total_purchases, total_spent, average_price): (i64, Option<i64>, Option<f64>) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(price * quantity), 0), AVG(price)::float8 \
         FROM purchase_records WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let category_rows: Vec<(Option<String>, i64)> = sqlx::query_as(
        "SELECT category, COALESCE(SUM(price * quantity), 0) FROM purchase_records \
         WHERE user_id = $1 GROUP BY category",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    let categories: HashMap<String, i64> = category_rows
        .into_iter()
        .filter_map(|(category, sum)| category.map(|c| (c, sum)))
        .collect();

    let monthly_rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT to_char(purchased_at, 'YYYY-MM'), COALESCE(SUM(price * quantity), 0) \
         FROM purchase_records WHERE user_id = $1 GROUP BY to_char(purchased_at, 'YYYY-MM')",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    let monthly_spending: HashMap<String, i64> = monthly_rows.into_iter().collect();

    Ok(PurchaseStatistics {
        total_purchases,
        total_spent: total_spent.unwrap_or(0),
        average_price: average_price.unwrap_or(0.0),
        categories,
        monthly_spending,
    })
}
