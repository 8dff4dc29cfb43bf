//! Rating operations (spec §6): upsert by (user, product), list, delete, and
//! a derived-preferences endpoint backed by the preference analyzer.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{ProductRating, UserPreferences};
use crate::preferences::PreferenceAnalyzer;

const RATING_MIN: i16 = 1;
const RATING_MAX: i16 = 5;

pub async fn upsert(
    pool: &PgPool,
    user_id: Uuid,
    product_id: &str,
    product_name: Option<&str>,
    product_image: Option<&str>,
    rating: i16,
) -> Result<ProductRating> {
    if !(RATING_MIN..=RATING_MAX).contains(&rating) {
        return Err(Error::Validation(format!(
            "rating must be between {RATING_MIN} and {RATING_MAX}, got {rating}"
        )));
    }

    let record: ProductRating = sqlx::query_as(
        "INSERT INTO product_ratings (id, user_id, product_id, product_name, product_image, rating, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, now(), now()) \
         ON CONFLICT (user_id, product_id) \
         DO UPDATE SET rating = EXCLUDED.rating, product_name = EXCLUDED.product_name, \
                        product_image = EXCLUDED.product_image, updated_at = now() \
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(product_id)
    .bind(product_name)
    .bind(product_image)
    .bind(rating)
    .fetch_one(pool)
    .await?;

    Ok(record)
}

pub async fn list(pool: &PgPool, user_id: Uuid, category: Option<&str>) -> Result<Vec<ProductRating>> {
    let ratings = match category {
        Some(category) => {
            sqlx::query_as(
                "SELECT r.* FROM product_ratings r \
                 JOIN wishlist_items w ON w.product_id = r.product_id AND w.user_id = r.user_id \
                 WHERE r.user_id = $1 AND w.category = $2 \
                 ORDER BY r.updated_at DESC",
            )
            .bind(user_id)
            .bind(category)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as("SELECT * FROM product_ratings WHERE user_id = $1 ORDER BY updated_at DESC")
                .bind(user_id)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(ratings)
}

pub async fn delete(pool: &PgPool, user_id: Uuid, product_id: &str) -> Result<()> {
    let result = sqlx::query("DELETE FROM product_ratings WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound("rating not found".into()));
    }
    Ok(())
}

pub async fn derived_preferences(pool: &PgPool, user_id: Uuid) -> UserPreferences {
    PreferenceAnalyzer::new().analyze(pool, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds_are_inclusive_one_to_five() {
        assert!((RATING_MIN..=RATING_MAX).contains(&1));
        assert!((RATING_MIN..=RATING_MAX).contains(&5));
        assert!(!(RATING_MIN..=RATING_MAX).contains(&0));
        assert!(!(RATING_MIN..=RATING_MAX).contains(&6));
    }
}
