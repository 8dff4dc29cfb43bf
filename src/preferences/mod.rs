//! Derives `UserPreferences` from 180 days of purchase/rating/wishlist
//! history (spec §4.10). Never fails the caller: a query error is logged and
//! degrades to whatever partial profile was already accumulated, matching
//! the source's catch-all around the whole analysis.

use std::collections::HashMap;

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    CategoryWeight, PriceSensitivity, PurchaseFrequency, UserPreferences,
};

pub const ANALYSIS_PERIOD_DAYS: i64 = 180;
const HIGH_RATED_THRESHOLD: i16 = 4;
const KEYWORD_MIN_LEN: usize = 2;
const KEYWORD_MIN_COUNT: usize = 2;
const KEYWORD_CANDIDATES: usize = 10;

lazy_static! {
    static ref TOKEN_PATTERN: Regex = Regex::new(r"[가-힣a-zA-Z0-9]+").unwrap();
    static ref STOPWORDS: std::collections::HashSet<&'static str> = [
        "세트", "선물", "추천", "인기", "베스트", "특가", "무료배송", "증정", "할인", "정품",
        "국내", "해외", "당일", "무료", "한정", "1+1", "2+1", "신상", "사은품", "이벤트",
    ]
    .into_iter()
    .collect();
}

pub struct PreferenceAnalyzer;

impl PreferenceAnalyzer {
    pub fn new() -> Self {
        PreferenceAnalyzer
    }

    pub async fn analyze(&self, pool: &PgPool, user_id: Uuid) -> UserPreferences {
        let mut prefs = UserPreferences {
            average_purchase_price: None,
            price_range: None,
            price_sensitivity: Some(PriceSensitivity::Medium),
            preferred_categories: Vec::new(),
            average_rating: None,
            keywords: Vec::new(),
            purchase_frequency: Some(PurchaseFrequency::Medium),
            preferred_malls: Vec::new(),
            recent_purchases: Vec::new(),
            data_points: 0,
            analyzed_at: Utc::now(),
        };

        let cutoff = Utc::now() - chrono::Duration::days(ANALYSIS_PERIOD_DAYS);

        if let Err(e) = self.analyze_purchases(pool, user_id, cutoff, &mut prefs).await {
            tracing::warn!(error = %e, "preference analysis: purchase query failed");
        }
        if let Err(e) = self.analyze_ratings(pool, user_id, &mut prefs).await {
            tracing::warn!(error = %e, "preference analysis: rating query failed");
        }
        if let Err(e) = self.analyze_wishlist(pool, user_id, &mut prefs).await {
            tracing::warn!(error = %e, "preference analysis: wishlist query failed");
        }

        self.apply_price_sensitivity(&mut prefs);
        prefs.analyzed_at = Utc::now();
        prefs
    }

    async fn analyze_purchases(
        &self,
        pool: &PgPool,
        user_id: Uuid,
        cutoff: chrono::DateTime<Utc>,
        prefs: &mut UserPreferences,
    ) -> sqlx::Result<()> {
        let (count, avg_price, min_price, max_price): (i64, Option<f64>, Option<i64>, Option<i64>) =
            sqlx::query_as(
                "SELECT COUNT(*), AVG(price)::float8, MIN(price), MAX(price) \
                 FROM purchase_records WHERE user_id = $1 AND purchased_at >= $2",
            )
            .bind(user_id)
            .bind(cutoff)
            .fetch_one(pool)
            .await?;

        if count > 0 {
            prefs.average_purchase_price = avg_price;
            if let (Some(min), Some(max)) = (min_price, max_price) {
                prefs.price_range = Some((min, max));
            }
            prefs.data_points += count as usize;
            prefs.purchase_frequency = Some(if count >= 10 {
                PurchaseFrequency::High
            } else if count >= 3 {
                PurchaseFrequency::Medium
            } else {
                PurchaseFrequency::Low
            });
        }

        let categories: Vec<(String, i64)> = sqlx::query_as(
            "SELECT category, COUNT(*) as cnt FROM purchase_records \
             WHERE user_id = $1 AND category IS NOT NULL \
             GROUP BY category ORDER BY cnt DESC LIMIT 10",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        if !categories.is_empty() {
            let total: i64 = categories.iter().map(|(_, c)| c).sum();
            prefs.preferred_categories = categories
                .into_iter()
                .take(5)
                .map(|(category, count)| CategoryWeight {
                    category,
                    weight: count as f64 / total as f64,
                })
                .collect();
        }

        let malls: Vec<(String,)> = sqlx::query_as(
            "SELECT mall FROM (SELECT mall, COUNT(*) as cnt FROM purchase_records \
             WHERE user_id = $1 AND mall IS NOT NULL \
             GROUP BY mall ORDER BY cnt DESC LIMIT 5) t",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        prefs.preferred_malls = malls.into_iter().map(|(m,)| m).collect();

        let recent: Vec<(String,)> = sqlx::query_as(
            "SELECT product_name FROM purchase_records WHERE user_id = $1 \
             ORDER BY purchased_at DESC LIMIT 5",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        prefs.recent_purchases = recent.into_iter().map(|(p,)| p).collect();

        Ok(())
    }

    async fn analyze_ratings(
        &self,
        pool: &PgPool,
        user_id: Uuid,
        prefs: &mut UserPreferences,
    ) -> sqlx::Result<()> {
        let (avg,): (Option<f64>,) =
            sqlx::query_as("SELECT AVG(rating)::float8 FROM product_ratings WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;
        prefs.average_rating = avg;

        let high_rated: Vec<(Option<String>,)> = sqlx::query_as(
            "SELECT product_name FROM product_ratings WHERE user_id = $1 AND rating >= $2 LIMIT 20",
        )
        .bind(user_id)
        .bind(HIGH_RATED_THRESHOLD)
        .fetch_all(pool)
        .await?;

        let names: Vec<String> = high_rated.into_iter().filter_map(|(n,)| n).collect();
        if !names.is_empty() {
            prefs.data_points += names.len();
            prefs.keywords = extract_keywords(&names);
        }

        Ok(())
    }

    async fn analyze_wishlist(
        &self,
        pool: &PgPool,
        user_id: Uuid,
        prefs: &mut UserPreferences,
    ) -> sqlx::Result<()> {
        let (count, avg_price): (i64, Option<f64>) = sqlx::query_as(
            "SELECT COUNT(*), AVG(current_price)::float8 FROM wishlist_items WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        if count > 0 {
            prefs.data_points += count as usize;
            if let Some(wishlist_avg) = avg_price {
                prefs.average_purchase_price = Some(match prefs.average_purchase_price {
                    Some(purchase_avg) => purchase_avg * 0.7 + wishlist_avg * 0.3,
                    None => wishlist_avg,
                });
            }
        }

        Ok(())
    }

    /// Price sensitivity is a function of the blended average purchase price
    /// only; it stays `medium` when there is no price signal at all (spec §4.10).
    fn apply_price_sensitivity(&self, prefs: &mut UserPreferences) {
        prefs.price_sensitivity = Some(match prefs.average_purchase_price {
            Some(avg) if avg < 20_000.0 => PriceSensitivity::High,
            Some(avg) if avg > 100_000.0 => PriceSensitivity::Low,
            _ => PriceSensitivity::Medium,
        });
    }
}

impl Default for PreferenceAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenizes product names, drops stopwords and single-character tokens,
/// and keeps words appearing at least twice among the top 10 by frequency.
fn extract_keywords(names: &[String]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for name in names {
        for token in TOKEN_PATTERN.find_iter(name) {
            let word = token.as_str();
            if word.chars().count() >= KEYWORD_MIN_LEN && !STOPWORDS.contains(word) {
                *counts.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(KEYWORD_CANDIDATES)
        .filter(|(_, count)| *count >= KEYWORD_MIN_COUNT)
        .map(|(word, _)| word)
        .collect()
}

/// Prompt-facing summary of a preference profile, consumed by the mode
/// agents as `AgentContext::preference_context` (spec §4.9's shared inputs).
pub fn to_prompt_context(prefs: &UserPreferences) -> String {
    if !prefs.has_data() {
        return "사용자 구매/평가 이력이 없습니다.".to_string();
    }

    let mut lines = Vec::new();

    if let Some(avg) = prefs.average_purchase_price {
        lines.push(format!("- 평균 구매가: {}", crate::models::format_won(avg as i64)));
        if let Some((min, max)) = prefs.price_range {
            lines.push(format!(
                "- 선호 가격대: {}~{}",
                crate::models::format_won(min),
                crate::models::format_won(max)
            ));
        }
        if let Some(sensitivity) = prefs.price_sensitivity {
            lines.push(format!("- 가격 민감도: {}", sensitivity_korean(sensitivity)));
        }
    }

    if !prefs.preferred_categories.is_empty() {
        let cats: Vec<&str> = prefs
            .preferred_categories
            .iter()
            .take(5)
            .map(|c| c.category.as_str())
            .collect();
        lines.push(format!("- 선호 카테고리: {}", cats.join(", ")));
    }

    if let Some(rating) = prefs.average_rating {
        lines.push(format!("- 평균 평점: {rating:.1}점"));
    }
    if !prefs.keywords.is_empty() {
        lines.push(format!("- 높게 평가한 상품 유형: {}", prefs.keywords.join(", ")));
    }

    if let Some(frequency) = prefs.purchase_frequency {
        lines.push(format!("- 구매 빈도: {}", frequency_korean(frequency)));
    }

    if !prefs.preferred_malls.is_empty() {
        let malls: Vec<&str> = prefs.preferred_malls.iter().take(3).map(|m| m.as_str()).collect();
        lines.push(format!("- 선호 쇼핑몰: {}", malls.join(", ")));
    }

    if lines.is_empty() {
        return "사용자 성향 데이터 부족".to_string();
    }

    format!("사용자 성향:\n{}", lines.join("\n"))
}

fn sensitivity_korean(sensitivity: PriceSensitivity) -> &'static str {
    match sensitivity {
        PriceSensitivity::Low => "낮음 (가격보다 품질 중시)",
        PriceSensitivity::Medium => "보통",
        PriceSensitivity::High => "높음 (가성비 중시)",
    }
}

fn frequency_korean(frequency: PurchaseFrequency) -> &'static str {
    match frequency {
        PurchaseFrequency::Low => "가끔 구매",
        PurchaseFrequency::Medium => "보통",
        PurchaseFrequency::High => "자주 구매",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_extraction_keeps_only_repeated_non_stopwords() {
        let names = vec![
            "애플 무선 이어폰 프로".to_string(),
            "애플 무선 충전기".to_string(),
            "선물 세트 특가".to_string(),
        ];
        let keywords = extract_keywords(&names);
        assert!(keywords.contains(&"애플".to_string()));
        assert!(keywords.contains(&"무선".to_string()));
        assert!(!keywords.contains(&"선물".to_string()));
    }

    #[test]
    fn no_data_points_yields_placeholder_context() {
        let prefs = UserPreferences {
            average_purchase_price: None,
            price_range: None,
            price_sensitivity: None,
            preferred_categories: Vec::new(),
            average_rating: None,
            keywords: Vec::new(),
            purchase_frequency: None,
            preferred_malls: Vec::new(),
            recent_purchases: Vec::new(),
            data_points: 0,
            analyzed_at: Utc::now(),
        };
        assert_eq!(to_prompt_context(&prefs), "사용자 구매/평가 이력이 없습니다.");
    }
}
