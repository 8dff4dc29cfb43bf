//! Mode-specific recommendation shapes produced by the five agents (spec §4.9)
//! and the derived `UserPreferences` profile (spec §3, §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::ProductCandidate;
use super::request::Intent;

/// A candidate enriched with a model-authored recommendation reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub product: ProductCandidate,
    pub recommendation_reason: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GiftRecommendation {
    pub cards: Vec<Card>,
    pub recipient_summary: String,
    pub occasion: Option<String>,
    pub budget_range: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierCard {
    pub card: Card,
    pub tier_benefits: String,
    pub tier_tradeoffs: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueRecommendation {
    pub budget_tier: Vec<TierCard>,
    pub standard_tier: Vec<TierCard>,
    pub premium_tier: Vec<TierCard>,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleItem {
    pub item_category: String,
    pub product: ProductCandidate,
    pub justification: String,
    pub alternatives: Vec<ProductCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleCombination {
    pub label: String,
    pub items: Vec<BundleItem>,
    pub total_price: i64,
    pub budget_fit: bool,
    pub adjustment_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleRecommendation {
    pub combinations: Vec<BundleCombination>,
    pub total_budget: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "많음")]
    High,
    #[serde(rename = "보통")]
    Medium,
    #[serde(rename = "적음")]
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Mixed,
    Negative,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewComplaint {
    pub rank: u8,
    pub issue: String,
    pub frequency: Frequency,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAnalysis {
    pub category: String,
    pub complaints: Vec<ReviewComplaint>,
    pub not_recommended_conditions: Vec<String>,
    pub management_tips: Vec<String>,
    pub overall_sentiment: Sentiment,
    pub disclaimer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingItem {
    pub category: String,
    pub keyword: String,
    pub growth_rate: String,
    pub period: String,
    pub target_segment: String,
    pub why_trending: String,
    pub recommended_products: Vec<ProductCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendSignal {
    pub items: Vec<TrendingItem>,
}

/// Tagged union of the five mode results, replacing the source's dynamically
/// typed state bag (spec §9 design note).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "intent")]
pub enum Recommendations {
    Gift(GiftRecommendation),
    Value(ValueRecommendation),
    Bundle(BundleRecommendation),
    Review(ReviewAnalysis),
    Trend(TrendSignal),
}

impl Recommendations {
    pub fn intent(&self) -> Intent {
        match self {
            Recommendations::Gift(_) => Intent::Gift,
            Recommendations::Value(_) => Intent::Value,
            Recommendations::Bundle(_) => Intent::Bundle,
            Recommendations::Review(_) => Intent::Review,
            Recommendations::Trend(_) => Intent::Trend,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSensitivity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseFrequency {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWeight {
    pub category: String,
    pub weight: f64,
}

/// Derived, not stored (spec §3). Computed on demand by `preferences::PreferenceAnalyzer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub average_purchase_price: Option<f64>,
    pub price_range: Option<(i64, i64)>,
    pub price_sensitivity: Option<PriceSensitivity>,
    pub preferred_categories: Vec<CategoryWeight>,
    pub average_rating: Option<f64>,
    pub keywords: Vec<String>,
    pub purchase_frequency: Option<PurchaseFrequency>,
    pub preferred_malls: Vec<String>,
    pub recent_purchases: Vec<String>,
    pub data_points: usize,
    pub analyzed_at: DateTime<Utc>,
}

impl UserPreferences {
    pub fn has_data(&self) -> bool {
        self.data_points > 0
    }
}
