//! VALUE mode (spec §4.9.2): price-tier classification of search results
//! into budget/standard/premium bands.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::cache;
use crate::error::{Error, Result};
use crate::llm::{self, strip_code_fence, ChatMessage, GenerateOptions};
use crate::models::{BudgetRange, Card, ProductCandidate, Recommendations, TierCard, ValueRecommendation};
use crate::product_search::{SearchParams, Sort};

use super::AgentContext;

const VALUE_TEMPERATURE: f32 = 0.5;
const MAX_QUERIES: usize = 5;
const MAX_PER_TIER_FROM_LLM: usize = 2;
const MIN_PER_TIER: usize = 1;
const MAX_PRODUCTS_SHOWN: usize = 20;

const SYSTEM_PROMPT: &str = "당신은 가성비 제품 비교 전문가입니다. 정확한 JSON 형식으로만 응답하세요.";

#[derive(Serialize)]
struct CacheParams<'a> {
    items: &'a [String],
    search_keywords: &'a [String],
    budget: &'a Option<BudgetRange>,
}

#[derive(Deserialize)]
struct RawTierItem {
    product_id: String,
    #[serde(default)]
    benefits: Option<String>,
    #[serde(default)]
    tradeoffs: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawValueResponse {
    #[serde(default)]
    budget_tier: Vec<RawTierItem>,
    #[serde(default)]
    standard_tier: Vec<RawTierItem>,
    #[serde(default)]
    premium_tier: Vec<RawTierItem>,
}

fn extract_category(items: &[String], search_keywords: &[String]) -> String {
    if let Some(first) = items.first() {
        return first.clone();
    }
    if let Some(keyword) = search_keywords.first() {
        let cleaned = keyword.replace("가성비", "").replace("추천", "");
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() {
            return cleaned.to_string();
        }
    }
    "상품".to_string()
}

fn generate_search_queries(items: &[String]) -> Vec<String> {
    let mut queries = Vec::new();
    for item in items.iter().take(3) {
        queries.push(format!("{item} 추천"));
        queries.push(format!("가성비 {item}"));
    }
    queries.truncate(MAX_QUERIES);
    if queries.is_empty() {
        queries = vec!["가성비 추천".to_string(), "인기상품".to_string()];
    }
    queries
}

/// Splits a price-sorted list into budget/standard/premium bands at the
/// 33%/66% marks, falling back to single-item slices so no tier is ever
/// empty when at least one candidate exists (spec §4.9.2).
fn classify_by_price_tier(
    sorted: &[ProductCandidate],
) -> (Vec<ProductCandidate>, Vec<ProductCandidate>, Vec<ProductCandidate>) {
    let total = sorted.len();
    if total == 0 {
        return (Vec::new(), Vec::new(), Vec::new());
    }
    let budget_end = total / 3;
    let standard_end = (total * 2) / 3;

    let budget = if budget_end == 0 {
        sorted[..1.min(total)].to_vec()
    } else {
        sorted[..budget_end].to_vec()
    };

    let standard = if standard_end <= budget_end {
        sorted[budget_end..(budget_end + 1).min(total)].to_vec()
    } else {
        sorted[budget_end..standard_end].to_vec()
    };

    let premium = if standard_end >= total {
        sorted[total - 1..].to_vec()
    } else {
        sorted[standard_end..].to_vec()
    };

    (budget, standard, premium)
}

fn build_product_list(products: &[ProductCandidate], label: &str) -> String {
    let mut out = format!("[{label}]\n");
    for (i, p) in products.iter().take(MAX_PRODUCTS_SHOWN).enumerate() {
        out.push_str(&format!(
            "{}. [{}] {} - {}\n",
            i + 1,
            p.product_id,
            p.title,
            p.price_display()
        ));
    }
    out
}

fn build_prompt(category: &str, budget_str: &str, standard_str: &str, premium_str: &str) -> String {
    format!(
        "카테고리: {category}\n\n\
가격대별 검색 결과:\n{budget_str}\n{standard_str}\n{premium_str}\n\n\
각 가격대에서 최대 2개씩 추천하고, 장점(benefits)과 단점(tradeoffs)을 작성해주세요 (JSON만 출력):\n\
{{\n  \"budget_tier\": [{{\"product_id\": \"ID\", \"benefits\": \"...\", \"tradeoffs\": \"...\"}}],\n  \"standard_tier\": [...],\n  \"premium_tier\": [...]\n}}\n"
    )
}

fn build_tier_cards(
    raw_items: Vec<RawTierItem>,
    by_id: &HashMap<&str, &ProductCandidate>,
    tier_products: &[ProductCandidate],
    used: &mut HashSet<String>,
) -> Vec<TierCard> {
    let mut cards = Vec::new();
    for item in raw_items.into_iter().take(MAX_PER_TIER_FROM_LLM) {
        if let Some(product) = by_id.get(item.product_id.as_str()) {
            cards.push(TierCard {
                card: Card {
                    product: (*product).clone(),
                    recommendation_reason: item.benefits.clone().unwrap_or_default(),
                    warnings: Vec::new(),
                },
                tier_benefits: item.benefits.unwrap_or_default(),
                tier_tradeoffs: item.tradeoffs.unwrap_or_default(),
            });
            used.insert(item.product_id);
        }
    }

    for product in tier_products {
        if cards.len() >= MIN_PER_TIER {
            break;
        }
        if used.contains(&product.product_id) {
            continue;
        }
        cards.push(TierCard {
            card: Card {
                product: product.clone(),
                recommendation_reason: "가성비 추천".to_string(),
                warnings: Vec::new(),
            },
            tier_benefits: "가성비 추천".to_string(),
            tier_tradeoffs: String::new(),
        });
        used.insert(product.product_id.clone());
    }

    cards
}

pub async fn run(ctx: AgentContext<'_>) -> Result<(Recommendations, bool)> {
    let cache_params = CacheParams {
        items: ctx.requirements.items.as_slice(),
        search_keywords: ctx.search_keywords,
        budget: &ctx.requirements.budget,
    };
    let cache_key = cache::make_recommendation_key("VALUE", ctx.session_id, &cache_params);

    if let Some(cached) = ctx.cache.get(&cache_key).await {
        if let Ok(recommendation) = serde_json::from_value::<ValueRecommendation>(cached) {
            return Ok((Recommendations::Value(recommendation), true));
        }
    }

    let category = extract_category(&ctx.requirements.items, ctx.search_keywords);
    let queries = generate_search_queries(&ctx.requirements.items);

    let mut unique: HashMap<String, ProductCandidate> = HashMap::new();
    for query in &queries {
        for sort in [Sort::Similarity, Sort::PriceAsc] {
            let mut params = SearchParams::new(query.clone());
            params.sort = sort;
            match ctx.catalog.search(&params).await {
                Ok(result) => {
                    for item in result.items {
                        unique.entry(item.product_id.clone()).or_insert(item);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, query = %query, "value agent search failed");
                }
            }
        }
    }

    if unique.is_empty() {
        return Err(Error::UpstreamUnavailable(
            "가성비 비교용 상품을 찾지 못했습니다".into(),
        ));
    }

    let mut candidates: Vec<ProductCandidate> = unique.into_values().collect();
    candidates.sort_by_key(|p| p.low_price);

    let (budget_products, standard_products, premium_products) = classify_by_price_tier(&candidates);

    let prompt = build_prompt(
        &category,
        &build_product_list(&budget_products, "저가"),
        &build_product_list(&standard_products, "중가"),
        &build_product_list(&premium_products, "고가"),
    );
    let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
    let response = ctx
        .llm
        .generate(
            &messages,
            GenerateOptions {
                model: llm::DEFAULT_MODEL.to_string(),
                temperature: VALUE_TEMPERATURE,
            },
        )
        .await?;

    let stripped = strip_code_fence(&response);
    let raw: RawValueResponse = serde_json::from_str(stripped)
        .map_err(|e| Error::ModelResponseInvalid(e.to_string()))?;

    let by_id: HashMap<&str, &ProductCandidate> = candidates
        .iter()
        .map(|p| (p.product_id.as_str(), p))
        .collect();
    let mut used = HashSet::new();

    let recommendation = ValueRecommendation {
        budget_tier: build_tier_cards(raw.budget_tier, &by_id, &budget_products, &mut used),
        standard_tier: build_tier_cards(raw.standard_tier, &by_id, &standard_products, &mut used),
        premium_tier: build_tier_cards(raw.premium_tier, &by_id, &premium_products, &mut used),
        category,
    };

    ctx.cache
        .set(&cache_key, serde_json::to_value(&recommendation)?, None)
        .await;

    Ok((Recommendations::Value(recommendation), false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, price: i64) -> ProductCandidate {
        ProductCandidate {
            product_id: id.to_string(),
            title: id.to_string(),
            link: String::new(),
            image: None,
            low_price: price,
            high_price: None,
            mall_name: "mall".to_string(),
            brand: None,
            maker: None,
            category1: None,
            category2: None,
            category3: None,
            category4: None,
            source: "naver".to_string(),
            fetched_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn tier_split_thirds_a_nine_item_list() {
        let items: Vec<ProductCandidate> = (1..=9).map(|i| product(&i.to_string(), i * 1000)).collect();
        let (budget, standard, premium) = classify_by_price_tier(&items);
        assert_eq!(budget.len(), 3);
        assert_eq!(standard.len(), 3);
        assert_eq!(premium.len(), 3);
    }

    #[test]
    fn tier_split_never_leaves_a_tier_empty_with_few_items() {
        let items: Vec<ProductCandidate> = (1..=2).map(|i| product(&i.to_string(), i * 1000)).collect();
        let (budget, standard, premium) = classify_by_price_tier(&items);
        assert!(!budget.is_empty());
        assert!(!standard.is_empty());
        assert!(!premium.is_empty());
    }

    #[test]
    fn single_item_list_fills_all_three_tiers() {
        let items = vec![product("only", 1000)];
        let (budget, standard, premium) = classify_by_price_tier(&items);
        assert_eq!(budget.len(), 1);
        assert_eq!(standard.len(), 1);
        assert_eq!(premium.len(), 1);
    }

    #[test]
    fn category_falls_back_to_cleaned_keyword() {
        let category = extract_category(&[], &["가성비 키보드 추천".to_string()]);
        assert_eq!(category, "키보드");
    }
}
