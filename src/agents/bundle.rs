//! BUNDLE mode (spec §4.9.3): one search per item category, several
//! combinations proposed by the model, prices always recomputed from the
//! actual candidates rather than trusted from the model's reply.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache;
use crate::error::{Error, Result};
use crate::llm::{self, strip_code_fence, ChatMessage, GenerateOptions};
use crate::models::{BundleCombination, BundleItem, BundleRecommendation, ProductCandidate, Recommendations};
use crate::product_search::SearchParams;

use super::AgentContext;

const BUNDLE_TEMPERATURE: f32 = 0.5;
const MAX_ITEMS: usize = 5;
const MAX_COMBINATIONS: usize = 3;
const MAX_ALTERNATIVES: usize = 2;
const DEFAULT_TOTAL_BUDGET: i64 = 1_000_000;

const SYSTEM_PROMPT: &str = "당신은 묶음 구매 최적화 전문가입니다. 정확한 JSON 형식으로만 응답하세요.";

#[derive(Serialize)]
struct CacheParams<'a> {
    items: &'a [String],
    total_budget: i64,
}

#[derive(Deserialize)]
struct RawCombinationItem {
    item_category: String,
    selected_product_id: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct RawCombination {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    items: Vec<RawCombinationItem>,
    #[serde(default)]
    budget_fit: Option<bool>,
    #[serde(default)]
    adjustment_note: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawBundleResponse {
    #[serde(default)]
    combinations: Vec<RawCombination>,
}

fn extract_items(items: &[String], search_keywords: &[String]) -> Vec<String> {
    if !items.is_empty() {
        return items.iter().take(MAX_ITEMS).cloned().collect();
    }
    search_keywords.iter().take(MAX_ITEMS).cloned().collect()
}

fn build_category_list(categories: &[(String, Vec<ProductCandidate>)]) -> String {
    let mut out = String::new();
    for (category, products) in categories {
        out.push_str(&format!("\n[{category}]\n"));
        for (i, p) in products.iter().take(10).enumerate() {
            out.push_str(&format!(
                "  {}. [{}] {} - {}\n",
                i + 1,
                p.product_id,
                p.title,
                p.price_display()
            ));
        }
    }
    out
}

fn build_prompt(items: &[String], total_budget: i64, category_list: &str) -> String {
    format!(
        "함께 구매할 품목: {}\n총 예산: {}\n\n\
카테고리별 검색 결과:\n{category_list}\n\n\
예산 안에서 어울리는 조합을 2~3개 제안해주세요 (JSON만 출력):\n\
{{\n  \"combinations\": [\n    {{\n      \"description\": \"조합 설명\",\n      \"items\": [{{\"item_category\": \"카테고리\", \"selected_product_id\": \"ID\", \"reason\": \"선택 이유\"}}],\n      \"budget_fit\": true,\n      \"adjustment_note\": null\n    }}\n  ]\n}}\n",
        items.join(", "),
        crate::models::format_won(total_budget)
    )
}

fn build_bundle_item(
    raw: &RawCombinationItem,
    by_category: &HashMap<&str, &Vec<ProductCandidate>>,
) -> Option<BundleItem> {
    let products = by_category.get(raw.item_category.as_str())?;
    let product = products
        .iter()
        .find(|p| p.product_id == raw.selected_product_id)?;
    let alternatives = products
        .iter()
        .filter(|p| p.product_id != product.product_id)
        .take(MAX_ALTERNATIVES)
        .cloned()
        .collect();
    Some(BundleItem {
        item_category: raw.item_category.clone(),
        product: product.clone(),
        justification: raw.reason.clone().unwrap_or_default(),
        alternatives,
    })
}

fn default_combination(categories: &[(String, Vec<ProductCandidate>)], total_budget: i64) -> Option<BundleCombination> {
    let mut items = Vec::new();
    for (category, products) in categories {
        let product = products.first()?;
        let alternatives = products
            .iter()
            .skip(1)
            .take(MAX_ALTERNATIVES)
            .cloned()
            .collect();
        items.push(BundleItem {
            item_category: category.clone(),
            product: product.clone(),
            justification: "기본 추천".to_string(),
            alternatives,
        });
    }
    if items.is_empty() {
        return None;
    }
    let total_price: i64 = items.iter().map(|i| i.product.low_price).sum();
    Some(BundleCombination {
        label: "기본 조합".to_string(),
        budget_fit: total_price <= total_budget,
        items,
        total_price,
        adjustment_note: None,
    })
}

pub async fn run(ctx: AgentContext<'_>) -> Result<(Recommendations, bool)> {
    let total_budget = ctx
        .requirements
        .budget
        .as_ref()
        .and_then(|b| b.total_budget.or(Some(b.max_price).filter(|p| *p > 0)))
        .unwrap_or(DEFAULT_TOTAL_BUDGET);

    let cache_params = CacheParams {
        items: ctx.requirements.items.as_slice(),
        total_budget,
    };
    let cache_key = cache::make_recommendation_key("BUNDLE", ctx.session_id, &cache_params);

    if let Some(cached) = ctx.cache.get(&cache_key).await {
        if let Ok(recommendation) = serde_json::from_value::<BundleRecommendation>(cached) {
            return Ok((Recommendations::Bundle(recommendation), true));
        }
    }

    let items = extract_items(&ctx.requirements.items, ctx.search_keywords);

    let mut categories: Vec<(String, Vec<ProductCandidate>)> = Vec::new();
    for item in &items {
        let params = SearchParams::new(item.clone());
        match ctx.catalog.search(&params).await {
            Ok(result) if !result.items.is_empty() => categories.push((item.clone(), result.items)),
            Ok(_) => tracing::warn!(item = %item, "bundle agent found no candidates for item"),
            Err(e) => tracing::warn!(error = %e, item = %item, "bundle agent search failed"),
        }
    }

    if categories.is_empty() {
        return Err(Error::UpstreamUnavailable(
            "묶음 구매 품목의 상품을 찾지 못했습니다".into(),
        ));
    }

    let category_list = build_category_list(&categories);
    let prompt = build_prompt(&items, total_budget, &category_list);
    let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
    let response = ctx
        .llm
        .generate(
            &messages,
            GenerateOptions {
                model: llm::DEFAULT_MODEL.to_string(),
                temperature: BUNDLE_TEMPERATURE,
            },
        )
        .await?;

    let stripped = strip_code_fence(&response);
    let raw: RawBundleResponse = serde_json::from_str(stripped)
        .map_err(|e| Error::ModelResponseInvalid(e.to_string()))?;

    let by_category: HashMap<&str, &Vec<ProductCandidate>> = categories
        .iter()
        .map(|(category, products)| (category.as_str(), products))
        .collect();

    let mut combinations = Vec::new();
    for (i, raw_combo) in raw.combinations.into_iter().take(MAX_COMBINATIONS).enumerate() {
        let bundle_items: Vec<BundleItem> = raw_combo
            .items
            .iter()
            .filter_map(|item| build_bundle_item(item, &by_category))
            .collect();
        if bundle_items.is_empty() {
            continue;
        }
        // Never trust the model's own total; recompute from the resolved candidates.
        let total_price: i64 = bundle_items.iter().map(|item| item.product.low_price).sum();
        combinations.push(BundleCombination {
            label: raw_combo
                .description
                .unwrap_or_else(|| format!("조합 {}", i + 1)),
            items: bundle_items,
            total_price,
            budget_fit: raw_combo.budget_fit.unwrap_or(total_price <= total_budget),
            adjustment_note: raw_combo.adjustment_note,
        });
    }

    if combinations.is_empty() {
        if let Some(fallback) = default_combination(&categories, total_budget) {
            combinations.push(fallback);
        } else {
            return Err(Error::ModelResponseInvalid(
                "사용 가능한 묶음 조합을 생성하지 못했습니다".into(),
            ));
        }
    }

    let recommendation = BundleRecommendation {
        combinations,
        total_budget,
    };

    ctx.cache
        .set(&cache_key, serde_json::to_value(&recommendation)?, None)
        .await;

    Ok((Recommendations::Bundle(recommendation), false))
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
    fn default_combination_picks_first_product_per_category_and_sums_prices() {
        let categories = vec![
            ("노트북".to_string(), vec![product("a", 1_000_000), product("b", 900_000)]),
            ("마우스".to_string(), vec![product("c", 30_000)]),
        ];
        let combo = default_combination(&categories, 2_000_000).unwrap();
        assert_eq!(combo.items.len(), 2);
        assert_eq!(combo.total_price, 1_030_000);
        assert!(combo.budget_fit);
    }

    #[test]
    fn extract_items_prefers_explicit_items_over_keywords() {
        let items = extract_items(&["노트북".to_string()], &["가성비".to_string()]);
        assert_eq!(items, vec!["노트북"]);
    }
}
