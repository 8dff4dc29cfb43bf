//! TREND mode (spec §4.9.5): seasonal keyword search plus a category-aware
//! prepend, with a non-LLM fallback when the model returns no usable items.

use std::collections::HashMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::cache;
use crate::error::{Error, Result};
use crate::llm::{self, strip_code_fence, ChatMessage, GenerateOptions};
use crate::models::{ProductCandidate, Recommendations, TrendSignal, TrendingItem};
use crate::product_search::{SearchParams, Sort};

use super::AgentContext;

const TREND_TEMPERATURE: f32 = 0.7;
const SEARCH_DISPLAY: usize = 10;
const MAX_TRENDING_ITEMS: usize = 5;
const MAX_PRODUCTS_PER_ITEM: usize = 3;

const SYSTEM_PROMPT: &str = "당신은 쇼핑 트렌드 분석 전문가입니다. 정확한 JSON 형식으로만 응답하세요.";

fn seasonal_keywords(month: u32) -> &'static [&'static str] {
    match month {
        3 | 4 | 5 => &["미세먼지 마스크", "공기청정기", "봄옷", "러닝화", "골프용품"],
        6 | 7 | 8 => &["선풍기", "에어컨", "여행용품", "수영복", "아이스박스"],
        9 | 10 | 11 => &["가을옷", "등산용품", "김장용품", "난방기", "블랭킷"],
        _ => &["패딩", "난방텐트", "가습기", "전기장판", "크리스마스 선물"],
    }
}

#[derive(Serialize)]
struct CacheParams<'a> {
    items: &'a [String],
    search_keywords: &'a [String],
}

#[derive(Deserialize)]
struct RawTrendingItem {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    keyword: Option<String>,
    #[serde(default)]
    growth_rate: Option<String>,
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    target_segment: Option<String>,
    #[serde(default)]
    why_trending: Option<String>,
    #[serde(default)]
    recommended_products: Vec<String>,
}

#[derive(Deserialize, Default)]
struct RawTrendResponse {
    #[serde(default)]
    trending_items: Vec<RawTrendingItem>,
}

fn extract_category(items: &[String], search_keywords: &[String]) -> String {
    if let Some(first) = items.first() {
        return first.clone();
    }
    if let Some(keyword) = search_keywords.first() {
        let cleaned = keyword
            .replace("요즘", "")
            .replace("인기", "")
            .replace("뭐 사", "");
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() {
            return cleaned.to_string();
        }
    }
    "전체".to_string()
}

fn build_trend_keywords(category: &str, month: u32) -> Vec<String> {
    let seasonal: Vec<String> = seasonal_keywords(month).iter().map(|s| s.to_string()).collect();
    if category != "전체" {
        let mut keywords = vec![format!("인기 {category}"), format!("{category} 추천")];
        keywords.extend(seasonal.into_iter().take(2));
        keywords
    } else {
        seasonal.into_iter().take(3).collect()
    }
}

fn build_products_block(all_products: &[(String, Vec<ProductCandidate>)]) -> String {
    let mut out = String::new();
    for (keyword, products) in all_products {
        out.push_str(&format!("\n[{keyword}]\n"));
        for (i, p) in products.iter().take(5).enumerate() {
            out.push_str(&format!(
                "  {}. [{}] {} - {}\n",
                i + 1,
                p.product_id,
                p.title,
                p.price_display()
            ));
        }
    }
    if out.is_empty() {
        out.push_str("검색 결과 없음\n");
    }
    out
}

fn build_prompt(category: &str, current_date: &str, products_block: &str) -> String {
    format!(
        "카테고리: {category}\n현재 날짜: {current_date}\n\n\
검색된 인기 상품:\n{products_block}\n\n\
3~5개의 트렌드 아이템을 다음 형식으로 분석해주세요 (JSON만 출력):\n\
{{\n  \"trending_items\": [\n    {{\n      \"category\": \"세부 카테고리\",\n      \"keyword\": \"트렌드 키워드\",\n      \"growth_rate\": \"+50%\",\n      \"period\": \"최근 1개월\",\n      \"target_segment\": \"주요 구매층\",\n      \"why_trending\": \"인기 이유\",\n      \"recommended_products\": [\"상품 ID\"]\n    }}\n  ]\n}}\n"
    )
}

pub async fn run(ctx: AgentContext<'_>) -> Result<(Recommendations, bool)> {
    let cache_params = CacheParams {
        items: ctx.requirements.items.as_slice(),
        search_keywords: ctx.search_keywords,
    };
    let cache_key = cache::make_recommendation_key("TREND", ctx.session_id, &cache_params);

    if let Some(cached) = ctx.cache.get(&cache_key).await {
        if let Ok(recommendation) = serde_json::from_value::<TrendSignal>(cached) {
            return Ok((Recommendations::Trend(recommendation), true));
        }
    }

    let category = extract_category(&ctx.requirements.items, ctx.search_keywords);
    let now = chrono::Utc::now();
    let trend_keywords = build_trend_keywords(&category, now.month());

    let mut all_products: Vec<(String, Vec<ProductCandidate>)> = Vec::new();
    for keyword in &trend_keywords {
        let mut params = SearchParams::new(keyword.clone());
        params.display = SEARCH_DISPLAY;
        params.sort = Sort::Date;
        match ctx.catalog.search(&params).await {
            Ok(result) => all_products.push((keyword.clone(), result.items)),
            Err(e) => tracing::warn!(error = %e, keyword = %keyword, "trend agent search failed"),
        }
    }

    let products_block = build_products_block(&all_products);
    let prompt = build_prompt(&category, &now.format("%Y-%m-%d").to_string(), &products_block);
    let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
    let response = ctx
        .llm
        .generate(
            &messages,
            GenerateOptions {
                model: llm::DEFAULT_MODEL.to_string(),
                temperature: TREND_TEMPERATURE,
            },
        )
        .await?;

    let stripped = strip_code_fence(&response);
    let raw: RawTrendResponse = serde_json::from_str(stripped)
        .map_err(|e| Error::ModelResponseInvalid(e.to_string()))?;

    let product_map: HashMap<&str, &ProductCandidate> = all_products
        .iter()
        .flat_map(|(_, products)| products.iter())
        .map(|p| (p.product_id.as_str(), p))
        .collect();

    let mut trending_items: Vec<TrendingItem> = Vec::new();
    for raw_item in raw.trending_items.into_iter().take(MAX_TRENDING_ITEMS) {
        let mut products: Vec<ProductCandidate> = raw_item
            .recommended_products
            .iter()
            .take(MAX_PRODUCTS_PER_ITEM)
            .filter_map(|id| product_map.get(id.as_str()).map(|p| (*p).clone()))
            .collect();

        if products.is_empty() {
            let keyword_lower = raw_item.keyword.clone().unwrap_or_default().to_lowercase();
            if let Some((_, matched)) = all_products
                .iter()
                .find(|(kw, prods)| kw.to_lowercase().contains(&keyword_lower) && !prods.is_empty())
            {
                products = matched.iter().take(2).cloned().collect();
            }
        }

        trending_items.push(TrendingItem {
            category: raw_item.category.unwrap_or_else(|| category.clone()),
            keyword: raw_item.keyword.unwrap_or_default(),
            growth_rate: raw_item.growth_rate.unwrap_or_else(|| "인기".to_string()),
            period: raw_item.period.unwrap_or_else(|| "최근 1개월".to_string()),
            target_segment: raw_item.target_segment.unwrap_or_else(|| "전체".to_string()),
            why_trending: raw_item.why_trending.unwrap_or_else(|| "트렌드 상품".to_string()),
            recommended_products: products,
        });
    }

    if trending_items.is_empty() {
        for (keyword, products) in all_products.iter().take(3) {
            if products.is_empty() {
                continue;
            }
            trending_items.push(TrendingItem {
                category: category.clone(),
                keyword: keyword.clone(),
                growth_rate: "인기".to_string(),
                period: "최근 1개월".to_string(),
                target_segment: "전체".to_string(),
                why_trending: "인기 상품".to_string(),
                recommended_products: products.iter().take(2).cloned().collect(),
            });
        }
    }

    if trending_items.is_empty() {
        return Err(Error::UpstreamUnavailable(
            "트렌드 상품을 찾지 못했습니다".into(),
        ));
    }

    let recommendation = TrendSignal {
        items: trending_items,
    };

    ctx.cache
        .set(&cache_key, serde_json::to_value(&recommendation)?, None)
        .await;

    Ok((Recommendations::Trend(recommendation), false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seasonal_keywords_switch_by_month() {
        assert_eq!(seasonal_keywords(7)[0], "선풍기");
        assert_eq!(seasonal_keywords(1)[0], "패딩");
    }

    #[test]
    fn category_prepends_keywords_when_present() {
        let keywords = build_trend_keywords("노트북", 7);
        assert_eq!(keywords[0], "인기 노트북");
        assert_eq!(keywords[1], "노트북 추천");
        assert_eq!(keywords.len(), 4);
    }

    #[test]
    fn default_category_uses_plain_seasonal_keywords() {
        let keywords = build_trend_keywords("전체", 7);
        assert_eq!(keywords.len(), 3);
        assert_eq!(keywords[0], "선풍기");
    }
}
