//! GIFT mode (spec §4.9.1): recipient-driven search query generation, a
//! single generative call, padding to a minimum card count.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::cache;
use crate::error::{Error, Result};
use crate::llm::{self, strip_code_fence, ChatMessage, GenerateOptions};
use crate::models::{
    BudgetRange, Card, Gender, GiftRecommendation, Occasion, ProductCandidate, Recommendations,
    RecipientInfo, Relation,
};
use crate::product_search::SearchParams;

use super::AgentContext;

const GIFT_TEMPERATURE: f32 = 0.7;
const MIN_CARDS: usize = 3;
const MAX_CARDS: usize = 6;
const MAX_QUERIES: usize = 3;
const MAX_PRODUCTS_SHOWN: usize = 20;

const SYSTEM_PROMPT: &str = "당신은 선물 추천 전문가입니다. 정확한 JSON 형식으로만 응답하세요.";

#[derive(Serialize)]
struct CacheParams<'a> {
    items: &'a [String],
    recipient: &'a Option<RecipientInfo>,
    budget: &'a Option<BudgetRange>,
}

#[derive(Deserialize)]
struct RawGiftItem {
    product_id: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawGiftResponse {
    #[serde(default)]
    recommendations: Vec<RawGiftItem>,
}

fn gender_korean(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "남성",
        Gender::Female => "여성",
    }
}

fn relation_korean(relation: Relation) -> &'static str {
    match relation {
        Relation::Friend => "친구",
        Relation::Colleague => "동료",
        Relation::Boss => "상사",
        Relation::Parent => "부모님",
        Relation::Mother => "엄마",
        Relation::Father => "아빠",
        Relation::Girlfriend => "여자친구",
        Relation::Boyfriend => "남자친구",
        Relation::Wife => "아내",
        Relation::Husband => "남편",
        Relation::Child => "자녀",
        Relation::Son => "아들",
        Relation::Daughter => "딸",
        Relation::Teacher => "선생님",
        Relation::Professor => "교수님",
    }
}

fn occasion_korean(occasion: Occasion) -> &'static str {
    match occasion {
        Occasion::Birthday => "생일",
        Occasion::Farewell => "퇴사",
        Occasion::Welcome => "입사",
        Occasion::Promotion => "승진",
        Occasion::Wedding => "결혼",
        Occasion::Anniversary => "기념일",
        Occasion::Christmas => "크리스마스",
        Occasion::Valentine => "발렌타인",
        Occasion::Whiteday => "화이트데이",
        Occasion::ParentsDay => "어버이날",
        Occasion::TeachersDay => "스승의날",
        Occasion::Graduation => "졸업",
        Occasion::Enrollment => "입학",
    }
}

/// Only these relations get a dedicated query; the rest fall through to the
/// occasion/gender-age queries or the default triplet (spec §4.9.1).
fn relation_query(relation: Relation) -> Option<String> {
    match relation {
        Relation::Colleague => Some("직장동료 선물".to_string()),
        Relation::Boss => Some("상사 선물".to_string()),
        Relation::Friend => Some("친구 선물".to_string()),
        Relation::Girlfriend => Some("여자친구 선물".to_string()),
        Relation::Boyfriend => Some("남자친구 선물".to_string()),
        Relation::Parent => Some("부모님 선물".to_string()),
        _ => None,
    }
}

fn generate_search_queries(recipient: &RecipientInfo) -> Vec<String> {
    let mut queries = Vec::new();

    if let (Some(age), Some(gender)) = (&recipient.age_group, recipient.gender) {
        queries.push(format!("{age} {} 선물", gender_korean(gender)));
    }

    if let Some(occasion) = recipient.occasion {
        queries.push(format!("{}선물", occasion_korean(occasion)));
    }

    if let Some(relation) = recipient.relation {
        if let Some(query) = relation_query(relation) {
            queries.push(query);
        }
    }

    if queries.is_empty() {
        queries.extend([
            "인기선물".to_string(),
            "베스트선물".to_string(),
            "추천선물".to_string(),
        ]);
    }

    queries.truncate(5);
    queries
}

fn build_recipient_summary(recipient: &RecipientInfo) -> String {
    let mut parts = Vec::new();
    if let Some(age) = &recipient.age_group {
        parts.push(age.clone());
    }
    if let Some(gender) = recipient.gender {
        parts.push(gender_korean(gender).to_string());
    }
    if let Some(relation) = recipient.relation {
        parts.push(relation_korean(relation).to_string());
    }
    if parts.is_empty() {
        parts.push("받는 분 정보 없음".to_string());
    }
    let mut summary = parts.join(" ");
    if let Some(occasion) = recipient.occasion {
        summary.push_str(&format!(" ({})", occasion_korean(occasion)));
    }
    summary
}

fn build_budget_info(budget: &Option<BudgetRange>) -> String {
    match budget {
        Some(b) if b.min_price > 0 && b.max_price > 0 => {
            format!(
                "{}~{}",
                crate::models::format_won(b.min_price),
                crate::models::format_won(b.max_price)
            )
        }
        Some(b) if b.total_budget.is_some() => {
            format!("약 {}", crate::models::format_won(b.total_budget.unwrap()))
        }
        Some(b) if b.max_price > 0 => format!("최대 {}", crate::models::format_won(b.max_price)),
        _ => "지정되지 않음".to_string(),
    }
}

fn build_product_list(products: &[ProductCandidate]) -> String {
    let mut out = String::new();
    for (i, p) in products.iter().take(MAX_PRODUCTS_SHOWN).enumerate() {
        out.push_str(&format!(
            "{}. [{}] {} - {} ({})\n",
            i + 1,
            p.product_id,
            p.title,
            p.price_display(),
            p.mall_name
        ));
    }
    if out.is_empty() {
        out.push_str("검색 결과 없음\n");
    }
    out
}

fn build_prompt(recipient_summary: &str, budget_info: &str, product_list: &str) -> String {
    format!(
        "당신은 선물 추천 전문가입니다.\n\
사용자가 선물을 찾고 있습니다.\n\n\
받는 분: {recipient_summary}\n\
예산: {budget_info}\n\n\
검색된 상품 목록:\n{product_list}\n\
위 상품 목록에서 3~6개를 선택해 다음 형식으로 추천해주세요 (JSON만 출력):\n\
{{\n  \"recommendations\": [\n    {{\"product_id\": \"목록에 있는 ID\", \"reason\": \"추천 이유\"}}\n  ]\n}}\n"
    )
}

pub async fn run(ctx: AgentContext<'_>) -> Result<(Recommendations, bool)> {
    let cache_params = CacheParams {
        items: ctx.requirements.items.as_slice(),
        recipient: &ctx.requirements.recipient,
        budget: &ctx.requirements.budget,
    };
    let cache_key = cache::make_recommendation_key("GIFT", ctx.session_id, &cache_params);

    if let Some(cached) = ctx.cache.get(&cache_key).await {
        if let Ok(recommendation) = serde_json::from_value::<GiftRecommendation>(cached) {
            return Ok((Recommendations::Gift(recommendation), true));
        }
    }

    let recipient = ctx.requirements.recipient.clone().unwrap_or_default();
    let budget = ctx.requirements.budget.clone();
    let queries = generate_search_queries(&recipient);

    let mut unique: HashMap<String, ProductCandidate> = HashMap::new();
    for query in queries.iter().take(MAX_QUERIES) {
        let mut params = SearchParams::new(query.clone());
        params.display = 20;
        if let Some(b) = &budget {
            if b.min_price > 0 {
                params.min_price = Some(b.min_price);
            }
            if b.max_price > 0 {
                params.max_price = Some(b.max_price);
            }
        }
        match ctx.catalog.search(&params).await {
            Ok(result) => {
                for item in result.items {
                    unique.entry(item.product_id.clone()).or_insert(item);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "gift agent search failed");
            }
        }
    }

    if unique.is_empty() {
        return Err(Error::UpstreamUnavailable(
            "선물 후보 상품을 찾지 못했습니다".into(),
        ));
    }

    let candidates: Vec<ProductCandidate> = unique.into_values().collect();
    let product_list = build_product_list(&candidates);
    let recipient_summary = build_recipient_summary(&recipient);
    let budget_info = build_budget_info(&budget);

    let prompt = build_prompt(&recipient_summary, &budget_info, &product_list);
    let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
    let response = ctx
        .llm
        .generate(
            &messages,
            GenerateOptions {
                model: llm::DEFAULT_MODEL.to_string(),
                temperature: GIFT_TEMPERATURE,
            },
        )
        .await?;

    let stripped = strip_code_fence(&response);
    let raw: RawGiftResponse = serde_json::from_str(stripped)
        .map_err(|e| Error::ModelResponseInvalid(e.to_string()))?;

    let by_id: HashMap<&str, &ProductCandidate> = candidates
        .iter()
        .map(|p| (p.product_id.as_str(), p))
        .collect();

    let mut cards = Vec::new();
    let mut used = HashSet::new();
    for item in raw.recommendations.into_iter().take(MAX_CARDS) {
        if let Some(product) = by_id.get(item.product_id.as_str()) {
            cards.push(Card {
                product: (*product).clone(),
                recommendation_reason: item.reason.unwrap_or_default(),
                warnings: Vec::new(),
            });
            used.insert(item.product_id);
        }
    }

    // Pad to the minimum card count from the remaining candidates (spec §4.9.1).
    for product in &candidates {
        if cards.len() >= MIN_CARDS {
            break;
        }
        if used.contains(&product.product_id) {
            continue;
        }
        cards.push(Card {
            product: product.clone(),
            recommendation_reason: "추천 상품".to_string(),
            warnings: Vec::new(),
        });
        used.insert(product.product_id.clone());
    }

    let recommendation = GiftRecommendation {
        cards,
        recipient_summary,
        occasion: recipient.occasion.map(|o| occasion_korean(o).to_string()),
        budget_range: Some(budget_info),
    };

    ctx.cache
        .set(&cache_key, serde_json::to_value(&recommendation)?, None)
        .await;

    Ok((Recommendations::Gift(recommendation), false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_default_triplet_with_no_signals() {
        let queries = generate_search_queries(&RecipientInfo::default());
        assert_eq!(queries, vec!["인기선물", "베스트선물", "추천선물"]);
    }

    #[test]
    fn occasion_and_relation_both_contribute_queries() {
        let recipient = RecipientInfo {
            relation: Some(Relation::Colleague),
            occasion: Some(Occasion::Farewell),
            ..Default::default()
        };
        let queries = generate_search_queries(&recipient);
        assert!(queries.contains(&"퇴사선물".to_string()));
        assert!(queries.contains(&"직장동료 선물".to_string()));
    }

    #[test]
    fn budget_info_prefers_range_over_total() {
        let budget = Some(BudgetRange {
            min_price: 40_000,
            max_price: 60_000,
            total_budget: Some(50_000),
            is_flexible: false,
        });
        assert_eq!(build_budget_info(&budget), "40,000원~60,000원");
    }
}
