//! REVIEW mode (spec §4.9.4): catalog search is advisory only here — a
//! failed or empty search does not abort the turn, since the review
//! analysis is grounded in the category, not in any specific candidate.

use serde::{Deserialize, Serialize};

use crate::cache;
use crate::error::{Error, Result};
use crate::llm::{self, strip_code_fence, ChatMessage, GenerateOptions};
use crate::models::{Frequency, ReviewAnalysis, ReviewComplaint, Recommendations, Sentiment, Severity};
use crate::product_search::{SearchParams, Sort};

use super::AgentContext;

const REVIEW_TEMPERATURE: f32 = 0.5;
const SEARCH_DISPLAY: usize = 15;
const MAX_COMPLAINTS: usize = 5;

const DISCLAIMER: &str =
    "이 분석은 일반적인 리뷰 정보를 기반으로 합니다. 개인의 사용 환경에 따라 다를 수 있습니다.";

const SYSTEM_PROMPT: &str = "당신은 상품 리뷰 분석 전문가입니다. 정확한 JSON 형식으로만 응답하세요.";

#[derive(Serialize)]
struct CacheParams<'a> {
    items: &'a [String],
    search_keywords: &'a [String],
}

#[derive(Deserialize)]
struct RawComplaint {
    rank: u8,
    issue: String,
    frequency: Frequency,
    severity: Severity,
}

#[derive(Deserialize, Default)]
struct RawReviewResponse {
    #[serde(default)]
    top_complaints: Vec<RawComplaint>,
    #[serde(default)]
    not_recommended_conditions: Vec<String>,
    #[serde(default)]
    management_tips: Vec<String>,
    #[serde(default)]
    overall_sentiment: Option<Sentiment>,
}

fn extract_category(items: &[String], search_keywords: &[String]) -> String {
    if let Some(first) = items.first() {
        return first.clone();
    }
    if let Some(keyword) = search_keywords.first() {
        let cleaned = keyword
            .replace("사도 돼", "")
            .replace("괜찮아", "")
            .replace('?', "");
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() {
            return cleaned.to_string();
        }
    }
    "상품".to_string()
}

fn default_complaint() -> ReviewComplaint {
    ReviewComplaint {
        rank: 1,
        issue: "구체적인 리뷰 정보가 부족합니다".to_string(),
        frequency: Frequency::Medium,
        severity: Severity::Low,
    }
}

fn build_prompt(category: &str, product_count: usize) -> String {
    format!(
        "카테고리: {category}\n검색된 관련 상품 수: {product_count}\n\n\
해당 카테고리 제품에 대한 일반적인 리뷰 불만 사항을 분석해주세요 (JSON만 출력):\n\
{{\n  \"top_complaints\": [{{\"rank\": 1, \"issue\": \"...\", \"frequency\": \"많음|보통|적음\", \"severity\": \"high|medium|low\"}}],\n  \"not_recommended_conditions\": [\"...\"],\n  \"management_tips\": [\"...\"],\n  \"overall_sentiment\": \"positive|mixed|negative\"\n}}\n\n최대 5개의 불만 사항을 순위별로 작성해주세요.\n"
    )
}

pub async fn run(ctx: AgentContext<'_>) -> Result<(Recommendations, bool)> {
    let cache_params = CacheParams {
        items: ctx.requirements.items.as_slice(),
        search_keywords: ctx.search_keywords,
    };
    let cache_key = cache::make_recommendation_key("REVIEW", ctx.session_id, &cache_params);

    if let Some(cached) = ctx.cache.get(&cache_key).await {
        if let Ok(recommendation) = serde_json::from_value::<ReviewAnalysis>(cached) {
            return Ok((Recommendations::Review(recommendation), true));
        }
    }

    let category = extract_category(&ctx.requirements.items, ctx.search_keywords);

    let mut params = SearchParams::new(category.clone());
    params.display = SEARCH_DISPLAY;
    params.sort = Sort::Similarity;
    let product_count = match ctx.catalog.search(&params).await {
        Ok(result) => result.items.len(),
        Err(e) => {
            tracing::warn!(error = %e, category = %category, "review agent search failed, proceeding without candidates");
            0
        }
    };

    let prompt = build_prompt(&category, product_count);
    let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];
    let response = ctx
        .llm
        .generate(
            &messages,
            GenerateOptions {
                model: llm::DEFAULT_MODEL.to_string(),
                temperature: REVIEW_TEMPERATURE,
            },
        )
        .await?;

    let stripped = strip_code_fence(&response);
    let raw: RawReviewResponse = serde_json::from_str(stripped)
        .map_err(|e| Error::ModelResponseInvalid(e.to_string()))?;

    let mut complaints: Vec<ReviewComplaint> = raw
        .top_complaints
        .into_iter()
        .take(MAX_COMPLAINTS)
        .map(|c| ReviewComplaint {
            rank: c.rank,
            issue: c.issue,
            frequency: c.frequency,
            severity: c.severity,
        })
        .collect();
    if complaints.is_empty() {
        complaints.push(default_complaint());
    }

    let recommendation = ReviewAnalysis {
        category,
        complaints,
        not_recommended_conditions: raw.not_recommended_conditions,
        management_tips: raw.management_tips,
        overall_sentiment: raw.overall_sentiment.unwrap_or(Sentiment::Mixed),
        disclaimer: DISCLAIMER.to_string(),
    };

    ctx.cache
        .set(&cache_key, serde_json::to_value(&recommendation)?, None)
        .await;

    Ok((Recommendations::Review(recommendation), false))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_strips_question_phrasing() {
        assert_eq!(
            extract_category(&[], &["에어프라이어 사도 돼?".to_string()]),
            "에어프라이어"
        );
    }

    #[test]
    fn default_complaint_used_when_llm_returns_none() {
        let complaint = default_complaint();
        assert_eq!(complaint.rank, 1);
        assert_eq!(complaint.severity, Severity::Low);
    }
}
