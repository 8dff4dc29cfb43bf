//! Single-LLM-call intent classification + requirement extraction
//! (spec §4.6, §4.7).

use serde::Deserialize;

use crate::llm::{strip_code_fence, ChatMessage, GenerateOptions, GenerativeGateway};
use crate::models::{
    BudgetRange, Constraints, Gender, Intent, MissingField, Occasion, RecipientInfo, Relation,
    Requirements,
};

const ANALYSIS_PROMPT: &str = r#"당신은 쇼핑 요청을 분석하는 AI입니다.
사용자의 전체 대화 내용을 분석하여 의도와 요구사항을 추출하세요.

## 의도 분류 (5가지 중 하나 선택)

1. GIFT - 선물 추천
2. VALUE - 가성비 제품 비교
3. BUNDLE - 묶음 구매 최적화
4. REVIEW - 리뷰 기반 검증
5. TREND - 트렌드 추천

## 응답 형식 (JSON만 출력)

```json
{
  "intent": "GIFT|VALUE|BUNDLE|REVIEW|TREND",
  "confidence": 0.0~1.0,
  "budget": {"min_price": 숫자 또는 null, "max_price": 숫자 또는 null, "total_budget": 숫자 또는 null, "is_flexible": true/false},
  "items": ["품목1", "품목2"],
  "recipient": {"relation": "관계 또는 null", "gender": "male/female 또는 null", "age_group": "연령대 또는 null", "occasion": "상황 또는 null"},
  "search_keywords": ["검색에 사용할 키워드들"],
  "reasoning": "분석 근거"
}
```

정보가 없으면 null로 표시하세요."#;

const ANALYZER_MODEL: &str = "gpt-4o-mini";
const ANALYZER_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Deserialize, Default)]
struct RawBudget {
    min_price: Option<i64>,
    max_price: Option<i64>,
    total_budget: Option<i64>,
    #[serde(default)]
    is_flexible: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRecipient {
    relation: Option<String>,
    gender: Option<String>,
    age_group: Option<String>,
    occasion: Option<String>,
}

impl RawRecipient {
    fn is_empty(&self) -> bool {
        self.relation.is_none() && self.gender.is_none() && self.age_group.is_none() && self.occasion.is_none()
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawAnalysis {
    intent: Option<String>,
    confidence: Option<f32>,
    budget: Option<RawBudget>,
    #[serde(default)]
    items: Vec<String>,
    recipient: Option<RawRecipient>,
    #[serde(default)]
    search_keywords: Vec<String>,
}

pub struct AnalysisResult {
    pub intent: Intent,
    pub confidence: f32,
    pub requirements: Requirements,
    pub search_keywords: Vec<String>,
    pub clarification_needed: bool,
    pub clarification_field: Option<MissingField>,
    pub clarification_question: Option<String>,
}

fn parse_relation(raw: &str) -> Option<Relation> {
    match raw {
        "friend" => Some(Relation::Friend),
        "colleague" => Some(Relation::Colleague),
        "boss" => Some(Relation::Boss),
        "parent" => Some(Relation::Parent),
        "mother" => Some(Relation::Mother),
        "father" => Some(Relation::Father),
        "girlfriend" => Some(Relation::Girlfriend),
        "boyfriend" => Some(Relation::Boyfriend),
        "wife" => Some(Relation::Wife),
        "husband" => Some(Relation::Husband),
        "child" => Some(Relation::Child),
        "son" => Some(Relation::Son),
        "daughter" => Some(Relation::Daughter),
        "teacher" => Some(Relation::Teacher),
        "professor" => Some(Relation::Professor),
        _ => None,
    }
}

fn parse_occasion(raw: &str) -> Option<Occasion> {
    match raw {
        "birthday" => Some(Occasion::Birthday),
        "farewell" => Some(Occasion::Farewell),
        "welcome" => Some(Occasion::Welcome),
        "promotion" => Some(Occasion::Promotion),
        "wedding" => Some(Occasion::Wedding),
        "anniversary" => Some(Occasion::Anniversary),
        "christmas" => Some(Occasion::Christmas),
        "valentine" => Some(Occasion::Valentine),
        "whiteday" => Some(Occasion::Whiteday),
        "parents_day" => Some(Occasion::ParentsDay),
        "teachers_day" => Some(Occasion::TeachersDay),
        "graduation" => Some(Occasion::Graduation),
        "enrollment" => Some(Occasion::Enrollment),
        _ => None,
    }
}

fn parse_gender(raw: &str) -> Option<Gender> {
    match raw {
        "male" => Some(Gender::Male),
        "female" => Some(Gender::Female),
        _ => None,
    }
}

/// Missing-field rules (spec §4.7).
fn missing_fields(requirements: &Requirements, intent: Intent) -> Vec<MissingField> {
    let mut missing = Vec::new();
    match intent {
        Intent::Gift => {
            if requirements
                .recipient
                .as_ref()
                .and_then(|r| r.relation)
                .is_none()
            {
                missing.push(MissingField::Recipient);
            }
            if requirements.budget.is_none() {
                missing.push(MissingField::Budget);
            }
        }
        Intent::Value => {
            if requirements.items.is_empty() {
                missing.push(MissingField::Items);
            }
        }
        Intent::Bundle => {
            if requirements.items.len() < 2 {
                missing.push(MissingField::Items);
            }
            let has_total = requirements
                .budget
                .as_ref()
                .and_then(|b| b.total_budget.or(Some(b.max_price)))
                .is_some();
            if !has_total {
                missing.push(MissingField::Budget);
            }
        }
        Intent::Review => {
            if requirements.items.is_empty() {
                missing.push(MissingField::Items);
            }
        }
        Intent::Trend => {}
    }
    missing
}

/// Canned question text keyed by (field, intent), per spec §4.7.
fn clarification_question(field: MissingField, intent: Intent) -> (MissingField, String) {
    match field {
        MissingField::Recipient => (
            MissingField::Recipient,
            "선물 받으실 분이 누구인가요? (예: 친구, 동료, 부모님)".to_string(),
        ),
        MissingField::Budget => (
            MissingField::Budget,
            "예산이 어느 정도인가요? (예: 5만원, 10만원)".to_string(),
        ),
        MissingField::Items => {
            let question = if intent == Intent::Bundle {
                "어떤 품목들을 함께 구매하실 건가요?"
            } else {
                "어떤 종류의 제품을 찾으시나요?"
            };
            (MissingField::Items, question.to_string())
        }
    }
}

fn fallback_result() -> AnalysisResult {
    AnalysisResult {
        intent: Intent::Value,
        confidence: 0.3,
        requirements: Requirements {
            constraints: Constraints::default(),
            ..Default::default()
        },
        search_keywords: Vec::new(),
        clarification_needed: true,
        clarification_field: Some(MissingField::Items),
        clarification_question: Some("어떤 제품을 찾으시나요?".to_string()),
    }
}

/// Takes the session's accumulated user messages (already joined
/// space-separated by the caller), issues one generative call, and returns
/// the classified intent plus extracted requirements. Never propagates an
/// error: any failure (HTTP, parse) degrades to `fallback_result` per
/// spec §4.6, matching the source's catch-all behavior. Whether a failed
/// analysis should still increment `clarify_count` is left unspecified by
/// spec §9's open questions; this implementation does not increment it,
/// since the fallback's own clarify request is the first one for this turn.
pub async fn analyze(
    gateway: &dyn GenerativeGateway,
    full_context: &str,
    clarify_count: u8,
) -> AnalysisResult {
    match run_analysis(gateway, full_context, clarify_count).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "analyzer fell back to default classification");
            fallback_result()
        }
    }
}

async fn run_analysis(
    gateway: &dyn GenerativeGateway,
    full_context: &str,
    clarify_count: u8,
) -> crate::error::Result<AnalysisResult> {
    let messages = [
        ChatMessage::system(ANALYSIS_PROMPT),
        ChatMessage::user(format!("사용자 대화 내용:\n{full_context}")),
    ];
    let response = gateway
        .generate(
            &messages,
            GenerateOptions {
                model: ANALYZER_MODEL.to_string(),
                temperature: ANALYZER_TEMPERATURE,
            },
        )
        .await?;

    let stripped = strip_code_fence(&response);
    let raw: RawAnalysis = serde_json::from_str(stripped)
        .map_err(|e| crate::error::Error::ModelResponseInvalid(e.to_string()))?;

    let (intent, confidence) = match raw.intent.as_deref().and_then(Intent::parse) {
        Some(intent) => (intent, raw.confidence.unwrap_or(0.5)),
        None => (Intent::Value, 0.5),
    };

    let budget = raw.budget.and_then(|b| {
        if b.min_price.is_some() || b.max_price.is_some() || b.total_budget.is_some() {
            Some(BudgetRange {
                min_price: b.min_price.unwrap_or(0),
                max_price: b.max_price.unwrap_or(0),
                total_budget: b.total_budget,
                is_flexible: b.is_flexible.unwrap_or(true),
            })
        } else {
            None
        }
    });

    let recipient = raw.recipient.filter(|r| !r.is_empty()).map(|r| RecipientInfo {
        relation: r.relation.as_deref().and_then(parse_relation),
        gender: r.gender.as_deref().and_then(parse_gender),
        age_group: r.age_group,
        occasion: r.occasion.as_deref().and_then(parse_occasion),
    });

    let search_keywords = if raw.search_keywords.is_empty() {
        raw.items.clone()
    } else {
        raw.search_keywords
    };

    let mut requirements = Requirements {
        budget,
        items: raw.items,
        recipient,
        constraints: Constraints::default(),
        missing_fields: Vec::new(),
        clarify_count,
    };
    requirements.missing_fields = missing_fields(&requirements, intent);

    let clarification_needed = !requirements.missing_fields.is_empty() && clarify_count < 2;
    let (clarification_field, clarification_question_text) = if clarification_needed {
        let (field, question) = clarification_question(requirements.missing_fields[0], intent);
        (Some(field), Some(question))
    } else {
        (None, None)
    };

    Ok(AnalysisResult {
        intent,
        confidence,
        requirements,
        search_keywords,
        clarification_needed,
        clarification_field,
        clarification_question: clarification_question_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gift_requires_relation_and_budget() {
        let req = Requirements::default();
        assert_eq!(
            missing_fields(&req, Intent::Gift),
            vec![MissingField::Recipient, MissingField::Budget]
        );
    }

    #[test]
    fn bundle_requires_two_items_and_total_budget() {
        let mut req = Requirements {
            items: vec!["노트북".into()],
            ..Default::default()
        };
        assert!(missing_fields(&req, Intent::Bundle).contains(&MissingField::Items));
        req.items.push("마우스".into());
        req.budget = Some(BudgetRange {
            min_price: 0,
            max_price: 1_000_000,
            total_budget: Some(1_000_000),
            is_flexible: false,
        });
        assert!(missing_fields(&req, Intent::Bundle).is_empty());
    }

    #[test]
    fn trend_never_requires_anything() {
        assert!(missing_fields(&Requirements::default(), Intent::Trend).is_empty());
    }

    #[test]
    fn fallback_requests_items_clarification_at_low_confidence() {
        let result = fallback_result();
        assert_eq!(result.intent, Intent::Value);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.clarification_field, Some(MissingField::Items));
    }
}
