//! Orchestrator graph (spec §4.8). The source's LangGraph `StateGraph` with a
//! dynamically-typed state bag is replaced with a tagged-variant state
//! machine: the turn's outcome is always exactly one of `Recommendation`,
//! `Clarification`, or `Error` (spec §8 invariant 3), modeled as an enum
//! rather than an open map with nullable fields (spec §9 design note).

use std::time::Duration;

use serde::Serialize;

use crate::agents::{self, AgentContext};
use crate::analyzer;
use crate::cache::TtlCache;
use crate::error::Error;
use crate::llm::GenerativeGateway;
use crate::models::{Intent, MessageRole, Recommendations, Requirements, Session};
use crate::product_search::CatalogGateway;

/// Soft deadline for a full chat turn (spec §5).
pub const TURN_DEADLINE: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    #[serde(rename = "type")]
    pub kind: ChatResponseKind,
    pub intent: Option<Intent>,
    pub recommendations: Option<Recommendations>,
    pub clarification: Option<ClarificationPayload>,
    pub error_message: Option<String>,
    pub fallback_suggestions: Vec<String>,
    pub processing_time_ms: u64,
    pub cached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatResponseKind {
    Recommendation,
    Clarification,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClarificationPayload {
    pub field: String,
    pub question: String,
    pub clarify_count: u8,
}

/// Routes by intent, defaulting to VALUE (spec §4.8).
fn route_by_intent(intent: Intent) -> Intent {
    intent
}

/// `clarification_needed = (missing_fields non-empty) ∧ (clarify_count < 2)`.
/// Exposed standalone so it can be unit-tested without a live gateway.
pub fn should_clarify(missing_field_count: usize, clarify_count: u8) -> bool {
    missing_field_count > 0 && clarify_count < 2
}

pub struct Services<'a> {
    pub catalog: &'a dyn CatalogGateway,
    pub llm: &'a dyn GenerativeGateway,
    pub cache: &'a TtlCache,
}

/// Runs one chat turn: append the user message to session memory (this must
/// happen before analysis — spec §5 happens-before), analyze, either
/// terminate with a clarification or dispatch to a mode agent.
pub async fn process_turn(
    services: &Services<'_>,
    session: &mut Session,
    message: &str,
    preference_context: Option<&str>,
) -> ChatResponse {
    let start = std::time::Instant::now();

    session.append_message(MessageRole::User, message.to_string());
    session.turn_count += 1;

    let result = tokio::time::timeout(TURN_DEADLINE, run_turn(services, session, preference_context)).await;

    let elapsed_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(response) => ChatResponse {
            processing_time_ms: elapsed_ms,
            ..response
        },
        Err(_) => ChatResponse {
            kind: ChatResponseKind::Error,
            intent: None,
            recommendations: None,
            clarification: None,
            error_message: Some("deadline_exceeded".to_string()),
            fallback_suggestions: vec!["다시 시도해 주세요".to_string()],
            processing_time_ms: elapsed_ms,
            cached: false,
        },
    }
}

async fn run_turn(
    services: &Services<'_>,
    session: &mut Session,
    preference_context: Option<&str>,
) -> ChatResponse {
    let full_context = session.user_messages_joined();
    let clarify_count = session
        .requirements
        .as_ref()
        .map(|r| r.clarify_count)
        .unwrap_or(0);

    let analysis = analyzer::analyze(services.llm, &full_context, clarify_count).await;

    session.intent = Some(analysis.intent);
    let mut requirements: Requirements = analysis.requirements;

    if should_clarify(requirements.missing_fields.len(), clarify_count) {
        requirements.bump_clarify_count();
        session.requirements = Some(requirements.clone());
        return ChatResponse {
            kind: ChatResponseKind::Clarification,
            intent: Some(analysis.intent),
            recommendations: None,
            clarification: Some(ClarificationPayload {
                field: analysis
                    .clarification_field
                    .map(|f| format!("{f:?}").to_lowercase())
                    .unwrap_or_default(),
                question: analysis.clarification_question.unwrap_or_default(),
                clarify_count: requirements.clarify_count,
            }),
            error_message: None,
            fallback_suggestions: Vec::new(),
            processing_time_ms: 0,
            cached: false,
        };
    }

    session.requirements = Some(requirements.clone());
    let intent = route_by_intent(analysis.intent);

    let ctx = AgentContext {
        requirements: &requirements,
        search_keywords: &analysis.search_keywords,
        session_id: &session.id,
        catalog: services.catalog,
        llm: services.llm,
        cache: services.cache,
        preference_context,
    };

    match agents::run(intent, ctx).await {
        Ok((recommendations, cached)) => ChatResponse {
            kind: ChatResponseKind::Recommendation,
            intent: Some(intent),
            recommendations: Some(recommendations),
            clarification: None,
            error_message: None,
            fallback_suggestions: Vec::new(),
            processing_time_ms: 0,
            cached,
        },
        Err(e) => agent_error_response(intent, e),
    }
}

fn agent_error_response(intent: Intent, error: Error) -> ChatResponse {
    let (message, suggestions) = match &error {
        Error::UpstreamUnavailable(msg) => (
            msg.clone(),
            vec!["다른 키워드로 다시 검색해 보세요".to_string()],
        ),
        Error::ModelResponseInvalid(msg) => (
            msg.clone(),
            vec!["잠시 후 다시 시도해 주세요".to_string()],
        ),
        other => (other.to_string(), Vec::new()),
    };
    ChatResponse {
        kind: ChatResponseKind::Error,
        intent: Some(intent),
        recommendations: None,
        clarification: None,
        error_message: Some(message),
        fallback_suggestions: suggestions,
        processing_time_ms: 0,
        cached: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clarify_only_below_count_two() {
        assert!(should_clarify(1, 0));
        assert!(should_clarify(1, 1));
        assert!(!should_clarify(1, 2));
        assert!(!should_clarify(0, 0));
    }

    #[test]
    fn error_response_carries_no_recommendations() {
        let response = agent_error_response(Intent::Value, Error::Other("boom".to_string()));
        assert_eq!(response.kind, ChatResponseKind::Error);
        assert!(response.recommendations.is_none());
        assert!(response.error_message.is_some());
    }
}
