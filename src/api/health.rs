//! Health endpoint (spec §6).

use serde::Serialize;

use crate::client::Services;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Up,
    Down,
    Unchecked,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub llm_provider: String,
    pub naver_api: ServiceState,
    pub active_sessions: usize,
}

pub async fn health(services: &Services) -> HealthReport {
    let llm_ok = services.settings.llm_configured();
    let catalog_ok = services.settings.catalog_configured();

    let status = match (llm_ok, catalog_ok) {
        (true, true) => HealthState::Healthy,
        (false, false) => HealthState::Unhealthy,
        _ => HealthState::Degraded,
    };

    let llm_provider = match services.settings.llm_provider {
        crate::config::LlmProvider::OpenAi => "openai",
        crate::config::LlmProvider::Gemini => "gemini",
    }
    .to_string();

    HealthReport {
        status,
        llm_provider,
        naver_api: if catalog_ok { ServiceState::Up } else { ServiceState::Unchecked },
        active_sessions: services.sessions.get_active_count().await,
    }
}
