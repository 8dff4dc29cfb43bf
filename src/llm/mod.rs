//! Provider-agnostic generative-text gateway (spec §4.3). Generalizes the
//! teacher's `TollboothClient`/`LLMClient` trait (formerly `llm/client.rs`) —
//! a single OpenAI-compatible chat-completions caller behind a proxy — into a
//! trait with two concrete backends, since this crate talks to providers
//! directly rather than through an internal budget-enforcement proxy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{LlmProvider, Settings};
use crate::error::{Error, Result};
use crate::http_client;

/// Model used by the analyzer and the five mode agents alike, since none of
/// them need a model choice exposed as a tunable (spec §4.3 treats the model
/// as an implementation detail of the gateway, not a per-call parameter).
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub model: String,
    pub temperature: f32,
}

/// Capability interface for the generative model (spec §4.3). Providers are
/// pluggable; selection is a process-wide configuration option
/// (`config::Settings::llm_provider`).
#[async_trait]
pub trait GenerativeGateway: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage], options: GenerateOptions) -> Result<String>;
}

pub fn build_gateway(settings: &Settings) -> Result<Box<dyn GenerativeGateway>> {
    match settings.llm_provider {
        LlmProvider::OpenAi => Ok(Box::new(OpenAiGateway::new(settings.openai_api_key.clone())?)),
        LlmProvider::Gemini => Ok(Box::new(GeminiGateway::new(settings.google_api_key.clone())?)),
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

pub struct OpenAiGateway {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiGateway {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Configuration("OPENAI_API_KEY is required".into()));
        }
        Ok(OpenAiGateway {
            client: http_client::gateway_client(),
            api_key,
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
        })
    }
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiResponseMessage,
}

#[derive(Deserialize)]
struct OpenAiResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[async_trait]
impl GenerativeGateway for OpenAiGateway {
    async fn generate(&self, messages: &[ChatMessage], options: GenerateOptions) -> Result<String> {
        let request = OpenAiRequest {
            model: options.model,
            messages: messages
                .iter()
                .map(|m| OpenAiMessage {
                    role: role_str(m.role),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: options.temperature,
        };

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        match response.status().as_u16() {
            200 => {
                let body: OpenAiResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::ModelResponseInvalid(e.to_string()))?;
                body.choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| Error::ModelResponseInvalid("no choices in response".into()))
            }
            401 => Err(Error::UpstreamAuth("OpenAI rejected credentials".into())),
            429 => Err(Error::UpstreamRateLimited("OpenAI rate limit".into())),
            status => Err(Error::UpstreamUnavailable(format!("OpenAI HTTP {status}"))),
        }
    }
}

pub struct GeminiGateway {
    client: reqwest::Client,
    api_key: String,
}

impl GeminiGateway {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Configuration("GOOGLE_API_KEY is required".into()));
        }
        Ok(GeminiGateway {
            client: http_client::gateway_client(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiContent {
    role: &'static str,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    text: String,
}

#[async_trait]
impl GenerativeGateway for GeminiGateway {
    async fn generate(&self, messages: &[ChatMessage], options: GenerateOptions) -> Result<String> {
        // Gemini has no system role; fold system messages into the next user turn.
        let mut system_preamble = String::new();
        let mut contents = Vec::new();
        for m in messages {
            match m.role {
                Role::System => {
                    if !system_preamble.is_empty() {
                        system_preamble.push('\n');
                    }
                    system_preamble.push_str(&m.content);
                }
                Role::User => {
                    let text = if system_preamble.is_empty() {
                        m.content.clone()
                    } else {
                        let combined = format!("{}\n\n{}", system_preamble, m.content);
                        system_preamble.clear();
                        combined
                    };
                    contents.push(GeminiContent {
                        role: "user",
                        parts: vec![GeminiPart { text }],
                    });
                }
                Role::Assistant => contents.push(GeminiContent {
                    role: "model",
                    parts: vec![GeminiPart {
                        text: m.content.clone(),
                    }],
                }),
            }
        }

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            options.model, self.api_key
        );

        let request = GeminiRequest {
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: options.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(e.to_string()))?;

        match response.status().as_u16() {
            200 => {
                let body: GeminiResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::ModelResponseInvalid(e.to_string()))?;
                body.candidates
                    .into_iter()
                    .next()
                    .and_then(|c| c.content.parts.into_iter().next())
                    .map(|p| p.text)
                    .ok_or_else(|| Error::ModelResponseInvalid("no candidates in response".into()))
            }
            401 | 403 => Err(Error::UpstreamAuth("Gemini rejected credentials".into())),
            429 => Err(Error::UpstreamRateLimited("Gemini rate limit".into())),
            status => Err(Error::UpstreamUnavailable(format!("Gemini HTTP {status}"))),
        }
    }
}

/// Strips a fenced code block (` ```json ... ``` ` or bare ` ``` `) from a
/// model reply before JSON parsing (spec §4.6, §9: JSON-through-LLM protocol).
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn passes_through_unfenced_text() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }
}
