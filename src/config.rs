//! Process-wide configuration loaded from environment variables.
//!
//! Mirrors the teacher's direct `std::env::var` style (see `database/mod.rs`,
//! `client.rs`) rather than a config-file crate. `dotenvy::dotenv()` is
//! loaded once in `main` before this is constructed.

use std::env;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Gemini,
}

impl LlmProvider {
    fn parse(raw: &str) -> Self {
        match raw {
            "gemini" => LlmProvider::Gemini,
            _ => LlmProvider::OpenAi,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub llm_provider: LlmProvider,
    pub openai_api_key: String,
    pub google_api_key: String,

    pub catalog_client_id: String,
    pub catalog_client_secret: String,

    pub session_ttl_minutes: i64,
    pub cache_ttl_seconds: i64,

    pub database_url: String,
    pub database_max_connections: u32,

    pub jwt_secret_key: String,
    pub jwt_algorithm: String,
    pub jwt_expire_minutes: i64,

    pub messenger_client_id: String,
    pub messenger_client_secret: Option<String>,
    pub messenger_redirect_uri: String,
    pub messenger_token_encryption_key: Option<String>,

    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from_email: Option<String>,

    pub cors_origins: Vec<String>,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Settings {
    /// Loads settings from the process environment. Fails only if `DATABASE_URL`
    /// is absent, since every other key has a spec-mandated default.
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| Error::Configuration("DATABASE_URL is required".into()))?;

        Ok(Settings {
            llm_provider: LlmProvider::parse(&env_or("LLM_PROVIDER", "openai")),
            openai_api_key: env_or("OPENAI_API_KEY", ""),
            google_api_key: env_or("GOOGLE_API_KEY", ""),

            catalog_client_id: env_or("CATALOG_CLIENT_ID", ""),
            catalog_client_secret: env_or("CATALOG_CLIENT_SECRET", ""),

            session_ttl_minutes: env_parsed("SESSION_TTL_MINUTES", 60),
            cache_ttl_seconds: env_parsed("CACHE_TTL_SECONDS", 3600),

            database_url,
            database_max_connections: env_parsed("DATABASE_MAX_CONNECTIONS", 15),

            jwt_secret_key: env_or("JWT_SECRET_KEY", ""),
            jwt_algorithm: env_or("JWT_ALGORITHM", "HS256"),
            jwt_expire_minutes: env_parsed("JWT_EXPIRE_MINUTES", 1440),

            messenger_client_id: env_or("MESSENGER_CLIENT_ID", ""),
            messenger_client_secret: env_opt("MESSENGER_CLIENT_SECRET"),
            messenger_redirect_uri: env_or("MESSENGER_REDIRECT_URI", ""),
            messenger_token_encryption_key: env_opt("MESSENGER_TOKEN_ENCRYPTION_KEY"),

            smtp_host: env_or("SMTP_HOST", ""),
            smtp_port: env_parsed("SMTP_PORT", 587),
            smtp_user: env_opt("SMTP_USER"),
            smtp_password: env_opt("SMTP_PASSWORD"),
            smtp_from_email: env_opt("SMTP_FROM_EMAIL"),

            cors_origins: env_or("CORS_ORIGINS", "")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }

    pub fn llm_configured(&self) -> bool {
        match self.llm_provider {
            LlmProvider::OpenAi => !self.openai_api_key.is_empty(),
            LlmProvider::Gemini => !self.google_api_key.is_empty(),
        }
    }

    pub fn catalog_configured(&self) -> bool {
        !self.catalog_client_id.is_empty() && !self.catalog_client_secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        env::remove_var("SESSION_TTL_MINUTES");
        env::remove_var("CACHE_TTL_SECONDS");
        env::set_var("DATABASE_URL", "postgres://localhost/test");
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.session_ttl_minutes, 60);
        assert_eq!(settings.cache_ttl_seconds, 3600);
    }

    #[test]
    fn llm_provider_falls_back_to_openai() {
        assert_eq!(LlmProvider::parse("nonsense"), LlmProvider::OpenAi);
        assert_eq!(LlmProvider::parse("gemini"), LlmProvider::Gemini);
    }
}
