//! Chat turn handling (spec §6 chat interface).

use uuid::Uuid;

use crate::client::Services;
use crate::error::{Error, Result};
use crate::orchestrator::{self, ChatResponse};
use crate::preferences::{self, PreferenceAnalyzer};

const MESSAGE_MIN_LEN: usize = 1;
const MESSAGE_MAX_LEN: usize = 500;

/// The identity a verified bearer resolves to. Token issuance and
/// verification live outside this crate (SPEC_FULL.md §B); this newtype
/// exists so call sites read "an authenticated user" rather than a bare
/// `Uuid` that could be any row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

pub struct AuthenticatedUser {
    pub id: UserId,
}

fn validate_message(message: &str) -> Result<()> {
    let len = message.chars().count();
    if len < MESSAGE_MIN_LEN || len > MESSAGE_MAX_LEN {
        return Err(Error::Validation(format!(
            "message length must be between {MESSAGE_MIN_LEN} and {MESSAGE_MAX_LEN}, got {len}"
        )));
    }
    Ok(())
}

/// Processes one chat turn. `user` is `None` when the request carries no
/// valid bearer identity; the preference context is simply omitted then
/// (spec §6: "if a valid bearer identifies a user").
///
/// Holds the session's own lock for the whole turn rather than a
/// read-then-write pair, so concurrent requests against the same session id
/// linearize instead of racing to overwrite each other (spec §8 invariant 1).
pub async fn handle_chat_message(
    services: &Services,
    session_id: Option<&str>,
    message: &str,
    user: Option<&AuthenticatedUser>,
) -> Result<(ChatResponse, String)> {
    validate_message(message)?;

    let mut session = services.sessions.lock_session(session_id).await;

    let preference_context = match user {
        Some(user) => {
            let prefs = PreferenceAnalyzer::new().analyze(services.pool(), user.id.0).await;
            Some(preferences::to_prompt_context(&prefs))
        }
        None => None,
    };

    let turn_services = orchestrator::Services {
        catalog: services.catalog.as_ref(),
        llm: services.llm.as_ref(),
        cache: services.cache.as_ref(),
    };

    let response = orchestrator::process_turn(
        &turn_services,
        &mut session,
        message,
        preference_context.as_deref(),
    )
    .await;

    Ok((response, session.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_message() {
        assert!(validate_message("").is_err());
    }

    #[test]
    fn rejects_overlong_message() {
        let long = "a".repeat(501);
        assert!(validate_message(&long).is_err());
    }

    #[test]
    fn accepts_boundary_lengths() {
        assert!(validate_message("a").is_ok());
        assert!(validate_message(&"a".repeat(500)).is_ok());
    }
}
