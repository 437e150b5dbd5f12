//! Generative-text backend
//!
//! The backend turns a conversation plus an instruction into the NPC's next
//! reply. The wire format carries no dedicated system field, so the
//! instruction rides on the first user message of the request (see
//! [`build_contents`]).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::BackendConfig;
use crate::dialogue::{ChatMessage, ChatRole};
use crate::error::{ParleyError, Result};

pub mod gemini;

pub use gemini::GeminiBackend;

/// Trait for dialogue backend implementations.
#[async_trait]
pub trait DialogueBackend: Send + Sync {
    /// Generate the NPC's reply.
    ///
    /// # Arguments
    ///
    /// * `user_input` - The new player utterance
    /// * `history` - Messages exchanged so far, oldest first
    /// * `system_instruction` - Persona/quest instruction for this turn
    ///
    /// # Returns
    ///
    /// The full generated text
    async fn generate(
        &self,
        user_input: &str,
        history: &[ChatMessage],
        system_instruction: &str,
    ) -> Result<String>;

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// One entry of the request `contents` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Text part of a content entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

impl Content {
    fn text(role: ChatRole, text: String) -> Self {
        Self {
            role: role.as_str().to_string(),
            parts: vec![Part { text }],
        }
    }

    /// Concatenated text of all parts
    pub fn joined_text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

/// Build the request contents for one round trip.
///
/// History entries keep their order and role. The instruction is prepended
/// (`instruction + "\n" + text`) exactly once: to the first user message of
/// the history, or to the new outgoing message when the history holds no
/// user message yet. An empty instruction is never prepended.
pub fn build_contents(
    user_input: &str,
    history: &[ChatMessage],
    system_instruction: &str,
) -> Vec<Content> {
    let mut prepended = system_instruction.is_empty();
    let mut contents = Vec::with_capacity(history.len() + 1);

    for message in history {
        let text = if !prepended && message.role == ChatRole::User {
            prepended = true;
            format!("{}\n{}", system_instruction, message.content)
        } else {
            message.content.clone()
        };
        contents.push(Content::text(message.role, text));
    }

    let text = if prepended {
        user_input.to_string()
    } else {
        format!("{}\n{}", system_instruction, user_input)
    };
    contents.push(Content::text(ChatRole::User, text));

    contents
}

/// Run one generation bounded by `timeout`.
///
/// Expiry yields [`ParleyError::Timeout`]; the in-flight request is dropped.
pub async fn generate_with_timeout(
    backend: &dyn DialogueBackend,
    user_input: &str,
    history: &[ChatMessage],
    system_instruction: &str,
    timeout: Duration,
) -> Result<String> {
    match tokio::time::timeout(
        timeout,
        backend.generate(user_input, history, system_instruction),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(timeout = ?timeout, "Dialogue backend timed out");
            Err(ParleyError::Timeout(timeout))
        }
    }
}

/// Backend used when no API key is configured.
///
/// Every call fails with [`ParleyError::BackendUnavailable`], which the
/// conversation layer shows as an ordinary backend error.
pub struct StubBackend;

#[async_trait]
impl DialogueBackend for StubBackend {
    async fn generate(
        &self,
        _user_input: &str,
        _history: &[ChatMessage],
        _system_instruction: &str,
    ) -> Result<String> {
        Err(ParleyError::BackendUnavailable(
            "no API key configured; set GEMINI_API_KEY or backend.api_key".to_string(),
        ))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "stub".to_string(),
            model_name: "none".to_string(),
        }
    }
}

/// Create the dialogue backend described by the configuration.
///
/// Falls back to `GEMINI_API_KEY` when the config carries no key, and to
/// [`StubBackend`] (with a warning) when neither is present.
pub fn from_config(config: &BackendConfig) -> Arc<dyn DialogueBackend> {
    let api_key = config
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .or_else(|| std::env::var("GEMINI_API_KEY").ok().filter(|key| !key.is_empty()));

    match api_key {
        Some(key) => Arc::new(GeminiBackend::from_config(key, config)),
        None => {
            tracing::warn!("No backend API key configured; NPC dialogue is disabled");
            Arc::new(StubBackend)
        }
    }
}
