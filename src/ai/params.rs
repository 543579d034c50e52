//! Model Parameter Policy
//!
//! Maps a model identifier to the legal request shape for one call: which
//! token-limit parameter to use, whether temperature may be supplied, and
//! whether a dedicated system role exists. Pure function of the model id;
//! backends stay free of model-family conditionals.

use serde::Serialize;

use crate::constants::models;

/// Request-shape family a model id resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Standard chat models: `max_tokens`, custom temperature, system role
    LegacyChat,
    /// Reasoning models: `max_completion_tokens`, default temperature only,
    /// system instruction merged into the user message
    Reasoning,
}

/// Classify a model id. Unknown ids default to the legacy chat shape.
pub fn family_of(model: &str) -> ModelFamily {
    let lowered = model.to_lowercase();
    if models::REASONING_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        ModelFamily::Reasoning
    } else {
        ModelFamily::LegacyChat
    }
}

/// One chat message in wire order.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Resolved request shape for one model call.
///
/// Produced fresh per call; never cached across model-id changes.
#[derive(Debug, Clone)]
pub struct ModelCallSpec {
    pub family: ModelFamily,
    /// Messages in the shape the family accepts (system merged in for
    /// reasoning models)
    pub messages: Vec<ChatMessage>,
    /// Name of the output-length parameter for this family
    pub max_tokens_param: &'static str,
    pub max_tokens: u32,
    /// None when the family accepts only its default temperature
    pub temperature: Option<f32>,
}

impl ModelCallSpec {
    pub fn supports_system_role(&self) -> bool {
        self.family == ModelFamily::LegacyChat
    }
}

/// Resolve the call spec for one request.
pub fn resolve(
    model: &str,
    system: &str,
    user: &str,
    max_tokens: u32,
    temperature: f32,
) -> ModelCallSpec {
    match family_of(model) {
        ModelFamily::LegacyChat => ModelCallSpec {
            family: ModelFamily::LegacyChat,
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            max_tokens_param: models::LEGACY_TOKEN_PARAM,
            max_tokens,
            temperature: Some(temperature),
        },
        ModelFamily::Reasoning => ModelCallSpec {
            family: ModelFamily::Reasoning,
            messages: vec![ChatMessage::user(format!(
                "System: {system}\n\nUser: {user}"
            ))],
            max_tokens_param: models::REASONING_TOKEN_PARAM,
            max_tokens,
            temperature: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_markers_detected() {
        assert_eq!(family_of("gpt-5"), ModelFamily::Reasoning);
        assert_eq!(family_of("o1-preview"), ModelFamily::Reasoning);
        assert_eq!(family_of("o3-mini"), ModelFamily::Reasoning);
        assert_eq!(family_of("GPT-5-turbo"), ModelFamily::Reasoning);
    }

    #[test]
    fn test_legacy_models_default() {
        assert_eq!(family_of("gpt-4-turbo"), ModelFamily::LegacyChat);
        assert_eq!(family_of("gpt-4o"), ModelFamily::LegacyChat);
        assert_eq!(family_of("llama3"), ModelFamily::LegacyChat);
        assert_eq!(family_of("some-unknown-model"), ModelFamily::LegacyChat);
    }

    #[test]
    fn test_reasoning_spec_never_permits_temperature() {
        let spec = resolve("gpt-5", "You are a security analyst.", "Triage this.", 500, 0.3);
        assert_eq!(spec.max_tokens_param, "max_completion_tokens");
        assert!(spec.temperature.is_none());
        assert!(!spec.supports_system_role());
        // system instruction merged into the single user message
        assert_eq!(spec.messages.len(), 1);
        assert_eq!(spec.messages[0].role, "user");
        assert!(spec.messages[0].content.starts_with("System: "));
        assert!(spec.messages[0].content.contains("Triage this."));
    }

    #[test]
    fn test_legacy_spec_shape() {
        let spec = resolve("gpt-4o", "You are a security analyst.", "Triage this.", 500, 0.3);
        assert_eq!(spec.max_tokens_param, "max_tokens");
        assert_eq!(spec.temperature, Some(0.3));
        assert!(spec.supports_system_role());
        assert_eq!(spec.messages.len(), 2);
        assert_eq!(spec.messages[0].role, "system");
        assert_eq!(spec.messages[1].role, "user");
    }
}
