//! Model provider implementations.
//!
//! Contains the concrete implementation of the [`LlmProvider`] trait defined
//! in `studyflow-core` for Anthropic Claude, plus a provider factory
//! ([`create_provider`]) that builds it from a [`ModelConfig`].
//!
//! [`LlmProvider`]: studyflow_core::llm::provider::LlmProvider

pub mod anthropic;

use secrecy::SecretString;

use studyflow_core::llm::box_provider::BoxLlmProvider;
use studyflow_types::config::ModelConfig;
use studyflow_types::llm::LlmError;

use self::anthropic::AnthropicProvider;

/// Create a [`BoxLlmProvider`] from a [`ModelConfig`].
///
/// # Errors
///
/// Returns [`LlmError::AuthenticationFailed`] when no API key is available
/// and [`LlmError::InvalidRequest`] for an unsupported provider name.
pub fn create_provider(config: &ModelConfig, api_key: Option<&str>) -> Result<BoxLlmProvider, LlmError> {
    match config.provider.as_str() {
        "anthropic" => {
            let key = api_key
                .filter(|k| !k.trim().is_empty())
                .ok_or(LlmError::AuthenticationFailed)?;
            let mut provider = AnthropicProvider::new(SecretString::from(key.to_string()))?;
            if let Some(base_url) = config.base_url.as_deref() {
                provider = provider.with_base_url(base_url);
            }
            Ok(BoxLlmProvider::new(provider))
        }
        other => Err(LlmError::InvalidRequest(format!(
            "unsupported model provider '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anthropic_requires_key() {
        let config = ModelConfig::default();
        assert!(matches!(
            create_provider(&config, None),
            Err(LlmError::AuthenticationFailed)
        ));
        assert!(matches!(
            create_provider(&config, Some("  ")),
            Err(LlmError::AuthenticationFailed)
        ));
    }

    #[test]
    fn anthropic_with_key() {
        let provider = create_provider(&ModelConfig::default(), Some("sk-test")).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn unknown_provider_rejected() {
        let config = ModelConfig {
            provider: "openai".to_string(),
            ..ModelConfig::default()
        };
        match create_provider(&config, Some("sk-test")) {
            Err(LlmError::InvalidRequest(msg)) => assert!(msg.contains("openai")),
            _ => panic!("expected InvalidRequest"),
        }
    }
}
