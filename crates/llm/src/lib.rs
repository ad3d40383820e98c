//! Client for the hosted generative-language API.
//!
//! Exposes exactly two operations over the rig Gemini provider: single-shot
//! content generation and streaming content generation, both prefixed with a
//! fixed system instruction.

use std::sync::Arc;

mod provider;
mod rig_adapter;

pub use provider::{
    BoxFuture, DEFAULT_GEMINI_MODEL, GenerateRequest, GenerativeProvider, ProviderConfig,
    ProviderError, ProviderEventStream, ProviderResult, ProviderStreamHandle, ProviderWorker,
    SYSTEM_INSTRUCTION, StreamEvent, StreamEventPayload, StreamSessionId,
};
pub use rig_adapter::{RIG_GEMINI_PROVIDER_ID, RigGeminiAdapter};

pub fn create_provider(mut config: ProviderConfig) -> ProviderResult<Arc<dyn GenerativeProvider>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = RIG_GEMINI_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "gemini" | "rig-gemini" => {
            config.provider_id = RIG_GEMINI_PROVIDER_ID.to_string();
            Ok(Arc::new(RigGeminiAdapter::new(config)?))
        }
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_provider_id_defaults_to_gemini() {
        let provider = create_provider(ProviderConfig::new("", "key", None)).unwrap();
        assert_eq!(provider.id(), RIG_GEMINI_PROVIDER_ID);
        assert_eq!(provider.model_id(), DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn unknown_provider_id_is_rejected() {
        let error = create_provider(ProviderConfig::new("openai", "key", None)).err().unwrap();
        assert!(matches!(error, ProviderError::UnsupportedProvider { .. }));
    }
}
