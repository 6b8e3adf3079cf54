//! Provider registry: holds whichever provider adapters were constructed
//! and registered by the embedding application, and resolves "default,
//! then fallbacks" per §6.6 `providers.<kind>` configuration. Constructing
//! concrete adapters is not this crate's job — callers register already-
//! built `Arc<dyn ...>` instances.

use std::collections::HashMap;
use std::sync::Arc;

use va_domain::config::ProviderKindConfig;
use va_domain::error::{Error, Result};

use crate::traits::{
    AsrProvider, AudioOutProvider, LlmProvider, TtsProvider, VectorizerProvider, WakeWordProvider,
};

/// A provider that failed to initialize; kept for readiness reporting
/// rather than aborting startup.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub kind: String,
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens, so a
/// provider's raw error text never leaks a secret into logs or a
/// readiness endpoint.
pub fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_owned();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_owned()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

#[derive(Default)]
pub struct ProviderRegistry {
    asr: HashMap<String, Arc<dyn AsrProvider>>,
    tts: HashMap<String, Arc<dyn TtsProvider>>,
    wake_word: HashMap<String, Arc<dyn WakeWordProvider>>,
    vectorizer: HashMap<String, Arc<dyn VectorizerProvider>>,
    llm: HashMap<String, Arc<dyn LlmProvider>>,
    audio_out: HashMap<String, Arc<dyn AudioOutProvider>>,
    init_errors: Vec<ProviderInitError>,
}

macro_rules! kind_accessors {
    ($field:ident, $trait_ty:ty, $register:ident, $resolve:ident) => {
        pub fn $register(&mut self, name: impl Into<String>, provider: Arc<$trait_ty>) {
            self.$field.insert(name.into(), provider);
        }

        /// Resolve the effective provider for this kind: the configured
        /// default, falling back through `fallback_providers` in order.
        /// Empty `fallback_providers` means "fail if the default is
        /// unavailable" (§6.6).
        pub fn $resolve(&self, config: &ProviderKindConfig) -> Result<Arc<$trait_ty>> {
            if let Some(p) = self.$field.get(&config.default) {
                return Ok(p.clone());
            }
            for name in &config.fallback_providers {
                if let Some(p) = self.$field.get(name) {
                    tracing::warn!(
                        default = %config.default,
                        fallback = %name,
                        "provider default unavailable, using fallback"
                    );
                    return Ok(p.clone());
                }
            }
            Err(Error::DependencyUnavailable(config.default.clone()))
        }
    };
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    kind_accessors!(asr, dyn AsrProvider, register_asr, resolve_asr);
    kind_accessors!(tts, dyn TtsProvider, register_tts, resolve_tts);
    kind_accessors!(wake_word, dyn WakeWordProvider, register_wake_word, resolve_wake_word);
    kind_accessors!(vectorizer, dyn VectorizerProvider, register_vectorizer, resolve_vectorizer);
    kind_accessors!(llm, dyn LlmProvider, register_llm, resolve_llm);
    kind_accessors!(audio_out, dyn AudioOutProvider, register_audio_out, resolve_audio_out);

    pub fn record_init_error(&mut self, provider_id: impl Into<String>, kind: impl Into<String>, error: impl std::fmt::Display) {
        self.init_errors.push(ProviderInitError {
            provider_id: provider_id.into(),
            kind: kind.into(),
            error: mask_secrets(&error.to_string()),
        });
    }

    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}
