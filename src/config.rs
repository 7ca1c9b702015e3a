//! Process-level model configuration read from the environment.

use std::env;
#[cfg(feature = "gemini")]
use std::sync::Arc;

use crate::llm::prompts::DEFAULT_MODEL;
#[cfg(feature = "gemini")]
use crate::llm::{GeminiClient, ModelClient};

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const MODEL_VAR: &str = "GEMINI_MODEL";
pub const BASE_URL_VAR: &str = "GEMINI_BASE_URL";

#[derive(Clone, PartialEq, Eq)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    /// Overrides the public Gemini endpoint, mostly for tests.
    pub base_url: Option<String>,
}

impl std::fmt::Debug for AiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: None,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_key: non_blank(lookup(API_KEY_VAR)),
            model: non_blank(lookup(MODEL_VAR)).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: non_blank(lookup(BASE_URL_VAR)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// The shared client, or `None` when no credential is configured.
    #[cfg(feature = "gemini")]
    pub fn build_client(&self) -> Option<Arc<dyn ModelClient>> {
        let api_key = self.api_key.clone()?;
        let client = match self.base_url.as_deref() {
            Some(base_url) => GeminiClient::with_base_url(api_key, base_url),
            None => GeminiClient::new(api_key),
        };
        log::info!("Gemini client configured for model {}", self.model);
        Some(Arc::new(client))
    }

    #[cfg(not(feature = "gemini"))]
    pub fn build_client(&self) -> Option<std::sync::Arc<dyn crate::llm::ModelClient>> {
        if self.is_configured() {
            log::warn!("{} is set but the gemini feature is disabled", API_KEY_VAR);
        }
        None
    }
}
