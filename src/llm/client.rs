use async_trait::async_trait;

use crate::error::Result;
use crate::llm::types::*;

/// A generative model that turns one prompt into one text response.
///
/// Implementations must not retry: a failed call is terminal for the request.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, model: &str, prompt: &Prompt) -> Result<RawModelOutput>;
}

#[cfg(feature = "gemini")]
pub use gemini::*;

#[cfg(feature = "gemini")]
mod gemini {
    use super::*;
    use crate::error::AssessmentError;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use log::debug;
    use reqwest::Client;

    pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

    #[derive(Clone)]
    pub struct GeminiClient {
        client: Client,
        api_key: String,
        base_url: String,
    }

    impl GeminiClient {
        pub fn new(api_key: String) -> Self {
            Self::with_base_url(api_key, GEMINI_BASE_URL)
        }

        pub fn with_base_url(api_key: String, base_url: impl Into<String>) -> Self {
            Self {
                client: Client::new(),
                api_key,
                base_url: base_url.into().trim_end_matches('/').to_string(),
            }
        }

        fn build_request(prompt: &Prompt) -> GenerateContentRequest {
            let mut parts = vec![Part::Text {
                text: prompt.text.clone(),
            }];
            if let Some(media) = &prompt.attachment {
                parts.push(Part::InlineData {
                    inline_data: Blob {
                        mime_type: media.mime_type.clone(),
                        data: STANDARD.encode(&media.data),
                    },
                });
            }

            GenerateContentRequest {
                contents: vec![Content {
                    role: Some("user".to_string()),
                    parts,
                }],
                generation_config: GenerationConfig {
                    response_mime_type: prompt
                        .expects_json
                        .then(|| "application/json".to_string()),
                },
            }
        }
    }

    #[async_trait]
    impl ModelClient for GeminiClient {
        async fn generate(&self, model: &str, prompt: &Prompt) -> Result<RawModelOutput> {
            let url = format!(
                "{}/models/{}:generateContent?key={}",
                self.base_url, model, self.api_key
            );
            let payload = Self::build_request(prompt);

            debug!(
                "Calling Gemini model {} ({} prompt chars, attachment: {:?})",
                model,
                prompt.text.chars().count(),
                prompt.attachment.as_ref().map(|m| m.mime_type.as_str())
            );

            // The URL carries the API key, so it is stripped from transport errors.
            let res = self
                .client
                .post(&url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| e.without_url())?;
            let status = res.status();

            if !status.is_success() {
                let err_text = res.text().await.map_err(|e| e.without_url())?;
                return Err(AssessmentError::InvocationFailed(format!(
                    "Gemini API Error (status {}): {}",
                    status, err_text
                )));
            }

            let body: GenerateContentResponse = res.json().await.map_err(|e| e.without_url())?;

            let candidate = body
                .candidates
                .unwrap_or_default()
                .into_iter()
                .next()
                .ok_or_else(|| {
                    let reason = body
                        .prompt_feedback
                        .map(|f| f.to_string())
                        .unwrap_or_else(|| "no candidates returned".to_string());
                    AssessmentError::InvocationFailed(format!("Gemini returned no answer: {}", reason))
                })?;

            let text: String = candidate
                .content
                .map(|c| c.parts)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|part| match part {
                    Part::Text { text } => Some(text),
                    _ => None,
                })
                .collect();

            if text.trim().is_empty() {
                return Err(AssessmentError::InvocationFailed(format!(
                    "Model returned no text content (finish reason: {})",
                    candidate.finish_reason.as_deref().unwrap_or("unknown")
                )));
            }

            Ok(RawModelOutput::new(text))
        }
    }

}
