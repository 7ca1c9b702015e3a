use std::fmt;

use serde::{Deserialize, Serialize};

/// Binary media sent inline with a prompt (homework photo, receipt, recording).
#[derive(Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl MediaAttachment {
    /// Uses `declared` unless it is absent or blank, in which case `default_mime` applies.
    pub fn new(data: Vec<u8>, declared: Option<&str>, default_mime: &str) -> Self {
        Self::with_file_name(data, declared, None, default_mime)
    }

    /// Resolves the media type as declared → guessed from `file_name` → `default_mime`.
    pub fn with_file_name(
        data: Vec<u8>,
        declared: Option<&str>,
        file_name: Option<&str>,
        default_mime: &str,
    ) -> Self {
        let declared = declared
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        let detected = || {
            file_name
                .and_then(|name| mime_guess::from_path(name).first())
                .map(|mime| mime.essence_str().to_string())
        };

        Self {
            mime_type: declared
                .or_else(detected)
                .unwrap_or_else(|| default_mime.to_string()),
            data,
        }
    }

    /// Reads a file from disk, detecting its media type from the extension.
    #[cfg(feature = "gemini")]
    pub async fn from_path(
        path: &std::path::Path,
        default_mime: &str,
    ) -> crate::error::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let file_name = path.file_name().and_then(|n| n.to_str());
        Ok(Self::with_file_name(data, None, file_name, default_mime))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for MediaAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaAttachment")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// One fully assembled model input: instruction text plus at most one attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub attachment: Option<MediaAttachment>,
    /// Ask the model for `application/json` output. Free-text tasks turn this off.
    pub expects_json: bool,
}

impl Prompt {
    pub fn json(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
            expects_json: true,
        }
    }

    pub fn free_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
            expects_json: false,
        }
    }

    pub fn with_attachment(mut self, attachment: MediaAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Unparsed text returned by one model invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelOutput {
    pub text: String,
}

impl RawModelOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

// Gemini `generateContent` wire format.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    /// Base64 encoded bytes.
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    pub prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}
