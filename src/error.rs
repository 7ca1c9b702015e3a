use std::fmt;
use thiserror::Error;

/// Coarse classification used when a failure is reported back to callers.
///
/// Every variant routes the request to the deterministic fallback; the kind only
/// changes the wording of the warning attached to the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingCredential,
    InvocationFailure,
    ParseFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::MissingCredential => "MissingCredential",
            FailureKind::InvocationFailure => "InvocationFailure",
            FailureKind::ParseFailure => "ParseFailure",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum AssessmentError {
    #[error("Missing GEMINI_API_KEY")]
    MissingCredential,

    #[error("Model invocation failed: {0}")]
    InvocationFailed(String),

    #[error("Empty model output")]
    EmptyOutput,

    #[error("No JSON object found in model output")]
    NoJsonObject,

    #[error("Invalid JSON in model output: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Model output is JSON but not an object")]
    NotAnObject,

    #[error("Field '{field}' has an unusable value: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(feature = "gemini")]
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl AssessmentError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AssessmentError::MissingCredential => FailureKind::MissingCredential,
            AssessmentError::EmptyOutput
            | AssessmentError::NoJsonObject
            | AssessmentError::InvalidJson(_)
            | AssessmentError::NotAnObject
            | AssessmentError::InvalidField { .. } => FailureKind::ParseFailure,
            AssessmentError::InvocationFailed(_) | AssessmentError::IoError(_) => {
                FailureKind::InvocationFailure
            }
            #[cfg(feature = "gemini")]
            AssessmentError::HttpError(_) => FailureKind::InvocationFailure,
        }
    }

    /// Human readable cause placed in the envelope's `warnings`.
    pub fn warning(&self) -> String {
        match self {
            AssessmentError::MissingCredential => self.to_string(),
            other => format!("AI failed: {}: {}", other.kind(), other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AssessmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_warning_is_stable() {
        let err = AssessmentError::MissingCredential;
        assert_eq!(err.kind(), FailureKind::MissingCredential);
        assert_eq!(err.warning(), "Missing GEMINI_API_KEY");
    }

    #[test]
    fn test_parse_errors_share_a_kind() {
        let invalid = serde_json::from_str::<serde_json::Value>("{oops}").unwrap_err();
        for err in [
            AssessmentError::EmptyOutput,
            AssessmentError::NoJsonObject,
            AssessmentError::InvalidJson(invalid),
            AssessmentError::NotAnObject,
            AssessmentError::invalid_field("score", "not a number"),
        ] {
            assert_eq!(err.kind(), FailureKind::ParseFailure);
            assert!(err.warning().starts_with("AI failed: ParseFailure: "));
        }
    }

    #[test]
    fn test_invocation_warning_carries_message() {
        let err = AssessmentError::InvocationFailed("status 503".to_string());
        assert_eq!(
            err.warning(),
            "AI failed: InvocationFailure: Model invocation failed: status 503"
        );
    }
}
