use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Uniform wrapper returned by every task.
///
/// `ai_used` is true only when a full generate, parse and normalize cycle
/// succeeded. `warnings` explains any fallback and also carries warnings the
/// model reported about its own answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Envelope<T> {
    pub ai_used: bool,
    #[serde(flatten)]
    pub payload: T,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl<T> Envelope<T> {
    pub fn generated(payload: T, warnings: Vec<String>) -> Self {
        Self {
            ai_used: true,
            payload,
            warnings,
        }
    }

    pub fn fallback(payload: T, warning: impl Into<String>) -> Self {
        Self {
            ai_used: false,
            payload,
            warnings: vec![warning.into()],
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            ai_used: self.ai_used,
            payload: f(self.payload),
            warnings: self.warnings,
        }
    }

    /// Moves the payload under a `result` key.
    pub fn nest_result(self) -> Envelope<ResultPayload<T>> {
        self.map(|result| ResultPayload { result })
    }
}

/// Payload shape for grading and speaking: `{ ai_used, result: {...}, warnings }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResultPayload<T> {
    pub result: T,
}
