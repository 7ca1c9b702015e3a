//! Generic "generate, parse, normalize, or fall back" control flow.
//!
//! Every task plugs into [`Orchestrator::run`] through [`AssessmentTask`]. The
//! orchestrator never returns an error: failures at any stage become an
//! envelope with `ai_used = false`, the task's deterministic fallback payload
//! and a warning naming the failure.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::envelope::Envelope;
use crate::error::{AssessmentError, Result};
use crate::json_block::{parse_json_object, ParsedFields};
use crate::llm::{ModelClient, Prompt, RawModelOutput};

/// Payload produced by a successful normalization plus any warnings the model
/// reported about its own answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub payload: T,
    pub warnings: Vec<String>,
}

impl<T> Normalized<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        self
    }
}

/// One assessment use case: how to ask the model, how to read its answer, and
/// how to answer without it.
pub trait AssessmentTask: Send + Sync {
    type Output: Serialize + Send;

    /// Short name used in logs.
    const NAME: &'static str;

    fn build_prompt(&self) -> Prompt;

    /// Deterministic result computed from the request alone.
    fn fallback(&self) -> Self::Output;

    /// Coerces the parsed model fields into the task's fixed shape.
    fn normalize(&self, fields: &ParsedFields, raw: &RawModelOutput)
        -> Result<Normalized<Self::Output>>;

    /// Reads a raw model response. JSON tasks keep the default.
    fn interpret(&self, raw: &RawModelOutput) -> Result<Normalized<Self::Output>> {
        let fields = parse_json_object(&raw.text)?;
        self.normalize(&fields, raw)
    }

    /// When set, the request has nothing to generate from and goes straight to
    /// the fallback with this reason as its warning.
    fn skip_reason(&self) -> Option<String> {
        None
    }
}

/// Runs tasks against an optional, shared model client.
#[derive(Clone)]
pub struct Orchestrator {
    client: Option<Arc<dyn ModelClient>>,
    model: String,
}

impl Orchestrator {
    pub fn new(client: Option<Arc<dyn ModelClient>>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn run<T: AssessmentTask>(&self, task: &T) -> Envelope<T::Output> {
        if let Some(reason) = task.skip_reason() {
            info!("{}: skipping generation ({})", T::NAME, reason);
            return Envelope::fallback(task.fallback(), reason);
        }

        match self.generate(task).await {
            Ok(normalized) => {
                info!("{}: model answer accepted", T::NAME);
                Envelope::generated(normalized.payload, normalized.warnings)
            }
            Err(err) => {
                warn!("{}: falling back ({}): {}", T::NAME, err.kind(), err);
                Envelope::fallback(task.fallback(), err.warning())
            }
        }
    }

    async fn generate<T: AssessmentTask>(&self, task: &T) -> Result<Normalized<T::Output>> {
        let client = self
            .client
            .as_ref()
            .ok_or(AssessmentError::MissingCredential)?;

        let prompt = task.build_prompt();
        debug!(
            "{}: invoking {} with {} prompt chars",
            T::NAME,
            self.model,
            prompt.text.chars().count()
        );

        let raw = client.generate(&self.model, &prompt).await?;

        task.interpret(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{ensure_list_len, FieldReader};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        reply: std::result::Result<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelClient for Echo {
        async fn generate(&self, _model: &str, _prompt: &Prompt) -> Result<RawModelOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(RawModelOutput::new(text.clone())),
                Err(msg) => Err(AssessmentError::InvocationFailed(msg.clone())),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Tags {
        tags: Vec<String>,
    }

    struct TagTask {
        skip: bool,
    }

    impl AssessmentTask for TagTask {
        type Output = Tags;
        const NAME: &'static str = "tags";

        fn build_prompt(&self) -> Prompt {
            Prompt::json("give me tags")
        }

        fn fallback(&self) -> Tags {
            Tags {
                tags: vec!["fallback".to_string(); 2],
            }
        }

        fn normalize(&self, fields: &ParsedFields, _raw: &RawModelOutput) -> Result<Normalized<Tags>> {
            let reader = FieldReader::new(fields);
            Ok(Normalized::new(Tags {
                tags: ensure_list_len(&reader.string_list("tags"), 2, "filler"),
            })
            .with_warnings(reader.string_list("warnings")))
        }

        fn skip_reason(&self) -> Option<String> {
            self.skip.then(|| "nothing to do".to_string())
        }
    }

    fn orchestrator(reply: std::result::Result<&str, &str>) -> (Orchestrator, Arc<Echo>) {
        let echo = Arc::new(Echo {
            reply: reply.map(str::to_string).map_err(str::to_string),
            calls: AtomicUsize::new(0),
        });
        let client: Arc<dyn ModelClient> = echo.clone();
        (Orchestrator::new(Some(client), "test-model"), echo)
    }

    #[tokio::test]
    async fn test_success_pads_and_keeps_model_warnings() {
        let (orch, echo) = orchestrator(Ok("```json\n{\"tags\": [\"a\"], \"warnings\": [\"blurry\", \" \"]}\n```"));
        let env = orch.run(&TagTask { skip: false }).await;

        assert!(env.ai_used);
        assert_eq!(env.payload.tags, vec!["a", "filler"]);
        assert_eq!(env.warnings, vec!["blurry"]);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_client_falls_back() {
        let orch = Orchestrator::new(None, "test-model");
        let env = orch.run(&TagTask { skip: false }).await;

        assert!(!env.ai_used);
        assert_eq!(env.payload, TagTask { skip: false }.fallback());
        assert_eq!(env.warnings, vec!["Missing GEMINI_API_KEY"]);
    }

    #[tokio::test]
    async fn test_invocation_failure_is_not_retried() {
        let (orch, echo) = orchestrator(Err("connection reset"));
        let env = orch.run(&TagTask { skip: false }).await;

        assert!(!env.ai_used);
        assert!(env.warnings[0].starts_with("AI failed: InvocationFailure"));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    struct ClosedPipe;

    #[async_trait]
    impl ModelClient for ClosedPipe {
        async fn generate(&self, _model: &str, _prompt: &Prompt) -> Result<RawModelOutput> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed").into())
        }
    }

    #[tokio::test]
    async fn test_client_error_keeps_its_variant() {
        let orch = Orchestrator::new(Some(Arc::new(ClosedPipe)), "test-model");
        let env = orch.run(&TagTask { skip: false }).await;

        assert!(!env.ai_used);
        assert_eq!(
            env.warnings,
            vec!["AI failed: InvocationFailure: IO error: pipe closed"]
        );
    }

    #[tokio::test]
    async fn test_non_json_reply_is_a_parse_failure() {
        let (orch, _) = orchestrator(Ok("Sorry, I cannot help."));
        let env = orch.run(&TagTask { skip: false }).await;

        assert!(!env.ai_used);
        assert!(env.warnings[0].starts_with("AI failed: ParseFailure"));
        assert_eq!(env.payload.tags, vec!["fallback", "fallback"]);
    }

    #[tokio::test]
    async fn test_skip_reason_avoids_the_model() {
        let (orch, echo) = orchestrator(Ok("{\"tags\": [\"a\", \"b\"]}"));
        let env = orch.run(&TagTask { skip: true }).await;

        assert!(!env.ai_used);
        assert_eq!(env.warnings, vec!["nothing to do"]);
        assert_eq!(echo.calls.load(Ordering::SeqCst), 0);
    }
}
