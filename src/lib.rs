//! # Structured Assessment
//!
//! AI-assisted assessment for an English learning centre: homework grading,
//! speaking analysis, payment-proof extraction, monthly progress reports and
//! feedback rewriting.
//!
//! ## Core Concepts
//!
//! - **Task**: one use case, implementing [`AssessmentTask`]. It knows how to
//!   build a prompt, how to normalize the model's answer into a fixed shape and
//!   how to produce a deterministic answer without the model.
//! - **Orchestrator**: makes exactly one model call per request and never
//!   surfaces an error. Every failure becomes a fallback payload plus a warning.
//! - **Envelope**: the uniform response `{ ai_used, ...payload, warnings }`.
//!   Grading and speaking nest their result under `result`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use structured_assessment::*;
//!
//! let service = AssessmentService::from_env();
//! let request = GradeTextRequest {
//!     context: HomeworkContext::new("HW-12", "ST-7"),
//!     student_answer_text: "I goes to school every day.".to_string(),
//!     expected_answer_text: Some("I go to school every day.".to_string()),
//!     language: "vi".to_string(),
//! };
//!
//! let envelope = service.grade_text(&request).await;
//! println!("{}", serde_json::to_string_pretty(&envelope)?);
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod json_block;
pub mod llm;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod service;
pub mod tasks;

pub use config::AiConfig;
pub use envelope::{Envelope, ResultPayload};
pub use error::{AssessmentError, FailureKind, Result};
pub use json_block::{extract_json_block, parse_json_object, ParsedFields};
pub use llm::{MediaAttachment, ModelClient, Prompt, RawModelOutput};
pub use pipeline::{AssessmentTask, Normalized, Orchestrator};
pub use schema::{generate_json_schema, schema_as_json};
pub use service::AssessmentService;
pub use tasks::*;

#[cfg(feature = "gemini")]
pub use llm::GeminiClient;
