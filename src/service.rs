use std::sync::Arc;

use log::info;

use crate::config::AiConfig;
use crate::envelope::{Envelope, ResultPayload};
use crate::llm::prompts::DEFAULT_MODEL;
use crate::llm::ModelClient;
use crate::pipeline::Orchestrator;
use crate::tasks::*;

/// Entry point for callers: one method per assessment endpoint.
///
/// Every method returns an [`Envelope`] and never fails. Cloning is cheap and
/// all clones share the same model client.
#[derive(Clone)]
pub struct AssessmentService {
    orchestrator: Orchestrator,
}

impl AssessmentService {
    pub fn new(client: Option<Arc<dyn ModelClient>>, model: impl Into<String>) -> Self {
        Self {
            orchestrator: Orchestrator::new(client, model),
        }
    }

    pub fn from_config(config: &AiConfig) -> Self {
        let client = config.build_client();
        if client.is_none() {
            info!("No model credential configured; all requests use rule-based fallbacks");
        }
        Self::new(client, config.model.clone())
    }

    pub fn from_env() -> Self {
        Self::from_config(&AiConfig::from_env())
    }

    /// A service that always answers from fallbacks.
    pub fn without_model() -> Self {
        Self::new(None, DEFAULT_MODEL)
    }

    /// Whether a model client is configured. Says nothing about reachability.
    pub fn ai_available(&self) -> bool {
        self.orchestrator.has_client()
    }

    pub fn model(&self) -> &str {
        self.orchestrator.model()
    }

    pub async fn grade_text(
        &self,
        request: &GradeTextRequest,
    ) -> Envelope<ResultPayload<GradingResult>> {
        self.orchestrator.run(request).await.nest_result()
    }

    pub async fn grade_link(
        &self,
        request: &GradeLinkRequest,
    ) -> Envelope<ResultPayload<GradingResult>> {
        self.orchestrator
            .run(&request.to_text_request())
            .await
            .nest_result()
    }

    pub async fn grade_image(
        &self,
        request: &GradeImageRequest,
    ) -> Envelope<ResultPayload<GradingResult>> {
        self.orchestrator.run(request).await.nest_result()
    }

    pub async fn analyze_transcript(
        &self,
        request: &AnalyzeTranscriptRequest,
    ) -> Envelope<ResultPayload<SpeakingResult>> {
        self.orchestrator.run(request).await.nest_result()
    }

    pub async fn analyze_media(
        &self,
        request: &AnalyzeMediaRequest,
    ) -> Envelope<ResultPayload<SpeakingResult>> {
        self.orchestrator.run(request).await.nest_result()
    }

    pub async fn extract_payment_proof(
        &self,
        request: &PaymentProofRequest,
    ) -> Envelope<ReceiptExtraction> {
        self.orchestrator.run(request).await
    }

    pub async fn generate_monthly_report(
        &self,
        request: &MonthlyReportRequest,
    ) -> Envelope<MonthlyReport> {
        self.orchestrator.run(request).await
    }

    pub async fn enhance_feedback(
        &self,
        request: &EnhanceFeedbackRequest,
    ) -> Envelope<EnhancedFeedback> {
        self.orchestrator.run(request).await
    }
}
