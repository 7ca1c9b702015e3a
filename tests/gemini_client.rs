#![cfg(feature = "gemini")]

use std::sync::Arc;

use serde_json::json;
use structured_assessment::*;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/models/gemini-2.5-flash:generateContent";

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    }))
}

fn service_for(server: &MockServer) -> AssessmentService {
    let client = GeminiClient::with_base_url("test-key".to_string(), server.uri());
    AssessmentService::new(Some(Arc::new(client)), "gemini-2.5-flash")
}

fn text_request() -> GradeTextRequest {
    GradeTextRequest {
        context: HomeworkContext::new("HW-1", "ST-1"),
        student_answer_text: "She go to school.".to_string(),
        expected_answer_text: Some("She goes to school.".to_string()),
        language: "vi".to_string(),
    }
}

#[tokio::test]
async fn test_gemini_success_is_normalized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "generationConfig": { "responseMimeType": "application/json" }
        })))
        .respond_with(reply(
            r#"```json
{"score": 7, "max_score": 10, "summary": "Sai chia động từ.", "strengths": ["Đúng cấu trúc"]}
```"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let envelope = service_for(&server).grade_text(&text_request()).await;

    assert!(envelope.ai_used);
    assert!(envelope.warnings.is_empty());
    assert_eq!(envelope.payload.result.score, 7.0);
    assert_eq!(envelope.payload.result.summary, "Sai chia động từ.");
    assert_eq!(envelope.payload.result.strengths.len(), 2);
    assert_eq!(envelope.payload.result.extracted_student_answer, "She go to school.");
}

#[tokio::test]
async fn test_gemini_error_status_falls_back_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let envelope = service_for(&server).grade_text(&text_request()).await;

    assert!(!envelope.ai_used);
    assert_eq!(envelope.payload.result.score, 0.0);
    assert_eq!(envelope.warnings.len(), 1);
    assert!(envelope.warnings[0].starts_with("AI failed: InvocationFailure:"));
    assert!(envelope.warnings[0].contains("status 500"));
    assert!(!envelope.warnings[0].contains("test-key"));
}

#[tokio::test]
async fn test_gemini_without_candidates_is_an_invocation_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let envelope = service_for(&server).grade_text(&text_request()).await;

    assert!(!envelope.ai_used);
    assert!(envelope.warnings[0].starts_with("AI failed: InvocationFailure:"));
    assert!(envelope.warnings[0].contains("SAFETY"));
}

#[tokio::test]
async fn test_gemini_prose_reply_is_a_parse_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(reply("Sorry, I cannot help."))
        .mount(&server)
        .await;

    let envelope = service_for(&server).grade_text(&text_request()).await;

    assert!(!envelope.ai_used);
    assert!(envelope.warnings[0].starts_with("AI failed: ParseFailure:"));
}

#[tokio::test]
async fn test_gemini_image_request_sends_inline_data() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({
            "contents": [{
                "parts": [{}, { "inlineData": { "mimeType": "image/png", "data": "iVBO" } }]
            }]
        })))
        .respond_with(reply(r#"{"score": 9, "extracted_student_answer": "cat, dog"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let image = MediaAttachment::new(vec![0x89, 0x50, 0x4E], Some("image/png"), "image/jpeg");
    let request = GradeImageRequest::new(HomeworkContext::new("HW-2", "ST-1"), image);
    let envelope = service_for(&server).grade_image(&request).await;

    assert!(envelope.ai_used);
    assert_eq!(envelope.payload.result.score, 9.0);
    assert_eq!(envelope.payload.result.extracted_student_answer, "cat, dog");
}

#[tokio::test]
async fn test_gemini_free_text_enhancement_strips_quotes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(reply("\"Học sinh hoàn thành bài tập đầy đủ.\"\n"))
        .mount(&server)
        .await;

    let envelope = service_for(&server)
        .enhance_feedback(&EnhanceFeedbackRequest::new("em làm bài đầy đủ"))
        .await;

    assert!(envelope.ai_used);
    assert_eq!(envelope.payload.enhanced, "Học sinh hoàn thành bài tập đầy đủ.");
}
