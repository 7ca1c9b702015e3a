use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::json_block::ParsedFields;
use crate::llm::prompts::{
    or_na, DEFAULT_RUBRIC, GRADING_IMAGE_ROLE, GRADING_SCHEMA, GRADING_TEXT_ROLE, JSON_ONLY,
};
use crate::llm::{MediaAttachment, Prompt, RawModelOutput};
use crate::normalize::{ensure_list_len, truncate_chars, FieldReader};
use crate::pipeline::{AssessmentTask, Normalized};
use crate::tasks::default_language;

pub const DEFAULT_MAX_SCORE: f64 = 10.0;
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

const STRENGTH_COUNT: usize = 2;
const ISSUE_COUNT: usize = 2;
const SUGGESTION_COUNT: usize = 3;
const FALLBACK_ANSWER_CHARS: usize = 2000;

const STRENGTH_FILLER: &str = "Có cố gắng hoàn thành bài.";
const ISSUE_FILLER: &str = "Cần luyện tập thêm theo hướng dẫn.";
const SUGGESTION_FILLER: &str = "Luyện tập thêm 5–10 phút/ngày.";

const FALLBACK_SUMMARY: &str = "Chưa thể chấm tự động, giáo viên vui lòng chấm thủ công.";
const PENDING_REVIEW: &str = "Chờ giáo viên nhận xét.";
const FALLBACK_TEXT_SUGGESTION: &str = "Vui lòng thử lại hoặc giáo viên chấm thủ công.";
const FALLBACK_IMAGE_SUGGESTION: &str = "Giáo viên chấm thủ công hoặc thử lại với ảnh rõ hơn.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HomeworkContext {
    pub homework_id: String,
    pub student_id: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    /// writing / reading / vocab / grammar / mixed
    #[serde(default = "default_skill")]
    pub skill: String,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub rubric: Option<String>,
}

fn default_subject() -> String {
    "english".to_string()
}

fn default_skill() -> String {
    "writing".to_string()
}

impl HomeworkContext {
    pub fn new(homework_id: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            homework_id: homework_id.into(),
            student_id: student_id.into(),
            subject: default_subject(),
            skill: default_skill(),
            instructions: None,
            rubric: None,
        }
    }

    fn rubric(&self) -> &str {
        self.rubric
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_RUBRIC)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GradeTextRequest {
    pub context: HomeworkContext,
    pub student_answer_text: String,
    #[serde(default)]
    pub expected_answer_text: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

/// A link submission. The caller is expected to download and parse the linked
/// document and pass its text as `extracted_text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GradeLinkRequest {
    pub context: HomeworkContext,
    pub link_url: String,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default)]
    pub expected_answer_text: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

impl GradeLinkRequest {
    pub fn to_text_request(&self) -> GradeTextRequest {
        let text = self
            .extracted_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("(LINK ONLY) {}\nChưa có extracted_text.", self.link_url)
            });

        GradeTextRequest {
            context: self.context.clone(),
            student_answer_text: text,
            expected_answer_text: self.expected_answer_text.clone(),
            language: self.language.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradeImageRequest {
    pub context: HomeworkContext,
    pub image: MediaAttachment,
    pub expected_answer_text: Option<String>,
    pub language: String,
}

impl GradeImageRequest {
    pub fn new(context: HomeworkContext, image: MediaAttachment) -> Self {
        Self {
            context,
            image,
            expected_answer_text: None,
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GradingResult {
    pub score: f64,
    pub max_score: f64,
    pub summary: String,
    pub strengths: Vec<String>,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub extracted_student_answer: String,
    pub confidence: BTreeMap<String, f64>,
    pub raw_text: Option<String>,
}

impl GradingResult {
    fn fallback(extracted_student_answer: String, suggestion: &str) -> Self {
        let pending: [&str; 0] = [];
        Self {
            score: 0.0,
            max_score: DEFAULT_MAX_SCORE,
            summary: FALLBACK_SUMMARY.to_string(),
            strengths: ensure_list_len(&pending, STRENGTH_COUNT, PENDING_REVIEW),
            issues: ensure_list_len(&pending, ISSUE_COUNT, PENDING_REVIEW),
            suggestions: ensure_list_len(&[suggestion], SUGGESTION_COUNT, SUGGESTION_FILLER),
            extracted_student_answer,
            confidence: BTreeMap::new(),
            raw_text: None,
        }
    }
}

fn normalize_grading(
    fields: &ParsedFields,
    raw: &RawModelOutput,
    answer_backfill: &str,
) -> Result<Normalized<GradingResult>> {
    let reader = FieldReader::new(fields);

    let max_score = match reader.number("max_score", DEFAULT_MAX_SCORE)? {
        m if m > 0.0 => m,
        _ => DEFAULT_MAX_SCORE,
    };
    let score = reader.number("score", 0.0)?.clamp(0.0, max_score);

    let result = GradingResult {
        score,
        max_score,
        summary: reader.text("summary").unwrap_or_default(),
        strengths: ensure_list_len(&reader.string_list("strengths"), STRENGTH_COUNT, STRENGTH_FILLER),
        issues: ensure_list_len(&reader.string_list("issues"), ISSUE_COUNT, ISSUE_FILLER),
        suggestions: ensure_list_len(
            &reader.string_list("suggestions"),
            SUGGESTION_COUNT,
            SUGGESTION_FILLER,
        ),
        extracted_student_answer: reader
            .text("extracted_student_answer")
            .unwrap_or_else(|| answer_backfill.to_string()),
        confidence: reader.confidence("confidence"),
        raw_text: Some(raw.text.clone()),
    };

    Ok(Normalized::new(result).with_warnings(reader.string_list("warnings")))
}

impl AssessmentTask for GradeTextRequest {
    type Output = GradingResult;
    const NAME: &'static str = "grade-text";

    fn build_prompt(&self) -> Prompt {
        let ctx = &self.context;
        Prompt::json(format!(
            "{GRADING_TEXT_ROLE}\n{JSON_ONLY}\n\n{GRADING_SCHEMA}\n\n\
             Bối cảnh:\n\
             - HomeworkId: {}\n\
             - StudentId: {}\n\
             - Subject: {}\n\
             - Skill: {}\n\
             - Instructions: {}\n\n\
             Rubric:\n{}\n\n\
             Đáp án chuẩn (nếu có):\n{}\n\n\
             Bài làm học sinh (text):\n{}\n\n\
             Ngôn ngữ phản hồi: {} (vi là tiếng Việt).\n",
            ctx.homework_id,
            ctx.student_id,
            ctx.subject,
            ctx.skill,
            or_na(ctx.instructions.as_deref()),
            ctx.rubric(),
            or_na(self.expected_answer_text.as_deref()),
            self.student_answer_text,
            self.language,
        ))
    }

    fn fallback(&self) -> GradingResult {
        GradingResult::fallback(
            truncate_chars(&self.student_answer_text, FALLBACK_ANSWER_CHARS),
            FALLBACK_TEXT_SUGGESTION,
        )
    }

    fn normalize(
        &self,
        fields: &ParsedFields,
        raw: &RawModelOutput,
    ) -> Result<Normalized<GradingResult>> {
        normalize_grading(fields, raw, &self.student_answer_text)
    }
}

impl AssessmentTask for GradeImageRequest {
    type Output = GradingResult;
    const NAME: &'static str = "grade-image";

    fn build_prompt(&self) -> Prompt {
        let ctx = &self.context;
        Prompt::json(format!(
            "{GRADING_IMAGE_ROLE}\n\n{JSON_ONLY}\n{GRADING_SCHEMA}\n\n\
             Bối cảnh:\n\
             - HomeworkId: {}\n\
             - StudentId: {}\n\
             - Skill: {}\n\
             - Instructions: {}\n\n\
             Rubric:\n{}\n\n\
             Đáp án chuẩn (nếu có):\n{}\n\n\
             Ngôn ngữ phản hồi: {}\n",
            ctx.homework_id,
            ctx.student_id,
            ctx.skill,
            or_na(ctx.instructions.as_deref()),
            ctx.rubric(),
            or_na(self.expected_answer_text.as_deref()),
            self.language,
        ))
        .with_attachment(self.image.clone())
    }

    fn fallback(&self) -> GradingResult {
        GradingResult::fallback(String::new(), FALLBACK_IMAGE_SUGGESTION)
    }

    fn normalize(
        &self,
        fields: &ParsedFields,
        raw: &RawModelOutput,
    ) -> Result<Normalized<GradingResult>> {
        normalize_grading(fields, raw, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssessmentError;
    use crate::json_block::parse_json_object;

    fn text_request() -> GradeTextRequest {
        GradeTextRequest {
            context: HomeworkContext::new("HW-1", "ST-9"),
            student_answer_text: "I goes to school every day.".to_string(),
            expected_answer_text: None,
            language: "vi".to_string(),
        }
    }

    fn run_normalize(req: &GradeTextRequest, raw: &str) -> Result<Normalized<GradingResult>> {
        req.interpret(&RawModelOutput::new(raw))
    }

    #[test]
    fn test_prompt_renders_na_and_default_rubric() {
        let prompt = text_request().build_prompt();
        assert!(prompt.expects_json);
        assert!(prompt.attachment.is_none());
        assert!(prompt.text.contains("- Instructions: N/A"));
        assert!(prompt.text.contains("Đáp án chuẩn (nếu có):\nN/A"));
        assert!(prompt.text.contains("Ngữ pháp/chính tả (3)"));
        assert!(prompt.text.contains("I goes to school every day."));
    }

    #[test]
    fn test_prompt_uses_custom_rubric() {
        let mut req = text_request();
        req.context.rubric = Some("Only spelling counts.".to_string());
        let prompt = req.build_prompt();
        assert!(prompt.text.contains("Only spelling counts."));
        assert!(!prompt.text.contains("Ngữ pháp/chính tả (3)"));
    }

    #[test]
    fn test_normalize_pads_lists_and_backfills_answer() {
        let req = text_request();
        let out = run_normalize(
            &req,
            r#"{"score": 7, "summary": " Tốt ", "strengths": ["Đúng ý"], "suggestions": [], "confidence": {"score": 0.9}}"#,
        )
        .unwrap();
        let result = out.payload;

        assert_eq!(result.score, 7.0);
        assert_eq!(result.max_score, 10.0);
        assert_eq!(result.summary, "Tốt");
        assert_eq!(result.strengths, vec!["Đúng ý", STRENGTH_FILLER]);
        assert_eq!(result.issues, vec![ISSUE_FILLER, ISSUE_FILLER]);
        assert_eq!(result.suggestions.len(), 3);
        assert_eq!(result.extracted_student_answer, req.student_answer_text);
        assert_eq!(result.confidence.get("score"), Some(&0.9));
        assert!(result.raw_text.is_some());
    }

    #[test]
    fn test_normalize_clamps_score() {
        let out = run_normalize(&text_request(), r#"{"score": 14, "max_score": 10}"#).unwrap();
        assert_eq!(out.payload.score, 10.0);
    }

    #[test]
    fn test_non_numeric_score_is_rejected() {
        let err = run_normalize(&text_request(), r#"{"score": "excellent"}"#).unwrap_err();
        assert!(matches!(err, AssessmentError::InvalidField { .. }));
    }

    #[test]
    fn test_fallback_shape() {
        let mut req = text_request();
        req.student_answer_text = "a".repeat(2500);
        let result = req.fallback();

        assert_eq!(result.score, 0.0);
        assert_eq!(result.strengths.len(), STRENGTH_COUNT);
        assert_eq!(result.issues.len(), ISSUE_COUNT);
        assert_eq!(result.suggestions[0], FALLBACK_TEXT_SUGGESTION);
        assert_eq!(result.suggestions.len(), SUGGESTION_COUNT);
        assert_eq!(result.extracted_student_answer.chars().count(), 2000);
    }

    #[test]
    fn test_link_without_text_uses_placeholder() {
        let link = GradeLinkRequest {
            context: HomeworkContext::new("HW-2", "ST-1"),
            link_url: "https://docs.example.com/essay".to_string(),
            extracted_text: Some("  ".to_string()),
            expected_answer_text: None,
            language: "vi".to_string(),
        };
        let req = link.to_text_request();
        assert!(req
            .student_answer_text
            .starts_with("(LINK ONLY) https://docs.example.com/essay"));
    }

    #[test]
    fn test_image_prompt_attaches_media() {
        let req = GradeImageRequest::new(
            HomeworkContext::new("HW-3", "ST-2"),
            MediaAttachment::new(vec![1, 2], None, DEFAULT_IMAGE_MIME),
        );
        let prompt = req.build_prompt();
        assert_eq!(prompt.attachment.unwrap().mime_type, "image/jpeg");

        let fields = parse_json_object(r#"{"score": 5}"#).unwrap();
        let out = req
            .normalize(&fields, &RawModelOutput::new("{\"score\": 5}"))
            .unwrap();
        assert_eq!(out.payload.extracted_student_answer, "");
        assert_eq!(req.fallback().suggestions[0], FALLBACK_IMAGE_SUGGESTION);
    }
}
