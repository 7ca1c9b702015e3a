use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::json_block::ParsedFields;
use crate::llm::prompts::{
    or_na, JSON_ONLY, SPEAKING_MEDIA_ROLE, SPEAKING_SCHEMA, SPEAKING_TRANSCRIPT_ROLE,
};
use crate::llm::{MediaAttachment, Prompt, RawModelOutput};
use crate::normalize::{cap_list, ensure_list_len, FieldReader};
use crate::pipeline::{AssessmentTask, Normalized};
use crate::tasks::default_language;

pub const DEFAULT_MEDIA_MIME: &str = "video/mp4";
pub const MAX_SCORE: f64 = 10.0;

const MAX_ISSUES: usize = 8;
const SUGGESTION_COUNT: usize = 3;
const PRACTICE_COUNT: usize = 3;

const SUGGESTION_FILLER: &str = "Luyện tập 5–10 phút mỗi ngày theo hướng dẫn.";
const PRACTICE_FILLER: &str = "Shadowing 3–5 phút/ngày với câu ngắn.";
const MEDIA_FALLBACK_SUGGESTION: &str =
    "Model có thể không hỗ trợ audio/video trực tiếp. Hãy dùng analyze-transcript (ASR trước).";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SpeakingMode {
    #[default]
    Phonics,
    Speaking,
}

impl fmt::Display for SpeakingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeakingMode::Phonics => f.write_str("phonics"),
            SpeakingMode::Speaking => f.write_str("speaking"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpeakingContext {
    pub homework_id: String,
    pub student_id: String,
    #[serde(default)]
    pub mode: SpeakingMode,
    /// Words or sounds the student was asked to read.
    #[serde(default)]
    pub target_words: Vec<String>,
    /// Passage or sentence the student was asked to read, if any.
    #[serde(default)]
    pub expected_text: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

impl SpeakingContext {
    pub fn new(homework_id: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            homework_id: homework_id.into(),
            student_id: student_id.into(),
            mode: SpeakingMode::default(),
            target_words: Vec::new(),
            expected_text: None,
            instructions: None,
            language: default_language(),
        }
    }

    /// Splits a comma separated word list, dropping blanks.
    pub fn parse_target_words(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn context_block(&self) -> String {
        let targets = cap_list(&self.target_words, usize::MAX).join(", ");
        format!(
            "Context:\n\
             - Mode: {}\n\
             - Target words: {}\n\
             - Expected text: {}\n\
             - Instructions: {}",
            self.mode,
            or_na(Some(targets.as_str())),
            or_na(self.expected_text.as_deref()),
            or_na(self.instructions.as_deref()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeTranscriptRequest {
    pub context: SpeakingContext,
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzeMediaRequest {
    pub context: SpeakingContext,
    pub media: MediaAttachment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpeakingResult {
    pub transcript: String,
    pub overall_score: f64,
    pub pronunciation_score: f64,
    pub fluency_score: f64,
    pub accuracy_score: f64,
    pub phonics_issues: Vec<String>,
    pub speaking_issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub practice_plan: Vec<String>,
    pub confidence: BTreeMap<String, f64>,
    pub raw_text: Option<String>,
}

fn tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn normalized_phrase(text: &str) -> String {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits `targets` into those heard in `transcript` and those missing.
/// Multi-word targets must appear as a contiguous phrase.
fn word_coverage(targets: &[String], transcript: &str) -> (Vec<String>, Vec<String>) {
    let heard = tokens(transcript);
    let phrase = format!(" {} ", normalized_phrase(transcript));

    targets
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .partition(|target| {
            let wanted = normalized_phrase(target);
            if wanted.contains(' ') {
                phrase.contains(&format!(" {} ", wanted))
            } else {
                heard.contains(&wanted)
            }
        })
}

fn score_from_counts(found: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let ratio = found as f64 / total as f64;
    (ratio * MAX_SCORE * 10.0).round() / 10.0
}

/// Rule-based analysis that only reports what the transcript itself shows.
fn rule_based_result(context: &SpeakingContext, transcript: &str) -> SpeakingResult {
    let transcript = transcript.trim();

    let targets: Vec<String> = if !context.target_words.is_empty() {
        context.target_words.clone()
    } else {
        context
            .expected_text
            .as_deref()
            .map(|text| tokens(text).into_iter().collect())
            .unwrap_or_default()
    };

    let (found, missing) = if transcript.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        word_coverage(&targets, transcript)
    };
    let accuracy_score = score_from_counts(found.len(), found.len() + missing.len());

    let issues: Vec<String> = missing
        .iter()
        .map(|w| format!("Chưa nghe thấy từ/âm: {}", w))
        .collect();
    let (phonics_issues, speaking_issues) = match context.mode {
        SpeakingMode::Phonics => (cap_list(&issues, MAX_ISSUES), Vec::new()),
        SpeakingMode::Speaking => (Vec::new(), cap_list(&issues, MAX_ISSUES)),
    };

    let mut suggestions = Vec::new();
    if !missing.is_empty() {
        suggestions.push(format!(
            "Luyện đọc lại các từ: {}.",
            cap_list(&missing, MAX_ISSUES).join(", ")
        ));
    }

    SpeakingResult {
        transcript: transcript.to_string(),
        overall_score: 0.0,
        pronunciation_score: 0.0,
        fluency_score: 0.0,
        accuracy_score,
        phonics_issues,
        speaking_issues,
        suggestions: ensure_list_len(&suggestions, SUGGESTION_COUNT, SUGGESTION_FILLER),
        practice_plan: ensure_list_len(&[] as &[&str], PRACTICE_COUNT, PRACTICE_FILLER),
        confidence: BTreeMap::new(),
        raw_text: None,
    }
}

fn normalize_speaking(
    fields: &ParsedFields,
    raw: &RawModelOutput,
    transcript_backfill: &str,
) -> Result<Normalized<SpeakingResult>> {
    let reader = FieldReader::new(fields);
    let score = |key: &str| -> Result<f64> { Ok(reader.number(key, 0.0)?.clamp(0.0, MAX_SCORE)) };

    let result = SpeakingResult {
        transcript: reader
            .text("transcript")
            .unwrap_or_else(|| transcript_backfill.trim().to_string()),
        overall_score: score("overall_score")?,
        pronunciation_score: score("pronunciation_score")?,
        fluency_score: score("fluency_score")?,
        accuracy_score: score("accuracy_score")?,
        phonics_issues: cap_list(&reader.string_list("phonics_issues"), MAX_ISSUES),
        speaking_issues: cap_list(&reader.string_list("speaking_issues"), MAX_ISSUES),
        suggestions: ensure_list_len(
            &reader.string_list("suggestions"),
            SUGGESTION_COUNT,
            SUGGESTION_FILLER,
        ),
        practice_plan: ensure_list_len(
            &reader.string_list("practice_plan"),
            PRACTICE_COUNT,
            PRACTICE_FILLER,
        ),
        confidence: reader.confidence("confidence"),
        raw_text: Some(raw.text.clone()),
    };

    Ok(Normalized::new(result).with_warnings(reader.string_list("warnings")))
}

impl AssessmentTask for AnalyzeTranscriptRequest {
    type Output = SpeakingResult;
    const NAME: &'static str = "analyze-transcript";

    fn build_prompt(&self) -> Prompt {
        Prompt::json(format!(
            "{SPEAKING_TRANSCRIPT_ROLE}\n\n{JSON_ONLY}\n{SPEAKING_SCHEMA}\n\n{}\n\n\
             Transcript:\n{}\n\n\
             Ngôn ngữ phản hồi: {}\n",
            self.context.context_block(),
            self.transcript,
            self.context.language,
        ))
    }

    fn fallback(&self) -> SpeakingResult {
        rule_based_result(&self.context, &self.transcript)
    }

    fn normalize(
        &self,
        fields: &ParsedFields,
        raw: &RawModelOutput,
    ) -> Result<Normalized<SpeakingResult>> {
        normalize_speaking(fields, raw, &self.transcript)
    }
}

impl AssessmentTask for AnalyzeMediaRequest {
    type Output = SpeakingResult;
    const NAME: &'static str = "analyze-media";

    fn build_prompt(&self) -> Prompt {
        Prompt::json(format!(
            "{SPEAKING_MEDIA_ROLE}\n\n{JSON_ONLY}\n{SPEAKING_SCHEMA}\n\n{}\n\n\
             Ngôn ngữ phản hồi: {}\n",
            self.context.context_block(),
            self.context.language,
        ))
        .with_attachment(self.media.clone())
    }

    fn fallback(&self) -> SpeakingResult {
        let mut result = rule_based_result(&self.context, "");
        result.suggestions = ensure_list_len(
            &[MEDIA_FALLBACK_SUGGESTION],
            SUGGESTION_COUNT,
            SUGGESTION_FILLER,
        );
        result
    }

    fn normalize(
        &self,
        fields: &ParsedFields,
        raw: &RawModelOutput,
    ) -> Result<Normalized<SpeakingResult>> {
        normalize_speaking(fields, raw, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(words: &[&str]) -> SpeakingContext {
        let mut ctx = SpeakingContext::new("HW-7", "ST-3");
        ctx.target_words = words.iter().map(|w| w.to_string()).collect();
        ctx
    }

    #[test]
    fn test_parse_target_words() {
        assert_eq!(
            SpeakingContext::parse_target_words(" cat, dog ,, ship "),
            vec!["cat", "dog", "ship"]
        );
    }

    #[test]
    fn test_prompt_lists_targets_and_na() {
        let req = AnalyzeTranscriptRequest {
            context: context(&["cat", "dog"]),
            transcript: "cat dog".to_string(),
        };
        let prompt = req.build_prompt();
        assert!(prompt.text.contains("- Mode: phonics"));
        assert!(prompt.text.contains("- Target words: cat, dog"));
        assert!(prompt.text.contains("- Expected text: N/A"));
        assert!(prompt.text.contains("Transcript:\ncat dog"));
    }

    #[test]
    fn test_fallback_derives_accuracy_from_target_coverage() {
        let req = AnalyzeTranscriptRequest {
            context: context(&["cat", "Dog", "fish and chips", "ship"]),
            transcript: "The cat and the dog like fish and chips.".to_string(),
        };
        let result = req.fallback();

        assert_eq!(result.accuracy_score, 7.5);
        assert_eq!(result.overall_score, 0.0);
        assert_eq!(result.phonics_issues, vec!["Chưa nghe thấy từ/âm: ship"]);
        assert!(result.speaking_issues.is_empty());
        assert_eq!(result.suggestions[0], "Luyện đọc lại các từ: ship.");
        assert_eq!(result.suggestions.len(), 3);
        assert_eq!(result.practice_plan.len(), 3);
    }

    #[test]
    fn test_fallback_uses_expected_text_when_no_targets() {
        let mut ctx = context(&[]);
        ctx.mode = SpeakingMode::Speaking;
        ctx.expected_text = Some("I like apples".to_string());
        let req = AnalyzeTranscriptRequest {
            context: ctx,
            transcript: "I like".to_string(),
        };
        let result = req.fallback();

        assert!((result.accuracy_score - 6.7).abs() < 1e-9);
        assert_eq!(result.speaking_issues, vec!["Chưa nghe thấy từ/âm: apples"]);
        assert!(result.phonics_issues.is_empty());
    }

    #[test]
    fn test_normalize_backfills_transcript_and_caps_issues() {
        let req = AnalyzeTranscriptRequest {
            context: context(&[]),
            transcript: "  hello world ".to_string(),
        };
        let issues: Vec<String> = (0..12).map(|i| format!("issue {}", i)).collect();
        let raw = serde_json::json!({
            "overall_score": 8,
            "pronunciation_score": 11,
            "phonics_issues": issues,
        })
        .to_string();
        let result = req.interpret(&RawModelOutput::new(raw)).unwrap().payload;

        assert_eq!(result.transcript, "hello world");
        assert_eq!(result.overall_score, 8.0);
        assert_eq!(result.pronunciation_score, 10.0);
        assert_eq!(result.phonics_issues.len(), 8);
        assert_eq!(result.suggestions, vec![SUGGESTION_FILLER; 3]);
        assert_eq!(result.practice_plan, vec![PRACTICE_FILLER; 3]);
    }

    #[test]
    fn test_media_prompt_and_fallback() {
        let req = AnalyzeMediaRequest {
            context: context(&["cat"]),
            media: MediaAttachment::new(vec![9; 4], Some(""), DEFAULT_MEDIA_MIME),
        };
        let prompt = req.build_prompt();
        assert_eq!(prompt.attachment.as_ref().unwrap().mime_type, "video/mp4");
        assert!(prompt.text.contains("\"transcript\": \"string\""));

        let result = req.fallback();
        assert_eq!(result.transcript, "");
        assert_eq!(result.accuracy_score, 0.0);
        assert_eq!(result.suggestions[0], MEDIA_FALLBACK_SUGGESTION);
    }
}
