use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::json_block::ParsedFields;
use crate::llm::prompts::ENHANCE_FEEDBACK_ROLE;
use crate::llm::{Prompt, RawModelOutput};
use crate::pipeline::{AssessmentTask, Normalized};
use crate::tasks::default_language;

const BLANK_DRAFT_WARNING: &str = "Feedback draft is empty";

/// Applied in order, each on word boundaries. Longer phrases come before the
/// words they contain.
const REPLACEMENTS: &[(&str, &str)] = &[
    ("hôm nay", "trong buổi học"),
    ("em", "học sinh"),
    ("tốt lắm", "có tiến bộ"),
    ("lắm", "cao"),
    ("làm bài", "hoàn thành bài tập"),
    ("đầy đủ", "đầy đủ các nội dung được giao"),
    ("chăm chỉ", "thể hiện sự chăm chỉ trong học tập"),
    ("học tốt", "có kết quả học tập tốt"),
    ("ngoan", "có thái độ học tập tích cực"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnhanceFeedbackRequest {
    pub draft: String,
    #[serde(default = "default_language")]
    pub language: String,
}

impl EnhanceFeedbackRequest {
    pub fn new(draft: impl Into<String>) -> Self {
        Self {
            draft: draft.into(),
            language: default_language(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EnhancedFeedback {
    pub enhanced: String,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn matches_at(haystack: &[char], at: usize, needle: &[char]) -> bool {
    haystack.len() >= at + needle.len()
        && haystack[at..at + needle.len()]
            .iter()
            .zip(needle)
            .all(|(h, n)| h.to_lowercase().eq(n.to_lowercase()))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Case-insensitive whole-word replacement. A capitalized match keeps its
/// capital on the replacement.
fn replace_word(text: &str, from: &str, to: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = from.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let end = i + pattern.len();
        let starts_word = i == 0 || !is_word_char(chars[i - 1]);
        let ends_word = end >= chars.len() || !is_word_char(chars[end]);

        if !pattern.is_empty() && starts_word && matches_at(&chars, i, &pattern) && ends_word {
            if chars[i].is_uppercase() {
                out.push_str(&capitalize(to));
            } else {
                out.push_str(to);
            }
            i = end;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Rule-based formal rewrite used when the model is unavailable.
pub fn formalize(draft: &str) -> String {
    let mut text = draft.trim().to_string();
    if text.is_empty() {
        return text;
    }

    for (from, to) in REPLACEMENTS {
        text = replace_word(&text, from, to);
    }

    if !text.ends_with(['.', '!', '?']) {
        text.push('.');
    }
    capitalize(&text)
}

fn strip_quotes(text: &str) -> &str {
    let trimmed = text.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”')] {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim();
        }
    }
    trimmed
}

impl AssessmentTask for EnhanceFeedbackRequest {
    type Output = EnhancedFeedback;
    const NAME: &'static str = "enhance-feedback";

    fn build_prompt(&self) -> Prompt {
        Prompt::free_text(format!(
            "{ENHANCE_FEEDBACK_ROLE}\nNgôn ngữ phản hồi: {}\nChỉ trả về đoạn feedback đã chỉnh sửa.\n\n{}",
            self.language,
            self.draft.trim(),
        ))
    }

    fn fallback(&self) -> EnhancedFeedback {
        EnhancedFeedback {
            enhanced: formalize(&self.draft),
        }
    }

    fn normalize(
        &self,
        _fields: &ParsedFields,
        raw: &RawModelOutput,
    ) -> Result<Normalized<EnhancedFeedback>> {
        let text = strip_quotes(&raw.text);
        let enhanced = if text.is_empty() {
            self.draft.trim().to_string()
        } else {
            text.to_string()
        };
        Ok(Normalized::new(EnhancedFeedback { enhanced }))
    }

    /// The reply is prose, not JSON.
    fn interpret(&self, raw: &RawModelOutput) -> Result<Normalized<EnhancedFeedback>> {
        self.normalize(&ParsedFields::new(), raw)
    }

    fn skip_reason(&self) -> Option<String> {
        self.draft
            .trim()
            .is_empty()
            .then(|| BLANK_DRAFT_WARNING.to_string())
    }
}
