//! Monthly progress report for one student.
//!
//! The report is built from teacher feedback after each session plus any of the
//! optional progress sources the caller has (attendance, homework, tests,
//! gamification, topics, earlier reports, free-text notes). Counts and
//! percentages always come from the request; the model only writes prose.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::json_block::ParsedFields;
use crate::llm::prompts::{bullets, JSON_ONLY, REPORT_ROLE, REPORT_RULES, REPORT_SCHEMA};
use crate::llm::{Prompt, RawModelOutput};
use crate::normalize::{ensure_list_len, FieldReader};
use crate::pipeline::{AssessmentTask, Normalized};
use crate::tasks::default_language;

pub const DEFAULT_TEMPLATE: &str = "MONTHLY_REPORT_V1";
pub const NOT_AVAILABLE: &str = "Chưa có dữ liệu";

const POSITIVE_KEYWORDS: &[&str] = &[
    "tiến bộ", "tốt", "tích cực", "tự tin", "chăm", "nhanh", "đúng", "cải thiện",
];
const NEGATIVE_KEYWORDS: &[&str] = &[
    "chậm", "thiếu", "chưa", "sai", "yếu", "quên", "rụt rè", "lẫn", "khó",
];

const BUCKET_CAP: usize = 3;
const STRENGTH_COUNT: usize = 3;
const IMPROVEMENT_COUNT: usize = 3;
const HIGHLIGHT_COUNT: usize = 2;
const GOAL_COUNT: usize = 3;

const GENERIC_STRENGTH: &str =
    "Học viên duy trì tham gia học đều và có thái độ hợp tác trong lớp.";
const GENERIC_IMPROVEMENT: &str =
    "Cần tiếp tục luyện tập đều đặn để củng cố kỹ năng và tăng tốc độ phản xạ.";
const GENERIC_HIGHLIGHT: &str = "Có ghi nhận tiến bộ trong tháng.";
const DEFAULT_GOALS: [&str; GOAL_COUNT] = [
    "Duy trì thói quen luyện tập ngắn mỗi ngày (5–10 phút) theo hướng dẫn của giáo viên.",
    "Tập trung 1–2 mục tiêu cụ thể (ví dụ: phát âm âm cuối / tốc độ đọc / từ vựng theo chủ đề).",
    "Hoàn thành bài tập đúng hạn và chủ động hỏi khi chưa hiểu.",
];

const STRENGTH_FILLER: &str = "Học viên có thái độ học tập tích cực.";
const IMPROVEMENT_FILLER: &str =
    "Cần luyện tập thêm theo hướng dẫn của giáo viên (5–10 phút/ngày).";
const GOAL_FILLER: &str = "Duy trì luyện tập đều đặn theo kế hoạch.";

const NO_DATA_WARNING: &str = "No session feedback or progress data to summarize";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StudentInfo {
    pub student_id: String,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub program: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportRange {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionFeedback {
    /// `YYYY-MM-DD`; unparseable dates still count as feedback but not as a covered day.
    pub date: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttendanceSummary {
    #[serde(default)]
    pub attended_sessions: u32,
    #[serde(default)]
    pub total_sessions: u32,
    /// Either a ratio (`0.92`) or a percentage (`92`).
    #[serde(default)]
    pub rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HomeworkSummary {
    #[serde(default)]
    pub completed: u32,
    #[serde(default)]
    pub assigned: u32,
    /// Either a ratio (`0.8`) or a percentage (`80`).
    #[serde(default)]
    pub completion_rate: Option<f64>,
    #[serde(default)]
    pub average_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TestResult {
    pub name: String,
    pub score: f64,
    pub max_score: f64,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GamificationSummary {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub xp: Option<u32>,
    #[serde(default)]
    pub stars: Option<u32>,
    #[serde(default)]
    pub badges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PriorReport {
    pub period: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyReportRequest {
    pub student: StudentInfo,
    pub range: ReportRange,
    #[serde(default)]
    pub session_feedbacks: Vec<SessionFeedback>,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub attendance: Option<AttendanceSummary>,
    #[serde(default)]
    pub homework: Option<HomeworkSummary>,
    #[serde(default)]
    pub tests: Vec<TestResult>,
    #[serde(default)]
    pub gamification: Option<GamificationSummary>,
    #[serde(default)]
    pub topics_covered: Vec<String>,
    #[serde(default)]
    pub prior_reports: Vec<PriorReport>,
    #[serde(default)]
    pub teacher_notes: Option<String>,
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportSections {
    pub overview: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub highlights: Vec<String>,
    pub goals_next_month: Vec<String>,
    pub attendance: String,
    pub homework: String,
    pub source_summary: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MonthlyReport {
    pub draft_text: String,
    pub sections: ReportSections,
}

/// Accepts a ratio or a percentage and returns a ratio.
fn as_ratio(value: f64) -> Option<f64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(if value > 1.0 { value / 100.0 } else { value })
}

fn percent(ratio: f64) -> String {
    format!("{}%", (ratio * 100.0).round() as i64)
}

fn count_ratio(done: u32, total: u32) -> Option<f64> {
    (total > 0).then(|| f64::from(done) / f64::from(total))
}

impl AttendanceSummary {
    pub fn ratio(&self) -> Option<f64> {
        self.rate
            .and_then(as_ratio)
            .or_else(|| count_ratio(self.attended_sessions, self.total_sessions))
    }

    fn describe(&self) -> String {
        match (self.ratio(), self.total_sessions) {
            (Some(r), 0) => format!("Chuyên cần: {}", percent(r)),
            (Some(r), total) => format!(
                "Chuyên cần: {} ({}/{} buổi)",
                percent(r),
                self.attended_sessions,
                total
            ),
            (None, _) => format!("Chuyên cần: {}", NOT_AVAILABLE),
        }
    }
}

impl HomeworkSummary {
    pub fn ratio(&self) -> Option<f64> {
        self.completion_rate
            .and_then(as_ratio)
            .or_else(|| count_ratio(self.completed, self.assigned))
    }

    fn describe(&self) -> String {
        let mut line = match (self.ratio(), self.assigned) {
            (Some(r), 0) => format!("Hoàn thành bài tập: {}", percent(r)),
            (Some(r), assigned) => format!(
                "Hoàn thành bài tập: {} ({}/{} bài)",
                percent(r),
                self.completed,
                assigned
            ),
            (None, _) => format!("Hoàn thành bài tập: {}", NOT_AVAILABLE),
        };
        if let Some(avg) = self.average_score.filter(|v| v.is_finite()) {
            line.push_str(&format!(", điểm trung bình {:.1}", avg));
        }
        line
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Keyword buckets used when no model is available.
fn classify(texts: &[String]) -> (Vec<String>, Vec<String>, Vec<String>) {
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();
    let mut highlights = Vec::new();

    for text in texts {
        let lower = text.to_lowercase();
        if highlights.len() < BUCKET_CAP {
            highlights.push(text.clone());
        }
        if contains_any(&lower, POSITIVE_KEYWORDS) && strengths.len() < BUCKET_CAP {
            strengths.push(text.clone());
        }
        if contains_any(&lower, NEGATIVE_KEYWORDS) && improvements.len() < BUCKET_CAP {
            improvements.push(text.clone());
        }
    }

    if strengths.is_empty() {
        strengths.push(GENERIC_STRENGTH.to_string());
    }
    if improvements.is_empty() {
        improvements.push(GENERIC_IMPROVEMENT.to_string());
    }
    if highlights.is_empty() {
        highlights.push(GENERIC_HIGHLIGHT.to_string());
    }

    (strengths, improvements, highlights)
}

impl MonthlyReportRequest {
    fn feedback_texts(&self) -> Vec<String> {
        self.session_feedbacks
            .iter()
            .map(|f| f.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn note_lines(&self) -> Vec<String> {
        self.teacher_notes
            .as_deref()
            .unwrap_or_default()
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn days_covered(&self) -> u32 {
        let dates: BTreeSet<NaiveDate> = self
            .session_feedbacks
            .iter()
            .filter_map(|f| NaiveDate::parse_from_str(f.date.trim(), "%Y-%m-%d").ok())
            .collect();
        dates.len() as u32
    }

    fn program(&self) -> Option<&str> {
        self.student
            .program
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    pub fn has_any_source(&self) -> bool {
        !self.feedback_texts().is_empty()
            || self.attendance.is_some()
            || self.homework.is_some()
            || !self.tests.is_empty()
            || self.gamification.is_some()
            || !self.topics_covered.is_empty()
            || !self.prior_reports.is_empty()
            || !self.note_lines().is_empty()
    }

    fn source_summary(&self) -> BTreeMap<String, u32> {
        BTreeMap::from([
            ("total_feedbacks".to_string(), self.feedback_texts().len() as u32),
            ("days_covered".to_string(), self.days_covered()),
        ])
    }

    fn attendance_line(&self) -> String {
        self.attendance
            .as_ref()
            .map(AttendanceSummary::describe)
            .unwrap_or_else(|| format!("Chuyên cần: {}", NOT_AVAILABLE))
    }

    fn homework_line(&self) -> String {
        self.homework
            .as_ref()
            .map(HomeworkSummary::describe)
            .unwrap_or_else(|| format!("Hoàn thành bài tập: {}", NOT_AVAILABLE))
    }

    fn fallback_overview(&self) -> String {
        let (from, to) = (self.range.from_date, self.range.to_date);
        let total = self.feedback_texts().len();
        if total == 0 {
            return format!(
                "Trong giai đoạn {} đến {}, hiện chưa có đủ nhận xét sau buổi học để tổng hợp báo cáo.",
                from, to
            );
        }

        let who = match self.program() {
            Some(program) => format!("{} ({})", self.student.name, program),
            None => self.student.name.clone(),
        };
        format!(
            "Trong giai đoạn {} đến {}, {} có {} ghi nhận sau buổi học. \
             Báo cáo này tổng hợp các điểm nổi bật và đề xuất cải thiện dựa trên nhận xét của giáo viên.",
            from, to, who, total
        )
    }

    fn source_blocks(&self) -> Vec<String> {
        let mut blocks = Vec::new();

        let feedback: Vec<String> = self
            .session_feedbacks
            .iter()
            .filter(|f| !f.text.trim().is_empty())
            .map(|f| format!("[{}] {}", f.date.trim(), f.text.trim()))
            .collect();
        if !feedback.is_empty() {
            blocks.push(format!("Feedback sau buổi học:\n{}", bullets(&feedback)));
        }

        if self.attendance.is_some() {
            blocks.push(self.attendance_line());
        }
        if self.homework.is_some() {
            blocks.push(self.homework_line());
        }

        if !self.tests.is_empty() {
            let lines: Vec<String> = self
                .tests
                .iter()
                .map(|t| match t.date.as_deref() {
                    Some(date) => format!("{}: {}/{} ({})", t.name, t.score, t.max_score, date),
                    None => format!("{}: {}/{}", t.name, t.score, t.max_score),
                })
                .collect();
            blocks.push(format!("Kết quả kiểm tra:\n{}", bullets(&lines)));
        }

        if let Some(game) = &self.gamification {
            let mut parts = Vec::new();
            if let Some(level) = game.level.as_deref() {
                parts.push(format!("Level {}", level));
            }
            if let Some(xp) = game.xp {
                parts.push(format!("{} XP", xp));
            }
            if let Some(stars) = game.stars {
                parts.push(format!("{} sao", stars));
            }
            if !game.badges.is_empty() {
                parts.push(format!("huy hiệu: {}", game.badges.join(", ")));
            }
            if !parts.is_empty() {
                blocks.push(format!("Gamification: {}", parts.join("; ")));
            }
        }

        if !self.topics_covered.is_empty() {
            blocks.push(format!("Chủ đề đã học:\n{}", bullets(&self.topics_covered)));
        }

        if !self.prior_reports.is_empty() {
            let lines: Vec<String> = self
                .prior_reports
                .iter()
                .map(|r| format!("[{}] {}", r.period, r.summary.trim()))
                .collect();
            blocks.push(format!("Báo cáo các tháng trước:\n{}", bullets(&lines)));
        }

        let notes = self.note_lines();
        if !notes.is_empty() {
            blocks.push(format!("Ghi chú của giáo viên:\n{}", notes.join("\n")));
        }

        blocks
    }

    fn header(&self) -> String {
        let mut lines = vec![format!("Học viên: {}", self.student.name)];
        if let Some(age) = self.student.age {
            lines.push(format!("Tuổi: {}", age));
        }
        if let Some(program) = self.program() {
            lines.push(format!("Chương trình: {}", program));
        }
        lines.push(format!(
            "Khoảng thời gian: {} đến {}",
            self.range.from_date, self.range.to_date
        ));
        lines.push(format!("Mẫu báo cáo: {}", self.template));
        lines.push(format!("Ngôn ngữ phản hồi: {}", self.language));
        lines.join("\n")
    }

    fn sections_to_report(&self, sections: ReportSections) -> MonthlyReport {
        MonthlyReport {
            draft_text: render_draft(&sections),
            sections,
        }
    }
}

fn with_commentary(line: String, commentary: Option<String>) -> String {
    match commentary {
        Some(text) => format!("{}. {}", line, text),
        None => line,
    }
}

/// Plain-text report shared by the generated and rule-based paths.
pub fn render_draft(sections: &ReportSections) -> String {
    let count = |key: &str| sections.source_summary.get(key).copied().unwrap_or(0);
    format!(
        "1) Tổng quan:\n{}\n\n\
         2) Điểm mạnh:\n{}\n\n\
         3) Cần cải thiện:\n{}\n\n\
         4) Nhận xét tiêu biểu:\n{}\n\n\
         5) Mục tiêu tháng tới:\n{}\n\n\
         6) Thống kê nguồn dữ liệu:\n\
         - Số feedback được tổng hợp: {}\n\
         - Số ngày có ghi nhận: {}\n\
         - {}\n\
         - {}\n",
        sections.overview,
        bullets(&sections.strengths),
        bullets(&sections.improvements),
        bullets(&sections.highlights),
        bullets(&sections.goals_next_month),
        count("total_feedbacks"),
        count("days_covered"),
        sections.attendance,
        sections.homework,
    )
}

impl AssessmentTask for MonthlyReportRequest {
    type Output = MonthlyReport;
    const NAME: &'static str = "monthly-report";

    fn build_prompt(&self) -> Prompt {
        Prompt::json(format!(
            "{REPORT_ROLE}\n\n{}\n\n{}\n\n{JSON_ONLY}\n{REPORT_SCHEMA}\n\n{REPORT_RULES}\n",
            self.header(),
            self.source_blocks().join("\n\n"),
        ))
    }

    fn fallback(&self) -> MonthlyReport {
        let mut texts = self.feedback_texts();
        texts.extend(self.note_lines());
        let (strengths, improvements, highlights) = classify(&texts);

        self.sections_to_report(ReportSections {
            overview: self.fallback_overview(),
            strengths,
            improvements,
            highlights,
            goals_next_month: DEFAULT_GOALS.iter().map(|g| g.to_string()).collect(),
            attendance: self.attendance_line(),
            homework: self.homework_line(),
            source_summary: self.source_summary(),
        })
    }

    fn normalize(
        &self,
        fields: &ParsedFields,
        _raw: &RawModelOutput,
    ) -> Result<Normalized<MonthlyReport>> {
        let reader = FieldReader::new(fields);

        // Figures always come from the request. Model commentary on a source is
        // appended only when that source was provided.
        let attendance = with_commentary(
            self.attendance_line(),
            self.attendance.as_ref().and(reader.text("attendance")),
        );
        let homework = with_commentary(
            self.homework_line(),
            self.homework.as_ref().and(reader.text("homework")),
        );

        let sections = ReportSections {
            overview: reader
                .text("overview")
                .unwrap_or_else(|| self.fallback_overview()),
            strengths: ensure_list_len(&reader.string_list("strengths"), STRENGTH_COUNT, STRENGTH_FILLER),
            improvements: ensure_list_len(
                &reader.string_list("improvements"),
                IMPROVEMENT_COUNT,
                IMPROVEMENT_FILLER,
            ),
            highlights: ensure_list_len(
                &reader.string_list("highlights"),
                HIGHLIGHT_COUNT,
                GENERIC_HIGHLIGHT,
            ),
            goals_next_month: ensure_list_len(
                &reader.string_list("goals_next_month"),
                GOAL_COUNT,
                GOAL_FILLER,
            ),
            attendance,
            homework,
            source_summary: self.source_summary(),
        };

        Ok(Normalized::new(self.sections_to_report(sections))
            .with_warnings(reader.string_list("warnings")))
    }

    fn skip_reason(&self) -> Option<String> {
        (!self.has_any_source()).then(|| NO_DATA_WARNING.to_string())
    }
}
