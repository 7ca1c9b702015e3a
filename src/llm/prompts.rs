//! Prompt fragments shared by the assessment tasks. Tasks compose these with
//! their own context in `build_prompt`.

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const JSON_ONLY: &str =
    "Trả về DUY NHẤT 1 JSON object (không markdown, không giải thích) theo schema:";

pub const DEFAULT_RUBRIC: &str = r#"Chấm theo thang 10:
- Đúng nội dung/đúng yêu cầu (4)
- Ngữ pháp/chính tả (3)
- Từ vựng/diễn đạt (2)
- Trình bày/độ rõ ràng (1)"#;

pub const GRADING_TEXT_ROLE: &str =
    "Bạn là giáo viên KidzGo. Hãy chấm bài dựa trên rubric và hướng dẫn bài. Không bịa.";

pub const GRADING_IMAGE_ROLE: &str = r#"Bạn là giáo viên KidzGo. Ảnh là bài làm học sinh.
Hãy: (1) trích nội dung bài làm (OCR) (2) chấm theo rubric.
Không bịa phần không nhìn thấy rõ."#;

pub const GRADING_SCHEMA: &str = r#"{
  "score": number,
  "max_score": 10,
  "summary": "string",
  "strengths": ["..."],
  "issues": ["..."],
  "suggestions": ["..."],
  "extracted_student_answer": "string|null",
  "confidence": {"score": 0.0, "extraction": 0.0},
  "warnings": ["..."]
}"#;

pub const SPEAKING_TRANSCRIPT_ROLE: &str = r#"Bạn là giáo viên KidzGo chấm Speaking/Phonics.
Dựa trên transcript (và target words/expected text nếu có), hãy:
- Chấm điểm phát âm, độ trôi chảy, độ chính xác (0-10)
- Liệt kê lỗi phonics (nếu mode=phonics) hoặc lỗi speaking (nếu mode=speaking)
- Gợi ý luyện tập cụ thể (drill, shadowing, minimal pairs, đọc âm cuối...)
Không bịa dữ liệu không có."#;

pub const SPEAKING_MEDIA_ROLE: &str = r#"Bạn là giáo viên KidzGo. File đính kèm là audio/video học sinh luyện nói/phonics.
Hãy:
1) Tạo transcript ngắn gọn (tiếng Anh nếu học sinh nói tiếng Anh)
2) Chấm điểm phát âm, độ trôi chảy, độ chính xác (0-10) và feedback theo context
Không bịa phần không nghe rõ."#;

pub const SPEAKING_SCHEMA: &str = r#"{
  "transcript": "string",
  "overall_score": number,
  "pronunciation_score": number,
  "fluency_score": number,
  "accuracy_score": number,
  "phonics_issues": ["..."],
  "speaking_issues": ["..."],
  "suggestions": ["..."],
  "practice_plan": ["..."],
  "confidence": {"transcript": 0.0, "scoring": 0.0},
  "warnings": ["..."]
}"#;

pub const RECEIPT_ROLE: &str = r#"Bạn là trợ lý kế toán của trung tâm Anh ngữ KidzGo.
Trích xuất dữ liệu từ ảnh biên lai/chứng từ chuyển khoản. Chỉ lấy những gì nhìn thấy rõ; không chắc thì null."#;

pub const RECEIPT_RULES: &str = r#"Quy tắc:
- amount phải chuẩn hóa về số (VND), bỏ dấu phẩy/chấm phân tách nghìn.
- Ưu tiên lấy: Số tiền, Ngày giờ, Mã GD/Trace/Ref, Nội dung."#;

/// Receipt schema with the request's direction and branch echoed back.
pub fn receipt_schema(direction: &str, branch_id: &str) -> String {
    format!(
        r#"{{
  "fields": {{
    "direction": "{direction}",
    "branch_id": "{branch_id}",
    "transaction_datetime": "YYYY-MM-DD HH:mm:ss" | null,
    "amount": number | string | null,
    "currency": "VND" | null,
    "bank_name": string | null,
    "transaction_id": string | null,
    "content": string | null,
    "sender_name": string | null,
    "sender_account": string | null,
    "receiver_name": string | null,
    "receiver_account": string | null
  }},
  "confidence": {{
    "transaction_datetime": 0.0,
    "amount": 0.0,
    "transaction_id": 0.0,
    "content": 0.0,
    "sender_account": 0.0,
    "receiver_account": 0.0
  }},
  "raw_text": string | null,
  "warnings": [string]
}}"#
    )
}

pub const REPORT_ROLE: &str = r#"Bạn là giáo viên trung tâm tiếng Anh KidzGo.
Hãy viết báo cáo tháng dựa CHỈ trên dữ liệu bên dưới (không bịa thêm).
Nếu thiếu dữ liệu phần nào, ghi rõ: "Chưa đủ dữ liệu để kết luận"."#;

pub const REPORT_SCHEMA: &str = r#"{
  "overview": "string",
  "strengths": ["...", "...", "..."],
  "improvements": ["...", "...", "..."],
  "highlights": ["...", "..."],
  "goals_next_month": ["...", "...", "..."],
  "attendance": "string",
  "homework": "string"
}"#;

pub const REPORT_RULES: &str = r#"Quy tắc:
- strengths: đúng 3 ý
- improvements: đúng 3 ý (mỗi ý kèm gợi ý luyện tập cụ thể)
- highlights: 2-3 ý
- goals_next_month: đúng 3 ý
- attendance/homework: chỉ nhận xét khi có số liệu ở trên"#;

pub const ENHANCE_FEEDBACK_ROLE: &str = "Bạn là chuyên gia giáo dục. Hãy chỉnh sửa đoạn feedback sau theo phong cách formal, rõ ràng, tích cực và phù hợp để giáo viên sử dụng gửi cho học sinh/phụ huynh. Giúp cấu trúc lại câu từ nếu cần để feedback dễ hiểu, chuyên nghiệp và dễ áp dụng trong thực tế.";

/// Renders an optional value, using "N/A" for absent or blank input.
pub fn or_na(value: Option<&str>) -> &str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or("N/A")
}

/// Bullet list, one `- item` per line.
pub fn bullets<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
