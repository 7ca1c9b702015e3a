use anyhow::Result;
use dotenv::dotenv;
use structured_assessment::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let service = AssessmentService::from_env();
    if service.ai_available() {
        println!("🤖 Using model {}\n", service.model());
    } else {
        println!("⚠️  GEMINI_API_KEY not set, answers come from rule-based fallbacks.\n");
    }

    let request = GradeTextRequest {
        context: HomeworkContext {
            instructions: Some("Write 3 sentences about your family.".to_string()),
            ..HomeworkContext::new("HW-DEMO", "ST-DEMO")
        },
        student_answer_text: "My family have four people. My father is teacher. I love my mother."
            .to_string(),
        expected_answer_text: None,
        language: "vi".to_string(),
    };

    println!("📝 Grading homework {}...", request.context.homework_id);
    let graded = service.grade_text(&request).await;
    println!("{}\n", serde_json::to_string_pretty(&graded)?);

    println!("✍️  Rewriting a teacher comment...");
    let feedback = service
        .enhance_feedback(&EnhanceFeedbackRequest::new(
            "hôm nay em làm bài đầy đủ, học tốt lắm",
        ))
        .await;
    println!("{}\n", serde_json::to_string_pretty(&feedback)?);

    println!("📐 Grading response schema:");
    println!("{}", schema_as_json::<GradingResult>()?);

    Ok(())
}
