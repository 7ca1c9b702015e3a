//! JSON Schemas for the response envelopes, for API docs and contract tests.

use schemars::schema::RootSchema;
use schemars::JsonSchema;

use crate::envelope::{Envelope, ResultPayload};
use crate::tasks::{
    EnhancedFeedback, GradingResult, MonthlyReport, ReceiptExtraction, SpeakingResult,
};

pub fn generate_json_schema<T: JsonSchema>() -> RootSchema {
    schemars::schema_for!(Envelope<T>)
}

pub fn schema_as_json<T: JsonSchema>() -> Result<String, serde_json::Error> {
    let schema = generate_json_schema::<T>();
    serde_json::to_string_pretty(&schema)
}

/// Pretty-printed envelope schema for every endpoint, keyed by endpoint name.
pub fn all_schemas() -> Result<Vec<(&'static str, String)>, serde_json::Error> {
    Ok(vec![
        ("grade", schema_as_json::<ResultPayload<GradingResult>>()?),
        ("speaking", schema_as_json::<ResultPayload<SpeakingResult>>()?),
        ("payment-proof", schema_as_json::<ReceiptExtraction>()?),
        ("monthly-report", schema_as_json::<MonthlyReport>()?),
        ("enhance-feedback", schema_as_json::<EnhancedFeedback>()?),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grading_schema_nests_result() {
        let schema = generate_json_schema::<ResultPayload<GradingResult>>();
        let properties = &schema.schema.object.as_ref().unwrap().properties;
        assert!(properties.contains_key("ai_used"));
        assert!(properties.contains_key("result"));
        assert!(properties.contains_key("warnings"));
        assert!(!properties.contains_key("score"));

        let schema_json = schema_as_json::<ResultPayload<GradingResult>>().unwrap();
        assert!(schema_json.contains("extracted_student_answer"));
    }

    #[test]
    fn test_report_schema_has_sections() {
        let schema_json = schema_as_json::<MonthlyReport>().unwrap();
        assert!(schema_json.contains("draft_text"));
        assert!(schema_json.contains("goals_next_month"));
        assert!(schema_json.contains("source_summary"));
    }

    #[test]
    fn test_every_endpoint_has_a_schema() {
        let schemas = all_schemas().unwrap();
        assert_eq!(schemas.len(), 5);
        assert!(schemas.iter().all(|(_, s)| s.contains("ai_used")));
    }
}
