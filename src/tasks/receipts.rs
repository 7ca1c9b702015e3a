use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AssessmentError, Result};
use crate::json_block::ParsedFields;
use crate::llm::prompts::{receipt_schema, JSON_ONLY, RECEIPT_ROLE, RECEIPT_RULES};
use crate::llm::{MediaAttachment, Prompt, RawModelOutput};
use crate::normalize::{normalize_account, normalize_amount, FieldReader};
use crate::pipeline::{AssessmentTask, Normalized};

pub const DEFAULT_RECEIPT_MIME: &str = "image/jpeg";
pub const UNKNOWN_BRANCH: &str = "UNKNOWN";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TransferDirection {
    #[default]
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::In => f.write_str("IN"),
            TransferDirection::Out => f.write_str("OUT"),
        }
    }
}

impl FromStr for TransferDirection {
    type Err = AssessmentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN" => Ok(TransferDirection::In),
            "OUT" => Ok(TransferDirection::Out),
            other => Err(AssessmentError::invalid_field(
                "direction",
                format!("expected IN or OUT, got '{}'", other),
            )),
        }
    }
}

/// Photo of a bank transfer or receipt, plus the bookkeeping context it is filed under.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentProofRequest {
    pub image: MediaAttachment,
    pub direction: TransferDirection,
    pub branch_id: String,
}

impl PaymentProofRequest {
    pub fn new(image: MediaAttachment, direction: TransferDirection, branch_id: Option<&str>) -> Self {
        let branch_id = branch_id
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(UNKNOWN_BRANCH)
            .to_string();
        Self {
            image,
            direction,
            branch_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReceiptFields {
    pub direction: TransferDirection,
    pub branch_id: String,
    pub transaction_datetime: Option<String>,
    /// Whole currency units.
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub bank_name: Option<String>,
    pub transaction_id: Option<String>,
    pub content: Option<String>,
    pub sender_name: Option<String>,
    pub sender_account: Option<String>,
    pub receiver_name: Option<String>,
    pub receiver_account: Option<String>,
}

impl ReceiptFields {
    fn empty(direction: TransferDirection, branch_id: &str) -> Self {
        Self {
            direction,
            branch_id: branch_id.to_string(),
            transaction_datetime: None,
            amount: None,
            currency: None,
            bank_name: None,
            transaction_id: None,
            content: None,
            sender_name: None,
            sender_account: None,
            receiver_name: None,
            receiver_account: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReceiptExtraction {
    pub fields: ReceiptFields,
    pub confidence: BTreeMap<String, f64>,
    /// Text the model read off the image.
    pub raw_text: Option<String>,
}

impl AssessmentTask for PaymentProofRequest {
    type Output = ReceiptExtraction;
    const NAME: &'static str = "extract-payment-proof";

    fn build_prompt(&self) -> Prompt {
        Prompt::json(format!(
            "{RECEIPT_ROLE}\n{JSON_ONLY}\n\n{}\n\n{RECEIPT_RULES}\n",
            receipt_schema(&self.direction.to_string(), &self.branch_id),
        ))
        .with_attachment(self.image.clone())
    }

    fn fallback(&self) -> ReceiptExtraction {
        ReceiptExtraction {
            fields: ReceiptFields::empty(self.direction, &self.branch_id),
            confidence: BTreeMap::new(),
            raw_text: None,
        }
    }

    fn normalize(
        &self,
        fields: &ParsedFields,
        _raw: &RawModelOutput,
    ) -> Result<Normalized<ReceiptExtraction>> {
        let reader = FieldReader::new(fields);
        let empty = ParsedFields::new();
        let extracted = FieldReader::new(reader.object("fields").unwrap_or(&empty));
        let null = Value::Null;

        // Direction and branch come from the request, never from the model.
        let receipt = ReceiptFields {
            direction: self.direction,
            branch_id: self.branch_id.clone(),
            transaction_datetime: extracted.scalar_text("transaction_datetime"),
            amount: normalize_amount(extracted.raw("amount").unwrap_or(&null)),
            currency: extracted.scalar_text("currency"),
            bank_name: extracted.scalar_text("bank_name"),
            transaction_id: extracted.scalar_text("transaction_id"),
            content: extracted.scalar_text("content"),
            sender_name: extracted.scalar_text("sender_name"),
            sender_account: normalize_account(extracted.raw("sender_account").unwrap_or(&null)),
            receiver_name: extracted.scalar_text("receiver_name"),
            receiver_account: normalize_account(extracted.raw("receiver_account").unwrap_or(&null)),
        };

        Ok(Normalized::new(ReceiptExtraction {
            fields: receipt,
            confidence: reader.confidence("confidence"),
            raw_text: reader.text("raw_text"),
        })
        .with_warnings(reader.string_list("warnings")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PaymentProofRequest {
        PaymentProofRequest::new(
            MediaAttachment::new(vec![0xFF, 0xD8], None, DEFAULT_RECEIPT_MIME),
            TransferDirection::In,
            Some("HCM-02"),
        )
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("out".parse::<TransferDirection>().unwrap(), TransferDirection::Out);
        assert_eq!(" IN ".parse::<TransferDirection>().unwrap(), TransferDirection::In);
        assert!("sideways".parse::<TransferDirection>().is_err());
        assert_eq!(
            serde_json::to_value(TransferDirection::Out).unwrap(),
            serde_json::json!("OUT")
        );
    }

    #[test]
    fn test_blank_branch_becomes_unknown() {
        let req = PaymentProofRequest::new(
            MediaAttachment::new(vec![1], None, DEFAULT_RECEIPT_MIME),
            TransferDirection::Out,
            Some("  "),
        );
        assert_eq!(req.branch_id, UNKNOWN_BRANCH);
    }

    #[test]
    fn test_prompt_embeds_request_context() {
        let prompt = request().build_prompt();
        assert!(prompt.text.contains(r#""branch_id": "HCM-02""#));
        assert!(prompt.text.contains(r#""direction": "IN""#));
        assert_eq!(prompt.attachment.unwrap().mime_type, "image/jpeg");
    }

    #[test]
    fn test_normalize_overrides_context_and_cleans_values() {
        let raw = r#"Kết quả:
        {"fields": {"direction": "OUT", "branch_id": "X", "amount": "1.200.000 đ",
                    "transaction_id": 99812, "sender_account": " 0123 456 789 ",
                    "receiver_account": "", "bank_name": "VCB", "currency": null},
         "confidence": {"amount": 0.95, "transaction_id": "0.7"},
         "raw_text": "CHUYEN KHOAN 1.200.000",
         "warnings": ["Ảnh hơi mờ"]}"#;
        let out = request().interpret(&RawModelOutput::new(raw)).unwrap();
        let fields = &out.payload.fields;

        assert_eq!(fields.direction, TransferDirection::In);
        assert_eq!(fields.branch_id, "HCM-02");
        assert_eq!(fields.amount, Some(1_200_000.0));
        assert_eq!(fields.transaction_id.as_deref(), Some("99812"));
        assert_eq!(fields.sender_account.as_deref(), Some("0123456789"));
        assert_eq!(fields.receiver_account, None);
        assert_eq!(fields.bank_name.as_deref(), Some("VCB"));
        assert_eq!(fields.currency, None);
        assert_eq!(out.payload.confidence.get("transaction_id"), Some(&0.7));
        assert_eq!(out.payload.raw_text.as_deref(), Some("CHUYEN KHOAN 1.200.000"));
        assert_eq!(out.warnings, vec!["Ảnh hơi mờ"]);
    }

    #[test]
    fn test_missing_fields_object_defaults_to_empty() {
        let out = request()
            .interpret(&RawModelOutput::new("{\"confidence\": {}}"))
            .unwrap();
        assert_eq!(out.payload, request().fallback());
    }
}
