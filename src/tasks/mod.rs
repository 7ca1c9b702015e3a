//! One module per assessment use case. Each defines its request types (the
//! immutable task context), its fixed-shape result, and its
//! [`AssessmentTask`](crate::pipeline::AssessmentTask) implementation.

pub mod feedback;
pub mod grading;
pub mod receipts;
pub mod report;
pub mod speaking;

pub use feedback::*;
pub use grading::*;
pub use receipts::*;
pub use report::*;
pub use speaking::*;

pub(crate) fn default_language() -> String {
    "vi".to_string()
}
