use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Difficulty, QuestionId};

/// Review state of a community-contributed question.
/// Only `Accepted` contributions are eligible for battles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    #[default]
    QuestionSubmitted,
    TestCasesSubmitted,
    CodeSubmitted,
    OnVerification,
    Accepted,
    Rejected,
}

/// An algorithmic problem from the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub question_id: QuestionId,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub topic: String,
    pub is_validated: bool,
    pub is_contributed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contribution_status: Option<ContributionStatus>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    /// Whether this question may be handed to a battle: validated, and if it
    /// came from a contribution, the contribution passed review.
    pub fn is_eligible(&self) -> bool {
        self.is_validated
            && (!self.is_contributed
                || self.contribution_status == Some(ContributionStatus::Accepted))
    }
}

/// A single input/expected-output pair for judging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub id: u32,
    pub question_id: QuestionId,
    pub input_data: String,
    pub expected_output: String,
    pub is_sample: bool,
    pub order: u32,
}

/// Entry-function shape extracted from the reference solution, shipped to
/// clients so editors can pre-fill a stub.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub function_name: String,
    pub parameters: Vec<String>,
}
