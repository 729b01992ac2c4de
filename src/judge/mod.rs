//! External code judge client.
//!
//! Verifies a submission against a question's testcases by wrapping the user
//! source in a language harness, shipping it to a Judge0-compatible API with
//! CPU/memory limits, and comparing stdout to the expected output
//! semantically. The client is idempotent: verifying the same submission
//! twice yields the same report and mutates nothing.

pub mod harness;
pub mod literal;

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::JudgeSection;
use crate::protocol::TestCase;

/// Languages accepted by the submission pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Cpp,
    Java,
    Javascript,
    Go,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Cpp => "cpp",
            Self::Java => "java",
            Self::Javascript => "javascript",
            Self::Go => "go",
        }
    }
}

impl FromStr for Language {
    type Err = JudgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" => Ok(Self::Python),
            "cpp" | "c++" => Ok(Self::Cpp),
            "java" => Ok(Self::Java),
            "javascript" | "js" | "node" => Ok(Self::Javascript),
            "go" | "golang" => Ok(Self::Go),
            other => Err(JudgeError::UnsupportedLanguage(other.to_string())),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Judge failures.
///
/// Transport and timeout failures abort the run; compile and runtime errors
/// are per-case outcomes and never surface as this error.
#[derive(Debug, Clone, Error)]
pub enum JudgeError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("{0}")]
    InputMalformed(String),
    #[error("Judge request failed: {0}")]
    Transport(String),
    #[error("Judge request timed out")]
    Timeout,
}

/// Outcome of a single testcase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub test_case_id: u32,
    pub input: String,
    pub expected: String,
    pub actual: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Aggregate verification outcome across all testcases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub all_passed: bool,
    pub results: Vec<CaseResult>,
}

/// A code judge. The HTTP client is the production implementation; tests
/// substitute scripted fakes.
#[async_trait]
pub trait CodeJudge: Send + Sync {
    async fn verify(
        &self,
        code: &str,
        language: Language,
        testcases: &[TestCase],
    ) -> Result<VerificationReport, JudgeError>;
}

/// Submission payload for the judge API.
#[derive(Debug, Serialize)]
struct JudgeSubmission<'a> {
    source_code: &'a str,
    language_id: u32,
    stdin: &'a str,
    cpu_time_limit: u32,
    memory_limit: u32,
}

/// Response body from the judge API.
#[derive(Debug, Deserialize)]
struct JudgeResponse {
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
}

/// Reqwest-backed client for a Judge0-compatible API.
pub struct HttpJudgeClient {
    http: reqwest::Client,
    config: JudgeSection,
}

impl HttpJudgeClient {
    pub fn new(config: JudgeSection) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    fn language_id(&self, language: Language) -> Result<u32, JudgeError> {
        self.config
            .language_ids
            .get(language.as_str())
            .copied()
            .ok_or_else(|| JudgeError::UnsupportedLanguage(language.as_str().to_string()))
    }

    async fn run_case(
        &self,
        code: &str,
        language: Language,
        language_id: u32,
        test: &TestCase,
    ) -> Result<CaseResult, JudgeError> {
        let stdin = harness::normalize_stdin(language, &test.input_data)?;
        let wrapped = harness::wrap_user_code(code, language, &test.input_data)?;

        let payload = JudgeSubmission {
            source_code: &wrapped,
            language_id,
            stdin: &stdin,
            cpu_time_limit: self.config.cpu_time_limit_secs,
            memory_limit: self.config.memory_limit_kb,
        };

        let response = self
            .http
            .post(&self.config.api_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    JudgeError::Timeout
                } else {
                    JudgeError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED && !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::Transport(format!(
                "judge returned {status}: {body}"
            )));
        }

        let result: JudgeResponse = response
            .json()
            .await
            .map_err(|e| JudgeError::Transport(e.to_string()))?;

        let actual = result.stdout.unwrap_or_default();
        let actual = actual.trim().trim_end_matches(['\r', '\n']).to_string();
        let expected = test.expected_output.trim().to_string();

        // Compile and runtime diagnostics fail the case but do not abort the
        // remaining cases.
        let error_output = result
            .stderr
            .filter(|s| !s.trim().is_empty())
            .or(result.compile_output.filter(|s| !s.trim().is_empty()));

        let passed = error_output.is_none() && literal::outputs_match(&actual, &expected);

        Ok(CaseResult {
            test_case_id: test.id,
            input: test.input_data.clone(),
            expected: expected.clone(),
            actual: actual.clone(),
            error: error_output,
            error_message: (!passed)
                .then(|| format!("Test case failed: expected '{expected}', got '{actual}'")),
            passed,
        })
    }
}

#[async_trait]
impl CodeJudge for HttpJudgeClient {
    async fn verify(
        &self,
        code: &str,
        language: Language,
        testcases: &[TestCase],
    ) -> Result<VerificationReport, JudgeError> {
        let language_id = self.language_id(language)?;

        let mut all_passed = true;
        let mut results = Vec::with_capacity(testcases.len());

        for test in testcases {
            tracing::debug!(
                test_case_id = test.id,
                %language,
                "Submitting testcase to judge"
            );
            // Transport/timeout errors abort here and surface to the caller.
            let case = self.run_case(code, language, language_id, test).await?;
            if !case.passed {
                all_passed = false;
            }
            results.push(case);
        }

        Ok(VerificationReport {
            all_passed,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_parsing_accepts_aliases() {
        assert_eq!(Language::from_str("Python").unwrap(), Language::Python);
        assert_eq!(Language::from_str("c++").unwrap(), Language::Cpp);
        assert_eq!(Language::from_str("js").unwrap(), Language::Javascript);
        assert_eq!(Language::from_str("golang").unwrap(), Language::Go);
        assert!(matches!(
            Language::from_str("brainfuck"),
            Err(JudgeError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn unknown_language_id_is_unsupported() {
        let mut section = JudgeSection::default();
        section.language_ids.clear();
        let client = HttpJudgeClient::new(section);
        assert!(matches!(
            client.language_id(Language::Python),
            Err(JudgeError::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn language_ids_resolve_from_config() {
        let client = HttpJudgeClient::new(JudgeSection::default());
        assert_eq!(client.language_id(Language::Python).unwrap(), 71);
        assert_eq!(client.language_id(Language::Go).unwrap(), 60);
    }
}
