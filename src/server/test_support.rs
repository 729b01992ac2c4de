//! Shared helpers for engine unit tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::auth::{Identity, StaticTokenVerifier};
use crate::judge::{CaseResult, CodeJudge, JudgeError, Language, VerificationReport};
use crate::protocol::{
    Difficulty, FunctionSignature, Question, QuestionId, RoomConfig, ServerEvent, TestCase,
    Visibility,
};
use crate::rate_limit::RateLimitConfig;
use crate::store::{BattleStore, InMemoryStore};

use super::{BattleServer, EngineConfig};

/// Judge stub with a fixed verdict.
pub struct ScriptedJudge {
    pub pass: bool,
}

#[async_trait]
impl CodeJudge for ScriptedJudge {
    async fn verify(
        &self,
        _code: &str,
        _language: Language,
        testcases: &[TestCase],
    ) -> Result<VerificationReport, JudgeError> {
        let results = testcases
            .iter()
            .map(|t| CaseResult {
                test_case_id: t.id,
                input: t.input_data.clone(),
                expected: t.expected_output.clone(),
                actual: if self.pass {
                    t.expected_output.clone()
                } else {
                    "wrong".to_string()
                },
                error: None,
                passed: self.pass,
                error_message: None,
            })
            .collect();
        Ok(VerificationReport {
            all_passed: self.pass,
            results,
        })
    }
}

/// Judge stub that always fails with a transport error.
pub struct BrokenJudge;

#[async_trait]
impl CodeJudge for BrokenJudge {
    async fn verify(
        &self,
        _code: &str,
        _language: Language,
        _testcases: &[TestCase],
    ) -> Result<VerificationReport, JudgeError> {
        Err(JudgeError::Transport("connection refused".to_string()))
    }
}

pub fn identity(name: &str) -> Identity {
    Identity {
        user_id: Uuid::new_v4(),
        username: name.to_string(),
    }
}

pub fn room_config(capacity: u32, time_limit: u32, is_ranked: bool) -> RoomConfig {
    RoomConfig {
        name: None,
        topic: "ARRAY".to_string(),
        difficulty: Difficulty::Easy,
        time_limit,
        capacity,
        visibility: Visibility::Public,
        password: None,
        is_ranked,
    }
}

pub async fn build_server(judge: Arc<dyn CodeJudge>) -> Arc<BattleServer> {
    let store = Arc::new(InMemoryStore::new(8));
    store.initialize().await.expect("store init");
    BattleServer::new(
        store,
        judge,
        Arc::new(StaticTokenVerifier::new()),
        EngineConfig::default(),
        RateLimitConfig {
            // Generous limits so tests never trip throttling by accident.
            max_room_creations: 1000,
            max_join_attempts: 1000,
            max_submissions: 1000,
            ..RateLimitConfig::default()
        },
    )
}

pub async fn passing_server() -> Arc<BattleServer> {
    build_server(Arc::new(ScriptedJudge { pass: true })).await
}

/// Seed one eligible ARRAY/easy question with three testcases.
pub async fn seed_question(server: &BattleServer) -> QuestionId {
    let question_id = Uuid::new_v4();
    let question = Question {
        question_id,
        title: "Two Sum".to_string(),
        slug: "two-sum".to_string(),
        description: "Return indices of two numbers adding to target".to_string(),
        difficulty: Difficulty::Easy,
        topic: "ARRAY".to_string(),
        is_validated: true,
        is_contributed: false,
        contribution_status: None,
        created_at: Utc::now(),
    };
    let testcases = (0..3)
        .map(|i| TestCase {
            id: i + 1,
            question_id,
            input_data: format!("([1, 2, {i}], 3)"),
            expected_output: "[0, 1]".to_string(),
            is_sample: i == 0,
            order: i,
        })
        .collect();
    server
        .store()
        .insert_question(
            question,
            testcases,
            Some(FunctionSignature {
                function_name: "two_sum".to_string(),
                parameters: vec!["nums".to_string(), "target".to_string()],
            }),
        )
        .await
        .expect("seed question");
    question_id
}

/// Drain a bus subscription until an event matches, or panic after the
/// buffered backlog runs out.
pub fn expect_event<F>(
    rx: &mut broadcast::Receiver<Arc<ServerEvent>>,
    mut predicate: F,
) -> Arc<ServerEvent>
where
    F: FnMut(&ServerEvent) -> bool,
{
    loop {
        match rx.try_recv() {
            Ok(event) => {
                if predicate(&event) {
                    return event;
                }
            }
            Err(err) => panic!("expected event not published: {err}"),
        }
    }
}

/// Whether any buffered event matches.
pub fn saw_event<F>(rx: &mut broadcast::Receiver<Arc<ServerEvent>>, mut predicate: F) -> bool
where
    F: FnMut(&ServerEvent) -> bool,
{
    while let Ok(event) = rx.try_recv() {
        if predicate(&event) {
            return true;
        }
    }
    false
}
