use chrono::Utc;
use serde::Serialize;

use crate::auth::Identity;
use crate::judge::{CodeJudge, Language, VerificationReport};
use crate::protocol::{QuestionId, RoomId, RoomStatus, ServerEvent};
use crate::store::{BattleStore, SubmissionOutcome};

use super::{BattleServer, ServiceError};

/// HTTP response body of the verify endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResponse {
    pub all_passed: bool,
    pub results: Vec<crate::judge::CaseResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SubmissionResponse {
    fn from_report(report: VerificationReport) -> Self {
        Self {
            all_passed: report.all_passed,
            results: report.results,
            position: None,
            message: None,
        }
    }
}

impl BattleServer {
    /// The submission pipeline: judge the code, and on success atomically
    /// assign a finishing position and emit completion events.
    ///
    /// The k-th accepted submission receives `position = k`; repeat
    /// submissions by the same user return their existing position.
    pub async fn submit(
        &self,
        identity: &Identity,
        room_id: &RoomId,
        question_id: &QuestionId,
        code: &str,
        language: Language,
    ) -> Result<SubmissionResponse, ServiceError> {
        self.rate_limiter.check_submission(&identity.user_id).await?;
        self.metrics().increment_submissions_received();

        let question = self
            .store()
            .question(question_id)
            .await?
            .ok_or(ServiceError::NotFound("Question"))?;

        let room = self
            .store()
            .get_room(room_id)
            .await?
            .ok_or(ServiceError::NotFound("Room"))?;

        if room.start_time.is_none() || room.status == RoomStatus::Active {
            return Err(ServiceError::InvalidState(
                "Battle has not started".to_string(),
            ));
        }
        if room.status.is_terminal() {
            return Err(ServiceError::InvalidState(
                "Battle has already ended".to_string(),
            ));
        }

        // Lazy time-limit enforcement; idempotent against the clock task.
        let now = Utc::now();
        if self.enforce_time_limit(room_id, now).await? {
            return Err(ServiceError::TimeLimitExceeded);
        }

        let testcases = self.store().testcases(question_id).await?;
        if testcases.is_empty() {
            return Err(ServiceError::InvalidState(
                "No test cases available".to_string(),
            ));
        }

        let report = match self.judge.verify(code, language, &testcases).await {
            Ok(report) => report,
            Err(err) => {
                self.metrics().increment_judge_failures();
                return Err(ServiceError::Judge(err));
            }
        };

        tracing::info!(
            %room_id,
            question = %question.title,
            user = %identity.username,
            %language,
            all_passed = report.all_passed,
            "Submission verified"
        );

        if !report.all_passed {
            return Ok(SubmissionResponse::from_report(report));
        }

        let outcome = self
            .store()
            .record_submission(room_id, &identity.username, Utc::now())
            .await?;

        let mut response = SubmissionResponse::from_report(report);
        match outcome {
            SubmissionOutcome::AlreadyRecorded { position } => {
                response.position = Some(position);
                response.message =
                    Some("You have already submitted a correct solution".to_string());
            }
            SubmissionOutcome::Recorded {
                position,
                completion_time,
                completion,
            } => {
                self.metrics().increment_submissions_accepted();
                response.position = Some(position);
                tracing::info!(
                    %room_id,
                    user = %identity.username,
                    position,
                    "Accepted submission took a finishing position"
                );

                match completion {
                    Some(snapshot) => {
                        self.metrics().increment_battles_completed();
                        self.publish_battle(
                            room_id,
                            ServerEvent::BattleCompleted {
                                winners: snapshot.winners,
                                room_capacity: snapshot.room_capacity,
                                message: "Battle Ended!".to_string(),
                            },
                        );
                        self.schedule_purge(*room_id, self.config().terminal_purge_delay);
                        self.broadcast_rooms_update().await;
                    }
                    None => {
                        self.publish_battle(
                            room_id,
                            ServerEvent::CodeVerified {
                                username: identity.username.clone(),
                                position,
                                completion_time,
                            },
                        );
                    }
                }
            }
            SubmissionOutcome::NotPlaying(status) => {
                return Err(ServiceError::InvalidState(if status.is_terminal() {
                    "Battle has already ended".to_string()
                } else {
                    "Battle has not started".to_string()
                }));
            }
            SubmissionOutcome::NotFound => return Err(ServiceError::NotFound("Room")),
        }

        Ok(response)
    }
}
