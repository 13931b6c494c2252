//! Typed partial updates and the merge policy applied to `SessionState`.
//!
//! Steps return a [`StepUpdate`]; only the engine applies it. Scalar and
//! record fields are replaced, `attempts` and `transcript` are appended to,
//! and `updated_at` is bumped on every merge.

use std::fmt;

use chrono::{DateTime, Utc};

use studyflow_types::session::{
    AnswerMap, AttemptRecord, LearningPlan, MAX_RETRIES, Quiz, RetrievedDocument, ScoreDetail,
    SessionState, SessionStatus, SessionStep, StepName, TranscriptEntry,
};

/// The field changes produced by one step or engine transition.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Planned(LearningPlan),
    Retrieved(Vec<RetrievedDocument>),
    /// Replaces the quiz and clears the previous cycle's answers and results.
    QuizGenerated(Quiz),
    Suspended,
    AnswersSubmitted(AnswerMap),
    Graded {
        score: u8,
        detail: ScoreDetail,
    },
    /// Also archives the graded cycle into `attempts`.
    FeedbackGiven {
        feedback: String,
        should_retry: bool,
    },
    RetryScheduled,
    Terminated,
    Failed {
        step: StepName,
        error: String,
    },
    ErrorCleared,
}

/// A partial update plus the transcript lines it contributes.
#[derive(Debug, Clone, PartialEq)]
pub struct StepUpdate {
    pub change: StateChange,
    pub transcript: Vec<String>,
}

impl StepUpdate {
    pub fn new(change: StateChange) -> Self {
        Self {
            change,
            transcript: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.transcript.push(note.into());
        self
    }

    pub fn failed(step: StepName, error: &dyn fmt::Display) -> Self {
        Self::new(StateChange::Failed {
            step,
            error: error.to_string(),
        })
        .with_note(format!("{step} failed: {error}"))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.change, StateChange::Failed { .. })
    }
}

/// Merge operations on `SessionState`.
pub trait SessionStateExt {
    /// Apply a partial update according to the per-field merge policy.
    fn apply(&mut self, update: StepUpdate, now: DateTime<Utc>);
}

impl SessionStateExt for SessionState {
    fn apply(&mut self, update: StepUpdate, now: DateTime<Utc>) {
        match update.change {
            StateChange::Planned(plan) => {
                self.learning_plan = Some(plan);
                self.current_step = SessionStep::Planner;
            }
            StateChange::Retrieved(docs) => {
                self.retrieved_documents = docs;
                self.current_step = SessionStep::Retrieval;
            }
            StateChange::QuizGenerated(quiz) => {
                self.quiz = Some(quiz);
                self.user_answers = None;
                self.score = None;
                self.score_detail = None;
                self.feedback_text = None;
                self.should_retry = false;
                self.current_step = SessionStep::QuizGenerated;
            }
            StateChange::Suspended => {
                self.current_step = SessionStep::WaitingForAnswers;
                self.status = SessionStatus::Suspended;
            }
            StateChange::AnswersSubmitted(answers) => {
                self.user_answers = Some(answers);
                self.status = SessionStatus::Running;
            }
            StateChange::Graded { score, detail } => {
                self.score = Some(score);
                self.score_detail = Some(detail);
                self.current_step = SessionStep::Grading;
            }
            StateChange::FeedbackGiven {
                feedback,
                should_retry,
            } => {
                let detail = self.score_detail.clone().unwrap_or(ScoreDetail {
                    correct_count: 0,
                    total_count: 0,
                    question_scores: Vec::new(),
                });
                self.attempts.push(AttemptRecord {
                    attempt: self.attempts.len() as u32 + 1,
                    score: self.score.unwrap_or(0),
                    correct_count: detail.correct_count,
                    total_count: detail.total_count,
                    question_scores: detail.question_scores,
                    feedback: feedback.clone(),
                    should_retry,
                    graded_at: now,
                });
                self.feedback_text = Some(feedback);
                self.should_retry = should_retry;
                self.current_step = SessionStep::Feedback;
            }
            StateChange::RetryScheduled => {
                self.retry_count = (self.retry_count + 1).min(MAX_RETRIES);
                self.status = SessionStatus::Running;
            }
            StateChange::Terminated => {
                self.status = SessionStatus::Terminated;
            }
            StateChange::Failed { step, error } => {
                self.error = Some(error);
                self.error_step = Some(step);
                self.current_step = step.error_marker();
                self.status = SessionStatus::Errored;
            }
            StateChange::ErrorCleared => {
                self.error = None;
                self.error_step = None;
                self.status = SessionStatus::Running;
            }
        }

        let step = self.current_step;
        self.transcript
            .extend(update.transcript.into_iter().map(|content| TranscriptEntry {
                step,
                content,
                created_at: now,
            }));
        self.updated_at = now;
    }
}
