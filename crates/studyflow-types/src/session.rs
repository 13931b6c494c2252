//! Learning session domain types.
//!
//! `SessionState` is the record threaded through every workflow step. Steps
//! never mutate it directly; they return partial updates that the engine
//! merges (see `studyflow_core::workflow::update`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Upper bound on quiz regeneration cycles for one session.
pub const MAX_RETRIES: u32 = 3;

/// Minimum score (0-100) that counts as a pass.
pub const PASS_THRESHOLD: u8 = 60;

/// Submitted answers keyed by question id.
pub type AnswerMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Step / status tags
// ---------------------------------------------------------------------------

/// Last committed (or paused) position of a session in the step graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStep {
    Start,
    Planner,
    Retrieval,
    QuizGenerated,
    WaitingForAnswers,
    Grading,
    Feedback,
    PlannerError,
    RetrievalError,
    QuizError,
    GradingError,
    FeedbackError,
}

impl SessionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStep::Start => "start",
            SessionStep::Planner => "planner",
            SessionStep::Retrieval => "retrieval",
            SessionStep::QuizGenerated => "quiz_generated",
            SessionStep::WaitingForAnswers => "waiting_for_answers",
            SessionStep::Grading => "grading",
            SessionStep::Feedback => "feedback",
            SessionStep::PlannerError => "planner_error",
            SessionStep::RetrievalError => "retrieval_error",
            SessionStep::QuizError => "quiz_error",
            SessionStep::GradingError => "grading_error",
            SessionStep::FeedbackError => "feedback_error",
        }
    }
}

impl fmt::Display for SessionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(SessionStep::Start),
            "planner" => Ok(SessionStep::Planner),
            "retrieval" => Ok(SessionStep::Retrieval),
            "quiz_generated" => Ok(SessionStep::QuizGenerated),
            "waiting_for_answers" => Ok(SessionStep::WaitingForAnswers),
            "grading" => Ok(SessionStep::Grading),
            "feedback" => Ok(SessionStep::Feedback),
            "planner_error" => Ok(SessionStep::PlannerError),
            "retrieval_error" => Ok(SessionStep::RetrievalError),
            "quiz_error" => Ok(SessionStep::QuizError),
            "grading_error" => Ok(SessionStep::GradingError),
            "feedback_error" => Ok(SessionStep::FeedbackError),
            other => Err(format!("invalid session step: '{other}'")),
        }
    }
}

/// Identity of a step function, recorded in `error_step` when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Planner,
    Retrieval,
    QuizGenerator,
    Grading,
    Feedback,
}

impl StepName {
    /// Every step, in graph order.
    pub const ALL: [StepName; 5] = [
        StepName::Planner,
        StepName::Retrieval,
        StepName::QuizGenerator,
        StepName::Grading,
        StepName::Feedback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Planner => "planner",
            StepName::Retrieval => "retrieval",
            StepName::QuizGenerator => "quiz_generator",
            StepName::Grading => "grading",
            StepName::Feedback => "feedback",
        }
    }

    /// The `current_step` tag recorded on success.
    pub fn completed_step(&self) -> SessionStep {
        match self {
            StepName::Planner => SessionStep::Planner,
            StepName::Retrieval => SessionStep::Retrieval,
            StepName::QuizGenerator => SessionStep::QuizGenerated,
            StepName::Grading => SessionStep::Grading,
            StepName::Feedback => SessionStep::Feedback,
        }
    }

    /// The step whose success leaves `tag` as `current_step`.
    pub fn completed_by(tag: SessionStep) -> Option<StepName> {
        Self::ALL.into_iter().find(|s| s.completed_step() == tag)
    }

    /// The `current_step` tag recorded on failure.
    pub fn error_marker(&self) -> SessionStep {
        match self {
            StepName::Planner => SessionStep::PlannerError,
            StepName::Retrieval => SessionStep::RetrievalError,
            StepName::QuizGenerator => SessionStep::QuizError,
            StepName::Grading => SessionStep::GradingError,
            StepName::Feedback => SessionStep::FeedbackError,
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Steps are executing (or a step was interrupted mid-call).
    Running,
    /// Paused at the suspension point, waiting for answers.
    Suspended,
    /// The routing function chose `End`.
    Terminated,
    /// A step failed; `error` and `error_step` are set.
    Errored,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Suspended => "suspended",
            SessionStatus::Terminated => "terminated",
            SessionStatus::Errored => "errored",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(SessionStatus::Running),
            "suspended" => Ok(SessionStatus::Suspended),
            "terminated" => Ok(SessionStatus::Terminated),
            "errored" => Ok(SessionStatus::Errored),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Generated artifacts
// ---------------------------------------------------------------------------

/// Learner level targeted by a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Beginner => write!(f, "beginner"),
            Difficulty::Intermediate => write!(f, "intermediate"),
            Difficulty::Advanced => write!(f, "advanced"),
        }
    }
}

/// Structured learning plan produced by the planner step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LearningPlan {
    /// Short topic title; also the primary retrieval query.
    pub topic: String,
    /// At least three learning objectives.
    pub objectives: Vec<String>,
    /// At least five key points, most important first.
    pub key_points: Vec<String>,
    pub difficulty: Difficulty,
    pub estimated_minutes: u32,
}

/// A reference document returned by the retrieval step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Relevance in `[0, 1]`; rank-derived for primary hits.
    pub relevance_score: f64,
}

/// Kind of quiz question. Unrecognized kinds deserialize to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    FillBlank,
    ShortAnswer,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::MultipleChoice => write!(f, "multiple_choice"),
            QuestionType::FillBlank => write!(f, "fill_blank"),
            QuestionType::ShortAnswer => write!(f, "short_answer"),
            QuestionType::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuizQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    /// Question text shown to the learner.
    #[serde(alias = "question")]
    pub prompt: String,
    /// Choices such as `"A. ..."`; only for multiple choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Option letter, blank filler, or reference answer.
    #[serde(alias = "answer")]
    pub correct_answer: String,
    pub explanation: String,
    #[serde(alias = "points")]
    pub points_possible: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
    pub total_points: u32,
    #[serde(alias = "time_limit")]
    pub suggested_minutes: u32,
}

// ---------------------------------------------------------------------------
// Grading results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub question_id: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
    pub points_earned: u32,
    pub points_possible: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetail {
    pub correct_count: u32,
    pub total_count: u32,
    pub question_scores: Vec<QuestionScore>,
}

/// One archived grading cycle. Appended when feedback completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based cycle number.
    pub attempt: u32,
    pub score: u8,
    pub correct_count: u32,
    pub total_count: u32,
    #[serde(default)]
    pub question_scores: Vec<QuestionScore>,
    pub feedback: String,
    pub should_retry: bool,
    pub graded_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// The grading detail of this cycle.
    pub fn score_detail(&self) -> ScoreDetail {
        ScoreDetail {
            correct_count: self.correct_count,
            total_count: self.total_count,
            question_scores: self.question_scores.clone(),
        }
    }
}

/// Human-readable summary line emitted by a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub step: SessionStep,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The versioned record threaded through every step of a learning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub user_question: String,
    #[serde(default)]
    pub learning_plan: Option<LearningPlan>,
    #[serde(default)]
    pub retrieved_documents: Vec<RetrievedDocument>,
    #[serde(default)]
    pub quiz: Option<Quiz>,
    #[serde(default)]
    pub user_answers: Option<AnswerMap>,
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub score_detail: Option<ScoreDetail>,
    #[serde(default)]
    pub feedback_text: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub should_retry: bool,
    pub current_step: SessionStep,
    pub status: SessionStatus,
    /// Incremented on every persisted checkpoint.
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_step: Option<StepName>,
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,
}

impl SessionState {
    /// Fresh state at the `start` step.
    pub fn new(session_id: impl Into<String>, user_question: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            user_question: user_question.into(),
            learning_plan: None,
            retrieved_documents: Vec::new(),
            quiz: None,
            user_answers: None,
            score: None,
            score_detail: None,
            feedback_text: None,
            retry_count: 0,
            should_retry: false,
            current_step: SessionStep::Start,
            status: SessionStatus::Running,
            version: 0,
            created_at: now,
            updated_at: now,
            error: None,
            error_step: None,
            attempts: Vec::new(),
            transcript: Vec::new(),
        }
    }

    /// The most recently archived grading cycle, if any.
    pub fn last_attempt(&self) -> Option<&AttemptRecord> {
        self.attempts.last()
    }

    pub fn is_suspended(&self) -> bool {
        self.status == SessionStatus::Suspended
    }
}
