//! Test doubles and fixtures shared by the core test modules.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use studyflow_types::llm::{CompletionRequest, CompletionResponse, LlmError, StopReason, Usage};
use studyflow_types::retrieval::{RetrievalError, RetrievedSnippet};
use studyflow_types::session::{
    AnswerMap, Difficulty, LearningPlan, QuestionType, Quiz, QuizQuestion,
};

use crate::llm::provider::LlmProvider;
use crate::retrieval::retriever::Retriever;
use crate::workflow::steps::prompt::SHORT_ANSWER_SYSTEM;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn sample_plan() -> LearningPlan {
    LearningPlan {
        topic: "Rust ownership".to_string(),
        objectives: vec![
            "Explain move semantics".to_string(),
            "Use shared and mutable borrows".to_string(),
            "Read lifetime errors".to_string(),
        ],
        key_points: vec![
            "Each value has a single owner".to_string(),
            "Borrowing does not transfer ownership".to_string(),
            "Only one mutable borrow at a time".to_string(),
            "Values are dropped when the owner goes out of scope".to_string(),
            "Lifetimes bound how long references live".to_string(),
        ],
        difficulty: Difficulty::Beginner,
        estimated_minutes: 45,
    }
}

fn question(id: &str, kind: QuestionType, answer: &str, points: u32) -> QuizQuestion {
    QuizQuestion {
        id: id.to_string(),
        kind,
        prompt: format!("Question {id}"),
        options: (kind == QuestionType::MultipleChoice).then(|| {
            vec![
                "A. first".to_string(),
                "B. second".to_string(),
                "C. third".to_string(),
                "D. fourth".to_string(),
            ]
        }),
        correct_answer: answer.to_string(),
        explanation: format!("Because {answer}"),
        points_possible: points,
    }
}

/// Three multiple-choice, one fill-blank and one short-answer question, 20 points each.
pub fn sample_quiz() -> Quiz {
    Quiz {
        questions: vec![
            question("q1", QuestionType::MultipleChoice, "A", 20),
            question("q2", QuestionType::MultipleChoice, "B", 20),
            question("q3", QuestionType::MultipleChoice, "C", 20),
            question("q4", QuestionType::FillBlank, "borrow", 20),
            question(
                "q5",
                QuestionType::ShortAnswer,
                "ownership prevents memory errors without garbage collection",
                20,
            ),
        ],
        total_points: 100,
        suggested_minutes: 15,
    }
}

/// Answers to `sample_quiz` with the first `correct` objective questions right
/// and the short answer left blank.
pub fn objective_answers(correct: usize) -> AnswerMap {
    let right = [("q1", "A"), ("q2", "B"), ("q3", "C"), ("q4", "borrow")];
    let wrong = [("q1", "D"), ("q2", "D"), ("q3", "D"), ("q4", "clone")];
    right
        .iter()
        .zip(wrong.iter())
        .enumerate()
        .map(|(i, (r, w))| {
            let (id, answer) = if i < correct { r } else { w };
            (id.to_string(), answer.to_string())
        })
        .collect()
}

/// Every answer right, including a short answer the mock grades as full marks.
pub fn perfect_answers() -> AnswerMap {
    let mut answers = objective_answers(4);
    answers.insert(
        "q5".to_string(),
        "Ownership prevents memory errors without a garbage collection pass".to_string(),
    );
    answers
}

// ---------------------------------------------------------------------------
// MockLlm
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
}

#[derive(Default)]
struct MockLlmState {
    plans: VecDeque<Reply>,
    quizzes: VecDeque<Reply>,
    grades: VecDeque<Reply>,
    feedback: VecDeque<Reply>,
    calls: Vec<CompletionRequest>,
}

/// Scripted model that routes each request by kind (plan, quiz, short-answer
/// grade, feedback). Empty queues fall back to valid default replies.
#[derive(Clone, Default)]
pub struct MockLlm {
    state: Arc<Mutex<MockLlmState>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_plan(&self, reply: Reply) -> &Self {
        self.state.lock().unwrap().plans.push_back(reply);
        self
    }

    pub fn push_quiz(&self, reply: Reply) -> &Self {
        self.state.lock().unwrap().quizzes.push_back(reply);
        self
    }

    pub fn push_grade(&self, reply: Reply) -> &Self {
        self.state.lock().unwrap().grades.push_back(reply);
        self
    }

    pub fn push_feedback(&self, reply: Reply) -> &Self {
        self.state.lock().unwrap().feedback.push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_for_schema(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                c.output_config
                    .as_ref()
                    .is_some_and(|o| o.format.json_schema.name == name)
            })
            .count()
    }

    fn next_reply(&self, request: &CompletionRequest) -> Reply {
        let mut state = self.state.lock().unwrap();
        state.calls.push(request.clone());

        let schema = request
            .output_config
            .as_ref()
            .map(|o| o.format.json_schema.name.clone());
        match schema.as_deref() {
            Some("LearningPlan") => state.plans.pop_front().unwrap_or_else(|| {
                Reply::Text(serde_json::to_string(&sample_plan()).unwrap())
            }),
            Some("Quiz") => state.quizzes.pop_front().unwrap_or_else(|| {
                Reply::Text(serde_json::to_string(&sample_quiz()).unwrap())
            }),
            _ if request.system.as_deref() == Some(SHORT_ANSWER_SYSTEM) => state
                .grades
                .pop_front()
                .unwrap_or_else(|| Reply::Text("Score: 20\nFeedback: Complete answer.".to_string())),
            _ => state
                .feedback
                .pop_front()
                .unwrap_or_else(|| Reply::Text("Solid effort. Review borrowing rules.".to_string())),
        }
    }
}

impl LlmProvider for MockLlm {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match self.next_reply(request) {
            Reply::Text(content) => Ok(CompletionResponse {
                id: "msg_mock".to_string(),
                content,
                model: request.model.clone(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            }),
            Reply::Fail(message) => Err(LlmError::Provider { message }),
        }
    }
}

// ---------------------------------------------------------------------------
// MockRetriever
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub enum RetrieverMode {
    Hits(HashMap<String, Vec<RetrievedSnippet>>),
    NoIndex,
    Broken,
}

/// Retriever answering from a fixed query table.
#[derive(Clone)]
pub struct MockRetriever {
    mode: RetrieverMode,
    queries: Arc<Mutex<Vec<(String, usize)>>>,
}

impl MockRetriever {
    pub fn with_hits(table: &[(&str, &[&str])]) -> Self {
        let map = table
            .iter()
            .map(|(query, hits)| {
                (
                    query.to_string(),
                    hits.iter().map(|h| RetrievedSnippet::new(*h)).collect(),
                )
            })
            .collect();
        Self::new(RetrieverMode::Hits(map))
    }

    pub fn new(mode: RetrieverMode) -> Self {
        Self {
            mode,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }
}

impl Retriever for MockRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedSnippet>, RetrievalError> {
        self.queries.lock().unwrap().push((query.to_string(), k));
        match &self.mode {
            RetrieverMode::Hits(map) => Ok(map
                .get(query)
                .map(|hits| hits.iter().take(k).cloned().collect())
                .unwrap_or_default()),
            RetrieverMode::NoIndex => Err(RetrievalError::IndexNotFound("test".to_string())),
            RetrieverMode::Broken => Err(RetrievalError::Backend("disk on fire".to_string())),
        }
    }
}
