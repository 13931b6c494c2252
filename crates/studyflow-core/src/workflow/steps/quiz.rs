//! GenerateQuiz step: build a quiz from the plan and retrieved context.

use std::collections::HashSet;

use studyflow_types::session::{QuestionType, Quiz, SessionState};

use super::prompt::{QUIZ_SYSTEM, quiz_context, quiz_user};
use super::{StepContext, StepError};
use crate::llm::structured::complete_structured;
use crate::workflow::update::{StateChange, StepUpdate};

pub const MIN_QUESTIONS: usize = 5;

pub async fn run(state: &SessionState, ctx: &StepContext<'_>) -> Result<StepUpdate, StepError> {
    let plan = state
        .learning_plan
        .as_ref()
        .ok_or_else(|| StepError::Precondition("learning plan is missing".to_string()))?;

    let context = quiz_context(&state.retrieved_documents);
    let request = ctx.request(QUIZ_SYSTEM.to_string(), quiz_user(plan, &context));
    let mut quiz: Quiz = complete_structured(ctx.llm, request, "Quiz").await?;
    normalize_quiz(&mut quiz, &state.session_id)?;

    tracing::info!(
        session_id = %state.session_id,
        questions = quiz.questions.len(),
        total_points = quiz.total_points,
        retry_count = state.retry_count,
        "quiz generated"
    );

    let note = format!(
        "Quiz ready: {} questions, {} points, about {} minutes",
        quiz.questions.len(),
        quiz.total_points,
        quiz.suggested_minutes
    );
    Ok(StepUpdate::new(StateChange::QuizGenerated(quiz)).with_note(note))
}

/// Validate the generated quiz and reconcile `total_points` with the sum of
/// per-question points.
pub fn normalize_quiz(quiz: &mut Quiz, session_id: &str) -> Result<(), StepError> {
    if quiz.questions.len() < MIN_QUESTIONS {
        return Err(StepError::Validation(format!(
            "quiz has {} questions, need at least {MIN_QUESTIONS}",
            quiz.questions.len()
        )));
    }

    let mut seen = HashSet::new();
    for question in &quiz.questions {
        if !seen.insert(question.id.as_str()) {
            return Err(StepError::Validation(format!(
                "duplicate question id '{}'",
                question.id
            )));
        }
        if question.kind == QuestionType::MultipleChoice
            && question.options.as_ref().is_none_or(|o| o.is_empty())
        {
            return Err(StepError::Validation(format!(
                "multiple-choice question '{}' has no options",
                question.id
            )));
        }
    }

    let sum: u32 = quiz.questions.iter().map(|q| q.points_possible).sum();
    if quiz.total_points != sum {
        tracing::warn!(
            session_id,
            declared = quiz.total_points,
            sum,
            "quiz total_points disagrees with question points, using the sum"
        );
        quiz.total_points = sum;
    }
    if quiz.total_points == 0 {
        return Err(StepError::Validation("quiz total_points is zero".to_string()));
    }
    Ok(())
}
