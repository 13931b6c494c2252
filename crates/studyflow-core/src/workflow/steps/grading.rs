//! Grade step: score the submitted answers against the quiz.
//!
//! Objective questions (multiple choice, fill in the blank) are graded
//! deterministically. Short answers go to the model with a rubric prompt and
//! fall back to a keyword heuristic when the reply cannot be used.

use studyflow_types::session::{
    AnswerMap, PASS_THRESHOLD, QuestionScore, QuestionType, QuizQuestion, ScoreDetail,
    SessionState,
};

use super::prompt::{SHORT_ANSWER_SYSTEM, short_answer_user};
use super::{StepContext, StepError};
use crate::workflow::update::{StateChange, StepUpdate};

/// Reference-answer tokens considered by the keyword heuristic.
pub const HEURISTIC_TOKENS: usize = 5;

pub async fn run(state: &SessionState, ctx: &StepContext<'_>) -> Result<StepUpdate, StepError> {
    let quiz = state
        .quiz
        .as_ref()
        .ok_or_else(|| StepError::Precondition("quiz is missing".to_string()))?;
    let answers = state
        .user_answers
        .as_ref()
        .ok_or_else(|| StepError::Precondition("user answers are missing".to_string()))?;

    let mut question_scores = Vec::with_capacity(quiz.questions.len());
    for question in &quiz.questions {
        let scored = grade_question(question, answers, ctx, &state.session_id).await;
        question_scores.push(scored);
    }

    let earned: u32 = question_scores.iter().map(|s| s.points_earned).sum();
    let score = percent_score(earned, quiz.total_points);
    let correct_count = question_scores.iter().filter(|s| s.is_correct).count() as u32;
    let detail = ScoreDetail {
        correct_count,
        total_count: question_scores.len() as u32,
        question_scores,
    };

    tracing::info!(
        session_id = %state.session_id,
        score,
        correct = detail.correct_count,
        total = detail.total_count,
        "answers graded"
    );

    let note = format!(
        "Score: {score}/100 ({}/{} correct)",
        detail.correct_count, detail.total_count
    );
    Ok(StepUpdate::new(StateChange::Graded { score, detail }).with_note(note))
}

/// `round(100 * earned / total)`, clamped to 100; zero when `total` is zero.
pub fn percent_score(earned: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let (earned, total) = (u64::from(earned), u64::from(total));
    let rounded = (200 * earned + total) / (2 * total);
    rounded.min(100) as u8
}

/// Whether `earned` reaches the pass threshold of `possible`.
pub fn meets_threshold(earned: u32, possible: u32) -> bool {
    possible > 0 && u64::from(earned) * 100 >= u64::from(possible) * u64::from(PASS_THRESHOLD)
}

/// Trimmed, case-insensitive exact comparison.
pub fn answers_match(given: &str, expected: &str) -> bool {
    given.trim().to_lowercase() == expected.trim().to_lowercase()
}

async fn grade_question(
    question: &QuizQuestion,
    answers: &AnswerMap,
    ctx: &StepContext<'_>,
    session_id: &str,
) -> QuestionScore {
    let user_answer = answers.get(&question.id).cloned().unwrap_or_default();
    let points = question.points_possible;

    let (points_earned, is_correct, feedback) = match question.kind {
        QuestionType::MultipleChoice | QuestionType::FillBlank => {
            let correct = answers_match(&user_answer, &question.correct_answer);
            (if correct { points } else { 0 }, correct, None)
        }
        QuestionType::ShortAnswer => {
            let (earned, feedback) = grade_short_answer(question, &user_answer, ctx, session_id).await;
            (earned, meets_threshold(earned, points), feedback)
        }
        QuestionType::Unknown => {
            tracing::warn!(session_id, question_id = %question.id, "unknown question type, awarding 0 points");
            (0, false, None)
        }
    };

    QuestionScore {
        question_id: question.id.clone(),
        user_answer,
        correct_answer: question.correct_answer.clone(),
        is_correct,
        points_earned,
        points_possible: points,
        feedback,
    }
}

async fn grade_short_answer(
    question: &QuizQuestion,
    answer: &str,
    ctx: &StepContext<'_>,
    session_id: &str,
) -> (u32, Option<String>) {
    let points = question.points_possible;
    if answer.trim().is_empty() {
        return (0, Some("No answer given.".to_string()));
    }

    let request = ctx.request(
        SHORT_ANSWER_SYSTEM.to_string(),
        short_answer_user(&question.prompt, &question.correct_answer, answer, points),
    );
    match ctx.llm.complete(&request).await {
        Ok(response) => match parse_rubric_score(&response.content) {
            Some(raw) => (raw.min(points), parse_rubric_feedback(&response.content)),
            None => {
                tracing::warn!(
                    session_id,
                    question_id = %question.id,
                    "unparseable short-answer grade, using keyword heuristic"
                );
                (keyword_score(&question.correct_answer, answer, points), None)
            }
        },
        Err(e) => {
            tracing::warn!(
                session_id,
                question_id = %question.id,
                error = %e,
                "short-answer grading call failed, using keyword heuristic"
            );
            (keyword_score(&question.correct_answer, answer, points), None)
        }
    }
}

/// First integer on the first line mentioning "score".
pub fn parse_rubric_score(reply: &str) -> Option<u32> {
    let line = reply
        .lines()
        .find(|line| line.to_lowercase().contains("score"))?;
    let digits: String = line
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn parse_rubric_feedback(reply: &str) -> Option<String> {
    reply.lines().find_map(|line| {
        let (label, rest) = line.split_once(':')?;
        (label.trim().eq_ignore_ascii_case("feedback") && !rest.trim().is_empty())
            .then(|| rest.trim().to_string())
    })
}

/// `floor(matched / tokens * points)` over the first reference tokens.
pub fn keyword_score(reference: &str, answer: &str, points: u32) -> u32 {
    let answer = answer.to_lowercase();
    let tokens: Vec<String> = reference
        .split_whitespace()
        .take(HEURISTIC_TOKENS)
        .map(str::to_lowercase)
        .collect();
    if tokens.is_empty() {
        return 0;
    }
    let matched = tokens.iter().filter(|t| answer.contains(t.as_str())).count() as u32;
    matched * points / tokens.len() as u32
}
