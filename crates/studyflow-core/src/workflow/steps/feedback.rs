//! Feedback step: explain the graded attempt and decide whether to retry.

use studyflow_types::session::{MAX_RETRIES, PASS_THRESHOLD, SessionState};

use super::prompt::{FEEDBACK_SYSTEM, feedback_user};
use super::{StepContext, StepError};
use crate::workflow::routing::should_retry;
use crate::workflow::update::{StateChange, StepUpdate};

pub async fn run(state: &SessionState, ctx: &StepContext<'_>) -> Result<StepUpdate, StepError> {
    let score = state
        .score
        .ok_or_else(|| StepError::Precondition("score is missing".to_string()))?;
    let detail = state
        .score_detail
        .as_ref()
        .ok_or_else(|| StepError::Precondition("score detail is missing".to_string()))?;
    let plan = state
        .learning_plan
        .as_ref()
        .ok_or_else(|| StepError::Precondition("learning plan is missing".to_string()))?;

    let request = ctx.request(
        FEEDBACK_SYSTEM.to_string(),
        feedback_user(plan, state.quiz.as_ref(), score, detail),
    );
    let response = ctx
        .llm
        .complete(&request)
        .await
        .map_err(|e| StepError::Generation(e.to_string()))?;
    let body = response.content.trim();
    if body.is_empty() {
        return Err(StepError::Generation("model returned empty feedback".to_string()));
    }

    let retry = should_retry(score, state.retry_count);
    let feedback = format!("{body}\n\n{}", closing_line(score, state.retry_count, retry));

    tracing::info!(
        session_id = %state.session_id,
        score,
        retry_count = state.retry_count,
        should_retry = retry,
        "feedback generated"
    );

    let note = if retry {
        format!("Feedback given, score {score}/100, retrying")
    } else {
        format!("Feedback given, score {score}/100")
    };
    Ok(StepUpdate::new(StateChange::FeedbackGiven {
        feedback,
        should_retry: retry,
    })
    .with_note(note))
}

/// Final sentence telling the learner what happens next.
pub fn closing_line(score: u8, retry_count: u32, retry: bool) -> String {
    if retry {
        format!(
            "Your score is below the pass mark, so a new quiz is on its way (attempt {} of {}).",
            retry_count + 2,
            MAX_RETRIES + 1
        )
    } else if score < PASS_THRESHOLD {
        "You have used all retry attempts. Review the material and start a new session when ready."
            .to_string()
    } else {
        format!("You passed with {score}/100. Well done!")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::retrieval::box_retriever::{BoxRetriever, NoIndexRetriever};
    use crate::testing::{MockLlm, Reply, sample_plan, sample_quiz};
    use chrono::Utc;
    use studyflow_types::config::ModelConfig;
    use studyflow_types::session::{QuestionScore, ScoreDetail};

    fn graded_state(score: u8, retry_count: u32) -> SessionState {
        let mut state = SessionState::new("s1", "q", Utc::now());
        state.learning_plan = Some(sample_plan());
        state.quiz = Some(sample_quiz());
        state.score = Some(score);
        state.retry_count = retry_count;
        state.score_detail = Some(ScoreDetail {
            correct_count: 0,
            total_count: 1,
            question_scores: vec![QuestionScore {
                question_id: "q1".to_string(),
                user_answer: "D".to_string(),
                correct_answer: "A".to_string(),
                is_correct: false,
                points_earned: 0,
                points_possible: 20,
                feedback: None,
            }],
        });
        state
    }

    async fn run_with(llm: MockLlm, state: SessionState) -> Result<StepUpdate, StepError> {
        let llm = BoxLlmProvider::new(llm);
        let retriever = BoxRetriever::new(NoIndexRetriever);
        let model = ModelConfig::default();
        let ctx = StepContext {
            llm: &llm,
            retriever: &retriever,
            model: &model,
            retrieval_k: 5,
        };
        run(&state, &ctx).await
    }

    fn unpack(update: StepUpdate) -> (String, bool) {
        match update.change {
            StateChange::FeedbackGiven {
                feedback,
                should_retry,
            } => (feedback, should_retry),
            other => panic!("unexpected change: {other:?}"),
        }
    }

    #[tokio::test]
    async fn low_score_requests_retry() {
        let llm = MockLlm::new();
        let (feedback, retry) = unpack(run_with(llm.clone(), graded_state(40, 0)).await.unwrap());
        assert!(retry);
        assert!(feedback.starts_with("Solid effort."));
        assert!(feedback.contains("attempt 2 of 4"));

        let prompt = &llm.calls()[0].messages[0].content;
        assert!(prompt.contains("Score: 40/100"));
        assert!(prompt.contains("Question q1"));
    }

    #[tokio::test]
    async fn retries_exhausted_stop() {
        let (feedback, retry) =
            unpack(run_with(MockLlm::new(), graded_state(40, MAX_RETRIES)).await.unwrap());
        assert!(!retry);
        assert!(feedback.contains("used all retry attempts"));
    }

    #[tokio::test]
    async fn passing_score_ends() {
        let (feedback, retry) = unpack(run_with(MockLlm::new(), graded_state(80, 1)).await.unwrap());
        assert!(!retry);
        assert!(feedback.contains("You passed with 80/100"));
    }

    #[tokio::test]
    async fn model_failure_is_generation_error() {
        let llm = MockLlm::new();
        llm.push_feedback(Reply::Fail("timeout".to_string()));
        let err = run_with(llm, graded_state(40, 0)).await.unwrap_err();
        assert!(matches!(err, StepError::Generation(_)));
    }

    #[tokio::test]
    async fn missing_score_is_precondition_error() {
        let mut state = graded_state(40, 0);
        state.score = None;
        let err = run_with(MockLlm::new(), state).await.unwrap_err();
        assert!(matches!(err, StepError::Precondition(_)));
    }
}
