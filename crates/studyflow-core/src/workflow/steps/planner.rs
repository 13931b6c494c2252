//! Plan step: turn the learner's question into a structured learning plan.

use studyflow_types::session::{LearningPlan, SessionState};

use super::prompt::{PLANNER_SYSTEM, planner_user};
use super::{StepContext, StepError};
use crate::llm::structured::complete_structured;
use crate::workflow::update::{StateChange, StepUpdate};

pub const MIN_OBJECTIVES: usize = 3;
pub const MIN_KEY_POINTS: usize = 5;

pub async fn run(state: &SessionState, ctx: &StepContext<'_>) -> Result<StepUpdate, StepError> {
    let request = ctx.request(PLANNER_SYSTEM.to_string(), planner_user(&state.user_question));
    let plan: LearningPlan = complete_structured(ctx.llm, request, "LearningPlan").await?;
    validate_plan(&plan)?;

    tracing::info!(
        session_id = %state.session_id,
        topic = %plan.topic,
        difficulty = %plan.difficulty,
        "learning plan generated"
    );

    let note = format!(
        "Learning plan ready: {} ({}, about {} minutes, {} objectives)",
        plan.topic,
        plan.difficulty,
        plan.estimated_minutes,
        plan.objectives.len()
    );
    Ok(StepUpdate::new(StateChange::Planned(plan)).with_note(note))
}

pub fn validate_plan(plan: &LearningPlan) -> Result<(), StepError> {
    if plan.topic.trim().is_empty() {
        return Err(StepError::Validation("plan topic is empty".to_string()));
    }
    if plan.objectives.len() < MIN_OBJECTIVES {
        return Err(StepError::Validation(format!(
            "plan has {} objectives, need at least {MIN_OBJECTIVES}",
            plan.objectives.len()
        )));
    }
    if plan.key_points.len() < MIN_KEY_POINTS {
        return Err(StepError::Validation(format!(
            "plan has {} key points, need at least {MIN_KEY_POINTS}",
            plan.key_points.len()
        )));
    }
    if plan.estimated_minutes == 0 {
        return Err(StepError::Validation(
            "estimated minutes must be positive".to_string(),
        ));
    }
    Ok(())
}
