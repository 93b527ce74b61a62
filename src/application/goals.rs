use crate::application::state::{next_id, require_owner, AppState};
use crate::domain::goals::{achieved_hours_by_category, progress_report};
use crate::domain::models::{Goal, GoalPeriod, GoalProgress, GoalType};
use crate::domain::validation::index_by_block;
use crate::infrastructure::error::TrackerError;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
pub struct GoalInput {
    pub category_id: String,
    pub period: GoalPeriod,
    pub target_hours: f64,
    pub goal_type: GoalType,
}

/// Creates the goal or, when the category already has one for the period,
/// replaces its target and type.
pub fn upsert_goal_impl(state: &AppState, owner_id: &str, input: GoalInput) -> Result<Goal, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let goal = Goal {
        id: next_id("goal"),
        owner_id: owner_id.to_string(),
        category_id: input.category_id.trim().to_string(),
        period: input.period,
        target_hours: input.target_hours,
        goal_type: input.goal_type,
    };
    goal.validate().map_err(TrackerError::Validation)?;
    let stored = state.store().upsert_goal(&goal)?;
    info!(
        owner_id,
        goal_id = %stored.id,
        category_id = %stored.category_id,
        period = stored.period.kind(),
        "goal saved"
    );
    Ok(stored)
}

pub fn delete_goal_impl(state: &AppState, owner_id: &str, goal_id: &str) -> Result<(), TrackerError> {
    let owner_id = require_owner(owner_id)?;
    if !state.store().delete_goal(owner_id, goal_id)? {
        return Err(TrackerError::not_found("goal", goal_id));
    }
    info!(owner_id, goal_id, "goal deleted");
    Ok(())
}

/// Progress of every goal in the period plus a `no_goal` row for each
/// category that logged time without one, sorted by category.
pub fn goal_progress_impl(
    state: &AppState,
    owner_id: &str,
    period: GoalPeriod,
) -> Result<Vec<GoalProgress>, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let range = period.date_range().map_err(TrackerError::Validation)?;
    let goals = state.store().list_goals(owner_id, period)?;
    let blocks = state.store().list_blocks(owner_id, range)?;
    let validations = index_by_block(state.store().list_validations(owner_id, range)?);

    let achieved = achieved_hours_by_category(range, &blocks, &validations);
    debug!(
        owner_id,
        goals = goals.len(),
        blocks = blocks.len(),
        categories = achieved.len(),
        "computing goal progress"
    );
    progress_report(&goals, &achieved, state.today()).map_err(TrackerError::Validation)
}
