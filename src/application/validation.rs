use crate::application::compliance::record_violations;
use crate::application::state::{require_owner, AppState};
use crate::domain::compliance::check_rest_after_completion;
use crate::domain::models::{
    BlockValidation, DateRange, RoutineViolation, ValidationStatus, ViolationType,
};
use crate::domain::validation::{
    apply_report, index_by_block, pending_validations, validation_stats, PendingValidation,
    ValidationReport, ValidationStats,
};
use crate::infrastructure::error::TrackerError;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub validation: BlockValidation,
    /// Rest-skipped findings raised by a completed long session.
    pub violations: Vec<RoutineViolation>,
}

/// Records what happened to a block, replacing any earlier report.
pub fn validate_block_impl(
    state: &AppState,
    owner_id: &str,
    block_id: &str,
    report: ValidationReport,
) -> Result<ValidationOutcome, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let block = state
        .store()
        .get_block(owner_id, block_id)?
        .ok_or_else(|| TrackerError::not_found("block", block_id))?;

    let validation = apply_report(
        &block,
        &report,
        &state.config().default_completion,
        state.now(),
    )
    .map_err(TrackerError::Validation)?;
    state.store().upsert_validation(&validation)?;
    info!(
        owner_id,
        block_id,
        status = %validation.status,
        completion = validation.completion_percentage,
        "block validated"
    );

    let mut violations = Vec::new();
    if validation.status == ValidationStatus::Completed {
        let categories = state
            .store()
            .list_categories(owner_id)?
            .into_iter()
            .map(|category| (category.id.clone(), category))
            .collect::<HashMap<_, _>>();
        let same_day_blocks = state
            .store()
            .list_blocks(owner_id, DateRange::single(block.date))?;
        let finding = check_rest_after_completion(
            &block,
            &categories,
            &same_day_blocks,
            state.config().long_session_minutes,
        )
        .map_err(TrackerError::Validation)?;
        debug!(owner_id, block_id, rest_skipped = finding.is_some(), "checked rest after completion");
        if let Some(draft) = finding {
            if !already_recorded(state, owner_id, &block.id, block.date, &draft.violation_type)? {
                violations = record_violations(state, owner_id, Some(block_id), block.date, vec![draft])?;
            }
        }
    }

    Ok(ValidationOutcome {
        validation,
        violations,
    })
}

/// Re-submitted reports replace the validation; the violation log keeps one
/// finding of each type per block.
fn already_recorded(
    state: &AppState,
    owner_id: &str,
    block_id: &str,
    date: NaiveDate,
    violation_type: &ViolationType,
) -> Result<bool, TrackerError> {
    Ok(state
        .store()
        .list_violations(owner_id, DateRange::single(date), true)?
        .iter()
        .any(|violation| {
            violation.block_id.as_deref() == Some(block_id) && &violation.violation_type == violation_type
        }))
}

pub fn pending_validations_impl(
    state: &AppState,
    owner_id: &str,
    date: NaiveDate,
) -> Result<Vec<PendingValidation>, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let range = DateRange::single(date);
    let blocks = state.store().list_blocks(owner_id, range)?;
    let validations = index_by_block(state.store().list_validations(owner_id, range)?);
    Ok(pending_validations(&blocks, &validations, date, state.today()))
}

pub fn validation_stats_impl(
    state: &AppState,
    owner_id: &str,
    range: DateRange,
) -> Result<ValidationStats, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let blocks = state.store().list_blocks(owner_id, range)?;
    let validations = index_by_block(state.store().list_validations(owner_id, range)?);
    Ok(validation_stats(range, &blocks, &validations))
}
