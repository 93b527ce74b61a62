use crate::application::compliance::{candidate_drafts, record_violations};
use crate::application::state::{next_id, normalized_text, require_owner, AppState};
use crate::domain::interval::{format_minutes, to_minutes, TimeInterval};
use crate::domain::models::{
    BlockValidation, Category, DateRange, PriorityLevel, RoutineViolation, ScheduledBlock,
    TemplateBlock,
};
use crate::domain::overlap::find_overlap;
use crate::infrastructure::error::TrackerError;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct BlockInput {
    pub category_id: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_flexible: bool,
    /// Defaults to medium.
    pub priority: Option<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedBlock {
    pub block: ScheduledBlock,
    /// Advisory violations recorded against the block when it was saved.
    pub violations: Vec<RoutineViolation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateBlockInput {
    pub category_id: String,
    pub day_of_week: Weekday,
    pub start_time: String,
    pub end_time: String,
    pub title: Option<String>,
    #[serde(default)]
    pub is_flexible: bool,
    pub priority: Option<u8>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedTemplateBlock {
    pub template_block_id: String,
    pub conflicting_block_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedTemplate {
    pub date: NaiveDate,
    pub created: Vec<SavedBlock>,
    pub skipped: Vec<SkippedTemplateBlock>,
}

pub fn upsert_category_impl(
    state: &AppState,
    owner_id: &str,
    category_id: Option<String>,
    name: &str,
    requires_rest: bool,
    is_rest: bool,
) -> Result<Category, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let category = Category {
        id: normalized_text(category_id).unwrap_or_else(|| next_id("cat")),
        owner_id: owner_id.to_string(),
        name: name.trim().to_string(),
        requires_rest,
        is_rest,
    };
    category.validate().map_err(TrackerError::Validation)?;
    state.store().upsert_category(&category)?;
    info!(owner_id, category_id = %category.id, "category saved");
    Ok(category)
}

pub fn list_categories_impl(state: &AppState, owner_id: &str) -> Result<Vec<Category>, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    state.store().list_categories(owner_id)
}

/// Saves a new block with a pending validation. Rejects it when it overlaps
/// another block of the same date; rule findings are recorded but never
/// block the save.
pub fn create_block_impl(state: &AppState, owner_id: &str, input: BlockInput) -> Result<SavedBlock, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let block = build_block(next_id("blk"), owner_id, input, state.now())?;
    let saved = insert_block(state, owner_id, block)?;
    info!(
        owner_id,
        block_id = %saved.block.id,
        date = %saved.block.date,
        violations = saved.violations.len(),
        "block created"
    );
    Ok(saved)
}

pub fn update_block_impl(
    state: &AppState,
    owner_id: &str,
    block_id: &str,
    input: BlockInput,
) -> Result<SavedBlock, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let existing = state
        .store()
        .get_block(owner_id, block_id)?
        .ok_or_else(|| TrackerError::not_found("block", block_id))?;
    let block = build_block(existing.id, owner_id, input, existing.created_at)?;
    let interval = checked_placement(state, owner_id, &block, Some(block_id))?;

    let drafts = candidate_drafts(
        state,
        owner_id,
        &block.category_id,
        block.date,
        &interval,
        Some(block_id),
    )?;
    state.store().update_block(&block)?;
    let violations = record_violations(state, owner_id, Some(block.id.as_str()), block.date, drafts)?;
    info!(owner_id, block_id, date = %block.date, "block updated");
    Ok(SavedBlock { block, violations })
}

pub fn delete_block_impl(state: &AppState, owner_id: &str, block_id: &str) -> Result<(), TrackerError> {
    let owner_id = require_owner(owner_id)?;
    if !state.store().delete_block(owner_id, block_id)? {
        return Err(TrackerError::not_found("block", block_id));
    }
    info!(owner_id, block_id, "block deleted");
    Ok(())
}

pub fn list_blocks_impl(
    state: &AppState,
    owner_id: &str,
    range: DateRange,
) -> Result<Vec<ScheduledBlock>, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    state.store().list_blocks(owner_id, range)
}

pub fn add_template_block_impl(
    state: &AppState,
    owner_id: &str,
    input: TemplateBlockInput,
) -> Result<TemplateBlock, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let template = TemplateBlock {
        id: next_id("tpl"),
        owner_id: owner_id.to_string(),
        category_id: input.category_id.trim().to_string(),
        day_of_week: input.day_of_week,
        start_time: canonical_time(&input.start_time),
        end_time: canonical_time(&input.end_time),
        title: normalized_text(input.title),
        is_flexible: input.is_flexible,
        priority: input.priority.unwrap_or(PriorityLevel::Medium.value()),
    };
    template.validate().map_err(TrackerError::Validation)?;
    require_category(state, owner_id, &template.category_id)?;

    let interval = template.interval().map_err(TrackerError::Validation)?;
    let same_day = state
        .store()
        .list_template_blocks(owner_id, template.day_of_week)?;
    let existing = same_day
        .iter()
        .filter_map(|other| other.interval().ok().map(|value| (other.id.as_str(), value)));
    if let Some(conflict) = find_overlap(&interval, existing) {
        return Err(TrackerError::Conflict(format!(
            "template block overlaps {conflict} on {}",
            template.day_of_week
        )));
    }

    state.store().insert_template_block(&template)?;
    info!(owner_id, template_block_id = %template.id, day = %template.day_of_week, "template block added");
    Ok(template)
}

pub fn delete_template_block_impl(
    state: &AppState,
    owner_id: &str,
    template_block_id: &str,
) -> Result<(), TrackerError> {
    let owner_id = require_owner(owner_id)?;
    if !state
        .store()
        .delete_template_block(owner_id, template_block_id)?
    {
        return Err(TrackerError::not_found("template block", template_block_id));
    }
    info!(owner_id, template_block_id, "template block deleted");
    Ok(())
}

pub fn list_template_blocks_impl(
    state: &AppState,
    owner_id: &str,
    day_of_week: Weekday,
) -> Result<Vec<TemplateBlock>, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    state.store().list_template_blocks(owner_id, day_of_week)
}

/// Instantiates the weekday template on `date`. Template blocks that would
/// overlap an existing block are skipped and reported.
pub fn apply_template_impl(state: &AppState, owner_id: &str, date: NaiveDate) -> Result<AppliedTemplate, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let templates = state.store().list_template_blocks(owner_id, date.weekday())?;
    let mut created = Vec::new();
    let mut skipped = Vec::new();

    for template in templates {
        let block = build_block(
            next_id("blk"),
            owner_id,
            BlockInput {
                category_id: template.category_id.clone(),
                date,
                start_time: template.start_time.clone(),
                end_time: template.end_time.clone(),
                title: template.title.clone(),
                notes: None,
                is_flexible: template.is_flexible,
                priority: Some(template.priority),
            },
            state.now(),
        )?;
        match insert_block(state, owner_id, block) {
            Ok(saved) => created.push(saved),
            Err(TrackerError::Conflict(_)) => {
                let conflicting_block_id = conflicting_block(state, owner_id, date, &template)?;
                skipped.push(SkippedTemplateBlock {
                    template_block_id: template.id,
                    conflicting_block_id,
                });
            }
            Err(error) => return Err(error),
        }
    }

    info!(
        owner_id,
        %date,
        created = created.len(),
        skipped = skipped.len(),
        "template applied"
    );
    Ok(AppliedTemplate {
        date,
        created,
        skipped,
    })
}

fn build_block(
    id: String,
    owner_id: &str,
    input: BlockInput,
    created_at: DateTime<Utc>,
) -> Result<ScheduledBlock, TrackerError> {
    let start_time = canonical_time(&input.start_time);
    let end_time = canonical_time(&input.end_time);
    let mut block = ScheduledBlock {
        id,
        owner_id: owner_id.to_string(),
        category_id: input.category_id.trim().to_string(),
        date: input.date,
        start_time,
        end_time,
        title: normalized_text(input.title),
        notes: normalized_text(input.notes),
        is_flexible: input.is_flexible,
        priority: input.priority.unwrap_or(PriorityLevel::Medium.value()),
        crosses_midnight: false,
        created_at,
    };
    block.validate().map_err(TrackerError::Validation)?;
    block.crosses_midnight = block
        .interval()
        .map_err(TrackerError::Validation)?
        .crosses_midnight();
    Ok(block)
}

/// Stores times as zero-padded `HH:MM` so they sort by time of day.
/// Unparseable values pass through for the model validators to reject.
fn canonical_time(value: &str) -> String {
    to_minutes(value).map_or_else(|_| value.trim().to_string(), format_minutes)
}

fn insert_block(state: &AppState, owner_id: &str, block: ScheduledBlock) -> Result<SavedBlock, TrackerError> {
    let interval = checked_placement(state, owner_id, &block, None)?;
    let drafts = candidate_drafts(state, owner_id, &block.category_id, block.date, &interval, None)?;
    state
        .store()
        .insert_block(&block, &BlockValidation::pending(&block))?;
    let violations = record_violations(state, owner_id, Some(block.id.as_str()), block.date, drafts)?;
    Ok(SavedBlock { block, violations })
}

/// Category must exist and the interval must be free on the block's date.
fn checked_placement(
    state: &AppState,
    owner_id: &str,
    block: &ScheduledBlock,
    exclude_block_id: Option<&str>,
) -> Result<TimeInterval, TrackerError> {
    require_category(state, owner_id, &block.category_id)?;
    let interval = block.interval().map_err(TrackerError::Validation)?;
    let same_day = state
        .store()
        .list_blocks(owner_id, DateRange::single(block.date))?;
    let existing = same_day
        .iter()
        .filter(|other| Some(other.id.as_str()) != exclude_block_id)
        .filter_map(|other| other.interval().ok().map(|value| (other.id.as_str(), value)));
    if let Some(conflict) = find_overlap(&interval, existing) {
        return Err(TrackerError::Conflict(format!(
            "block {}-{} overlaps block {conflict} on {}",
            block.start_time, block.end_time, block.date
        )));
    }
    Ok(interval)
}

fn require_category(state: &AppState, owner_id: &str, category_id: &str) -> Result<Category, TrackerError> {
    state
        .store()
        .get_category(owner_id, category_id)?
        .ok_or_else(|| TrackerError::not_found("category", category_id))
}

fn conflicting_block(
    state: &AppState,
    owner_id: &str,
    date: NaiveDate,
    template: &TemplateBlock,
) -> Result<String, TrackerError> {
    let interval = template.interval().map_err(TrackerError::Validation)?;
    let same_day = state.store().list_blocks(owner_id, DateRange::single(date))?;
    let existing = same_day
        .iter()
        .filter_map(|other| other.interval().ok().map(|value| (other.id.as_str(), value)));
    Ok(find_overlap(&interval, existing)
        .map(ToOwned::to_owned)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{block_input, date, seed_block, seed_category, test_state, OWNER};
    use crate::application::compliance::{upsert_usage_limit_impl, UsageLimitInput};
    use crate::domain::models::{ValidationStatus, ViolationType};

    #[test]
    fn create_block_persists_pending_validation_and_midnight_flag() {
        let state = test_state();
        seed_category(&state, "cat-sleep", false, true);

        let saved = create_block_impl(&state, OWNER, block_input("cat-sleep", "2026-02-16", "23:00", "07:00"))
            .expect("create block");
        assert!(saved.block.crosses_midnight);
        assert_eq!(saved.block.priority, 5);
        assert!(saved.violations.is_empty());

        let validation = state
            .store()
            .get_validation(OWNER, &saved.block.id)
            .expect("get validation")
            .expect("validation exists");
        assert_eq!(validation.status, ValidationStatus::Pending);
    }

    #[test]
    fn block_times_are_stored_zero_padded_and_listed_in_time_order() {
        let state = test_state();
        seed_category(&state, "cat-study", false, false);
        seed_block(&state, "cat-study", "2026-02-16", "10:00", "11:00");
        let early = seed_block(&state, "cat-study", "2026-02-16", "7:05", "08:00:00");
        assert_eq!(early.start_time, "07:05");
        assert_eq!(early.end_time, "08:00");

        let listed = list_blocks_impl(&state, OWNER, DateRange::single(date("2026-02-16"))).expect("list blocks");
        let starts = listed.iter().map(|block| block.start_time.as_str()).collect::<Vec<_>>();
        assert_eq!(starts, vec!["07:05", "10:00"]);

        let template = add_template_block_impl(&state, OWNER, template_input("cat-study", Weekday::Wed, "6:30", "7:15"))
            .expect("add template");
        assert_eq!((template.start_time.as_str(), template.end_time.as_str()), ("06:30", "07:15"));
    }

    #[test]
    fn overlapping_block_is_rejected_without_side_effects() {
        let state = test_state();
        seed_category(&state, "cat-study", false, false);
        let first = seed_block(&state, "cat-study", "2026-02-16", "09:00", "10:00");

        let result = create_block_impl(&state, OWNER, block_input("cat-study", "2026-02-16", "09:30", "11:00"));
        match result {
            Err(TrackerError::Conflict(message)) => assert!(message.contains(&first.id)),
            other => panic!("expected conflict, got {other:?}"),
        }

        seed_block(&state, "cat-study", "2026-02-16", "10:00", "11:00");
        seed_block(&state, "cat-study", "2026-02-17", "09:30", "11:00");
        let listed = list_blocks_impl(&state, OWNER, DateRange::single(date("2026-02-16"))).expect("list");
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn two_wrapping_blocks_on_one_date_conflict() {
        let state = test_state();
        seed_category(&state, "cat-sleep", false, true);
        seed_block(&state, "cat-sleep", "2026-02-16", "23:50", "00:10");
        let result = create_block_impl(&state, OWNER, block_input("cat-sleep", "2026-02-16", "22:00", "00:05"));
        assert!(matches!(result, Err(TrackerError::Conflict(_))));
    }

    #[test]
    fn invalid_blocks_are_rejected_before_any_write() {
        let state = test_state();
        seed_category(&state, "cat-study", false, false);

        let zero_length = create_block_impl(&state, OWNER, block_input("cat-study", "2026-02-16", "09:00", "09:00"));
        assert!(matches!(zero_length, Err(TrackerError::Validation(_))));

        let malformed = create_block_impl(&state, OWNER, block_input("cat-study", "2026-02-16", "9h", "10:00"));
        assert!(matches!(malformed, Err(TrackerError::Validation(_))));

        let mut input = block_input("cat-study", "2026-02-16", "09:00", "10:00");
        input.priority = Some(11);
        assert!(matches!(create_block_impl(&state, OWNER, input), Err(TrackerError::Validation(_))));

        let unknown = create_block_impl(&state, OWNER, block_input("cat-missing", "2026-02-16", "09:00", "10:00"));
        assert!(matches!(unknown, Err(TrackerError::NotFound { entity: "category", .. })));

        assert!(
            list_blocks_impl(&state, OWNER, DateRange::single(date("2026-02-16")))
                .expect("list")
                .is_empty()
        );
    }

    #[test]
    fn create_block_records_advisory_violations() {
        let state = test_state();
        seed_category(&state, "cat-games", false, false);
        upsert_usage_limit_impl(
            &state,
            OWNER,
            UsageLimitInput {
                category_id: "cat-games".to_string(),
                max_continuous_minutes: 60,
                max_daily_hours: None,
                max_weekly_hours: None,
                is_active: true,
            },
        )
        .expect("save limit");

        let saved = create_block_impl(&state, OWNER, block_input("cat-games", "2026-02-16", "20:00", "21:30"))
            .expect("create block");
        assert_eq!(saved.violations.len(), 1);
        assert_eq!(saved.violations[0].violation_type, ViolationType::ContinuousExceeded);
        assert_eq!(saved.violations[0].block_id.as_deref(), Some(saved.block.id.as_str()));
    }

    #[test]
    fn update_block_ignores_its_own_interval() {
        let state = test_state();
        seed_category(&state, "cat-study", false, false);
        let block = seed_block(&state, "cat-study", "2026-02-16", "09:00", "10:00");
        seed_block(&state, "cat-study", "2026-02-16", "11:00", "12:00");

        let moved = update_block_impl(
            &state,
            OWNER,
            &block.id,
            block_input("cat-study", "2026-02-16", "09:30", "10:30"),
        )
        .expect("shift block");
        assert_eq!(moved.block.start_time, "09:30");
        assert_eq!(moved.block.created_at, block.created_at);

        let collision = update_block_impl(
            &state,
            OWNER,
            &block.id,
            block_input("cat-study", "2026-02-16", "10:30", "11:30"),
        );
        assert!(matches!(collision, Err(TrackerError::Conflict(_))));

        let missing = update_block_impl(
            &state,
            OWNER,
            "blk-missing",
            block_input("cat-study", "2026-02-16", "13:00", "14:00"),
        );
        assert!(matches!(missing, Err(TrackerError::NotFound { entity: "block", .. })));
    }

    #[test]
    fn delete_block_removes_validation() {
        let state = test_state();
        seed_category(&state, "cat-study", false, false);
        let block = seed_block(&state, "cat-study", "2026-02-16", "09:00", "10:00");

        delete_block_impl(&state, OWNER, &block.id).expect("delete block");
        assert_eq!(state.store().get_validation(OWNER, &block.id).expect("get"), None);
        assert!(matches!(
            delete_block_impl(&state, OWNER, &block.id),
            Err(TrackerError::NotFound { .. })
        ));
    }

    fn template_input(category_id: &str, day: Weekday, start: &str, end: &str) -> TemplateBlockInput {
        TemplateBlockInput {
            category_id: category_id.to_string(),
            day_of_week: day,
            start_time: start.to_string(),
            end_time: end.to_string(),
            title: Some("Routine".to_string()),
            is_flexible: false,
            priority: Some(PriorityLevel::High.value()),
        }
    }

    #[test]
    fn template_overlap_is_scoped_to_weekday() {
        let state = test_state();
        seed_category(&state, "cat-study", false, false);
        add_template_block_impl(&state, OWNER, template_input("cat-study", Weekday::Mon, "07:00", "08:00"))
            .expect("add template");

        let clash = add_template_block_impl(&state, OWNER, template_input("cat-study", Weekday::Mon, "07:30", "08:30"));
        assert!(matches!(clash, Err(TrackerError::Conflict(_))));

        add_template_block_impl(&state, OWNER, template_input("cat-study", Weekday::Tue, "07:30", "08:30"))
            .expect("other weekday is free");
        assert_eq!(list_template_blocks_impl(&state, OWNER, Weekday::Mon).expect("list").len(), 1);
    }

    #[test]
    fn apply_template_skips_blocks_that_overlap() {
        let state = test_state();
        seed_category(&state, "cat-study", false, false);
        let early = add_template_block_impl(&state, OWNER, template_input("cat-study", Weekday::Mon, "07:00", "08:00"))
            .expect("add template");
        add_template_block_impl(&state, OWNER, template_input("cat-study", Weekday::Mon, "18:00", "19:00"))
            .expect("add template");
        let existing = seed_block(&state, "cat-study", "2026-02-16", "07:30", "08:30");

        let applied = apply_template_impl(&state, OWNER, date("2026-02-16")).expect("apply template");
        assert_eq!(applied.created.len(), 1);
        assert_eq!(applied.created[0].block.start_time, "18:00");
        assert_eq!(applied.created[0].block.priority, 7);
        assert_eq!(
            applied.skipped,
            vec![SkippedTemplateBlock {
                template_block_id: early.id,
                conflicting_block_id: existing.id,
            }]
        );

        let tuesday = apply_template_impl(&state, OWNER, date("2026-02-17")).expect("apply template");
        assert!(tuesday.created.is_empty());
        assert!(tuesday.skipped.is_empty());
    }

    #[test]
    fn categories_are_listed_per_owner() {
        let state = test_state();
        seed_category(&state, "cat-study", true, false);
        upsert_category_impl(&state, "user-2", Some("cat-other".to_string()), "Other", false, false)
            .expect("other owner");
        let categories = list_categories_impl(&state, OWNER).expect("list");
        assert_eq!(categories.len(), 1);
        assert!(categories[0].requires_rest);
        assert!(matches!(
            upsert_category_impl(&state, OWNER, None, "  ", false, false),
            Err(TrackerError::Validation(_))
        ));
    }
}
