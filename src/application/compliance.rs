use crate::application::state::{next_id, require_owner, AppState};
use crate::domain::compliance::{check_candidate, RuleSnapshot};
use crate::domain::interval::TimeInterval;
use crate::domain::models::{
    DateRange, GoalPeriod, RestRule, RoutineViolation, UsageLimit, ViolationDraft,
};
use crate::infrastructure::error::TrackerError;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct RestRuleInput {
    pub id: Option<String>,
    pub category_id: Option<String>,
    pub trigger_duration_minutes: u32,
    pub rest_duration_minutes: u32,
    pub rest_category_id: Option<String>,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default = "enabled")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsageLimitInput {
    pub category_id: String,
    pub max_continuous_minutes: u32,
    pub max_daily_hours: Option<f64>,
    pub max_weekly_hours: Option<f64>,
    #[serde(default = "enabled")]
    pub is_active: bool,
}

fn enabled() -> bool {
    true
}

/// Advisory check of a block that has not been saved. Nothing is persisted.
pub fn check_candidate_impl(
    state: &AppState,
    owner_id: &str,
    date: NaiveDate,
    category_id: &str,
    start_time: &str,
    end_time: &str,
) -> Result<Vec<ViolationDraft>, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let interval = TimeInterval::parse(start_time, end_time).map_err(TrackerError::Validation)?;
    if interval.is_degenerate() {
        return Err(TrackerError::Validation(
            "end_time must differ from start_time".to_string(),
        ));
    }
    candidate_drafts(state, owner_id, category_id, date, &interval, None)
}

pub(crate) fn candidate_drafts(
    state: &AppState,
    owner_id: &str,
    category_id: &str,
    date: NaiveDate,
    interval: &TimeInterval,
    exclude_block_id: Option<&str>,
) -> Result<Vec<ViolationDraft>, TrackerError> {
    let store = state.store();
    let usage_limit = store.get_usage_limit(owner_id, category_id)?;
    let rest_rules = store.list_rest_rules(owner_id)?;
    let same_day_blocks = store.list_blocks(owner_id, DateRange::single(date))?;
    let same_week_blocks = match usage_limit.as_ref().and_then(|limit| limit.max_weekly_hours) {
        Some(_) => {
            let week = GoalPeriod::weekly_containing(date)
                .date_range()
                .map_err(TrackerError::Validation)?;
            store.list_blocks(owner_id, week)?
        }
        None => Vec::new(),
    };
    debug!(
        owner_id,
        category_id,
        %date,
        rest_rules = rest_rules.len(),
        same_day_blocks = same_day_blocks.len(),
        has_usage_limit = usage_limit.is_some(),
        "evaluating candidate block"
    );

    let snapshot = RuleSnapshot {
        usage_limit: usage_limit.as_ref(),
        rest_rules: &rest_rules,
        same_day_blocks: &same_day_blocks,
        same_week_blocks: &same_week_blocks,
        exclude_block_id,
    };
    Ok(check_candidate(
        category_id,
        interval,
        &snapshot,
        state.config().rest_rule_selection,
    ))
}

/// Stamps drafts with ids and appends them to the violation log.
pub(crate) fn record_violations(
    state: &AppState,
    owner_id: &str,
    block_id: Option<&str>,
    date: NaiveDate,
    drafts: Vec<ViolationDraft>,
) -> Result<Vec<RoutineViolation>, TrackerError> {
    if drafts.is_empty() {
        return Ok(Vec::new());
    }
    let created_at = state.now();
    let violations = drafts
        .into_iter()
        .map(|draft| RoutineViolation {
            id: next_id("vio"),
            owner_id: owner_id.to_string(),
            block_id: block_id.map(ToOwned::to_owned),
            date,
            violation_type: draft.violation_type,
            category_id: draft.category_id,
            description: draft.description,
            severity: draft.severity,
            acknowledged: false,
            acknowledged_at: None,
            created_at,
        })
        .collect::<Vec<_>>();
    state.store().append_violations(&violations)?;
    for violation in &violations {
        warn!(
            owner_id,
            block_id = violation.block_id.as_deref().unwrap_or("-"),
            violation_type = %violation.violation_type,
            severity = violation.severity.as_str(),
            "{}",
            violation.description
        );
    }
    Ok(violations)
}

pub fn upsert_rest_rule_impl(
    state: &AppState,
    owner_id: &str,
    input: RestRuleInput,
) -> Result<RestRule, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let rule = RestRule {
        id: input
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| next_id("rule")),
        owner_id: owner_id.to_string(),
        category_id: input.category_id.filter(|value| !value.trim().is_empty()),
        trigger_duration_minutes: input.trigger_duration_minutes,
        rest_duration_minutes: input.rest_duration_minutes,
        rest_category_id: input.rest_category_id.filter(|value| !value.trim().is_empty()),
        is_mandatory: input.is_mandatory,
        is_active: input.is_active,
    };
    rule.validate().map_err(TrackerError::Validation)?;
    state.store().upsert_rest_rule(&rule)?;
    info!(owner_id, rule_id = %rule.id, "rest rule saved");
    Ok(rule)
}

pub fn delete_rest_rule_impl(state: &AppState, owner_id: &str, rule_id: &str) -> Result<(), TrackerError> {
    let owner_id = require_owner(owner_id)?;
    if !state.store().delete_rest_rule(owner_id, rule_id)? {
        return Err(TrackerError::not_found("rest rule", rule_id));
    }
    info!(owner_id, rule_id, "rest rule deleted");
    Ok(())
}

pub fn list_rest_rules_impl(state: &AppState, owner_id: &str) -> Result<Vec<RestRule>, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    state.store().list_rest_rules(owner_id)
}

pub fn upsert_usage_limit_impl(
    state: &AppState,
    owner_id: &str,
    input: UsageLimitInput,
) -> Result<UsageLimit, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let limit = UsageLimit {
        id: next_id("limit"),
        owner_id: owner_id.to_string(),
        category_id: input.category_id.trim().to_string(),
        max_continuous_minutes: input.max_continuous_minutes,
        max_daily_hours: input.max_daily_hours,
        max_weekly_hours: input.max_weekly_hours,
        is_active: input.is_active,
    };
    limit.validate().map_err(TrackerError::Validation)?;
    let stored = state.store().upsert_usage_limit(&limit)?;
    info!(owner_id, category_id = %stored.category_id, limit_id = %stored.id, "usage limit saved");
    Ok(stored)
}

pub fn delete_usage_limit_impl(state: &AppState, owner_id: &str, category_id: &str) -> Result<(), TrackerError> {
    let owner_id = require_owner(owner_id)?;
    if !state.store().delete_usage_limit(owner_id, category_id)? {
        return Err(TrackerError::not_found("usage limit", category_id));
    }
    info!(owner_id, category_id, "usage limit deleted");
    Ok(())
}

pub fn list_usage_limits_impl(state: &AppState, owner_id: &str) -> Result<Vec<UsageLimit>, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    state.store().list_usage_limits(owner_id)
}

pub fn list_violations_impl(
    state: &AppState,
    owner_id: &str,
    range: DateRange,
    include_acknowledged: bool,
) -> Result<Vec<RoutineViolation>, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    state
        .store()
        .list_violations(owner_id, range, include_acknowledged)
}

pub fn acknowledge_violation_impl(
    state: &AppState,
    owner_id: &str,
    violation_id: &str,
) -> Result<RoutineViolation, TrackerError> {
    let owner_id = require_owner(owner_id)?;
    let violation = state
        .store()
        .acknowledge_violation(owner_id, violation_id, state.now())?
        .ok_or_else(|| TrackerError::not_found("violation", violation_id))?;
    info!(owner_id, violation_id, "violation acknowledged");
    Ok(violation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{date, seed_block, seed_category, test_state};
    use crate::domain::compliance::{RestRuleSelection, WEEKLY_EXCEEDED};
    use crate::domain::models::{Severity, ViolationType};
    use crate::infrastructure::config::EngineConfig;

    fn limit(category_id: &str, continuous: u32, daily: Option<f64>, weekly: Option<f64>) -> UsageLimitInput {
        UsageLimitInput {
            category_id: category_id.to_string(),
            max_continuous_minutes: continuous,
            max_daily_hours: daily,
            max_weekly_hours: weekly,
            is_active: true,
        }
    }

    fn rest_rule(trigger: u32, rest: u32, mandatory: bool) -> RestRuleInput {
        RestRuleInput {
            id: None,
            category_id: None,
            trigger_duration_minutes: trigger,
            rest_duration_minutes: rest,
            rest_category_id: None,
            is_mandatory: mandatory,
            is_active: true,
        }
    }

    #[test]
    fn ninety_minute_candidate_over_an_hour_limit_yields_one_warning() {
        let state = test_state();
        seed_category(&state, "cat-games", false, false);
        upsert_usage_limit_impl(&state, "user-1", limit("cat-games", 60, None, None)).expect("save limit");

        let drafts = check_candidate_impl(&state, "user-1", date("2026-02-16"), "cat-games", "20:00", "21:30")
            .expect("check candidate");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].violation_type, ViolationType::ContinuousExceeded);
        assert_eq!(drafts[0].severity, Severity::Warning);

        let range = DateRange::single(date("2026-02-16"));
        assert!(list_violations_impl(&state, "user-1", range, true).expect("list").is_empty());
    }

    #[test]
    fn daily_limit_counts_existing_blocks_of_the_category() {
        let state = test_state();
        seed_category(&state, "cat-games", false, false);
        upsert_usage_limit_impl(&state, "user-1", limit("cat-games", 240, Some(2.0), None)).expect("save limit");
        seed_block(&state, "cat-games", "2026-02-16", "12:00", "13:30");

        let drafts = check_candidate_impl(&state, "user-1", date("2026-02-16"), "cat-games", "20:00", "21:00")
            .expect("check candidate");
        assert_eq!(
            drafts.iter().map(|draft| draft.violation_type.clone()).collect::<Vec<_>>(),
            vec![ViolationType::DailyExceeded]
        );

        let next_day = check_candidate_impl(&state, "user-1", date("2026-02-17"), "cat-games", "20:00", "21:00")
            .expect("check candidate");
        assert!(next_day.is_empty());
    }

    #[test]
    fn weekly_limit_counts_the_whole_iso_week() {
        let state = test_state();
        seed_category(&state, "cat-games", false, false);
        upsert_usage_limit_impl(&state, "user-1", limit("cat-games", 240, None, Some(3.0))).expect("save limit");
        seed_block(&state, "cat-games", "2026-02-16", "20:00", "22:00");
        seed_block(&state, "cat-games", "2026-02-14", "20:00", "23:00");

        let drafts = check_candidate_impl(&state, "user-1", date("2026-02-20"), "cat-games", "20:00", "21:30")
            .expect("check candidate");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].violation_type, ViolationType::Other(WEEKLY_EXCEEDED.to_string()));
    }

    #[test]
    fn rest_rule_selection_follows_config() {
        let first_match = test_state();
        upsert_rest_rule_impl(&first_match, "user-1", rest_rule(30, 5, false)).expect("save rule");
        upsert_rest_rule_impl(&first_match, "user-1", rest_rule(60, 15, true)).expect("save rule");
        let drafts = check_candidate_impl(&first_match, "user-1", date("2026-02-16"), "cat-study", "09:00", "10:30")
            .expect("check candidate");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].violation_type, ViolationType::RestSuggested);
        assert_eq!(drafts[0].severity, Severity::Info);

        let strict = AppState::in_memory(EngineConfig {
            rest_rule_selection: RestRuleSelection::MostRestrictive,
            ..EngineConfig::default()
        });
        upsert_rest_rule_impl(&strict, "user-1", rest_rule(30, 5, false)).expect("save rule");
        upsert_rest_rule_impl(&strict, "user-1", rest_rule(60, 15, true)).expect("save rule");
        let drafts = check_candidate_impl(&strict, "user-1", date("2026-02-16"), "cat-study", "09:00", "10:30")
            .expect("check candidate");
        assert_eq!(drafts[0].severity, Severity::Critical);
    }

    #[test]
    fn malformed_candidate_times_are_rejected() {
        let state = test_state();
        assert!(matches!(
            check_candidate_impl(&state, "user-1", date("2026-02-16"), "cat-study", "25:00", "26:00"),
            Err(TrackerError::Validation(_))
        ));
        assert!(matches!(
            check_candidate_impl(&state, "user-1", date("2026-02-16"), "cat-study", "09:00", "09:00"),
            Err(TrackerError::Validation(_))
        ));
    }

    #[test]
    fn usage_limit_is_unique_per_category() {
        let state = test_state();
        let first = upsert_usage_limit_impl(&state, "user-1", limit("cat-games", 60, None, None)).expect("save");
        let second = upsert_usage_limit_impl(&state, "user-1", limit("cat-games", 45, Some(1.5), None)).expect("save");
        assert_eq!(first.id, second.id);
        assert_eq!(list_usage_limits_impl(&state, "user-1").expect("list"), vec![second]);

        assert!(matches!(
            upsert_usage_limit_impl(&state, "user-1", limit("cat-games", 0, None, None)),
            Err(TrackerError::Validation(_))
        ));
        delete_usage_limit_impl(&state, "user-1", "cat-games").expect("delete");
        assert!(matches!(
            delete_usage_limit_impl(&state, "user-1", "cat-games"),
            Err(TrackerError::NotFound { .. })
        ));
    }

    #[test]
    fn rest_rule_can_be_updated_and_deleted() {
        let state = test_state();
        let rule = upsert_rest_rule_impl(&state, "user-1", rest_rule(30, 5, false)).expect("save rule");
        let updated = upsert_rest_rule_impl(
            &state,
            "user-1",
            RestRuleInput {
                id: Some(rule.id.clone()),
                ..rest_rule(45, 10, true)
            },
        )
        .expect("update rule");
        assert_eq!(list_rest_rules_impl(&state, "user-1").expect("list"), vec![updated]);

        delete_rest_rule_impl(&state, "user-1", &rule.id).expect("delete");
        assert!(list_rest_rules_impl(&state, "user-1").expect("list").is_empty());
    }

    #[test]
    fn acknowledging_unknown_violation_is_not_found() {
        let state = test_state();
        assert!(matches!(
            acknowledge_violation_impl(&state, "user-1", "vio-missing"),
            Err(TrackerError::NotFound { entity: "violation", .. })
        ));
    }
}
