//! Rest-rule and usage-limit evaluation. Produces violation drafts; the
//! caller decides whether and where to persist them.

use crate::domain::interval::TimeInterval;
use crate::domain::models::{
    Category, RestRule, ScheduledBlock, Severity, UsageLimit, ViolationDraft, ViolationType,
};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::HashMap;

pub const WEEKLY_EXCEEDED: &str = "weekly_exceeded";

/// Which qualifying rest rule wins when several apply to one block.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestRuleSelection {
    /// First qualifying rule in storage order.
    #[default]
    FirstMatch,
    /// Mandatory rules first, then the longest rest.
    MostRestrictive,
}

/// Records already on the calendar that a candidate is measured against.
#[derive(Debug, Clone, Copy)]
pub struct RuleSnapshot<'a> {
    pub usage_limit: Option<&'a UsageLimit>,
    pub rest_rules: &'a [RestRule],
    pub same_day_blocks: &'a [ScheduledBlock],
    pub same_week_blocks: &'a [ScheduledBlock],
    /// Block being edited, left out of accumulated totals.
    pub exclude_block_id: Option<&'a str>,
}

pub fn check_candidate(
    category_id: &str,
    interval: &TimeInterval,
    snapshot: &RuleSnapshot<'_>,
    selection: RestRuleSelection,
) -> Vec<ViolationDraft> {
    let block_minutes = interval.duration_minutes();
    let block_hours = interval.duration_hours();
    let mut violations = Vec::new();

    if let Some(limit) = snapshot
        .usage_limit
        .filter(|limit| limit.is_active && limit.category_id == category_id)
    {
        if block_minutes > limit.max_continuous_minutes {
            violations.push(ViolationDraft {
                violation_type: ViolationType::ContinuousExceeded,
                category_id: category_id.to_string(),
                description: format!(
                    "block of {block_minutes} minutes exceeds the continuous limit of {} minutes",
                    limit.max_continuous_minutes
                ),
                severity: Severity::Warning,
            });
        }

        if let Some(max_daily_hours) = limit.max_daily_hours {
            let accumulated =
                accumulated_hours(snapshot.same_day_blocks, category_id, snapshot.exclude_block_id);
            if accumulated + block_hours > max_daily_hours {
                violations.push(ViolationDraft {
                    violation_type: ViolationType::DailyExceeded,
                    category_id: category_id.to_string(),
                    description: format!(
                        "daily total would reach {:.2} hours, above the limit of {max_daily_hours} hours",
                        accumulated + block_hours
                    ),
                    severity: Severity::Warning,
                });
            }
        }

        if let Some(max_weekly_hours) = limit.max_weekly_hours {
            let accumulated =
                accumulated_hours(snapshot.same_week_blocks, category_id, snapshot.exclude_block_id);
            if accumulated + block_hours > max_weekly_hours {
                violations.push(ViolationDraft {
                    violation_type: ViolationType::Other(WEEKLY_EXCEEDED.to_string()),
                    category_id: category_id.to_string(),
                    description: format!(
                        "weekly total would reach {:.2} hours, above the limit of {max_weekly_hours} hours",
                        accumulated + block_hours
                    ),
                    severity: Severity::Warning,
                });
            }
        }
    }

    if let Some(rule) = select_rest_rule(snapshot.rest_rules, category_id, block_minutes, selection) {
        violations.push(ViolationDraft {
            violation_type: ViolationType::RestSuggested,
            category_id: category_id.to_string(),
            description: format!(
                "plan a {} minute rest after this {block_minutes} minute block",
                rule.rest_duration_minutes
            ),
            severity: if rule.is_mandatory {
                Severity::Critical
            } else {
                Severity::Info
            },
        });
    }

    violations
}

pub fn select_rest_rule<'a>(
    rules: &'a [RestRule],
    category_id: &str,
    block_minutes: u32,
    selection: RestRuleSelection,
) -> Option<&'a RestRule> {
    let mut qualifying = rules
        .iter()
        .filter(|rule| rule.applies_to(category_id))
        .filter(|rule| rule.trigger_duration_minutes <= block_minutes);
    match selection {
        RestRuleSelection::FirstMatch => qualifying.next(),
        RestRuleSelection::MostRestrictive => qualifying
            .min_by_key(|rule| (Reverse(rule.is_mandatory), Reverse(rule.rest_duration_minutes))),
    }
}

/// Hours already planned in `category_id`, wrapping blocks counted with
/// their full length. Blocks with unreadable times contribute nothing.
pub fn accumulated_hours(blocks: &[ScheduledBlock], category_id: &str, exclude_block_id: Option<&str>) -> f64 {
    blocks
        .iter()
        .filter(|block| block.category_id == category_id)
        .filter(|block| Some(block.id.as_str()) != exclude_block_id)
        .filter_map(|block| block.interval().ok())
        .map(|interval| interval.duration_hours())
        .sum()
}

/// After a long session in a category that needs rest, the next block of the
/// same date must be a rest block. A wrapping session has no same-date
/// successor.
pub fn check_rest_after_completion(
    block: &ScheduledBlock,
    categories: &HashMap<String, Category>,
    same_day_blocks: &[ScheduledBlock],
    long_session_minutes: u32,
) -> Result<Option<ViolationDraft>, String> {
    let Some(category) = categories.get(&block.category_id) else {
        return Ok(None);
    };
    if !category.requires_rest {
        return Ok(None);
    }
    let interval = block.interval()?;
    let block_minutes = interval.duration_minutes();
    if block_minutes < long_session_minutes {
        return Ok(None);
    }

    let next = if interval.crosses_midnight() {
        None
    } else {
        same_day_blocks
            .iter()
            .filter(|candidate| candidate.id != block.id && candidate.date == block.date)
            .filter_map(|candidate| candidate.interval().ok().map(|value| (candidate, value)))
            .filter(|(_, candidate_interval)| candidate_interval.start_minute() > interval.end_minute())
            .min_by_key(|(_, candidate_interval)| candidate_interval.start_minute())
            .map(|(candidate, _)| candidate)
    };

    let followed_by_rest = next
        .and_then(|candidate| categories.get(&candidate.category_id))
        .map(|candidate_category| candidate_category.is_rest)
        .unwrap_or(false);
    if followed_by_rest {
        return Ok(None);
    }

    let description = match next {
        Some(candidate) => format!(
            "{block_minutes} minutes of {} were followed by a non-rest block at {}",
            category.name, candidate.start_time
        ),
        None => format!(
            "{block_minutes} minutes of {} were not followed by a rest block",
            category.name
        ),
    };
    Ok(Some(ViolationDraft {
        violation_type: ViolationType::RestSkipped,
        category_id: block.category_id.clone(),
        description,
        severity: Severity::Warning,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, Utc};
    use proptest::prelude::*;

    fn block(id: &str, category_id: &str, start: &str, end: &str) -> ScheduledBlock {
        ScheduledBlock {
            id: id.to_string(),
            owner_id: "user-1".to_string(),
            category_id: category_id.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date"),
            start_time: start.to_string(),
            end_time: end.to_string(),
            title: None,
            notes: None,
            is_flexible: false,
            priority: 5,
            crosses_midnight: false,
            created_at: DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc),
        }
    }

    fn limit(max_continuous_minutes: u32, max_daily_hours: Option<f64>) -> UsageLimit {
        UsageLimit {
            id: "ul-1".to_string(),
            owner_id: "user-1".to_string(),
            category_id: "cat-games".to_string(),
            max_continuous_minutes,
            max_daily_hours,
            max_weekly_hours: None,
            is_active: true,
        }
    }

    fn rest_rule(id: &str, trigger: u32, rest: u32, mandatory: bool) -> RestRule {
        RestRule {
            id: id.to_string(),
            owner_id: "user-1".to_string(),
            category_id: None,
            trigger_duration_minutes: trigger,
            rest_duration_minutes: rest,
            rest_category_id: None,
            is_mandatory: mandatory,
            is_active: true,
        }
    }

    fn snapshot<'a>(
        usage_limit: Option<&'a UsageLimit>,
        rest_rules: &'a [RestRule],
        same_day_blocks: &'a [ScheduledBlock],
    ) -> RuleSnapshot<'a> {
        RuleSnapshot {
            usage_limit,
            rest_rules,
            same_day_blocks,
            same_week_blocks: same_day_blocks,
            exclude_block_id: None,
        }
    }

    fn interval(start: &str, end: &str) -> TimeInterval {
        TimeInterval::parse(start, end).expect("valid interval")
    }

    fn categories() -> HashMap<String, Category> {
        [
            ("cat-study", true, false),
            ("cat-break", false, true),
            ("cat-chores", false, false),
        ]
        .into_iter()
        .map(|(id, requires_rest, is_rest)| {
            (
                id.to_string(),
                Category {
                    id: id.to_string(),
                    owner_id: "user-1".to_string(),
                    name: id.trim_start_matches("cat-").to_string(),
                    requires_rest,
                    is_rest,
                },
            )
        })
        .collect()
    }

    #[test]
    fn continuous_limit_flags_long_candidate_once() {
        let limit = limit(60, None);
        let violations = check_candidate(
            "cat-games",
            &interval("18:00", "19:30"),
            &snapshot(Some(&limit), &[], &[]),
            RestRuleSelection::FirstMatch,
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].violation_type, ViolationType::ContinuousExceeded);
        assert_eq!(violations[0].severity, Severity::Warning);
    }

    #[test]
    fn limits_of_other_categories_or_inactive_limits_are_ignored() {
        let mut limit = limit(60, Some(0.5));
        let other = check_candidate(
            "cat-study",
            &interval("18:00", "19:30"),
            &snapshot(Some(&limit), &[], &[]),
            RestRuleSelection::FirstMatch,
        );
        assert!(other.is_empty());

        limit.is_active = false;
        let inactive = check_candidate(
            "cat-games",
            &interval("18:00", "19:30"),
            &snapshot(Some(&limit), &[], &[]),
            RestRuleSelection::FirstMatch,
        );
        assert!(inactive.is_empty());
    }

    #[test]
    fn daily_limit_counts_existing_same_category_blocks() {
        let limit = limit(240, Some(2.0));
        let existing = vec![
            block("blk-1", "cat-games", "08:00", "09:00"),
            block("blk-2", "cat-games", "23:30", "00:00"),
            block("blk-3", "cat-study", "10:00", "14:00"),
        ];
        let within = check_candidate(
            "cat-games",
            &interval("20:00", "20:30"),
            &snapshot(Some(&limit), &[], &existing),
            RestRuleSelection::FirstMatch,
        );
        assert!(within.is_empty());

        let over = check_candidate(
            "cat-games",
            &interval("20:00", "20:45"),
            &snapshot(Some(&limit), &[], &existing),
            RestRuleSelection::FirstMatch,
        );
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].violation_type, ViolationType::DailyExceeded);
    }

    #[test]
    fn edited_block_is_not_counted_against_itself() {
        let limit = limit(240, Some(1.0));
        let existing = vec![block("blk-1", "cat-games", "08:00", "09:00")];
        let mut rules_snapshot = snapshot(Some(&limit), &[], &existing);
        rules_snapshot.exclude_block_id = Some("blk-1");
        let violations = check_candidate(
            "cat-games",
            &interval("08:00", "09:00"),
            &rules_snapshot,
            RestRuleSelection::FirstMatch,
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn weekly_limit_uses_open_violation_type() {
        let mut limit = limit(240, None);
        limit.max_weekly_hours = Some(3.0);
        let week = vec![
            block("blk-1", "cat-games", "08:00", "09:30"),
            block("blk-2", "cat-games", "18:00", "19:00"),
        ];
        let violations = check_candidate(
            "cat-games",
            &interval("20:00", "21:00"),
            &snapshot(Some(&limit), &[], &week),
            RestRuleSelection::FirstMatch,
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(
            violations[0].violation_type,
            ViolationType::Other(WEEKLY_EXCEEDED.to_string())
        );
    }

    #[test]
    fn rest_rule_severity_follows_mandatory_flag() {
        let optional = [rest_rule("rr-1", 60, 10, false)];
        let mandatory = [rest_rule("rr-2", 60, 15, true)];
        let candidate = interval("09:00", "10:30");

        let suggested = check_candidate(
            "cat-study",
            &candidate,
            &snapshot(None, &optional, &[]),
            RestRuleSelection::FirstMatch,
        );
        assert_eq!(suggested.len(), 1);
        assert_eq!(suggested[0].violation_type, ViolationType::RestSuggested);
        assert_eq!(suggested[0].severity, Severity::Info);

        let required = check_candidate(
            "cat-study",
            &candidate,
            &snapshot(None, &mandatory, &[]),
            RestRuleSelection::FirstMatch,
        );
        assert_eq!(required[0].severity, Severity::Critical);

        let short = check_candidate(
            "cat-study",
            &interval("09:00", "09:30"),
            &snapshot(None, &mandatory, &[]),
            RestRuleSelection::FirstMatch,
        );
        assert!(short.is_empty());
    }

    #[test]
    fn first_match_keeps_storage_order() {
        let rules = [
            rest_rule("rr-short", 30, 5, false),
            rest_rule("rr-long", 60, 20, true),
        ];
        let first = select_rest_rule(&rules, "cat-study", 90, RestRuleSelection::FirstMatch);
        assert_eq!(first.map(|rule| rule.id.as_str()), Some("rr-short"));

        let strict = select_rest_rule(&rules, "cat-study", 90, RestRuleSelection::MostRestrictive);
        assert_eq!(strict.map(|rule| rule.id.as_str()), Some("rr-long"));
    }

    #[test]
    fn scoped_rest_rules_only_apply_to_their_category() {
        let mut scoped = rest_rule("rr-1", 30, 5, false);
        scoped.category_id = Some("cat-gym".to_string());
        let rules = [scoped];
        assert!(select_rest_rule(&rules, "cat-study", 90, RestRuleSelection::FirstMatch).is_none());
        assert!(select_rest_rule(&rules, "cat-gym", 90, RestRuleSelection::FirstMatch).is_some());
    }

    #[test]
    fn long_session_followed_by_rest_is_compliant() {
        let session = block("blk-1", "cat-study", "09:00", "10:30");
        let day = vec![
            session.clone(),
            block("blk-2", "cat-break", "10:45", "11:00"),
            block("blk-3", "cat-chores", "12:00", "13:00"),
        ];
        let result = check_rest_after_completion(&session, &categories(), &day, 90).expect("valid block");
        assert!(result.is_none());
    }

    #[test]
    fn long_session_followed_by_work_is_flagged() {
        let session = block("blk-1", "cat-study", "09:00", "10:30");
        let day = vec![
            session.clone(),
            block("blk-2", "cat-chores", "10:45", "11:30"),
            block("blk-3", "cat-break", "12:00", "12:15"),
            block("blk-4", "cat-break", "08:00", "08:30"),
        ];
        let violation = check_rest_after_completion(&session, &categories(), &day, 90)
            .expect("valid block")
            .expect("rest skipped");
        assert_eq!(violation.violation_type, ViolationType::RestSkipped);
        assert_eq!(violation.severity, Severity::Warning);
        assert!(violation.description.contains("10:45"));
    }

    #[test]
    fn last_long_session_of_the_day_is_flagged() {
        let session = block("blk-1", "cat-study", "20:00", "22:00");
        let result = check_rest_after_completion(&session, &categories(), &[session.clone()], 90)
            .expect("valid block");
        assert!(result.is_some());
    }

    #[test]
    fn rest_only_required_for_long_sessions_of_flagged_categories() {
        let short = block("blk-1", "cat-study", "09:00", "10:29");
        assert!(check_rest_after_completion(&short, &categories(), &[], 90).expect("valid").is_none());
        let unflagged = block("blk-2", "cat-chores", "09:00", "12:00");
        assert!(check_rest_after_completion(&unflagged, &categories(), &[], 90).expect("valid").is_none());
    }

    proptest! {
        #[test]
        fn continuous_violation_iff_candidate_exceeds_limit(
            max_minutes in 1u32..600,
            start in 0u32..1440,
            length in 1u32..1439
        ) {
            let limit = limit(max_minutes, None);
            let candidate = TimeInterval::new(start, (start + length) % 1440).expect("valid endpoints");
            let violations = check_candidate(
                "cat-games",
                &candidate,
                &snapshot(Some(&limit), &[], &[]),
                RestRuleSelection::FirstMatch,
            );
            let flagged = violations
                .iter()
                .filter(|violation| violation.violation_type == ViolationType::ContinuousExceeded)
                .count();
            prop_assert_eq!(flagged, usize::from(length > max_minutes));
        }
    }
}
