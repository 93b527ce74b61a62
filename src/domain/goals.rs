use crate::domain::models::{
    BlockValidation, DateRange, Goal, GoalPeriod, GoalProgress, GoalStatus, GoalType, ScheduledBlock,
    ValidationStatus,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};

pub fn classify(goal_type: GoalType, percentage: u32) -> GoalStatus {
    match goal_type {
        GoalType::Minimum => match percentage {
            100.. => GoalStatus::Achieved,
            80..=99 => GoalStatus::OnTrack,
            50..=79 => GoalStatus::AtRisk,
            _ => GoalStatus::Behind,
        },
        GoalType::Maximum => match percentage {
            100.. => GoalStatus::Exceeded,
            80..=99 => GoalStatus::Approaching,
            _ => GoalStatus::WithinLimit,
        },
    }
}

pub fn progress(goal: &Goal, achieved_hours: f64, today: NaiveDate) -> Result<GoalProgress, String> {
    let target = goal.target_hours;
    let percentage = if target > 0.0 {
        (achieved_hours / target * 100.0).round().max(0.0) as u32
    } else {
        0
    };
    let remaining = (target - achieved_hours).max(0.0);

    let (days_remaining, daily_required_hours) = match goal.period {
        GoalPeriod::Monthly { .. } => {
            let days_remaining = days_remaining_in(goal.period.date_range()?, today);
            let daily_required = if days_remaining > 0 {
                remaining / f64::from(days_remaining)
            } else {
                remaining
            };
            (Some(days_remaining), Some(daily_required))
        }
        GoalPeriod::Weekly { .. } => (None, None),
    };

    Ok(GoalProgress {
        goal_id: Some(goal.id.clone()),
        category_id: goal.category_id.clone(),
        period: Some(goal.period),
        goal_type: Some(goal.goal_type),
        target_hours: Some(target),
        achieved_hours,
        remaining_hours: Some(remaining),
        percentage: Some(percentage),
        status: classify(goal.goal_type, percentage),
        days_remaining,
        daily_required_hours,
    })
}

pub fn no_goal(category_id: &str, achieved_hours: f64) -> GoalProgress {
    GoalProgress {
        goal_id: None,
        category_id: category_id.to_string(),
        period: None,
        goal_type: None,
        target_hours: None,
        achieved_hours,
        remaining_hours: None,
        percentage: None,
        status: GoalStatus::NoGoal,
        days_remaining: None,
        daily_required_hours: None,
    }
}

/// Days of the period still ahead once `today` is counted as elapsed. A
/// period entirely in the past has none left; one in the future has all.
fn days_remaining_in(range: DateRange, today: NaiveDate) -> u32 {
    let length = (range.end - range.start).num_days() as u32 + 1;
    let elapsed = if today < range.start {
        0
    } else if today > range.end {
        length
    } else {
        (today - range.start).num_days() as u32 + 1
    };
    length - elapsed
}

/// Minutes a block contributes to its category: the reported actual
/// duration when present (zero included), otherwise the planned duration
/// scaled by the completion percentage. A negative actual duration comes
/// from times reported across midnight and also falls back to the planned
/// share. Pending blocks contribute nothing.
pub fn credited_minutes(block: &ScheduledBlock, validation: Option<&BlockValidation>) -> f64 {
    let Some(validation) = validation.filter(|validation| validation.status != ValidationStatus::Pending)
    else {
        return 0.0;
    };
    if let Some(actual) = validation.actual_duration_minutes.filter(|minutes| *minutes >= 0) {
        return f64::from(actual);
    }
    let planned = block.planned_minutes().unwrap_or(0);
    f64::from(planned) * f64::from(validation.completion_percentage) / 100.0
}

pub fn achieved_hours_by_category(
    range: DateRange,
    blocks: &[ScheduledBlock],
    validations: &HashMap<String, BlockValidation>,
) -> BTreeMap<String, f64> {
    let mut achieved: BTreeMap<String, f64> = BTreeMap::new();
    for block in blocks.iter().filter(|block| range.contains(block.date)) {
        let minutes = credited_minutes(block, validations.get(&block.id));
        *achieved.entry(block.category_id.clone()).or_default() += minutes / 60.0;
    }
    achieved
}

/// Progress for every goal, plus a `no_goal` row for each category that
/// logged time without having a goal.
pub fn progress_report(
    goals: &[Goal],
    achieved: &BTreeMap<String, f64>,
    today: NaiveDate,
) -> Result<Vec<GoalProgress>, String> {
    let mut report = goals
        .iter()
        .map(|goal| {
            let hours = achieved.get(&goal.category_id).copied().unwrap_or(0.0);
            progress(goal, hours, today)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let covered = goals
        .iter()
        .map(|goal| goal.category_id.as_str())
        .collect::<HashSet<_>>();
    report.extend(
        achieved
            .iter()
            .filter(|(category_id, hours)| **hours > 0.0 && !covered.contains(category_id.as_str()))
            .map(|(category_id, hours)| no_goal(category_id, *hours)),
    );

    report.sort_by(|left, right| {
        left.category_id
            .cmp(&right.category_id)
            .then_with(|| period_key(left).cmp(&period_key(right)))
    });
    Ok(report)
}

fn period_key(progress: &GoalProgress) -> (u8, i32, u32) {
    match progress.period {
        Some(period @ GoalPeriod::Monthly { .. }) => (0, period.year(), period.number()),
        Some(period @ GoalPeriod::Weekly { .. }) => (1, period.year(), period.number()),
        None => (2, 0, 0),
    }
}
