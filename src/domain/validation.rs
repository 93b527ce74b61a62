//! Block validation lifecycle: `pending` until the owner reports what
//! happened, then `completed`, `partial` or `omitted`. Re-reporting replaces
//! the previous outcome.

use crate::domain::interval::to_minutes;
use crate::domain::models::{BlockValidation, DateRange, ScheduledBlock, ValidationStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Completion percentage applied when a report does not carry one.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultCompletion {
    pub completed: u8,
    pub partial: u8,
    pub omitted: u8,
}

impl Default for DefaultCompletion {
    fn default() -> Self {
        Self {
            completed: 100,
            partial: 50,
            omitted: 0,
        }
    }
}

impl DefaultCompletion {
    pub fn for_status(&self, status: ValidationStatus) -> u8 {
        match status {
            ValidationStatus::Completed => self.completed,
            ValidationStatus::Partial => self.partial,
            ValidationStatus::Omitted => self.omitted,
            ValidationStatus::Pending => 0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.completed > 100 || self.partial > 100 || self.omitted > 100 {
            return Err("defaultCompletion values must be <= 100".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub actual_start_time: Option<String>,
    pub actual_end_time: Option<String>,
    pub completion_percentage: Option<u8>,
    pub omission_reason_id: Option<String>,
    pub notes: Option<String>,
}

impl ValidationReport {
    pub fn with_status(status: ValidationStatus) -> Self {
        Self {
            status,
            actual_start_time: None,
            actual_end_time: None,
            completion_percentage: None,
            omission_reason_id: None,
            notes: None,
        }
    }
}

/// Builds the validation record that replaces whatever the block had before.
pub fn apply_report(
    block: &ScheduledBlock,
    report: &ValidationReport,
    defaults: &DefaultCompletion,
    validated_at: DateTime<Utc>,
) -> Result<BlockValidation, String> {
    if report.status == ValidationStatus::Pending {
        return Err("report.status must be completed, partial or omitted".to_string());
    }
    let actual_duration_minutes = derive_actual_duration(
        report.actual_start_time.as_deref(),
        report.actual_end_time.as_deref(),
    )?;
    let completion_percentage = report
        .completion_percentage
        .unwrap_or_else(|| defaults.for_status(report.status));
    if completion_percentage > 100 {
        return Err("report.completion_percentage must be <= 100".to_string());
    }

    let validation = BlockValidation {
        block_id: block.id.clone(),
        owner_id: block.owner_id.clone(),
        status: report.status,
        actual_start_time: normalized(report.actual_start_time.as_deref()),
        actual_end_time: normalized(report.actual_end_time.as_deref()),
        actual_duration_minutes,
        completion_percentage,
        omission_reason_id: normalized(report.omission_reason_id.as_deref()),
        notes: normalized(report.notes.as_deref()),
        validated_at: Some(validated_at),
    };
    validation.validate()?;
    Ok(validation)
}

/// Plain `end - start` in minutes. Actual times are not wrapped past
/// midnight, so an actual session ending after midnight yields a negative
/// value.
pub fn derive_actual_duration(start: Option<&str>, end: Option<&str>) -> Result<Option<i32>, String> {
    let (Some(start), Some(end)) = (normalized_str(start), normalized_str(end)) else {
        return Ok(None);
    };
    let start = to_minutes(start).map_err(|_| "report.actual_start_time must be HH:MM".to_string())?;
    let end = to_minutes(end).map_err(|_| "report.actual_end_time must be HH:MM".to_string())?;
    Ok(Some(end as i32 - start as i32))
}

pub fn index_by_block(validations: Vec<BlockValidation>) -> HashMap<String, BlockValidation> {
    validations
        .into_iter()
        .map(|validation| (validation.block_id.clone(), validation))
        .collect()
}

/// A block without a record counts as pending.
pub fn status_of(block: &ScheduledBlock, validations: &HashMap<String, BlockValidation>) -> ValidationStatus {
    validations
        .get(&block.id)
        .map(|validation| validation.status)
        .unwrap_or(ValidationStatus::Pending)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PendingValidation {
    pub block: ScheduledBlock,
    pub days_elapsed: i64,
}

pub fn pending_validations(
    blocks: &[ScheduledBlock],
    validations: &HashMap<String, BlockValidation>,
    date: NaiveDate,
    today: NaiveDate,
) -> Vec<PendingValidation> {
    let mut pending = blocks
        .iter()
        .filter(|block| block.date == date)
        .filter(|block| status_of(block, validations) == ValidationStatus::Pending)
        .map(|block| PendingValidation {
            block: block.clone(),
            days_elapsed: (today - block.date).num_days().max(0),
        })
        .collect::<Vec<_>>();
    pending.sort_by(|left, right| left.block.start_time.cmp(&right.block.start_time));
    pending
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StatusCounts {
    pub total: u32,
    pub completed: u32,
    pub partial: u32,
    pub omitted: u32,
    pub pending: u32,
    /// Mean completion over validated (non-pending) blocks.
    pub average_completion: Option<f64>,
    #[serde(skip)]
    completion_sum: u32,
}

impl StatusCounts {
    fn record(&mut self, status: ValidationStatus, completion_percentage: u8) {
        self.total += 1;
        match status {
            ValidationStatus::Completed => self.completed += 1,
            ValidationStatus::Partial => self.partial += 1,
            ValidationStatus::Omitted => self.omitted += 1,
            ValidationStatus::Pending => {
                self.pending += 1;
                return;
            }
        }
        self.completion_sum += u32::from(completion_percentage);
        let validated = self.completed + self.partial + self.omitted;
        self.average_completion = Some(f64::from(self.completion_sum) / f64::from(validated));
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ValidationStats {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub overall: StatusCounts,
    pub by_category: BTreeMap<String, StatusCounts>,
}

pub fn validation_stats(
    range: DateRange,
    blocks: &[ScheduledBlock],
    validations: &HashMap<String, BlockValidation>,
) -> ValidationStats {
    let mut overall = StatusCounts::default();
    let mut by_category: BTreeMap<String, StatusCounts> = BTreeMap::new();

    for block in blocks.iter().filter(|block| range.contains(block.date)) {
        let (status, completion) = validations
            .get(&block.id)
            .map(|validation| (validation.status, validation.completion_percentage))
            .unwrap_or((ValidationStatus::Pending, 0));
        overall.record(status, completion);
        by_category
            .entry(block.category_id.clone())
            .or_default()
            .record(status, completion);
    }

    ValidationStats {
        start: range.start,
        end: range.end,
        overall,
        by_category,
    }
}

fn normalized_str(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn normalized(value: Option<&str>) -> Option<String> {
    normalized_str(value).map(ToOwned::to_owned)
}
