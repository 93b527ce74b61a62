use crate::domain::interval::{to_minutes, TimeInterval};
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl PriorityLevel {
    pub fn value(self) -> u8 {
        match self {
            Self::Low => 3,
            Self::Medium => 5,
            Self::High => 7,
            Self::Critical => 10,
        }
    }

    /// Accepts either a level name or a numeric priority in 1..=10.
    pub fn parse_priority(value: &str) -> Result<u8, String> {
        let normalized = value.trim().to_ascii_lowercase();
        let priority = match normalized.as_str() {
            "low" => Self::Low.value(),
            "medium" => Self::Medium.value(),
            "high" => Self::High.value(),
            "critical" => Self::Critical.value(),
            other => other
                .parse::<u8>()
                .map_err(|_| format!("unsupported priority: {other}"))?,
        };
        validate_priority(priority, "priority")?;
        Ok(priority)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, String> {
        if end < start {
            return Err(format!("range end {end} must not be before start {start}"));
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    /// Sessions of this category need a rest block after them.
    pub requires_rest: bool,
    /// Blocks of this category count as rest.
    pub is_rest: bool,
}

impl Category {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "category.id")?;
        validate_non_empty(&self.owner_id, "category.owner_id")?;
        validate_non_empty(&self.name, "category.name")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledBlock {
    pub id: String,
    pub owner_id: String,
    pub category_id: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub is_flexible: bool,
    pub priority: u8,
    /// Display cache written at save time. Decisions use `interval()`.
    pub crosses_midnight: bool,
    pub created_at: DateTime<Utc>,
}

impl ScheduledBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        validate_non_empty(&self.owner_id, "block.owner_id")?;
        validate_non_empty(&self.category_id, "block.category_id")?;
        validate_hhmm(&self.start_time, "block.start_time")?;
        validate_hhmm(&self.end_time, "block.end_time")?;
        if self.interval()?.is_degenerate() {
            return Err("block.end_time must differ from block.start_time".to_string());
        }
        validate_priority(self.priority, "block.priority")
    }

    pub fn interval(&self) -> Result<TimeInterval, String> {
        TimeInterval::parse(&self.start_time, &self.end_time)
    }

    pub fn planned_minutes(&self) -> Result<u32, String> {
        Ok(self.interval()?.duration_minutes())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Pending,
    Completed,
    Partial,
    Omitted,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Omitted => "omitted",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "partial" => Ok(Self::Partial),
            "omitted" => Ok(Self::Omitted),
            other => Err(format!("unsupported validation status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockValidation {
    pub block_id: String,
    pub owner_id: String,
    pub status: ValidationStatus,
    pub actual_start_time: Option<String>,
    pub actual_end_time: Option<String>,
    pub actual_duration_minutes: Option<i32>,
    pub completion_percentage: u8,
    pub omission_reason_id: Option<String>,
    pub notes: Option<String>,
    pub validated_at: Option<DateTime<Utc>>,
}

impl BlockValidation {
    pub fn pending(block: &ScheduledBlock) -> Self {
        Self {
            block_id: block.id.clone(),
            owner_id: block.owner_id.clone(),
            status: ValidationStatus::Pending,
            actual_start_time: None,
            actual_end_time: None,
            actual_duration_minutes: None,
            completion_percentage: 0,
            omission_reason_id: None,
            notes: None,
            validated_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.block_id, "validation.block_id")?;
        if let Some(start) = self.actual_start_time.as_deref() {
            validate_hhmm(start, "validation.actual_start_time")?;
        }
        if let Some(end) = self.actual_end_time.as_deref() {
            validate_hhmm(end, "validation.actual_end_time")?;
        }
        if self.completion_percentage > 100 {
            return Err("validation.completion_percentage must be <= 100".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestRule {
    pub id: String,
    pub owner_id: String,
    /// `None` applies the rule to every category.
    pub category_id: Option<String>,
    pub trigger_duration_minutes: u32,
    pub rest_duration_minutes: u32,
    pub rest_category_id: Option<String>,
    pub is_mandatory: bool,
    pub is_active: bool,
}

impl RestRule {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "rest_rule.id")?;
        validate_non_empty(&self.owner_id, "rest_rule.owner_id")?;
        if self.trigger_duration_minutes == 0 {
            return Err("rest_rule.trigger_duration_minutes must be > 0".to_string());
        }
        if self.rest_duration_minutes == 0 {
            return Err("rest_rule.rest_duration_minutes must be > 0".to_string());
        }
        Ok(())
    }

    pub fn applies_to(&self, category_id: &str) -> bool {
        self.is_active
            && self
                .category_id
                .as_deref()
                .map(|scope| scope == category_id)
                .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageLimit {
    pub id: String,
    pub owner_id: String,
    pub category_id: String,
    pub max_continuous_minutes: u32,
    pub max_daily_hours: Option<f64>,
    pub max_weekly_hours: Option<f64>,
    pub is_active: bool,
}

impl UsageLimit {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "usage_limit.id")?;
        validate_non_empty(&self.owner_id, "usage_limit.owner_id")?;
        validate_non_empty(&self.category_id, "usage_limit.category_id")?;
        if self.max_continuous_minutes == 0 {
            return Err("usage_limit.max_continuous_minutes must be > 0".to_string());
        }
        validate_positive_hours(self.max_daily_hours, "usage_limit.max_daily_hours")?;
        validate_positive_hours(self.max_weekly_hours, "usage_limit.max_weekly_hours")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ViolationType {
    ContinuousExceeded,
    DailyExceeded,
    RestSuggested,
    RestSkipped,
    Other(String),
}

impl ViolationType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ContinuousExceeded => "continuous_exceeded",
            Self::DailyExceeded => "daily_exceeded",
            Self::RestSuggested => "rest_suggested",
            Self::RestSkipped => "rest_skipped",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for ViolationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "continuous_exceeded" => Self::ContinuousExceeded,
            "daily_exceeded" => Self::DailyExceeded,
            "rest_suggested" => Self::RestSuggested,
            "rest_skipped" => Self::RestSkipped,
            _ => Self::Other(value),
        }
    }
}

impl From<ViolationType> for String {
    fn from(value: ViolationType) -> Self {
        match value {
            ViolationType::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(format!("unsupported severity: {other}")),
        }
    }
}

/// A rule outcome before it is attached to an owner and persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViolationDraft {
    pub violation_type: ViolationType,
    pub category_id: String,
    pub description: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoutineViolation {
    pub id: String,
    pub owner_id: String,
    pub block_id: Option<String>,
    pub date: NaiveDate,
    pub violation_type: ViolationType,
    pub category_id: String,
    pub description: String,
    pub severity: Severity,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Minimum,
    Maximum,
}

impl GoalType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimum => "minimum",
            Self::Maximum => "maximum",
        }
    }
}

impl FromStr for GoalType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "minimum" | "min" => Ok(Self::Minimum),
            "maximum" | "max" => Ok(Self::Maximum),
            other => Err(format!("unsupported goal type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GoalPeriod {
    Monthly { year: i32, month: u32 },
    /// ISO-8601 week-numbering year and week.
    Weekly { year: i32, week: u32 },
}

impl GoalPeriod {
    pub fn monthly_containing(date: NaiveDate) -> Self {
        Self::Monthly {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn weekly_containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self::Weekly {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Monthly { .. } => "monthly",
            Self::Weekly { .. } => "weekly",
        }
    }

    pub fn year(&self) -> i32 {
        match *self {
            Self::Monthly { year, .. } | Self::Weekly { year, .. } => year,
        }
    }

    pub fn number(&self) -> u32 {
        match *self {
            Self::Monthly { month, .. } => month,
            Self::Weekly { week, .. } => week,
        }
    }

    pub fn from_parts(kind: &str, year: i32, number: u32) -> Result<Self, String> {
        let period = match kind.trim().to_ascii_lowercase().as_str() {
            "monthly" => Self::Monthly {
                year,
                month: number,
            },
            "weekly" => Self::Weekly { year, week: number },
            other => return Err(format!("unsupported goal period kind: {other}")),
        };
        period.date_range()?;
        Ok(period)
    }

    /// Inclusive first and last calendar day of the period.
    pub fn date_range(&self) -> Result<DateRange, String> {
        match *self {
            Self::Monthly { year, month } => {
                let start = NaiveDate::from_ymd_opt(year, month, 1)
                    .ok_or_else(|| format!("invalid month {year}-{month:02}"))?;
                let next = start
                    .checked_add_months(chrono::Months::new(1))
                    .ok_or_else(|| format!("month out of range {year}-{month:02}"))?;
                let end = next
                    .pred_opt()
                    .ok_or_else(|| format!("month out of range {year}-{month:02}"))?;
                DateRange::new(start, end)
            }
            Self::Weekly { year, week } => {
                let start = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
                    .ok_or_else(|| format!("invalid ISO week {year}-W{week:02}"))?;
                let end = start
                    .checked_add_days(Days::new(6))
                    .ok_or_else(|| format!("week out of range {year}-W{week:02}"))?;
                DateRange::new(start, end)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: String,
    pub owner_id: String,
    pub category_id: String,
    pub period: GoalPeriod,
    pub target_hours: f64,
    pub goal_type: GoalType,
}

impl Goal {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "goal.id")?;
        validate_non_empty(&self.owner_id, "goal.owner_id")?;
        validate_non_empty(&self.category_id, "goal.category_id")?;
        if !self.target_hours.is_finite() || self.target_hours < 0.0 {
            return Err("goal.target_hours must be a non-negative number".to_string());
        }
        self.period.date_range().map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Achieved,
    OnTrack,
    AtRisk,
    Behind,
    Exceeded,
    Approaching,
    WithinLimit,
    NoGoal,
}

impl GoalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Achieved => "achieved",
            Self::OnTrack => "on_track",
            Self::AtRisk => "at_risk",
            Self::Behind => "behind",
            Self::Exceeded => "exceeded",
            Self::Approaching => "approaching",
            Self::WithinLimit => "within_limit",
            Self::NoGoal => "no_goal",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalProgress {
    pub goal_id: Option<String>,
    pub category_id: String,
    pub period: Option<GoalPeriod>,
    pub goal_type: Option<GoalType>,
    pub target_hours: Option<f64>,
    pub achieved_hours: f64,
    pub remaining_hours: Option<f64>,
    pub percentage: Option<u32>,
    pub status: GoalStatus,
    pub days_remaining: Option<u32>,
    pub daily_required_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateBlock {
    pub id: String,
    pub owner_id: String,
    pub category_id: String,
    pub day_of_week: Weekday,
    pub start_time: String,
    pub end_time: String,
    pub title: Option<String>,
    pub is_flexible: bool,
    pub priority: u8,
}

impl TemplateBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "template_block.id")?;
        validate_non_empty(&self.owner_id, "template_block.owner_id")?;
        validate_non_empty(&self.category_id, "template_block.category_id")?;
        validate_hhmm(&self.start_time, "template_block.start_time")?;
        validate_hhmm(&self.end_time, "template_block.end_time")?;
        if self.interval()?.is_degenerate() {
            return Err("template_block.end_time must differ from template_block.start_time".to_string());
        }
        validate_priority(self.priority, "template_block.priority")
    }

    pub fn interval(&self) -> Result<TimeInterval, String> {
        TimeInterval::parse(&self.start_time, &self.end_time)
    }
}

pub fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.trim().to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn parse_date(value: &str, field_name: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    to_minutes(value)
        .map(|_| ())
        .map_err(|_| format!("{field_name} must be HH:MM"))
}

fn validate_priority(value: u8, field_name: &str) -> Result<(), String> {
    if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&value) {
        return Err(format!(
            "{field_name} must be between {MIN_PRIORITY} and {MAX_PRIORITY}"
        ));
    }
    Ok(())
}

fn validate_positive_hours(value: Option<f64>, field_name: &str) -> Result<(), String> {
    match value {
        Some(hours) if !hours.is_finite() || hours <= 0.0 => {
            Err(format!("{field_name} must be > 0"))
        }
        _ => Ok(()),
    }
}
