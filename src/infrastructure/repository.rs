//! Persistence seams. Every call is scoped by an explicit owner id; records
//! of another owner behave as if they did not exist.

use crate::domain::models::{
    BlockValidation, Category, DateRange, Goal, GoalPeriod, RestRule, RoutineViolation,
    ScheduledBlock, TemplateBlock, UsageLimit,
};
use crate::infrastructure::error::TrackerError;
use chrono::{DateTime, Utc, Weekday};

pub trait CategoryRepository: Send + Sync {
    fn upsert_category(&self, category: &Category) -> Result<(), TrackerError>;
    fn get_category(&self, owner_id: &str, category_id: &str) -> Result<Option<Category>, TrackerError>;
    fn list_categories(&self, owner_id: &str) -> Result<Vec<Category>, TrackerError>;
}

pub trait BlockRepository: Send + Sync {
    /// Stores a new block and its initial validation record atomically.
    fn insert_block(&self, block: &ScheduledBlock, validation: &BlockValidation) -> Result<(), TrackerError>;
    fn update_block(&self, block: &ScheduledBlock) -> Result<(), TrackerError>;
    fn get_block(&self, owner_id: &str, block_id: &str) -> Result<Option<ScheduledBlock>, TrackerError>;
    /// Blocks dated within `range`, ordered by date then start time.
    fn list_blocks(&self, owner_id: &str, range: DateRange) -> Result<Vec<ScheduledBlock>, TrackerError>;
    /// Removes the block and its validation. Returns whether it existed.
    fn delete_block(&self, owner_id: &str, block_id: &str) -> Result<bool, TrackerError>;
}

pub trait ValidationRepository: Send + Sync {
    /// Replaces the block's validation record.
    fn upsert_validation(&self, validation: &BlockValidation) -> Result<(), TrackerError>;
    fn get_validation(&self, owner_id: &str, block_id: &str) -> Result<Option<BlockValidation>, TrackerError>;
    /// Validation records of blocks dated within `range`.
    fn list_validations(&self, owner_id: &str, range: DateRange) -> Result<Vec<BlockValidation>, TrackerError>;
}

pub trait RuleRepository: Send + Sync {
    fn upsert_rest_rule(&self, rule: &RestRule) -> Result<(), TrackerError>;
    fn delete_rest_rule(&self, owner_id: &str, rule_id: &str) -> Result<bool, TrackerError>;
    /// Rest rules in the order they were first stored.
    fn list_rest_rules(&self, owner_id: &str) -> Result<Vec<RestRule>, TrackerError>;
    /// One limit per (owner, category); an existing limit keeps its id.
    fn upsert_usage_limit(&self, limit: &UsageLimit) -> Result<UsageLimit, TrackerError>;
    fn delete_usage_limit(&self, owner_id: &str, category_id: &str) -> Result<bool, TrackerError>;
    fn get_usage_limit(&self, owner_id: &str, category_id: &str) -> Result<Option<UsageLimit>, TrackerError>;
    fn list_usage_limits(&self, owner_id: &str) -> Result<Vec<UsageLimit>, TrackerError>;
}

pub trait ViolationRepository: Send + Sync {
    fn append_violations(&self, violations: &[RoutineViolation]) -> Result<(), TrackerError>;
    fn list_violations(
        &self,
        owner_id: &str,
        range: DateRange,
        include_acknowledged: bool,
    ) -> Result<Vec<RoutineViolation>, TrackerError>;
    /// Marks a violation acknowledged; a second call keeps the first
    /// timestamp. `None` when the violation does not exist.
    fn acknowledge_violation(
        &self,
        owner_id: &str,
        violation_id: &str,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<Option<RoutineViolation>, TrackerError>;
}

pub trait GoalRepository: Send + Sync {
    /// One goal per (owner, category, period); an existing goal keeps its id.
    fn upsert_goal(&self, goal: &Goal) -> Result<Goal, TrackerError>;
    fn delete_goal(&self, owner_id: &str, goal_id: &str) -> Result<bool, TrackerError>;
    fn list_goals(&self, owner_id: &str, period: GoalPeriod) -> Result<Vec<Goal>, TrackerError>;
}

pub trait TemplateRepository: Send + Sync {
    fn insert_template_block(&self, block: &TemplateBlock) -> Result<(), TrackerError>;
    fn delete_template_block(&self, owner_id: &str, template_block_id: &str) -> Result<bool, TrackerError>;
    /// Template blocks of one weekday, ordered by start time.
    fn list_template_blocks(&self, owner_id: &str, day_of_week: Weekday) -> Result<Vec<TemplateBlock>, TrackerError>;
}

pub trait TrackerStore:
    CategoryRepository
    + BlockRepository
    + ValidationRepository
    + RuleRepository
    + ViolationRepository
    + GoalRepository
    + TemplateRepository
{
}

impl<T> TrackerStore for T where
    T: CategoryRepository
        + BlockRepository
        + ValidationRepository
        + RuleRepository
        + ViolationRepository
        + GoalRepository
        + TemplateRepository
{
}
