use crate::domain::models::{
    BlockValidation, Category, DateRange, Goal, GoalPeriod, RestRule, RoutineViolation,
    ScheduledBlock, TemplateBlock, UsageLimit,
};
use crate::infrastructure::error::TrackerError;
use crate::infrastructure::repository::{
    BlockRepository, CategoryRepository, GoalRepository, RuleRepository, TemplateRepository,
    ValidationRepository, ViolationRepository,
};
use chrono::{DateTime, Utc, Weekday};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    categories: HashMap<String, Category>,
    blocks: HashMap<String, ScheduledBlock>,
    validations: HashMap<String, BlockValidation>,
    rest_rules: Vec<RestRule>,
    usage_limits: Vec<UsageLimit>,
    violations: Vec<RoutineViolation>,
    goals: Vec<Goal>,
    template_blocks: Vec<TemplateBlock>,
}

/// Store kept entirely in process memory. One lock guards every table, so
/// multi-record writes are atomic.
#[derive(Debug, Default)]
pub struct InMemoryTrackerStore {
    state: Mutex<MemoryState>,
}

impl InMemoryTrackerStore {
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, TrackerError> {
        self.state
            .lock()
            .map_err(|error| TrackerError::Storage(format!("tracker store lock poisoned: {error}")))
    }
}

impl CategoryRepository for InMemoryTrackerStore {
    fn upsert_category(&self, category: &Category) -> Result<(), TrackerError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.categories.get(&category.id) {
            if existing.owner_id != category.owner_id {
                return Err(TrackerError::Conflict(format!(
                    "category id {} belongs to another owner",
                    category.id
                )));
            }
        }
        state.categories.insert(category.id.clone(), category.clone());
        Ok(())
    }

    fn get_category(&self, owner_id: &str, category_id: &str) -> Result<Option<Category>, TrackerError> {
        let state = self.lock()?;
        Ok(state
            .categories
            .get(category_id)
            .filter(|category| category.owner_id == owner_id)
            .cloned())
    }

    fn list_categories(&self, owner_id: &str) -> Result<Vec<Category>, TrackerError> {
        let state = self.lock()?;
        let mut categories = state
            .categories
            .values()
            .filter(|category| category.owner_id == owner_id)
            .cloned()
            .collect::<Vec<_>>();
        categories.sort_by(|left, right| left.name.cmp(&right.name).then_with(|| left.id.cmp(&right.id)));
        Ok(categories)
    }
}

impl BlockRepository for InMemoryTrackerStore {
    fn insert_block(&self, block: &ScheduledBlock, validation: &BlockValidation) -> Result<(), TrackerError> {
        let mut state = self.lock()?;
        if state.blocks.contains_key(&block.id) {
            return Err(TrackerError::Conflict(format!("block id {} already exists", block.id)));
        }
        state.blocks.insert(block.id.clone(), block.clone());
        state
            .validations
            .insert(validation.block_id.clone(), validation.clone());
        Ok(())
    }

    fn update_block(&self, block: &ScheduledBlock) -> Result<(), TrackerError> {
        let mut state = self.lock()?;
        let Some(existing) = state
            .blocks
            .get_mut(&block.id)
            .filter(|existing| existing.owner_id == block.owner_id)
        else {
            return Err(TrackerError::not_found("block", block.id.as_str()));
        };
        let created_at = existing.created_at;
        *existing = ScheduledBlock {
            created_at,
            ..block.clone()
        };
        Ok(())
    }

    fn get_block(&self, owner_id: &str, block_id: &str) -> Result<Option<ScheduledBlock>, TrackerError> {
        let state = self.lock()?;
        Ok(state
            .blocks
            .get(block_id)
            .filter(|block| block.owner_id == owner_id)
            .cloned())
    }

    fn list_blocks(&self, owner_id: &str, range: DateRange) -> Result<Vec<ScheduledBlock>, TrackerError> {
        let state = self.lock()?;
        let mut blocks = state
            .blocks
            .values()
            .filter(|block| block.owner_id == owner_id && range.contains(block.date))
            .cloned()
            .collect::<Vec<_>>();
        blocks.sort_by(|left, right| {
            (left.date, &left.start_time, &left.id).cmp(&(right.date, &right.start_time, &right.id))
        });
        Ok(blocks)
    }

    fn delete_block(&self, owner_id: &str, block_id: &str) -> Result<bool, TrackerError> {
        let mut state = self.lock()?;
        let owned = state
            .blocks
            .get(block_id)
            .is_some_and(|block| block.owner_id == owner_id);
        if !owned {
            return Ok(false);
        }
        state.blocks.remove(block_id);
        state.validations.remove(block_id);
        Ok(true)
    }
}

impl ValidationRepository for InMemoryTrackerStore {
    fn upsert_validation(&self, validation: &BlockValidation) -> Result<(), TrackerError> {
        let mut state = self.lock()?;
        if !state.blocks.contains_key(&validation.block_id) {
            return Err(TrackerError::not_found("block", validation.block_id.as_str()));
        }
        state
            .validations
            .insert(validation.block_id.clone(), validation.clone());
        Ok(())
    }

    fn get_validation(&self, owner_id: &str, block_id: &str) -> Result<Option<BlockValidation>, TrackerError> {
        let state = self.lock()?;
        Ok(state
            .validations
            .get(block_id)
            .filter(|validation| validation.owner_id == owner_id)
            .cloned())
    }

    fn list_validations(&self, owner_id: &str, range: DateRange) -> Result<Vec<BlockValidation>, TrackerError> {
        let state = self.lock()?;
        let mut dated = state
            .validations
            .values()
            .filter(|validation| validation.owner_id == owner_id)
            .filter_map(|validation| {
                state
                    .blocks
                    .get(&validation.block_id)
                    .filter(|block| range.contains(block.date))
                    .map(|block| ((block.date, block.start_time.clone()), validation.clone()))
            })
            .collect::<Vec<_>>();
        dated.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(dated.into_iter().map(|(_, validation)| validation).collect())
    }
}

impl RuleRepository for InMemoryTrackerStore {
    fn upsert_rest_rule(&self, rule: &RestRule) -> Result<(), TrackerError> {
        let mut state = self.lock()?;
        match state.rest_rules.iter().position(|existing| existing.id == rule.id) {
            Some(index) if state.rest_rules[index].owner_id != rule.owner_id => {
                Err(TrackerError::Conflict(format!(
                    "rest rule id {} belongs to another owner",
                    rule.id
                )))
            }
            Some(index) => {
                state.rest_rules[index] = rule.clone();
                Ok(())
            }
            None => {
                state.rest_rules.push(rule.clone());
                Ok(())
            }
        }
    }

    fn delete_rest_rule(&self, owner_id: &str, rule_id: &str) -> Result<bool, TrackerError> {
        let mut state = self.lock()?;
        let before = state.rest_rules.len();
        state
            .rest_rules
            .retain(|rule| !(rule.owner_id == owner_id && rule.id == rule_id));
        Ok(state.rest_rules.len() < before)
    }

    fn list_rest_rules(&self, owner_id: &str) -> Result<Vec<RestRule>, TrackerError> {
        let state = self.lock()?;
        Ok(state
            .rest_rules
            .iter()
            .filter(|rule| rule.owner_id == owner_id)
            .cloned()
            .collect())
    }

    fn upsert_usage_limit(&self, limit: &UsageLimit) -> Result<UsageLimit, TrackerError> {
        let mut state = self.lock()?;
        let stored = match state
            .usage_limits
            .iter()
            .position(|existing| existing.owner_id == limit.owner_id && existing.category_id == limit.category_id)
        {
            Some(index) => {
                let id = state.usage_limits[index].id.clone();
                state.usage_limits[index] = UsageLimit { id, ..limit.clone() };
                state.usage_limits[index].clone()
            }
            None => {
                state.usage_limits.push(limit.clone());
                limit.clone()
            }
        };
        Ok(stored)
    }

    fn delete_usage_limit(&self, owner_id: &str, category_id: &str) -> Result<bool, TrackerError> {
        let mut state = self.lock()?;
        let before = state.usage_limits.len();
        state
            .usage_limits
            .retain(|limit| !(limit.owner_id == owner_id && limit.category_id == category_id));
        Ok(state.usage_limits.len() < before)
    }

    fn get_usage_limit(&self, owner_id: &str, category_id: &str) -> Result<Option<UsageLimit>, TrackerError> {
        let state = self.lock()?;
        Ok(state
            .usage_limits
            .iter()
            .find(|limit| limit.owner_id == owner_id && limit.category_id == category_id)
            .cloned())
    }

    fn list_usage_limits(&self, owner_id: &str) -> Result<Vec<UsageLimit>, TrackerError> {
        let state = self.lock()?;
        let mut limits = state
            .usage_limits
            .iter()
            .filter(|limit| limit.owner_id == owner_id)
            .cloned()
            .collect::<Vec<_>>();
        limits.sort_by(|left, right| left.category_id.cmp(&right.category_id));
        Ok(limits)
    }
}

impl ViolationRepository for InMemoryTrackerStore {
    fn append_violations(&self, violations: &[RoutineViolation]) -> Result<(), TrackerError> {
        let mut state = self.lock()?;
        if let Some(duplicate) = violations
            .iter()
            .find(|violation| state.violations.iter().any(|existing| existing.id == violation.id))
        {
            return Err(TrackerError::Conflict(format!(
                "violation id {} already exists",
                duplicate.id
            )));
        }
        state.violations.extend_from_slice(violations);
        Ok(())
    }

    fn list_violations(
        &self,
        owner_id: &str,
        range: DateRange,
        include_acknowledged: bool,
    ) -> Result<Vec<RoutineViolation>, TrackerError> {
        let state = self.lock()?;
        let mut violations = state
            .violations
            .iter()
            .filter(|violation| violation.owner_id == owner_id && range.contains(violation.date))
            .filter(|violation| include_acknowledged || !violation.acknowledged)
            .cloned()
            .collect::<Vec<_>>();
        violations.sort_by_key(|violation| violation.date);
        Ok(violations)
    }

    fn acknowledge_violation(
        &self,
        owner_id: &str,
        violation_id: &str,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<Option<RoutineViolation>, TrackerError> {
        let mut state = self.lock()?;
        let Some(violation) = state
            .violations
            .iter_mut()
            .find(|violation| violation.owner_id == owner_id && violation.id == violation_id)
        else {
            return Ok(None);
        };
        violation.acknowledged = true;
        violation.acknowledged_at.get_or_insert(acknowledged_at);
        Ok(Some(violation.clone()))
    }
}

impl GoalRepository for InMemoryTrackerStore {
    fn upsert_goal(&self, goal: &Goal) -> Result<Goal, TrackerError> {
        let mut state = self.lock()?;
        let stored = match state.goals.iter().position(|existing| {
            existing.owner_id == goal.owner_id
                && existing.category_id == goal.category_id
                && existing.period == goal.period
        }) {
            Some(index) => {
                let existing = &mut state.goals[index];
                existing.target_hours = goal.target_hours;
                existing.goal_type = goal.goal_type;
                existing.clone()
            }
            None => {
                state.goals.push(goal.clone());
                goal.clone()
            }
        };
        Ok(stored)
    }

    fn delete_goal(&self, owner_id: &str, goal_id: &str) -> Result<bool, TrackerError> {
        let mut state = self.lock()?;
        let before = state.goals.len();
        state
            .goals
            .retain(|goal| !(goal.owner_id == owner_id && goal.id == goal_id));
        Ok(state.goals.len() < before)
    }

    fn list_goals(&self, owner_id: &str, period: GoalPeriod) -> Result<Vec<Goal>, TrackerError> {
        let state = self.lock()?;
        let mut goals = state
            .goals
            .iter()
            .filter(|goal| goal.owner_id == owner_id && goal.period == period)
            .cloned()
            .collect::<Vec<_>>();
        goals.sort_by(|left, right| left.category_id.cmp(&right.category_id));
        Ok(goals)
    }
}

impl TemplateRepository for InMemoryTrackerStore {
    fn insert_template_block(&self, block: &TemplateBlock) -> Result<(), TrackerError> {
        let mut state = self.lock()?;
        if state.template_blocks.iter().any(|existing| existing.id == block.id) {
            return Err(TrackerError::Conflict(format!(
                "template block id {} already exists",
                block.id
            )));
        }
        state.template_blocks.push(block.clone());
        Ok(())
    }

    fn delete_template_block(&self, owner_id: &str, template_block_id: &str) -> Result<bool, TrackerError> {
        let mut state = self.lock()?;
        let before = state.template_blocks.len();
        state
            .template_blocks
            .retain(|block| !(block.owner_id == owner_id && block.id == template_block_id));
        Ok(state.template_blocks.len() < before)
    }

    fn list_template_blocks(&self, owner_id: &str, day_of_week: Weekday) -> Result<Vec<TemplateBlock>, TrackerError> {
        let state = self.lock()?;
        let mut blocks = state
            .template_blocks
            .iter()
            .filter(|block| block.owner_id == owner_id && block.day_of_week == day_of_week)
            .cloned()
            .collect::<Vec<_>>();
        blocks.sort_by(|left, right| (&left.start_time, &left.id).cmp(&(&right.start_time, &right.id)));
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Severity, ValidationStatus, ViolationType};
    use chrono::NaiveDate;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn block(id: &str, owner_id: &str, start: &str) -> ScheduledBlock {
        ScheduledBlock {
            id: id.to_string(),
            owner_id: owner_id.to_string(),
            category_id: "cat-study".to_string(),
            date: date("2026-02-16"),
            start_time: start.to_string(),
            end_time: "23:00".to_string(),
            title: None,
            notes: None,
            is_flexible: false,
            priority: 5,
            crosses_midnight: false,
            created_at: fixed_time("2026-02-16T08:00:00Z"),
        }
    }

    #[test]
    fn records_of_other_owners_are_invisible() {
        let store = InMemoryTrackerStore::default();
        let stored = block("blk-1", "user-1", "09:00");
        store
            .insert_block(&stored, &BlockValidation::pending(&stored))
            .expect("insert block");

        assert_eq!(store.get_block("user-2", "blk-1").expect("get"), None);
        assert_eq!(store.get_validation("user-2", "blk-1").expect("get"), None);
        assert!(!store.delete_block("user-2", "blk-1").expect("delete"));
        assert!(store.get_block("user-1", "blk-1").expect("get").is_some());
    }

    #[test]
    fn delete_block_removes_its_validation() {
        let store = InMemoryTrackerStore::default();
        let stored = block("blk-1", "user-1", "09:00");
        store
            .insert_block(&stored, &BlockValidation::pending(&stored))
            .expect("insert block");
        assert!(store.delete_block("user-1", "blk-1").expect("delete"));
        assert_eq!(store.get_validation("user-1", "blk-1").expect("get"), None);

        let mut orphan = BlockValidation::pending(&stored);
        orphan.status = ValidationStatus::Completed;
        assert!(matches!(
            store.upsert_validation(&orphan),
            Err(TrackerError::NotFound { entity: "block", .. })
        ));
    }

    #[test]
    fn update_keeps_creation_time() {
        let store = InMemoryTrackerStore::default();
        let stored = block("blk-1", "user-1", "09:00");
        store
            .insert_block(&stored, &BlockValidation::pending(&stored))
            .expect("insert block");

        let mut edited = block("blk-1", "user-1", "10:00");
        edited.created_at = fixed_time("2030-01-01T00:00:00Z");
        store.update_block(&edited).expect("update block");

        let loaded = store.get_block("user-1", "blk-1").expect("get").expect("exists");
        assert_eq!(loaded.start_time, "10:00");
        assert_eq!(loaded.created_at, stored.created_at);
        assert!(matches!(
            store.update_block(&block("blk-1", "user-2", "11:00")),
            Err(TrackerError::NotFound { .. })
        ));
    }

    #[test]
    fn acknowledging_keeps_the_first_timestamp() {
        let store = InMemoryTrackerStore::default();
        let violation = RoutineViolation {
            id: "vio-1".to_string(),
            owner_id: "user-1".to_string(),
            block_id: None,
            date: date("2026-02-16"),
            violation_type: ViolationType::RestSkipped,
            category_id: "cat-study".to_string(),
            description: "no rest".to_string(),
            severity: Severity::Warning,
            acknowledged: false,
            acknowledged_at: None,
            created_at: fixed_time("2026-02-16T09:00:00Z"),
        };
        store.append_violations(&[violation.clone()]).expect("append");
        assert!(matches!(
            store.append_violations(&[violation]),
            Err(TrackerError::Conflict(_))
        ));

        let first = fixed_time("2026-02-16T12:00:00Z");
        store.acknowledge_violation("user-1", "vio-1", first).expect("ack");
        let again = store
            .acknowledge_violation("user-1", "vio-1", fixed_time("2026-02-18T12:00:00Z"))
            .expect("ack")
            .expect("exists");
        assert_eq!(again.acknowledged_at, Some(first));
        assert_eq!(store.acknowledge_violation("user-2", "vio-1", first).expect("ack"), None);
    }
}
