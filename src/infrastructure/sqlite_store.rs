use crate::domain::models::{
    BlockValidation, Category, DateRange, Goal, GoalPeriod, GoalType, RestRule, RoutineViolation,
    ScheduledBlock, Severity, TemplateBlock, UsageLimit, ValidationStatus, ViolationType,
};
use crate::infrastructure::error::TrackerError;
use crate::infrastructure::repository::{
    BlockRepository, CategoryRepository, GoalRepository, RuleRepository, TemplateRepository,
    ValidationRepository, ViolationRepository,
};
use crate::infrastructure::storage::open_connection;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

const BLOCK_COLUMNS: &str = "id, owner_id, category_id, block_date, start_time, end_time, title, notes,
     is_flexible, priority, crosses_midnight, created_at";
const VALIDATION_COLUMNS: &str = "v.block_id, v.owner_id, v.status, v.actual_start_time, v.actual_end_time,
     v.actual_duration_minutes, v.completion_percentage, v.omission_reason_id, v.notes, v.validated_at";
const REST_RULE_COLUMNS: &str = "id, owner_id, category_id, trigger_duration_minutes, rest_duration_minutes,
     rest_category_id, is_mandatory, is_active";
const USAGE_LIMIT_COLUMNS: &str = "id, owner_id, category_id, max_continuous_minutes, max_daily_hours,
     max_weekly_hours, is_active";
const VIOLATION_COLUMNS: &str = "id, owner_id, block_id, violation_date, violation_type, category_id,
     description, severity, acknowledged, acknowledged_at, created_at";
const GOAL_COLUMNS: &str =
    "id, owner_id, category_id, period_kind, period_year, period_number, target_hours, goal_type";
const TEMPLATE_COLUMNS: &str =
    "id, owner_id, category_id, day_of_week, start_time, end_time, title, is_flexible, priority";

#[derive(Debug, Clone)]
pub struct SqliteTrackerStore {
    db_path: PathBuf,
}

impl SqliteTrackerStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, TrackerError> {
        open_connection(&self.db_path)
    }
}

impl CategoryRepository for SqliteTrackerStore {
    fn upsert_category(&self, category: &Category) -> Result<(), TrackerError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "INSERT INTO categories (id, owner_id, name, requires_rest, is_rest)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               requires_rest = excluded.requires_rest,
               is_rest = excluded.is_rest
             WHERE categories.owner_id = excluded.owner_id",
            params![
                category.id,
                category.owner_id,
                category.name,
                category.requires_rest,
                category.is_rest
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::Conflict(format!(
                "category id {} belongs to another owner",
                category.id
            )));
        }
        Ok(())
    }

    fn get_category(&self, owner_id: &str, category_id: &str) -> Result<Option<Category>, TrackerError> {
        let connection = self.connect()?;
        connection
            .query_row(
                "SELECT id, owner_id, name, requires_rest, is_rest
                 FROM categories WHERE owner_id = ?1 AND id = ?2",
                params![owner_id, category_id],
                read_category,
            )
            .optional()
            .map_err(TrackerError::from)
    }

    fn list_categories(&self, owner_id: &str) -> Result<Vec<Category>, TrackerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, owner_id, name, requires_rest, is_rest
             FROM categories WHERE owner_id = ?1 ORDER BY name, id",
        )?;
        let rows = statement.query_map(params![owner_id], read_category)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(TrackerError::from)
    }
}

impl BlockRepository for SqliteTrackerStore {
    fn insert_block(&self, block: &ScheduledBlock, validation: &BlockValidation) -> Result<(), TrackerError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        transaction.execute(
            "INSERT INTO scheduled_blocks (
               id, owner_id, category_id, block_date, start_time, end_time, title, notes,
               is_flexible, priority, crosses_midnight, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                block.id,
                block.owner_id,
                block.category_id,
                block.date.format(DATE_FORMAT).to_string(),
                block.start_time,
                block.end_time,
                block.title,
                block.notes,
                block.is_flexible,
                block.priority,
                block.crosses_midnight,
                block.created_at.to_rfc3339()
            ],
        )?;
        write_validation(&transaction, validation)?;
        transaction.commit()?;
        Ok(())
    }

    fn update_block(&self, block: &ScheduledBlock) -> Result<(), TrackerError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE scheduled_blocks SET
               category_id = ?3,
               block_date = ?4,
               start_time = ?5,
               end_time = ?6,
               title = ?7,
               notes = ?8,
               is_flexible = ?9,
               priority = ?10,
               crosses_midnight = ?11
             WHERE owner_id = ?1 AND id = ?2",
            params![
                block.owner_id,
                block.id,
                block.category_id,
                block.date.format(DATE_FORMAT).to_string(),
                block.start_time,
                block.end_time,
                block.title,
                block.notes,
                block.is_flexible,
                block.priority,
                block.crosses_midnight
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::not_found("block", block.id.as_str()));
        }
        Ok(())
    }

    fn get_block(&self, owner_id: &str, block_id: &str) -> Result<Option<ScheduledBlock>, TrackerError> {
        let connection = self.connect()?;
        connection
            .query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM scheduled_blocks WHERE owner_id = ?1 AND id = ?2"),
                params![owner_id, block_id],
                read_block,
            )
            .optional()
            .map_err(TrackerError::from)
    }

    fn list_blocks(&self, owner_id: &str, range: DateRange) -> Result<Vec<ScheduledBlock>, TrackerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {BLOCK_COLUMNS} FROM scheduled_blocks
             WHERE owner_id = ?1 AND block_date BETWEEN ?2 AND ?3
             ORDER BY block_date, start_time, id"
        ))?;
        let rows = statement.query_map(
            params![
                owner_id,
                range.start.format(DATE_FORMAT).to_string(),
                range.end.format(DATE_FORMAT).to_string()
            ],
            read_block,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(TrackerError::from)
    }

    fn delete_block(&self, owner_id: &str, block_id: &str) -> Result<bool, TrackerError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "DELETE FROM scheduled_blocks WHERE owner_id = ?1 AND id = ?2",
            params![owner_id, block_id],
        )?;
        Ok(changed > 0)
    }
}

impl ValidationRepository for SqliteTrackerStore {
    fn upsert_validation(&self, validation: &BlockValidation) -> Result<(), TrackerError> {
        let connection = self.connect()?;
        write_validation(&connection, validation)
    }

    fn get_validation(&self, owner_id: &str, block_id: &str) -> Result<Option<BlockValidation>, TrackerError> {
        let connection = self.connect()?;
        connection
            .query_row(
                &format!(
                    "SELECT {VALIDATION_COLUMNS} FROM block_validations v
                     WHERE v.owner_id = ?1 AND v.block_id = ?2"
                ),
                params![owner_id, block_id],
                read_validation,
            )
            .optional()
            .map_err(TrackerError::from)
    }

    fn list_validations(&self, owner_id: &str, range: DateRange) -> Result<Vec<BlockValidation>, TrackerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {VALIDATION_COLUMNS} FROM block_validations v
             JOIN scheduled_blocks b ON b.id = v.block_id
             WHERE v.owner_id = ?1 AND b.block_date BETWEEN ?2 AND ?3
             ORDER BY b.block_date, b.start_time, b.id"
        ))?;
        let rows = statement.query_map(
            params![
                owner_id,
                range.start.format(DATE_FORMAT).to_string(),
                range.end.format(DATE_FORMAT).to_string()
            ],
            read_validation,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(TrackerError::from)
    }
}

impl RuleRepository for SqliteTrackerStore {
    fn upsert_rest_rule(&self, rule: &RestRule) -> Result<(), TrackerError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "INSERT INTO rest_rules (
               id, owner_id, category_id, trigger_duration_minutes, rest_duration_minutes,
               rest_category_id, is_mandatory, is_active, position
             ) VALUES (
               ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
               (SELECT COALESCE(MAX(position), 0) + 1 FROM rest_rules WHERE owner_id = ?2)
             )
             ON CONFLICT(id) DO UPDATE SET
               category_id = excluded.category_id,
               trigger_duration_minutes = excluded.trigger_duration_minutes,
               rest_duration_minutes = excluded.rest_duration_minutes,
               rest_category_id = excluded.rest_category_id,
               is_mandatory = excluded.is_mandatory,
               is_active = excluded.is_active
             WHERE rest_rules.owner_id = excluded.owner_id",
            params![
                rule.id,
                rule.owner_id,
                rule.category_id,
                rule.trigger_duration_minutes,
                rule.rest_duration_minutes,
                rule.rest_category_id,
                rule.is_mandatory,
                rule.is_active
            ],
        )?;
        if changed == 0 {
            return Err(TrackerError::Conflict(format!(
                "rest rule id {} belongs to another owner",
                rule.id
            )));
        }
        Ok(())
    }

    fn delete_rest_rule(&self, owner_id: &str, rule_id: &str) -> Result<bool, TrackerError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "DELETE FROM rest_rules WHERE owner_id = ?1 AND id = ?2",
            params![owner_id, rule_id],
        )?;
        Ok(changed > 0)
    }

    fn list_rest_rules(&self, owner_id: &str) -> Result<Vec<RestRule>, TrackerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {REST_RULE_COLUMNS} FROM rest_rules WHERE owner_id = ?1 ORDER BY position"
        ))?;
        let rows = statement.query_map(params![owner_id], read_rest_rule)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(TrackerError::from)
    }

    fn upsert_usage_limit(&self, limit: &UsageLimit) -> Result<UsageLimit, TrackerError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO usage_limits (
               id, owner_id, category_id, max_continuous_minutes, max_daily_hours,
               max_weekly_hours, is_active
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(owner_id, category_id) DO UPDATE SET
               max_continuous_minutes = excluded.max_continuous_minutes,
               max_daily_hours = excluded.max_daily_hours,
               max_weekly_hours = excluded.max_weekly_hours,
               is_active = excluded.is_active",
            params![
                limit.id,
                limit.owner_id,
                limit.category_id,
                limit.max_continuous_minutes,
                limit.max_daily_hours,
                limit.max_weekly_hours,
                limit.is_active
            ],
        )?;
        select_usage_limit(&connection, &limit.owner_id, &limit.category_id)?
            .ok_or_else(|| TrackerError::not_found("usage limit", limit.category_id.as_str()))
    }

    fn delete_usage_limit(&self, owner_id: &str, category_id: &str) -> Result<bool, TrackerError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "DELETE FROM usage_limits WHERE owner_id = ?1 AND category_id = ?2",
            params![owner_id, category_id],
        )?;
        Ok(changed > 0)
    }

    fn get_usage_limit(&self, owner_id: &str, category_id: &str) -> Result<Option<UsageLimit>, TrackerError> {
        let connection = self.connect()?;
        select_usage_limit(&connection, owner_id, category_id)
    }

    fn list_usage_limits(&self, owner_id: &str) -> Result<Vec<UsageLimit>, TrackerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {USAGE_LIMIT_COLUMNS} FROM usage_limits WHERE owner_id = ?1 ORDER BY category_id"
        ))?;
        let rows = statement.query_map(params![owner_id], read_usage_limit)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(TrackerError::from)
    }
}

impl ViolationRepository for SqliteTrackerStore {
    fn append_violations(&self, violations: &[RoutineViolation]) -> Result<(), TrackerError> {
        if violations.is_empty() {
            return Ok(());
        }
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        {
            let mut statement = transaction.prepare(
                "INSERT INTO routine_violations (
                   id, owner_id, block_id, violation_date, violation_type, category_id,
                   description, severity, acknowledged, acknowledged_at, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for violation in violations {
                statement.execute(params![
                    violation.id,
                    violation.owner_id,
                    violation.block_id,
                    violation.date.format(DATE_FORMAT).to_string(),
                    violation.violation_type.as_str(),
                    violation.category_id,
                    violation.description,
                    violation.severity.as_str(),
                    violation.acknowledged,
                    violation.acknowledged_at.map(|value| value.to_rfc3339()),
                    violation.created_at.to_rfc3339()
                ])?;
            }
        }
        transaction.commit()?;
        Ok(())
    }

    fn list_violations(
        &self,
        owner_id: &str,
        range: DateRange,
        include_acknowledged: bool,
    ) -> Result<Vec<RoutineViolation>, TrackerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {VIOLATION_COLUMNS} FROM routine_violations
             WHERE owner_id = ?1 AND violation_date BETWEEN ?2 AND ?3
               AND (?4 OR acknowledged = 0)
             ORDER BY violation_date, rowid"
        ))?;
        let rows = statement.query_map(
            params![
                owner_id,
                range.start.format(DATE_FORMAT).to_string(),
                range.end.format(DATE_FORMAT).to_string(),
                include_acknowledged
            ],
            read_violation,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(TrackerError::from)
    }

    fn acknowledge_violation(
        &self,
        owner_id: &str,
        violation_id: &str,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<Option<RoutineViolation>, TrackerError> {
        let connection = self.connect()?;
        connection.execute(
            "UPDATE routine_violations SET
               acknowledged = 1,
               acknowledged_at = COALESCE(acknowledged_at, ?3)
             WHERE owner_id = ?1 AND id = ?2",
            params![owner_id, violation_id, acknowledged_at.to_rfc3339()],
        )?;
        connection
            .query_row(
                &format!("SELECT {VIOLATION_COLUMNS} FROM routine_violations WHERE owner_id = ?1 AND id = ?2"),
                params![owner_id, violation_id],
                read_violation,
            )
            .optional()
            .map_err(TrackerError::from)
    }
}

impl GoalRepository for SqliteTrackerStore {
    fn upsert_goal(&self, goal: &Goal) -> Result<Goal, TrackerError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO goals (
               id, owner_id, category_id, period_kind, period_year, period_number, target_hours, goal_type
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(owner_id, category_id, period_kind, period_year, period_number) DO UPDATE SET
               target_hours = excluded.target_hours,
               goal_type = excluded.goal_type",
            params![
                goal.id,
                goal.owner_id,
                goal.category_id,
                goal.period.kind(),
                goal.period.year(),
                goal.period.number(),
                goal.target_hours,
                goal.goal_type.as_str()
            ],
        )?;
        connection
            .query_row(
                &format!(
                    "SELECT {GOAL_COLUMNS} FROM goals
                     WHERE owner_id = ?1 AND category_id = ?2
                       AND period_kind = ?3 AND period_year = ?4 AND period_number = ?5"
                ),
                params![
                    goal.owner_id,
                    goal.category_id,
                    goal.period.kind(),
                    goal.period.year(),
                    goal.period.number()
                ],
                read_goal,
            )
            .optional()?
            .ok_or_else(|| TrackerError::not_found("goal", goal.id.as_str()))
    }

    fn delete_goal(&self, owner_id: &str, goal_id: &str) -> Result<bool, TrackerError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "DELETE FROM goals WHERE owner_id = ?1 AND id = ?2",
            params![owner_id, goal_id],
        )?;
        Ok(changed > 0)
    }

    fn list_goals(&self, owner_id: &str, period: GoalPeriod) -> Result<Vec<Goal>, TrackerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals
             WHERE owner_id = ?1 AND period_kind = ?2 AND period_year = ?3 AND period_number = ?4
             ORDER BY category_id"
        ))?;
        let rows = statement.query_map(
            params![owner_id, period.kind(), period.year(), period.number()],
            read_goal,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(TrackerError::from)
    }
}

impl TemplateRepository for SqliteTrackerStore {
    fn insert_template_block(&self, block: &TemplateBlock) -> Result<(), TrackerError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO template_blocks (
               id, owner_id, category_id, day_of_week, start_time, end_time, title, is_flexible, priority
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                block.id,
                block.owner_id,
                block.category_id,
                block.day_of_week.num_days_from_monday(),
                block.start_time,
                block.end_time,
                block.title,
                block.is_flexible,
                block.priority
            ],
        )?;
        Ok(())
    }

    fn delete_template_block(&self, owner_id: &str, template_block_id: &str) -> Result<bool, TrackerError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "DELETE FROM template_blocks WHERE owner_id = ?1 AND id = ?2",
            params![owner_id, template_block_id],
        )?;
        Ok(changed > 0)
    }

    fn list_template_blocks(&self, owner_id: &str, day_of_week: Weekday) -> Result<Vec<TemplateBlock>, TrackerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM template_blocks
             WHERE owner_id = ?1 AND day_of_week = ?2
             ORDER BY start_time, id"
        ))?;
        let rows = statement.query_map(
            params![owner_id, day_of_week.num_days_from_monday()],
            read_template_block,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(TrackerError::from)
    }
}

fn write_validation(connection: &Connection, validation: &BlockValidation) -> Result<(), TrackerError> {
    connection.execute(
        "INSERT INTO block_validations (
           block_id, owner_id, status, actual_start_time, actual_end_time, actual_duration_minutes,
           completion_percentage, omission_reason_id, notes, validated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(block_id) DO UPDATE SET
           status = excluded.status,
           actual_start_time = excluded.actual_start_time,
           actual_end_time = excluded.actual_end_time,
           actual_duration_minutes = excluded.actual_duration_minutes,
           completion_percentage = excluded.completion_percentage,
           omission_reason_id = excluded.omission_reason_id,
           notes = excluded.notes,
           validated_at = excluded.validated_at",
        params![
            validation.block_id,
            validation.owner_id,
            validation.status.as_str(),
            validation.actual_start_time,
            validation.actual_end_time,
            validation.actual_duration_minutes,
            validation.completion_percentage,
            validation.omission_reason_id,
            validation.notes,
            validation.validated_at.map(|value| value.to_rfc3339())
        ],
    )?;
    Ok(())
}

fn select_usage_limit(
    connection: &Connection,
    owner_id: &str,
    category_id: &str,
) -> Result<Option<UsageLimit>, TrackerError> {
    connection
        .query_row(
            &format!("SELECT {USAGE_LIMIT_COLUMNS} FROM usage_limits WHERE owner_id = ?1 AND category_id = ?2"),
            params![owner_id, category_id],
            read_usage_limit,
        )
        .optional()
        .map_err(TrackerError::from)
}

fn read_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        requires_rest: row.get(3)?,
        is_rest: row.get(4)?,
    })
}

fn read_block(row: &Row<'_>) -> rusqlite::Result<ScheduledBlock> {
    Ok(ScheduledBlock {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        category_id: row.get(2)?,
        date: parsed_column(row, 3, parse_date)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        title: row.get(6)?,
        notes: row.get(7)?,
        is_flexible: row.get(8)?,
        priority: row.get(9)?,
        crosses_midnight: row.get(10)?,
        created_at: parsed_column(row, 11, parse_timestamp)?,
    })
}

fn read_validation(row: &Row<'_>) -> rusqlite::Result<BlockValidation> {
    Ok(BlockValidation {
        block_id: row.get(0)?,
        owner_id: row.get(1)?,
        status: parsed_column(row, 2, |raw| raw.parse::<ValidationStatus>().ok())?,
        actual_start_time: row.get(3)?,
        actual_end_time: row.get(4)?,
        actual_duration_minutes: row.get(5)?,
        completion_percentage: row.get(6)?,
        omission_reason_id: row.get(7)?,
        notes: row.get(8)?,
        validated_at: optional_parsed_column(row, 9, parse_timestamp)?,
    })
}

fn read_rest_rule(row: &Row<'_>) -> rusqlite::Result<RestRule> {
    Ok(RestRule {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        category_id: row.get(2)?,
        trigger_duration_minutes: row.get(3)?,
        rest_duration_minutes: row.get(4)?,
        rest_category_id: row.get(5)?,
        is_mandatory: row.get(6)?,
        is_active: row.get(7)?,
    })
}

fn read_usage_limit(row: &Row<'_>) -> rusqlite::Result<UsageLimit> {
    Ok(UsageLimit {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        category_id: row.get(2)?,
        max_continuous_minutes: row.get(3)?,
        max_daily_hours: row.get(4)?,
        max_weekly_hours: row.get(5)?,
        is_active: row.get(6)?,
    })
}

fn read_violation(row: &Row<'_>) -> rusqlite::Result<RoutineViolation> {
    Ok(RoutineViolation {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        block_id: row.get(2)?,
        date: parsed_column(row, 3, parse_date)?,
        violation_type: ViolationType::from(row.get::<_, String>(4)?),
        category_id: row.get(5)?,
        description: row.get(6)?,
        severity: parsed_column(row, 7, |raw| raw.parse::<Severity>().ok())?,
        acknowledged: row.get(8)?,
        acknowledged_at: optional_parsed_column(row, 9, parse_timestamp)?,
        created_at: parsed_column(row, 10, parse_timestamp)?,
    })
}

fn read_goal(row: &Row<'_>) -> rusqlite::Result<Goal> {
    let kind: String = row.get(3)?;
    let year: i32 = row.get(4)?;
    let number: u32 = row.get(5)?;
    let period = GoalPeriod::from_parts(&kind, year, number).map_err(|message| conversion_error(3, message))?;
    Ok(Goal {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        category_id: row.get(2)?,
        period,
        target_hours: row.get(6)?,
        goal_type: parsed_column(row, 7, |raw| raw.parse::<GoalType>().ok())?,
    })
}

fn read_template_block(row: &Row<'_>) -> rusqlite::Result<TemplateBlock> {
    let day_index: u32 = row.get(3)?;
    let day_of_week = weekday_from_index(day_index)
        .ok_or_else(|| conversion_error(3, format!("invalid day_of_week {day_index}")))?;
    Ok(TemplateBlock {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        category_id: row.get(2)?,
        day_of_week,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        title: row.get(6)?,
        is_flexible: row.get(7)?,
        priority: row.get(8)?,
    })
}

fn parsed_column<T>(row: &Row<'_>, index: usize, parse: impl FnOnce(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    parse(&raw).ok_or_else(|| conversion_error(index, format!("invalid value '{raw}'")))
}

fn optional_parsed_column<T>(
    row: &Row<'_>,
    index: usize,
    parse: impl FnOnce(&str) -> Option<T>,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(index)?;
    match raw {
        Some(raw) => parse(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(index, format!("invalid value '{raw}'"))),
        None => Ok(None),
    }
}

fn conversion_error(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

fn weekday_from_index(index: u32) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}
