//! timeledger CLI: plan blocks, report outcomes and check rules from the shell.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use timeledger_engine::application::blocks::{
    add_template_block_impl, apply_template_impl, create_block_impl, delete_block_impl,
    delete_template_block_impl, list_blocks_impl, list_categories_impl, list_template_blocks_impl,
    update_block_impl, upsert_category_impl, BlockInput, TemplateBlockInput,
};
use timeledger_engine::application::bootstrap::bootstrap_workspace;
use timeledger_engine::application::compliance::{
    acknowledge_violation_impl, check_candidate_impl, delete_rest_rule_impl,
    delete_usage_limit_impl, list_rest_rules_impl, list_usage_limits_impl, list_violations_impl,
    upsert_rest_rule_impl, upsert_usage_limit_impl, RestRuleInput, UsageLimitInput,
};
use timeledger_engine::application::goals::{
    delete_goal_impl, goal_progress_impl, upsert_goal_impl, GoalInput,
};
use timeledger_engine::application::validation::{
    pending_validations_impl, validate_block_impl, validation_stats_impl,
};
use timeledger_engine::domain::models::{
    parse_date, parse_weekday, DateRange, GoalPeriod, GoalType, PriorityLevel, ValidationStatus,
};
use timeledger_engine::domain::validation::ValidationReport;
use timeledger_engine::{AppState, TrackerError};

#[derive(Parser)]
#[command(name = "timeledger", version, about = "Time-investment scheduling and compliance engine")]
struct Cli {
    /// Workspace directory holding config/ and state/.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Owner whose records are read and written.
    #[arg(long, global = true, default_value = "local")]
    owner: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create config and database files in the workspace.
    Bootstrap,

    /// Manage categories.
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },

    /// Manage scheduled blocks.
    Block {
        #[command(subcommand)]
        action: BlockAction,
    },

    /// Evaluate usage limits and rest rules for an unsaved block.
    Check {
        #[arg(long, value_parser = date_arg)]
        date: NaiveDate,
        #[arg(long)]
        category: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },

    /// Report the outcome of a block.
    Validate {
        block_id: String,
        /// completed, partial or omitted.
        #[arg(long)]
        status: ValidationStatus,
        #[arg(long)]
        actual_start: Option<String>,
        #[arg(long)]
        actual_end: Option<String>,
        #[arg(long)]
        completion: Option<u8>,
        #[arg(long)]
        omission_reason: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Blocks of a date still waiting for a report (defaults to today).
    Pending {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,
    },

    /// Validation counts over a date range.
    Stats {
        #[arg(long, value_parser = date_arg)]
        from: NaiveDate,
        #[arg(long, value_parser = date_arg)]
        to: NaiveDate,
    },

    /// List recorded violations.
    Violations {
        #[arg(long, value_parser = date_arg)]
        from: NaiveDate,
        #[arg(long, value_parser = date_arg)]
        to: NaiveDate,
        /// Include acknowledged violations.
        #[arg(long)]
        all: bool,
    },

    /// Acknowledge a violation.
    Ack { violation_id: String },

    /// Manage usage limits.
    Limit {
        #[command(subcommand)]
        action: LimitAction,
    },

    /// Manage rest rules.
    RestRule {
        #[command(subcommand)]
        action: RestRuleAction,
    },

    /// Manage goals.
    Goal {
        #[command(subcommand)]
        action: GoalAction,
    },

    /// Manage weekday templates.
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// Create or rename a category.
    Add {
        name: String,
        #[arg(long)]
        id: Option<String>,
        /// Long sessions must be followed by rest.
        #[arg(long)]
        requires_rest: bool,
        /// Blocks of this category count as rest.
        #[arg(long)]
        is_rest: bool,
    },
    List,
}

#[derive(Args)]
struct BlockFields {
    #[arg(long)]
    category: String,
    #[arg(long, value_parser = date_arg)]
    date: NaiveDate,
    #[arg(long)]
    start: String,
    #[arg(long)]
    end: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    flexible: bool,
    /// low, medium, high, critical or 1-10.
    #[arg(long, value_parser = priority_arg)]
    priority: Option<u8>,
}

impl From<BlockFields> for BlockInput {
    fn from(fields: BlockFields) -> Self {
        Self {
            category_id: fields.category,
            date: fields.date,
            start_time: fields.start,
            end_time: fields.end,
            title: fields.title,
            notes: fields.notes,
            is_flexible: fields.flexible,
            priority: fields.priority,
        }
    }
}

#[derive(Subcommand)]
enum BlockAction {
    Add(BlockFields),
    Update {
        id: String,
        #[command(flatten)]
        fields: BlockFields,
    },
    List {
        #[arg(long, value_parser = date_arg)]
        date: NaiveDate,
        /// Last date of the range; defaults to `date`.
        #[arg(long, value_parser = date_arg)]
        to: Option<NaiveDate>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum LimitAction {
    Set {
        #[arg(long)]
        category: String,
        #[arg(long)]
        max_continuous: u32,
        #[arg(long)]
        max_daily_hours: Option<f64>,
        #[arg(long)]
        max_weekly_hours: Option<f64>,
        #[arg(long)]
        inactive: bool,
    },
    Delete {
        #[arg(long)]
        category: String,
    },
    List,
}

#[derive(Subcommand)]
enum RestRuleAction {
    Set {
        /// Existing rule to replace.
        #[arg(long)]
        id: Option<String>,
        /// Limit the rule to one category.
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        trigger: u32,
        #[arg(long)]
        rest: u32,
        #[arg(long)]
        rest_category: Option<String>,
        #[arg(long)]
        mandatory: bool,
        #[arg(long)]
        inactive: bool,
    },
    Delete {
        id: String,
    },
    List,
}

#[derive(Args)]
struct PeriodArgs {
    /// monthly or weekly.
    #[arg(long, default_value = "monthly")]
    kind: String,
    #[arg(long)]
    year: i32,
    /// Month (1-12) or ISO week (1-53).
    #[arg(long)]
    number: u32,
}

impl PeriodArgs {
    fn period(&self) -> Result<GoalPeriod, TrackerError> {
        GoalPeriod::from_parts(&self.kind, self.year, self.number).map_err(TrackerError::Validation)
    }
}

#[derive(Subcommand)]
enum GoalAction {
    Set {
        #[arg(long)]
        category: String,
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long)]
        target_hours: f64,
        /// minimum or maximum.
        #[arg(long, default_value = "minimum")]
        goal_type: GoalType,
    },
    Delete {
        id: String,
    },
    Progress {
        #[command(flatten)]
        period: PeriodArgs,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    Add {
        #[arg(long)]
        category: String,
        #[arg(long, value_parser = weekday_arg)]
        day: Weekday,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        flexible: bool,
        #[arg(long, value_parser = priority_arg)]
        priority: Option<u8>,
    },
    List {
        #[arg(long, value_parser = weekday_arg)]
        day: Weekday,
    },
    Delete {
        id: String,
    },
    /// Create the weekday's template blocks on a date.
    Apply {
        #[arg(long, value_parser = date_arg)]
        date: NaiveDate,
    },
}

fn date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value, "date")
}

fn weekday_arg(value: &str) -> Result<Weekday, String> {
    parse_weekday(value).ok_or_else(|| format!("unsupported weekday: {value}"))
}

fn priority_arg(value: &str) -> Result<u8, String> {
    PriorityLevel::parse_priority(value)
}

fn json<T: Serialize>(value: T) -> Result<serde_json::Value, TrackerError> {
    serde_json::to_value(value).map_err(TrackerError::from)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let workspace = match cli.workspace.clone() {
        Some(path) => path,
        None => match std::env::current_dir() {
            Ok(path) => path,
            Err(error) => {
                eprintln!("cannot resolve workspace: {error}");
                return ExitCode::FAILURE;
            }
        },
    };

    if let Commands::Bootstrap = cli.command {
        return match bootstrap_workspace(&workspace) {
            Ok(result) => {
                print_json(&serde_json::json!({
                    "workspace_root": result.workspace_root.display().to_string(),
                    "config_dir": result.config_dir.display().to_string(),
                    "database_path": result.database_path.display().to_string(),
                }));
                ExitCode::SUCCESS
            }
            Err(error) => {
                tracing::error!(command = "bootstrap", %error, "command failed");
                eprintln!("{error}");
                ExitCode::FAILURE
            }
        };
    }

    let state = match AppState::new(workspace) {
        Ok(state) => state,
        Err(error) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };
    let command = command_name(&cli.command);
    match run(&state, &cli.owner, cli.command) {
        Ok(value) => {
            state.log_info(command, "command completed");
            print_json(&value);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}", state.command_error(command, &error));
            ExitCode::FAILURE
        }
    }
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(formatted) => println!("{formatted}"),
        Err(error) => eprintln!("cannot format output: {error}"),
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Bootstrap => "bootstrap",
        Commands::Category { .. } => "category",
        Commands::Block { .. } => "block",
        Commands::Check { .. } => "check",
        Commands::Validate { .. } => "validate",
        Commands::Pending { .. } => "pending",
        Commands::Stats { .. } => "stats",
        Commands::Violations { .. } => "violations",
        Commands::Ack { .. } => "ack",
        Commands::Limit { .. } => "limit",
        Commands::RestRule { .. } => "rest-rule",
        Commands::Goal { .. } => "goal",
        Commands::Template { .. } => "template",
    }
}

fn run(state: &AppState, owner: &str, command: Commands) -> Result<serde_json::Value, TrackerError> {
    match command {
        Commands::Bootstrap => Ok(serde_json::Value::Null),
        Commands::Category { action } => match action {
            CategoryAction::Add {
                name,
                id,
                requires_rest,
                is_rest,
            } => json(upsert_category_impl(state, owner, id, &name, requires_rest, is_rest)?),
            CategoryAction::List => json(list_categories_impl(state, owner)?),
        },
        Commands::Block { action } => match action {
            BlockAction::Add(fields) => json(create_block_impl(state, owner, fields.into())?),
            BlockAction::Update { id, fields } => json(update_block_impl(state, owner, &id, fields.into())?),
            BlockAction::List { date, to } => {
                let range = DateRange::new(date, to.unwrap_or(date)).map_err(TrackerError::Validation)?;
                json(list_blocks_impl(state, owner, range)?)
            }
            BlockAction::Delete { id } => {
                delete_block_impl(state, owner, &id)?;
                json(serde_json::json!({ "deleted": id }))
            }
        },
        Commands::Check {
            date,
            category,
            start,
            end,
        } => json(check_candidate_impl(state, owner, date, &category, &start, &end)?),
        Commands::Validate {
            block_id,
            status,
            actual_start,
            actual_end,
            completion,
            omission_reason,
            notes,
        } => {
            let report = ValidationReport {
                status,
                actual_start_time: actual_start,
                actual_end_time: actual_end,
                completion_percentage: completion,
                omission_reason_id: omission_reason,
                notes,
            };
            json(validate_block_impl(state, owner, &block_id, report)?)
        }
        Commands::Pending { date } => {
            let date = date.unwrap_or_else(|| state.today());
            json(pending_validations_impl(state, owner, date)?)
        }
        Commands::Stats { from, to } => {
            let range = DateRange::new(from, to).map_err(TrackerError::Validation)?;
            json(validation_stats_impl(state, owner, range)?)
        }
        Commands::Violations { from, to, all } => {
            let range = DateRange::new(from, to).map_err(TrackerError::Validation)?;
            json(list_violations_impl(state, owner, range, all)?)
        }
        Commands::Ack { violation_id } => json(acknowledge_violation_impl(state, owner, &violation_id)?),
        Commands::Limit { action } => match action {
            LimitAction::Set {
                category,
                max_continuous,
                max_daily_hours,
                max_weekly_hours,
                inactive,
            } => json(upsert_usage_limit_impl(
                state,
                owner,
                UsageLimitInput {
                    category_id: category,
                    max_continuous_minutes: max_continuous,
                    max_daily_hours,
                    max_weekly_hours,
                    is_active: !inactive,
                },
            )?),
            LimitAction::Delete { category } => {
                delete_usage_limit_impl(state, owner, &category)?;
                json(serde_json::json!({ "deleted": category }))
            }
            LimitAction::List => json(list_usage_limits_impl(state, owner)?),
        },
        Commands::RestRule { action } => match action {
            RestRuleAction::Set {
                id,
                category,
                trigger,
                rest,
                rest_category,
                mandatory,
                inactive,
            } => json(upsert_rest_rule_impl(
                state,
                owner,
                RestRuleInput {
                    id,
                    category_id: category,
                    trigger_duration_minutes: trigger,
                    rest_duration_minutes: rest,
                    rest_category_id: rest_category,
                    is_mandatory: mandatory,
                    is_active: !inactive,
                },
            )?),
            RestRuleAction::Delete { id } => {
                delete_rest_rule_impl(state, owner, &id)?;
                json(serde_json::json!({ "deleted": id }))
            }
            RestRuleAction::List => json(list_rest_rules_impl(state, owner)?),
        },
        Commands::Goal { action } => match action {
            GoalAction::Set {
                category,
                period,
                target_hours,
                goal_type,
            } => json(upsert_goal_impl(
                state,
                owner,
                GoalInput {
                    category_id: category,
                    period: period.period()?,
                    target_hours,
                    goal_type,
                },
            )?),
            GoalAction::Delete { id } => {
                delete_goal_impl(state, owner, &id)?;
                json(serde_json::json!({ "deleted": id }))
            }
            GoalAction::Progress { period } => json(goal_progress_impl(state, owner, period.period()?)?),
        },
        Commands::Template { action } => match action {
            TemplateAction::Add {
                category,
                day,
                start,
                end,
                title,
                flexible,
                priority,
            } => json(add_template_block_impl(
                state,
                owner,
                TemplateBlockInput {
                    category_id: category,
                    day_of_week: day,
                    start_time: start,
                    end_time: end,
                    title,
                    is_flexible: flexible,
                    priority,
                },
            )?),
            TemplateAction::List { day } => json(list_template_blocks_impl(state, owner, day)?),
            TemplateAction::Delete { id } => {
                delete_template_block_impl(state, owner, &id)?;
                json(serde_json::json!({ "deleted": id }))
            }
            TemplateAction::Apply { date } => json(apply_template_impl(state, owner, date)?),
        },
    }
}
