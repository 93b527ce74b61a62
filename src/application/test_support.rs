use crate::application::blocks::{create_block_impl, upsert_category_impl, BlockInput};
use crate::application::state::AppState;
use crate::domain::models::{Category, ScheduledBlock};
use crate::infrastructure::config::EngineConfig;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

pub const OWNER: &str = "user-1";

pub fn fixed_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-02-16T12:00:00Z")
        .expect("valid datetime")
        .with_timezone(&Utc)
}

pub fn date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
}

/// In-memory state whose clock is pinned to 2026-02-16 12:00 UTC.
pub fn test_state() -> AppState {
    AppState::in_memory(EngineConfig::default()).with_now_provider(Arc::new(fixed_time))
}

pub fn seed_category(state: &AppState, id: &str, requires_rest: bool, is_rest: bool) -> Category {
    upsert_category_impl(state, OWNER, Some(id.to_string()), id, requires_rest, is_rest)
        .expect("seed category")
}

pub fn block_input(category_id: &str, day: &str, start: &str, end: &str) -> BlockInput {
    BlockInput {
        category_id: category_id.to_string(),
        date: date(day),
        start_time: start.to_string(),
        end_time: end.to_string(),
        title: None,
        notes: None,
        is_flexible: false,
        priority: None,
    }
}

pub fn seed_block(state: &AppState, category_id: &str, day: &str, start: &str, end: &str) -> ScheduledBlock {
    create_block_impl(state, OWNER, block_input(category_id, day, start, end))
        .expect("seed block")
        .block
}
