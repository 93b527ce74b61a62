use crate::domain::compliance::RestRuleSelection;
use crate::domain::validation::DefaultCompletion;
use crate::infrastructure::error::TrackerError;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const ENGINE_JSON: &str = "engine.json";
const SUPPORTED_SCHEMA: u64 = 1;
pub const DEFAULT_LONG_SESSION_MINUTES: u32 = 90;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub timezone: Tz,
    /// Completed sessions at least this long in a rest-requiring category
    /// must be followed by a rest block.
    pub long_session_minutes: u32,
    pub rest_rule_selection: RestRuleSelection,
    pub default_completion: DefaultCompletion,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            long_session_minutes: DEFAULT_LONG_SESSION_MINUTES,
            rest_rule_selection: RestRuleSelection::default(),
            default_completion: DefaultCompletion::default(),
        }
    }
}

impl EngineConfig {
    /// Calendar date of `now` in the configured timezone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EngineConfigFile {
    schema: u8,
    #[serde(default = "default_timezone")]
    timezone: String,
    #[serde(default = "default_long_session_minutes")]
    long_session_minutes: u32,
    #[serde(default)]
    rest_rule_selection: RestRuleSelection,
    #[serde(default)]
    default_completion: DefaultCompletion,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_long_session_minutes() -> u32 {
    DEFAULT_LONG_SESSION_MINUTES
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([(
        ENGINE_JSON,
        serde_json::json!({
            "schema": 1,
            "timezone": "UTC",
            "longSessionMinutes": DEFAULT_LONG_SESSION_MINUTES,
            "restRuleSelection": "first_match",
            "defaultCompletion": {
                "completed": 100,
                "partial": 50,
                "omitted": 0
            }
        }),
    )])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), TrackerError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, TrackerError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| TrackerError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(TrackerError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_engine_config(config_dir: &Path) -> Result<EngineConfig, TrackerError> {
    let path = config_dir.join(ENGINE_JSON);
    let file: EngineConfigFile = serde_json::from_value(read_config(&path)?)?;

    let timezone = file.timezone.trim().parse::<Tz>().map_err(|_| {
        TrackerError::InvalidConfig(format!(
            "unknown timezone '{}' in {}",
            file.timezone,
            path.display()
        ))
    })?;
    if file.long_session_minutes == 0 {
        return Err(TrackerError::InvalidConfig(format!(
            "longSessionMinutes must be > 0 in {}",
            path.display()
        )));
    }
    file.default_completion
        .validate()
        .map_err(|message| TrackerError::InvalidConfig(format!("{message} in {}", path.display())))?;

    Ok(EngineConfig {
        timezone,
        long_session_minutes: file.long_session_minutes,
        rest_rule_selection: file.rest_rule_selection,
        default_completion: file.default_completion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "timeledger-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }

        fn write_engine(&self, value: serde_json::Value) {
            fs::write(self.path.join(ENGINE_JSON), value.to_string()).expect("write engine.json");
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn default_config_is_written_and_loaded() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");

        let config = load_engine_config(&dir.path).expect("load defaults");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = TempConfigDir::new();
        dir.write_engine(serde_json::json!({
            "schema": 1,
            "timezone": "Asia/Tokyo",
            "longSessionMinutes": 120,
            "restRuleSelection": "most_restrictive"
        }));
        ensure_default_configs(&dir.path).expect("keep existing");

        let config = load_engine_config(&dir.path).expect("load config");
        assert_eq!(config.timezone, chrono_tz::Asia::Tokyo);
        assert_eq!(config.long_session_minutes, 120);
        assert_eq!(config.rest_rule_selection, RestRuleSelection::MostRestrictive);
        assert_eq!(config.default_completion, DefaultCompletion::default());
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        dir.write_engine(serde_json::json!({ "schema": 2 }));
        let error = load_engine_config(&dir.path).expect_err("schema 2 must fail");
        assert!(matches!(error, TrackerError::InvalidConfig(message) if message.contains("unsupported schema 2")));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let dir = TempConfigDir::new();
        dir.write_engine(serde_json::json!({ "schema": 1, "timezone": "Mars/Olympus" }));
        let error = load_engine_config(&dir.path).expect_err("unknown timezone must fail");
        assert!(matches!(error, TrackerError::InvalidConfig(message) if message.contains("Mars/Olympus")));
    }

    #[test]
    fn local_date_follows_configured_timezone() {
        let config = EngineConfig {
            timezone: chrono_tz::Asia::Tokyo,
            ..EngineConfig::default()
        };
        let now = DateTime::parse_from_rfc3339("2026-02-16T20:30:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc);
        assert_eq!(config.local_date(now), NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date"));
        assert_eq!(
            EngineConfig::default().local_date(now),
            NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
        );
    }
}
