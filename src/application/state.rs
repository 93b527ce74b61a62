use crate::application::bootstrap::bootstrap_workspace;
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::error::TrackerError;
use crate::infrastructure::memory_store::InMemoryTrackerStore;
use crate::infrastructure::repository::TrackerStore;
use crate::infrastructure::sqlite_store::SqliteTrackerStore;
use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

/// Everything an operation needs: engine settings, the store and a clock.
pub struct AppState {
    config: EngineConfig,
    store: Arc<dyn TrackerStore>,
    now_provider: NowProvider,
    database_path: Option<PathBuf>,
}

impl AppState {
    /// Opens (and bootstraps if needed) a workspace backed by SQLite.
    pub fn new(workspace_root: PathBuf) -> Result<Self, TrackerError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let store = Arc::new(SqliteTrackerStore::new(&bootstrap.database_path));
        Ok(Self {
            config: bootstrap.config,
            store,
            now_provider: Arc::new(Utc::now),
            database_path: Some(bootstrap.database_path),
        })
    }

    pub fn in_memory(config: EngineConfig) -> Self {
        Self::with_store(config, Arc::new(InMemoryTrackerStore::default()))
    }

    pub fn with_store(config: EngineConfig, store: Arc<dyn TrackerStore>) -> Self {
        Self {
            config,
            store,
            now_provider: Arc::new(Utc::now),
            database_path: None,
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn TrackerStore {
        self.store.as_ref()
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.database_path.as_deref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    /// Today in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        self.config.local_date(self.now())
    }

    pub fn command_error(&self, command: &str, error: &TrackerError) -> String {
        error!(command, %error, "command failed");
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        info!(command, "{message}");
    }
}

pub(crate) fn require_owner(owner_id: &str) -> Result<&str, TrackerError> {
    let owner_id = owner_id.trim();
    if owner_id.is_empty() {
        return Err(TrackerError::Validation("owner_id must not be empty".to_string()));
    }
    Ok(owner_id)
}

pub(crate) fn normalized_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "timeledger-state-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn workspace_state_bootstraps_config_and_database() {
        let workspace = TempWorkspace::new();
        let state = AppState::new(workspace.path.clone()).expect("initialize app state");

        assert!(workspace.path.join("config").join("engine.json").exists());
        let database_path = state.database_path().expect("sqlite backed");
        assert!(database_path.exists());
        assert_eq!(state.config(), &EngineConfig::default());

        AppState::new(workspace.path.clone()).expect("bootstrap is repeatable");
    }

    #[test]
    fn today_uses_the_clock_and_timezone() {
        let config = EngineConfig {
            timezone: chrono_tz::America::New_York,
            ..EngineConfig::default()
        };
        let state = AppState::in_memory(config).with_now_provider(Arc::new(|| {
            DateTime::parse_from_rfc3339("2026-02-17T03:00:00Z")
                .expect("valid datetime")
                .with_timezone(&Utc)
        }));
        assert_eq!(state.today(), NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date"));
    }

    #[test]
    fn ids_are_unique_and_prefixed() {
        let first = next_id("blk");
        let second = next_id("blk");
        assert!(first.starts_with("blk-"));
        assert_ne!(first, second);
    }

    #[test]
    fn blank_owner_is_rejected() {
        assert!(matches!(require_owner("  "), Err(TrackerError::Validation(_))));
        assert_eq!(require_owner(" user-1 ").expect("owner"), "user-1");
    }
}
