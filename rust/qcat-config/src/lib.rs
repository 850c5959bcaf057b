//! Configuration loading: file defaults overridden by environment
//! variables, following the same hierarchy (env > file > defaults) as the
//! teacher's `knhk-config::load_config`.

mod error;
mod schema;

pub use error::ConfigError;
pub use schema::{
    AppSection, AutomationConfig, DatabaseSection, ExchangeSection, ExecutorSection,
    SchedulerSection,
};

use std::path::{Path, PathBuf};

/// Load configuration: start from the file at `path` (or built-in
/// defaults if it doesn't exist), then apply `QCAT_*` environment
/// overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<AutomationConfig, ConfigError> {
    let mut config = match path {
        Some(p) if p.exists() => load_from_file(p)?,
        _ => AutomationConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_from_file(path: &Path) -> Result<AutomationConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Default config file path: `$QCAT_CONFIG`, else `./qcat.toml`.
pub fn default_config_path() -> PathBuf {
    std::env::var("QCAT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("qcat.toml"))
}

pub fn apply_env_overrides(config: &mut AutomationConfig) -> Result<(), ConfigError> {
    if let Ok(context) = std::env::var("QCAT_CONTEXT") {
        config.app.context = context;
    }
    if let Ok(dsn) = std::env::var("QCAT_DATABASE_DSN") {
        config.database.dsn = dsn;
    }
    if let Ok(workers) = std::env::var("QCAT_SCHEDULER_WORKERS") {
        config.scheduler.worker_count = workers
            .parse()
            .map_err(|_| ConfigError::Validation(format!("invalid QCAT_SCHEDULER_WORKERS: {workers}")))?;
    }
    if let Ok(workers) = std::env::var("QCAT_EXECUTOR_WORKERS") {
        config.executor.worker_count = workers
            .parse()
            .map_err(|_| ConfigError::Validation(format!("invalid QCAT_EXECUTOR_WORKERS: {workers}")))?;
    }
    Ok(())
}

pub fn validate_config(config: &AutomationConfig) -> Result<(), ConfigError> {
    if config.scheduler.worker_count == 0 {
        return Err(ConfigError::Validation(
            "scheduler.worker_count must be > 0".to_string(),
        ));
    }
    if config.executor.worker_count == 0 {
        return Err(ConfigError::Validation(
            "executor.worker_count must be > 0".to_string(),
        ));
    }
    if config.scheduler.task_queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "scheduler.task_queue_capacity must be > 0".to_string(),
        ));
    }
    if config.executor.action_queue_capacity == 0 {
        return Err(ConfigError::Validation(
            "executor.action_queue_capacity must be > 0".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = AutomationConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.scheduler.worker_count, 5);
        assert_eq!(config.executor.worker_count, 3);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qcat.toml");
        std::fs::write(
            &path,
            r#"
            [app]
            name = "qcat-staging"

            [scheduler]
            worker_count = 8
            "#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.app.name, "qcat-staging");
        assert_eq!(config.scheduler.worker_count, 8);
        // Untouched fields keep their defaults.
        assert_eq!(config.executor.worker_count, 3);
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qcat.toml");
        std::fs::write(&path, "[scheduler]\nworker_count = 8\n").unwrap();

        std::env::set_var("QCAT_SCHEDULER_WORKERS", "12");
        let config = load_config(Some(&path)).unwrap();
        std::env::remove_var("QCAT_SCHEDULER_WORKERS");

        assert_eq!(config.scheduler.worker_count, 12);
    }

    #[test]
    fn rejects_zero_workers() {
        let mut config = AutomationConfig::default();
        config.scheduler.worker_count = 0;
        assert!(validate_config(&config).is_err());
    }
}
