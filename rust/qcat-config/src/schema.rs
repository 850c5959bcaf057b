use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub exchanges: BTreeMap<String, ExchangeSection>,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub executor: ExecutorSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSection {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_app_name() -> String {
    "qcat-automation".to_string()
}

fn default_context() -> String {
    "default".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            context: default_context(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_dsn")]
    pub dsn: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_dsn() -> String {
    "postgres://localhost/qcat".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            dsn: default_dsn(),
            max_connections: default_max_connections(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExchangeSection {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_scheduler_workers")]
    pub worker_count: usize,
    #[serde(default = "default_task_queue_capacity")]
    pub task_queue_capacity: usize,
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

fn default_scheduler_workers() -> usize {
    5
}

fn default_task_queue_capacity() -> usize {
    1_000
}

fn default_tick_interval_secs() -> u64 {
    60
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            worker_count: default_scheduler_workers(),
            task_queue_capacity: default_task_queue_capacity(),
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSection {
    #[serde(default = "default_executor_workers")]
    pub worker_count: usize,
    #[serde(default = "default_action_queue_capacity")]
    pub action_queue_capacity: usize,
    #[serde(default = "default_queue_alert_threshold")]
    pub queue_alert_threshold: usize,
}

fn default_executor_workers() -> usize {
    3
}

fn default_action_queue_capacity() -> usize {
    10_000
}

fn default_queue_alert_threshold() -> usize {
    5_000
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            worker_count: default_executor_workers(),
            action_queue_capacity: default_action_queue_capacity(),
            queue_alert_threshold: default_queue_alert_threshold(),
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            database: DatabaseSection::default(),
            exchanges: BTreeMap::new(),
            scheduler: SchedulerSection::default(),
            executor: ExecutorSection::default(),
        }
    }
}
