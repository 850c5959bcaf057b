use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Closed 15-member action-type enumeration (spec §3 "ExecutionAction").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Position,
    Risk,
    Order,
    Stop,
    Hedge,
    Strategy,
    Data,
    Security,
    System,
    Learning,
    Optimize,
    Rebalance,
    Transfer,
    Notify,
    Backtest,
}

impl ActionType {
    /// Which of the six typed executors (spec §4.7) handles this action
    /// type.
    pub fn executor_kind(self) -> ExecutorKind {
        match self {
            ActionType::Position | ActionType::Hedge => ExecutorKind::Position,
            ActionType::Risk | ActionType::Transfer => ExecutorKind::Risk,
            ActionType::Order | ActionType::Stop => ExecutorKind::Order,
            ActionType::Strategy | ActionType::Optimize | ActionType::Backtest => {
                ExecutorKind::Strategy
            }
            ActionType::Data | ActionType::Rebalance => ExecutorKind::Data,
            ActionType::Security | ActionType::System | ActionType::Learning | ActionType::Notify => {
                ExecutorKind::System
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    Position,
    Risk,
    Order,
    Strategy,
    Data,
    System,
}

#[derive(Clone)]
pub struct ExecutionAction {
    pub id: String,
    pub action_type: ActionType,
    pub priority: u8,
    pub symbol: String,
    pub action_name: String,
    pub params: HashMap<String, Value>,
    pub timeout: Duration,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

impl ExecutionAction {
    pub fn new(action_type: ActionType, action_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action_type,
            priority: 5,
            symbol: String::new(),
            action_name: action_name.into(),
            params: HashMap::new(),
            timeout: Duration::from_secs(30),
            retry_count: 0,
            max_retries: 3,
            created_at: now,
            scheduled_at: now,
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
