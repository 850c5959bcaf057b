//! The fixed task catalog (spec §4.1 "Fixed catalog"): construction-time
//! binding of every catalog entry to its handler, schedule, timeout, and
//! retry ceiling. Tasks are registered disabled by default (spec §3) —
//! callers `toggle_task` them on once collaborators are wired and
//! healthy.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{data, learning, position, risk, strategy, system};
use crate::task::{ScheduledTask, TaskCategory, TaskHandler, TaskType};

struct Def {
    id: &'static str,
    name: &'static str,
    task_type: TaskType,
    category: TaskCategory,
    schedule: &'static str,
    timeout: Duration,
    max_retries: u32,
    handler: Arc<dyn TaskHandler>,
}

/// Every catalog entry named in spec §4.1's fixed-catalog list, bound to
/// the concrete handler that implements it. Order matches the spec's
/// enumeration.
pub fn default_tasks() -> Vec<ScheduledTask> {
    let defs = vec![
        Def {
            id: "strategy_optimization",
            name: "strategy_optimization",
            task_type: TaskType::StrategyOptimization,
            category: TaskCategory::Strategy,
            schedule: "0 */6 * * *",
            timeout: Duration::from_secs(30 * 60),
            max_retries: 2,
            handler: Arc::new(strategy::OptimizationHandler::default()),
        },
        Def {
            id: "position_optimization",
            name: "position_optimization",
            task_type: TaskType::PositionOptimization,
            category: TaskCategory::Position,
            schedule: "*/15 * * * *",
            timeout: Duration::from_secs(5 * 60),
            max_retries: 3,
            handler: Arc::new(position::PositionOptimizationHandler),
        },
        Def {
            id: "risk_monitoring",
            name: "risk_monitoring",
            task_type: TaskType::RiskMonitoring,
            category: TaskCategory::Risk,
            schedule: "*/5 * * * *",
            timeout: Duration::from_secs(60),
            max_retries: 3,
            handler: Arc::new(risk::RiskMonitoringHandler),
        },
        Def {
            id: "data_cleaning",
            name: "data_cleaning",
            task_type: TaskType::DataCleaning,
            category: TaskCategory::Data,
            schedule: "0 */4 * * *",
            timeout: Duration::from_secs(5 * 60),
            max_retries: 2,
            handler: Arc::new(data::DataCleaningHandler),
        },
        Def {
            id: "health_check",
            name: "health_check",
            task_type: TaskType::HealthCheck,
            category: TaskCategory::System,
            schedule: "*/1 * * * *",
            timeout: Duration::from_secs(30),
            max_retries: 1,
            handler: Arc::new(system::HealthCheckHandler),
        },
        Def {
            id: "learning",
            name: "learning",
            task_type: TaskType::Learning,
            category: TaskCategory::Learning,
            schedule: "0 */6 * * *",
            timeout: Duration::from_secs(10 * 60),
            max_retries: 2,
            handler: Arc::new(learning::LearningHandler),
        },
        Def {
            id: "periodic_optimization",
            name: "periodic_optimization",
            task_type: TaskType::PeriodicOptimization,
            category: TaskCategory::Strategy,
            schedule: "0 0 * * *",
            timeout: Duration::from_secs(30 * 60),
            max_retries: 2,
            handler: Arc::new(strategy::OptimizationHandler::default()),
        },
        Def {
            id: "elimination",
            name: "elimination",
            task_type: TaskType::Elimination,
            category: TaskCategory::Strategy,
            schedule: "0 2 * * *",
            timeout: Duration::from_secs(5 * 60),
            max_retries: 2,
            handler: Arc::new(strategy::EliminationHandler),
        },
        Def {
            id: "new_strategy_introduction",
            name: "new_strategy_introduction",
            task_type: TaskType::NewStrategyIntroduction,
            category: TaskCategory::Strategy,
            schedule: "0 3 * * 0",
            timeout: Duration::from_secs(15 * 60),
            max_retries: 2,
            handler: Arc::new(strategy::NewStrategyIntroductionHandler),
        },
        Def {
            id: "minimum_strategy_check",
            name: "minimum_strategy_check",
            task_type: TaskType::MinimumStrategyCheck,
            category: TaskCategory::Strategy,
            schedule: "*/30 * * * *",
            timeout: Duration::from_secs(60),
            max_retries: 3,
            handler: Arc::new(strategy::MinimumStrategyCheckHandler),
        },
        Def {
            id: "stop_loss_adjustment",
            name: "stop_loss_adjustment",
            task_type: TaskType::StopLossAdjustment,
            category: TaskCategory::Strategy,
            schedule: "*/10 * * * *",
            timeout: Duration::from_secs(3 * 60),
            max_retries: 3,
            handler: Arc::new(strategy::StopLossAdjustmentHandler),
        },
        Def {
            id: "hot_coin_recommendation",
            name: "hot_coin_recommendation",
            task_type: TaskType::HotCoinRecommendation,
            category: TaskCategory::Data,
            schedule: "*/5 * * * *",
            timeout: Duration::from_secs(2 * 60),
            max_retries: 3,
            handler: Arc::new(data::HotCoinRecommendationHandler),
        },
        Def {
            id: "profit_maximization",
            name: "profit_maximization",
            task_type: TaskType::ProfitMaximization,
            category: TaskCategory::Strategy,
            schedule: "0 */4 * * *",
            timeout: Duration::from_secs(10 * 60),
            max_retries: 2,
            handler: Arc::new(strategy::ProfitMaximizationHandler),
        },
        Def {
            id: "fund_distribution",
            name: "fund_distribution",
            task_type: TaskType::FundDistribution,
            category: TaskCategory::Risk,
            schedule: "0 0 * * *",
            timeout: Duration::from_secs(20 * 60),
            max_retries: 1,
            handler: Arc::new(risk::FundDistributionHandler),
        },
        Def {
            id: "multi_strategy_hedging",
            name: "multi_strategy_hedging",
            task_type: TaskType::MultiStrategyHedging,
            category: TaskCategory::Position,
            schedule: "0 * * * *",
            timeout: Duration::from_secs(15 * 60),
            max_retries: 2,
            handler: Arc::new(position::MultiStrategyHedgingHandler),
        },
        Def {
            id: "factor_library_update",
            name: "factor_library_update",
            task_type: TaskType::FactorLibraryUpdate,
            category: TaskCategory::Learning,
            schedule: "0 * * * *",
            timeout: Duration::from_secs(5 * 60),
            max_retries: 2,
            handler: Arc::new(learning::FactorLibraryUpdateHandler),
        },
        Def {
            id: "automl",
            name: "automl",
            task_type: TaskType::AutoML,
            category: TaskCategory::Learning,
            schedule: "0 2 * * 0",
            timeout: Duration::from_secs(30 * 60),
            max_retries: 1,
            handler: Arc::new(learning::AutoMlHandler),
        },
        Def {
            id: "genetic_evolution",
            name: "genetic_evolution",
            task_type: TaskType::GeneticEvolution,
            category: TaskCategory::Learning,
            schedule: "0 1 * * 0",
            timeout: Duration::from_secs(30 * 60),
            max_retries: 1,
            handler: Arc::new(learning::GeneticEvolutionHandler),
        },
        Def {
            id: "market_pattern_recognition",
            name: "market_pattern_recognition",
            task_type: TaskType::MarketPatternRecognition,
            category: TaskCategory::Learning,
            schedule: "*/20 * * * *",
            timeout: Duration::from_secs(3 * 60),
            max_retries: 3,
            handler: Arc::new(learning::MarketPatternRecognitionHandler),
        },
        Def {
            id: "abnormal_market_response",
            name: "abnormal_market_response",
            task_type: TaskType::AbnormalMarketResponse,
            category: TaskCategory::System,
            schedule: "*/1 * * * *",
            timeout: Duration::from_secs(30),
            max_retries: 2,
            handler: Arc::new(system::AbnormalMarketResponseHandler),
        },
        Def {
            id: "account_security_monitoring",
            name: "account_security_monitoring",
            task_type: TaskType::AccountSecurityMonitoring,
            category: TaskCategory::System,
            schedule: "0 * * * *",
            timeout: Duration::from_secs(5 * 60),
            max_retries: 2,
            handler: Arc::new(system::AccountSecurityMonitoringHandler),
        },
        Def {
            id: "dynamic_fund_allocation",
            name: "dynamic_fund_allocation",
            task_type: TaskType::DynamicFundAllocation,
            category: TaskCategory::Risk,
            schedule: "0 */6 * * *",
            timeout: Duration::from_secs(20 * 60),
            max_retries: 1,
            handler: Arc::new(risk::DynamicFundAllocationHandler),
        },
        Def {
            id: "layered_position_management",
            name: "layered_position_management",
            task_type: TaskType::LayeredPositionManagement,
            category: TaskCategory::Position,
            schedule: "*/30 * * * *",
            timeout: Duration::from_secs(15 * 60),
            max_retries: 2,
            handler: Arc::new(position::LayeredPositionManagementHandler::default()),
        },
        Def {
            id: "auto_backtesting",
            name: "auto_backtesting",
            task_type: TaskType::AutoBacktesting,
            category: TaskCategory::Learning,
            schedule: "0 3 * * *",
            timeout: Duration::from_secs(15 * 60),
            max_retries: 1,
            handler: Arc::new(learning::AutoBacktestingHandler),
        },
        Def {
            id: "multi_exchange_redundancy",
            name: "multi_exchange_redundancy",
            task_type: TaskType::MultiExchangeRedundancy,
            category: TaskCategory::System,
            schedule: "*/5 * * * *",
            timeout: Duration::from_secs(60),
            max_retries: 3,
            handler: Arc::new(system::MultiExchangeRedundancyHandler),
        },
        Def {
            id: "audit_logging",
            name: "audit_logging",
            task_type: TaskType::AuditLogging,
            category: TaskCategory::System,
            schedule: "0 4 * * *",
            timeout: Duration::from_secs(5 * 60),
            max_retries: 2,
            handler: Arc::new(system::AuditLoggingHandler),
        },
        Def {
            id: "best_parameter_application",
            name: "best_parameter_application",
            task_type: TaskType::BestParameterApplication,
            category: TaskCategory::Learning,
            schedule: "0 0 * * 0",
            timeout: Duration::from_secs(20 * 60),
            max_retries: 1,
            handler: Arc::new(learning::BestParameterApplicationHandler),
        },
    ];

    defs.into_iter()
        .map(|d| ScheduledTask::new(d.id, d.name, d.task_type, d.category, d.schedule, d.timeout, d.max_retries, d.handler))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_catalog_entry_registers_disabled() {
        let tasks = default_tasks();
        assert_eq!(tasks.len(), 27);
        assert!(tasks.iter().all(|t| !t.enabled));
    }

    #[test]
    fn task_ids_are_unique() {
        let tasks = default_tasks();
        let mut ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), tasks.len());
    }
}
