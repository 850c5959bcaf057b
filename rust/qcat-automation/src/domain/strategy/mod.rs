//! Strategy sub-scheduler (spec §4.3): optimization orchestration, canary
//! deployment, elimination with minimum-count protection, onboarding,
//! portfolio profit maximization, dynamic stop-loss.

mod canary;
mod elimination;
mod models;
mod onboarding;
mod optimization;
mod profit;
mod stoploss;

pub use canary::apply_optimization_result;
pub use elimination::MINIMUM_STRATEGY_FLOOR;
pub use models::{
    CanaryDeployment, CanaryStatus, OptimizationResult, StrategyRecord, StrategyVersion, VersionStatus,
};
pub use stoploss::{classify_regime, MarketRegime};

use async_trait::async_trait;

use crate::error::AutomationResult;
use crate::task::{TaskContext, TaskHandler};

use optimization::OptimizationOrchestrators;

/// `HandleOptimization` catalog entry.
pub struct OptimizationHandler {
    orchestrators: OptimizationOrchestrators,
}

impl Default for OptimizationHandler {
    fn default() -> Self {
        Self { orchestrators: OptimizationOrchestrators::new() }
    }
}

#[async_trait]
impl TaskHandler for OptimizationHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        optimization::handle_optimization(&ctx, &self.orchestrators).await
    }
}

#[derive(Default)]
pub struct EliminationHandler;

#[async_trait]
impl TaskHandler for EliminationHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        elimination::handle_elimination(&ctx.db, &ctx.metrics).await
    }
}

#[derive(Default)]
pub struct MinimumStrategyCheckHandler;

#[async_trait]
impl TaskHandler for MinimumStrategyCheckHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        elimination::handle_minimum_strategy_check(&ctx.db, &ctx.metrics).await
    }
}

#[derive(Default)]
pub struct NewStrategyIntroductionHandler;

#[async_trait]
impl TaskHandler for NewStrategyIntroductionHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        onboarding::handle_new_strategy_introduction(&ctx.db, &ctx.metrics).await
    }
}

#[derive(Default)]
pub struct ProfitMaximizationHandler;

#[async_trait]
impl TaskHandler for ProfitMaximizationHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        profit::handle_profit_maximization(&ctx.db, &ctx.metrics).await
    }
}

#[derive(Default)]
pub struct StopLossAdjustmentHandler;

#[async_trait]
impl TaskHandler for StopLossAdjustmentHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        stoploss::handle_stop_loss_adjustment(&ctx.db).await
    }
}
