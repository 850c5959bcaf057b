//! Learning sub-scheduler (spec §4.10, supplemented): AutoML stub,
//! genetic-evolution stub, factor library update, market pattern
//! recognition, auto backtesting, and best-parameter application.

mod best_parameter;
mod factor;
mod models;
mod pattern;

pub use models::{FactorSnapshot, GridCandidate};

use async_trait::async_trait;

use crate::error::AutomationResult;
use crate::task::{TaskContext, TaskHandler};

#[derive(Default)]
pub struct FactorLibraryUpdateHandler;

#[async_trait]
impl TaskHandler for FactorLibraryUpdateHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        factor::handle_factor_library_update(&ctx.db).await
    }
}

#[derive(Default)]
pub struct AutoMlHandler;

#[async_trait]
impl TaskHandler for AutoMlHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        factor::handle_automl(&ctx.db).await
    }
}

#[derive(Default)]
pub struct GeneticEvolutionHandler;

#[async_trait]
impl TaskHandler for GeneticEvolutionHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        factor::handle_genetic_evolution(&ctx.db).await
    }
}

#[derive(Default)]
pub struct MarketPatternRecognitionHandler;

#[async_trait]
impl TaskHandler for MarketPatternRecognitionHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        pattern::handle_market_pattern_recognition(&ctx.db).await
    }
}

#[derive(Default)]
pub struct AutoBacktestingHandler;

#[async_trait]
impl TaskHandler for AutoBacktestingHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        pattern::handle_auto_backtesting(&ctx.db).await
    }
}

#[derive(Default)]
pub struct BestParameterApplicationHandler;

#[async_trait]
impl TaskHandler for BestParameterApplicationHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        best_parameter::handle_best_parameter_application(&ctx.db, &ctx.metrics).await
    }
}

/// `HandleLearning`: catalog entry named alongside the more specific
/// learning handlers without a distinct algorithm of its own in the
/// distilled spec; runs the two read-light learning passes (factor
/// library refresh, pattern classification) as a general periodic
/// sweep, the same way the position sub-scheduler's layered-position
/// entry delegates to its hedging pipeline.
#[derive(Default)]
pub struct LearningHandler;

#[async_trait]
impl TaskHandler for LearningHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        factor::handle_factor_library_update(&ctx.db).await?;
        pattern::handle_market_pattern_recognition(&ctx.db).await
    }
}
