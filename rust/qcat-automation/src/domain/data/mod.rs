//! Data sub-scheduler (spec §4.6): hot-symbol scoring, recommendation
//! publishing, and derived-table cleaning.

mod hotlist;
mod models;

pub use hotlist::{handle_hot_coin_recommendation, score_symbol, MarketSnapshot};
pub use models::{HotScore, Recommendation, RiskLevel};

use async_trait::async_trait;

use crate::error::AutomationResult;
use crate::task::{TaskContext, TaskHandler};

#[derive(Default)]
pub struct HotCoinRecommendationHandler;

#[async_trait]
impl TaskHandler for HotCoinRecommendationHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        hotlist::handle_hot_coin_recommendation(&ctx.db).await
    }
}

#[derive(Default)]
pub struct DataCleaningHandler;

#[async_trait]
impl TaskHandler for DataCleaningHandler {
    async fn handle(&self, ctx: TaskContext) -> AutomationResult<()> {
        hotlist::handle_data_cleaning(&ctx.db).await
    }
}
