//! Exchange/wallet API boundary (spec §6). Treated as opaque: transfer,
//! order, and balance calls returning an execution result after an
//! unspecified delay bounded by the caller's task timeout.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use crate::error::AutomationResult;

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from: String,
    pub to: String,
    pub symbol: String,
    pub amount: f64,
}

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: String,
    pub quantity: f64,
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub success: bool,
    pub fee: f64,
    pub tx_id: String,
}

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn transfer(&self, req: TransferRequest) -> AutomationResult<ExecutionResult>;
    async fn order(&self, req: OrderRequest) -> AutomationResult<ExecutionResult>;
    async fn balance(&self, location: &str) -> AutomationResult<f64>;
}

/// Default collaborator: simulated transfer/order confirmation (spec §6,
/// §4.4 "Cold-wallet legs..."). Sleeps a small bounded delay and returns a
/// synthetic success, matching "the core falls back to simulated
/// transfer-confirmation timers and mock market data" when the real
/// exchange API is unavailable.
pub struct SimulatedExchangeClient;

#[async_trait]
impl ExchangeClient for SimulatedExchangeClient {
    async fn transfer(&self, req: TransferRequest) -> AutomationResult<ExecutionResult> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(ExecutionResult {
            success: true,
            fee: req.amount * 0.001,
            tx_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    async fn order(&self, _req: OrderRequest) -> AutomationResult<ExecutionResult> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(ExecutionResult {
            success: true,
            fee: 0.0,
            tx_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    async fn balance(&self, _location: &str) -> AutomationResult<f64> {
        let mut rng = rand::thread_rng();
        Ok(rng.gen_range(1_000.0..100_000.0))
    }
}
