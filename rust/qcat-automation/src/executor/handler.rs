use async_trait::async_trait;

use crate::error::AutomationResult;

use super::action::ExecutionAction;

/// One of the six typed executors the dispatch table routes to (spec
/// §4.7). Domain sub-schedulers register the real implementations (e.g.
/// the risk sub-scheduler's transfer executor handles `Risk`/`Transfer`
/// actions); a logging default is used for action types nothing has
/// claimed yet.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn execute(&self, action: &ExecutionAction) -> AutomationResult<()>;
}

/// Default handler: logs and succeeds. Used for action kinds no domain
/// sub-scheduler has registered a real handler for yet, so the dispatch
/// table always resolves (spec §3 "handler must be resolvable from type
/// at enqueue time").
pub struct LoggingActionHandler;

#[async_trait]
impl ActionHandler for LoggingActionHandler {
    async fn execute(&self, action: &ExecutionAction) -> AutomationResult<()> {
        tracing::debug!(
            action_id = action.id.as_str(),
            action_name = action.action_name.as_str(),
            symbol = action.symbol.as_str(),
            "executing action with default handler"
        );
        Ok(())
    }
}
