//! Runs an ordered list of actions, one at a time.

use serde_json::Value;
use tracing::{debug, info};

use crate::action::Action;
use crate::context::read_context;
use crate::executor::ActionExecutor;
use crate::result::ExecutionResult;
use crate::wait::settle;

/// Executes actions strictly in order with a settle delay after each one.
///
/// A failed action does not stop the run and nothing is rolled back; the caller gets one
/// result per input, in input order.
pub struct ActionSequencer<'a> {
    executor: ActionExecutor<'a>,
}

impl<'a> ActionSequencer<'a> {
    pub fn new(executor: ActionExecutor<'a>) -> Self {
        Self { executor }
    }

    pub async fn run(&self, actions: &[Action]) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            debug!(index, total = actions.len(), "next action");
            results.push(self.step(action).await);
        }
        self.log_summary(&results);
        results
    }

    /// Like [`run`](Self::run) for undecoded actions. Items that fail to decode become
    /// `MalformedAction` results in their own slot and the rest still run.
    pub async fn run_raw(&self, values: &[Value]) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(values.len());
        for value in values {
            let result = match Action::from_value(value.clone()) {
                Ok(action) => self.step(&action).await,
                Err(err) => ExecutionResult::failed(None, &err),
            };
            results.push(result);
        }
        self.log_summary(&results);
        results
    }

    async fn step(&self, action: &Action) -> ExecutionResult {
        let context = read_context(self.executor.page(), self.executor.registry());
        let result = self.executor.execute(action, &context).await;
        settle(self.executor.timings().inter_action_ms).await;
        result
    }

    fn log_summary(&self, results: &[ExecutionResult]) {
        let failed = results.iter().filter(|r| !r.success).count();
        info!(total = results.len(), failed, "sequence finished");
    }
}
