use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::action::Action;
use crate::error::{ActionError, FailureKind};

/// Outcome of one action. Built once by the executor and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// `None` only when the input could not be decoded into an action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    pub success: bool,
    pub message: String,
    /// Populated by read actions only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl ExecutionResult {
    pub fn succeeded(action: &Action, message: String, value: Option<Value>) -> Self {
        Self {
            action: Some(action.clone()),
            success: true,
            message,
            value,
            failure: None,
        }
    }

    pub fn failed(action: Option<&Action>, error: &ActionError) -> Self {
        let message = match action {
            Some(action) => format!("Could not {}: {error}.", action.describe()),
            None => format!("Could not run that action: {error}."),
        };
        Self {
            action: action.cloned(),
            success: false,
            message,
            value: None,
            failure: Some(error.kind()),
        }
    }
}
