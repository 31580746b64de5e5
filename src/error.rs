//! Failure taxonomy shared by the executor, sequencer and bridge.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::page::NodeRef;

/// Errors raised by a [`crate::page::Page`] implementation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PageError {
    /// The node reference no longer points at an attached element.
    #[error("element {0:?} is no longer attached to the document")]
    Detached(NodeRef),

    /// The selector could not be evaluated by the document.
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    /// Script evaluation or protocol failure in the browser.
    #[error("browser error: {0}")]
    Script(String),
}

/// Why a single action did not do anything.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    #[error("{0} not found on this page")]
    NotFound(String),

    #[error("{0} is disabled")]
    Disabled(String),

    #[error("'{selector}' did not appear within {timeout_ms}ms")]
    Timeout { selector: String, timeout_ms: u64 },

    #[error("malformed action: {0}")]
    Malformed(String),

    #[error("receiving side unreachable: {0}")]
    TransportUnreachable(String),

    #[error(transparent)]
    Page(#[from] PageError),
}

impl ActionError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ActionError::NotFound(_) => FailureKind::NotFound,
            ActionError::Disabled(_) => FailureKind::Disabled,
            ActionError::Timeout { .. } => FailureKind::Timeout,
            ActionError::Malformed(_) => FailureKind::MalformedAction,
            ActionError::TransportUnreachable(_) => FailureKind::TransportUnreachable,
            ActionError::Page(_) => FailureKind::Page,
        }
    }
}

/// Class of failure recorded on an [`crate::ExecutionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    NotFound,
    Disabled,
    Timeout,
    MalformedAction,
    TransportUnreachable,
    Page,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_missing_thing() {
        let err = ActionError::not_found("add to cart button");
        assert_eq!(err.to_string(), "add to cart button not found on this page");

        let err = ActionError::Timeout {
            selector: ".results".into(),
            timeout_ms: 100,
        };
        assert_eq!(err.to_string(), "'.results' did not appear within 100ms");
    }

    #[test]
    fn page_errors_classify_as_page_failures() {
        let err: ActionError = PageError::Script("target closed".into()).into();
        assert_eq!(err.kind(), FailureKind::Page);
        assert_eq!(err.to_string(), "browser error: target closed");
    }
}
