//! Messaging between the capture surface and the execution side.
//!
//! Both sides exchange [`Envelope`]s. Callers go through a [`Bridge`], which bounds every
//! request so a missing or silent receiver surfaces as a [`TransportError`] instead of a hang.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::action::Action;
use crate::context::PageContext;
use crate::error::ActionError;
use crate::result::ExecutionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageType {
    ExecuteCommand,
    ExecuteAction,
    GetContext,
    CommandResult,
    ActionResult,
    Context,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// One action object or an array of them, left undecoded until it reaches the executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<PageContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ExecutionResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    fn of(kind: MessageType) -> Self {
        Self {
            kind,
            command: None,
            action: None,
            context: None,
            speech: None,
            results: None,
            error: None,
        }
    }

    pub fn execute_command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::of(MessageType::ExecuteCommand)
        }
    }

    pub fn execute_action(action: &Action) -> Self {
        Self::execute_raw(action.to_value())
    }

    pub fn execute_raw(action: Value) -> Self {
        Self {
            action: Some(action),
            ..Self::of(MessageType::ExecuteAction)
        }
    }

    pub fn get_context() -> Self {
        Self::of(MessageType::GetContext)
    }

    pub fn command_result(speech: impl Into<String>, results: Vec<ExecutionResult>) -> Self {
        Self {
            speech: Some(speech.into()),
            results: Some(results),
            ..Self::of(MessageType::CommandResult)
        }
    }

    pub fn action_result(results: Vec<ExecutionResult>) -> Self {
        Self {
            results: Some(results),
            ..Self::of(MessageType::ActionResult)
        }
    }

    pub fn context(context: PageContext) -> Self {
        Self {
            context: Some(context),
            ..Self::of(MessageType::Context)
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::of(MessageType::Error)
        }
    }

    /// The carried action payload as a list, whether it was sent as one object or an array.
    pub fn action_values(&self) -> Vec<Value> {
        match &self.action {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single.clone()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("execution side unreachable: {0}")]
    Unreachable(String),

    #[error("no reply within {}ms", .0.as_millis())]
    TimedOut(Duration),
}

impl From<TransportError> for ActionError {
    fn from(err: TransportError) -> Self {
        ActionError::TransportUnreachable(err.to_string())
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers `envelope` and waits for the reply.
    async fn send(&self, envelope: Envelope) -> Result<Envelope, TransportError>;
}

/// A transport with a bound on how long any request may wait for its reply.
pub struct Bridge<T> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> Bridge<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub async fn request(&self, envelope: Envelope) -> Result<Envelope, TransportError> {
        let kind = envelope.kind;
        match tokio::time::timeout(self.timeout, self.transport.send(envelope)).await {
            Ok(reply) => reply,
            Err(_) => {
                debug!(?kind, timeout = ?self.timeout, "request timed out");
                Err(TransportError::TimedOut(self.timeout))
            }
        }
    }
}

/// A request waiting on the execution side, with the means to answer it.
#[derive(Debug)]
pub struct Incoming {
    pub envelope: Envelope,
    responder: oneshot::Sender<Envelope>,
}

impl Incoming {
    /// True once the requester stopped waiting, for example after its bridge timed out.
    pub fn is_abandoned(&self) -> bool {
        self.responder.is_closed()
    }

    pub fn respond(self, reply: Envelope) {
        if self.responder.send(reply).is_err() {
            debug!("requester gave up before the reply was ready");
        }
    }
}

/// In-process transport: requests travel over an mpsc queue, replies over a oneshot.
#[derive(Clone)]
pub struct ChannelTransport {
    requests: mpsc::Sender<Incoming>,
}

pub struct ChannelListener {
    requests: mpsc::Receiver<Incoming>,
}

impl ChannelListener {
    pub async fn recv(&mut self) -> Option<Incoming> {
        self.requests.recv().await
    }
}

pub fn channel(capacity: usize) -> (ChannelTransport, ChannelListener) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        ChannelTransport { requests: tx },
        ChannelListener { requests: rx },
    )
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, envelope: Envelope) -> Result<Envelope, TransportError> {
        let (responder, reply) = oneshot::channel();
        self.requests
            .send(Incoming {
                envelope,
                responder,
            })
            .await
            .map_err(|_| TransportError::Unreachable("no listener".into()))?;
        reply
            .await
            .map_err(|_| TransportError::Unreachable("request dropped without a reply".into()))
    }
}
