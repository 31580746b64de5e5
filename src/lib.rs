//! Voice-driven shopping on a live storefront page.
//!
//! A command is interpreted into [`Action`]s, which the [`ActionSequencer`] runs one by one
//! through the [`ActionExecutor`] against a [`Page`]. The agent binary supplies the page
//! (Chrome over CDP), the interpreter (a hosted model) and the capture surface.

pub mod action;
pub mod assistant;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod interpreter;
pub mod page;
pub mod result;
pub mod selectors;
pub mod sequencer;
pub mod transport;
pub mod wait;

#[cfg(test)]
pub(crate) mod testing;

pub use action::Action;
pub use assistant::{Assistant, CommandOutcome};
pub use config::{AssistantConfig, Timings};
pub use context::{PageContext, PageType, read_context};
pub use error::{ActionError, FailureKind, PageError};
pub use executor::ActionExecutor;
pub use interpreter::{CommandInterpreter, InterpretRequest, Interpretation, InterpreterError};
pub use page::{ElementInfo, NodeRef, Page, SelectOption, ValueEvent};
pub use result::ExecutionResult;
pub use selectors::{Role, SelectorRegistry};
pub use sequencer::ActionSequencer;
pub use transport::{Bridge, ChannelListener, ChannelTransport, Envelope, MessageType, Transport, TransportError};
