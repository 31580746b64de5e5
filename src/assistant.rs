//! The execution side of a command: read the page, interpret, act, report.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Timings;
use crate::context::read_context;
use crate::executor::ActionExecutor;
use crate::interpreter::{CommandInterpreter, InterpretRequest, interpret_or_apologize};
use crate::page::Page;
use crate::result::ExecutionResult;
use crate::selectors::SelectorRegistry;
use crate::sequencer::ActionSequencer;
use crate::transport::{Envelope, MessageType};

/// What one spoken command produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub speech: String,
    pub results: Vec<ExecutionResult>,
}

impl CommandOutcome {
    /// The model's speech followed by every failure message, so partial success is heard.
    pub fn spoken_summary(&self) -> String {
        let mut parts = vec![self.speech.trim().to_string()];
        parts.extend(
            self.results
                .iter()
                .filter(|r| !r.success)
                .map(|r| r.message.clone()),
        );
        parts.retain(|p| !p.is_empty());
        parts.join(" ")
    }
}

pub struct Assistant<'a> {
    page: &'a dyn Page,
    registry: &'a SelectorRegistry,
    timings: &'a Timings,
    interpreter: &'a dyn CommandInterpreter,
}

impl<'a> Assistant<'a> {
    pub fn new(
        page: &'a dyn Page,
        registry: &'a SelectorRegistry,
        timings: &'a Timings,
        interpreter: &'a dyn CommandInterpreter,
    ) -> Self {
        Self {
            page,
            registry,
            timings,
            interpreter,
        }
    }

    fn sequencer(&self) -> ActionSequencer<'a> {
        ActionSequencer::new(ActionExecutor::new(self.page, self.registry, self.timings))
    }

    pub async fn handle_command(&self, command: &str) -> CommandOutcome {
        let context = read_context(self.page, self.registry);
        info!(command, page = ?context.page_type, "interpreting");
        let request = InterpretRequest::new(command, context);
        let interpretation = interpret_or_apologize(self.interpreter, &request).await;
        info!(
            speech = interpretation.speech.as_str(),
            actions = interpretation.actions.len(),
            "interpreted"
        );

        let results = self.sequencer().run(&interpretation.actions).await;
        CommandOutcome {
            speech: interpretation.speech,
            results,
        }
    }

    /// Answers one request envelope. Reply-typed envelopes are refused with an error reply.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Envelope {
        match envelope.kind {
            MessageType::ExecuteCommand => match envelope.command.as_deref().map(str::trim) {
                Some(command) if !command.is_empty() => {
                    let outcome = self.handle_command(command).await;
                    Envelope::command_result(outcome.spoken_summary(), outcome.results)
                }
                _ => Envelope::error("executeCommand needs a non-empty command"),
            },
            MessageType::ExecuteAction => {
                let values = envelope.action_values();
                if values.is_empty() {
                    return Envelope::error("executeAction needs an action");
                }
                Envelope::action_result(self.sequencer().run_raw(&values).await)
            }
            MessageType::GetContext => Envelope::context(read_context(self.page, self.registry)),
            other => Envelope::error(format!("{other:?} is a reply, not a request")),
        }
    }
}
