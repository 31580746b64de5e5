//! Boundary to the language model that turns a spoken command into actions.
//!
//! The model is asked for `{"speech": "...", "action": {...} | null, "followUp": [...]}`.
//! Whatever comes back is checked here before anything reaches the executor: output that
//! does not parse, or that proposes any invalid action, is replaced by a single apology.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::action::Action;
use crate::context::PageContext;
use crate::error::ActionError;

pub const APOLOGY: &str = "Sorry, I couldn't work out how to do that. Please try rephrasing.";

#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("interpreter request failed: {0}")]
    Request(String),

    #[error("interpreter API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("model reply has no content")]
    Empty,

    #[error("model reply is not the expected JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model proposed an invalid action: {0}")]
    InvalidAction(#[from] ActionError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretRequest {
    pub command: String,
    pub current_url: String,
    pub page_context: PageContext,
}

impl InterpretRequest {
    pub fn new(command: impl Into<String>, page_context: PageContext) -> Self {
        Self {
            command: command.into(),
            current_url: page_context.url.clone(),
            page_context,
        }
    }
}

/// The normalized model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub speech: String,
    pub actions: Vec<Action>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelReply {
    speech: String,
    #[serde(default)]
    action: Option<Value>,
    #[serde(default)]
    follow_up: Option<Value>,
}

impl Interpretation {
    pub fn apology() -> Self {
        Self {
            speech: APOLOGY.to_string(),
            actions: vec![Action::Inform {
                message: APOLOGY.to_string(),
            }],
        }
    }

    /// Parses raw model text, failing on anything that is not a fully valid reply.
    pub fn parse(raw: &str) -> Result<Self, InterpreterError> {
        let body = json_body(raw).ok_or(InterpreterError::Empty)?;
        let reply: ModelReply = serde_json::from_str(body)?;

        let mut values = Vec::new();
        values.extend(reply.action.filter(|v| !v.is_null()));
        match reply.follow_up {
            Some(Value::Array(items)) => values.extend(items),
            Some(Value::Null) | None => {}
            Some(single) => values.push(single),
        }

        let actions = values
            .into_iter()
            .map(|value| Action::from_value(normalize_legacy(value)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            speech: reply.speech,
            actions,
        })
    }

    /// Like [`parse`](Self::parse), with any failure turned into the apology.
    pub fn from_model_output(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|err| {
            warn!(error = %err, "discarding model output");
            Self::apology()
        })
    }
}

/// Strips Markdown code fences and any prose around the outermost JSON object.
fn json_body(raw: &str) -> Option<&str> {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}

fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for ch in name.chars() {
        if ch == '_' {
            upper = true;
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Rewrites the older `{"type": "add_to_cart", "payload": {...}}` shape into the flat
/// camelCase form. Current-shape actions pass through untouched.
fn normalize_legacy(value: Value) -> Value {
    let Value::Object(mut object) = value else {
        return value;
    };
    let renamed = match object.get("type") {
        Some(Value::String(kind)) if kind.contains('_') => Some(camel_case(kind)),
        _ => None,
    };
    if let Some(renamed) = renamed {
        object.insert("type".into(), Value::String(renamed));
    }
    if let Some(Value::Object(payload)) = object.remove("payload") {
        for (key, field) in payload {
            object.entry(camel_case(&key)).or_insert(field);
        }
    }
    if object.get("type").and_then(Value::as_str) == Some("navigate")
        && !object.contains_key("destination")
    {
        let target = object.remove("path").or_else(|| object.remove("url"));
        if let Some(target) = target {
            object.insert("destination".into(), target);
        }
    }
    Value::Object(object)
}

#[async_trait]
pub trait CommandInterpreter: Send + Sync {
    async fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation, InterpreterError>;
}

/// Asks `interpreter`, apologizing instead of failing when the call or its output goes wrong.
pub async fn interpret_or_apologize(
    interpreter: &dyn CommandInterpreter,
    request: &InterpretRequest,
) -> Interpretation {
    match interpreter.interpret(request).await {
        Ok(interpretation) => interpretation,
        Err(err) => {
            warn!(error = %err, command = request.command.as_str(), "interpretation failed");
            Interpretation::apology()
        }
    }
}
