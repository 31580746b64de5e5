//! The live document as the executor sees it.
//!
//! Node references handed out by [`Page::query_all`] are only meaningful until the next
//! suspension point. Re-renders on the storefront can detach them at any time, so callers
//! re-query after every await instead of holding on to a [`NodeRef`].

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::PageError;

/// Opaque handle to an element in the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef(pub u64);

/// Which event to dispatch after writing a control's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueEvent {
    None,
    Input,
    Change,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
}

/// Point-in-time snapshot of one element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElementInfo {
    /// Lowercase tag name.
    pub tag: String,
    pub input_type: Option<String>,
    /// The `name` attribute; radio buttons sharing one form a group.
    pub name: Option<String>,
    pub value: Option<String>,
    /// Trimmed text content.
    pub text: String,
    /// Text of the associated `<label>`, or of the next sibling when there is none.
    pub label: Option<String>,
    pub href: Option<String>,
    pub disabled: bool,
    pub options: Vec<SelectOption>,
}

impl ElementInfo {
    pub fn is_select(&self) -> bool {
        self.tag == "select"
    }

    pub fn is_radio(&self) -> bool {
        self.input_type.as_deref() == Some("radio")
    }

    /// Case-insensitive substring match against value, text and label.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [self.value.as_deref(), Some(self.text.as_str()), self.label.as_deref()]
            .into_iter()
            .flatten()
            .any(|hay| !hay.is_empty() && hay.to_lowercase().contains(&needle))
    }
}

/// Synchronous access to the storefront document.
///
/// Implementations must re-query the document on every call; nothing here may cache elements.
pub trait Page: Send + Sync {
    fn url(&self) -> Result<String, PageError>;
    fn title(&self) -> Result<String, PageError>;

    /// All elements matching `selector` in document order, optionally below `scope`.
    fn query_all(&self, selector: &str, scope: Option<NodeRef>)
    -> Result<Vec<NodeRef>, PageError>;
    fn describe(&self, node: NodeRef) -> Result<ElementInfo, PageError>;
    fn closest_form(&self, node: NodeRef) -> Result<Option<NodeRef>, PageError>;

    fn click(&self, node: NodeRef) -> Result<(), PageError>;
    fn focus(&self, node: NodeRef) -> Result<(), PageError>;
    fn set_value(&self, node: NodeRef, value: &str, event: ValueEvent) -> Result<(), PageError>;
    /// Appends one character to the control's value and dispatches a single `input` event.
    fn append_char(&self, node: NodeRef, ch: char) -> Result<(), PageError>;
    fn press_enter(&self, node: NodeRef) -> Result<(), PageError>;
    fn submit_form(&self, form: NodeRef) -> Result<(), PageError>;
    /// Dispatches `mouseenter` followed by `mouseover`.
    fn hover(&self, node: NodeRef) -> Result<(), PageError>;
    fn set_attribute(&self, node: NodeRef, name: &str, value: &str) -> Result<(), PageError>;
    fn remove(&self, node: NodeRef) -> Result<(), PageError>;

    fn navigate(&self, url: &str) -> Result<(), PageError>;
    fn open_in_new_context(&self, url: &str) -> Result<(), PageError>;
    fn history_back(&self) -> Result<(), PageError>;
    fn history_forward(&self) -> Result<(), PageError>;
    fn reload(&self) -> Result<(), PageError>;

    fn viewport_height(&self) -> Result<f64, PageError>;
    fn document_height(&self) -> Result<f64, PageError>;
    /// Smooth scroll; returns without waiting for the animation.
    fn scroll_by(&self, delta_y: f64) -> Result<(), PageError>;
    fn scroll_to(&self, top: f64) -> Result<(), PageError>;

    /// Ticks whenever the document's subtree changes.
    fn changes(&self) -> watch::Receiver<u64>;

    fn first(&self, selector: &str, scope: Option<NodeRef>) -> Result<Option<NodeRef>, PageError> {
        Ok(self.query_all(selector, scope)?.into_iter().next())
    }

    fn exists(&self, selector: &str) -> bool {
        matches!(self.first(selector, None), Ok(Some(_)))
    }
}

/// Quotes `value` for use inside a double-quoted CSS attribute selector.
pub fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}
