//! Runs one normalized action against the live page.
//!
//! [`ActionExecutor::execute`] dispatches on the action variant to a handler in one of the
//! submodules. Handlers return `Result<Outcome, ActionError>`; the executor turns that into an
//! [`ExecutionResult`] so nothing escapes as an error.
//!
//! Handlers re-resolve elements after every await. A node obtained before a settle delay or
//! keystroke pause may already be detached by the storefront's own re-rendering.

mod cart;
mod catalog;
mod element;
mod navigation;

use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::action::Action;
use crate::config::Timings;
use crate::context::PageContext;
use crate::error::ActionError;
use crate::page::{NodeRef, Page};
use crate::result::ExecutionResult;
use crate::selectors::{Role, SelectorRegistry};

/// What a successful handler reports back.
#[derive(Debug)]
pub(crate) struct Outcome {
    message: String,
    value: Option<Value>,
}

impl Outcome {
    fn done(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            value: None,
        }
    }

    fn with_value(message: impl Into<String>, value: Value) -> Self {
        Self {
            message: message.into(),
            value: Some(value),
        }
    }
}

type Handled = Result<Outcome, ActionError>;

#[derive(Clone, Copy)]
pub struct ActionExecutor<'a> {
    page: &'a dyn Page,
    registry: &'a SelectorRegistry,
    timings: &'a Timings,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(page: &'a dyn Page, registry: &'a SelectorRegistry, timings: &'a Timings) -> Self {
        Self {
            page,
            registry,
            timings,
        }
    }

    pub fn page(&self) -> &'a dyn Page {
        self.page
    }

    pub fn registry(&self) -> &'a SelectorRegistry {
        self.registry
    }

    pub fn timings(&self) -> &'a Timings {
        self.timings
    }

    /// Performs `action` given a context read just before the call.
    pub async fn execute(&self, action: &Action, context: &PageContext) -> ExecutionResult {
        info!(action = action.name(), page = ?context.page_type, "executing");
        let handled = match action.validate() {
            Ok(()) => self.dispatch(action, context).await,
            Err(err) => Err(err),
        };
        match handled {
            Ok(outcome) => {
                info!(action = action.name(), message = outcome.message.as_str(), "done");
                ExecutionResult::succeeded(action, outcome.message, outcome.value)
            }
            Err(err) => {
                warn!(action = action.name(), error = %err, "action failed");
                ExecutionResult::failed(Some(action), &err)
            }
        }
    }

    async fn dispatch(&self, action: &Action, context: &PageContext) -> Handled {
        match action {
            Action::Navigate {
                destination,
                target,
            } => self.navigate(destination, *target).await,
            Action::Search { query, filters } => self.search(query, filters).await,
            Action::AddToCart {
                product_id,
                quantity,
                variant,
            } => {
                self.add_to_cart(
                    context,
                    product_id.as_deref(),
                    *quantity,
                    variant.as_deref(),
                )
                .await
            }
            Action::GoToCart => self.open_cart().await,
            Action::GoToCheckout {
                skip_to_payment,
                shipping_fields,
            } => {
                self.checkout(context, *skip_to_payment, shipping_fields)
                    .await
            }
            Action::ClickElement {
                selector,
                text,
                wait_for,
            } => {
                self.click_element(selector.as_deref(), text.as_deref(), wait_for.as_deref())
                    .await
            }
            Action::Scroll { direction, amount } => self.scroll(*direction, *amount),
            Action::Sort { by, order } => self.sort(by, *order),
            Action::Filter { category, value } => self.apply_filter(*category, value),
            Action::ApplyDiscount { code } => self.apply_discount(context, code).await,
            Action::UpdateQuantity {
                quantity,
                product_id,
            } => {
                self.update_quantity(context, *quantity, product_id.as_deref())
                    .await
            }
            Action::RemoveFromCart { product_id } => {
                self.remove_from_cart(context, product_id.as_deref()).await
            }
            Action::Hover { selector } => self.hover(selector),
            Action::GetText { selector } => self.get_text(selector),
            Action::SetAttribute {
                selector,
                attribute,
                value,
            } => self.set_attribute(selector, attribute, value),
            Action::RemoveElement { selector } => self.remove_element(selector),
            Action::Wait { duration_ms } => self.wait(*duration_ms).await,
            Action::Back => self.back(),
            Action::Inform { message } => Ok(Outcome::done(message.clone())),
            Action::SelectVariant { value } => self.select_variant(value).await,
            Action::RefreshPage => self.refresh(),
        }
    }

    /// Resolves `role` or reports `what` as missing.
    fn require(&self, role: Role, what: &str) -> Result<NodeRef, ActionError> {
        self.registry
            .resolve(self.page, role)?
            .ok_or_else(|| ActionError::not_found(what))
    }

    fn require_within(&self, scope: NodeRef, role: Role, what: &str) -> Result<NodeRef, ActionError> {
        self.registry
            .resolve_within(self.page, scope, role)?
            .ok_or_else(|| ActionError::not_found(what))
    }

    fn require_selector(&self, selector: &str) -> Result<NodeRef, ActionError> {
        self.page
            .first(selector, None)?
            .ok_or_else(|| ActionError::not_found(format!("element '{selector}'")))
    }

    fn require_product(&self, product_id: &str) -> Result<NodeRef, ActionError> {
        self.registry
            .product_container(self.page, product_id)?
            .ok_or_else(|| ActionError::not_found(format!("product {product_id}")))
    }

    /// `path` resolved against the current store's origin.
    fn store_url(&self, path: &str) -> Result<Url, ActionError> {
        let current = self.page.url()?;
        let base = Url::parse(&current)
            .map_err(|e| ActionError::malformed(format!("current URL '{current}' is unusable: {e}")))?;
        base.join(path)
            .map_err(|e| ActionError::malformed(format!("cannot resolve '{path}': {e}")))
    }
}

/// Lowercases and folds punctuation to single spaces, so "Under $50" matches "under-50".
pub(crate) fn fold(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
