use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::{ActionExecutor, Handled, Outcome};
use crate::context::{PageContext, PageType};
use crate::error::ActionError;
use crate::page::{ElementInfo, NodeRef, ValueEvent, css_string};
use crate::selectors::Role;
use crate::wait::settle;

fn exactly(info: &ElementInfo, wanted: &str) -> bool {
    let wanted = wanted.trim();
    [info.value.as_deref(), info.label.as_deref()]
        .into_iter()
        .flatten()
        .any(|text| text.trim().eq_ignore_ascii_case(wanted))
}

impl ActionExecutor<'_> {
    /// Clicks `button` unless the storefront has disabled it.
    fn click_enabled(&self, button: NodeRef, what: &str) -> Result<(), ActionError> {
        if self.page.describe(button)?.disabled {
            return Err(ActionError::Disabled(what.to_string()));
        }
        self.page.click(button)?;
        Ok(())
    }

    pub(super) async fn add_to_cart(
        &self,
        context: &PageContext,
        product_id: Option<&str>,
        quantity: u32,
        variant: Option<&str>,
    ) -> Handled {
        if context.page_type == PageType::Product {
            if quantity != 1 {
                let input = self.require(Role::QuantityInput, "quantity field")?;
                self.page
                    .set_value(input, &quantity.to_string(), ValueEvent::Change)?;
            }
            if let Some(variant) = variant {
                self.select_variant(variant).await?;
            }
            let button = self.require(Role::AddToCartButton, "add to cart button")?;
            self.click_enabled(button, "add to cart button")?;
        } else if let Some(id) = product_id {
            let container = self.require_product(id)?;
            let button =
                self.require_within(container, Role::AddToCartButton, "add to cart button")?;
            self.click_enabled(button, "add to cart button")?;
        } else {
            return Err(ActionError::not_found("product to add"));
        }
        settle(self.timings.add_to_cart_settle_ms).await;

        let message = match quantity {
            1 => "Added to the cart".to_string(),
            n => format!("Added {n} to the cart"),
        };
        Ok(Outcome::done(message))
    }

    /// Selects `value` on every variant control that offers it.
    ///
    /// Radio buttons are grouped by name and at most one per group is clicked, preferring an
    /// exact value or label match over a substring one. Controls are looked up again by
    /// position after every settle since themes re-render the form on each selection.
    pub(super) async fn select_variant(&self, value: &str) -> Handled {
        let needle = value.trim().to_lowercase();
        let total = self.registry.resolve_any(self.page, Role::VariantControl)?.len();
        let mut chosen_groups = HashSet::new();
        let mut selected = Vec::new();

        for index in 0..total {
            let controls = self.registry.resolve_any(self.page, Role::VariantControl)?;
            let Some(&control) = controls.get(index) else {
                break;
            };
            let info = self.page.describe(control)?;

            if info.is_select() {
                let option = info
                    .options
                    .iter()
                    .find(|o| o.text.trim().eq_ignore_ascii_case(value.trim()))
                    .or_else(|| {
                        info.options
                            .iter()
                            .find(|o| o.text.to_lowercase().contains(&needle))
                    });
                let Some(option) = option else {
                    continue;
                };
                self.page
                    .set_value(control, &option.value, ValueEvent::Change)?;
                selected.push(option.text.trim().to_string());
            } else if info.is_radio() && info.mentions(value) {
                if let Some(group) = &info.name {
                    if !chosen_groups.insert(group.clone()) {
                        continue;
                    }
                }
                let mut pick = (control, info);
                if !exactly(&pick.1, value) {
                    for other in &controls[index + 1..] {
                        let other_info = self.page.describe(*other)?;
                        if other_info.is_radio()
                            && other_info.name == pick.1.name
                            && exactly(&other_info, value)
                        {
                            pick = (*other, other_info);
                            break;
                        }
                    }
                }
                self.page.click(pick.0)?;
                let (_, info) = pick;
                selected.push(info.label.or(info.value).unwrap_or_else(|| value.to_string()));
            } else {
                continue;
            }
            debug!(index, value, "variant selected");
            settle(self.timings.variant_settle_ms).await;
        }

        if selected.is_empty() {
            return Err(ActionError::not_found(format!("variant option '{value}'")));
        }
        Ok(Outcome::done(format!("Selected {}", selected.join(", "))))
    }

    pub(super) async fn update_quantity(
        &self,
        context: &PageContext,
        quantity: u32,
        product_id: Option<&str>,
    ) -> Handled {
        self.ensure_cart(context).await?;
        let input = match product_id {
            Some(id) => {
                let row = self.require_product(id)?;
                self.require_within(row, Role::CartQuantity, "quantity field")?
            }
            None => self.require(Role::CartQuantity, "cart quantity field")?,
        };
        self.page
            .set_value(input, &quantity.to_string(), ValueEvent::Change)?;
        Ok(Outcome::done(format!("Set the quantity to {quantity}")))
    }

    pub(super) async fn remove_from_cart(
        &self,
        context: &PageContext,
        product_id: Option<&str>,
    ) -> Handled {
        self.ensure_cart(context).await?;

        if let Some(id) = product_id {
            let row = self.require_product(id)?;
            let remove = self.require_within(row, Role::CartRemove, "remove button")?;
            self.page.click(remove)?;
            settle(self.timings.removal_settle_ms).await;
            return Ok(Outcome::done("Removed the item from the cart"));
        }

        let count = self.registry.resolve_all(self.page, Role::CartRemove)?.len();
        if count == 0 {
            return Err(ActionError::not_found("remove button"));
        }
        let mut removed = 0;
        for _ in 0..count {
            let Some(remove) = self.registry.resolve(self.page, Role::CartRemove)? else {
                break;
            };
            self.page.click(remove)?;
            removed += 1;
            settle(self.timings.removal_settle_ms).await;
        }
        let message = match removed {
            1 => "Removed 1 item from the cart".to_string(),
            n => format!("Removed {n} items from the cart"),
        };
        Ok(Outcome::done(message))
    }

    pub(super) async fn apply_discount(&self, context: &PageContext, code: &str) -> Handled {
        self.ensure_cart(context).await?;
        let input = self.require(Role::DiscountInput, "discount code field")?;
        let button = self.require(Role::DiscountButton, "discount apply button")?;
        self.page.set_value(input, code, ValueEvent::Input)?;
        self.page.click(button)?;
        settle(self.timings.discount_settle_ms).await;
        Ok(Outcome::done(format!("Applied discount code {code}")))
    }

    pub(super) async fn checkout(
        &self,
        context: &PageContext,
        skip_to_payment: bool,
        shipping_fields: &BTreeMap<String, String>,
    ) -> Handled {
        self.ensure_cart(context).await?;
        let button = self.require(Role::CheckoutButton, "checkout button")?;
        self.click_enabled(button, "checkout button")?;
        settle(self.timings.checkout_settle_ms).await;

        if !skip_to_payment || shipping_fields.is_empty() {
            return Ok(Outcome::done("Went to checkout"));
        }
        let missing = self.fill_shipping_form(shipping_fields).await?;
        let filled = shipping_fields.len() - missing.len();
        let mut message = format!("Went to checkout and filled {filled} shipping fields");
        if !missing.is_empty() {
            message.push_str(&format!("; could not find {}", missing.join(", ")));
        }
        Ok(Outcome::done(message))
    }

    /// Writes each field into the first matching input or select, returning the names of the
    /// fields with no control on the page.
    async fn fill_shipping_form(
        &self,
        fields: &BTreeMap<String, String>,
    ) -> Result<Vec<String>, ActionError> {
        let mut missing = Vec::new();
        for (name, value) in fields {
            let form = self.registry.resolve(self.page, Role::ShippingForm)?;
            let quoted = css_string(name);
            let selector = format!("input[name*={quoted}], select[name*={quoted}]");
            match self.page.first(&selector, form)? {
                Some(control) => {
                    self.page.set_value(control, value, ValueEvent::Change)?;
                }
                None => {
                    debug!(field = name.as_str(), "no shipping control");
                    missing.push(name.clone());
                }
            }
            settle(self.timings.shipping_field_settle_ms).await;
        }
        Ok(missing)
    }
}
