//! Logical element roles and their theme-tolerant selector candidates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PageError;
use crate::page::{NodeRef, Page, css_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SearchBox,
    SearchButton,
    CartIcon,
    HomeLink,
    CatalogLink,
    ProductLink,
    AddToCartButton,
    QuantityInput,
    VariantControl,
    CartItem,
    CartQuantity,
    CartRemove,
    CheckoutButton,
    DiscountInput,
    DiscountButton,
    FacetOption,
    SortSelect,
    PriceBucket,
    PriceMinInput,
    PriceMaxInput,
    ColorOption,
    SizeOption,
    ShippingForm,
    LoadingIndicator,
    ErrorMessage,
    CartBadge,
    Clickable,
}

impl Role {
    pub const ALL: [Role; 27] = [
        Role::SearchBox,
        Role::SearchButton,
        Role::CartIcon,
        Role::HomeLink,
        Role::CatalogLink,
        Role::ProductLink,
        Role::AddToCartButton,
        Role::QuantityInput,
        Role::VariantControl,
        Role::CartItem,
        Role::CartQuantity,
        Role::CartRemove,
        Role::CheckoutButton,
        Role::DiscountInput,
        Role::DiscountButton,
        Role::FacetOption,
        Role::SortSelect,
        Role::PriceBucket,
        Role::PriceMinInput,
        Role::PriceMaxInput,
        Role::ColorOption,
        Role::SizeOption,
        Role::ShippingForm,
        Role::LoadingIndicator,
        Role::ErrorMessage,
        Role::CartBadge,
        Role::Clickable,
    ];

    /// Built-in candidates, most specific first. Covers Dawn-style and older themes.
    fn defaults(self) -> &'static [&'static str] {
        match self {
            Role::SearchBox => &[
                r#"input[type="search"]"#,
                r#"input[name="q"]"#,
                ".search-input",
                r#"[data-testid="search"]"#,
                ".header__search input",
                "#Search",
            ],
            Role::SearchButton => &[
                ".search-button",
                ".header__search button",
                r#"button[type="submit"]"#,
                r#"input[type="submit"]"#,
            ],
            Role::CartIcon => &[
                "#cart-icon-bubble",
                ".header__icon--cart",
                ".cart-icon",
                r#"[data-testid="cart"]"#,
                r#"a[href="/cart"]"#,
            ],
            Role::HomeLink => &[
                r#"a[href="/"]"#,
                ".header__heading-link",
                ".logo",
                ".header__heading",
            ],
            Role::CatalogLink => &[
                r#"a[href*="catalog"]"#,
                r#"a[href*="collection"]"#,
                ".header__inline-menu a:nth-child(2)",
            ],
            Role::ProductLink => &[
                ".product-item a",
                ".card__heading a",
                ".product-card-wrapper a",
                ".grid__item .card__content a",
                ".product-link",
            ],
            Role::AddToCartButton => &[
                ".btn--add-to-cart",
                r#"[name="add"]"#,
                ".product-form__cart-submit",
                ".product-form__submit",
                "#AddToCart",
            ],
            Role::QuantityInput => &[r#"input[name="quantity"]"#, ".quantity__input", "#Quantity"],
            Role::VariantControl => &[
                ".product-form__input select",
                ".product-form__input input[type=\"radio\"]",
                ".variant-input",
                r#"select[name*="id"]"#,
                ".product-option select",
            ],
            Role::CartItem => &[".cart-item", ".cart__item", ".line-item"],
            Role::CartQuantity => &[
                ".cart-quantity",
                ".quantity-input",
                ".cart-item input.quantity__input",
                r#"input[name*="quantity"]"#,
                r#"input[name="updates[]"]"#,
            ],
            Role::CartRemove => &[
                "cart-remove-button a",
                ".cart-remove",
                ".remove-item",
                r#"[data-action="remove"]"#,
            ],
            Role::CheckoutButton => &[
                "#checkout",
                r#"[name="checkout"]"#,
                ".cart__checkout-button",
                ".checkout-button",
                r#"[data-testid="checkout"]"#,
                ".btn--checkout",
            ],
            Role::DiscountInput => &[
                "#discount-code",
                ".discount-input",
                ".coupon-input",
                r#"input[name="discount"]"#,
            ],
            Role::DiscountButton => &[
                ".discount-button",
                ".coupon-apply",
                r#"[data-action="apply-discount"]"#,
            ],
            Role::FacetOption => &[
                ".facet-checkbox",
                ".filter-button",
                ".collection-filter input",
                ".facets__item input",
            ],
            Role::SortSelect => &["#SortBy", "#sort-by", ".sort-select", ".collection-sort select"],
            Role::PriceBucket => &[".price-filter", ".facet-checkbox", ".price-range"],
            Role::PriceMinInput => &[
                r#"input[name*="price_min"]"#,
                r#"input[name*="price.gte"]"#,
                r#"input[placeholder*="min"]"#,
            ],
            Role::PriceMaxInput => &[
                r#"input[name*="price_max"]"#,
                r#"input[name*="price.lte"]"#,
                r#"input[placeholder*="max"]"#,
            ],
            Role::ColorOption => &[".color-swatch", ".color-filter", r#"input[name*="color"]"#],
            Role::SizeOption => &[".size-option", ".size-filter", r#"input[name*="size"]"#],
            Role::ShippingForm => &["#shipping-address", ".shipping-form", "form[data-shipping]"],
            Role::LoadingIndicator => &[".loading", ".spinner", ".loader", ".loading-overlay:not(.hidden)"],
            Role::ErrorMessage => &[".error", ".alert-error", ".notice--error", ".form__message--error"],
            Role::CartBadge => &[
                ".cart-count-bubble span",
                ".cart-count",
                ".cart-badge",
                "[data-cart-count]",
                ".header__icon--cart .badge",
            ],
            Role::Clickable => &["a", "button", r#"input[type="submit"]"#],
        }
    }
}

/// Maps each role to its ordered candidates. The first candidate that matches anything wins.
#[derive(Debug, Clone)]
pub struct SelectorRegistry {
    candidates: HashMap<Role, Vec<String>>,
}

impl Default for SelectorRegistry {
    fn default() -> Self {
        let candidates = Role::ALL
            .iter()
            .map(|role| {
                let list = role.defaults().iter().map(|s| s.to_string()).collect();
                (*role, list)
            })
            .collect();
        Self { candidates }
    }
}

impl SelectorRegistry {
    /// Built-in candidates with `overrides` tried first for their roles.
    pub fn with_overrides(overrides: &HashMap<Role, Vec<String>>) -> Self {
        let mut registry = Self::default();
        for (role, extra) in overrides {
            let list = registry.candidates.entry(*role).or_default();
            let mut merged = extra.clone();
            merged.extend(list.drain(..).filter(|c| !extra.contains(c)));
            *list = merged;
        }
        registry
    }

    pub fn candidates(&self, role: Role) -> &[String] {
        self.candidates.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First element for `role`, or `None` when this page has no such element.
    pub fn resolve(&self, page: &dyn Page, role: Role) -> Result<Option<NodeRef>, PageError> {
        self.resolve_scoped(page, role, None)
    }

    pub fn resolve_within(
        &self,
        page: &dyn Page,
        scope: NodeRef,
        role: Role,
    ) -> Result<Option<NodeRef>, PageError> {
        self.resolve_scoped(page, role, Some(scope))
    }

    fn resolve_scoped(
        &self,
        page: &dyn Page,
        role: Role,
        scope: Option<NodeRef>,
    ) -> Result<Option<NodeRef>, PageError> {
        Ok(self.resolve_all_scoped(page, role, scope)?.into_iter().next())
    }

    /// Every element matched by the first candidate that matches anything.
    pub fn resolve_all(&self, page: &dyn Page, role: Role) -> Result<Vec<NodeRef>, PageError> {
        self.resolve_all_scoped(page, role, None)
    }

    pub fn resolve_all_scoped(
        &self,
        page: &dyn Page,
        role: Role,
        scope: Option<NodeRef>,
    ) -> Result<Vec<NodeRef>, PageError> {
        for candidate in self.candidates(role) {
            let nodes = page.query_all(candidate, scope)?;
            if !nodes.is_empty() {
                debug!(?role, candidate = candidate.as_str(), count = nodes.len(), "resolved");
                return Ok(nodes);
            }
        }
        debug!(?role, "no candidate matched");
        Ok(Vec::new())
    }

    /// Every element matched by any candidate, in document order.
    pub fn resolve_any(&self, page: &dyn Page, role: Role) -> Result<Vec<NodeRef>, PageError> {
        let combined = self.candidates(role).join(", ");
        if combined.is_empty() {
            return Ok(Vec::new());
        }
        page.query_all(&combined, None)
    }

    /// The container a theme renders for one product, by its `data-product-id`.
    pub fn product_container(
        &self,
        page: &dyn Page,
        product_id: &str,
    ) -> Result<Option<NodeRef>, PageError> {
        page.first(&product_selector(product_id), None)
    }
}

pub fn product_selector(product_id: &str) -> String {
    format!("[data-product-id={}]", css_string(product_id))
}
