//! The closed vocabulary of storefront actions and its wire form.
//!
//! Actions travel as JSON objects tagged by `type` with camelCase names, e.g.
//! `{"type":"addToCart","productId":"42","quantity":2}`. Decoding goes through
//! [`Action::from_value`], which also enforces the invariants serde cannot express.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ActionError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    Navigate {
        destination: String,
        #[serde(default)]
        target: NavTarget,
    },
    Search {
        query: String,
        #[serde(default, skip_serializing_if = "SearchFilters::is_empty")]
        filters: SearchFilters,
    },
    AddToCart {
        #[serde(
            default,
            deserialize_with = "id_string",
            skip_serializing_if = "Option::is_none"
        )]
        product_id: Option<String>,
        #[serde(default = "one")]
        quantity: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant: Option<String>,
    },
    GoToCart,
    GoToCheckout {
        #[serde(default)]
        skip_to_payment: bool,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        shipping_fields: BTreeMap<String, String>,
    },
    ClickElement {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wait_for: Option<String>,
    },
    Scroll {
        direction: ScrollDirection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<f64>,
    },
    Sort {
        by: String,
        #[serde(default)]
        order: SortOrder,
    },
    Filter {
        category: FilterCategory,
        value: FilterValue,
    },
    ApplyDiscount {
        code: String,
    },
    UpdateQuantity {
        quantity: u32,
        #[serde(
            default,
            deserialize_with = "id_string",
            skip_serializing_if = "Option::is_none"
        )]
        product_id: Option<String>,
    },
    RemoveFromCart {
        #[serde(
            default,
            deserialize_with = "id_string",
            skip_serializing_if = "Option::is_none"
        )]
        product_id: Option<String>,
    },
    Hover {
        selector: String,
    },
    GetText {
        selector: String,
    },
    SetAttribute {
        selector: String,
        attribute: String,
        value: String,
    },
    RemoveElement {
        selector: String,
    },
    Wait {
        duration_ms: u64,
    },
    Back,
    Inform {
        message: String,
    },
    SelectVariant {
        value: String,
    },
    RefreshPage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NavTarget {
    #[default]
    #[serde(rename = "_self")]
    SameContext,
    #[serde(rename = "_blank")]
    NewContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterCategory {
    Price,
    Color,
    Size,
    Category,
}

impl fmt::Display for FilterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterCategory::Price => "price",
            FilterCategory::Color => "color",
            FilterCategory::Size => "size",
            FilterCategory::Category => "category",
        };
        f.write_str(name)
    }
}

/// Either a symbolic value ("under-50", "red", "M") or an explicit price range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Range(PriceRange),
    Text(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Filters requested alongside a search; applied in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<FilterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.color.is_none() && self.size.is_none() && self.category.is_none()
    }

    /// The requested filters as `(category, value)` pairs, price first.
    pub fn entries(&self) -> Vec<(FilterCategory, FilterValue)> {
        let text = |v: &Option<String>| v.clone().map(FilterValue::Text);
        [
            (FilterCategory::Price, self.price.clone()),
            (FilterCategory::Color, text(&self.color)),
            (FilterCategory::Size, text(&self.size)),
            (FilterCategory::Category, text(&self.category)),
        ]
        .into_iter()
        .filter_map(|(category, value)| value.map(|v| (category, v)))
        .collect()
    }
}

fn one() -> u32 {
    1
}

/// Product ids arrive as strings or bare numbers depending on the theme and the model.
fn id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Id>::deserialize(deserializer)?.map(|id| match id {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    }))
}

fn require(field: &str, value: &str) -> Result<(), ActionError> {
    if value.trim().is_empty() {
        Err(ActionError::malformed(format!("`{field}` must not be empty")))
    } else {
        Ok(())
    }
}

fn check_filter(category: FilterCategory, value: &FilterValue) -> Result<(), ActionError> {
    match value {
        FilterValue::Text(text) => require(&category.to_string(), text),
        FilterValue::Range(_) if category != FilterCategory::Price => Err(ActionError::malformed(
            format!("a numeric range is only valid for the price filter, not {category}"),
        )),
        FilterValue::Range(PriceRange { min: None, max: None }) => Err(ActionError::malformed(
            "price range needs `min` or `max`",
        )),
        FilterValue::Range(PriceRange {
            min: Some(min),
            max: Some(max),
        }) if min > max => Err(ActionError::malformed(format!(
            "price range min {min} is above max {max}"
        ))),
        FilterValue::Range(_) => Ok(()),
    }
}

impl Action {
    /// Decodes and validates an action received over the wire.
    pub fn from_value(value: Value) -> Result<Self, ActionError> {
        let action: Action =
            serde_json::from_value(value).map_err(|e| ActionError::malformed(e.to_string()))?;
        action.validate()?;
        Ok(action)
    }

    pub fn to_value(&self) -> Value {
        // Every field is a string, number, bool or string map, so this cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Checks the invariants the type system leaves open.
    pub fn validate(&self) -> Result<(), ActionError> {
        match self {
            Action::Navigate { destination, .. } => require("destination", destination),
            Action::Search { query, filters } => {
                require("query", query)?;
                filters
                    .entries()
                    .iter()
                    .try_for_each(|(category, value)| check_filter(*category, value))
            }
            Action::AddToCart { quantity: 0, .. } => {
                Err(ActionError::malformed("cannot add zero items to the cart"))
            }
            Action::ClickElement { selector, text, .. } => {
                let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
                if present(selector) || present(text) {
                    Ok(())
                } else {
                    Err(ActionError::malformed(
                        "clickElement needs a `selector` or a `text`",
                    ))
                }
            }
            Action::Sort { by, .. } => require("by", by),
            Action::Filter { category, value } => check_filter(*category, value),
            Action::ApplyDiscount { code } => require("code", code),
            Action::Hover { selector }
            | Action::GetText { selector }
            | Action::RemoveElement { selector } => require("selector", selector),
            Action::SetAttribute {
                selector,
                attribute,
                ..
            } => {
                require("selector", selector)?;
                require("attribute", attribute)
            }
            Action::Inform { message } => require("message", message),
            Action::SelectVariant { value } => require("value", value),
            Action::AddToCart { .. }
            | Action::GoToCart
            | Action::GoToCheckout { .. }
            | Action::Scroll { .. }
            | Action::UpdateQuantity { .. }
            | Action::RemoveFromCart { .. }
            | Action::Wait { .. }
            | Action::Back
            | Action::RefreshPage => Ok(()),
        }
    }

    /// The wire tag, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Search { .. } => "search",
            Action::AddToCart { .. } => "addToCart",
            Action::GoToCart => "goToCart",
            Action::GoToCheckout { .. } => "goToCheckout",
            Action::ClickElement { .. } => "clickElement",
            Action::Scroll { .. } => "scroll",
            Action::Sort { .. } => "sort",
            Action::Filter { .. } => "filter",
            Action::ApplyDiscount { .. } => "applyDiscount",
            Action::UpdateQuantity { .. } => "updateQuantity",
            Action::RemoveFromCart { .. } => "removeFromCart",
            Action::Hover { .. } => "hover",
            Action::GetText { .. } => "getText",
            Action::SetAttribute { .. } => "setAttribute",
            Action::RemoveElement { .. } => "removeElement",
            Action::Wait { .. } => "wait",
            Action::Back => "back",
            Action::Inform { .. } => "inform",
            Action::SelectVariant { .. } => "selectVariant",
            Action::RefreshPage => "refreshPage",
        }
    }

    /// Short phrase naming what the action attempts, used in spoken messages.
    pub fn describe(&self) -> String {
        match self {
            Action::Navigate { destination, .. } => format!("go to {destination}"),
            Action::Search { query, .. } => format!("search for \"{query}\""),
            Action::AddToCart {
                product_id: Some(id),
                ..
            } => format!("add product {id} to the cart"),
            Action::AddToCart { .. } => "add this item to the cart".into(),
            Action::GoToCart => "open the cart".into(),
            Action::GoToCheckout { .. } => "go to checkout".into(),
            Action::ClickElement {
                text: Some(text), ..
            } => format!("click \"{text}\""),
            Action::ClickElement { selector, .. } => {
                format!("click {}", selector.as_deref().unwrap_or("the element"))
            }
            Action::Scroll { direction, .. } => format!("scroll {direction:?}").to_lowercase(),
            Action::Sort { by, .. } => format!("sort by {by}"),
            Action::Filter { category, .. } => format!("filter by {category}"),
            Action::ApplyDiscount { code } => format!("apply discount code {code}"),
            Action::UpdateQuantity { quantity, .. } => format!("set the quantity to {quantity}"),
            Action::RemoveFromCart {
                product_id: Some(id),
            } => format!("remove product {id} from the cart"),
            Action::RemoveFromCart { .. } => "empty the cart".into(),
            Action::Hover { selector } => format!("hover over {selector}"),
            Action::GetText { selector } => format!("read {selector}"),
            Action::SetAttribute {
                selector,
                attribute,
                ..
            } => format!("set {attribute} on {selector}"),
            Action::RemoveElement { selector } => format!("remove {selector}"),
            Action::Wait { duration_ms } => format!("wait {duration_ms}ms"),
            Action::Back => "go back".into(),
            Action::Inform { .. } => "answer".into(),
            Action::SelectVariant { value } => format!("select the {value} option"),
            Action::RefreshPage => "refresh the page".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use serde_json::json;

    fn malformed(value: Value) -> String {
        match Action::from_value(value) {
            Err(err) => {
                assert_eq!(err.kind(), FailureKind::MalformedAction);
                err.to_string()
            }
            Ok(action) => panic!("expected a malformed action, got {action:?}"),
        }
    }

    #[test]
    fn decodes_wire_names_and_defaults() {
        let action = Action::from_value(json!({"type": "addToCart", "productId": 8812}))
            .expect("valid action");
        assert_eq!(
            action,
            Action::AddToCart {
                product_id: Some("8812".into()),
                quantity: 1,
                variant: None,
            }
        );

        let action = Action::from_value(json!({"type": "navigate", "destination": "cart"}))
            .expect("valid action");
        assert_eq!(
            action,
            Action::Navigate {
                destination: "cart".into(),
                target: NavTarget::SameContext,
            }
        );

        let action = Action::from_value(json!({"type": "goToCart"})).expect("valid action");
        assert_eq!(action, Action::GoToCart);
    }

    #[test]
    fn price_filter_accepts_bucket_or_range() {
        let action = Action::from_value(json!({
            "type": "search",
            "query": "necklace",
            "filters": {"price": {"min": 10, "max": 40}, "color": "gold"}
        }))
        .expect("valid action");
        let Action::Search { filters, .. } = action else {
            panic!("expected search");
        };
        assert_eq!(
            filters.entries(),
            vec![
                (
                    FilterCategory::Price,
                    FilterValue::Range(PriceRange {
                        min: Some(10.0),
                        max: Some(40.0)
                    })
                ),
                (FilterCategory::Color, FilterValue::Text("gold".into())),
            ]
        );

        let action = Action::from_value(json!({"type": "filter", "category": "price", "value": "under-50"}))
            .expect("valid action");
        assert_eq!(
            action,
            Action::Filter {
                category: FilterCategory::Price,
                value: FilterValue::Text("under-50".into()),
            }
        );
    }

    #[test]
    fn missing_required_fields_are_malformed() {
        let cases = [
            json!({"type": "navigate"}),
            json!({"type": "search"}),
            json!({"type": "scroll"}),
            json!({"type": "sort"}),
            json!({"type": "filter", "value": "red"}),
            json!({"type": "filter", "category": "color"}),
            json!({"type": "applyDiscount"}),
            json!({"type": "updateQuantity"}),
            json!({"type": "hover"}),
            json!({"type": "getText"}),
            json!({"type": "setAttribute", "selector": "img", "value": "x"}),
            json!({"type": "setAttribute", "selector": "img", "attribute": "alt"}),
            json!({"type": "removeElement"}),
            json!({"type": "wait"}),
            json!({"type": "inform"}),
            json!({"type": "selectVariant"}),
            json!({"type": "clickElement"}),
        ];
        for case in cases {
            let message = malformed(case.clone());
            assert!(message.starts_with("malformed action"), "{case}: {message}");
        }
    }

    #[test]
    fn invariants_beyond_field_presence() {
        malformed(json!({"type": "clickElement", "selector": "  ", "text": ""}));
        malformed(json!({"type": "search", "query": ""}));
        malformed(json!({"type": "filter", "category": "color", "value": {"min": 1}}));
        malformed(json!({"type": "filter", "category": "price", "value": {}}));
        malformed(json!({"type": "filter", "category": "price", "value": {"min": 90, "max": 20}}));
        malformed(json!({"type": "addToCart", "quantity": 0}));
        malformed(json!({"type": "updateQuantity", "quantity": -1}));
        malformed(json!({"type": "scroll", "direction": "sideways"}));
        malformed(json!({"type": "teleport"}));
        malformed(json!("search"));
    }

    #[test]
    fn describe_names_the_attempt() {
        let action = Action::RemoveFromCart { product_id: None };
        assert_eq!(action.describe(), "empty the cart");
        let action = Action::Scroll {
            direction: ScrollDirection::Down,
            amount: None,
        };
        assert_eq!(action.describe(), "scroll down");
    }
}
