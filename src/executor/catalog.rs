use tracing::{debug, warn};

use super::{ActionExecutor, Handled, Outcome, fold};
use crate::action::{FilterCategory, FilterValue, PriceRange, SearchFilters, SortOrder};
use crate::error::ActionError;
use crate::page::{ElementInfo, NodeRef, SelectOption, ValueEvent};
use crate::selectors::Role;
use crate::wait::settle;

const SUBMIT_CONTROL: &str = r#"button[type="submit"], input[type="submit"]"#;

const ASCENDING_HINTS: &[&str] = &[
    "ascending",
    "low to high",
    "low-high",
    "a-z",
    "a to z",
    "old to new",
    "oldest",
];

const DESCENDING_HINTS: &[&str] = &[
    "descending",
    "high to low",
    "high-low",
    "z-a",
    "z to a",
    "new to old",
    "newest",
];

/// Words a shopper says for a sort key, mapped to the key storefronts use.
fn sort_keys(by: &str) -> Vec<String> {
    let by = by.trim().to_lowercase();
    let alias = match by.as_str() {
        "name" | "alphabetical" | "alphabetically" => Some("title"),
        "newest" | "date" | "new" => Some("created"),
        "popular" | "popularity" | "bestselling" | "best sellers" => Some("best-selling"),
        "featured" => Some("manual"),
        _ => None,
    };
    let mut keys = vec![by];
    keys.extend(alias.map(str::to_string));
    keys
}

fn option_mentions(option: &SelectOption, needle: &str) -> bool {
    option.value.to_lowercase().contains(needle) || option.text.to_lowercase().contains(needle)
}

/// Picks the option naming `by` in the requested direction, else any option naming `by`.
fn pick_sort_option<'o>(
    options: &'o [SelectOption],
    by: &str,
    order: SortOrder,
) -> Option<&'o SelectOption> {
    let keys = sort_keys(by);
    let hints = match order {
        SortOrder::Asc => ASCENDING_HINTS,
        SortOrder::Desc => DESCENDING_HINTS,
    };
    let named = |o: &&SelectOption| keys.iter().any(|k| option_mentions(o, k));
    options
        .iter()
        .filter(named)
        .find(|o| hints.iter().any(|h| option_mentions(o, h)))
        .or_else(|| options.iter().find(named))
}

/// Renders a price the way a number input expects it: no trailing `.0`.
fn price_text(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        amount.to_string()
    }
}

impl ActionExecutor<'_> {
    pub(super) async fn search(&self, query: &str, filters: &SearchFilters) -> Handled {
        let field = self.require(Role::SearchBox, "search box")?;
        self.page.set_value(field, "", ValueEvent::None)?;
        self.page.focus(field)?;

        for ch in query.chars() {
            let field = self.require(Role::SearchBox, "search box")?;
            self.page.append_char(field, ch)?;
            settle(self.timings.keystroke_ms).await;
        }

        let field = self.require(Role::SearchBox, "search box")?;
        self.submit_search(field)?;
        settle(self.timings.search_settle_ms).await;

        let mut first_failure = None;
        let mut applied = Vec::new();
        for (category, value) in filters.entries() {
            match self.apply_filter(category, &value) {
                Ok(_) => applied.push(category.to_string()),
                Err(err) => {
                    warn!(%category, error = %err, "search filter not applied");
                    first_failure.get_or_insert(err);
                }
            }
            settle(self.timings.filter_settle_ms).await;
        }
        if let Some(err) = first_failure {
            return Err(err);
        }

        let message = if applied.is_empty() {
            format!("Searched for \"{query}\"")
        } else {
            format!("Searched for \"{query}\" filtered by {}", applied.join(", "))
        };
        Ok(Outcome::done(message))
    }

    /// The form's own submit control, then the form itself, then a page-level search
    /// button, then Enter in the field.
    fn submit_search(&self, field: NodeRef) -> Result<(), ActionError> {
        if let Some(form) = self.page.closest_form(field)? {
            if let Some(button) = self.page.first(SUBMIT_CONTROL, Some(form))? {
                debug!("submitting search through the form's button");
                self.page.click(button)?;
            } else {
                self.page.submit_form(form)?;
            }
        } else if let Some(button) = self.registry.resolve(self.page, Role::SearchButton)? {
            self.page.click(button)?;
        } else {
            self.page.press_enter(field)?;
        }
        Ok(())
    }

    pub(super) fn apply_filter(&self, category: FilterCategory, value: &FilterValue) -> Handled {
        match (category, value) {
            (FilterCategory::Price, FilterValue::Text(bucket)) => {
                let wanted = fold(bucket);
                self.click_option(Role::PriceBucket, &format!("price filter '{bucket}'"), |info| {
                    [Some(info.text.as_str()), info.label.as_deref(), info.value.as_deref()]
                        .into_iter()
                        .flatten()
                        .any(|text| fold(text).contains(&wanted))
                })?;
                Ok(Outcome::done(format!("Filtered price by {bucket}")))
            }
            (FilterCategory::Price, FilterValue::Range(range)) => self.apply_price_range(*range),
            (_, FilterValue::Range(_)) => Err(ActionError::malformed(format!(
                "a numeric range is only valid for the price filter, not {category}"
            ))),
            (category, FilterValue::Text(text)) => {
                let (role, what) = match category {
                    FilterCategory::Color => (Role::ColorOption, "colour"),
                    FilterCategory::Size => (Role::SizeOption, "size"),
                    _ => (Role::FacetOption, "category"),
                };
                self.click_option(role, &format!("{what} option '{text}'"), |info| {
                    info.mentions(text)
                })?;
                Ok(Outcome::done(format!("Filtered {category} by {text}")))
            }
        }
    }

    fn apply_price_range(&self, range: PriceRange) -> Handled {
        if let Some(min) = range.min {
            let input = self.require(Role::PriceMinInput, "minimum price field")?;
            self.page.set_value(input, &price_text(min), ValueEvent::Change)?;
        }
        if let Some(max) = range.max {
            let input = self.require(Role::PriceMaxInput, "maximum price field")?;
            self.page.set_value(input, &price_text(max), ValueEvent::Change)?;
        }
        let message = match (range.min, range.max) {
            (Some(min), Some(max)) => format!("Filtered price from {} to {}", price_text(min), price_text(max)),
            (Some(min), None) => format!("Filtered price from {}", price_text(min)),
            (None, Some(max)) => format!("Filtered price up to {}", price_text(max)),
            (None, None) => "Left the price filter unchanged".to_string(),
        };
        Ok(Outcome::done(message))
    }

    /// Clicks the first control for `role` whose snapshot satisfies `wanted`.
    fn click_option(
        &self,
        role: Role,
        what: &str,
        wanted: impl Fn(&ElementInfo) -> bool,
    ) -> Result<(), ActionError> {
        for node in self.registry.resolve_any(self.page, role)? {
            if wanted(&self.page.describe(node)?) {
                self.page.click(node)?;
                return Ok(());
            }
        }
        Err(ActionError::not_found(what))
    }

    pub(super) fn sort(&self, by: &str, order: SortOrder) -> Handled {
        let select = self.require(Role::SortSelect, "sort menu")?;
        let info = self.page.describe(select)?;
        let option = pick_sort_option(&info.options, by, order)
            .ok_or_else(|| ActionError::not_found(format!("sort option for '{by}'")))?;
        self.page.set_value(select, &option.value, ValueEvent::Change)?;
        Ok(Outcome::done(format!("Sorted by {}", option.text.trim())))
    }
}
