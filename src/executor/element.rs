use serde_json::Value;
use tracing::debug;

use super::{ActionExecutor, Handled, Outcome};
use crate::action::ScrollDirection;
use crate::error::{ActionError, PageError};
use crate::page::NodeRef;
use crate::selectors::Role;
use crate::wait::{settle, wait_for_element};

/// Share of the viewport a plain "scroll up/down" moves.
const PAGE_STEP: f64 = 0.8;

impl ActionExecutor<'_> {
    pub(super) async fn click_element(
        &self,
        selector: Option<&str>,
        text: Option<&str>,
        wait_for: Option<&str>,
    ) -> Handled {
        let selector = selector.filter(|s| !s.trim().is_empty());
        let text = text.filter(|t| !t.trim().is_empty());

        let by_selector = match selector {
            Some(selector) => match self.page.first(selector, None) {
                Ok(node) => node,
                // Models like to write `:contains(...)`; the text still identifies the target.
                Err(PageError::InvalidSelector(_)) if text.is_some() => {
                    debug!(selector, "selector rejected, matching by text");
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        let target = match (by_selector, text) {
            (Some(node), _) => node,
            (None, Some(text)) => self.clickable_with_text(text)?,
            (None, None) => {
                return Err(ActionError::not_found(format!(
                    "element '{}'",
                    selector.unwrap_or_default()
                )));
            }
        };
        self.page.click(target)?;

        if let Some(wait_for) = wait_for {
            wait_for_element(self.page, wait_for, self.timings.element_timeout()).await?;
        }
        let message = match text {
            Some(text) => format!("Clicked \"{text}\""),
            None => format!("Clicked {}", selector.unwrap_or("the element")),
        };
        Ok(Outcome::done(message))
    }

    fn clickable_with_text(&self, text: &str) -> Result<NodeRef, ActionError> {
        let needle = text.trim().to_lowercase();
        for node in self.registry.resolve_any(self.page, Role::Clickable)? {
            if self.page.describe(node)?.text.to_lowercase().contains(&needle) {
                return Ok(node);
            }
        }
        Err(ActionError::not_found(format!("anything clickable reading \"{text}\"")))
    }

    pub(super) fn scroll(&self, direction: ScrollDirection, amount: Option<f64>) -> Handled {
        let step = || -> Result<f64, ActionError> {
            Ok(match amount {
                Some(amount) => amount.abs(),
                None => self.page.viewport_height()? * PAGE_STEP,
            })
        };
        match direction {
            ScrollDirection::Down => self.page.scroll_by(step()?)?,
            ScrollDirection::Up => self.page.scroll_by(-step()?)?,
            ScrollDirection::Top => self.page.scroll_to(0.0)?,
            ScrollDirection::Bottom => self.page.scroll_to(self.page.document_height()?)?,
        }
        let message = match direction {
            ScrollDirection::Down => "Scrolled down",
            ScrollDirection::Up => "Scrolled up",
            ScrollDirection::Top => "Scrolled to the top",
            ScrollDirection::Bottom => "Scrolled to the bottom",
        };
        Ok(Outcome::done(message))
    }

    pub(super) fn hover(&self, selector: &str) -> Handled {
        let node = self.require_selector(selector)?;
        self.page.hover(node)?;
        Ok(Outcome::done(format!("Hovered over {selector}")))
    }

    pub(super) fn get_text(&self, selector: &str) -> Handled {
        let node = self.require_selector(selector)?;
        let text = self.page.describe(node)?.text;
        Ok(Outcome::with_value(text.clone(), Value::String(text)))
    }

    pub(super) fn set_attribute(&self, selector: &str, attribute: &str, value: &str) -> Handled {
        let node = self.require_selector(selector)?;
        self.page.set_attribute(node, attribute, value)?;
        Ok(Outcome::done(format!("Set {attribute} on {selector}")))
    }

    pub(super) fn remove_element(&self, selector: &str) -> Handled {
        let node = self.require_selector(selector)?;
        self.page.remove(node)?;
        Ok(Outcome::done(format!("Removed {selector}")))
    }

    pub(super) async fn wait(&self, duration_ms: u64) -> Handled {
        settle(duration_ms).await;
        Ok(Outcome::done(format!("Waited {duration_ms}ms")))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::Instant;

    use crate::action::{Action, ScrollDirection};
    use crate::config::Timings;
    use crate::context::read_context;
    use crate::error::FailureKind;
    use crate::executor::ActionExecutor;
    use crate::result::ExecutionResult;
    use crate::selectors::SelectorRegistry;
    use crate::testing::{Event, FakeElement, FakePage};

    async fn run(page: &FakePage, action: Action) -> ExecutionResult {
        let registry = SelectorRegistry::default();
        let timings = Timings::default();
        ActionExecutor::new(page, &registry, &timings)
            .execute(&action, &read_context(page, &registry))
            .await
    }

    fn click(selector: Option<&str>, text: Option<&str>) -> Action {
        Action::ClickElement {
            selector: selector.map(str::to_string),
            text: text.map(str::to_string),
            wait_for: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn click_by_text_searches_links_and_buttons() {
        let page = FakePage::new("https://shop.test/");
        page.add(FakeElement::new("a").matching(&["a"]).text("Shop all"));
        let target = page.add(FakeElement::new("button").matching(&["button"]).text("Sign Up Now"));

        let result = run(&page, click(None, Some("sign up"))).await;
        assert!(result.success, "{}", result.message);
        assert_eq!(page.clicks(), vec![target]);
    }

    #[tokio::test(start_paused = true)]
    async fn click_falls_back_to_text_when_selector_misses() {
        let page = FakePage::new("https://shop.test/");
        let target = page.add(FakeElement::new("a").matching(&["a"]).text("Contact"));

        let result = run(&page, click(Some(".contact-link"), Some("contact"))).await;
        assert!(result.success);
        assert_eq!(page.clicks(), vec![target]);

        let result = run(&page, click(Some(".contact-link"), None)).await;
        assert_eq!(result.failure, Some(FailureKind::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn unparsable_selector_still_clicks_by_text() {
        let selector = "button:contains('Add to bag')";
        let page = FakePage::new("https://shop.test/").rejecting(selector);
        let target = page.add(FakeElement::new("button").matching(&["button"]).text("Add to bag"));

        let result = run(&page, click(Some(selector), Some("add to bag"))).await;
        assert!(result.success, "{}", result.message);
        assert_eq!(page.clicks(), vec![target]);

        let result = run(&page, click(Some(selector), None)).await;
        assert!(!result.success);
        assert_eq!(page.clicks(), vec![target]);
    }

    #[tokio::test(start_paused = true)]
    async fn click_waits_for_the_requested_element() {
        let page = FakePage::new("https://shop.test/");
        page.add(FakeElement::new("button").matching(&[".open-drawer"]));

        let action = Action::ClickElement {
            selector: Some(".open-drawer".into()),
            text: None,
            wait_for: Some(".drawer".into()),
        };
        let start = Instant::now();
        let result = run(&page, action).await;
        assert_eq!(result.failure, Some(FailureKind::Timeout));
        assert!(start.elapsed() >= Timings::default().element_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_steps_are_eighty_percent_of_the_viewport() {
        let page = FakePage::new("https://shop.test/");
        let scroll = |direction, amount| Action::Scroll { direction, amount };

        for action in [
            scroll(ScrollDirection::Down, None),
            scroll(ScrollDirection::Up, None),
            scroll(ScrollDirection::Up, Some(300.0)),
            scroll(ScrollDirection::Top, None),
            scroll(ScrollDirection::Bottom, None),
        ] {
            assert!(run(&page, action).await.success);
        }
        assert_eq!(
            page.events(),
            vec![
                Event::ScrollBy(800.0),
                Event::ScrollBy(-800.0),
                Event::ScrollBy(-300.0),
                Event::ScrollTo(0.0),
                Event::ScrollTo(6000.0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn get_text_returns_trimmed_text_as_value() {
        let page = FakePage::new("https://shop.test/products/tee");
        page.add(FakeElement::new("span").matching(&[".price"]).text("  $24.00 "));

        let result = run(&page, Action::GetText { selector: ".price".into() }).await;
        assert!(result.success);
        assert_eq!(result.value, Some(json!("$24.00")));

        let result = run(&page, Action::GetText { selector: ".rating".into() }).await;
        assert!(!result.success);
        assert_eq!(result.value, None);
        assert_eq!(result.failure, Some(FailureKind::NotFound));
    }

    #[tokio::test(start_paused = true)]
    async fn direct_element_edits() {
        let page = FakePage::new("https://shop.test/");
        let banner = page.add(FakeElement::new("div").matching(&[".promo-banner"]));
        let image = page.add(FakeElement::new("img").matching(&["img.hero"]));

        let actions = [
            Action::Hover { selector: "img.hero".into() },
            Action::SetAttribute {
                selector: "img.hero".into(),
                attribute: "alt".into(),
                value: "Hero".into(),
            },
            Action::RemoveElement { selector: ".promo-banner".into() },
        ];
        for action in actions {
            assert!(run(&page, action).await.success);
        }
        assert_eq!(page.attribute(image, "alt").as_deref(), Some("Hero"));
        assert!(!page.is_attached(banner));
        assert_eq!(page.events()[0], Event::Hover(image));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_suspends_for_the_duration() {
        let page = FakePage::new("https://shop.test/");
        let start = Instant::now();
        assert!(run(&page, Action::Wait { duration_ms: 1500 }).await.success);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1500) && elapsed < Duration::from_millis(1600));
    }
}
