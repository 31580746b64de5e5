//! Waiting on the document: element appearance and fixed settle delays.

use std::time::Duration;

use tracing::debug;

use crate::error::ActionError;
use crate::page::{NodeRef, Page};

/// Resolves once `selector` matches, re-checking on every document change.
///
/// The change feed is subscribed before the first check, so a mutation landing between the
/// check and the first await still wakes the loop. Fails with a timeout after `timeout`.
pub async fn wait_for_element(
    page: &dyn Page,
    selector: &str,
    timeout: Duration,
) -> Result<NodeRef, ActionError> {
    let mut changes = page.changes();
    changes.borrow_and_update();

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        if let Some(node) = page.first(selector, None)? {
            return Ok(node);
        }
        tokio::select! {
            _ = &mut deadline => {
                debug!(selector, ?timeout, "element wait timed out");
                return Err(ActionError::Timeout {
                    selector: selector.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    // Feed closed: nothing will wake us again before the deadline.
                    (&mut deadline).await;
                    return Err(ActionError::Timeout {
                        selector: selector.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
            }
        }
    }
}

/// Pauses so asynchronous re-renders can finish before the next step reads the DOM.
pub async fn settle(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeElement, FakePage};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn present_element_resolves_immediately() {
        let page = FakePage::new("https://shop.test/");
        let node = page.add(FakeElement::new("div").matching(&[".results"]));

        let start = Instant::now();
        let found = wait_for_element(&page, ".results", Duration::from_millis(5000)).await;
        assert_eq!(found, Ok(node));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_element_times_out_on_the_bound() {
        let page = FakePage::new("https://shop.test/");

        let start = Instant::now();
        let result = wait_for_element(&page, ".never", Duration::from_millis(100)).await;
        let elapsed = start.elapsed();

        assert_eq!(
            result,
            Err(ActionError::Timeout {
                selector: ".never".into(),
                timeout_ms: 100
            })
        );
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(150), "took {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn element_inserted_later_wakes_the_wait() {
        let page = Arc::new(FakePage::new("https://shop.test/search?q=ring"));
        let writer = Arc::clone(&page);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            writer.add(FakeElement::new("div").matching(&[".unrelated"]));
            tokio::time::sleep(Duration::from_millis(300)).await;
            writer.add(FakeElement::new("ul").matching(&[".search-results"]))
        });

        let start = Instant::now();
        let found = wait_for_element(page.as_ref(), ".search-results", Duration::from_millis(5000))
            .await
            .expect("element appears");
        assert_eq!(start.elapsed(), Duration::from_millis(600));
        assert!(page.is_attached(found));
    }
}
