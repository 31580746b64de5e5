use url::Url;

use super::{ActionExecutor, Handled, Outcome};
use crate::action::NavTarget;
use crate::context::{PageContext, PageType};
use crate::error::ActionError;
use crate::selectors::Role;
use crate::wait::settle;

/// Where a `navigate` action is headed once its destination word is understood.
#[derive(Debug, PartialEq)]
enum Destination {
    Home,
    Catalog,
    Cart,
    Checkout,
    Back,
    Forward,
    Address(Url),
}

impl ActionExecutor<'_> {
    fn destination(&self, raw: &str) -> Result<Destination, ActionError> {
        let word = raw.trim();
        let destination = match word.to_lowercase().as_str() {
            "homepage" | "home" => Destination::Home,
            "catalog" | "collection" | "collections" => Destination::Catalog,
            "cart" => Destination::Cart,
            "checkout" => Destination::Checkout,
            "back" => Destination::Back,
            "forward" => Destination::Forward,
            _ if word.starts_with('/') => {
                let url = self.store_url(word)?;
                // "//host/path" and "/\host" resolve to another origin.
                if url.origin() != self.store_url("/")?.origin() {
                    return Err(ActionError::malformed(format!("'{word}' is not a store path")));
                }
                Destination::Address(url)
            }
            _ => match Url::parse(word) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => Destination::Address(url),
                _ => {
                    return Err(ActionError::malformed(format!(
                        "unknown destination '{word}'"
                    )));
                }
            },
        };
        Ok(destination)
    }

    fn go(&self, url: &str, target: NavTarget) -> Result<(), ActionError> {
        match target {
            NavTarget::SameContext => self.page.navigate(url)?,
            NavTarget::NewContext => self.page.open_in_new_context(url)?,
        }
        Ok(())
    }

    pub(super) async fn navigate(&self, raw: &str, target: NavTarget) -> Handled {
        match self.destination(raw)? {
            Destination::Home => {
                let home = self.store_url("/")?;
                self.go(home.as_str(), target)?;
                Ok(Outcome::done("Went to the homepage"))
            }
            Destination::Catalog => {
                if let Some(link) = self.registry.resolve(self.page, Role::CatalogLink)? {
                    match (target, self.page.describe(link)?.href) {
                        (NavTarget::NewContext, Some(href)) => {
                            let href = self.store_url(&href)?;
                            self.page.open_in_new_context(href.as_str())?;
                        }
                        _ => self.page.click(link)?,
                    }
                } else {
                    let all = self.store_url("/collections/all")?;
                    self.go(all.as_str(), target)?;
                }
                Ok(Outcome::done("Opened the catalog"))
            }
            Destination::Cart => match target {
                NavTarget::SameContext => self.open_cart().await,
                NavTarget::NewContext => {
                    let cart = self.store_url("/cart")?;
                    self.page.open_in_new_context(cart.as_str())?;
                    Ok(Outcome::done("Opened the cart in a new tab"))
                }
            },
            Destination::Checkout => {
                let checkout = self.store_url("/checkout")?;
                self.go(checkout.as_str(), target)?;
                Ok(Outcome::done("Went to checkout"))
            }
            Destination::Back => self.back(),
            Destination::Forward => {
                self.page.history_forward()?;
                Ok(Outcome::done("Went forward"))
            }
            Destination::Address(url) => {
                self.go(url.as_str(), target)?;
                Ok(Outcome::done(format!("Opened {url}")))
            }
        }
    }

    /// Clicks the cart icon, or loads `/cart` when the theme has none.
    pub(super) async fn open_cart(&self) -> Handled {
        if let Some(icon) = self.registry.resolve(self.page, Role::CartIcon)? {
            self.page.click(icon)?;
            settle(self.timings.cart_open_settle_ms).await;
        } else {
            let cart = self.store_url("/cart")?;
            self.page.navigate(cart.as_str())?;
        }
        Ok(Outcome::done("Opened the cart"))
    }

    /// Opens the cart unless the action was issued from the cart page itself.
    pub(super) async fn ensure_cart(&self, context: &PageContext) -> Result<(), ActionError> {
        if context.page_type != PageType::Cart {
            self.open_cart().await?;
        }
        Ok(())
    }

    pub(super) fn back(&self) -> Handled {
        self.page.history_back()?;
        Ok(Outcome::done("Went back"))
    }

    pub(super) fn refresh(&self) -> Handled {
        self.page.reload()?;
        Ok(Outcome::done("Refreshed the page"))
    }
}
