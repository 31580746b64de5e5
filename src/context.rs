//! Snapshot of what the current storefront page is.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::page::Page;
use crate::selectors::{Role, SelectorRegistry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Homepage,
    Product,
    Collection,
    Cart,
    Checkout,
    Search,
    Contact,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    pub url: String,
    pub pathname: String,
    pub page_type: PageType,
    pub title: String,
    pub has_products: bool,
    pub cart_count: u32,
    pub is_loading: bool,
    pub has_error: bool,
}

/// Classifies a path by its exact segments; the first rule that applies wins.
///
/// Order: homepage, product, collection, cart, checkout, search, contact. Matching whole
/// segments keeps `/collections/cart-bag` a collection and `/pages/cartography` unknown.
pub fn classify(pathname: &str) -> PageType {
    let segments: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return PageType::Homepage;
    }
    let has = |name: &str| segments.iter().any(|s| s.eq_ignore_ascii_case(name));

    if has("products") {
        PageType::Product
    } else if has("collections") {
        PageType::Collection
    } else if has("cart") {
        PageType::Cart
    } else if has("checkout") || has("checkouts") {
        PageType::Checkout
    } else if has("search") {
        PageType::Search
    } else if has("contact")
        || segments.windows(2).any(|w| {
            w[0].eq_ignore_ascii_case("pages") && w[1].to_ascii_lowercase().starts_with("contact")
        })
    {
        PageType::Contact
    } else {
        PageType::Unknown
    }
}

/// Leading-integer parse of a badge text. Anything unparsable or negative reads as zero.
pub fn parse_count(text: &str) -> u32 {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Reads a fresh context. Never fails; every lookup that goes wrong degrades to a default.
pub fn read_context(page: &dyn Page, registry: &SelectorRegistry) -> PageContext {
    let url = page.url().unwrap_or_default();
    let pathname = Url::parse(&url).ok().map(|u| u.path().to_string());
    let present = |role| matches!(registry.resolve(page, role), Ok(Some(_)));

    let cart_count = registry
        .resolve(page, Role::CartBadge)
        .ok()
        .flatten()
        .and_then(|badge| page.describe(badge).ok())
        .map(|info| parse_count(&info.text))
        .unwrap_or(0);

    PageContext {
        page_type: pathname.as_deref().map_or(PageType::Unknown, classify),
        title: page.title().unwrap_or_default(),
        has_products: present(Role::ProductLink),
        cart_count,
        is_loading: present(Role::LoadingIndicator),
        has_error: present(Role::ErrorMessage),
        url,
        pathname: pathname.unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeElement, FakePage};

    #[test]
    fn classification_follows_priority_on_exact_segments() {
        let cases = [
            ("/", PageType::Homepage),
            ("", PageType::Homepage),
            ("/products/silver-ring", PageType::Product),
            ("/collections/rings/products/silver-ring", PageType::Product),
            ("/collections/all", PageType::Collection),
            ("/collections/cart-bag", PageType::Collection),
            ("/cart", PageType::Cart),
            ("/cart/change", PageType::Cart),
            ("/en-us/cart", PageType::Cart),
            ("/checkouts/c/abc123", PageType::Checkout),
            ("/search", PageType::Search),
            ("/pages/contact", PageType::Contact),
            ("/pages/contact-us", PageType::Contact),
            ("/Pages/Contact-Us", PageType::Contact),
            ("/CART", PageType::Cart),
            ("/pages/cartography", PageType::Unknown),
            ("/blogs/news", PageType::Unknown),
        ];
        for (path, expected) in cases {
            assert_eq!(classify(path), expected, "{path}");
        }
    }

    #[test]
    fn badge_counts_parse_leniently() {
        assert_eq!(parse_count(" 3 "), 3);
        assert_eq!(parse_count("12 items"), 12);
        assert_eq!(parse_count("-2"), 0);
        assert_eq!(parse_count("cart"), 0);
        assert_eq!(parse_count(""), 0);
    }

    #[test]
    fn reads_ambient_facts_from_the_document() {
        let page = FakePage::new("https://shop.test/collections/necklaces?page=2")
            .with_title("Necklaces");
        page.add(FakeElement::new("a").matching(&[".card__heading a"]));
        page.add(FakeElement::new("span").matching(&[".cart-count"]).text(" 4 "));
        page.add(FakeElement::new("div").matching(&[".spinner"]));

        let context = read_context(&page, &SelectorRegistry::default());
        assert_eq!(
            context,
            PageContext {
                url: "https://shop.test/collections/necklaces?page=2".into(),
                pathname: "/collections/necklaces".into(),
                page_type: PageType::Collection,
                title: "Necklaces".into(),
                has_products: true,
                cart_count: 4,
                is_loading: true,
                has_error: false,
            }
        );
    }

    #[test]
    fn unreadable_url_degrades_to_unknown() {
        let page = FakePage::new("not a url");
        let context = read_context(&page, &SelectorRegistry::default());
        assert_eq!(context.page_type, PageType::Unknown);
        assert_eq!(context.pathname, "");
        assert_eq!(context.cart_count, 0);
    }

    #[test]
    fn context_serializes_in_camel_case() {
        let value = serde_json::to_value(PageContext::default()).expect("serialize");
        assert_eq!(value["pageType"], "unknown");
        assert_eq!(value["cartCount"], 0);
    }
}
