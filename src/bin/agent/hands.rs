use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{info, warn};

pub struct LaunchConfig {
    /// DevTools endpoint of a Chrome the shopper already runs.
    pub chrome_url: Option<String>,
    pub headless: bool,
    /// Storefront opened once the tab is ready.
    pub store_url: Option<String>,
}

/// The browser the assistant drives. Created once and kept for the agent's lifetime.
pub struct BrowserSession {
    _browser: Browser,
    pub tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(config: &LaunchConfig) -> Result<Self> {
        let session = match &config.chrome_url {
            Some(url) => match Self::attach(url) {
                Ok(session) => session,
                Err(e) => {
                    warn!(url = url.as_str(), error = %e, "could not attach, launching instead");
                    Self::start(config.headless)?
                }
            },
            None => Self::start(config.headless)?,
        };

        if let Some(store) = &config.store_url {
            info!(store = store.as_str(), "opening storefront");
            session
                .tab
                .navigate_to(store)
                .and_then(|tab| tab.wait_until_navigated())
                .with_context(|| format!("could not open {store}"))?;
        }
        Ok(session)
    }

    fn attach(url: &str) -> Result<Self> {
        let browser = Browser::connect(url.to_string())?;
        let tab = {
            let tabs = browser.get_tabs();
            let tabs = tabs.lock().map_err(|_| anyhow!("tab list lock poisoned"))?;
            tabs.first().cloned()
        };
        let tab = match tab {
            Some(tab) => {
                info!("attached to running Chrome, using its first tab");
                tab
            }
            None => browser.new_tab()?,
        };
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn start(headless: bool) -> Result<Self> {
        let profile = profile_dir()?;
        std::fs::create_dir_all(&profile)
            .with_context(|| format!("could not create profile at {}", profile.display()))?;
        info!(profile = %profile.display(), headless, "starting Chrome");

        let options = LaunchOptions {
            headless,
            user_data_dir: Some(profile),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-infobars"),
                OsStr::new("--password-store=basic"),
            ],
            idle_browser_timeout: Duration::from_secs(600),
            ..Default::default()
        };
        let browser =
            Browser::new(options).map_err(|e| anyhow!("browser launch failed: {e}"))?;
        let tab = browser.new_tab()?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }
}

/// A profile of its own so logins and the cart survive restarts without touching the
/// shopper's everyday Chrome profile.
fn profile_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir().ok_or_else(|| anyhow!("no local data directory"))?;
    Ok(base.join("voice-cart").join("chrome-profile"))
}
