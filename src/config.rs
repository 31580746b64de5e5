//! Timing policy and theme overrides.
//!
//! Every delay below was picked empirically against one storefront theme family; the values
//! bound nothing and guarantee nothing beyond "long enough there". Tests shrink or pause them.

use std::collections::HashMap;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selectors::Role;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub keystroke_ms: u64,
    pub search_settle_ms: u64,
    pub filter_settle_ms: u64,
    pub variant_settle_ms: u64,
    pub inter_action_ms: u64,
    pub cart_open_settle_ms: u64,
    pub add_to_cart_settle_ms: u64,
    pub removal_settle_ms: u64,
    pub discount_settle_ms: u64,
    pub checkout_settle_ms: u64,
    pub shipping_field_settle_ms: u64,
    pub element_timeout_ms: u64,
    pub transport_timeout_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            keystroke_ms: 50,
            search_settle_ms: 2000,
            filter_settle_ms: 1000,
            variant_settle_ms: 500,
            inter_action_ms: 500,
            cart_open_settle_ms: 1000,
            add_to_cart_settle_ms: 2000,
            removal_settle_ms: 1000,
            discount_settle_ms: 2000,
            checkout_settle_ms: 3000,
            shipping_field_settle_ms: 200,
            element_timeout_ms: 5000,
            transport_timeout_ms: 30_000,
        }
    }
}

impl Timings {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn transport_timeout(&self) -> Duration {
        Duration::from_millis(self.transport_timeout_ms)
    }
}

/// Everything the assistant reads from its optional JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub timings: Timings,
    /// Extra selector candidates per role, tried before the built-in ones.
    pub selectors: HashMap<Role, Vec<String>>,
}

impl AssistantConfig {
    /// Loads the config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_keep_remaining_defaults() {
        let config: AssistantConfig = serde_json::from_str(
            r##"{"timings": {"keystroke_ms": 5}, "selectors": {"search_box": ["#q"]}}"##,
        )
        .expect("valid config");
        assert_eq!(config.timings.keystroke_ms, 5);
        assert_eq!(config.timings.search_settle_ms, 2000);
        assert_eq!(config.selectors[&Role::SearchBox], vec!["#q".to_string()]);
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = AssistantConfig::load(Path::new("/nonexistent/voice-cart.json"))
            .expect("defaults");
        assert_eq!(config, AssistantConfig::default());
    }
}
