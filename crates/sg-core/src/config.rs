//! Engine configuration handed over by the background page.

use std::str::FromStr;

use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::matcher::Matcher;
use crate::policy::{Browser, InjectionPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid log level: {0:?}")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub browser: Browser,
    /// Sites on which no JS rule runs.
    pub trusted_sites: Vec<String>,
    /// Accept JS rules from user rules and custom filters.
    pub allow_user_rules: bool,
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            browser: Browser::default(),
            trusted_sites: Vec::new(),
            allow_user_rules: true,
            log_level: "warn".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.log_level_filter()?;
        Ok(config)
    }

    pub fn log_level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }

    pub fn policy(&self) -> InjectionPolicy {
        InjectionPolicy::new(self.browser)
    }

    /// Build a matcher with this configuration applied.
    pub fn build_matcher(&self, catalog: Option<Catalog>) -> Matcher {
        let mut matcher = match catalog {
            Some(catalog) => Matcher::from_catalog(catalog, self.policy()),
            None => Matcher::new(self.policy()),
        };
        matcher.set_allow_user_rules(self.allow_user_rules);
        for site in &self.trusted_sites {
            matcher.add_trusted_site(site);
        }
        matcher
    }
}
