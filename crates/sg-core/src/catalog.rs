//! Bundled JS rules allowlist (`local_script_rules.json`)
//!
//! Stores may refuse remotely hosted code, so only JS rules shipped inside the
//! extension package are allowed to run. The catalog lists every bundled rule
//! body together with the domains it was published for:
//!
//! ```json
//! {
//!     "comment": "...",
//!     "rules": {
//!         "window.foo = 1;": [
//!             { "permittedDomains": ["example.org"], "restrictedDomains": [] }
//!         ]
//!     }
//! }
//! ```
//!
//! Rules added by the user (user rules, custom filters) bypass the catalog.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::rule::{DomainScope, JsRule, RuleError};
use crate::types::RuleSource;

/// Error type for catalog loading.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("catalog contains an empty rule body")]
    EmptyRuleBody,
    #[error("invalid domains for rule {body:?}: {source}")]
    InvalidDomain {
        body: String,
        #[source]
        source: RuleError,
    },
}

/// Domains one published copy of a rule applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEntry {
    #[serde(default)]
    pub permitted_domains: Vec<String>,
    #[serde(default)]
    pub restricted_domains: Vec<String>,
}

/// On-disk shape of `local_script_rules.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalScriptRules {
    #[serde(default)]
    pub comment: String,
    pub rules: BTreeMap<String, Vec<DomainEntry>>,
}

/// Loaded and validated allowlist.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    rules: Vec<JsRule>,
    by_body: HashMap<String, Vec<usize>>,
}

impl Catalog {
    /// Parse and validate `local_script_rules.json`.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: LocalScriptRules = serde_json::from_str(json)?;
        Self::from_local_rules(raw)
    }

    pub fn from_local_rules(raw: LocalScriptRules) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();

        for (body, entries) in raw.rules {
            if body.is_empty() {
                return Err(CatalogError::EmptyRuleBody);
            }

            // A body without entries was published without domain restrictions.
            let entries = if entries.is_empty() { vec![DomainEntry::default()] } else { entries };

            for entry in entries {
                let scope = DomainScope::from_domains(
                    entry.permitted_domains.iter().map(String::as_str),
                    entry.restricted_domains.iter().map(String::as_str),
                )
                .map_err(|source| CatalogError::InvalidDomain {
                    body: body.clone(),
                    source,
                })?;

                catalog.push(JsRule::new(body.clone(), scope, RuleSource::Filter { list_id: 0 }));
            }
        }

        log::debug!(
            "loaded local script rules: {} bodies, {} entries",
            catalog.by_body.len(),
            catalog.rules.len()
        );

        Ok(catalog)
    }

    fn push(&mut self, rule: JsRule) {
        let idx = self.rules.len();
        self.by_body.entry(rule.body.clone()).or_default().push(idx);
        self.rules.push(rule);
    }

    /// Is there any bundled copy of this body?
    pub fn contains(&self, body: &str) -> bool {
        self.by_body.contains_key(body)
    }

    /// May this rule run? Trusted rules always may; other rules need a
    /// bundled copy with the same body and the same domains.
    pub fn permits(&self, rule: &JsRule) -> bool {
        if rule.is_trusted() {
            return true;
        }

        match self.by_body.get(&rule.body) {
            Some(indices) => indices
                .iter()
                .any(|&idx| self.rules[idx].scope.same_domains(&rule.scope)),
            None => false,
        }
    }

    /// Every bundled entry as a rule.
    pub fn rules(&self) -> &[JsRule] {
        &self.rules
    }

    /// Number of distinct rule bodies.
    pub fn len(&self) -> usize {
        self.by_body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_body.is_empty()
    }
}
