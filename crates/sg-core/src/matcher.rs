//! Page matching
//!
//! Decides which rule bodies apply to a document. The bodies are then handed
//! verbatim to the injector as registry lookup keys.

use std::collections::HashSet;

use crate::catalog::Catalog;
use crate::domain::walk_host_suffixes;
use crate::policy::InjectionPolicy;
use crate::rule::{JsRule, RuleError};
use crate::types::{PageContext, RuleSource};

/// Bodies to inject into one document, in rule order.
#[derive(Debug, Default)]
pub struct ScriptMatchResult<'a> {
    pub scripts: Vec<&'a str>,
}

/// JS rule matcher.
#[derive(Debug)]
pub struct Matcher {
    rules: Vec<JsRule>,
    exceptions: Vec<JsRule>,
    catalog: Option<Catalog>,
    policy: InjectionPolicy,
    trusted_sites: HashSet<String>,
    allow_user_rules: bool,
    rejected: usize,
}

impl Matcher {
    /// Create an empty matcher with no catalog gate.
    pub fn new(policy: InjectionPolicy) -> Self {
        Self {
            rules: Vec::new(),
            exceptions: Vec::new(),
            catalog: None,
            policy,
            trusted_sites: HashSet::new(),
            allow_user_rules: true,
            rejected: 0,
        }
    }

    /// Create an empty matcher whose filter rules must be permitted by
    /// `catalog`. The catalog is only an allowlist: it does not say whether
    /// an entry is a rule or an exception, so none of its entries are loaded.
    pub fn from_catalog(catalog: Catalog, policy: InjectionPolicy) -> Self {
        let mut matcher = Self::new(policy);
        matcher.catalog = Some(catalog);
        matcher
    }

    /// Accept or refuse rules from user rules and custom filters.
    pub fn set_allow_user_rules(&mut self, allow: bool) {
        self.allow_user_rules = allow;
    }

    /// Add a rule. Returns `false` if the rule was rejected.
    pub fn add_rule(&mut self, rule: JsRule) -> bool {
        if rule.is_exception() {
            self.exceptions.push(rule);
            return true;
        }

        if rule.is_trusted() && !self.allow_user_rules {
            log::debug!("user JS rules are disabled, skipping {:?}", rule.body);
            self.rejected += 1;
            return false;
        }

        if let Some(catalog) = &self.catalog {
            if !catalog.permits(&rule) {
                log::debug!("JS rule is not bundled, skipping {:?}", rule.body);
                self.rejected += 1;
                return false;
            }
        }

        self.rules.push(rule);
        true
    }

    /// Parse user rules text, one rule per line. Lines that are not JS rules
    /// are ignored. Returns how many rules were accepted.
    pub fn add_user_rules(&mut self, text: &str) -> usize {
        let mut accepted = 0usize;

        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('!') {
                continue;
            }

            match JsRule::parse(line, RuleSource::User) {
                Ok(rule) => {
                    if self.add_rule(rule) {
                        accepted += 1;
                    }
                }
                Err(RuleError::NotJsRule) => {}
                Err(e) => log::debug!("skipping user rule {:?}: {}", line, e),
            }
        }

        accepted
    }

    /// Add a site to the trusted list (no scripts at all).
    pub fn add_trusted_site(&mut self, site: &str) {
        self.trusted_sites.insert(site.trim().to_ascii_lowercase());
    }

    /// Remove a site from the trusted list.
    pub fn remove_trusted_site(&mut self, site: &str) {
        self.trusted_sites.remove(&site.trim().to_ascii_lowercase());
    }

    fn is_trusted_site(&self, host: &str) -> bool {
        if self.trusted_sites.is_empty() {
            return false;
        }
        let host = host.to_ascii_lowercase();
        walk_host_suffixes(&host).any(|suffix| self.trusted_sites.contains(suffix))
    }

    pub fn policy(&self) -> &InjectionPolicy {
        &self.policy
    }

    /// Number of (non-exception) rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Number of rules refused by `add_rule`.
    pub fn rejected_count(&self) -> usize {
        self.rejected
    }

    /// Select the bodies that apply to `ctx`.
    pub fn match_page<'m>(&'m self, ctx: &PageContext<'_>) -> ScriptMatchResult<'m> {
        let mut result = ScriptMatchResult::default();

        if !self.policy.can_inject(ctx.url) {
            return result;
        }

        // Trusted site bypass
        if self.is_trusted_site(ctx.host) {
            return result;
        }

        let exceptions: HashSet<&str> = self
            .exceptions
            .iter()
            .filter(|rule| rule.scope.matches(ctx.host))
            .map(|rule| rule.body.as_str())
            .collect();

        let mut seen: HashSet<&str> = HashSet::new();
        for rule in &self.rules {
            let body = rule.body.as_str();
            if !rule.scope.matches(ctx.host) || exceptions.contains(body) {
                continue;
            }
            if seen.insert(body) {
                result.scripts.push(body);
            }
        }

        result
    }
}
