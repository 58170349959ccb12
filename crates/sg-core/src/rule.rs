//! JS rule parsing
//!
//! Parses rules like:
//! `example.org,~sub.example.org#%#window.foo = 1;`
//!
//! Everything after the marker is the rule body. It is the registry lookup
//! key, so it is kept byte-for-byte: only line terminators are removed.

use crate::domain::{normalize_domain, walk_host_suffixes};
use crate::hash::{hash_domain, Hash64, ScriptletId};
use crate::types::{RuleFlags, RuleSource};

/// Marker between the domain list and the script text.
pub const JS_RULE_MARKER: &str = "#%#";
/// Marker for exception rules.
pub const JS_EXCEPTION_MARKER: &str = "#@%#";

/// Error type for rule parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("not a JS rule")]
    NotJsRule,
    #[error("JS rule has an empty body")]
    EmptyBody,
    #[error("invalid domain: {0:?}")]
    InvalidDomain(String),
}

// =============================================================================
// Domain Scope
// =============================================================================

/// Permitted / restricted domains of a rule, stored as domain hashes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainScope {
    pub include: Vec<Hash64>,
    pub exclude: Vec<Hash64>,
}

impl DomainScope {
    /// Parse the comma separated domain list in front of the marker.
    pub fn parse(list: &str) -> Result<Self, RuleError> {
        let mut scope = Self::default();

        for raw in list.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }

            match raw.strip_prefix('~') {
                Some(rest) => scope.push(rest, true)?,
                None => scope.push(raw, false)?,
            }
        }

        Ok(scope)
    }

    /// Build a scope from separate permitted and restricted lists.
    pub fn from_domains<'d>(
        permitted: impl IntoIterator<Item = &'d str>,
        restricted: impl IntoIterator<Item = &'d str>,
    ) -> Result<Self, RuleError> {
        let mut scope = Self::default();
        for domain in permitted {
            scope.push(domain, false)?;
        }
        for domain in restricted {
            scope.push(domain, true)?;
        }
        Ok(scope)
    }

    fn push(&mut self, raw: &str, is_exclude: bool) -> Result<(), RuleError> {
        let domain = normalize_domain(raw).ok_or_else(|| RuleError::InvalidDomain(raw.to_string()))?;
        let hash = hash_domain(&domain);

        let list = if is_exclude { &mut self.exclude } else { &mut self.include };
        if !list.contains(&hash) {
            list.push(hash);
        }
        Ok(())
    }

    /// No permitted domains: the rule applies everywhere it is not excluded.
    pub fn is_generic(&self) -> bool {
        self.include.is_empty()
    }

    /// Check a document host against this scope.
    pub fn matches(&self, host: &str) -> bool {
        if !self.include.is_empty() {
            let hit = walk_host_suffixes(host).any(|suffix| self.include.contains(&hash_domain(suffix)));
            if !hit {
                return false;
            }
        }

        if !self.exclude.is_empty() {
            let hit = walk_host_suffixes(host).any(|suffix| self.exclude.contains(&hash_domain(suffix)));
            if hit {
                return false;
            }
        }

        true
    }

    /// Order-insensitive comparison of the domain lists.
    pub fn same_domains(&self, other: &DomainScope) -> bool {
        fn sorted(list: &[Hash64]) -> Vec<Hash64> {
            let mut list = list.to_vec();
            list.sort_unstable();
            list
        }

        sorted(&self.include) == sorted(&other.include) && sorted(&self.exclude) == sorted(&other.exclude)
    }
}

// =============================================================================
// JS Rule
// =============================================================================

/// A parsed `#%#` / `#@%#` rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsRule {
    pub body: String,
    pub scope: DomainScope,
    pub flags: RuleFlags,
    pub source: RuleSource,
}

impl JsRule {
    /// Create a (non-exception) rule from parts.
    pub fn new(body: impl Into<String>, scope: DomainScope, source: RuleSource) -> Self {
        let flags = base_flags(&scope, source);
        Self {
            body: body.into(),
            scope,
            flags,
            source,
        }
    }

    /// Parse a single filter line.
    pub fn parse(line: &str, source: RuleSource) -> Result<Self, RuleError> {
        let (domains, body, is_exception) = split_js_rule(line).ok_or(RuleError::NotJsRule)?;

        let body = body.trim_end_matches(['\r', '\n']);
        if body.is_empty() {
            return Err(RuleError::EmptyBody);
        }

        let scope = DomainScope::parse(domains)?;
        let mut flags = base_flags(&scope, source);
        if is_exception {
            flags |= RuleFlags::EXCEPTION;
        }

        Ok(Self {
            body: body.to_string(),
            scope,
            flags,
            source,
        })
    }

    pub fn is_exception(&self) -> bool {
        self.flags.contains(RuleFlags::EXCEPTION)
    }

    pub fn is_generic(&self) -> bool {
        self.flags.contains(RuleFlags::GENERIC)
    }

    pub fn is_trusted(&self) -> bool {
        self.flags.contains(RuleFlags::TRUSTED)
    }

    /// Fingerprint of the body, used as the execution marker.
    pub fn id(&self) -> ScriptletId {
        ScriptletId::from_rule_body(&self.body)
    }
}

fn base_flags(scope: &DomainScope, source: RuleSource) -> RuleFlags {
    let mut flags = RuleFlags::empty();
    if scope.is_generic() {
        flags |= RuleFlags::GENERIC;
    }
    if source.is_trusted() {
        flags |= RuleFlags::TRUSTED;
    }
    flags
}

/// Split a line into (domain list, body, is_exception).
///
/// The domain list cannot contain `#`, so the first `#` must start the marker.
pub fn split_js_rule(line: &str) -> Option<(&str, &str, bool)> {
    let line = line.trim_start();
    let pos = line.find('#')?;
    let rest = &line[pos..];

    if let Some(body) = rest.strip_prefix(JS_EXCEPTION_MARKER) {
        return Some((&line[..pos], body, true));
    }
    if let Some(body) = rest.strip_prefix(JS_RULE_MARKER) {
        return Some((&line[..pos], body, false));
    }

    None
}
