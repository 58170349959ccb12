//! Scriptlet registry
//!
//! An immutable map from rule body to a local scriptlet implementation.
//! Lookups compare bodies byte-for-byte; a miss is `None`, not an error,
//! because filter lists legitimately contain rules with no local
//! implementation.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::hash::ScriptletId;

/// Error raised by a scriptlet body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptletError {
    #[error("{0}")]
    Thrown(String),
    #[error("panicked: {0}")]
    Panicked(String),
}

/// Error type for registry construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate rule body: {0:?}")]
    DuplicateRule(String),
    #[error("rule body is empty")]
    EmptyRuleBody,
    #[error("scriptlet id does not fingerprint rule body {0:?}")]
    IdMismatch(String),
}

/// A zero-argument unit of work injected into a document.
pub trait Scriptlet {
    /// Stable identifier used as the execution marker.
    fn id(&self) -> ScriptletId;

    /// Run the scriptlet against the current document.
    fn run(&self) -> Result<(), ScriptletError>;
}

/// Shared handle to a registered scriptlet.
pub type ScriptletRef = Rc<dyn Scriptlet>;

/// Scriptlet backed by a closure.
pub struct FnScriptlet<F> {
    id: ScriptletId,
    f: F,
}

impl<F> FnScriptlet<F>
where
    F: Fn() -> Result<(), ScriptletError>,
{
    /// Wrap `f` as the implementation of `body`.
    pub fn new(body: &str, f: F) -> Self {
        Self {
            id: ScriptletId::from_rule_body(body),
            f,
        }
    }
}

impl<F> Scriptlet for FnScriptlet<F>
where
    F: Fn() -> Result<(), ScriptletError>,
{
    fn id(&self) -> ScriptletId {
        self.id
    }

    fn run(&self) -> Result<(), ScriptletError> {
        (self.f)()
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Immutable rule body -> scriptlet map.
#[derive(Default)]
pub struct ScriptletRegistry {
    entries: HashMap<String, ScriptletRef>,
}

impl ScriptletRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up the scriptlet registered for exactly `body`.
    #[inline]
    pub fn resolve(&self, body: &str) -> Option<&ScriptletRef> {
        self.entries.get(body)
    }

    pub fn contains(&self, body: &str) -> bool {
        self.entries.contains_key(body)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered rule bodies, in no particular order.
    pub fn rule_bodies(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for ScriptletRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptletRegistry")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Builder for `ScriptletRegistry`.
#[derive(Default)]
pub struct RegistryBuilder {
    entries: HashMap<String, ScriptletRef>,
}

impl RegistryBuilder {
    /// Register a scriptlet for a rule body.
    pub fn register(&mut self, body: impl Into<String>, scriptlet: ScriptletRef) -> Result<&mut Self, RegistryError> {
        let body = body.into();
        if body.is_empty() {
            return Err(RegistryError::EmptyRuleBody);
        }
        if self.entries.contains_key(&body) {
            return Err(RegistryError::DuplicateRule(body));
        }
        // The guard keys on the id, so it must be the body's own fingerprint.
        if scriptlet.id() != ScriptletId::from_rule_body(&body) {
            return Err(RegistryError::IdMismatch(body));
        }

        self.entries.insert(body, scriptlet);
        Ok(self)
    }

    /// Register a closure for a rule body.
    pub fn register_fn<F>(&mut self, body: impl Into<String>, f: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn() -> Result<(), ScriptletError> + 'static,
    {
        let body = body.into();
        let scriptlet = Rc::new(FnScriptlet::new(&body, f));
        self.register(body, scriptlet)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn build(self) -> ScriptletRegistry {
        ScriptletRegistry { entries: self.entries }
    }
}
