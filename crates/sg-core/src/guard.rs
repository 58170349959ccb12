//! Per-document execution guard
//!
//! Records which scriptlets already ran in the current document. The marker
//! set is private to the content-script instance that owns the guard; page
//! script never sees it. A new document gets a new guard.

use std::collections::HashSet;
use std::fmt;

use crate::hash::ScriptletId;

/// At-most-once execution markers for one document.
#[derive(Default)]
pub struct ExecutionGuard {
    executed: HashSet<ScriptletId>,
}

impl ExecutionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn has_run(&self, id: ScriptletId) -> bool {
        self.executed.contains(&id)
    }

    /// Set the marker. Returns `true` if it was not set before.
    #[inline]
    pub fn mark_run(&mut self, id: ScriptletId) -> bool {
        self.executed.insert(id)
    }

    pub fn len(&self) -> usize {
        self.executed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executed.is_empty()
    }
}

// Only the count: marker ids stay out of logs.
impl fmt::Debug for ExecutionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionGuard")
            .field("executed", &self.executed.len())
            .finish()
    }
}
