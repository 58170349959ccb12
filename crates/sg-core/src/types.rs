//! Core type definitions for ScriptGuard
//!
//! These types are shared between rule matching, the injector and the
//! wasm bindings.

// =============================================================================
// Rule Flags
// =============================================================================

bitflags::bitflags! {
    /// Flags for JS rule behavior.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RuleFlags: u8 {
        /// Exception rule (#@%#) - cancels a script with the same body
        const EXCEPTION = 1 << 0;
        /// No permitted domains - applies on every site not excluded
        const GENERIC = 1 << 1;
        /// Authored by the user (user rules, custom filters)
        const TRUSTED = 1 << 2;
    }
}

// =============================================================================
// Rule Source
// =============================================================================

/// Where a JS rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleSource {
    /// Bundled filter list
    Filter { list_id: u16 },
    /// Custom filter list added by the user
    Custom { list_id: u16 },
    /// User rules
    User,
}

impl RuleSource {
    /// User rules and custom filters are added manually by the user and
    /// bypass the bundled-rules allowlist.
    pub const fn is_trusted(&self) -> bool {
        matches!(self, Self::Custom { .. } | Self::User)
    }
}

// =============================================================================
// Page Context
// =============================================================================

/// The document a set of scripts is being injected into.
#[derive(Debug, Clone)]
pub struct PageContext<'a> {
    /// Full document URL
    pub url: &'a str,
    /// Document hostname (extracted from URL)
    pub host: &'a str,
    /// Tab ID
    pub tab_id: i32,
    /// Frame ID (0 is the top frame)
    pub frame_id: i32,
}

impl<'a> PageContext<'a> {
    /// Build a context for the top frame of `url`.
    pub fn from_url(url: &'a str) -> Self {
        Self {
            url,
            host: crate::domain::extract_host(url).unwrap_or(""),
            tab_id: -1,
            frame_id: 0,
        }
    }
}

// =============================================================================
// Execution Result
// =============================================================================

/// Outcome of a single `Injector::inject` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExecutionResult {
    /// No local implementation for this rule body
    NotFound = 0,
    /// Already executed in this document
    AlreadyRun = 1,
    /// Ran to completion
    Executed = 2,
    /// Ran and failed; the failure was logged and suppressed
    Failed = 3,
}

/// Per-document injection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectionStats {
    pub executed: u32,
    pub already_run: u32,
    pub not_found: u32,
    pub failed: u32,
}

impl InjectionStats {
    pub fn record(&mut self, result: ExecutionResult) {
        match result {
            ExecutionResult::NotFound => self.not_found += 1,
            ExecutionResult::AlreadyRun => self.already_run += 1,
            ExecutionResult::Executed => self.executed += 1,
            ExecutionResult::Failed => self.failed += 1,
        }
    }

    pub const fn total(&self) -> u32 {
        self.executed + self.already_run + self.not_found + self.failed
    }
}
