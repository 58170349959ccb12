//! ScriptGuard Core Library
//!
//! Runs JS rules (`#%#` filter rules) inside web documents without evaluating
//! rule text. Every rule body that may run has a local, pre-built scriptlet
//! registered under its exact text; the rule body is only ever used as a
//! lookup key.
//!
//! # Architecture
//!
//! The background side decides which bodies apply to a page (`matcher`,
//! gated by the bundled `catalog` and the browser `policy`). The content side
//! resolves each body in the `registry`, checks the document's `guard` and
//! runs the scriptlet through the `injector`, which never lets a failure
//! escape.
//!
//! # Modules
//!
//! - `hash`: Murmur3 hashing and scriptlet ids
//! - `domain`: Host extraction and suffix walking
//! - `rule`: JS rule parsing and domain scopes
//! - `catalog`: Bundled rules allowlist
//! - `policy`: Per-browser injection restrictions
//! - `matcher`: Page to rule bodies
//! - `registry`: Rule body to scriptlet
//! - `guard`: Per-document execution markers
//! - `injector`: Guarded, isolated execution
//! - `config`: Engine configuration
//! - `types`: Shared type definitions

pub mod catalog;
pub mod config;
pub mod domain;
pub mod guard;
pub mod hash;
pub mod injector;
pub mod matcher;
pub mod policy;
pub mod registry;
pub mod rule;
pub mod types;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogError};
pub use config::{ConfigError, EngineConfig};
pub use guard::ExecutionGuard;
pub use hash::{Hash64, ScriptletId};
pub use injector::Injector;
pub use matcher::{Matcher, ScriptMatchResult};
pub use policy::{Browser, InjectionPolicy};
pub use registry::{FnScriptlet, RegistryBuilder, RegistryError, Scriptlet, ScriptletError, ScriptletRef, ScriptletRegistry};
pub use rule::{JsRule, RuleError};
pub use types::{ExecutionResult, InjectionStats, PageContext, RuleFlags, RuleSource};
