//! # mdguard_core
//!
//! Lint orchestration core for mdguard.
//!
//! This crate provides:
//! - Configuration discovery and `extends` merging (`ConfigResolver`)
//! - Ignore globs and ignore files (`IgnoreMatcher`)
//! - The trust-gated custom rule loader (`CustomRuleGate`)
//! - Debounced per-document scheduling (`LintScheduler`)
//! - Diagnostic construction and fix application
//!
//! ## Example
//!
//! ```rust,ignore
//! use mdguard_core::{BuiltinEngine, FixFilter, LintRequest, RuleEngine, apply_fixes};
//!
//! let output = BuiltinEngine.evaluate(request).await?;
//! let violations = output.into_violations(&request_name);
//! let result = apply_fixes(&text, &violations, &FixFilter::All);
//! ```

pub mod builtin;
pub mod config;
pub mod custom_rules;
pub mod diagnostic;
pub mod document;
pub mod engine;
mod error;
pub mod fixer;
pub mod fs;
pub mod ignore;
pub mod invoker;
pub mod output;
pub mod resolver;
pub mod scheduler;
pub mod settings;
pub mod violation;
pub mod workspace;

pub use builtin::BuiltinEngine;
pub use config::{ConfigEntry, ConfigOrigin, RuleConfig, default_config};
pub use custom_rules::{
    CustomRule, CustomRuleGate, FileTrustStore, GateState, JsonRuleLoader, MemoryTrustStore,
    NoExtensions, TrustChoice, TrustPrompter, TrustStore,
};
pub use diagnostic::{Diagnostic, DiagnosticBuilder, Position, Range};
pub use document::Document;
pub use engine::{CallbackEngine, EngineOutput, LintRequest, RuleEngine};
pub use error::CoreError;
pub use fixer::{FixFilter, FixerResult, LineFix, TextEdit, apply_fix, apply_fixes};
pub use fs::{FileSystem, NativeFs, NullFs};
pub use ignore::{IgnoreMatcher, IgnoreSet, IgnoreSetting};
pub use invoker::LintInvoker;
pub use output::{OutputLog, OutputSink};
pub use resolver::ConfigResolver;
pub use scheduler::{DEBOUNCE_DELAY, HostView, LintScheduler, Publisher, SchedulerParts};
pub use settings::{FocusMode, RunMode, Settings, SettingsProvider, SettingsStore};
pub use violation::{DeleteCount, FixDescriptor, RuleViolation};
pub use workspace::{WorkspaceFolder, WorkspaceFolders};

#[cfg(test)]
pub mod test_utils;
