//! One lint pass against the rule engine.

use std::sync::Arc;

use tracing::debug;

use crate::config::ConfigEntry;
use crate::custom_rules::CustomRule;
use crate::document::Document;
use crate::engine::{LintRequest, RuleEngine};
use crate::ignore::IgnoreSet;
use crate::output::OutputLog;
use crate::violation::RuleViolation;

/// Inputs of a lint pass besides the document itself.
#[derive(Debug, Clone)]
pub struct LintContext<'a> {
    /// Workspace-relative, forward-slash path used for ignore matching.
    pub relative_path: &'a str,
    pub config: &'a ConfigEntry,
    pub custom_rules: Arc<[CustomRule]>,
    pub ignores: &'a IgnoreSet,
    pub plugins: Vec<String>,
}

pub struct LintInvoker {
    engine: Arc<dyn RuleEngine>,
    output: Arc<OutputLog>,
}

impl std::fmt::Debug for LintInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LintInvoker").finish_non_exhaustive()
    }
}

impl LintInvoker {
    pub fn new(engine: Arc<dyn RuleEngine>, output: Arc<OutputLog>) -> Self {
        Self { engine, output }
    }

    /// Lints `document`.
    ///
    /// Ignored documents never reach the engine. Engine failures, panics
    /// included, are written to the output log and yield no violations.
    pub async fn invoke(&self, document: &Document, context: LintContext<'_>) -> Vec<RuleViolation> {
        if context.ignores.is_ignored(context.relative_path) {
            debug!("Ignoring {}", context.relative_path);
            return Vec::new();
        }

        let name = document.name();
        let request = LintRequest {
            name: name.clone(),
            text: document.text.clone(),
            config: context.config.config.clone(),
            custom_rules: context.custom_rules,
            plugins: context.plugins,
            fix: false,
        };

        let engine = Arc::clone(&self.engine);
        let result = match tokio::spawn(async move { engine.evaluate(request).await }).await {
            Ok(result) => result,
            Err(e) => {
                self.output
                    .error(&format!("Exception while linting '{}': {}", name, e));
                return Vec::new();
            }
        };

        match result {
            Ok(output) => output.into_violations(&name),
            Err(e) => {
                self.output
                    .error(&format!("Exception while linting '{}': {}", name, e));
                Vec::new()
            }
        }
    }
}
