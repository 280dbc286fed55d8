//! Boundary to the rule-evaluation engine.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::oneshot;

use crate::CoreError;
use crate::config::RuleConfig;
use crate::custom_rules::CustomRule;
use crate::violation::RuleViolation;

/// Everything the engine needs to evaluate one document.
#[derive(Debug, Clone, PartialEq)]
pub struct LintRequest {
    /// Document name; results keyed by document use it.
    pub name: String,
    pub text: String,
    pub config: RuleConfig,
    pub custom_rules: Arc<[CustomRule]>,
    /// Markup extension plugins passed through to the engine.
    pub plugins: Vec<String>,
    /// Whether the engine may apply fixes itself. Always false here; fixes
    /// are applied by the fixer.
    pub fix: bool,
}

/// Result shapes engines return.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EngineOutput {
    Violations(Vec<RuleViolation>),
    ByDocument(BTreeMap<String, Vec<RuleViolation>>),
}

impl EngineOutput {
    /// Flattens to the violations of `name`.
    ///
    /// A keyed result without `name` contributes every list it holds, in key
    /// order.
    pub fn into_violations(self, name: &str) -> Vec<RuleViolation> {
        match self {
            EngineOutput::Violations(violations) => violations,
            EngineOutput::ByDocument(mut by_document) => match by_document.remove(name) {
                Some(violations) => violations,
                None => by_document.into_values().flatten().collect(),
            },
        }
    }
}

/// Evaluates rules against a document.
#[async_trait]
pub trait RuleEngine: Send + Sync {
    async fn evaluate(&self, request: LintRequest) -> Result<EngineOutput, CoreError>;
}

/// Completion callback handed to callback-style engines.
pub type EngineCallback = Box<dyn FnOnce(Result<EngineOutput, CoreError>) + Send>;

/// Adapts an engine that reports through a callback.
pub struct CallbackEngine<F> {
    evaluate: F,
}

impl<F> CallbackEngine<F>
where
    F: Fn(LintRequest, EngineCallback) + Send + Sync,
{
    pub fn new(evaluate: F) -> Self {
        Self { evaluate }
    }
}

#[async_trait]
impl<F> RuleEngine for CallbackEngine<F>
where
    F: Fn(LintRequest, EngineCallback) + Send + Sync,
{
    async fn evaluate(&self, request: LintRequest) -> Result<EngineOutput, CoreError> {
        let (tx, rx) = oneshot::channel();
        (self.evaluate)(
            request,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.await
            .map_err(|_| CoreError::engine("engine dropped its callback without a result"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request() -> LintRequest {
        LintRequest {
            name: "README.md".to_string(),
            text: "# Title\n".to_string(),
            config: RuleConfig::new(),
            custom_rules: Arc::from(Vec::new()),
            plugins: Vec::new(),
            fix: false,
        }
    }

    fn violation(line: usize) -> RuleViolation {
        RuleViolation::new(["MD001"], line, "Heading levels")
    }

    #[test]
    fn keyed_output_is_flattened_for_the_document() {
        let output: EngineOutput = serde_json::from_value(json!({
            "README.md": [{ "ruleNames": ["MD001"], "lineNumber": 1, "ruleDescription": "Heading levels" }],
            "other.md": [{ "ruleNames": ["MD001"], "lineNumber": 9, "ruleDescription": "Heading levels" }]
        }))
        .unwrap();

        assert_eq!(output.into_violations("README.md"), vec![violation(1)]);
    }

    #[test]
    fn list_output_passes_through() {
        let output: EngineOutput = serde_json::from_value(json!([
            { "ruleNames": ["MD001"], "lineNumber": 2, "ruleDescription": "Heading levels" }
        ]))
        .unwrap();

        assert_eq!(output.into_violations("ignored"), vec![violation(2)]);
    }

    #[tokio::test]
    async fn callback_engine_forwards_results() {
        let engine = CallbackEngine::new(|request: LintRequest, done: EngineCallback| {
            let line = request.text.lines().count();
            std::thread::spawn(move || done(Ok(EngineOutput::Violations(vec![violation(line)]))));
        });

        let output = engine.evaluate(request()).await.unwrap();
        assert_eq!(output, EngineOutput::Violations(vec![violation(1)]));
    }

    #[tokio::test]
    async fn callback_engine_forwards_errors() {
        let engine = CallbackEngine::new(|_request: LintRequest, done: EngineCallback| {
            done(Err(CoreError::engine("rule threw")));
        });

        let err = engine.evaluate(request()).await.unwrap_err();
        assert!(matches!(err, CoreError::Engine(_)));
    }

    #[tokio::test]
    async fn dropped_callback_is_an_error() {
        let engine = CallbackEngine::new(|_request: LintRequest, done: EngineCallback| drop(done));
        assert!(engine.evaluate(request()).await.is_err());
    }
}
