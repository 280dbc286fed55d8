//! Rule configuration values and the formats they are stored in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonc_parser::ParseOptions;
use serde_json::Value;

use crate::CoreError;

/// Rule key (`MD013`, `line-length`, `default`, `extends`, ...) to setting.
pub type RuleConfig = BTreeMap<String, Value>;

/// Recognised directory config files, in probe order.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    ".markdownlint-cli2.jsonc",
    ".markdownlint-cli2.yaml",
    ".markdownlint.jsonc",
    ".markdownlint.json",
    ".markdownlint.yaml",
    ".markdownlint.yml",
];

/// File written by `mdguard init`.
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".markdownlint.json";

/// Key naming the base configuration of an `extends` chain.
pub const EXTENDS_KEY: &str = "extends";

/// Returns the built-in lowest-priority configuration.
pub fn default_config() -> RuleConfig {
    let mut config = RuleConfig::new();
    config.insert("MD013".to_string(), Value::Bool(false));
    config
}

/// Where a resolved configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    WorkspaceSetting,
    UserSetting,
    Default,
}

/// A resolved configuration, shared between every document it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub config: RuleConfig,
    pub source: Option<ConfigOrigin>,
}

impl ConfigEntry {
    pub fn new(config: RuleConfig, source: Option<ConfigOrigin>) -> Arc<Self> {
        Arc::new(Self { config, source })
    }

    /// The default configuration on its own.
    pub fn fallback() -> Arc<Self> {
        Self::new(default_config(), Some(ConfigOrigin::Default))
    }
}

/// Shallow merge: keys of `overrides` replace keys of `base`.
pub fn merge(base: RuleConfig, overrides: RuleConfig) -> RuleConfig {
    let mut merged = base;
    merged.extend(overrides);
    merged
}

/// A config file format.
pub trait ConfigParser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, content: &str) -> Result<Value, CoreError>;
}

/// JSON with comments and trailing commas.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsoncParser;

impl ConfigParser for JsoncParser {
    fn name(&self) -> &'static str {
        "jsonc"
    }

    fn parse(&self, content: &str) -> Result<Value, CoreError> {
        let value = jsonc_parser::parse_to_serde_value(content, &ParseOptions::default())
            .map_err(|e| CoreError::parse(e.to_string()))?;
        Ok(value.unwrap_or_else(|| Value::Object(serde_json::Map::new())))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct YamlParser;

impl ConfigParser for YamlParser {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn parse(&self, content: &str) -> Result<Value, CoreError> {
        let value: Value =
            serde_yaml::from_str(content).map_err(|e| CoreError::parse(e.to_string()))?;
        Ok(match value {
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other,
        })
    }
}

/// The parser list, tried in order until one succeeds.
pub fn default_parsers() -> Vec<Box<dyn ConfigParser>> {
    vec![Box::new(JsoncParser), Box::new(YamlParser)]
}

/// Parses `content` into a rule map.
///
/// `.markdownlint-cli2.*` files keep their rules under the `config` key.
pub fn parse_config(
    path: &Path,
    content: &str,
    parsers: &[Box<dyn ConfigParser>],
) -> Result<RuleConfig, CoreError> {
    let mut errors = Vec::new();
    for parser in parsers {
        match parser.parse(content) {
            Ok(value) => return to_rule_config(path, value),
            Err(e) => errors.push(format!("{}: {}", parser.name(), e)),
        }
    }
    Err(CoreError::config(format!(
        "Unable to parse '{}'; {}",
        path.display(),
        errors.join("; ")
    )))
}

fn to_rule_config(path: &Path, value: Value) -> Result<RuleConfig, CoreError> {
    let value = if is_cli2_file(path) {
        match value {
            Value::Object(mut object) => object.remove("config").unwrap_or(Value::Null),
            other => other,
        }
    } else {
        value
    };
    match value {
        Value::Object(object) => Ok(object.into_iter().collect()),
        Value::Null => Ok(RuleConfig::new()),
        _ => Err(CoreError::config(format!(
            "'{}' does not contain an object",
            path.display()
        ))),
    }
}

fn is_cli2_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(".markdownlint-cli2."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn rules(value: Value) -> RuleConfig {
        serde_json::from_value(value).unwrap()
    }

    #[rstest]
    #[case(".markdownlint.json", r#"{ "MD001": false }"#)]
    #[case(".markdownlint.jsonc", "{\n  // headings\n  \"MD001\": false,\n}")]
    #[case(".markdownlint.yaml", "MD001: false\n")]
    #[case(".markdownlint-cli2.jsonc", r#"{ "config": { "MD001": false }, "ignores": [] }"#)]
    #[case(".markdownlint-cli2.yaml", "config:\n  MD001: false\n")]
    fn parses_every_format(#[case] name: &str, #[case] content: &str) {
        let parsed = parse_config(Path::new(name), content, &default_parsers()).unwrap();
        assert_eq!(parsed, rules(json!({ "MD001": false })));
    }

    #[test]
    fn empty_file_is_empty_config() {
        let parsed = parse_config(Path::new(".markdownlint.json"), "", &default_parsers()).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn unparseable_file_is_config_error() {
        let err = parse_config(
            Path::new(".markdownlint.yaml"),
            "MD001: [unclosed",
            &default_parsers(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(parse_config(Path::new(".markdownlint.json"), "[1, 2]", &default_parsers()).is_err());
    }

    #[test]
    fn merge_is_shallow_and_overrides_win() {
        let base = rules(json!({ "A": true, "B": false, "MD003": { "style": "atx" } }));
        let overrides = rules(json!({ "B": true, "C": true, "MD003": { "other": 1 } }));

        assert_eq!(
            merge(base, overrides),
            rules(json!({ "A": true, "B": true, "C": true, "MD003": { "other": 1 } }))
        );
    }

    #[test]
    fn default_disables_line_length() {
        assert_eq!(default_config().get("MD013"), Some(&Value::Bool(false)));
    }
}
