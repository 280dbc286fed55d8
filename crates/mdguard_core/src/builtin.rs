//! Built-in rule engine.
//!
//! Implements a small markdownlint-compatible rule set (MD009, MD010, MD012,
//! MD013, MD019, MD047) plus line-pattern custom rules, so documents can be
//! linted and fixed without an external engine.

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::CoreError;
use crate::config::RuleConfig;
use crate::custom_rules::CustomRule;
use crate::document::{split_lines, utf16_len};
use crate::engine::{EngineOutput, LintRequest, RuleEngine};
use crate::violation::{FixDescriptor, RuleViolation};

const INFORMATION_BASE: &str = "https://github.com/DavidAnson/markdownlint/blob/v0.38.0/doc/";

struct RuleInfo {
    names: [&'static str; 2],
    description: &'static str,
    tags: &'static [&'static str],
}

const MD009: RuleInfo = RuleInfo {
    names: ["MD009", "no-trailing-spaces"],
    description: "Trailing spaces",
    tags: &["whitespace"],
};
const MD010: RuleInfo = RuleInfo {
    names: ["MD010", "no-hard-tabs"],
    description: "Hard tabs",
    tags: &["whitespace", "hard_tab"],
};
const MD012: RuleInfo = RuleInfo {
    names: ["MD012", "no-multiple-blanks"],
    description: "Multiple consecutive blank lines",
    tags: &["whitespace", "blank_lines"],
};
const MD013: RuleInfo = RuleInfo {
    names: ["MD013", "line-length"],
    description: "Line length",
    tags: &["line_length"],
};
const MD019: RuleInfo = RuleInfo {
    names: ["MD019", "no-multiple-space-atx"],
    description: "Multiple spaces after hash on atx style heading",
    tags: &["headings", "atx", "spaces"],
};
const MD047: RuleInfo = RuleInfo {
    names: ["MD047", "single-trailing-newline"],
    description: "Files should end with a single newline character",
    tags: &["blank_lines"],
};

impl RuleInfo {
    fn violation(&self, line_number: usize) -> RuleViolation {
        RuleViolation::new(self.names, line_number, self.description).with_information(format!(
            "{}{}.md",
            INFORMATION_BASE,
            self.names[0].to_ascii_lowercase()
        ))
    }
}

/// Looks up the setting of a rule: by name or alias, then by tag, then the
/// `default` key.
fn rule_setting<'a>(config: &'a RuleConfig, names: &[&str], tags: &[&str]) -> Option<&'a Value> {
    let lookup = |key: &str| {
        config
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    };
    if let Some(value) = names.iter().find_map(|n| lookup(n)) {
        return Some(value);
    }
    tags.iter().find_map(|t| lookup(t))
}

/// Options of an enabled rule, `None` when the rule is off.
fn rule_options<'a>(config: &'a RuleConfig, names: &[&str], tags: &[&str]) -> Option<Option<&'a Value>> {
    let enabled_by_default = !matches!(config.get("default"), Some(Value::Bool(false)));
    match rule_setting(config, names, tags) {
        Some(Value::Bool(false)) => None,
        Some(value @ Value::Object(_)) => Some(Some(value)),
        Some(_) => Some(None),
        None if enabled_by_default => Some(None),
        None => None,
    }
}

fn option_usize(options: Option<&Value>, key: &str, default: usize) -> usize {
    options
        .and_then(|o| o.get(key))
        .and_then(Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
        .unwrap_or(default)
}

fn option_bool(options: Option<&Value>, key: &str, default: bool) -> bool {
    options
        .and_then(|o| o.get(key))
        .and_then(Value::as_bool)
        .unwrap_or(default)
}

/// Per-line facts shared by the rules.
struct LineInfo<'a> {
    text: &'a str,
    in_code_fence: bool,
}

fn analyze<'a>(lines: &[&'a str]) -> Vec<LineInfo<'a>> {
    let mut infos = Vec::with_capacity(lines.len());
    let mut fence: Option<(char, usize)> = None;
    for line in lines {
        let trimmed = line.trim_start_matches(' ');
        let indent = line.len() - trimmed.len();
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~');
        let run = marker.map_or(0, |m| trimmed.chars().take_while(|c| *c == m).count());
        let is_fence = indent <= 3 && run >= 3;

        match (fence, marker) {
            (Some((open, len)), Some(m)) if is_fence && m == open && run >= len => {
                infos.push(LineInfo { text: line, in_code_fence: true });
                fence = None;
            }
            (Some(_), _) => infos.push(LineInfo { text: line, in_code_fence: true }),
            (None, Some(m)) if is_fence => {
                infos.push(LineInfo { text: line, in_code_fence: true });
                fence = Some((m, run));
            }
            (None, _) => infos.push(LineInfo { text: line, in_code_fence: false }),
        }
    }
    infos
}

fn trailing_spaces(config: &RuleConfig, lines: &[LineInfo<'_>], out: &mut Vec<RuleViolation>) {
    let Some(options) = rule_options(config, &MD009.names, MD009.tags) else {
        return;
    };
    let br_spaces = option_usize(options, "br_spaces", 2);
    let expected = if br_spaces < 2 { 0 } else { br_spaces };
    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.text.trim_end_matches(' ');
        let count = line.text.len() - trimmed.len();
        if count == 0 || (count == expected && !trimmed.trim().is_empty()) {
            continue;
        }
        let column = utf16_len(trimmed) + 1;
        let detail = if expected == 0 {
            format!("Expected: 0; Actual: {}", count)
        } else {
            format!("Expected: 0 or {}; Actual: {}", expected, count)
        };
        out.push(
            MD009
                .violation(index + 1)
                .with_detail(detail)
                .with_range(column, count)
                .with_fix(FixDescriptor::delete(column, count)),
        );
    }
}

fn hard_tabs(config: &RuleConfig, lines: &[LineInfo<'_>], out: &mut Vec<RuleViolation>) {
    let Some(options) = rule_options(config, &MD010.names, MD010.tags) else {
        return;
    };
    let code_blocks = option_bool(options, "code_blocks", true);
    let spaces_per_tab = option_usize(options, "spaces_per_tab", 1);
    for (index, line) in lines.iter().enumerate() {
        if line.in_code_fence && !code_blocks {
            continue;
        }
        let mut column = 1;
        let mut chars = line.text.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '\t' {
                column += ch.len_utf16();
                continue;
            }
            let mut run = 1;
            while chars.next_if_eq(&'\t').is_some() {
                run += 1;
            }
            out.push(
                MD010
                    .violation(index + 1)
                    .with_detail(format!("Column: {}", column))
                    .with_range(column, run)
                    .with_fix(FixDescriptor::replace(
                        column,
                        run,
                        " ".repeat(run * spaces_per_tab),
                    )),
            );
            column += run;
        }
    }
}

fn multiple_blanks(config: &RuleConfig, lines: &[LineInfo<'_>], out: &mut Vec<RuleViolation>) {
    let Some(options) = rule_options(config, &MD012.names, MD012.tags) else {
        return;
    };
    let maximum = option_usize(options, "maximum", 1);
    let mut count = 0;
    for (index, line) in lines.iter().enumerate() {
        if line.in_code_fence || !line.text.trim().is_empty() {
            count = 0;
            continue;
        }
        count += 1;
        if count > maximum {
            out.push(
                MD012
                    .violation(index + 1)
                    .with_detail(format!("Expected: {}; Actual: {}", maximum, count))
                    .with_fix(FixDescriptor::delete_line()),
            );
        }
    }
}

fn line_length(config: &RuleConfig, lines: &[LineInfo<'_>], out: &mut Vec<RuleViolation>) {
    let Some(options) = rule_options(config, &MD013.names, MD013.tags) else {
        return;
    };
    let limit = option_usize(options, "line_length", 80);
    let code_blocks = option_bool(options, "code_blocks", true);
    for (index, line) in lines.iter().enumerate() {
        if line.in_code_fence && !code_blocks {
            continue;
        }
        let length = utf16_len(line.text);
        if length > limit {
            out.push(
                MD013
                    .violation(index + 1)
                    .with_detail(format!("Expected: {}; Actual: {}", limit, length))
                    .with_range(limit + 1, length - limit),
            );
        }
    }
}

fn multiple_space_atx(config: &RuleConfig, lines: &[LineInfo<'_>], out: &mut Vec<RuleViolation>) {
    if rule_options(config, &MD019.names, MD019.tags).is_none() {
        return;
    }
    for (index, line) in lines.iter().enumerate() {
        if line.in_code_fence {
            continue;
        }
        let indent = line.text.len() - line.text.trim_start_matches(' ').len();
        if indent > 3 {
            continue;
        }
        let rest = &line.text[indent..];
        let hashes = rest.chars().take_while(|c| *c == '#').count();
        if hashes == 0 || hashes > 6 {
            continue;
        }
        let after = &rest[hashes..];
        let spaces = after.len() - after.trim_start_matches([' ', '\t']).len();
        let has_text = after[spaces..].chars().next().is_some_and(|c| !c.is_whitespace());
        if spaces < 2 || !has_text {
            continue;
        }
        let column = indent + 1;
        out.push(
            MD019
                .violation(index + 1)
                .with_range(column, hashes + spaces + 1)
                .with_fix(FixDescriptor::delete(indent + hashes + 1, spaces - 1)),
        );
    }
}

fn single_trailing_newline(config: &RuleConfig, lines: &[LineInfo<'_>], out: &mut Vec<RuleViolation>) {
    if rule_options(config, &MD047.names, MD047.tags).is_none() {
        return;
    }
    let Some(last) = lines.last() else {
        return;
    };
    if last.text.trim().is_empty() {
        return;
    }
    let length = utf16_len(last.text);
    out.push(
        MD047
            .violation(lines.len())
            .with_range(length, 1)
            .with_fix(FixDescriptor::insert(length + 1, "\n")),
    );
}

fn custom_rule(
    config: &RuleConfig,
    rule: &CustomRule,
    lines: &[LineInfo<'_>],
    out: &mut Vec<RuleViolation>,
) -> Result<(), CoreError> {
    let names: Vec<&str> = rule.names.iter().map(String::as_str).collect();
    let tags: Vec<&str> = rule.tags.iter().map(String::as_str).collect();
    if rule_options(config, &names, &tags).is_none() {
        return Ok(());
    }
    let pattern = Regex::new(&rule.function).map_err(|e| {
        CoreError::engine(format!("Custom rule '{}' failed: {}", rule.names[0], e))
    })?;
    for (index, line) in lines.iter().enumerate() {
        if line.in_code_fence {
            continue;
        }
        if let Some(found) = pattern.find(line.text) {
            let column = utf16_len(&line.text[..found.start()]) + 1;
            let mut violation = RuleViolation::new(rule.names.iter().cloned(), index + 1, &rule.description)
                .with_range(column, utf16_len(found.as_str()).max(1));
            if let Some(information) = &rule.information {
                violation = violation.with_information(information.clone());
            }
            out.push(violation);
        }
    }
    Ok(())
}

/// Evaluates `request` synchronously.
pub fn check(request: &LintRequest) -> Result<Vec<RuleViolation>, CoreError> {
    let lines = split_lines(&request.text);
    let lines = analyze(&lines);
    let config = &request.config;

    let mut violations = Vec::new();
    trailing_spaces(config, &lines, &mut violations);
    hard_tabs(config, &lines, &mut violations);
    multiple_blanks(config, &lines, &mut violations);
    line_length(config, &lines, &mut violations);
    multiple_space_atx(config, &lines, &mut violations);
    single_trailing_newline(config, &lines, &mut violations);
    for rule in request.custom_rules.iter() {
        custom_rule(config, rule, &lines, &mut violations)?;
    }

    violations.sort_by_key(|v| v.line_number);
    debug!("{}: {} violation(s)", request.name, violations.len());
    Ok(violations)
}

/// The built-in engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinEngine;

#[async_trait]
impl RuleEngine for BuiltinEngine {
    async fn evaluate(&self, request: LintRequest) -> Result<EngineOutput, CoreError> {
        let violations = tokio::task::spawn_blocking(move || check(&request))
            .await
            .map_err(|e| CoreError::engine(format!("Lint task failed: {}", e)))??;
        Ok(EngineOutput::Violations(violations))
    }
}
