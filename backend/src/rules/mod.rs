//! Rule set resolution.
//!
//! Derives a baseline rule list from column headers and merges it with
//! caller-supplied rules. The result is compiled once per run into a
//! [`RuleSet`]: regex patterns are built up front and rules are indexed by
//! field so the batch loop never re-scans the full list per cell.
//!
//! # Header heuristics
//!
//! | Header contains (case-insensitive) | Generated rule              |
//! |------------------------------------|-----------------------------|
//! | `email`, `id` or `name`            | `required`                  |
//! | `email`                            | `data_type` = email         |
//! | `id` but not `name`                | `data_type` = number        |

use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

use crate::models::{DataType, RuleConfig, RuleType, ValidationRule};

/// Build the heuristic rules for a header list.
pub fn default_rules(headers: &[String]) -> Vec<ValidationRule> {
    let mut rules = Vec::new();

    for (i, header) in headers.iter().enumerate() {
        let lower = header.to_lowercase();
        let is_email = lower.contains("email");
        let is_id = lower.contains("id");
        let is_name = lower.contains("name");
        let base = (i as u32) * 10;

        if is_email || is_id || is_name {
            rules.push(
                ValidationRule::new(
                    format!("required_{}", header),
                    format!("Required: {}", header),
                    RuleType::Required,
                    header.clone(),
                )
                .with_config(RuleConfig {
                    allow_empty: Some(false),
                    message: Some("{field} is required".to_string()),
                    ..Default::default()
                })
                .with_order(base),
            );
        }

        if is_email {
            rules.push(
                ValidationRule::new(
                    format!("email_format_{}", header),
                    format!("Email format: {}", header),
                    RuleType::DataType,
                    header.clone(),
                )
                .with_config(RuleConfig {
                    data_type: Some(DataType::Email),
                    message: Some("{field} must be a valid email address".to_string()),
                    ..Default::default()
                })
                .with_order(base + 1),
            );
        }

        if is_id && !is_name {
            rules.push(
                ValidationRule::new(
                    format!("numeric_{}", header),
                    format!("Numeric: {}", header),
                    RuleType::DataType,
                    header.clone(),
                )
                .with_config(RuleConfig {
                    data_type: Some(DataType::Number),
                    message: Some("{field} must be a number".to_string()),
                    ..Default::default()
                })
                .with_order(base + 2),
            );
        }
    }

    rules
}

/// Header-derived rules followed by `supplied`, without deduplication.
pub fn resolve_rules(headers: &[String], supplied: Vec<ValidationRule>) -> Vec<ValidationRule> {
    let mut rules = default_rules(headers);
    rules.extend(supplied);
    rules
}

/// A rule prepared for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: ValidationRule,
    /// Compiled `pattern` for pattern rules; `None` when absent or invalid.
    pub regex: Option<Regex>,
}

/// The effective, compiled rule list for one run.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<CompiledRule>,
    by_field: HashMap<String, Vec<usize>>,
}

impl RuleSet {
    /// Compile `rules`, keeping only active ones.
    ///
    /// Within a field, `required` rules come first so a failing required
    /// check can short-circuit the rest.
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        let mut by_field: HashMap<String, Vec<usize>> = HashMap::new();

        for rule in rules.into_iter().filter(|r| r.active) {
            let regex = compile_pattern(&rule);
            by_field
                .entry(rule.field.clone())
                .or_default()
                .push(compiled.len());
            compiled.push(CompiledRule { rule, regex });
        }

        for indices in by_field.values_mut() {
            // stable: declaration order is kept inside each group
            indices.sort_by_key(|&i| compiled[i].rule.rule_type != RuleType::Required);
        }

        Self {
            rules: compiled,
            by_field,
        }
    }

    /// Rules that apply to `field`, required rules first.
    pub fn for_field<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a CompiledRule> + 'a {
        self.by_field
            .get(field)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.rules[i])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &ValidationRule> {
        self.rules.iter().map(|c| &c.rule)
    }
}

fn compile_pattern(rule: &ValidationRule) -> Option<Regex> {
    if rule.rule_type != RuleType::Pattern {
        return None;
    }
    let pattern = rule.config.pattern.as_deref()?;
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(
                rule = %rule.name,
                pattern,
                error = %e,
                "Invalid regex pattern, rule will pass every value",
            );
            None
        }
    }
}
