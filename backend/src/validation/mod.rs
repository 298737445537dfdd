//! Field validation: one rule against one cell value.
//!
//! [`FieldValidator::evaluate`] returns `Ok(true)` when the value passes,
//! `Ok(false)` when it fails, and `Err(RuleFault)` when the rule itself
//! cannot be evaluated. Faults are turned into error entries by the batch
//! processor; they never abort a row.
//!
//! # Empty values
//!
//! A null or `""` cell passes every rule except `required`, unless the rule
//! sets `allowEmpty: false`.
//!
//! # Custom rules
//!
//! `custom` rules are delegated to a [`CustomRuleEvaluator`]. The default
//! [`PassThroughEvaluator`] accepts everything; plug in a restricted
//! evaluator (allow-listed functions, no arbitrary code) to give them
//! meaning.
//!
//! # Example
//!
//! ```rust,ignore
//! use rowcheck::{FieldValidator, RuleSet, ValidationRule, RuleType};
//! use serde_json::json;
//!
//! let set = RuleSet::new(vec![ValidationRule::new("r", "Required", RuleType::Required, "name")]);
//! let rule = set.for_field("name").next().unwrap();
//! assert_eq!(FieldValidator::default().evaluate(&json!(""), rule), Ok(false));
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

use crate::error::RuleFault;
use crate::models::{DataType, RuleType, ValidationRule};
use crate::rules::CompiledRule;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid")
});

const BOOLEAN_WORDS: [&str; 6] = ["true", "false", "1", "0", "yes", "no"];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Extension point for `custom` rules.
pub trait CustomRuleEvaluator: Send + Sync {
    fn evaluate(&self, value: &Value, rule: &ValidationRule) -> Result<bool, RuleFault>;
}

/// Accepts every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughEvaluator;

impl CustomRuleEvaluator for PassThroughEvaluator {
    fn evaluate(&self, _value: &Value, _rule: &ValidationRule) -> Result<bool, RuleFault> {
        Ok(true)
    }
}

/// Evaluates rules against cell values.
#[derive(Clone)]
pub struct FieldValidator {
    custom: Arc<dyn CustomRuleEvaluator>,
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new(Arc::new(PassThroughEvaluator))
    }
}

impl std::fmt::Debug for FieldValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldValidator").finish_non_exhaustive()
    }
}

impl FieldValidator {
    pub fn new(custom: Arc<dyn CustomRuleEvaluator>) -> Self {
        Self { custom }
    }

    /// Check `value` against `compiled`.
    pub fn evaluate(&self, value: &Value, compiled: &CompiledRule) -> Result<bool, RuleFault> {
        let rule = &compiled.rule;

        if rule.rule_type != RuleType::Required
            && is_empty_value(value)
            && rule.config.allow_empty != Some(false)
        {
            return Ok(true);
        }

        match rule.rule_type {
            RuleType::Required => Ok(!is_empty_value(value)),
            RuleType::DataType => {
                let data_type = rule
                    .config
                    .data_type
                    .ok_or(RuleFault::MissingConfig("dataType"))?;
                Ok(check_data_type(value, data_type))
            }
            RuleType::Format => {
                let Some(s) = value.as_str() else {
                    return Ok(false);
                };
                let len = s.chars().count();
                if rule.config.min_length.is_some_and(|min| len < min) {
                    return Ok(false);
                }
                if rule.config.max_length.is_some_and(|max| len > max) {
                    return Ok(false);
                }
                Ok(true)
            }
            RuleType::Range => {
                let Some(n) = coerce_number(value) else {
                    return Ok(false);
                };
                if rule.config.min.is_some_and(|min| n < min) {
                    return Ok(false);
                }
                if rule.config.max.is_some_and(|max| n > max) {
                    return Ok(false);
                }
                Ok(true)
            }
            // Invalid patterns were reported at compile time and pass here.
            RuleType::Pattern => Ok(compiled
                .regex
                .as_ref()
                .map_or(true, |re| re.is_match(&display_value(value)))),
            RuleType::Custom => self.custom.evaluate(value, rule),
        }
    }
}

/// Null or empty string.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Finite numeric coercion of a cell.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn check_data_type(value: &Value, data_type: DataType) -> bool {
    match data_type {
        DataType::String => value.is_string(),
        DataType::Number => coerce_number(value).is_some(),
        DataType::Boolean => match value {
            Value::Bool(_) => true,
            Value::Number(n) => matches!(n.as_f64(), Some(v) if v == 0.0 || v == 1.0),
            Value::String(s) => {
                let lower = s.trim().to_lowercase();
                BOOLEAN_WORDS.contains(&lower.as_str())
            }
            _ => false,
        },
        DataType::Date => value.as_str().is_some_and(is_date),
        DataType::Email => value.as_str().is_some_and(|s| EMAIL_RE.is_match(s)),
    }
}

fn is_date(s: &str) -> bool {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s).is_ok()
        || DATE_FORMATS
            .iter()
            .any(|f| NaiveDate::parse_from_str(s, f).is_ok())
        || DATETIME_FORMATS
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(s, f).is_ok())
}

/// String form of a cell as used in messages and pattern tests.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Render the message for a failed rule.
pub fn render_message(rule: &ValidationRule, field: &str, value: &Value) -> String {
    let template = match &rule.config.message {
        Some(m) => m.clone(),
        None => default_message(rule),
    };
    template
        .replace("{field}", field)
        .replace("{value}", &display_value(value))
        .replace("{rule}", &rule.name)
}

fn default_message(rule: &ValidationRule) -> String {
    match rule.rule_type {
        RuleType::Required => "{field} is required".to_string(),
        RuleType::DataType => match rule.config.data_type {
            Some(t) => format!("{{field}} must be a valid {}", t.as_str()),
            None => "{field} has the wrong data type".to_string(),
        },
        RuleType::Format => "{field} has an invalid format".to_string(),
        RuleType::Range => "{field} is out of range".to_string(),
        RuleType::Pattern => "{field} does not match the expected pattern".to_string(),
        RuleType::Custom => "{field} failed rule {rule}".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleConfig;
    use crate::rules::RuleSet;
    use serde_json::json;

    fn compile(rule: ValidationRule) -> CompiledRule {
        let field = rule.field.clone();
        let set = RuleSet::new(vec![rule]);
        let compiled = set.for_field(&field).next().cloned().unwrap();
        compiled
    }

    fn data_type_rule(data_type: DataType) -> CompiledRule {
        compile(
            ValidationRule::new("t", "Type", RuleType::DataType, "f").with_config(RuleConfig {
                data_type: Some(data_type),
                ..Default::default()
            }),
        )
    }

    fn check(value: Value, rule: &CompiledRule) -> bool {
        FieldValidator::default().evaluate(&value, rule).unwrap()
    }

    #[test]
    fn test_required() {
        let rule = compile(ValidationRule::new("r", "Req", RuleType::Required, "f"));
        assert!(!check(json!(""), &rule));
        assert!(!check(Value::Null, &rule));
        assert!(check(json!(" "), &rule));
        assert!(check(json!(0), &rule));
    }

    #[test]
    fn test_empty_skips_non_required() {
        let rule = data_type_rule(DataType::Email);
        assert!(check(json!(""), &rule));
        assert!(check(Value::Null, &rule));
    }

    #[test]
    fn test_allow_empty_false_checks_blank() {
        let rule = compile(
            ValidationRule::new("t", "Type", RuleType::DataType, "f").with_config(RuleConfig {
                data_type: Some(DataType::Number),
                allow_empty: Some(false),
                ..Default::default()
            }),
        );
        assert!(!check(json!(""), &rule));
    }

    #[test]
    fn test_number() {
        let rule = data_type_rule(DataType::Number);
        assert!(check(json!("123"), &rule));
        assert!(check(json!(" -4.5e2 "), &rule));
        assert!(check(json!(7), &rule));
        assert!(!check(json!("abc"), &rule));
        assert!(!check(json!("NaN"), &rule));
        assert!(!check(json!("inf"), &rule));
        assert!(!check(json!(true), &rule));
    }

    #[test]
    fn test_boolean() {
        let rule = data_type_rule(DataType::Boolean);
        for ok in ["true", "FALSE", "1", "0", "Yes", "no"] {
            assert!(check(json!(ok), &rule), "{ok} should be a boolean");
        }
        assert!(check(json!(false), &rule));
        assert!(!check(json!("maybe"), &rule));
        assert!(!check(json!(2), &rule));
    }

    #[test]
    fn test_date() {
        let rule = data_type_rule(DataType::Date);
        assert!(check(json!("2024-02-29"), &rule));
        assert!(check(json!("2024-02-29T10:00:00Z"), &rule));
        assert!(check(json!("2024-02-29 10:00:00"), &rule));
        assert!(check(json!("12/31/2023"), &rule));
        assert!(!check(json!("2023-02-30"), &rule));
        assert!(!check(json!("yesterday"), &rule));
    }

    #[test]
    fn test_email() {
        let rule = data_type_rule(DataType::Email);
        assert!(check(json!("john@x.com"), &rule));
        assert!(!check(json!("bad"), &rule));
        assert!(!check(json!("a b@x.com"), &rule));
    }

    #[test]
    fn test_string() {
        let rule = data_type_rule(DataType::String);
        assert!(check(json!("x"), &rule));
        assert!(!check(json!(5), &rule));
    }

    #[test]
    fn test_format_lengths() {
        let rule = compile(
            ValidationRule::new("f", "Len", RuleType::Format, "f").with_config(RuleConfig {
                min_length: Some(2),
                max_length: Some(4),
                ..Default::default()
            }),
        );
        assert!(!check(json!("a"), &rule));
        assert!(check(json!("abcd"), &rule));
        assert!(check(json!("éééé"), &rule));
        assert!(!check(json!("abcde"), &rule));
        assert!(!check(json!(42), &rule));
    }

    #[test]
    fn test_range() {
        let rule = compile(
            ValidationRule::new("r", "Range", RuleType::Range, "f").with_config(RuleConfig {
                min: Some(0.0),
                max: Some(10.0),
                ..Default::default()
            }),
        );
        assert!(check(json!("5"), &rule));
        assert!(check(json!(10), &rule));
        assert!(!check(json!("-1"), &rule));
        assert!(!check(json!("11"), &rule));
        assert!(!check(json!("ten"), &rule));
    }

    #[test]
    fn test_pattern() {
        let rule = compile(
            ValidationRule::new("p", "Zip", RuleType::Pattern, "f").with_config(RuleConfig {
                pattern: Some(r"^\d{5}$".to_string()),
                ..Default::default()
            }),
        );
        assert!(check(json!("75001"), &rule));
        assert!(check(json!(75001), &rule));
        assert!(!check(json!("7500"), &rule));
    }

    #[test]
    fn test_invalid_pattern_passes() {
        let rule = compile(
            ValidationRule::new("p", "Broken", RuleType::Pattern, "f").with_config(RuleConfig {
                pattern: Some("(".to_string()),
                ..Default::default()
            }),
        );
        assert!(check(json!("anything"), &rule));
    }

    #[test]
    fn test_custom_default_passes() {
        let rule = compile(ValidationRule::new("c", "Custom", RuleType::Custom, "f"));
        assert!(check(json!("whatever"), &rule));
    }

    struct Failing;

    impl CustomRuleEvaluator for Failing {
        fn evaluate(&self, _value: &Value, _rule: &ValidationRule) -> Result<bool, RuleFault> {
            Err(RuleFault::Custom("boom".into()))
        }
    }

    #[test]
    fn test_custom_evaluator_fault() {
        let rule = compile(ValidationRule::new("c", "Custom", RuleType::Custom, "f"));
        let validator = FieldValidator::new(Arc::new(Failing));
        assert_eq!(
            validator.evaluate(&json!("x"), &rule),
            Err(RuleFault::Custom("boom".into()))
        );
    }

    #[test]
    fn test_missing_data_type_is_fault() {
        let rule = compile(ValidationRule::new("t", "Type", RuleType::DataType, "f"));
        assert_eq!(
            FieldValidator::default().evaluate(&json!("x"), &rule),
            Err(RuleFault::MissingConfig("dataType"))
        );
    }

    #[test]
    fn test_render_message() {
        let mut rule = ValidationRule::new("r", "Age", RuleType::Range, "age");
        assert_eq!(render_message(&rule, "age", &json!("x")), "age is out of range");

        rule.config.message = Some("{rule}: '{value}' rejected for {field}".to_string());
        assert_eq!(
            render_message(&rule, "age", &json!(200)),
            "Age: '200' rejected for age"
        );
    }
}
