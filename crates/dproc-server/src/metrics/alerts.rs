//! Alert rules evaluated against calculated metric values

use dproc_common::types::{AlertRule, AlertSeverity};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

const EQUALITY_TOLERANCE: f64 = 1e-4;

// Two-character operators first so `>=` is not read as `>`.
const OPERATORS: [&str; 6] = [">=", "<=", "==", "!=", ">", "<"];

#[derive(Debug, Error, PartialEq)]
pub enum AlertExpressionError {
    #[error("no comparison operator in '{0}'")]
    MissingOperator(String),

    #[error("threshold is not a number in '{0}'")]
    InvalidThreshold(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredAlert {
    pub metric: String,
    pub rule: String,
    pub severity: AlertSeverity,
    pub expression: String,
    pub value: f64,
}

/// Evaluate `value <op> <threshold>` against a metric value.
///
/// The left operand is always the metric value; a leading `value` token is
/// optional.
pub fn evaluate_expression(expression: &str, value: f64) -> Result<bool, AlertExpressionError> {
    let (position, operator) = OPERATORS
        .iter()
        .filter_map(|op| expression.find(op).map(|pos| (pos, *op)))
        .min_by_key(|(pos, op)| (*pos, usize::MAX - op.len()))
        .ok_or_else(|| AlertExpressionError::MissingOperator(expression.to_string()))?;

    let threshold: f64 = expression[position + operator.len()..]
        .trim()
        .parse()
        .map_err(|_| AlertExpressionError::InvalidThreshold(expression.to_string()))?;

    Ok(match operator {
        ">=" => value >= threshold,
        "<=" => value <= threshold,
        "==" => (value - threshold).abs() < EQUALITY_TOLERANCE,
        "!=" => (value - threshold).abs() >= EQUALITY_TOLERANCE,
        ">" => value > threshold,
        _ => value < threshold,
    })
}

pub(super) fn evaluate_rules(metric: &str, rules: &[AlertRule], value: f64) -> Vec<TriggeredAlert> {
    let mut triggered = Vec::new();

    for rule in rules.iter().filter(|r| r.enabled) {
        match evaluate_expression(&rule.expression, value) {
            Ok(true) => {
                let alert = TriggeredAlert {
                    metric: metric.to_string(),
                    rule: rule.name.clone(),
                    severity: rule.severity,
                    expression: rule.expression.clone(),
                    value,
                };
                log_alert(&alert);
                triggered.push(alert);
            },
            Ok(false) => {},
            Err(e) => warn!(metric, rule = %rule.name, error = %e, "Skipping unparseable alert rule"),
        }
    }

    triggered
}

fn log_alert(alert: &TriggeredAlert) {
    match alert.severity {
        AlertSeverity::Critical => error!(
            metric = %alert.metric,
            rule = %alert.rule,
            value = alert.value,
            expression = %alert.expression,
            "Metric alert triggered"
        ),
        AlertSeverity::Warning => warn!(
            metric = %alert.metric,
            rule = %alert.rule,
            value = alert.value,
            expression = %alert.expression,
            "Metric alert triggered"
        ),
        AlertSeverity::Info => info!(
            metric = %alert.metric,
            rule = %alert.rule,
            value = alert.value,
            expression = %alert.expression,
            "Metric alert triggered"
        ),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() {
        assert!(evaluate_expression("value > 10", 11.0).unwrap());
        assert!(!evaluate_expression("value > 10", 10.0).unwrap());
        assert!(evaluate_expression("value >= 10", 10.0).unwrap());
        assert!(evaluate_expression("value <= 10", 10.0).unwrap());
        assert!(evaluate_expression("value < 0", -1.0).unwrap());
        assert!(evaluate_expression("value != 3", 4.0).unwrap());
        assert!(evaluate_expression("< 5", 4.0).unwrap());
    }

    #[test]
    fn test_equality_uses_tolerance() {
        assert!(evaluate_expression("value == 0.3", 0.1 + 0.2).unwrap());
        assert!(evaluate_expression("value == 1", 1.00005).unwrap());
        assert!(!evaluate_expression("value == 1", 1.001).unwrap());
        assert!(!evaluate_expression("value != 1", 1.00001).unwrap());
    }

    #[test]
    fn test_malformed_expressions() {
        assert_eq!(
            evaluate_expression("value ~ 3", 1.0),
            Err(AlertExpressionError::MissingOperator("value ~ 3".into()))
        );
        assert!(matches!(
            evaluate_expression("value > lots", 1.0),
            Err(AlertExpressionError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_disabled_rules_are_skipped() {
        let rule = AlertRule {
            name: "r".into(),
            description: String::new(),
            expression: "value > 0".into(),
            severity: AlertSeverity::Critical,
            enabled: false,
        };
        assert!(evaluate_rules("m", &[rule.clone()], 5.0).is_empty());
        let enabled = AlertRule { enabled: true, ..rule };
        let alerts = evaluate_rules("m", &[enabled], 5.0);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].metric, "m");
    }
}
