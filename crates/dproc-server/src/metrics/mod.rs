//! Business metrics
//!
//! Metric definitions come from a [`MetricDefinitionSource`] through the
//! caching [`MetricDefinitionProvider`]; the [`MetricsCalculator`] turns them
//! into values over the valid records of a run and evaluates alert rules.

mod alerts;
mod calculator;
mod definitions;

pub use alerts::{evaluate_expression, AlertExpressionError, TriggeredAlert};
pub use calculator::{numeric_value, MetricValue, MetricsCalculator, MetricsReport, UNSPECIFIED_CATEGORY};
pub use definitions::{
    DefinitionSourceError, MetricDefinitionProvider, MetricDefinitionSource, StaticDefinitionSource,
};
