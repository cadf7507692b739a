//! Core data types shared by the request builder, fetcher, assembler and outputs

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::report::FilterSpec;
use crate::utils::format_date;

/// A reporting view and the site it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Identifier {
    pub(crate) domain: String,
    pub(crate) view_id: String,
}

impl Identifier {
    pub(crate) fn new(domain: impl Into<String>, view_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            view_id: view_id.into(),
        }
    }
}

/// Closed date interval, both ends inclusive as the reporting API treats them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub(crate) struct Period {
    pub(crate) start: NaiveDate,
    pub(crate) end: NaiveDate,
}

impl Period {
    pub(crate) fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", format_date(self.start), format_date(self.end))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Granularity {
    Day,
    Week,
    /// Calendar months (default)
    #[default]
    Month,
}

impl Granularity {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Granularity::Day => "Daily",
            Granularity::Week => "Weekly",
            Granularity::Month => "Monthly",
        }
    }
}

/// Whether values for adjacent periods can be summed into a combined period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MetricKind {
    Additive,
    NonAdditive,
}

impl MetricKind {
    /// Users are deduplicated within the requested range, and ratios or averages
    /// are weighted by something not in the row, so neither can be summed.
    pub(crate) fn of(expression: &str) -> Self {
        let name = expression.strip_prefix("ga:").unwrap_or(expression);
        if name == "newUsers" {
            return MetricKind::Additive;
        }
        if name.to_ascii_lowercase().ends_with("users")
            || name.starts_with("avg")
            || name.starts_with("percent")
            || name.contains("Rate")
            || name.contains("Per")
        {
            MetricKind::NonAdditive
        } else {
            MetricKind::Additive
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Metric {
    pub(crate) expression: String,
    pub(crate) kind: MetricKind,
}

impl Metric {
    pub(crate) fn new(expression: impl Into<String>) -> Self {
        let expression = expression.into();
        let kind = MetricKind::of(&expression);
        Self { expression, kind }
    }

    /// Column-friendly name: "ga:sessions" -> "sessions"
    pub(crate) fn short_name(&self) -> &str {
        self.expression
            .strip_prefix("ga:")
            .unwrap_or(&self.expression)
    }

    pub(crate) fn is_additive(&self) -> bool {
        self.kind == MetricKind::Additive
    }
}

/// One flattened result: a site, a period, a filter, and the metric values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ReportRow {
    pub(crate) domain: String,
    pub(crate) view_id: String,
    pub(crate) period: Period,
    pub(crate) filter: FilterSpec,
    /// Values of the requested dimensions, empty when none were requested
    pub(crate) dimensions: Vec<String>,
    pub(crate) metrics: BTreeMap<String, f64>,
}

/// Uniqueness key of a row
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct RowKey {
    pub(crate) domain: String,
    pub(crate) period: Period,
    pub(crate) filter: FilterSpec,
    pub(crate) dimensions: Vec<String>,
}

impl ReportRow {
    pub(crate) fn key(&self) -> RowKey {
        RowKey {
            domain: self.domain.clone(),
            period: self.period,
            filter: self.filter,
            dimensions: self.dimensions.clone(),
        }
    }

    pub(crate) fn metric(&self, expression: &str) -> f64 {
        self.metrics.get(expression).copied().unwrap_or(0.0)
    }
}

/// A query that failed and was left out of the report
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SkippedQuery {
    pub(crate) domain: String,
    pub(crate) view_id: String,
    pub(crate) period: Period,
    pub(crate) filter: FilterSpec,
    pub(crate) reason: String,
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.domain, self.period, self.filter)?;
        if !self.dimensions.is_empty() {
            write!(f, " [{}]", self.dimensions.join(", "))?;
        }
        Ok(())
    }
}
