//! Flattens fetched reports into one table of uniquely keyed rows

use std::collections::{BTreeMap, HashSet};

use crate::api::FetchedReport;
use crate::cli::SortOrder;
use crate::core::types::{Identifier, Metric, Period, ReportRow, RowKey};
use crate::error::AppError;
use crate::report::{FilterSpec, ReportRequest};

#[derive(Debug, Default)]
pub(crate) struct ReportAssembler {
    metrics: Vec<Metric>,
    rows: Vec<ReportRow>,
    keys: HashSet<RowKey>,
}

impl ReportAssembler {
    pub(crate) fn new(metrics: Vec<Metric>) -> Self {
        Self {
            metrics,
            rows: Vec::new(),
            keys: HashSet::new(),
        }
    }

    pub(crate) fn push(&mut self, row: ReportRow) -> Result<(), AppError> {
        let key = row.key();
        if self.keys.contains(&key) {
            return Err(AppError::Assembly {
                key: key.to_string(),
            });
        }
        self.keys.insert(key);
        self.rows.push(row);
        Ok(())
    }

    /// Add every row of one fetched query. Returns the number of rows added.
    ///
    /// A query without dimensions that matched nothing still gets a row, with
    /// every metric at zero.
    pub(crate) fn add_fetched(
        &mut self,
        identifier: &Identifier,
        request: &ReportRequest,
        fetched: &FetchedReport,
    ) -> Result<usize, AppError> {
        let names: Vec<String> = if fetched.metric_names.is_empty() {
            self.metrics.iter().map(|m| m.expression.clone()).collect()
        } else {
            fetched.metric_names.clone()
        };

        if fetched.rows.is_empty() {
            if !request.dimensions.is_empty() {
                return Ok(0);
            }
            let metrics = names.iter().map(|name| (name.clone(), 0.0)).collect();
            self.push(new_row(identifier, request, Vec::new(), metrics))?;
            return Ok(1);
        }

        for data_row in &fetched.rows {
            let values = data_row
                .metrics
                .first()
                .map(|range| range.values.as_slice())
                .unwrap_or_default();
            let metrics = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let raw = values.get(i).map(String::as_str).unwrap_or("0");
                    (name.clone(), parse_metric(name, raw))
                })
                .collect();
            self.push(new_row(
                identifier,
                request,
                data_row.dimensions.clone(),
                metrics,
            ))?;
        }

        Ok(fetched.rows.len())
    }

    pub(crate) fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Rows ordered by domain, then period (newest first for `Desc`), then
    /// filter and dimension values.
    pub(crate) fn sorted(&self, order: SortOrder) -> Vec<&ReportRow> {
        let mut rows: Vec<&ReportRow> = self.rows.iter().collect();
        rows.sort_by(|a, b| {
            let by_period = match order {
                SortOrder::Asc => a.period.cmp(&b.period),
                SortOrder::Desc => b.period.cmp(&a.period),
            };
            a.domain
                .cmp(&b.domain)
                .then(by_period)
                .then(a.filter.cmp(&b.filter))
                .then_with(|| a.dimensions.cmp(&b.dimensions))
        });
        rows
    }

    pub(crate) fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum one metric over every period for a domain and filter.
    ///
    /// Refuses non-additive metrics: the users of January plus the users of
    /// February is not the users of January and February.
    pub(crate) fn total(
        &self,
        domain: &str,
        filter: FilterSpec,
        metric: &Metric,
    ) -> Result<f64, AppError> {
        if !metric.is_additive() {
            return Err(AppError::NonAdditiveMetric {
                metric: metric.expression.clone(),
            });
        }
        Ok(self
            .rows
            .iter()
            .filter(|row| row.domain == domain && row.filter == filter)
            .map(|row| row.metric(&metric.expression))
            .sum())
    }

    /// One row per (domain, period, dimensions), one column per filter and
    /// metric. Combinations that were skipped or empty are filled with zero.
    pub(crate) fn pivot_wide(&self, filters: &[FilterSpec]) -> WideTable {
        let columns: Vec<(FilterSpec, &Metric)> = filters
            .iter()
            .flat_map(|&filter| self.metrics.iter().map(move |metric| (filter, metric)))
            .collect();

        let mut grouped: BTreeMap<WideKey, WideRow> = BTreeMap::new();
        for row in &self.rows {
            let key = WideKey {
                domain: row.domain.clone(),
                period: row.period,
                dimensions: row.dimensions.clone(),
            };
            let wide = grouped.entry(key).or_insert_with(|| WideRow {
                domain: row.domain.clone(),
                view_id: row.view_id.clone(),
                period: row.period,
                dimensions: row.dimensions.clone(),
                values: vec![0.0; columns.len()],
            });
            for (i, (filter, metric)) in columns.iter().enumerate() {
                if *filter == row.filter {
                    wide.values[i] = row.metric(&metric.expression);
                }
            }
        }

        WideTable {
            columns: columns
                .iter()
                .map(|(filter, metric)| format!("{}_{}", filter.name(), metric.short_name()))
                .collect(),
            rows: grouped.into_values().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct WideKey {
    domain: String,
    period: Period,
    dimensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WideRow {
    pub(crate) domain: String,
    pub(crate) view_id: String,
    pub(crate) period: Period,
    pub(crate) dimensions: Vec<String>,
    pub(crate) values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WideTable {
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<WideRow>,
}

fn new_row(
    identifier: &Identifier,
    request: &ReportRequest,
    dimensions: Vec<String>,
    metrics: BTreeMap<String, f64>,
) -> ReportRow {
    ReportRow {
        domain: identifier.domain.clone(),
        view_id: identifier.view_id.clone(),
        period: request.period,
        filter: request.filter,
        dimensions,
        metrics,
    }
}

fn parse_metric(name: &str, raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(metric = name, value = raw, "unparseable metric value, using 0");
            0.0
        }
    }
}
