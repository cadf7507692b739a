use serde::Serialize;

use crate::consts::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::core::{Metric, Period};
use crate::error::AppError;
use crate::utils::format_date;

use super::filter::{FilterClause, FilterSpec};

/// A fully specified `ReportRequest` for the v4 `reports:batchGet` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportRequest {
    pub(crate) view_id: String,
    pub(crate) date_ranges: Vec<DateRange>,
    pub(crate) metrics: Vec<MetricExpr>,
    pub(crate) dimensions: Vec<DimensionName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) dimension_filter_clauses: Vec<FilterClause>,
    pub(crate) page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) page_token: Option<String>,
    pub(crate) include_empty_rows: bool,

    /// Not sent; kept so rows can be labelled after the fetch
    #[serde(skip)]
    pub(crate) period: Period,
    #[serde(skip)]
    pub(crate) filter: FilterSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DateRange {
    pub(crate) start_date: String,
    pub(crate) end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct MetricExpr {
    pub(crate) expression: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct DimensionName {
    pub(crate) name: String,
}

/// Per-run constants shared by every request
#[derive(Debug, Clone)]
pub(crate) struct RequestTemplate {
    pub(crate) metrics: Vec<Metric>,
    pub(crate) dimensions: Vec<String>,
    pub(crate) page_size: u32,
}

impl Default for RequestTemplate {
    fn default() -> Self {
        Self {
            metrics: crate::consts::DEFAULT_METRICS
                .iter()
                .copied()
                .map(Metric::new)
                .collect(),
            dimensions: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Build the query for one view, period and named filter.
pub(crate) fn build_request(
    view_id: &str,
    period: Period,
    filter_name: &str,
    template: &RequestTemplate,
) -> Result<ReportRequest, AppError> {
    let filter: FilterSpec = filter_name.parse()?;

    Ok(ReportRequest {
        view_id: view_id.to_string(),
        date_ranges: vec![DateRange {
            start_date: format_date(period.start),
            end_date: format_date(period.end),
        }],
        metrics: template
            .metrics
            .iter()
            .map(|m| MetricExpr {
                expression: m.expression.clone(),
            })
            .collect(),
        dimensions: template
            .dimensions
            .iter()
            .map(|name| DimensionName { name: name.clone() })
            .collect(),
        dimension_filter_clauses: filter.clauses(),
        page_size: template.page_size.clamp(1, MAX_PAGE_SIZE),
        page_token: None,
        include_empty_rows: false,
        period,
        filter,
    })
}
