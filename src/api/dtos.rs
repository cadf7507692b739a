//! Wire types for the Reporting API v4 and Google error bodies.
//!
//! API Reference: https://developers.google.com/analytics/devguides/reporting/core/v4/rest/v4/reports/batchGet
//! Only the fields this tool reads are modelled; everything else is ignored.

use serde::{Deserialize, Serialize};

use crate::report::ReportRequest;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchGetRequest<'a> {
    pub(crate) report_requests: [&'a ReportRequest; 1],
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchGetResponse {
    #[serde(default)]
    pub(crate) reports: Vec<Report>,
}

/// One page of one report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Report {
    #[serde(default)]
    pub(crate) column_header: ColumnHeader,
    #[serde(default)]
    pub(crate) data: ReportData,
    /// Present while more pages remain
    #[serde(default)]
    pub(crate) next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ColumnHeader {
    #[serde(default)]
    pub(crate) dimensions: Vec<String>,
    #[serde(default)]
    pub(crate) metric_header: MetricHeader,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MetricHeader {
    #[serde(default)]
    pub(crate) metric_header_entries: Vec<MetricHeaderEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct MetricHeaderEntry {
    pub(crate) name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportData {
    #[serde(default)]
    pub(crate) rows: Vec<ReportDataRow>,
    #[serde(default)]
    pub(crate) row_count: Option<u64>,
    #[serde(default)]
    pub(crate) is_data_golden: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct ReportDataRow {
    #[serde(default)]
    pub(crate) dimensions: Vec<String>,
    /// One entry per requested date range; we always request exactly one
    #[serde(default)]
    pub(crate) metrics: Vec<DateRangeValues>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct DateRangeValues {
    #[serde(default)]
    pub(crate) values: Vec<String>,
}

/// `{"error": {"code": 429, "message": "...", "status": "RESOURCE_EXHAUSTED"}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    #[serde(default)]
    pub(crate) message: String,
    #[serde(default)]
    pub(crate) status: Option<String>,
}

impl ErrorBody {
    /// Best-effort human message from a non-2xx body.
    pub(crate) fn message_from(raw: &str) -> String {
        match serde_json::from_str::<ErrorBody>(raw) {
            Ok(body) => match body.error.status {
                Some(status) => format!("{status}: {}", body.error.message),
                None => body.error.message,
            },
            Err(_) => raw.trim().chars().take(200).collect(),
        }
    }
}
