/// Date format the reporting API expects and every output uses: "2025-01-15"
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reporting API v4 batch endpoint
pub(crate) const BATCH_GET_ENDPOINT: &str =
    "https://analyticsreporting.googleapis.com/v4/reports:batchGet";

/// BigQuery REST base, `{project}/queries` is appended
pub(crate) const BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2/projects";

/// OAuth scopes requested for the service-account token
pub(crate) const ANALYTICS_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
pub(crate) const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery.readonly";

/// Reporting API v4 accepts at most 100k rows per page
pub(crate) const MAX_PAGE_SIZE: u32 = 100_000;
pub(crate) const DEFAULT_PAGE_SIZE: u32 = 10_000;

pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub(crate) const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

pub(crate) const DEFAULT_METRICS: &[&str] = &["ga:users", "ga:sessions"];
