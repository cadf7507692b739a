//! Views listed by a BigQuery query.
//!
//! Runs the query through the REST `jobs.query` call, polls
//! `getQueryResults` until the job completes, then follows `pageToken`
//! through the result set.
//!
//! API Reference: https://cloud.google.com/bigquery/docs/reference/rest/v2/jobs/query

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::GoogleHttp;
use crate::consts::BIGQUERY_ENDPOINT;
use crate::core::Identifier;
use crate::error::{AppError, FetchError};
use crate::source::IdentifierSource;

const QUERY_TIMEOUT_MS: u32 = 10_000;
const MAX_POLLS: usize = 30;
const PAGE_ROWS: u32 = 10_000;

const DOMAIN_COLUMNS: &[&str] = &["domain"];
const VIEW_COLUMNS: &[&str] = &["view_id", "viewid", "view"];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    timeout_ms: u32,
    max_results: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: bool,
    job_reference: Option<JobReference>,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<TableField>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableField {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

/// Column positions of the two values we need
#[derive(Debug, Clone, Copy, PartialEq)]
struct Columns {
    domain: usize,
    view_id: usize,
}

impl Columns {
    fn locate(schema: &TableSchema) -> Result<Self, AppError> {
        let find = |names: &[&str]| {
            schema
                .fields
                .iter()
                .position(|field| names.contains(&field.name.to_ascii_lowercase().as_str()))
        };
        match (find(DOMAIN_COLUMNS), find(VIEW_COLUMNS)) {
            (Some(domain), Some(view_id)) => Ok(Self { domain, view_id }),
            _ => {
                let got: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
                Err(AppError::Identifiers(format!(
                    "query must return domain and view_id columns, got [{}]",
                    got.join(", ")
                )))
            }
        }
    }

    fn extract(&self, row: &TableRow) -> Identifier {
        Identifier::new(cell_text(row, self.domain), cell_text(row, self.view_id))
    }
}

/// BigQuery returns every scalar as a string, but be lenient with numbers.
fn cell_text(row: &TableRow, index: usize) -> String {
    match row.f.get(index).map(|cell| &cell.v) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub(crate) struct BigQueryIdentifiers<'a> {
    http: &'a GoogleHttp,
    project: String,
    sql: String,
}

impl<'a> BigQueryIdentifiers<'a> {
    pub(crate) fn new(
        http: &'a GoogleHttp,
        project: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        Self {
            http,
            project: project.into(),
            sql: sql.into(),
        }
    }

    fn results_url(&self, job_id: &str) -> String {
        format!("{BIGQUERY_ENDPOINT}/{}/queries/{job_id}", self.project)
    }

    fn get_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse, FetchError> {
        let timeout = QUERY_TIMEOUT_MS.to_string();
        let max_results = PAGE_ROWS.to_string();
        let mut query = vec![
            ("timeoutMs", timeout.as_str()),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(location) = job.location.as_deref() {
            query.push(("location", location));
        }
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        self.http.get_json(&self.results_url(&job.job_id), &query)
    }
}

impl IdentifierSource for BigQueryIdentifiers<'_> {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn fetch(&self) -> Result<Vec<Identifier>, AppError> {
        let url = format!("{BIGQUERY_ENDPOINT}/{}/queries", self.project);
        let request = QueryRequest {
            query: &self.sql,
            use_legacy_sql: false,
            timeout_ms: QUERY_TIMEOUT_MS,
            max_results: PAGE_ROWS,
        };
        tracing::debug!(project = %self.project, "running identifier query");
        let mut response: QueryResponse = self.http.post_json(&url, &request)?;

        let job = response
            .job_reference
            .clone()
            .ok_or_else(|| FetchError::Decode("query response has no jobReference".to_string()))?;

        let mut polls = 0;
        while !response.job_complete {
            polls += 1;
            if polls > MAX_POLLS {
                return Err(AppError::Identifiers(format!(
                    "query job {} did not finish",
                    job.job_id
                )));
            }
            tracing::debug!(job_id = %job.job_id, polls, "waiting for query job");
            response = self.get_results(&job, None)?;
        }

        let schema = response.schema.clone().unwrap_or_default();
        let columns = Columns::locate(&schema)?;
        let mut identifiers: Vec<Identifier> =
            response.rows.iter().map(|row| columns.extract(row)).collect();

        while let Some(token) = response.page_token.take().filter(|t| !t.is_empty()) {
            response = self.get_results(&job, Some(&token))?;
            identifiers.extend(response.rows.iter().map(|row| columns.extract(row)));
        }

        Ok(identifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE: &str = r#"{
      "kind": "bigquery#queryResponse",
      "schema": {"fields": [
        {"name": "Domain", "type": "STRING", "mode": "NULLABLE"},
        {"name": "notes", "type": "STRING"},
        {"name": "view_id", "type": "STRING"}
      ]},
      "jobReference": {"projectId": "acme", "jobId": "job_abc", "location": "US"},
      "totalRows": "2",
      "rows": [
        {"f": [{"v": "example.com"}, {"v": null}, {"v": "123456"}]},
        {"f": [{"v": "shop.example.com"}, {"v": "x"}, {"v": 987654}]}
      ],
      "pageToken": "BEQ",
      "jobComplete": true
    }"#;

    #[test]
    fn decodes_query_response() {
        let response: QueryResponse = serde_json::from_str(COMPLETE).unwrap();
        assert!(response.job_complete);
        assert_eq!(response.page_token.as_deref(), Some("BEQ"));
        let job = response.job_reference.unwrap();
        assert_eq!(job.job_id, "job_abc");
        assert_eq!(job.location.as_deref(), Some("US"));
    }

    #[test]
    fn extracts_columns_by_name() {
        let response: QueryResponse = serde_json::from_str(COMPLETE).unwrap();
        let columns = Columns::locate(response.schema.as_ref().unwrap()).unwrap();
        assert_eq!(columns, Columns { domain: 0, view_id: 2 });

        let ids: Vec<Identifier> = response.rows.iter().map(|r| columns.extract(r)).collect();
        assert_eq!(
            ids,
            vec![
                Identifier::new("example.com", "123456"),
                Identifier::new("shop.example.com", "987654"),
            ]
        );
    }

    #[test]
    fn pending_job_has_no_schema() {
        let raw = r#"{"jobReference": {"projectId": "acme", "jobId": "job_abc"}, "jobComplete": false}"#;
        let response: QueryResponse = serde_json::from_str(raw).unwrap();
        assert!(!response.job_complete);
        assert!(response.schema.is_none());
        assert!(response.rows.is_empty());
    }

    #[test]
    fn missing_view_column_is_an_error() {
        let schema = TableSchema {
            fields: vec![TableField {
                name: "domain".to_string(),
            }],
        };
        let err = Columns::locate(&schema).unwrap_err();
        assert!(err.to_string().contains("[domain]"));
    }
}
