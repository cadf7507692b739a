//! Reporting API access
//!
//! `ReportApi` is the seam between the run loop and the network: the real
//! client lives in `client`, tests substitute scripted fakes.

mod auth;
mod client;
mod dtos;

use crate::error::FetchError;
use crate::report::ReportRequest;

pub(crate) use auth::{Credentials, ServiceAccountKey};
pub(crate) use client::{GaClient, GoogleHttp, RetryPolicy};
pub(crate) use dtos::{Report, ReportDataRow};

pub(crate) trait ReportApi {
    /// Issue one page of a query. `request.page_token` selects the page.
    fn batch_get(&self, request: &ReportRequest) -> Result<Report, FetchError>;
}

/// Lazy, finite sequence of result pages for one query.
///
/// Follows `nextPageToken` until the API stops returning one. The sequence
/// ends after the first error; starting over means re-issuing the query.
pub(crate) struct Pages<'a> {
    api: &'a dyn ReportApi,
    request: ReportRequest,
    done: bool,
}

impl<'a> Pages<'a> {
    pub(crate) fn new(api: &'a dyn ReportApi, request: &ReportRequest) -> Self {
        let mut request = request.clone();
        request.page_token = None;
        Self {
            api,
            request,
            done: false,
        }
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<Report, FetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let report = match self.api.batch_get(&self.request) {
            Ok(report) => report,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        match report.next_page_token.as_deref() {
            Some(token) if !token.is_empty() => {
                if self.request.page_token.as_deref() == Some(token) {
                    self.done = true;
                    return Some(Err(FetchError::Decode(format!(
                        "page token {token} repeated"
                    ))));
                }
                self.request.page_token = Some(token.to_string());
            }
            _ => self.done = true,
        }

        Some(Ok(report))
    }
}

/// Every row of a query, all pages concatenated.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FetchedReport {
    pub(crate) metric_names: Vec<String>,
    pub(crate) rows: Vec<ReportDataRow>,
    pub(crate) pages: usize,
}

pub(crate) fn fetch_all(
    api: &dyn ReportApi,
    request: &ReportRequest,
) -> Result<FetchedReport, FetchError> {
    let mut fetched = FetchedReport::default();

    for page in Pages::new(api, request) {
        let page = page?;
        if fetched.pages == 0 {
            tracing::debug!(
                view_id = %request.view_id,
                total_rows = ?page.data.row_count,
                "first page"
            );
            fetched.metric_names = page
                .column_header
                .metric_header
                .metric_header_entries
                .into_iter()
                .map(|entry| entry.name)
                .collect();
        }
        if page.data.is_data_golden == Some(false) {
            tracing::debug!(view_id = %request.view_id, "data for this range is not golden yet");
        }
        fetched.rows.extend(page.data.rows);
        fetched.pages += 1;
    }

    tracing::debug!(
        view_id = %request.view_id,
        rows = fetched.rows.len(),
        pages = fetched.pages,
        "fetched report"
    );
    Ok(fetched)
}
