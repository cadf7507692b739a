use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::consts::BATCH_GET_ENDPOINT;
use crate::error::FetchError;
use crate::report::ReportRequest;

use super::ReportApi;
use super::auth::Credentials;
use super::dtos::{BatchGetRequest, BatchGetResponse, ErrorBody, Report};

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// How many times a transient failure is attempted, and the pause in between.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn run<T>(
        &self,
        what: &str,
        mut op: impl FnMut() -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "{what} failed, retrying in {}s",
                        self.delay.as_secs()
                    );
                    std::thread::sleep(self.delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Authenticated JSON-over-HTTP access to Google APIs, shared by the
/// reporting and BigQuery adapters. Held for the whole run.
pub(crate) struct GoogleHttp {
    agent: ureq::Agent,
    credentials: Credentials,
    retry: RetryPolicy,
}

impl GoogleHttp {
    pub(crate) fn new(credentials: Credentials, retry: RetryPolicy) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            credentials,
            retry,
        }
    }

    pub(crate) fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, FetchError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        self.retry.run(url, || {
            let bearer = self.credentials.bearer(&self.agent)?;
            let response = self
                .agent
                .post(url)
                .header("Authorization", format!("Bearer {bearer}"))
                .send_json(body)?;
            read_response(response)
        })
    }

    pub(crate) fn get_json<R>(&self, url: &str, query: &[(&str, &str)]) -> Result<R, FetchError>
    where
        R: DeserializeOwned,
    {
        self.retry.run(url, || {
            let bearer = self.credentials.bearer(&self.agent)?;
            let response = self
                .agent
                .get(url)
                .header("Authorization", format!("Bearer {bearer}"))
                .query_pairs(query.iter().copied())
                .call()?;
            read_response(response)
        })
    }
}

fn read_response<R: DeserializeOwned>(
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<R, FetchError> {
    let status = response.status().as_u16();
    if status >= 400 {
        let raw = response.body_mut().read_to_string().unwrap_or_default();
        return Err(FetchError::Status {
            status,
            message: ErrorBody::message_from(&raw),
        });
    }
    response
        .body_mut()
        .read_json::<R>()
        .map_err(|e| FetchError::Decode(e.to_string()))
}

/// Reporting API v4 client
pub(crate) struct GaClient<'a> {
    http: &'a GoogleHttp,
}

impl<'a> GaClient<'a> {
    pub(crate) fn new(http: &'a GoogleHttp) -> Self {
        Self { http }
    }
}

impl ReportApi for GaClient<'_> {
    fn batch_get(&self, request: &ReportRequest) -> Result<Report, FetchError> {
        let body = BatchGetRequest {
            report_requests: [request],
        };
        let response: BatchGetResponse = self.http.post_json(BATCH_GET_ENDPOINT, &body)?;
        response
            .reports
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Decode("response contained no reports".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn retries_transient_until_success() {
        let calls = Cell::new(0);
        let result = instant().run("test", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(FetchError::Status {
                    status: 503,
                    message: String::new(),
                })
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), _> = instant().run("test", || {
            calls.set(calls.get() + 1);
            Err(FetchError::Transport("timed out".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = instant().run("test", || {
            calls.set(calls.get() + 1);
            Err(FetchError::Status {
                status: 403,
                message: "forbidden".to_string(),
            })
        });
        assert!(matches!(result, Err(FetchError::Status { status: 403, .. })));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            delay: Duration::ZERO,
        };
        let calls = Cell::new(0);
        let _ = policy.run("test", || {
            calls.set(calls.get() + 1);
            Ok::<_, FetchError>(())
        });
        assert_eq!(calls.get(), 1);
    }
}
