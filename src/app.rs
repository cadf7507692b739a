use chrono::Local;
use serde::Serialize;
use std::io::{self, Write};
use std::time::Instant;

use crate::api::{Credentials, GaClient, GoogleHttp, ReportApi, ServiceAccountKey, fetch_all};
use crate::cli::{Cli, Commands};
use crate::config::{Config, OutputTarget, RunConfig, retry_policy};
use crate::consts::{ANALYTICS_SCOPE, BIGQUERY_SCOPE};
use crate::core::{Identifier, ReportAssembler, SkippedQuery, partition};
use crate::error::AppError;
use crate::output::{SummaryOptions, render_summary, write_report};
use crate::report::{FilterSpec, build_request};
use crate::source::{
    BigQueryIdentifiers, BoxedSource, CsvIdentifiers, StaticIdentifiers, check_unique_domains,
    load_identifiers,
};
use crate::utils::format_date;

const ACCESS_TOKEN_ENV: &str = "GAREPORT_ACCESS_TOKEN";

#[derive(Debug)]
pub(crate) struct RunOutcome {
    pub(crate) assembler: ReportAssembler,
    pub(crate) queries: usize,
    pub(crate) skipped: Vec<SkippedQuery>,
}

/// Issue every identifier × period × filter query in order and assemble
/// the rows. A failed query is logged and skipped; anything else aborts.
pub(crate) fn run_report(
    run: &RunConfig,
    identifiers: &[Identifier],
    api: &dyn ReportApi,
) -> Result<RunOutcome, AppError> {
    check_unique_domains(identifiers)?;
    let mut assembler = ReportAssembler::new(run.template.metrics.clone());
    let mut skipped = Vec::new();
    let mut queries = 0;

    for id in identifiers {
        tracing::info!(domain = %id.domain, view_id = %id.view_id, "fetching view");
        for period in partition(run.start, run.end, run.granularity)? {
            for &filter in &run.filters {
                let request = build_request(&id.view_id, period, filter.name(), &run.template)?;
                queries += 1;
                match fetch_all(api, &request) {
                    Ok(fetched) => {
                        assembler.add_fetched(id, &request, &fetched)?;
                    }
                    Err(e) => {
                        tracing::warn!(
                            domain = %id.domain,
                            view_id = %id.view_id,
                            period = %period,
                            filter = %filter,
                            error = %e,
                            "query failed, skipping"
                        );
                        skipped.push(SkippedQuery {
                            domain: id.domain.clone(),
                            view_id: id.view_id.clone(),
                            period,
                            filter,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    Ok(RunOutcome {
        assembler,
        queries,
        skipped,
    })
}

/// One line of `plan` output
#[derive(Serialize)]
struct PlannedQuery<'a, R: Serialize> {
    domain: &'a str,
    period: String,
    filter: FilterSpec,
    request: R,
}

/// Write the request bodies a run would send, one JSON object per line.
pub(crate) fn write_plan<W: Write>(
    mut out: W,
    run: &RunConfig,
    identifiers: &[Identifier],
) -> Result<usize, AppError> {
    let mut count = 0;
    for id in identifiers {
        for period in partition(run.start, run.end, run.granularity)? {
            for &filter in &run.filters {
                let request = build_request(&id.view_id, period, filter.name(), &run.template)?;
                let line = PlannedQuery {
                    domain: &id.domain,
                    period: period.to_string(),
                    filter,
                    request: &request,
                };
                serde_json::to_writer(&mut out, &line)?;
                writeln!(out)?;
                count += 1;
            }
        }
    }
    out.flush()?;
    Ok(count)
}

#[derive(Serialize)]
struct PeriodLine {
    start: String,
    end: String,
    days: i64,
}

/// Write the partition of the range, as text or JSON.
pub(crate) fn write_periods<W: Write>(mut out: W, run: &RunConfig) -> Result<(), AppError> {
    let periods = partition(run.start, run.end, run.granularity)?;
    if run.json {
        let lines: Vec<PeriodLine> = periods
            .map(|p| PeriodLine {
                start: format_date(p.start),
                end: format_date(p.end),
                days: p.days(),
            })
            .collect();
        serde_json::to_writer_pretty(&mut out, &lines)?;
        writeln!(out)?;
    } else {
        for p in periods {
            writeln!(out, "{}  {}  {:>3}d", format_date(p.start), format_date(p.end), p.days())?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Bearer token from the environment, else the service-account key file.
fn credentials(cli: &Cli) -> Result<(Credentials, Option<String>), AppError> {
    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV)
        && !token.trim().is_empty()
    {
        tracing::debug!("using access token from {ACCESS_TOKEN_ENV}");
        return Ok((Credentials::Static(token.trim().to_string()), None));
    }
    let Some(path) = cli.key_file.as_deref() else {
        return Err(AppError::Config(format!(
            "no credentials: pass --key-file, set GOOGLE_APPLICATION_CREDENTIALS or {ACCESS_TOKEN_ENV}"
        )));
    };
    let key = ServiceAccountKey::load(path)?;
    let project = key.project_id.clone();
    Ok((
        Credentials::service_account(key, &[ANALYTICS_SCOPE, BIGQUERY_SCOPE]),
        project,
    ))
}

/// Lazily built so `plan` and `periods` never need credentials unless
/// BigQuery has to be asked for the views.
struct Session {
    http: GoogleHttp,
    key_project: Option<String>,
}

impl Session {
    fn open(cli: &Cli) -> Result<Self, AppError> {
        let (credentials, key_project) = credentials(cli)?;
        Ok(Self {
            http: GoogleHttp::new(credentials, retry_policy(cli)),
            key_project,
        })
    }
}

/// Pick the identifier source: CSV, then BigQuery, then the config file.
fn identifier_source<'a>(
    cli: &Cli,
    config: &Config,
    session: Option<&'a Session>,
) -> Result<BoxedSource<'a>, AppError> {
    if let Some(path) = &cli.ids_csv {
        return Ok(Box::new(CsvIdentifiers::new(path.clone())));
    }
    if let Some(sql) = &cli.bigquery_sql {
        let Some(session) = session else {
            return Err(AppError::Config(
                "BigQuery lookup needs credentials".to_string(),
            ));
        };
        let project = cli
            .bigquery_project
            .clone()
            .or_else(|| session.key_project.clone())
            .ok_or_else(|| {
                AppError::Config(
                    "--bigquery-project is required when the key file has no project_id"
                        .to_string(),
                )
            })?;
        return Ok(Box::new(BigQueryIdentifiers::new(&session.http, project, sql.clone())));
    }
    if !config.views.is_empty() {
        return Ok(Box::new(StaticIdentifiers::new(config.identifiers())));
    }
    Err(AppError::Config(
        "no views configured: pass --ids-csv or --bigquery-sql, or add [[views]] to the config file"
            .to_string(),
    ))
}

/// Dispatch one subcommand
pub(crate) fn run(cli: &Cli, config: &Config, command: Commands) -> Result<(), AppError> {
    let started = Instant::now();
    let today = Local::now().date_naive();
    let run = RunConfig::from_cli(cli, today)?;

    tracing::debug!(
        start = %run.start,
        end = %run.end,
        granularity = ?run.granularity,
        filters = ?run.filters,
        "resolved run"
    );

    match command {
        Commands::Periods => write_periods(io::stdout().lock(), &run),
        Commands::Plan => {
            let session = if cli.ids_csv.is_none() && cli.bigquery_sql.is_some() {
                Some(Session::open(cli)?)
            } else {
                None
            };
            let source = identifier_source(cli, config, session.as_ref())?;
            let identifiers = load_identifiers(source.as_ref())?;
            let count = write_plan(io::stdout().lock(), &run, &identifiers)?;
            tracing::info!(queries = count, "planned");
            Ok(())
        }
        Commands::Fetch => {
            let session = Session::open(cli)?;
            let source = identifier_source(cli, config, Some(&session))?;
            let identifiers = load_identifiers(source.as_ref())?;

            let client = GaClient::new(&session.http);
            let outcome = run_report(&run, &identifiers, &client)?;
            write_report(&run, &outcome.assembler)?;

            let summary = render_summary(
                &outcome.assembler,
                &run.filters,
                SummaryOptions {
                    use_color: cli.use_color(),
                    queries: outcome.queries,
                    skipped: &outcome.skipped,
                    elapsed_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
                },
            );
            match run.output {
                OutputTarget::Stdout => eprint!("{summary}"),
                OutputTarget::File(_) => print!("{summary}"),
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Report;
    use crate::api::fake::page;
    use crate::cli::{Layout, SortOrder};
    use crate::core::Granularity;
    use crate::error::FetchError;
    use crate::report::{ReportRequest, RequestTemplate};
    use chrono::NaiveDate;
    use std::cell::RefCell;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn run_config(filters: Vec<FilterSpec>) -> RunConfig {
        RunConfig {
            start: date(2022, 1, 1),
            end: date(2022, 3, 31),
            granularity: Granularity::Month,
            filters,
            template: RequestTemplate::default(),
            layout: Layout::Long,
            order: SortOrder::Asc,
            json: false,
            output: OutputTarget::Stdout,
        }
    }

    /// Answers by date range; February gets a quota error.
    struct QuotaInFebruary {
        calls: RefCell<Vec<(String, String)>>,
    }

    impl ReportApi for QuotaInFebruary {
        fn batch_get(&self, request: &ReportRequest) -> Result<Report, FetchError> {
            let range = &request.date_ranges[0];
            self.calls
                .borrow_mut()
                .push((range.start_date.clone(), range.end_date.clone()));
            if range.start_date.starts_with("2022-02") {
                return Err(FetchError::Status {
                    status: 429,
                    message: "RESOURCE_EXHAUSTED: Quota exceeded".to_string(),
                });
            }
            Ok(page(&["10", "25"], None))
        }
    }

    #[test]
    fn quarter_by_month_issues_three_clipped_queries() {
        let api = QuotaInFebruary {
            calls: RefCell::new(Vec::new()),
        };
        let _ = run_report(
            &run_config(vec![FilterSpec::Total]),
            &[Identifier::new("a.com", "1")],
            &api,
        )
        .unwrap();

        assert_eq!(
            *api.calls.borrow(),
            vec![
                ("2022-01-01".to_string(), "2022-01-31".to_string()),
                ("2022-02-01".to_string(), "2022-02-28".to_string()),
                ("2022-03-01".to_string(), "2022-03-31".to_string()),
            ]
        );
    }

    #[test]
    fn failed_query_is_skipped_and_run_continues() {
        let api = QuotaInFebruary {
            calls: RefCell::new(Vec::new()),
        };
        let outcome = run_report(
            &run_config(vec![FilterSpec::Total]),
            &[Identifier::new("a.com", "1")],
            &api,
        )
        .unwrap();

        let months: Vec<NaiveDate> = outcome
            .assembler
            .rows()
            .iter()
            .map(|r| r.period.start)
            .collect();
        assert_eq!(months, vec![date(2022, 1, 1), date(2022, 3, 1)]);
        assert_eq!(outcome.queries, 3);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].period.start, date(2022, 2, 1));
        assert!(outcome.skipped[0].reason.contains("429"));
    }

    #[test]
    fn every_identifier_period_and_filter_is_queried() {
        let api = QuotaInFebruary {
            calls: RefCell::new(Vec::new()),
        };
        let outcome = run_report(
            &run_config(FilterSpec::ALL.to_vec()),
            &[Identifier::new("a.com", "1"), Identifier::new("b.com", "2")],
            &api,
        )
        .unwrap();

        assert_eq!(outcome.queries, 2 * 3 * 4);
        assert_eq!(outcome.skipped.len(), 2 * 4);
        assert_eq!(outcome.assembler.len(), 2 * 2 * 4);
        assert_eq!(outcome.assembler.rows()[0].metric("ga:sessions"), 25.0);
    }

    #[test]
    fn two_views_for_one_domain_fail_before_any_query() {
        let api = QuotaInFebruary {
            calls: RefCell::new(Vec::new()),
        };
        let err = run_report(
            &run_config(vec![FilterSpec::Total]),
            &[Identifier::new("a.com", "1"), Identifier::new("a.com", "2")],
            &api,
        )
        .unwrap_err();

        assert!(matches!(err, AppError::Identifiers(_)));
        assert!(api.calls.borrow().is_empty());
    }

    #[test]
    fn plan_lists_one_line_per_query() {
        let mut buf = Vec::new();
        let count = write_plan(
            &mut buf,
            &run_config(vec![FilterSpec::Organic]),
            &[Identifier::new("a.com", "123")],
        )
        .unwrap();
        assert_eq!(count, 3);

        let text = String::from_utf8(buf).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["domain"], "a.com");
        assert_eq!(first["filter"], "organic");
        assert_eq!(first["period"], "2022-01-01..2022-01-31");
        assert_eq!(first["request"]["viewId"], "123");
        assert_eq!(
            first["request"]["dimensionFilterClauses"][0]["filters"][0]["dimensionName"],
            "ga:channelGrouping"
        );
    }

    #[test]
    fn periods_as_text() {
        let mut buf = Vec::new();
        write_periods(&mut buf, &run_config(vec![FilterSpec::Total])).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2022-02-01  2022-02-28   28d");
    }

    #[test]
    fn periods_as_json() {
        let mut run = run_config(vec![FilterSpec::Total]);
        run.json = true;
        let mut buf = Vec::new();
        write_periods(&mut buf, &run).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[2]["start"], "2022-03-01");
        assert_eq!(value[2]["days"], 31);
    }
}
