use chrono::{Datelike, Months, NaiveDate};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::RetryPolicy;
use crate::cli::{Cli, Layout, SortOrder};
use crate::consts::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PAGE_SIZE, DEFAULT_RETRY_DELAY_SECS};
use crate::core::{Granularity, Identifier, Metric};
use crate::error::AppError;
use crate::report::{FilterSpec, RequestTemplate, parse_filters};
use crate::utils::parse_date;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ConfigSortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ConfigLayout {
    Long,
    Wide,
}

/// `[[views]]` entry
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ViewEntry {
    pub(crate) domain: String,
    pub(crate) view_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    #[serde(default)]
    pub(crate) key_file: Option<PathBuf>,
    #[serde(default)]
    pub(crate) bigquery_project: Option<String>,
    #[serde(default)]
    pub(crate) bigquery_sql: Option<String>,
    #[serde(default)]
    pub(crate) ids_csv: Option<PathBuf>,
    #[serde(default)]
    pub(crate) views: Vec<ViewEntry>,
    #[serde(default)]
    pub(crate) start: Option<String>,
    #[serde(default)]
    pub(crate) end: Option<String>,
    #[serde(default)]
    pub(crate) granularity: Option<Granularity>,
    #[serde(default)]
    pub(crate) filters: Vec<String>,
    #[serde(default)]
    pub(crate) metrics: Vec<String>,
    #[serde(default)]
    pub(crate) dimensions: Vec<String>,
    #[serde(default)]
    pub(crate) output: Option<String>,
    #[serde(default)]
    pub(crate) layout: Option<ConfigLayout>,
    #[serde(default)]
    pub(crate) order: Option<ConfigSortOrder>,
    #[serde(default)]
    pub(crate) page_size: Option<u32>,
    #[serde(default)]
    pub(crate) max_attempts: Option<u32>,
    #[serde(default)]
    pub(crate) retry_delay_secs: Option<u64>,
    #[serde(default)]
    pub(crate) debug: bool,

    /// File this config was read from, if any
    #[serde(skip)]
    pub(crate) path: Option<PathBuf>,
}

impl Config {
    /// Read `explicit` if given, otherwise the first config file found in the
    /// usual locations. No file at all is not an error.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self, AppError> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        for path in Self::get_config_paths() {
            if path.exists() {
                return Self::read(&path);
            }
        }
        Ok(Self::default())
    }

    fn read(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. XDG config: ~/.config/gareport/config.toml (Linux/cross-platform)
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("gareport").join("config.toml"));
        }

        // 2. Platform config dir (macOS Application Support, Windows AppData)
        if let Some(config_dir) = dirs::config_dir() {
            let platform_path = config_dir.join("gareport").join("config.toml");
            if !paths.contains(&platform_path) {
                paths.push(platform_path);
            }
        }

        // 3. Home directory: ~/.gareport.toml
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".gareport.toml"));
        }

        paths
    }

    pub(crate) fn identifiers(&self) -> Vec<Identifier> {
        self.views
            .iter()
            .map(|v| Identifier::new(&v.domain, &v.view_id))
            .collect()
    }
}

/// Where the report goes
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OutputTarget {
    Stdout,
    File(PathBuf),
}

/// Everything a run needs, resolved from CLI flags and the config file.
#[derive(Debug, Clone)]
pub(crate) struct RunConfig {
    pub(crate) start: NaiveDate,
    pub(crate) end: NaiveDate,
    pub(crate) granularity: Granularity,
    pub(crate) filters: Vec<FilterSpec>,
    pub(crate) template: RequestTemplate,
    pub(crate) layout: Layout,
    pub(crate) order: SortOrder,
    pub(crate) json: bool,
    pub(crate) output: OutputTarget,
}

impl RunConfig {
    /// Validate the merged CLI. Missing dates default to the last full
    /// calendar month before `today`.
    pub(crate) fn from_cli(cli: &Cli, today: NaiveDate) -> Result<Self, AppError> {
        let (default_start, default_end) = previous_month(today);
        let start = match cli.start.as_deref() {
            Some(s) => parse_date(s)?,
            None => default_start,
        };
        let end = match cli.end.as_deref() {
            Some(s) => parse_date(s)?,
            None => default_end,
        };
        if start > end {
            return Err(AppError::InvalidRange { start, end });
        }

        let filters = parse_filters(cli.filters.as_slice())?;

        let metric_names: Vec<&str> = if cli.metrics.is_empty() {
            crate::consts::DEFAULT_METRICS.to_vec()
        } else {
            cli.metrics.iter().map(String::as_str).collect()
        };
        let metrics: Vec<Metric> = metric_names
            .into_iter()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(Metric::new)
            .collect();
        if metrics.is_empty() {
            return Err(AppError::Config("at least one metric is required".to_string()));
        }

        let template = RequestTemplate {
            metrics,
            dimensions: cli
                .dimensions
                .iter()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
            page_size: cli.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        };

        let output = match cli.output.as_deref() {
            Some("-") => OutputTarget::Stdout,
            Some(path) => OutputTarget::File(PathBuf::from(path)),
            None => OutputTarget::File(default_output_path(today, cli.granularity, cli.json)),
        };

        Ok(Self {
            start,
            end,
            granularity: cli.granularity,
            filters,
            template,
            layout: cli.layout,
            order: cli.order,
            json: cli.json,
            output,
        })
    }
}

pub(crate) fn retry_policy(cli: &Cli) -> RetryPolicy {
    RetryPolicy {
        max_attempts: cli.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
        delay: Duration::from_secs(cli.retry_delay_secs.unwrap_or(DEFAULT_RETRY_DELAY_SECS)),
    }
}

fn previous_month(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let this_month = today.with_day(1).unwrap_or(today);
    let start = this_month
        .checked_sub_months(Months::new(1))
        .unwrap_or(this_month);
    let end = this_month.pred_opt().unwrap_or(this_month);
    (start, end)
}

/// `~/Downloads/2025-01-15 GA Monthly.csv`, or the current directory when
/// there is no download dir.
fn default_output_path(today: NaiveDate, granularity: Granularity, json: bool) -> PathBuf {
    let extension = if json { "json" } else { "csv" };
    let name = format!(
        "{} GA {}.{extension}",
        crate::utils::format_date(today),
        granularity.label()
    );
    match dirs::download_dir() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["gareport"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_config_paths() {
        let paths = Config::get_config_paths();
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| p.to_string_lossy().contains("gareport")));
    }

    #[test]
    fn parses_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
key_file = "/etc/gareport/key.json"
granularity = "week"
filters = ["total", "organic"]
metrics = ["ga:sessions"]
layout = "wide"
order = "desc"
max_attempts = 5

[[views]]
domain = "example.com"
view_id = "123456"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.path.as_deref(), Some(file.path()));
        assert_eq!(config.granularity, Some(Granularity::Week));
        assert_eq!(config.filters, vec!["total", "organic"]);
        assert_eq!(config.layout, Some(ConfigLayout::Wide));
        assert_eq!(config.order, Some(ConfigSortOrder::Desc));
        assert_eq!(config.max_attempts, Some(5));
        assert_eq!(config.identifiers(), vec![Identifier::new("example.com", "123456")]);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "granularty = \"week\"").unwrap();
        let err = Config::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = Config::load(Some(Path::new("/nonexistent/gareport.toml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/gareport.toml"));
    }

    #[test]
    fn run_config_defaults() {
        let run = RunConfig::from_cli(&cli(&[]), date(2025, 3, 14)).unwrap();
        assert_eq!(run.start, date(2025, 2, 1));
        assert_eq!(run.end, date(2025, 2, 28));
        assert_eq!(run.granularity, Granularity::Month);
        assert_eq!(run.filters, FilterSpec::ALL.to_vec());
        assert_eq!(run.template.metrics.len(), 2);
        assert!(run.template.dimensions.is_empty());
        match run.output {
            OutputTarget::File(path) => {
                assert!(path.to_string_lossy().ends_with("2025-03-14 GA Monthly.csv"));
            }
            OutputTarget::Stdout => panic!("expected a file"),
        }
    }

    #[test]
    fn previous_month_crosses_year() {
        assert_eq!(
            previous_month(date(2025, 1, 1)),
            (date(2024, 12, 1), date(2024, 12, 31))
        );
    }

    #[test]
    fn run_config_rejects_inverted_range() {
        let err = RunConfig::from_cli(
            &cli(&["--start", "2022-03-31", "--end", "2022-01-01"]),
            date(2025, 1, 1),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidRange { .. }));
    }

    #[test]
    fn run_config_rejects_unknown_filter() {
        let err = RunConfig::from_cli(&cli(&["--filters", "total,paid"]), date(2025, 1, 1))
            .unwrap_err();
        assert!(matches!(err, AppError::UnknownFilter { .. }));
    }

    #[test]
    fn dash_means_stdout() {
        let run = RunConfig::from_cli(&cli(&["-o", "-", "--json"]), date(2025, 1, 1)).unwrap();
        assert_eq!(run.output, OutputTarget::Stdout);
        assert!(run.json);
    }

    #[test]
    fn retry_policy_defaults() {
        let policy = retry_policy(&cli(&[]));
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(5));
    }
}
