//! CLI argument definitions
//!
//! Global CLI options and configuration merging logic.

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{Config, ConfigLayout, ConfigSortOrder};
use crate::core::Granularity;

use super::commands::Commands;

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq)]
pub(crate) enum SortOrder {
    /// Oldest first (default)
    #[default]
    Asc,
    /// Newest first
    Desc,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq)]
pub(crate) enum Layout {
    /// One row per domain, period and filter (default)
    #[default]
    Long,
    /// One row per domain and period, one column per filter and metric
    Wide,
}

#[derive(Parser)]
#[command(name = "gareport")]
#[command(about = "Google Analytics traffic reports by domain, period and segment", version)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Option<Commands>,

    /// Config file (default: ~/.config/gareport/config.toml or ~/.gareport.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// First day of the range (YYYYMMDD or YYYY-MM-DD, default: start of last month)
    #[arg(short, long, global = true)]
    pub(crate) start: Option<String>,

    /// Last day of the range, inclusive (default: end of last month)
    #[arg(short, long, global = true)]
    pub(crate) end: Option<String>,

    /// Period size
    #[arg(short, long, global = true, value_enum, default_value = "month")]
    pub(crate) granularity: Granularity,

    /// Segments to report (total, organic, non_blog, organic_non_blog)
    #[arg(short, long, global = true, value_delimiter = ',')]
    pub(crate) filters: Vec<String>,

    /// Metric expressions (default: ga:users,ga:sessions)
    #[arg(short, long, global = true, value_delimiter = ',')]
    pub(crate) metrics: Vec<String>,

    /// Dimension names to break rows down by
    #[arg(short, long, global = true, value_delimiter = ',')]
    pub(crate) dimensions: Vec<String>,

    /// CSV file listing domain,view_id pairs
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) ids_csv: Option<PathBuf>,

    /// BigQuery SQL returning domain and view_id columns
    #[arg(long, global = true, value_name = "SQL")]
    pub(crate) bigquery_sql: Option<String>,

    /// BigQuery project to run the query in (default: the key file's project)
    #[arg(long, global = true, value_name = "PROJECT")]
    pub(crate) bigquery_project: Option<String>,

    /// Service-account key file
    #[arg(long, global = true, value_name = "PATH", env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub(crate) key_file: Option<PathBuf>,

    /// Output file, "-" for stdout (default: ~/Downloads/<today> GA <Granularity>.csv)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub(crate) output: Option<String>,

    /// CSV layout
    #[arg(short, long, global = true, value_enum, default_value = "long")]
    pub(crate) layout: Layout,

    /// Write JSON instead of CSV
    #[arg(short, long, global = true)]
    pub(crate) json: bool,

    /// Sort order for results
    #[arg(long, global = true, value_enum, default_value = "asc")]
    pub(crate) order: SortOrder,

    /// Rows per API page (max 100000)
    #[arg(long, global = true)]
    pub(crate) page_size: Option<u32>,

    /// Attempts per API call before a query is skipped
    #[arg(long, global = true)]
    pub(crate) max_attempts: Option<u32>,

    /// Seconds to wait between attempts
    #[arg(long = "retry-delay", global = true, value_name = "SECS")]
    pub(crate) retry_delay_secs: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub(crate) no_color: bool,

    /// Enable debug output (show every request)
    #[arg(long, global = true)]
    pub(crate) debug: bool,
}

impl Cli {
    /// Merge config file values into CLI (CLI args take precedence)
    pub(crate) fn with_config(mut self, config: &Config) -> Self {
        // For boolean flags, config only applies if CLI is false (default)
        if !self.debug && config.debug {
            self.debug = true;
        }

        // For enum values, apply config only if CLI is at default
        if config.order == Some(ConfigSortOrder::Desc) && self.order == SortOrder::Asc {
            self.order = SortOrder::Desc;
        }
        if config.layout == Some(ConfigLayout::Wide) && self.layout == Layout::Long {
            self.layout = Layout::Wide;
        }
        if let Some(granularity) = config.granularity
            && self.granularity == Granularity::default()
        {
            self.granularity = granularity;
        }

        // Lists: config applies when nothing was given on the command line
        if self.filters.is_empty() {
            self.filters = config.filters.clone();
        }
        if self.metrics.is_empty() {
            self.metrics = config.metrics.clone();
        }
        if self.dimensions.is_empty() {
            self.dimensions = config.dimensions.clone();
        }

        // Scalars: only apply if CLI didn't set them
        if self.start.is_none() {
            self.start = config.start.clone();
        }
        if self.end.is_none() {
            self.end = config.end.clone();
        }
        if self.ids_csv.is_none() {
            self.ids_csv = config.ids_csv.clone();
        }
        if self.bigquery_sql.is_none() {
            self.bigquery_sql = config.bigquery_sql.clone();
        }
        if self.bigquery_project.is_none() {
            self.bigquery_project = config.bigquery_project.clone();
        }
        if self.key_file.is_none() {
            self.key_file = config.key_file.clone();
        }
        if self.output.is_none() {
            self.output = config.output.clone();
        }
        self.page_size = self.page_size.or(config.page_size);
        self.max_attempts = self.max_attempts.or(config.max_attempts);
        self.retry_delay_secs = self.retry_delay_secs.or(config.retry_delay_secs);

        self
    }

    pub(crate) fn use_color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}
