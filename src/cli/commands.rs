//! CLI subcommand definitions

use clap::Subcommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub(crate) enum Commands {
    /// Query the reporting API and write the report (default)
    Fetch,
    /// Print the queries a run would issue, one JSON object per line
    Plan,
    /// Print the periods the date range splits into
    Periods,
}

impl Commands {
    /// Resolve the optional subcommand, `fetch` when none was given
    pub(crate) fn or_default(command: Option<Commands>) -> Commands {
        command.unwrap_or(Commands::Fetch)
    }
}
