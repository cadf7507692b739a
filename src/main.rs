mod api;
mod app;
mod cli;
mod config;
mod consts;
mod core;
mod error;
mod output;
mod report;
mod source;
mod utils;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use config::Config;

fn init_tracing(debug: bool) {
    let default = if debug { "gareport=debug" } else { "gareport=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let cli = cli.with_config(&config);

    init_tracing(cli.debug);
    if let Some(path) = &config.path {
        tracing::debug!(path = %path.display(), "loaded config");
    }

    let command = Commands::or_default(cli.command);
    if let Err(e) = app::run(&cli, &config, command) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
