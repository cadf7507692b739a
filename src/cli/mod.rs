pub(crate) mod args;
pub(crate) mod commands;

pub(crate) use args::{Cli, Layout, SortOrder};
pub(crate) use commands::Commands;
