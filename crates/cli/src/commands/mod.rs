//! CLI subcommands.

pub mod snapshot;
