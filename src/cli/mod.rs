//! CLI module for swarm-dispatch - command-line interface and subcommands.
//!
//! Every subcommand takes a plan file; the live ones (dispatch, report,
//! retry) also read and write the checkpoint directory from the config.

pub mod commands;

pub use commands::Cli;
