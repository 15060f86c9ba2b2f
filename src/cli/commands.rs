//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - validate: field checks and graph validation
//! - waves: offline wave plan and diagnostics
//! - dispatch: next batch for the control loop
//! - report / retry: status transitions and retry attempts
//! - simulate: discrete-event forecast
//! - cost: per-task estimates against the budget

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// swarm-dispatch - dependency-aware task scheduler for agent swarms
#[derive(Parser, Debug)]
#[command(name = "swarm-dispatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check a plan for missing fields, unknown dependencies and cycles
    Validate {
        /// Plan file (JSON or YAML)
        plan: PathBuf,
    },

    /// Group the plan into barrier waves and print diagnostics
    Waves {
        /// Plan file (JSON or YAML)
        plan: PathBuf,
    },

    /// Compute and record the next batch to launch
    Dispatch {
        /// Plan file (JSON or YAML)
        plan: PathBuf,

        /// Print the batch without recording it
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply a status report for a task
    Report {
        /// Plan file (JSON or YAML)
        plan: PathBuf,

        /// Task ID
        task: String,

        /// New status (done, running, failed, ...)
        status: String,
    },

    /// Record a retry attempt for a task
    Retry {
        /// Plan file (JSON or YAML)
        plan: PathBuf,

        /// Task ID
        task: String,
    },

    /// Forecast the run in virtual time
    Simulate {
        /// Plan file (JSON or YAML)
        plan: PathBuf,

        /// Release work in waves instead of continuously
        #[arg(long)]
        barrier: bool,
    },

    /// Estimate per-task cost and project it against the budget
    Cost {
        /// Plan file (JSON or YAML)
        plan: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_report() {
        let cli = Cli::try_parse_from(["swarm-dispatch", "report", "plan.yml", "T01", "done"]).unwrap();
        match cli.command {
            Commands::Report { plan, task, status } => {
                assert_eq!(plan, PathBuf::from("plan.yml"));
                assert_eq!(task, "T01");
                assert_eq!(status, "done");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["swarm-dispatch", "simulate", "plan.yml", "--barrier", "-v", "-c", "x.yml"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("x.yml")));
        assert!(matches!(cli.command, Commands::Simulate { barrier: true, .. }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["swarm-dispatch"]).is_err());
    }
}
