use crate::command::FlourishCommand;
use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(name = "flourish", version, about, propagate_version = true)]
pub struct FlourishCli {
    #[command(subcommand)]
    pub command: FlourishCommand,

    /// Run the command inside a transaction, report it, then roll it back
    #[arg(long, short = 'n', global = true)]
    pub dry_run: bool,

    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl FlourishCli {
    /// Default log filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}
