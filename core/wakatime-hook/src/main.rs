//! wakatime-hook: editor event adapter for wakatime-cli.
//!
//! Editors (or their plugin shims) pipe activity into this binary as
//! newline-delimited JSON; the heartbeat engine throttles, batches and
//! forwards it to wakatime-cli.
//!
//! ## Subcommands
//!
//! - `watch`: Track events from stdin until EOF, flushing periodically
//! - `print-command`: Show the wakatime-cli command one flush would run

mod args;
mod error;
mod input;
mod logging;
mod print_command;
mod watch;

use clap::{Parser, Subcommand};
use std::time::Duration;

use args::PluginArgs;

#[derive(Parser)]
#[command(name = "wakatime-hook")]
#[command(about = "Feeds editor activity to wakatime-cli")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track editor events (reads JSON lines from stdin until EOF)
    Watch {
        #[command(flatten)]
        plugin: PluginArgs,

        /// Seconds between queue flushes
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: u64,
    },

    /// Print the wakatime-cli command for the events on stdin, unthrottled
    PrintCommand {
        #[command(flatten)]
        plugin: PluginArgs,
    },
}

impl Commands {
    fn plugin(&self) -> &PluginArgs {
        match self {
            Commands::Watch { plugin, .. } | Commands::PrintCommand { plugin } => plugin,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let _logging_guard = logging::init(cli.command.plugin().debug);

    let result = match &cli.command {
        Commands::Watch {
            plugin,
            interval_secs,
        } => watch::run(plugin, Duration::from_secs(*interval_secs)),
        Commands::PrintCommand { plugin } => print_command::run(plugin),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "wakatime-hook failed");
        eprintln!("wakatime-hook: {}", e);
        std::process::exit(1);
    }
}
