// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kasa",
    about = "Control TP-Link Kasa smart plugs through the Kasa cloud",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Kasa account email; overrides `account.email` from the config file
    #[arg(long, short = 'e', env = "KASA_EMAIL", global = true)]
    pub email: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the devices registered to the account
    Devices {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show whether a device is on, plus the details it reports
    Status {
        /// Device alias as shown in the Kasa app, e.g. "Kitchen Lamp"
        alias: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Switch a device on
    On { alias: String },
    /// Switch a device off
    Off { alias: String },
    /// Flip a device's power state.
    ///
    /// Reads the current state, then writes the opposite.  A change made
    /// elsewhere between the two calls is not detected.
    Toggle { alias: String },
    /// Print the effective configuration and exit
    ShowConfig,
    /// Generate shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "kasa", &mut std::io::stdout());
}
