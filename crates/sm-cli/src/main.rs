// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

mod clear;
mod dispatch;
mod send;
mod status;
mod util;

#[derive(Parser)]
#[command(name = "sm", version, about = "Multi-agent coding session manager CLI.")]
struct Cli {
    #[command(subcommand)]
    subcommand: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Send text to a target session (urgent/sequential/important).
    Send(send::SendArgs),
    /// Fence a stop notification and clear the caller's own context.
    Clear,
    /// Spawn or message a child session, attributed to the caller.
    Dispatch(dispatch::DispatchArgs),
    /// Report session status, or the workspace lock if no id is given.
    Status(status::StatusArgs),
}

fn main() {
    let cli = Cli::parse();

    let code = match cli.subcommand {
        Commands::Send(args) => send::run(&args),
        Commands::Clear => clear::run(),
        Commands::Dispatch(args) => dispatch::run(&args),
        Commands::Status(args) => status::run(&args),
    };
    std::process::exit(code);
}
