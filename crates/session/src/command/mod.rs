// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommands: `login`, `logout`, `whoami`, `status`, `get`.

pub mod auth;
pub mod request;

use crate::config::SessionConfig;
use crate::session::Session;

/// Exit code for usage and configuration errors.
pub const EXIT_USAGE: i32 = 2;
/// Exit code when the command needs a session and there is none (or it expired).
pub const EXIT_NO_SESSION: i32 = 3;

/// Command-line interface for the portal session tool.
#[derive(Debug, clap::Parser)]
#[command(name = "portal-session", version, about = "Log in to the portal API and issue authenticated requests")]
pub struct Cli {
    #[command(flatten)]
    pub config: SessionConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Log in and persist the session.
    Login(auth::LoginArgs),
    /// Log out and clear the persisted session.
    Logout,
    /// Print the cached identity.
    Whoami,
    /// Print session status as JSON.
    Status,
    /// Issue an authenticated GET and print the response body.
    Get(request::GetArgs),
}

/// Run a subcommand. Returns a process exit code.
pub async fn run(cli: Cli) -> i32 {
    let session = Session::from_config(&cli.config);
    match cli.command {
        Command::Login(ref args) => auth::login(&session, args).await,
        Command::Logout => auth::logout(&session).await,
        Command::Whoami => auth::whoami(&session),
        Command::Status => auth::status(&session),
        Command::Get(ref args) => request::get(&session, args).await,
    }
}
