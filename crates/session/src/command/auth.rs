// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `login`, `logout`, `whoami`, `status`.

use std::io::BufRead;

use crate::command::{EXIT_NO_SESSION, EXIT_USAGE};
use crate::session::Session;

#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    /// Account email.
    #[arg(long, env = "PORTAL_EMAIL")]
    pub email: String,
    /// Account password. Prefer `--password-stdin` on shared machines.
    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true, conflicts_with = "password_stdin")]
    pub password: Option<String>,
    /// Read the password from the first line of stdin.
    #[arg(long)]
    pub password_stdin: bool,
}

fn read_password(args: &LoginArgs) -> anyhow::Result<String> {
    if let Some(ref pw) = args.password {
        return Ok(pw.clone());
    }
    anyhow::ensure!(args.password_stdin, "no password given (use --password or --password-stdin)");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

pub async fn login(session: &Session, args: &LoginArgs) -> i32 {
    let password = match read_password(args) {
        Ok(pw) => pw,
        Err(e) => {
            eprintln!("error: {e:#}");
            return EXIT_USAGE;
        }
    };
    match session.login(&args.email, &password).await {
        Ok(user) => {
            match user {
                Some(u) => println!("logged in as {} ({})", u.email, u.id),
                None => println!("logged in"),
            }
            0
        }
        Err(e) => {
            eprintln!("error: login failed: {e}");
            1
        }
    }
}

pub async fn logout(session: &Session) -> i32 {
    let was_authenticated = session.is_authenticated();
    session.logout().await;
    if was_authenticated {
        println!("logged out");
    } else {
        println!("not logged in");
    }
    0
}

pub fn whoami(session: &Session) -> i32 {
    match session.current_user() {
        Some(user) => match serde_json::to_string_pretty(&user) {
            Ok(json) => {
                println!("{json}");
                0
            }
            Err(e) => {
                eprintln!("error: {e}");
                1
            }
        },
        None => {
            eprintln!("not logged in");
            EXIT_NO_SESSION
        }
    }
}

pub fn status(session: &Session) -> i32 {
    let pair = session.credentials();
    let body = serde_json::json!({
        "authenticated": session.is_authenticated(),
        "user": session.current_user(),
        "expires_in_secs": pair.as_ref().and_then(|p| p.expires_in()),
        "issued_at": pair.as_ref().map(|p| p.issued_at),
    });
    println!("{body}");
    0
}
