// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `get`: authenticated GET through the session pipeline.

use crate::command::EXIT_NO_SESSION;
use crate::error::{RefreshError, SessionError};
use crate::session::Session;
use crate::transport::ApiRequest;

#[derive(Debug, clap::Args)]
pub struct GetArgs {
    /// Path relative to the API URL, e.g. `/articles?page=2`.
    pub path: String,
}

pub async fn get(session: &Session, args: &GetArgs) -> i32 {
    match session.client().send(ApiRequest::get(args.path.as_str())).await {
        Ok(resp) => {
            println!("{}", resp.text());
            if resp.is_success() {
                0
            } else {
                eprintln!("error: request failed ({})", resp.status);
                1
            }
        }
        Err(SessionError::RefreshFailed(RefreshError::NoSession)) => {
            eprintln!("not logged in");
            EXIT_NO_SESSION
        }
        Err(e) if e.is_session_expired() => {
            eprintln!("session expired, log in again: {e}");
            EXIT_NO_SESSION
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}
