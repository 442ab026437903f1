// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `pursuit-auth` subcommands.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use tokio::io::AsyncReadExt;

use crate::config::AuthConfig;
use crate::coordinator::AuthCoordinator;
use crate::http::RequestOptions;
use crate::message;

/// Session manager for the PursuitPal backend.
#[derive(Debug, Parser)]
#[command(name = "pursuit-auth", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub config: AuthConfig,

    /// Log filter (tracing EnvFilter syntax).
    #[arg(long, default_value = "warn", env = "PURSUIT_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[arg(long, default_value = "text", env = "PURSUIT_LOG_FORMAT")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in and store the session
    Login {
        #[arg(long, env = "PURSUIT_EMAIL")]
        email: String,
        #[arg(long, env = "PURSUIT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log out and erase the stored session
    Logout,
    /// Show whether a usable session exists
    Status,
    /// Print the current user
    Whoami,
    /// Ask the server whether the stored token is valid
    Validate,
    /// Send an authenticated request and print the JSON response
    Fetch {
        /// Endpoint path (joined to --api-url) or absolute URL
        endpoint: String,
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,
        /// JSON request body
        #[arg(long, short = 'd')]
        data: Option<String>,
    },
    /// Read one JSON message from stdin and print the reply
    Message,
}

/// Run a subcommand against `coordinator`. Returns the process exit code.
pub async fn run(coordinator: Arc<AuthCoordinator>, command: Command) -> i32 {
    match command {
        Command::Login { email, password } => match coordinator.login(&email, &password).await {
            Ok(user) => {
                let who = user.email.or(user.name).unwrap_or_else(|| email.clone());
                println!("logged in as {who}");
                0
            }
            Err(e) => {
                eprintln!("error: {e}");
                1
            }
        },

        Command::Logout => match coordinator.logout().await {
            Ok(()) => {
                println!("logged out");
                0
            }
            Err(e) => {
                eprintln!("error: {e}");
                1
            }
        },

        Command::Status => {
            if !coordinator.is_authenticated().await {
                println!("not authenticated");
                return 1;
            }
            match coordinator.stored_credential().await {
                Ok(Some(cred)) => {
                    let now = crate::clock::epoch_ms();
                    let left = cred.expires_at.saturating_sub(now) / 1000;
                    println!("authenticated (token expires in {}m {:02}s)", left / 60, left % 60);
                    0
                }
                Ok(None) => {
                    println!("not authenticated");
                    1
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    1
                }
            }
        }

        Command::Whoami => match coordinator.get_current_user().await {
            Some(user) => print_json(&serde_json::to_value(user).unwrap_or_default()),
            None => {
                eprintln!("error: not logged in");
                1
            }
        },

        Command::Validate => match coordinator.validate_token().await {
            Ok(true) => {
                println!("valid");
                0
            }
            Ok(false) => {
                println!("invalid");
                1
            }
            Err(e) => {
                eprintln!("error: {e}");
                1
            }
        },

        Command::Fetch { endpoint, method, data } => {
            let method = match Method::from_bytes(method.to_uppercase().as_bytes()) {
                Ok(m) => m,
                Err(_) => {
                    eprintln!("error: bad method: {method}");
                    return 2;
                }
            };
            let body = match data.as_deref().map(serde_json::from_str::<Value>).transpose() {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("error: --data is not JSON: {e}");
                    return 2;
                }
            };
            let options = RequestOptions { method, body, ..RequestOptions::default() };
            match coordinator.fetch_with_auth(&endpoint, options).await {
                Ok(value) => print_json(&value),
                Err(e) => {
                    eprintln!("error: {e}");
                    1
                }
            }
        }

        Command::Message => {
            let mut input = String::new();
            if let Err(e) = tokio::io::stdin().read_to_string(&mut input).await {
                eprintln!("error: reading stdin: {e}");
                return 2;
            }
            let raw = match serde_json::from_str::<Value>(&input) {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("error: message is not JSON: {e}");
                    return 2;
                }
            };
            let reply = message::handle(&coordinator, raw).await;
            let ok = reply["success"].as_bool().unwrap_or(false);
            match print_json(&reply) {
                0 if ok => 0,
                0 => 1,
                code => code,
            }
        }
    }
}

fn print_json(value: &Value) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            0
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}
