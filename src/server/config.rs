//! Configuration types for the reverie server.

use std::path::PathBuf;

use clap::Parser;

/// Social wellness backend.
///
/// Exposes accounts, follow relationships, short posts, direct messages,
/// and mood logs over HTTP, persisted in SQLite.
///
/// Configuration can be set via CLI arguments or environment variables.
/// CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(name = "reverie", version, about)]
pub struct Cli {
    /// HTTP server bind address [env: REVERIE_BIND] [default: 127.0.0.1:8000]
    #[arg(long, short = 'b')]
    pub bind: Option<String>,

    /// Data directory for the database [env: REVERIE_HOME] [default: ~/.reverie]
    #[arg(long, short = 'd')]
    pub data_dir: Option<PathBuf>,
}

pub struct Config {
    pub bind_addr: String,
    pub data_dir: PathBuf,
}

impl Config {
    pub fn from_cli_and_env(cli: Cli) -> Self {
        let data_dir = cli
            .data_dir
            .or_else(|| std::env::var("REVERIE_HOME").ok().map(PathBuf::from))
            .unwrap_or_else(|| {
                std::env::var("HOME")
                    .map(|h| PathBuf::from(h).join(".reverie"))
                    .unwrap_or_else(|_| PathBuf::from(".reverie"))
            });

        let bind_addr = cli
            .bind
            .or_else(|| std::env::var("REVERIE_BIND").ok())
            .unwrap_or_else(|| "127.0.0.1:8000".to_string());

        Self {
            bind_addr,
            data_dir,
        }
    }
}
