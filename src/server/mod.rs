//! HTTP server: CLI parsing, state construction, and the axum serve loop.

pub mod config;
pub mod handlers;
pub mod router;
pub mod state;
pub mod utils;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::Mutex;

use crate::logging::Logger;
use crate::storage::{db_path, Storage};

use config::{Cli, Config};
use state::{AppState, SharedState};

/// Entry point: parse CLI, open storage, start the server.
pub async fn run() {
    let cli = Cli::parse();
    let config = Config::from_cli_and_env(cli);
    let log = Logger::stderr();

    log.info(
        "reverie starting",
        &[("data_dir", &config.data_dir.display().to_string())],
    );

    let storage =
        Storage::open(&db_path(&config.data_dir)).expect("failed to open database");

    let state: SharedState = Arc::new(Mutex::new(AppState {
        storage,
        log: log.clone(),
    }));

    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    log.info(
        "reverie listening",
        &[("addr", &format!("http://{}", config.bind_addr))],
    );

    axum::serve(listener, app).await.expect("server error");
}
