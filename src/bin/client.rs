//! Interactive chat client for a chanoma backend.
//!
//! Logs in against the REST API, converts the cookie session into a
//! websocket connection and drops into an interactive prompt with rooms,
//! bounded history and typing indicators. Automatically reconnects while
//! logged in (3 second interval).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chanoma-client -- --username alice --password secret
//! cargo run --bin chanoma-client -- --state-file ~/.chanoma-state.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use chanoma::common::logger::setup_logger;
use chanoma::common::time::SystemClock;
use chanoma::config::EngineConfig;
use chanoma::infrastructure::storage::{
    FileSnapshotStorage, MemorySnapshotStorage, SnapshotStorage,
};
use chanoma::session::SessionEngine;
use chanoma::ui::run_repl;

#[derive(Parser, Debug)]
#[command(name = "chanoma-client")]
#[command(about = "Terminal chat client with rooms, history and automatic reconnect", long_about = None)]
struct Args {
    /// Base URL of the REST backend
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    api_url: String,

    /// Base URL of the websocket gateway
    #[arg(long, default_value = "ws://127.0.0.1:8000/ws")]
    ws_url: String,

    /// Log in immediately instead of waiting for /login
    #[arg(short = 'u', long, requires = "password")]
    username: Option<String>,

    /// Password for --username
    #[arg(short = 'p', long, requires = "username")]
    password: Option<String>,

    /// Persist rooms and history to this file (in-memory when omitted)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Maximum number of messages kept per room
    #[arg(long, default_value_t = chanoma::config::DEFAULT_HISTORY_CAP)]
    history_cap: usize,

    /// Use a fixed development token when the backend cannot mint one
    #[arg(long)]
    dev_token: bool,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = EngineConfig {
        api_base_url: args.api_url,
        ws_base_url: args.ws_url,
        storage_path: args.state_file,
        history_cap: args.history_cap,
        dev_fallback_token: args.dev_token,
        ..EngineConfig::default()
    };

    let storage: Box<dyn SnapshotStorage> = match &config.storage_path {
        Some(path) => Box::new(FileSnapshotStorage::new(path)),
        None => Box::new(MemorySnapshotStorage::new()),
    };

    let (handle, engine_task) =
        SessionEngine::spawn(config, storage, Arc::new(SystemClock)).await?;

    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        handle.login(username, password).await?;
    }

    run_repl(handle.clone()).await;

    // Graceful teardown: leave the room, close the socket, stop the engine
    handle.shutdown();
    let _ = tokio::time::timeout(Duration::from_secs(5), engine_task).await;

    Ok(())
}
