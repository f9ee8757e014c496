//! Dots and Boxes Server
//!
//! Loads configuration from the environment and serves commands over
//! WebSocket until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use dots_boxes::{
    network::{GameServer, ServerConfig},
    Clock, Dispatcher, GameConfig, MemoryStore, SystemClock, VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let game_config = GameConfig::from_env().context("invalid game configuration")?;
    let server_config = ServerConfig::from_env().context("invalid server configuration")?;

    info!("Dots and Boxes Server v{}", VERSION);
    info!(
        "Board {}x{} ({} lines), wait window {}ms, turn budget {}ms",
        game_config.grid_rows,
        game_config.grid_cols,
        game_config.grid().total_lines(),
        game_config.waiting_time_threshold_ms,
        game_config.play_time_ms
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::from_config(&game_config));
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), clock.clone(), &game_config));
    let server = Arc::new(GameServer::new(server_config, dispatcher, store, clock));

    let running = server.clone();
    let mut serve = tokio::spawn(async move { running.run().await });

    tokio::select! {
        result = &mut serve => {
            result.context("server task panicked")??;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("Ctrl-C received, shutting down");
            server.shutdown();
            serve.await.context("server task panicked")??;
        }
    }

    Ok(())
}
