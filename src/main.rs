//! flexpage - FLEX paging encoder server
//!
//! Accepts pages over TCP, encodes them into FLEX symbol streams and hands
//! them to the configured radio sink.

use flexpage_core::FlexEncoder;
use flexpage_server::{
    open_sink, CommandHandler, Config, Server, ServerConfig, ServerInfo, TransmitQueue,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if FLEXPAGE_CONFIG is set, then env overrides)
    let config_path = std::env::var("FLEXPAGE_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(path) = &config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::info!("Using default configuration");
            Config::default()
        }
    };

    tracing::info!("Starting flexpage server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!(
        "  Radio: {} Hz, gain {} dB, {} S/s",
        config.radio.center_frequency_hz,
        config.radio.gain_db,
        config.radio.sample_rate_hz
    );
    tracing::info!(
        "  Encoder: preamble x{}, retune memo {}",
        config.encoder.preamble_repeats,
        if config.encoder.retune_memo {
            "on"
        } else {
            "off"
        }
    );

    let sink = open_sink(&config.transmit).await.map_err(|e| {
        tracing::error!("Failed to open radio sink: {}", e);
        e
    })?;
    tracing::info!(
        "  Sink: {} (queue capacity {}, slot timing {})",
        sink.name(),
        config.transmit.queue_capacity,
        config.transmit.slot_timing.as_str()
    );

    let encoder = Arc::new(FlexEncoder::new(config.encoder_config()));
    let (queue, transmitter) = TransmitQueue::spawn(
        encoder,
        sink,
        config.transmit.queue_capacity,
        config.transmit.slot_timing,
    );

    let info = ServerInfo {
        center_frequency_hz: config.radio.center_frequency_hz,
        sink: config.transmit.sink.as_str().to_string(),
        ..ServerInfo::default()
    };
    let handler = Arc::new(CommandHandler::new(queue).with_info(info));

    let server_config = ServerConfig::new(config.network.bind_addr)
        .with_idle_timeout(config.network.idle_timeout())
        .with_max_connections(config.network.max_connections);
    let server = Arc::new(Server::new(server_config, handler.clone()));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    // Dropping the last queue handles lets the transmitter drain and exit
    drop(server);
    drop(handler);
    let _ = transmitter.await;

    tracing::info!("Server stopped");
    Ok(())
}
