//! Relay node for Linux/desktop.
//!
//! Runs the connection manager against a simulated radio so the control
//! protocol can be exercised with an ordinary TCP peer on the same machine:
//!
//! ```text
//! RELAY_NODE_SETTINGS=node.json RUST_LOG=debug relay-node
//! ```

mod sim;

use std::path::PathBuf;

use anyhow::Context;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_core::{DeviceContext, NodeSettings, ThreadDelay};
use relay_node::{ConnectionManager, TokioTransport};

use crate::sim::{FileConfigStore, SimulatedWifi, TracingDisplay, TracingRelay};

const SETTINGS_ENV: &str = "RELAY_NODE_SETTINGS";
const STATE_ENV: &str = "RELAY_NODE_STATE";
const DEFAULT_STATE_PATH: &str = "relay-node-state.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,relay_node=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Relay node starting...");

    let settings = load_settings()?;
    let state_path =
        PathBuf::from(std::env::var(STATE_ENV).unwrap_or_else(|_| DEFAULT_STATE_PATH.into()));

    match &settings.server_override {
        Some(addr) => tracing::info!("   Peer:    {}", addr),
        None => tracing::info!("   Peer:    127.0.0.1:{}", settings.tcp_port),
    }
    match &settings.fixed_target {
        Some(target) => tracing::info!("   Network: {} (fixed)", target.ssid),
        None => tracing::info!("   Network: {} (simulated)", settings.provisioning_ssid),
    }
    tracing::info!("   Record:  {}", state_path.display());

    // The manager is single-threaded and blocking. It gets its own thread and
    // spawns its socket tasks back onto this runtime.
    let handle = tokio::runtime::Handle::current();
    let (done_tx, done_rx) = oneshot::channel::<anyhow::Error>();
    std::thread::Builder::new()
        .name("relay-node".to_string())
        .spawn(move || {
            if let Err(e) = run_node(settings, state_path, handle) {
                let _ = done_tx.send(e);
            }
        })
        .context("spawning node thread")?;

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        result = done_rx => {
            if let Ok(e) = result {
                tracing::error!("Node stopped: {:#}", e);
                return Err(e);
            }
            tracing::warn!("Node thread exited");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn load_settings() -> anyhow::Result<NodeSettings> {
    let Ok(path) = std::env::var(SETTINGS_ENV) else {
        tracing::info!("{} not set, using default settings", SETTINGS_ENV);
        return Ok(NodeSettings::default());
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading settings from {}", path))?;
    NodeSettings::from_json(&text).with_context(|| format!("parsing settings in {}", path))
}

fn run_node(
    settings: NodeSettings,
    state_path: PathBuf,
    handle: tokio::runtime::Handle,
) -> anyhow::Result<()> {
    let ctx = DeviceContext::open(
        &settings,
        Box::new(FileConfigStore::new(state_path)),
        Box::new(TracingRelay),
        Box::new(TracingDisplay::default()),
    )
    .context("loading device record")?;
    tracing::debug!("Network pattern: '{}'", ctx.config().network_pattern);

    let wifi = SimulatedWifi::from_settings(&settings);
    let mut manager = ConnectionManager::new(
        settings,
        ctx,
        wifi,
        TokioTransport::new(handle),
        ThreadDelay,
    );
    manager.run()
}
