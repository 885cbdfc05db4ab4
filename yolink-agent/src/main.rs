//! yolink-agent: cloud broker subscriber for YoLink sensors
//!
//! Startup is linear: load config, enable each configured sensor's
//! API, exchange the account keys for a broker session, subscribe.
//! After that the agent sits in a single receive loop until the
//! connection drops. Resilience lives outside the process: a
//! lock-and-run wrapper keeps one instance per config file and
//! relaunches it when it exits.

mod forward;
mod handler;
mod subscriber;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use yolink_core::{AuthClient, Config, DeviceRegistry};

use crate::handler::EventHandler;
use crate::subscriber::EventSubscriber;

#[derive(Debug, Parser)]
#[command(version, about = "Enable sensor APIs and subscribe to the YoLink cloud broker")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, value_name = "path")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "yolink_agent=debug,yolink_core=debug"
    } else {
        "yolink_agent=info,yolink_core=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Fatal before any network activity if the file is missing or
    // malformed
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    info!(devices = config.devices.len(), "configuration loaded");

    let auth = AuthClient::new(config.credentials());

    let mut registry = DeviceRegistry::new();
    for entry in &config.devices {
        let mut record = auth
            .enable_device(&entry.serial)
            .await
            .with_context(|| format!("enabling device API for `{}`", entry.name))?;
        // The configured friendly name wins over the vendor's
        if !entry.name.is_empty() {
            record.name = entry.name.clone();
        }
        match record.kind {
            Some(kind) => {
                info!(device_id = %record.device_id, name = %record.name, %kind, "device enabled")
            }
            None => warn!(
                device_id = %record.device_id,
                name = %record.name,
                raw_type = %record.raw_type,
                "device type not recognized, events will be logged raw"
            ),
        }
        registry.insert(record);
    }

    let session = auth
        .authenticate()
        .await
        .context("authenticating with the vendor API")?;
    info!(
        topic = %session.topic,
        broker = %session.broker_host,
        port = session.broker_port,
        "session established"
    );
    match session.expires_at {
        Some(at) if session.is_expired() => warn!(%at, "vendor issued an already-expired token"),
        Some(at) => debug!(%at, "session token expiry"),
        None => {}
    }

    let forwarder = config.forward.as_ref().map(forward::Forwarder::start);
    if forwarder.is_some() {
        info!("downstream forwarding enabled");
    }

    let mut handler = EventHandler::new(registry, forwarder);
    let subscriber = EventSubscriber::new(&session);

    // Blocks until the broker connection fails. No in-process
    // reconnect: exiting non-zero hands recovery to the wrapper.
    let result = subscriber.run(&mut handler).await;
    info!(events = handler.received(), "subscription ended");
    result?;
    Ok(())
}
