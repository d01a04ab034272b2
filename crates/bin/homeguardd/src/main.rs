//! # homeguardd — homeguard daemon
//!
//! Composition root that wires all adapters together and drives the
//! pipeline.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Load the item definitions and build the registry
//! - Construct the settings store and node adapters
//! - Spawn the timer tasks that feed the watchdog checks
//! - Run the driver loop until the terminal mode or a shutdown signal
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

use std::sync::Arc;
use std::time::Duration;

use homeguard_adapter_virtual::VirtualNode;
use homeguard_app::{Controller, Machine, Registry, Watchdog};
use homeguard_domain::item::{ItemKind, ItemSettings};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod items;
mod store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Registry
    let definitions = items::load(&config.items.path)?;
    let registry = Arc::new(Registry::from_configs(definitions)?);

    // Controller and ports
    let settings_store = Arc::new(store::TomlSettingsStore::new(&config.store.path));
    let ctrl = Arc::new(Controller::new(Arc::clone(&registry), settings_store));

    // Node adapters. Virtual nodes have no handshake; they start at once.
    for node in registry.of_kind(ItemKind::Node) {
        let port = Arc::new(VirtualNode::new());
        port.start();
        ctrl.attach_node(node.id().clone(), port);
    }

    // Timer tasks feeding the watchdog; one default timer when none are
    // configured.
    let watchdog = Arc::new(Watchdog::new(Arc::clone(&ctrl)));
    let timers = registry.of_kind(ItemKind::Timer);
    let periods: Vec<u64> = if timers.is_empty() {
        vec![1]
    } else {
        timers
            .iter()
            .filter(|timer| timer.enabled())
            .map(|timer| {
                timer.with_settings(|s| match s {
                    ItemSettings::Timer(t) => t.period_secs.max(1),
                    _ => 1,
                })
            })
            .collect()
    };
    for period in periods {
        let watchdog = Arc::clone(&watchdog);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(period));
            loop {
                ticker.tick().await;
                watchdog.check_elements();
                watchdog.check_system();
            }
        });
    }

    // Driver loop
    let machine = Machine::new(Arc::clone(&ctrl));
    let driver = tokio::task::spawn_blocking(move || machine.run());

    info!(items = registry.len(), "homeguardd running");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
        _ = driver => info!("pipeline reached the terminal mode"),
    }
    Ok(())
}
