//! Startup orchestration for the `run` command.
//!
//! # Responsibilities
//! - Build every configured set before anything else starts
//! - Start the metrics endpoint, control plane and config watcher
//! - Route signals and file changes into reloads until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::path::Path;
use std::sync::Arc;

use crate::config::loader::load_config;
use crate::config::schema::EngineConfig;
use crate::config::watcher::ConfigWatcher;
use crate::control::{ControlHandle, ControlPlane, SetManager};
use crate::ipset::TypeRegistry;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::{SignalEvent, Signals};
use crate::observability::metrics;

/// Serve the sets in `config` until SIGINT/SIGTERM.
pub async fn run(
    path: &Path,
    config: EngineConfig,
    registry: Arc<TypeRegistry>,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let manager = Arc::new(SetManager::from_config(Arc::clone(&registry), &config)?);
    for summary in manager.summaries() {
        tracing::info!(
            set = %summary.name,
            type_name = summary.type_name,
            family = %summary.family,
            elements = summary.elements,
            "Set ready"
        );
    }

    let shutdown = Shutdown::new();
    let (control, control_task) =
        ControlPlane::spawn(manager, config.limits.queue_depth, shutdown.subscribe());

    let (watcher, mut updates) = ConfigWatcher::new(path, Arc::clone(&registry));
    let _watcher = watcher.run()?;

    let mut signals = Signals::new()?;
    loop {
        tokio::select! {
            event = signals.recv() => match event {
                SignalEvent::Shutdown => break,
                SignalEvent::Reload => reload_from_disk(path, &registry, &control).await,
            },
            Some(config) = updates.recv() => apply(&control, config).await,
        }
    }

    tracing::info!("Shutting down");
    shutdown.trigger();
    control_task.await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn reload_from_disk(path: &Path, registry: &TypeRegistry, control: &ControlHandle) {
    match load_config(path, registry) {
        Ok(config) => apply(control, config).await,
        Err(e) => {
            metrics::record_reload("invalid");
            tracing::error!(path = %path.display(), error = %e, "Reload skipped");
        }
    }
}

async fn apply(control: &ControlHandle, config: EngineConfig) {
    match control.reload(config).await {
        Ok(summary) => tracing::info!(
            created = ?summary.created,
            replaced = ?summary.replaced,
            removed = ?summary.removed,
            "Reload complete"
        ),
        Err(e) => tracing::error!(error = %e, "Reload rejected"),
    }
}
