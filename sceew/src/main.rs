use anyhow::{Context, Result};
use sceew::prelude::*;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration. An optional first argument names the TOML file.
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = SceewConfig::load(path.as_deref()).context("failed to load configuration")?;

    // 2. Initialize structured logging.
    sceew::logging::init(&config.logging)?;
    info!("{} v{}", sceew::ENGINE_NAME, sceew::VERSION);
    info!(
        observer = %config.observer.name,
        lat = config.observer.latitude,
        lon = config.observer.longitude,
        "observer loaded"
    );

    // 3. Create the engine with console output.
    let engine = SceewEngine::new(config, Services::console());

    // 4. Log the event streams.
    spawn_event_listeners(&engine);

    // 5. Run the engine until Ctrl+C.
    engine.run().await?;

    Ok(())
}

/// Spawns one task per event stream, each logging what it receives.
fn spawn_event_listeners(engine: &SceewEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut alert_rx = engine.subscribe_alert_events();
    tokio::spawn(async move {
        while let Ok(event) = alert_rx.recv().await {
            info!("[ALERT] => {:?}", event);
        }
    });

    let mut task_rx = engine.subscribe_task_events();
    tokio::spawn(async move {
        while let Ok(event) = task_rx.recv().await {
            if event.kind() != TaskKind::ClockPanel {
                info!("[TASK] => {:?}", event);
            }
        }
    });
}
