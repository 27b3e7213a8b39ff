// holograms-core/src/bin/holo_probe.rs

use anyhow::{Context, Result};
use holograms_core::store::MemoryStore;
use holograms_core::{EngineConfig, HologramEngine, TracingActionExecutor};
use holograms_io::{ChannelTransport, EntityOp, Location, Viewer, ViewerRegistry};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    holograms_core::init_tracing();
    holograms_core::install_panic_hook();

    eprintln!("[holo_probe] starting… (Ctrl+C to exit)");

    let viewers = Arc::new(ViewerRegistry::new());
    let (transport, mut packets) = ChannelTransport::new(viewers.clone(), 1024);

    // Task: stand-in encoder, logs every entity operation it would put on the wire.
    tokio::spawn(async move {
        while let Some(packet) = packets.recv().await {
            let what = match &packet.op {
                EntityOp::Spawn(spawn) => format!("spawn {} {:?}", spawn.id, spawn.kind),
                EntityOp::Metadata { entity, metadata } => {
                    format!("meta {} {:?}", entity, metadata.custom_name)
                }
                EntityOp::Despawn(ids) => format!("despawn {:?}", ids),
                EntityOp::Teleport { entity, .. } => format!("teleport {}", entity),
            };
            tracing::info!(viewer = %packet.viewer, protocol = %packet.protocol, "{what}");
        }
        eprintln!("[holo_probe] encoder task ended");
    });

    let config = EngineConfig {
        watch_storage: false,
        ..EngineConfig::default()
    };
    let engine = HologramEngine::start(
        config,
        Arc::new(transport),
        viewers.clone(),
        Arc::new(TracingActionExecutor),
        Arc::new(MemoryStore::new()),
        viewers.subscribe(),
    )
    .await
    .context("HologramEngine::start failed")?;

    let spawn = Location::new("world", 0.0, 70.0, 0.0);
    let hologram = engine
        .registry
        .create("probe", spawn.clone())
        .context("creating probe hologram")?;
    if let Some(page) = hologram.page(0) {
        page.add_line("Welcome to the <#ANIM:typewriter>hologram probe</#ANIM>")?;
        page.add_line("#ICON:DIAMOND !ENCHANTED")?;
        page.add_line("#SMALLHEAD:PLAYER_HEAD (Notch)")?;
    }
    hologram.recalculate();

    // A viewer walks from far away, through the hologram, and out the other side.
    let walker = viewers.connect(Viewer::new("walker", spawn.offset(-80.0, 0.0, 0.0)));
    let mut step = tokio::time::interval(Duration::from_millis(250));

    for x in (-80..=80).step_by(4) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n[holo_probe] Ctrl+C received, exiting…");
                break;
            }
            _ = step.tick() => {
                viewers.move_to(walker, spawn.offset(f64::from(x), 0.0, 2.0));
            }
        }
    }

    viewers.disconnect(walker);
    tokio::time::sleep(Duration::from_millis(200)).await;
    engine.shutdown();
    Ok(())
}
