pub mod action;
pub mod animation;
pub mod condition;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod hologram;
pub mod registry;
pub mod render;
pub mod services;
pub mod store;
pub mod ticker;
pub mod visibility;

// Re-export the main struct so users can just use `holograms_core::HologramEngine`
pub use engine::HologramEngine;

pub use action::{Action, ActionExecutor, ActionList, TracingActionExecutor};
pub use condition::{Condition, ConditionHolder, Requirement, ViewerContext};
pub use config::EngineConfig;
pub use error::HologramError;
pub use hologram::{Hologram, HologramSettings, Lifecycle, Line, Page};
pub use registry::HologramRegistry;
pub use render::{Delivery, LineType};
pub use services::Services;
pub use ticker::{TickContext, TickHandle, Ticked, Ticker};

/// Installs the `tracing` subscriber used by binaries.
/// `RUST_LOG` wins; otherwise everything logs at `info`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .compact()
        .try_init();
}

/// Routes panics through `tracing` so they land next to the tick logs.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("<non-string panic payload>");

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "<unknown>".to_string());

        tracing::error!(%location, %payload, "panic");
    }));
}
