//! # SCEEW
//!
//! An event-driven earthquake early-warning client for the Sichuan EEW push
//! feed.
//!
//! SCEEW keeps a WebSocket subscription alive, turns each warning report into
//! a local intensity estimate for one configured observer, and raises at most
//! one alert per earthquake: a display update, an audio cue, a notification
//! and a live S-wave countdown.
//!
//! ## Core Concepts
//!
//! - **FeedConnector**: Owns the WebSocket session, reconnecting forever and
//!   asking the feed to resend its latest report after every connect.
//! - **Pipeline**: Classifies each payload, estimates intensity, and lets the
//!   `AlertSession` decide whether this report starts a new alert.
//! - **Supervisor**: Every countdown and audio cue runs as a tracked task that
//!   can be aborted and whose panics stay contained.
//! - **Event-Driven**: Listeners subscribe to `SystemEvent`, `AlertEvent` and
//!   `TaskEvent` streams instead of reading engine state.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sceew::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SceewConfig::load(None)?;
//!     let engine = SceewEngine::new(config, Services::console());
//!
//!     let mut alerts = engine.subscribe_alert_events();
//!     tokio::spawn(async move {
//!         while let Ok(event) = alerts.recv().await {
//!             println!("Received Alert Event: {:?}", event);
//!         }
//!     });
//!
//!     // Runs until Ctrl+C.
//!     engine.run().await?;
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "SCEEW";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod estimate;
pub mod events;
pub mod feed;
pub mod logging;
pub mod services;
pub mod session;
pub mod time;

/// A prelude module for easy importing of the most common SCEEW types.
pub mod prelude {
    pub use crate::common::{GeoPoint, TaskId, TaskKind};
    pub use crate::config::{FeedConfig, ObserverConfig, SceewConfig};
    pub use crate::engine::{EngineHandle, SceewEngine};
    pub use crate::error::{Result, SceewError};
    pub use crate::estimate::{DerivedAlert, SeverityTier, SoundLevel};
    pub use crate::events::{AlertEvent, SystemEvent, TaskEvent};
    pub use crate::services::{ObserverSource, ObserverStore, Services};
    pub use crate::session::SessionSnapshot;
}
