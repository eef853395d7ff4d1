//! Core of the excavation map: entities, layer bookkeeping and the filter
//! reconciliation engine.
//!
//! Nothing here renders. The engine drives a [`MapSurface`] and everything
//! it does is observable through that trait.

pub mod command;
pub mod config;
pub mod engine;
pub mod events;
pub mod filter;
pub mod model;
pub mod overlay;
pub mod overrides;
pub mod registry;
pub mod store;
pub mod style;
pub mod surface;

use thiserror::Error;

// Re-export commonly used types
pub use command::Command;
pub use config::{CompositionMode, EngineConfig};
pub use engine::MapEngine;
pub use events::EventBus;
pub use filter::{FilterOutcome, FilterState, VisibleSet};
pub use model::{Bounds, Find, FindId, LatLng, OverlayDescriptor, OverlayKind, RawDepth, Trench, TrenchId};
pub use overrides::{VisibilityKey, VisibilityOverrides};
pub use registry::LayerRegistry;
pub use store::EntityStore;
pub use surface::{EffectSink, LayerKey, LayerSpec, MapSurface, RecordingSurface, SurfaceEffect};

/// Errors raised by engine operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown overlay: {0}")]
    UnknownOverlay(String),

    #[error("Overlay already listed: {0}")]
    DuplicateOverlay(String),

    #[error("Invalid overlay position {position} (list has {count})")]
    InvalidPosition { position: usize, count: usize },

    #[error("Overlay order must name every overlay exactly once")]
    OrderMismatch,

    #[error("Malformed command: {0}")]
    MalformedCommand(#[from] serde_json::Error),
}
