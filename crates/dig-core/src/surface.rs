//! Map surface abstraction
//!
//! The core never renders. Everything it does to the map goes through
//! [`MapSurface`]: layer creation, membership, stacking, opacity and
//! viewport changes.

use std::fmt;

use serde::Serialize;

use crate::model::{Bounds, FindId, LatLng, TrenchId};

/// Identity of a layer on the map
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum LayerKey {
    Trench(TrenchId),
    Find(FindId),
    Overlay(String),
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerKey::Trench(id) => write!(f, "trench_{}", id),
            LayerKey::Find(id) => write!(f, "find_{}", id),
            LayerKey::Overlay(name) => write!(f, "overlay:{}", name),
        }
    }
}

/// Stroke and fill for vector shapes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathStyle {
    pub color: String,
    pub fill_color: String,
    pub weight: f32,
    pub fill_opacity: f32,
}

/// Everything a surface needs to build a layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Polygon {
        vertices: Vec<LatLng>,
        style: PathStyle,
        popup: String,
    },
    CircleMarker {
        position: Option<LatLng>,
        radius: f32,
        style: PathStyle,
        popup: String,
    },
    Tile {
        url_template: String,
        attribution: String,
        max_native_zoom: Option<u8>,
    },
    Image {
        url: String,
        bounds: Bounds,
        opacity: f32,
    },
    Vector {
        data: serde_json::Value,
        bounds: Option<Bounds>,
    },
}

impl LayerSpec {
    /// Geographic extent, if the layer has one
    pub fn bounds(&self) -> Option<Bounds> {
        match self {
            LayerSpec::Polygon { vertices, .. } => Bounds::from_points(vertices),
            LayerSpec::CircleMarker { position, .. } => position.map(Bounds::from_point),
            LayerSpec::Tile { .. } => None,
            LayerSpec::Image { bounds, .. } => Some(*bounds),
            LayerSpec::Vector { bounds, .. } => *bounds,
        }
    }

    /// Anchor point for point layers
    pub fn position(&self) -> Option<LatLng> {
        match self {
            LayerSpec::CircleMarker { position, .. } => *position,
            _ => None,
        }
    }
}

/// Rendering backend the core drives
pub trait MapSurface: Send {
    /// Build a layer without adding it to the map
    fn create_layer(&mut self, key: &LayerKey, spec: &LayerSpec);

    fn add_layer(&mut self, key: &LayerKey);

    fn remove_layer(&mut self, key: &LayerKey);

    fn set_z_index(&mut self, key: &LayerKey, z_index: i32);

    fn set_opacity(&mut self, key: &LayerKey, opacity: f32);

    fn fit_bounds(&mut self, bounds: Bounds, padding: u32);

    fn set_view(&mut self, center: LatLng, zoom: u8);

    /// Open the popup bound to a layer
    fn open_popup(&mut self, key: &LayerKey);

    /// Open a free-standing popup
    fn open_popup_at(&mut self, at: LatLng, content: &str);
}

/// One surface call, as data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SurfaceEffect {
    CreateLayer { key: LayerKey, spec: LayerSpec },
    AddLayer { key: LayerKey },
    RemoveLayer { key: LayerKey },
    SetZIndex { key: LayerKey, z_index: i32 },
    SetOpacity { key: LayerKey, opacity: f32 },
    FitBounds { bounds: Bounds, padding: u32 },
    SetView { center: LatLng, zoom: u8 },
    OpenPopup { key: LayerKey },
    OpenPopupAt { at: LatLng, content: String },
}

/// Forward every call to a sink as a [`SurfaceEffect`]
pub trait EffectSink: Send {
    fn emit(&mut self, effect: SurfaceEffect);
}

impl<T: EffectSink> MapSurface for T {
    fn create_layer(&mut self, key: &LayerKey, spec: &LayerSpec) {
        self.emit(SurfaceEffect::CreateLayer { key: key.clone(), spec: spec.clone() });
    }

    fn add_layer(&mut self, key: &LayerKey) {
        self.emit(SurfaceEffect::AddLayer { key: key.clone() });
    }

    fn remove_layer(&mut self, key: &LayerKey) {
        self.emit(SurfaceEffect::RemoveLayer { key: key.clone() });
    }

    fn set_z_index(&mut self, key: &LayerKey, z_index: i32) {
        self.emit(SurfaceEffect::SetZIndex { key: key.clone(), z_index });
    }

    fn set_opacity(&mut self, key: &LayerKey, opacity: f32) {
        self.emit(SurfaceEffect::SetOpacity { key: key.clone(), opacity });
    }

    fn fit_bounds(&mut self, bounds: Bounds, padding: u32) {
        self.emit(SurfaceEffect::FitBounds { bounds, padding });
    }

    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.emit(SurfaceEffect::SetView { center, zoom });
    }

    fn open_popup(&mut self, key: &LayerKey) {
        self.emit(SurfaceEffect::OpenPopup { key: key.clone() });
    }

    fn open_popup_at(&mut self, at: LatLng, content: &str) {
        self.emit(SurfaceEffect::OpenPopupAt { at, content: content.to_string() });
    }
}

/// In-memory surface that records every call
#[derive(Debug, Default)]
pub struct RecordingSurface {
    effects: Vec<SurfaceEffect>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn effects(&self) -> &[SurfaceEffect] {
        &self.effects
    }

    /// Drain recorded effects
    pub fn take(&mut self) -> Vec<SurfaceEffect> {
        std::mem::take(&mut self.effects)
    }
}

impl EffectSink for RecordingSurface {
    fn emit(&mut self, effect: SurfaceEffect) {
        self.effects.push(effect);
    }
}
