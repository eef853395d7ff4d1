//! The map data bundle handed to the engine at load time

use std::path::Path;

use dig_core::{EntityStore, Find, LatLng, OverlayDescriptor, OverlayKind, Trench};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::DataError;

/// Trenches, finds, overlay descriptors, an optional explicit center and
/// the load error message, if loading failed part way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapData {
    pub trenches: Vec<Trench>,
    pub finds: Vec<Find>,
    pub layers: Vec<OverlayDescriptor>,
    pub center_lat: Option<f64>,
    pub center_lon: Option<f64>,
    /// Empty when loading succeeded
    pub error_message: String,
}

impl MapData {
    pub fn from_json_str(text: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let data = Self::from_json_str(&text)?;
        info!(
            path = %path.display(),
            trenches = data.trenches.len(),
            finds = data.finds.len(),
            layers = data.layers.len(),
            "map data loaded"
        );
        Ok(data)
    }

    /// Empty bundle that only carries an error message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error_message: message.into(),
            ..Self::default()
        }
    }

    pub fn error(&self) -> Option<&str> {
        Some(self.error_message.trim()).filter(|m| !m.is_empty())
    }

    /// Explicit center, else the first vertex of the first trench, else the
    /// first placed find, else `fallback`
    pub fn center(&self, fallback: LatLng) -> LatLng {
        if let (Some(lat), Some(lon)) = (self.center_lat, self.center_lon) {
            return LatLng::new(lat, lon);
        }
        self.trenches
            .first()
            .and_then(|t| t.vertices.first().copied())
            .or_else(|| self.finds.first().and_then(Find::position))
            .unwrap_or(fallback)
    }

    /// Number of overlays of one kind
    pub fn layer_count(&self, kind: OverlayKind) -> usize {
        self.layers.iter().filter(|l| l.kind == kind).count()
    }

    /// Split into the entity store and the overlay descriptors
    pub fn into_parts(self) -> (EntityStore, Vec<OverlayDescriptor>) {
        (EntityStore::new(self.trenches, self.finds), self.layers)
    }
}
