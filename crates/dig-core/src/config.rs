//! Engine settings

use serde::{Deserialize, Serialize};

use crate::model::LatLng;

/// How host overrides and the local filter share the visibility surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    /// Filter and override passes each write membership; the latest pass wins
    #[default]
    LastWriteWins,
    /// Both feed one reducer: visible = filter match AND override
    Intersect,
}

/// Viewport, stacking and composition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_zoom: u8,
    pub find_focus_zoom: u8,
    /// Padding in pixels when fitting trench/find bounds
    pub fit_padding: u32,
    /// Padding in pixels when fitting the first image overlay
    pub image_fit_padding: u32,
    pub default_center: LatLng,
    pub overlay_z_base: i32,
    pub image_overlay_opacity: f32,
    pub composition: CompositionMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_zoom: 17,
            find_focus_zoom: 19,
            fit_padding: 30,
            image_fit_padding: 20,
            default_center: LatLng::new(37.0, 32.0),
            overlay_z_base: 100,
            image_overlay_opacity: 0.8,
            composition: CompositionMode::LastWriteWins,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"composition": "intersect", "initial_zoom": 15}"#).unwrap();
        assert_eq!(config.composition, CompositionMode::Intersect);
        assert_eq!(config.initial_zoom, 15);
        assert_eq!(config.find_focus_zoom, 19);
        assert_eq!(config.overlay_z_base, 100);
    }
}
