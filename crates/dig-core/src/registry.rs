//! Layer registry: one renderable layer per entity or overlay, plus its
//! current map membership.
//!
//! The registry is the only writer of entity layer membership. `show` and
//! `hide` are idempotent and only touch the surface when membership
//! actually changes.

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::model::{Bounds, LatLng};
use crate::surface::{LayerKey, LayerSpec, MapSurface};

#[derive(Debug)]
struct RegisteredLayer {
    spec: LayerSpec,
    shown: bool,
}

/// Layer handles keyed by [`LayerKey`]
pub struct LayerRegistry<S: MapSurface> {
    surface: S,
    layers: AHashMap<LayerKey, RegisteredLayer>,
}

impl<S: MapSurface> LayerRegistry<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            layers: AHashMap::new(),
        }
    }

    /// Create the layer on the surface and optionally put it on the map.
    /// Returns `false` (and changes nothing) if the key is already taken.
    pub fn register(&mut self, key: LayerKey, spec: LayerSpec, shown: bool) -> bool {
        if self.layers.contains_key(&key) {
            warn!(layer = %key, "layer already registered");
            return false;
        }

        self.surface.create_layer(&key, &spec);
        if shown {
            self.surface.add_layer(&key);
        }
        self.layers.insert(key, RegisteredLayer { spec, shown });
        true
    }

    pub fn is_registered(&self, key: &LayerKey) -> bool {
        self.layers.contains_key(key)
    }

    /// Current map membership; unknown keys are never shown
    pub fn is_shown(&self, key: &LayerKey) -> bool {
        self.layers.get(key).map(|l| l.shown).unwrap_or(false)
    }

    /// Put a layer on the map. Returns whether membership changed.
    pub fn show(&mut self, key: &LayerKey) -> bool {
        match self.layers.get_mut(key) {
            Some(layer) if !layer.shown => {
                layer.shown = true;
                self.surface.add_layer(key);
                true
            }
            Some(_) => false,
            None => {
                debug!(layer = %key, "show on unknown layer ignored");
                false
            }
        }
    }

    /// Take a layer off the map. Returns whether membership changed.
    pub fn hide(&mut self, key: &LayerKey) -> bool {
        match self.layers.get_mut(key) {
            Some(layer) if layer.shown => {
                layer.shown = false;
                self.surface.remove_layer(key);
                true
            }
            Some(_) => false,
            None => {
                debug!(layer = %key, "hide on unknown layer ignored");
                false
            }
        }
    }

    /// Show or hide depending on `visible`
    pub fn set_shown(&mut self, key: &LayerKey, visible: bool) -> bool {
        if visible {
            self.show(key)
        } else {
            self.hide(key)
        }
    }

    pub fn set_z_index(&mut self, key: &LayerKey, z_index: i32) {
        if self.layers.contains_key(key) {
            self.surface.set_z_index(key, z_index);
        }
    }

    pub fn set_opacity(&mut self, key: &LayerKey, opacity: f32) {
        if self.layers.contains_key(key) {
            self.surface.set_opacity(key, opacity);
        }
    }

    pub fn spec(&self, key: &LayerKey) -> Option<&LayerSpec> {
        self.layers.get(key).map(|l| &l.spec)
    }

    pub fn bounds(&self, key: &LayerKey) -> Option<Bounds> {
        self.spec(key).and_then(LayerSpec::bounds)
    }

    pub fn position(&self, key: &LayerKey) -> Option<LatLng> {
        self.spec(key).and_then(LayerSpec::position)
    }

    /// Number of registered layers currently on the map
    pub fn shown_count(&self) -> usize {
        self.layers.values().filter(|l| l.shown).count()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Viewport and popup calls go straight to the surface
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{PathStyle, RecordingSurface, SurfaceEffect};

    fn marker(lat: f64, lon: f64) -> LayerSpec {
        LayerSpec::CircleMarker {
            position: Some(LatLng::new(lat, lon)),
            radius: 5.0,
            style: PathStyle {
                color: "#888888".to_string(),
                fill_color: "#888888".to_string(),
                weight: 1.0,
                fill_opacity: 0.9,
            },
            popup: String::new(),
        }
    }

    fn add_count(registry: &LayerRegistry<RecordingSurface>, key: &LayerKey) -> usize {
        registry
            .surface()
            .effects()
            .iter()
            .filter(|e| matches!(e, SurfaceEffect::AddLayer { key: k } if k == key))
            .count()
    }

    #[test]
    fn test_show_is_idempotent() {
        let mut registry = LayerRegistry::new(RecordingSurface::new());
        let key = LayerKey::Find(1);
        registry.register(key.clone(), marker(1.0, 2.0), false);

        assert!(registry.show(&key));
        assert!(!registry.show(&key));
        assert!(registry.is_shown(&key));
        assert_eq!(add_count(&registry, &key), 1);
    }

    #[test]
    fn test_hide_already_hidden_is_noop() {
        let mut registry = LayerRegistry::new(RecordingSurface::new());
        let key = LayerKey::Find(1);
        registry.register(key.clone(), marker(1.0, 2.0), false);
        let before = registry.surface().effects().len();

        assert!(!registry.hide(&key));
        assert_eq!(registry.surface().effects().len(), before);
    }

    #[test]
    fn test_unknown_keys_are_silent() {
        let mut registry = LayerRegistry::new(RecordingSurface::new());
        let key = LayerKey::Trench(404);
        assert!(!registry.show(&key));
        assert!(!registry.hide(&key));
        assert!(!registry.is_shown(&key));
        assert!(registry.surface().effects().is_empty());
    }

    #[test]
    fn test_duplicate_register_rejected() {
        let mut registry = LayerRegistry::new(RecordingSurface::new());
        assert!(registry.register(LayerKey::Find(1), marker(1.0, 2.0), true));
        assert!(!registry.register(LayerKey::Find(1), marker(5.0, 5.0), true));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.position(&LayerKey::Find(1)), Some(LatLng::new(1.0, 2.0)));
    }
}
