//! Reconciliation engine
//!
//! Owns the entity store, the layer registry, the override channel, the
//! filter state and the overlay list. Every trigger runs to completion
//! before the next one is handled; recomputation is a pure function of the
//! current filter and override state, never of prior visibility.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{CompositionMode, EngineConfig};
use crate::events::events::{FilterApplied, OverlayAdded, OverlayFailed, OverridesApplied};
use crate::events::EventBus;
use crate::filter::{DateRange, DepthExtent, DepthRange, FilterOutcome, FilterState, VisibleSet};
use crate::model::{Bounds, FindId, LatLng, OverlayDescriptor, OverlayKind, TrenchId};
use crate::overlay::{parse_zoom_range, OverlayEntry, OverlayStack};
use crate::overrides::{OverrideSummary, VisibilityKey, VisibilityOverrides};
use crate::registry::LayerRegistry;
use crate::store::EntityStore;
use crate::style::{self, DepthColorScale};
use crate::surface::{LayerKey, LayerSpec, MapSurface};
use crate::CoreError;

/// The map session: filter reconciliation plus overlay management
pub struct MapEngine<S: MapSurface> {
    store: EntityStore,
    registry: LayerRegistry<S>,
    overrides: VisibilityOverrides,
    filter: FilterState,
    depth_extent: Option<DepthExtent>,
    overlays: OverlayStack,
    first_image_bounds: Option<Bounds>,
    config: EngineConfig,
    events: Arc<EventBus>,
}

impl<S: MapSurface> MapEngine<S> {
    /// Register one layer per trench and find, all shown
    pub fn new(store: EntityStore, surface: S, config: EngineConfig) -> Self {
        let depth_extent = store.depth_extent();
        let scale = DepthColorScale::new(depth_extent);
        let mut registry = LayerRegistry::new(surface);

        for trench in store.trenches() {
            registry.register(LayerKey::Trench(trench.id), style::trench_layer(trench), true);
        }
        for find in store.finds() {
            registry.register(LayerKey::Find(find.id), style::find_layer(find, &scale), true);
        }

        info!(
            trenches = store.trenches().len(),
            finds = store.finds().len(),
            depth_filter = depth_extent.is_some(),
            "entity layers registered"
        );

        Self {
            store,
            registry,
            overrides: VisibilityOverrides::new(),
            filter: FilterState::default(),
            depth_extent,
            overlays: OverlayStack::new(),
            first_image_bounds: None,
            config,
            events: Arc::new(EventBus::new()),
        }
    }

    // ------------------------------------------------------------------
    // Load time
    // ------------------------------------------------------------------

    /// Register tile and image overlays in list order. Vector descriptors
    /// are returned for asynchronous fetching.
    pub fn load_overlays(&mut self, descriptors: &[OverlayDescriptor]) -> Vec<OverlayDescriptor> {
        let mut pending = Vec::new();

        for descriptor in descriptors {
            let attribution = descriptor.attribution.clone().unwrap_or_default();
            match descriptor.kind {
                OverlayKind::Tile => {
                    let Some(url) = descriptor.url_template.as_deref().filter(|u| !u.is_empty()) else {
                        debug!(overlay = %descriptor.name, "tile overlay without url template skipped");
                        continue;
                    };
                    let spec = LayerSpec::Tile {
                        url_template: url.to_string(),
                        attribution,
                        max_native_zoom: parse_zoom_range(url).map(|(_, max)| max),
                    };
                    self.add_overlay(&descriptor.name, OverlayKind::Tile, spec, 1.0);
                }
                OverlayKind::Image => {
                    let url = descriptor.file_url.as_deref().filter(|u| !u.is_empty());
                    let (Some(url), Some(bounds)) = (url, descriptor.bounds()) else {
                        debug!(overlay = %descriptor.name, "image overlay without file or bounds skipped");
                        continue;
                    };
                    let opacity = self.config.image_overlay_opacity;
                    let spec = LayerSpec::Image {
                        url: url.to_string(),
                        bounds,
                        opacity,
                    };
                    if self.add_overlay(&descriptor.name, OverlayKind::Image, spec, opacity) {
                        self.first_image_bounds.get_or_insert(bounds);
                    }
                }
                OverlayKind::Vector => {
                    if descriptor.file_url.as_deref().map_or(true, str::is_empty) {
                        debug!(overlay = %descriptor.name, "vector overlay without file skipped");
                        continue;
                    }
                    pending.push(descriptor.clone());
                }
            }
        }

        self.apply_overlay_order();
        pending
    }

    /// Initial viewport: center and zoom, then the first image overlay's
    /// extent, then the load error popup if there is one.
    pub fn open_view(&mut self, center: LatLng, error_message: Option<&str>) {
        let zoom = self.config.initial_zoom;
        let image_padding = self.config.image_fit_padding;
        let first_image = self.first_image_bounds;
        let surface = self.registry.surface_mut();

        surface.set_view(center, zoom);
        if let Some(bounds) = first_image {
            surface.fit_bounds(bounds, image_padding);
        }
        if let Some(message) = error_message.map(str::trim).filter(|m| !m.is_empty()) {
            surface.open_popup_at(center, &format!("Error loading map data: {}", message));
        }
    }

    /// A vector overlay finished loading: append it and restack
    pub fn vector_loaded(&mut self, name: &str, data: serde_json::Value, bounds: Option<Bounds>) {
        let spec = LayerSpec::Vector { data, bounds };
        if self.add_overlay(name, OverlayKind::Vector, spec, 1.0) {
            self.apply_overlay_order();
        }
    }

    /// A vector overlay failed to load; it is never retried
    pub fn vector_failed(&mut self, name: &str, error: &str) {
        warn!(overlay = %name, error = %error, "vector overlay could not be loaded");
        self.events.publish(OverlayFailed {
            name: name.to_string(),
            error: error.to_string(),
        });
    }

    fn add_overlay(&mut self, name: &str, kind: OverlayKind, spec: LayerSpec, opacity: f32) -> bool {
        let entry = OverlayEntry {
            name: name.to_string(),
            kind,
            opacity,
        };
        if let Err(e) = self.overlays.push(entry) {
            warn!(error = %e, "overlay skipped");
            return false;
        }

        self.registry.register(LayerKey::Overlay(name.to_string()), spec, true);
        self.events.publish(OverlayAdded {
            name: name.to_string(),
            kind,
            position: self.overlays.len() - 1,
        });
        true
    }

    // ------------------------------------------------------------------
    // Filter triggers
    // ------------------------------------------------------------------

    /// Text input changed
    pub fn on_text_changed(&mut self, query: &str) -> FilterOutcome {
        self.filter.query = query.to_string();
        self.reconcile()
    }

    /// UI-facing filter entry point; date and depth come from current state.
    /// Safe to call on every keystroke.
    pub fn apply_filter(&mut self, query: &str) -> FilterOutcome {
        self.on_text_changed(query)
    }

    /// Date inputs committed; a bound that does not parse stays open
    pub fn on_date_committed(&mut self, from: Option<&str>, to: Option<&str>) -> FilterOutcome {
        self.filter.dates = DateRange::from_inputs(from, to);
        self.reconcile()
    }

    pub fn clear_dates(&mut self) -> FilterOutcome {
        self.filter.dates = DateRange::default();
        self.reconcile()
    }

    /// Depth slider moved. Ignored when no find has a numeric depth.
    pub fn on_depth_changed(&mut self, from: Option<f64>, to: Option<f64>) -> FilterOutcome {
        match self.depth_extent {
            Some(extent) => self.filter.depth = Some(DepthRange::from_inputs(from, to, extent)),
            None => debug!("no numeric depths loaded, depth filter disabled"),
        }
        self.reconcile()
    }

    pub fn clear_depth(&mut self) -> FilterOutcome {
        self.filter.depth = None;
        self.reconcile()
    }

    /// Filter-driven visibility under the configured composition mode
    pub fn effective_visibility(&self) -> (VisibleSet, FilterOutcome) {
        let (mut visible, outcome) = self.filter.evaluate(&self.store);
        if self.config.composition == CompositionMode::Intersect {
            visible.trenches.retain(|id| self.overrides.trench_visible(*id));
            visible.finds.retain(|id| self.overrides.find_visible(*id));
        }
        (visible, outcome)
    }

    /// Recompute the visible set and bring map membership in line with it
    pub fn reconcile(&mut self) -> FilterOutcome {
        let (visible, outcome) = self.effective_visibility();
        self.apply_visible_set(&visible);

        debug!(
            query = %self.filter.query,
            outcome = outcome.as_str(),
            trenches = visible.trenches.len(),
            finds = visible.finds.len(),
            "filter applied"
        );
        self.events.publish(FilterApplied {
            query: self.filter.query.clone(),
            outcome: outcome.as_str(),
            visible_trenches: visible.trenches.len(),
            visible_finds: visible.finds.len(),
        });
        outcome
    }

    fn apply_visible_set(&mut self, visible: &VisibleSet) {
        for trench in self.store.trenches() {
            self.registry
                .set_shown(&LayerKey::Trench(trench.id), visible.trenches.contains(&trench.id));
        }
        for find in self.store.finds() {
            self.registry
                .set_shown(&LayerKey::Find(find.id), visible.finds.contains(&find.id));
        }
    }

    // ------------------------------------------------------------------
    // Host overrides
    // ------------------------------------------------------------------

    /// Host pushed a visibility setting for a group or entity key
    pub fn set_layer_visibility(&mut self, key: &str, visible: bool) -> OverrideSummary {
        let key = VisibilityKey::parse(key);
        if let Some(layer) = key.layer_key() {
            if !self.registry.is_registered(&layer) {
                debug!(key = %key, "visibility override for unknown entity");
            }
        }
        self.overrides.set(&key, visible);
        self.apply_overrides()
    }

    /// Override pass. In last-write-wins mode this looks only at override
    /// state; in intersect mode it runs the combined reducer.
    pub fn apply_overrides(&mut self) -> OverrideSummary {
        let summary = match self.config.composition {
            CompositionMode::LastWriteWins => {
                self.overrides.apply_to(&self.store, &mut self.registry)
            }
            CompositionMode::Intersect => {
                let (visible, _) = self.effective_visibility();
                self.apply_visible_set(&visible);
                OverrideSummary {
                    visible_trenches: visible.trenches.len(),
                    visible_finds: visible.finds.len(),
                }
            }
        };

        self.events.publish(OverridesApplied {
            visible_trenches: summary.visible_trenches,
            visible_finds: summary.visible_finds,
        });
        summary
    }

    // ------------------------------------------------------------------
    // Focus
    // ------------------------------------------------------------------

    /// Fit to a trench and open its popup; unknown ids do nothing
    pub fn focus_on_trench(&mut self, id: TrenchId) {
        let key = LayerKey::Trench(id);
        let Some(bounds) = self.registry.bounds(&key) else {
            debug!(trench = id, "focus on unknown or empty trench ignored");
            return;
        };
        let padding = self.config.fit_padding;
        let surface = self.registry.surface_mut();
        surface.fit_bounds(bounds, padding);
        surface.open_popup(&key);
    }

    /// Center on a find and open its popup; unknown ids do nothing
    pub fn focus_on_find(&mut self, id: FindId) {
        let key = LayerKey::Find(id);
        let Some(position) = self.registry.position(&key) else {
            debug!(find = id, "focus on unknown or unplaced find ignored");
            return;
        };
        let zoom = self.config.find_focus_zoom;
        let surface = self.registry.surface_mut();
        surface.set_view(position, zoom);
        surface.open_popup(&key);
    }

    pub fn focus_on_all_trenches(&mut self) {
        let bounds = self
            .store
            .trenches()
            .iter()
            .filter_map(|t| self.registry.bounds(&LayerKey::Trench(t.id)))
            .reduce(Bounds::union);
        self.fit_to(bounds);
    }

    pub fn focus_on_all_finds(&mut self) {
        let bounds = self
            .store
            .finds()
            .iter()
            .filter_map(|f| self.registry.bounds(&LayerKey::Find(f.id)))
            .reduce(Bounds::union);
        self.fit_to(bounds);
    }

    fn fit_to(&mut self, bounds: Option<Bounds>) {
        if let Some(bounds) = bounds {
            let padding = self.config.fit_padding;
            self.registry.surface_mut().fit_bounds(bounds, padding);
        }
    }

    // ------------------------------------------------------------------
    // Overlays
    // ------------------------------------------------------------------

    /// Toggle an overlay; showing it restacks the list
    pub fn set_overlay_shown(&mut self, name: &str, shown: bool) -> Result<(), CoreError> {
        if self.overlays.get(name).is_none() {
            return Err(CoreError::UnknownOverlay(name.to_string()));
        }

        let key = LayerKey::Overlay(name.to_string());
        if shown {
            self.registry.show(&key);
            self.apply_overlay_order();
        } else {
            self.registry.hide(&key);
        }
        Ok(())
    }

    /// Applies to this overlay only
    pub fn set_overlay_opacity(&mut self, name: &str, opacity: f32) -> Result<(), CoreError> {
        let opacity = self.overlays.set_opacity(name, opacity)?;
        self.registry.set_opacity(&LayerKey::Overlay(name.to_string()), opacity);
        Ok(())
    }

    pub fn move_overlay(&mut self, name: &str, position: usize) -> Result<(), CoreError> {
        self.overlays.move_to(name, position)?;
        self.apply_overlay_order();
        Ok(())
    }

    pub fn set_overlay_order(&mut self, names: &[String]) -> Result<(), CoreError> {
        self.overlays.set_order(names)?;
        self.apply_overlay_order();
        Ok(())
    }

    /// Push list order to the surface as z-indices for shown overlays
    pub fn apply_overlay_order(&mut self) {
        let registry = &self.registry;
        let z_indices = self.overlays.z_indices(self.config.overlay_z_base, |name| {
            registry.is_shown(&LayerKey::Overlay(name.to_string()))
        });

        for (name, z_index) in z_indices {
            self.registry.set_z_index(&LayerKey::Overlay(name), z_index);
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn registry(&self) -> &LayerRegistry<S> {
        &self.registry
    }

    pub fn is_shown(&self, key: &LayerKey) -> bool {
        self.registry.is_shown(key)
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn overrides(&self) -> &VisibilityOverrides {
        &self.overrides
    }

    pub fn overlays(&self) -> &OverlayStack {
        &self.overlays
    }

    pub fn depth_extent(&self) -> Option<DepthExtent> {
        self.depth_extent
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn surface(&self) -> &S {
        self.registry.surface()
    }

    pub fn surface_mut(&mut self) -> &mut S {
        self.registry.surface_mut()
    }
}
