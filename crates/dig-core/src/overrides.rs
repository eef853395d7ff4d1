//! Host-pushed visibility overrides
//!
//! Keys are either group keys (`group_trenches`, `group_finds`) or
//! per-entity keys (`trench_<id>`, `find_<id>`). A missing key means visible.

use std::fmt;

use ahash::AHashMap;

use crate::model::{FindId, TrenchId};
use crate::registry::LayerRegistry;
use crate::store::EntityStore;
use crate::surface::{LayerKey, MapSurface};

pub const GROUP_TRENCHES: &str = "group_trenches";
pub const GROUP_FINDS: &str = "group_finds";

/// Parsed form of an override key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityKey {
    GroupTrenches,
    GroupFinds,
    Trench(TrenchId),
    Find(FindId),
    /// Anything else; stored but never consulted
    Other(String),
}

impl VisibilityKey {
    pub fn parse(raw: &str) -> Self {
        match raw {
            GROUP_TRENCHES => return VisibilityKey::GroupTrenches,
            GROUP_FINDS => return VisibilityKey::GroupFinds,
            _ => {}
        }

        if let Some(id) = raw.strip_prefix("trench_").and_then(canonical_id) {
            return VisibilityKey::Trench(id);
        }
        if let Some(id) = raw.strip_prefix("find_").and_then(canonical_id) {
            return VisibilityKey::Find(id);
        }
        VisibilityKey::Other(raw.to_string())
    }

    /// Entity layer this key addresses directly, if any
    pub fn layer_key(&self) -> Option<LayerKey> {
        match self {
            VisibilityKey::Trench(id) => Some(LayerKey::Trench(*id)),
            VisibilityKey::Find(id) => Some(LayerKey::Find(*id)),
            _ => None,
        }
    }
}

/// Ids must be written exactly as the host formats them: `7`, never `007`
/// or `+7`
fn canonical_id(digits: &str) -> Option<i64> {
    let id: i64 = digits.parse().ok()?;
    (id.to_string() == digits).then_some(id)
}

impl fmt::Display for VisibilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisibilityKey::GroupTrenches => f.write_str(GROUP_TRENCHES),
            VisibilityKey::GroupFinds => f.write_str(GROUP_FINDS),
            VisibilityKey::Trench(id) => write!(f, "trench_{}", id),
            VisibilityKey::Find(id) => write!(f, "find_{}", id),
            VisibilityKey::Other(raw) => f.write_str(raw),
        }
    }
}

/// Visible/hidden settings pushed by the host
#[derive(Debug, Clone, Default)]
pub struct VisibilityOverrides {
    settings: AHashMap<String, bool>,
}

/// Counts after an override pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrideSummary {
    pub visible_trenches: usize,
    pub visible_finds: usize,
}

impl VisibilityOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a setting under the key's canonical text
    pub fn set(&mut self, key: &VisibilityKey, visible: bool) {
        self.settings.insert(key.to_string(), visible);
    }

    /// Stored value, defaulting to visible
    pub fn get(&self, key: &VisibilityKey) -> bool {
        self.settings.get(&key.to_string()).copied().unwrap_or(true)
    }

    pub fn trench_visible(&self, id: TrenchId) -> bool {
        self.get(&VisibilityKey::GroupTrenches) && self.get(&VisibilityKey::Trench(id))
    }

    pub fn find_visible(&self, id: FindId) -> bool {
        self.get(&VisibilityKey::GroupFinds) && self.get(&VisibilityKey::Find(id))
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// Override pass: show or hide every entity layer from override state
    /// alone, without looking at any filter.
    pub fn apply_to<S: MapSurface>(
        &self,
        store: &EntityStore,
        registry: &mut LayerRegistry<S>,
    ) -> OverrideSummary {
        let mut summary = OverrideSummary::default();

        for trench in store.trenches() {
            let visible = self.trench_visible(trench.id);
            registry.set_shown(&LayerKey::Trench(trench.id), visible);
            summary.visible_trenches += visible as usize;
        }

        for find in store.finds() {
            let visible = self.find_visible(find.id);
            registry.set_shown(&LayerKey::Find(find.id), visible);
            summary.visible_finds += visible as usize;
        }

        summary
    }
}
