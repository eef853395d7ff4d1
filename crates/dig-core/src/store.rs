//! Immutable, load-time snapshot of trench and find records

use ahash::AHashMap;
use tracing::warn;

use crate::filter::DepthExtent;
use crate::model::{Find, FindId, Trench, TrenchId};

/// Entity store with O(1) id lookups
#[derive(Debug, Default)]
pub struct EntityStore {
    trenches: Vec<Trench>,
    finds: Vec<Find>,
    trench_index: AHashMap<TrenchId, usize>,
    find_index: AHashMap<FindId, usize>,
}

impl EntityStore {
    /// Build the store, keeping the first record for any repeated id
    pub fn new(trenches: Vec<Trench>, finds: Vec<Find>) -> Self {
        let mut store = Self::default();

        for trench in trenches {
            if store.trench_index.contains_key(&trench.id) {
                warn!(id = trench.id, "duplicate trench id ignored");
                continue;
            }
            store.trench_index.insert(trench.id, store.trenches.len());
            store.trenches.push(trench);
        }

        for find in finds {
            if store.find_index.contains_key(&find.id) {
                warn!(id = find.id, "duplicate find id ignored");
                continue;
            }
            store.find_index.insert(find.id, store.finds.len());
            store.finds.push(find);
        }

        store
    }

    /// All trenches in load order
    pub fn trenches(&self) -> &[Trench] {
        &self.trenches
    }

    /// All finds in load order
    pub fn finds(&self) -> &[Find] {
        &self.finds
    }

    pub fn trench(&self, id: TrenchId) -> Option<&Trench> {
        self.trench_index.get(&id).map(|&idx| &self.trenches[idx])
    }

    pub fn find(&self, id: FindId) -> Option<&Find> {
        self.find_index.get(&id).map(|&idx| &self.finds[idx])
    }

    /// Trench a find belongs to; null and dangling references both yield `None`
    pub fn trench_of(&self, find: &Find) -> Option<&Trench> {
        find.trench_id.and_then(|id| self.trench(id))
    }

    /// Observed min/max of numeric find depths
    pub fn depth_extent(&self) -> Option<DepthExtent> {
        DepthExtent::observe(self.finds.iter().map(Find::depth))
    }

    pub fn is_empty(&self) -> bool {
        self.trenches.is_empty() && self.finds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawDepth;

    fn trench(id: TrenchId, code: &str) -> Trench {
        Trench {
            id,
            code: code.to_string(),
            name: None,
            project: None,
            description: None,
            vertices: Vec::new(),
        }
    }

    fn find(id: FindId, trench_id: Option<TrenchId>, z: Option<RawDepth>) -> Find {
        Find {
            id,
            code: format!("F-{}", id),
            description: None,
            z,
            found_at: None,
            trench_id,
            trench_code: None,
            trench_name: None,
            level_name: None,
            lat: None,
            lon: None,
        }
    }

    #[test]
    fn test_dangling_trench_reference() {
        let store = EntityStore::new(
            vec![trench(10, "B2")],
            vec![find(1, Some(10), None), find(2, Some(99), None), find(3, None, None)],
        );

        assert_eq!(store.trench_of(store.find(1).unwrap()).map(|t| t.id), Some(10));
        assert!(store.trench_of(store.find(2).unwrap()).is_none());
        assert!(store.trench_of(store.find(3).unwrap()).is_none());
        assert!(store.find(42).is_none());
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let store = EntityStore::new(vec![trench(1, "A"), trench(1, "B")], Vec::new());
        assert_eq!(store.trenches().len(), 1);
        assert_eq!(store.trench(1).unwrap().code, "A");
    }

    #[test]
    fn test_depth_extent_skips_non_numeric() {
        let store = EntityStore::new(
            Vec::new(),
            vec![
                find(1, None, Some(RawDepth::Number(1.2))),
                find(2, None, Some(RawDepth::Text("n/a".to_string()))),
                find(3, None, Some(RawDepth::Number(0.3))),
            ],
        );
        let extent = store.depth_extent().unwrap();
        assert_eq!((extent.min, extent.max), (0.3, 1.2));

        let empty = EntityStore::new(Vec::new(), vec![find(1, None, None)]);
        assert!(empty.depth_extent().is_none());
    }
}
