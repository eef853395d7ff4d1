//! Filter predicate set: text, date interval and depth interval
//!
//! Each predicate is total and matches when its own dimension is inactive.
//! [`FilterState::evaluate`] combines them into the set of entities the
//! filter wants on the map.

mod date;
mod depth;
mod text;

pub use date::{autoformat_date_input, parse_date_loose, DateRange};
pub use depth::{DepthExtent, DepthRange};
pub use text::{find_matches, tokenize, trench_matches};

use std::collections::BTreeSet;

use crate::model::{Find, FindId, TrenchId};
use crate::store::EntityStore;

/// Current filter inputs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    /// Raw text query as typed
    pub query: String,
    pub dates: DateRange,
    /// `None` while the depth slider is disengaged
    pub depth: Option<DepthRange>,
}

/// Why the filter produced the set it did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Nothing engaged, full view
    Idle,
    /// At least one entity matched
    Matched,
    /// Text-only query matched nothing, full view restored
    TextFallback,
    /// A date or depth filter is engaged and nothing matched
    Empty,
}

impl FilterOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOutcome::Idle => "idle",
            FilterOutcome::Matched => "matched",
            FilterOutcome::TextFallback => "text_fallback",
            FilterOutcome::Empty => "empty",
        }
    }
}

/// Entity ids that should be on the map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleSet {
    pub trenches: BTreeSet<TrenchId>,
    pub finds: BTreeSet<FindId>,
}

impl VisibleSet {
    /// Every entity in the store
    pub fn everything(store: &EntityStore) -> Self {
        Self {
            trenches: store.trenches().iter().map(|t| t.id).collect(),
            finds: store.finds().iter().map(|f| f.id).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.trenches.is_empty() && self.finds.is_empty()
    }
}

impl FilterState {
    pub fn has_text(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// Date or depth engaged
    pub fn has_hard_filter(&self) -> bool {
        self.dates.is_active() || self.depth.is_some()
    }

    pub fn is_idle(&self) -> bool {
        !self.has_text() && !self.has_hard_filter()
    }

    /// Date and depth predicates for one find
    fn find_in_ranges(&self, find: &Find) -> bool {
        if !self.dates.matches(find.found_at.as_deref()) {
            return false;
        }
        match self.depth {
            Some(range) => range.matches(find.depth()),
            None => true,
        }
    }

    /// Compute the filter-driven visible set.
    ///
    /// Trenches become visible by holding a matching find, or through their
    /// own text match when a text query is present. With only a date or
    /// depth filter engaged, a trench without matching finds stays hidden.
    pub fn evaluate(&self, store: &EntityStore) -> (VisibleSet, FilterOutcome) {
        if self.is_idle() {
            return (VisibleSet::everything(store), FilterOutcome::Idle);
        }

        let tokens = tokenize(&self.query);
        let mut visible = VisibleSet::default();

        for find in store.finds() {
            if self.find_in_ranges(find) && find_matches(find, &tokens) {
                visible.finds.insert(find.id);
                if let Some(trench_id) = find.trench_id {
                    visible.trenches.insert(trench_id);
                }
            }
        }

        if !tokens.is_empty() {
            for trench in store.trenches() {
                if trench_matches(trench, &tokens) {
                    visible.trenches.insert(trench.id);
                }
            }
        }

        if visible.is_empty() {
            if self.has_hard_filter() {
                return (visible, FilterOutcome::Empty);
            }
            return (VisibleSet::everything(store), FilterOutcome::TextFallback);
        }

        (visible, FilterOutcome::Matched)
    }
}
