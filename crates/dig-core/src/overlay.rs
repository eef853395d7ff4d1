//! Overlay ordering and opacity
//!
//! Overlays (tile, image, vector) live in a user-ordered list. Position 0 is
//! the top of the list and renders frontmost.

use indexmap::IndexMap;

use crate::model::OverlayKind;
use crate::CoreError;

/// One entry of the overlay list
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayEntry {
    pub name: String,
    pub kind: OverlayKind,
    pub opacity: f32,
}

/// Ordered overlay list keyed by display name
#[derive(Debug, Clone, Default)]
pub struct OverlayStack {
    entries: IndexMap<String, OverlayEntry>,
}

impl OverlayStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the bottom of the list
    pub fn push(&mut self, entry: OverlayEntry) -> Result<(), CoreError> {
        if self.entries.contains_key(&entry.name) {
            return Err(CoreError::DuplicateOverlay(entry.name));
        }
        self.entries.insert(entry.name.clone(), entry);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&OverlayEntry> {
        self.entries.get(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.get_index_of(name)
    }

    /// Names from top to bottom
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a new opacity, clamped to `0.0..=1.0`
    pub fn set_opacity(&mut self, name: &str, opacity: f32) -> Result<f32, CoreError> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| CoreError::UnknownOverlay(name.to_string()))?;
        entry.opacity = opacity.clamp(0.0, 1.0);
        Ok(entry.opacity)
    }

    /// Move one overlay to a new list position
    pub fn move_to(&mut self, name: &str, position: usize) -> Result<(), CoreError> {
        let from = self
            .position(name)
            .ok_or_else(|| CoreError::UnknownOverlay(name.to_string()))?;
        if position >= self.entries.len() {
            return Err(CoreError::InvalidPosition {
                position,
                count: self.entries.len(),
            });
        }
        self.entries.move_index(from, position);
        Ok(())
    }

    /// Replace the whole order; `names` must list every overlay exactly once
    pub fn set_order(&mut self, names: &[String]) -> Result<(), CoreError> {
        if names.len() != self.entries.len() {
            return Err(CoreError::OrderMismatch);
        }

        let mut reordered = IndexMap::with_capacity(names.len());
        for name in names {
            let entry = self
                .entries
                .get(name)
                .ok_or_else(|| CoreError::UnknownOverlay(name.clone()))?;
            if reordered.insert(name.clone(), entry.clone()).is_some() {
                return Err(CoreError::OrderMismatch);
            }
        }
        self.entries = reordered;
        Ok(())
    }

    /// Z-index for every shown overlay: `base + (count - 1 - position)`.
    /// Hidden overlays keep their slot in the count but get no z-index.
    pub fn z_indices<F>(&self, base: i32, is_shown: F) -> Vec<(String, i32)>
    where
        F: Fn(&str) -> bool,
    {
        let count = self.entries.len() as i32;
        self.entries
            .keys()
            .enumerate()
            .filter(|(_, name)| is_shown(name.as_str()))
            .map(|(position, name)| (name.clone(), base + (count - 1 - position as i32)))
            .collect()
    }
}

/// Zoom range encoded in a tile template path ending in
/// `_z<min>_<max>/{z}/{x}/{y}.png`
pub fn parse_zoom_range(url_template: &str) -> Option<(u8, u8)> {
    let stem = url_template.strip_suffix("/{z}/{x}/{y}.png")?;
    let tail = &stem[stem.rfind("_z")? + 2..];
    let (min, max) = tail.split_once('_')?;

    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(min) || !digits(max) {
        return None;
    }
    Some((min.parse().ok()?, max.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack(names: &[&str]) -> OverlayStack {
        let mut stack = OverlayStack::new();
        for name in names {
            stack
                .push(OverlayEntry {
                    name: name.to_string(),
                    kind: OverlayKind::Tile,
                    opacity: 1.0,
                })
                .unwrap();
        }
        stack
    }

    #[test]
    fn test_topmost_gets_highest_z() {
        let stack = stack(&["ortho", "dem", "plan"]);
        let z = stack.z_indices(100, |_| true);
        assert_eq!(
            z,
            vec![
                ("ortho".to_string(), 102),
                ("dem".to_string(), 101),
                ("plan".to_string(), 100)
            ]
        );
    }

    #[test]
    fn test_hidden_overlays_skipped() {
        let stack = stack(&["ortho", "dem", "plan"]);
        let z = stack.z_indices(100, |name| name != "dem");
        assert_eq!(z, vec![("ortho".to_string(), 102), ("plan".to_string(), 100)]);
    }

    #[test]
    fn test_move_and_set_order() {
        let mut stack = stack(&["a", "b", "c"]);
        stack.move_to("c", 0).unwrap();
        assert_eq!(stack.names().collect::<Vec<_>>(), vec!["c", "a", "b"]);

        stack
            .set_order(&["b".to_string(), "c".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(stack.names().collect::<Vec<_>>(), vec!["b", "c", "a"]);

        assert!(matches!(
            stack.move_to("a", 3),
            Err(CoreError::InvalidPosition { position: 3, count: 3 })
        ));
        assert!(matches!(
            stack.set_order(&["a".to_string(), "a".to_string(), "b".to_string()]),
            Err(CoreError::OrderMismatch)
        ));
    }

    #[test]
    fn test_duplicate_and_opacity() {
        let mut stack = stack(&["a"]);
        assert!(stack
            .push(OverlayEntry { name: "a".into(), kind: OverlayKind::Image, opacity: 1.0 })
            .is_err());
        assert_eq!(stack.set_opacity("a", 1.7).unwrap(), 1.0);
        assert!(stack.set_opacity("missing", 0.5).is_err());
    }

    #[test]
    fn test_parse_zoom_range() {
        assert_eq!(
            parse_zoom_range("tiles/ortho_z14_21/{z}/{x}/{y}.png"),
            Some((14, 21))
        );
        assert_eq!(parse_zoom_range("https://tile.example.org/{z}/{x}/{y}.png"), None);
        assert_eq!(parse_zoom_range("tiles/ortho_zab_21/{z}/{x}/{y}.png"), None);
    }
}
