//! Host commands
//!
//! Every user or host action arrives as one [`Command`]. The host bridge
//! speaks them as JSON lines tagged by `cmd`.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::engine::MapEngine;
use crate::model::{FindId, TrenchId};
use crate::surface::MapSurface;
use crate::CoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    TextChanged {
        query: String,
    },
    DateCommitted {
        #[serde(default)]
        from: Option<String>,
        #[serde(default)]
        to: Option<String>,
    },
    ClearDates,
    DepthChanged {
        #[serde(default)]
        from: Option<f64>,
        #[serde(default)]
        to: Option<f64>,
    },
    ClearDepth,
    ApplyFilter {
        #[serde(default)]
        query: String,
    },
    SetLayerVisibility {
        key: String,
        visible: bool,
    },
    ApplyOverrides,
    FocusTrench {
        id: TrenchId,
    },
    FocusFind {
        id: FindId,
    },
    FocusAllTrenches,
    FocusAllFinds,
    SetOverlayShown {
        name: String,
        shown: bool,
    },
    SetOverlayOpacity {
        name: String,
        opacity: f32,
    },
    MoveOverlay {
        name: String,
        position: usize,
    },
    SetOverlayOrder {
        names: Vec<String>,
    },
}

impl Command {
    /// Parse one JSON line
    pub fn parse(line: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

impl<S: MapSurface> MapEngine<S> {
    /// Run one command to completion
    pub fn dispatch(&mut self, command: Command) -> Result<(), CoreError> {
        trace!(?command, "dispatch");
        match command {
            Command::TextChanged { query } => {
                self.on_text_changed(&query);
            }
            Command::DateCommitted { from, to } => {
                self.on_date_committed(from.as_deref(), to.as_deref());
            }
            Command::ClearDates => {
                self.clear_dates();
            }
            Command::DepthChanged { from, to } => {
                self.on_depth_changed(from, to);
            }
            Command::ClearDepth => {
                self.clear_depth();
            }
            Command::ApplyFilter { query } => {
                self.apply_filter(&query);
            }
            Command::SetLayerVisibility { key, visible } => {
                self.set_layer_visibility(&key, visible);
            }
            Command::ApplyOverrides => {
                self.apply_overrides();
            }
            Command::FocusTrench { id } => self.focus_on_trench(id),
            Command::FocusFind { id } => self.focus_on_find(id),
            Command::FocusAllTrenches => self.focus_on_all_trenches(),
            Command::FocusAllFinds => self.focus_on_all_finds(),
            Command::SetOverlayShown { name, shown } => self.set_overlay_shown(&name, shown)?,
            Command::SetOverlayOpacity { name, opacity } => {
                self.set_overlay_opacity(&name, opacity)?
            }
            Command::MoveOverlay { name, position } => self.move_overlay(&name, position)?,
            Command::SetOverlayOrder { names } => self.set_overlay_order(&names)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::model::{Find, LatLng, Trench};
    use crate::store::EntityStore;
    use crate::surface::{LayerKey, RecordingSurface};

    fn engine() -> MapEngine<RecordingSurface> {
        let trench = Trench {
            id: 1,
            code: "A1".to_string(),
            name: None,
            project: None,
            description: None,
            vertices: vec![LatLng::new(37.0, 32.0)],
        };
        let find = Find {
            id: 5,
            code: "A1-005".to_string(),
            description: Some("bronze pin".to_string()),
            z: None,
            found_at: None,
            trench_id: Some(1),
            trench_code: Some("A1".to_string()),
            trench_name: None,
            level_name: None,
            lat: Some(37.0),
            lon: Some(32.0),
        };
        MapEngine::new(
            EntityStore::new(vec![trench], vec![find]),
            RecordingSurface::new(),
            EngineConfig::default(),
        )
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse(r#"{"cmd": "text_changed", "query": "pin"}"#).unwrap(),
            Command::TextChanged { query: "pin".to_string() }
        );
        assert_eq!(
            Command::parse(r#" {"cmd": "date_committed", "from": "01.03.2024"} "#).unwrap(),
            Command::DateCommitted { from: Some("01.03.2024".to_string()), to: None }
        );
        assert_eq!(
            Command::parse(r#"{"cmd": "focus_all_finds"}"#).unwrap(),
            Command::FocusAllFinds
        );
        assert!(matches!(
            Command::parse(r#"{"cmd": "explode"}"#),
            Err(CoreError::MalformedCommand(_))
        ));
    }

    #[test]
    fn test_dispatch_drives_engine() {
        let mut engine = engine();
        engine
            .dispatch(Command::TextChanged { query: "bronze".to_string() })
            .unwrap();
        assert!(engine.is_shown(&LayerKey::Find(5)));

        engine
            .dispatch(Command::SetLayerVisibility { key: "find_5".to_string(), visible: false })
            .unwrap();
        assert!(!engine.is_shown(&LayerKey::Find(5)));
        assert!(engine.is_shown(&LayerKey::Trench(1)));
    }

    #[test]
    fn test_dispatch_reports_overlay_errors() {
        let mut engine = engine();
        let result = engine.dispatch(Command::MoveOverlay { name: "ortho".to_string(), position: 0 });
        assert!(matches!(result, Err(CoreError::UnknownOverlay(name)) if name == "ortho"));
    }
}
