//! Layer styling and popup content for trenches and finds

use crate::filter::DepthExtent;
use crate::model::{Find, Trench};
use crate::surface::{LayerSpec, PathStyle};

pub const TRENCH_COLOR: &str = "#4c9be8";
pub const NO_DEPTH_COLOR: &str = "#888888";
pub const FIND_MARKER_RADIUS: f32 = 5.0;

/// Blue -> green -> red ramp over the observed depth extent
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthColorScale {
    extent: Option<DepthExtent>,
}

impl DepthColorScale {
    pub fn new(extent: Option<DepthExtent>) -> Self {
        Self { extent }
    }

    pub fn color_for(&self, z: Option<f64>) -> String {
        let (Some(z), Some(extent)) = (z, self.extent) else {
            return NO_DEPTH_COLOR.to_string();
        };

        let span = if extent.span() == 0.0 { 1.0 } else { extent.span() };
        let t = ((z - extent.min) / span).clamp(0.0, 1.0);
        let channel = |k: f64| (255.0 * k).round() as u8;

        if t < 0.33 {
            let k = t / 0.33;
            format!("rgb(0,{},255)", channel(k))
        } else if t < 0.66 {
            let k = (t - 0.33) / 0.33;
            format!("rgb({},255,{})", channel(k), channel(1.0 - k))
        } else {
            let k = (t - 0.66) / 0.34;
            format!("rgb(255,{},0)", channel(1.0 - k))
        }
    }
}

pub fn trench_popup(trench: &Trench) -> String {
    let mut text = format!("<b>Trench: </b>{}", trench.code);
    if let Some(name) = trench.name.as_deref().filter(|n| !n.is_empty()) {
        text.push_str(" – ");
        text.push_str(name);
    }
    text.push_str(&format!(
        "<br><b>Project: </b>{}<br>Vertices: {}",
        trench.project.as_deref().unwrap_or(""),
        trench.vertices.len()
    ));
    text
}

pub fn find_popup(find: &Find) -> String {
    let trench_label = match (&find.trench_code, find.trench_id) {
        (Some(code), _) if !code.is_empty() => code.clone(),
        (_, Some(id)) => id.to_string(),
        _ => String::new(),
    };

    let mut text = format!("<b>Find: </b>{}<br><b>Trench: </b>{}", find.code, trench_label);
    if let Some(name) = find.trench_name.as_deref().filter(|n| !n.is_empty()) {
        text.push_str(" – ");
        text.push_str(name);
    }
    text.push_str("<br>");
    if let Some(level) = find.level_name.as_deref().filter(|l| !l.is_empty()) {
        text.push_str(&format!("<b>Level: </b>{}<br>", level));
    }
    if let Some(desc) = find.description.as_deref().filter(|d| !d.is_empty()) {
        text.push_str(&format!("Description: {}<br>", desc));
    }
    if let Some(z) = find.depth() {
        text.push_str(&format!("Z: {} m<br>", z));
    }
    if let Some(date) = find.found_at.as_deref().filter(|d| !d.is_empty()) {
        text.push_str(&format!("Date: {}", date));
    }
    text
}

/// Polygon layer for a trench
pub fn trench_layer(trench: &Trench) -> LayerSpec {
    LayerSpec::Polygon {
        vertices: trench.vertices.clone(),
        style: PathStyle {
            color: TRENCH_COLOR.to_string(),
            fill_color: TRENCH_COLOR.to_string(),
            weight: 2.0,
            fill_opacity: 0.15,
        },
        popup: trench_popup(trench),
    }
}

/// Circle marker for a find, coloured by depth
pub fn find_layer(find: &Find, scale: &DepthColorScale) -> LayerSpec {
    let color = scale.color_for(find.depth());
    LayerSpec::CircleMarker {
        position: find.position(),
        radius: FIND_MARKER_RADIUS,
        style: PathStyle {
            color: color.clone(),
            fill_color: color,
            weight: 1.0,
            fill_opacity: 0.9,
        },
        popup: find_popup(find),
    }
}
