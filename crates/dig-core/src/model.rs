//! Entity and overlay records as they arrive from the host at load time

use serde::{Deserialize, Serialize};

/// Stable trench identifier
pub type TrenchId = i64;

/// Stable find identifier
pub type FindId = i64;

/// WGS84 coordinate pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lon: f64,
}

impl LatLng {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Axis-aligned geographic bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Degenerate bounds around a single point
    pub fn from_point(point: LatLng) -> Self {
        Self {
            south: point.lat,
            west: point.lon,
            north: point.lat,
            east: point.lon,
        }
    }

    /// Bounds of a set of points, `None` when the set is empty
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a LatLng>) -> Option<Self> {
        points.into_iter().fold(None, |acc: Option<Bounds>, p| {
            Some(match acc {
                Some(b) => b.extended(*p),
                None => Bounds::from_point(*p),
            })
        })
    }

    /// Grow to include a point
    pub fn extended(self, point: LatLng) -> Self {
        Self {
            south: self.south.min(point.lat),
            west: self.west.min(point.lon),
            north: self.north.max(point.lat),
            east: self.east.max(point.lon),
        }
    }

    /// Smallest bounds covering both
    pub fn union(self, other: Bounds) -> Self {
        Self {
            south: self.south.min(other.south),
            west: self.west.min(other.west),
            north: self.north.max(other.north),
            east: self.east.max(other.east),
        }
    }
}

/// A polygonal excavation area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trench {
    pub id: TrenchId,
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Polygon ring in drawing order
    #[serde(default)]
    pub vertices: Vec<LatLng>,
}

/// Depth value as delivered by the host: usually a number, sometimes text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDepth {
    Number(f64),
    Text(String),
}

impl RawDepth {
    /// Numeric value, `None` when the text does not hold a finite number
    pub fn value(&self) -> Option<f64> {
        let z = match self {
            RawDepth::Number(z) => *z,
            RawDepth::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        z.is_finite().then_some(z)
    }
}

impl From<f64> for RawDepth {
    fn from(z: f64) -> Self {
        RawDepth::Number(z)
    }
}

/// A point-located artifact record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Find {
    pub id: FindId,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Depth in metres
    #[serde(default)]
    pub z: Option<RawDepth>,
    /// Discovery date, loosely formatted
    #[serde(default)]
    pub found_at: Option<String>,
    /// Owning trench; may be null or reference a trench that was never loaded
    #[serde(default)]
    pub trench_id: Option<TrenchId>,
    #[serde(default)]
    pub trench_code: Option<String>,
    #[serde(default)]
    pub trench_name: Option<String>,
    #[serde(default)]
    pub level_name: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl Find {
    /// Numeric depth, coerced from text where needed
    pub fn depth(&self) -> Option<f64> {
        self.z.as_ref().and_then(RawDepth::value)
    }

    pub fn position(&self) -> Option<LatLng> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(LatLng::new(lat, lon)),
            _ => None,
        }
    }
}

/// Overlay kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    Tile,
    Image,
    Vector,
}

/// Load-time description of an auxiliary raster or vector layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayDescriptor {
    pub name: String,
    pub kind: OverlayKind,
    /// Tile URL template (`{z}/{x}/{y}`), tiles only
    #[serde(default)]
    pub url_template: Option<String>,
    /// Image or GeoJSON location
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub min_lat: Option<f64>,
    #[serde(default)]
    pub min_lon: Option<f64>,
    #[serde(default)]
    pub max_lat: Option<f64>,
    #[serde(default)]
    pub max_lon: Option<f64>,
}

impl OverlayDescriptor {
    /// Image extent, present only when all four corners are known
    pub fn bounds(&self) -> Option<Bounds> {
        Some(Bounds {
            south: self.min_lat?,
            west: self.min_lon?,
            north: self.max_lat?,
            east: self.max_lon?,
        })
    }
}
