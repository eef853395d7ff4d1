//! Vector overlay fetching
//!
//! Vector overlays load after the map is up. Each fetch resolves the
//! overlay's location, parses the document as GeoJSON and computes its
//! extent.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dig_core::{Bounds, LatLng, OverlayDescriptor};
use geojson::{GeoJson, Geometry};
use tracing::debug;

use crate::DataError;

/// A loaded vector overlay, ready to hand to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct VectorOverlay {
    pub name: String,
    pub data: serde_json::Value,
    pub bounds: Option<Bounds>,
}

/// Loads the document behind a vector overlay descriptor
#[async_trait]
pub trait OverlayFetcher: Send + Sync {
    async fn fetch(&self, descriptor: &OverlayDescriptor) -> Result<VectorOverlay, DataError>;
}

/// Reads overlay files from disk. `file:///` URLs are relative to the
/// base directory.
#[derive(Debug, Clone)]
pub struct FileOverlayFetcher {
    base_dir: PathBuf,
}

impl FileOverlayFetcher {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn resolve(&self, url: &str) -> Result<PathBuf, DataError> {
        let url = url.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(DataError::UnsupportedUrl(url.to_string()));
        }

        let path = url
            .strip_prefix("file:///")
            .or_else(|| url.strip_prefix("file://"))
            .unwrap_or(url);
        let path = Path::new(path);
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(self.base_dir.join(path))
        }
    }
}

#[async_trait]
impl OverlayFetcher for FileOverlayFetcher {
    async fn fetch(&self, descriptor: &OverlayDescriptor) -> Result<VectorOverlay, DataError> {
        let url = descriptor
            .file_url
            .as_deref()
            .ok_or_else(|| DataError::Other(format!("overlay '{}' has no file", descriptor.name)))?;
        let path = self.resolve(url)?;
        debug!(overlay = %descriptor.name, path = %path.display(), "fetching vector overlay");

        let text = tokio::fs::read_to_string(&path).await?;
        let data: serde_json::Value = serde_json::from_str(&text)?;
        let geojson = GeoJson::from_json_value(data.clone())?;

        Ok(VectorOverlay {
            name: descriptor.name.clone(),
            data,
            bounds: geojson_bounds(&geojson),
        })
    }
}

/// Extent of every position in the document, `None` if it has none
pub fn geojson_bounds(geojson: &GeoJson) -> Option<Bounds> {
    let mut bounds = None;
    match geojson {
        GeoJson::Geometry(geometry) => extend_geometry(&mut bounds, geometry),
        GeoJson::Feature(feature) => {
            if let Some(geometry) = &feature.geometry {
                extend_geometry(&mut bounds, geometry);
            }
        }
        GeoJson::FeatureCollection(collection) => {
            for geometry in collection.features.iter().filter_map(|f| f.geometry.as_ref()) {
                extend_geometry(&mut bounds, geometry);
            }
        }
    }
    bounds
}

fn extend_geometry(bounds: &mut Option<Bounds>, geometry: &Geometry) {
    use geojson::Value;

    match &geometry.value {
        Value::Point(position) => extend(bounds, position),
        Value::MultiPoint(positions) | Value::LineString(positions) => {
            positions.iter().for_each(|p| extend(bounds, p));
        }
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            lines.iter().flatten().for_each(|p| extend(bounds, p));
        }
        Value::MultiPolygon(polygons) => {
            polygons.iter().flatten().flatten().for_each(|p| extend(bounds, p));
        }
        Value::GeometryCollection(geometries) => {
            geometries.iter().for_each(|g| extend_geometry(bounds, g));
        }
    }
}

/// GeoJSON positions are `[lon, lat, ...]`
fn extend(bounds: &mut Option<Bounds>, position: &[f64]) {
    if let [lon, lat, ..] = position {
        let point = LatLng::new(*lat, *lon);
        *bounds = Some(match bounds.take() {
            Some(b) => b.extended(point),
            None => Bounds::from_point(point),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dig_core::OverlayKind;

    fn descriptor(name: &str, file_url: &str) -> OverlayDescriptor {
        OverlayDescriptor {
            name: name.to_string(),
            kind: OverlayKind::Vector,
            url_template: None,
            file_url: Some(file_url.to_string()),
            attribution: None,
            min_lat: None,
            min_lon: None,
            max_lat: None,
            max_lon: None,
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("digmap-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_resolve() {
        let fetcher = FileOverlayFetcher::new("/data/site");
        assert_eq!(
            fetcher.resolve("file:///vectors/walls.geojson").unwrap(),
            PathBuf::from("/data/site/vectors/walls.geojson")
        );
        assert_eq!(
            fetcher.resolve("vectors/walls.geojson").unwrap(),
            PathBuf::from("/data/site/vectors/walls.geojson")
        );
        assert!(matches!(
            fetcher.resolve("https://example.org/walls.geojson"),
            Err(DataError::UnsupportedUrl(_))
        ));
    }

    #[test]
    fn test_bounds_of_feature_collection() {
        let geojson: GeoJson = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "LineString", "coordinates": [[32.50, 37.87], [32.52, 37.86]]}},
                {"type": "Feature", "properties": {}, "geometry": null},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Point", "coordinates": [32.49, 37.90, 1000.0]}}
            ]
        }"#
        .parse()
        .unwrap();

        assert_eq!(
            geojson_bounds(&geojson),
            Some(Bounds { south: 37.86, west: 32.49, north: 37.90, east: 32.52 })
        );
    }

    #[tokio::test]
    async fn test_fetch_file() {
        let dir = temp_dir("vector");
        std::fs::write(
            dir.join("walls.geojson"),
            r#"{"type": "Feature", "properties": {"name": "wall"},
                "geometry": {"type": "Polygon",
                             "coordinates": [[[32.0, 37.0], [32.1, 37.0], [32.1, 37.1], [32.0, 37.0]]]}}"#,
        )
        .unwrap();

        let fetcher = FileOverlayFetcher::new(&dir);
        let overlay = fetcher
            .fetch(&descriptor("walls", "file:///walls.geojson"))
            .await
            .unwrap();
        assert_eq!(overlay.name, "walls");
        assert_eq!(overlay.data["properties"]["name"], "wall");
        assert_eq!(
            overlay.bounds,
            Some(Bounds { south: 37.0, west: 32.0, north: 37.1, east: 32.1 })
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_fetch_failures() {
        let dir = temp_dir("vector-bad");
        std::fs::write(dir.join("broken.geojson"), r#"{"type": "Nonsense"}"#).unwrap();
        let fetcher = FileOverlayFetcher::new(&dir);

        let missing = fetcher.fetch(&descriptor("ghost", "file:///ghost.geojson")).await;
        assert!(matches!(missing, Err(DataError::Io(_))));

        let broken = fetcher.fetch(&descriptor("broken", "file:///broken.geojson")).await;
        assert!(matches!(broken, Err(DataError::GeoJson(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
