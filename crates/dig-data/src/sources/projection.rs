//! Project coordinate systems
//!
//! Global coordinates in a project database are stored in the project's
//! coordinate system, identified by its EPSG code. They are reprojected to
//! WGS84 longitude/latitude before they reach the map.

use dig_core::LatLng;
use proj4rs::proj::Proj;
use tracing::debug;

use crate::DataError;

/// EPSG code of WGS84 geographic coordinates
pub const WGS84: u32 = 4326;

const WGS84_DEFINITION: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Projects stored global coordinates to WGS84
pub trait CoordinateTransform {
    fn to_lat_lng(&self, x: f64, y: f64) -> Option<LatLng>;
}

/// Global coordinates already stored as longitude (x) and latitude (y)
#[derive(Debug, Clone, Copy, Default)]
pub struct LonLatTransform;

impl CoordinateTransform for LonLatTransform {
    fn to_lat_lng(&self, x: f64, y: f64) -> Option<LatLng> {
        lat_lng_in_range(x, y)
    }
}

fn lat_lng_in_range(lon: f64, lat: f64) -> Option<LatLng> {
    let in_range = (-180.0..=180.0).contains(&lon) && (-90.0..=90.0).contains(&lat);
    in_range.then(|| LatLng::new(lat, lon))
}

/// proj definition for the projected systems excavation projects use:
/// WGS84 UTM zones, ETRS89 UTM zones and the TUREF 3-degree TM zones
pub fn proj_definition(epsg: u32) -> Option<String> {
    match epsg {
        32601..=32660 => Some(format!(
            "+proj=utm +zone={} +datum=WGS84 +units=m +no_defs",
            epsg - 32600
        )),
        32701..=32760 => Some(format!(
            "+proj=utm +zone={} +south +datum=WGS84 +units=m +no_defs",
            epsg - 32700
        )),
        25828..=25838 => Some(format!(
            "+proj=utm +zone={} +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
            epsg - 25800
        )),
        5253..=5259 => Some(format!(
            "+proj=tmerc +lat_0=0 +lon_0={} +k=1 +x_0=500000 +y_0=0 \
             +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +units=m +no_defs",
            27 + (epsg - 5253) * 3
        )),
        _ => None,
    }
}

/// Reprojects from a projected EPSG system to WGS84
pub struct EpsgTransform {
    epsg: u32,
    source: Proj,
    target: Proj,
}

impl EpsgTransform {
    pub fn new(epsg: u32) -> Result<Self, DataError> {
        let definition = proj_definition(epsg).ok_or(DataError::UnsupportedCrs(epsg))?;
        let source = Proj::from_proj_string(&definition)
            .map_err(|e| DataError::Projection(format!("EPSG:{}: {}", epsg, e)))?;
        let target = Proj::from_proj_string(WGS84_DEFINITION)
            .map_err(|e| DataError::Projection(format!("EPSG:{}: {}", WGS84, e)))?;
        Ok(Self { epsg, source, target })
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }
}

impl CoordinateTransform for EpsgTransform {
    fn to_lat_lng(&self, x: f64, y: f64) -> Option<LatLng> {
        let mut point = (x, y, 0.0);
        if let Err(e) = proj4rs::transform::transform(&self.source, &self.target, &mut point) {
            debug!(epsg = self.epsg, x, y, error = %e, "coordinate could not be reprojected");
            return None;
        }
        // Geographic output is in radians
        lat_lng_in_range(point.0.to_degrees(), point.1.to_degrees())
    }
}

/// Transform for a project's coordinate system
pub fn transform_for_epsg(epsg: u32) -> Result<Box<dyn CoordinateTransform>, DataError> {
    if epsg == WGS84 {
        return Ok(Box::new(LonLatTransform));
    }
    Ok(Box::new(EpsgTransform::new(epsg)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: LatLng, lat: f64, lon: f64, tolerance: f64) {
        assert!(
            (actual.lat - lat).abs() < tolerance && (actual.lon - lon).abs() < tolerance,
            "{:?} is not within {} of ({}, {})",
            actual,
            tolerance,
            lat,
            lon
        );
    }

    #[test]
    fn test_lon_lat_rejects_projected_values() {
        assert_eq!(LonLatTransform.to_lat_lng(32.5, 37.8), Some(LatLng::new(37.8, 32.5)));
        assert_eq!(LonLatTransform.to_lat_lng(512_000.0, 4_190_000.0), None);
    }

    #[test]
    fn test_definitions() {
        assert_eq!(
            proj_definition(32636).as_deref(),
            Some("+proj=utm +zone=36 +datum=WGS84 +units=m +no_defs")
        );
        assert!(proj_definition(32736).unwrap().contains("+south"));
        assert!(proj_definition(5255).unwrap().contains("+lon_0=33 "));
        assert_eq!(proj_definition(4326), None);
        assert_eq!(proj_definition(2193), None);
    }

    #[test]
    fn test_utm_central_meridian() {
        let transform = EpsgTransform::new(32636).unwrap();
        let origin = transform.to_lat_lng(500_000.0, 0.0).unwrap();
        assert_close(origin, 0.0, 33.0, 1e-6);
    }

    #[test]
    fn test_utm_site_coordinates() {
        let transform = EpsgTransform::new(32636).unwrap();
        let point = transform.to_lat_lng(512_000.0, 4_190_000.0).unwrap();
        assert!((37.8..37.9).contains(&point.lat), "{:?}", point);
        assert!((33.1..33.2).contains(&point.lon), "{:?}", point);
    }

    #[test]
    fn test_tm_zone_central_meridian() {
        let transform = EpsgTransform::new(5255).unwrap();
        let point = transform.to_lat_lng(500_000.0, 4_190_000.0).unwrap();
        assert!((point.lon - 33.0).abs() < 1e-6, "{:?}", point);
        assert!((37.8..37.9).contains(&point.lat), "{:?}", point);
    }

    #[test]
    fn test_transform_for_epsg() {
        let wgs84 = transform_for_epsg(WGS84).unwrap();
        assert_eq!(wgs84.to_lat_lng(32.5, 37.8), Some(LatLng::new(37.8, 32.5)));
        assert!(matches!(transform_for_epsg(2193), Err(DataError::UnsupportedCrs(2193))));
    }
}
