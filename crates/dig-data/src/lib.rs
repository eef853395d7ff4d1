//! Load-time inputs for the excavation map: the map data bundle, project
//! databases, vector overlay files and runtime configuration.

pub mod config;
pub mod map_data;
pub mod sources;
pub mod vector;

use thiserror::Error;
use tokio::task::JoinError;

// Re-exports
pub use config::{DatabaseConfig, MapConfig};
pub use map_data::MapData;
pub use sources::{CoordinateTransform, EpsgTransform, LonLatTransform, SqliteSource};
pub use vector::{FileOverlayFetcher, OverlayFetcher, VectorOverlay};

/// Errors that can occur while loading map inputs
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("No active project found")]
    NoActiveProject,

    #[error("Project {0} not found in database")]
    ProjectNotFound(i64),

    #[error("Project '{0}' has no EPSG code")]
    MissingEpsg(String),

    #[error("Unsupported coordinate system: EPSG:{0}")]
    UnsupportedCrs(u32),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Unsupported overlay location: {0}")]
    UnsupportedUrl(String),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    #[error("Other error: {0}")]
    Other(String),
}
