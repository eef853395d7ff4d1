pub mod projection;
pub mod sqlite_source;

pub use projection::{transform_for_epsg, CoordinateTransform, EpsgTransform, LonLatTransform};
pub use sqlite_source::SqliteSource;
