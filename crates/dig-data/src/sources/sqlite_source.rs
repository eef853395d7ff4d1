//! SQLite project database source
//!
//! Reads one project's trenches, finds and layer tables and turns them into
//! a [`MapData`] bundle. Stored coordinates are reprojected from the
//! project's EPSG coordinate system on the way out.

use std::io;
use std::path::{Path, PathBuf};

use dig_core::{Find, OverlayDescriptor, OverlayKind, RawDepth, Trench};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use super::projection::{transform_for_epsg, CoordinateTransform};
use crate::map_data::MapData;
use crate::DataError;

/// SQLite data source implementation
pub struct SqliteSource {
    path: PathBuf,
    /// Layer file paths in the database are relative to this directory
    base_dir: PathBuf,
    /// Replaces the project's own coordinate system when set
    transform: Option<Box<dyn CoordinateTransform + Send + Sync>>,
}

impl SqliteSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            path,
            base_dir,
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: Box<dyn CoordinateTransform + Send + Sync>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Directory overlay file URLs are relative to
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Load one project, or the active one when `project_id` is `None`.
    /// The database is opened read-only and must already exist.
    pub fn load(&self, project_id: Option<i64>) -> Result<MapData, DataError> {
        if !self.path.is_file() {
            return Err(DataError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("database not found: {}", self.path.display()),
            )));
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let data = self.load_from(&conn, project_id)?;
        info!(
            path = %self.path.display(),
            trenches = data.trenches.len(),
            finds = data.finds.len(),
            layers = data.layers.len(),
            "project loaded from database"
        );
        Ok(data)
    }

    /// Like [`load`](Self::load), but a failure becomes an empty bundle
    /// carrying the error message
    pub fn load_or_report(&self, project_id: Option<i64>) -> MapData {
        self.load(project_id).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "project load failed");
            MapData::failed(e.to_string())
        })
    }

    fn load_from(&self, conn: &Connection, project_id: Option<i64>) -> Result<MapData, DataError> {
        let project_id = match project_id {
            Some(id) => id,
            None => Self::active_project(conn)?,
        };

        let (project_name, epsg): (String, Value) = conn
            .query_row(
                "SELECT COALESCE(name, code, ''), epsg_code FROM projects WHERE id = ?1",
                params![project_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or(DataError::ProjectNotFound(project_id))?;

        let project_transform;
        let transform: &dyn CoordinateTransform = match &self.transform {
            Some(transform) => transform.as_ref(),
            None => {
                let epsg = epsg_code(epsg).ok_or_else(|| DataError::MissingEpsg(project_name.clone()))?;
                debug!(project = %project_name, epsg, "reprojecting to WGS84");
                project_transform = transform_for_epsg(epsg)?;
                project_transform.as_ref()
            }
        };

        let mut layers = self.load_map_layers(conn, project_id)?;
        layers.extend(self.load_vector_layers(conn, project_id)?);

        Ok(MapData {
            trenches: Self::load_trenches(conn, transform, project_id, &project_name)?,
            finds: Self::load_finds(conn, transform, project_id)?,
            layers,
            ..MapData::default()
        })
    }

    /// `app_settings.active_project_id`, else the first project
    fn active_project(conn: &Connection) -> Result<i64, DataError> {
        let active = conn
            .query_row(
                "SELECT active_project_id FROM app_settings WHERE id = 1",
                [],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional();

        match active {
            Ok(Some(Some(id))) => return Ok(id),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "no app settings, using first project"),
        }

        conn.query_row("SELECT id FROM projects ORDER BY id LIMIT 1", [], |row| row.get(0))
            .optional()?
            .ok_or(DataError::NoActiveProject)
    }

    fn load_trenches(
        conn: &Connection,
        transform: &dyn CoordinateTransform,
        project_id: i64,
        project_name: &str,
    ) -> Result<Vec<Trench>, DataError> {
        let mut stmt = conn.prepare(
            "SELECT id, code, name, description FROM trenches
             WHERE project_id = ?1 ORDER BY id",
        )?;
        let mut trenches = stmt
            .query_map(params![project_id], |row| {
                Ok(Trench {
                    id: row.get(0)?,
                    code: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    name: row.get(2)?,
                    project: Some(project_name.to_string()),
                    description: row.get(3)?,
                    vertices: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(
            "SELECT v.trench_id, v.x_global, v.y_global FROM trench_vertices v
             JOIN trenches t ON v.trench_id = t.id
             WHERE t.project_id = ?1 ORDER BY v.trench_id, v.corner_index",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
            ))
        })?;

        let index: ahash::AHashMap<i64, usize> =
            trenches.iter().enumerate().map(|(i, t)| (t.id, i)).collect();
        for row in rows {
            let (trench_id, x, y) = row?;
            let (Some(x), Some(y)) = (x, y) else { continue };
            let Some(vertex) = transform.to_lat_lng(x, y) else {
                debug!(trench = trench_id, x, y, "vertex outside target range skipped");
                continue;
            };
            if let Some(&i) = index.get(&trench_id) {
                trenches[i].vertices.push(vertex);
            }
        }

        Ok(trenches)
    }

    fn load_finds(
        conn: &Connection,
        transform: &dyn CoordinateTransform,
        project_id: i64,
    ) -> Result<Vec<Find>, DataError> {
        let mut stmt = conn.prepare(
            "SELECT f.id, f.trench_id, f.code, f.description, f.found_at,
                    f.x_global, f.y_global, f.z_global,
                    l.name, t.code, t.name
             FROM finds f
             JOIN trenches t ON f.trench_id = t.id
             LEFT JOIN levels l ON f.level_id = l.id
             WHERE t.project_id = ?1 ORDER BY f.id",
        )?;

        let finds = stmt
            .query_map(params![project_id], |row| {
                let x: Option<f64> = row.get(5)?;
                let y: Option<f64> = row.get(6)?;
                let position = match (x, y) {
                    (Some(x), Some(y)) => transform.to_lat_lng(x, y),
                    _ => None,
                };
                Ok(Find {
                    id: row.get(0)?,
                    trench_id: row.get(1)?,
                    code: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    description: row.get(3)?,
                    found_at: row.get(4)?,
                    z: raw_depth(row.get(7)?),
                    level_name: row.get(8)?,
                    trench_code: row.get(9)?,
                    trench_name: row.get(10)?,
                    lat: position.map(|p| p.lat),
                    lon: position.map(|p| p.lon),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(finds)
    }

    /// Active tile and image layers. Image layers need an existing file and
    /// a bounds row.
    fn load_map_layers(
        &self,
        conn: &Connection,
        project_id: i64,
    ) -> Result<Vec<OverlayDescriptor>, DataError> {
        let mut stmt = conn.prepare(
            "SELECT m.name, m.type, m.url_template, m.file_path, m.attribution,
                    b.min_lat, b.min_lon, b.max_lat, b.max_lon
             FROM map_layers m
             LEFT JOIN map_layer_bounds b ON b.layer_id = m.id
             WHERE m.project_id = ?1 AND m.is_active = 1 ORDER BY m.id",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((
                OverlayDescriptor {
                    name: row.get(0)?,
                    kind: OverlayKind::Tile,
                    url_template: row.get(2)?,
                    file_url: None,
                    attribution: row.get(4)?,
                    min_lat: row.get(5)?,
                    min_lon: row.get(6)?,
                    max_lat: row.get(7)?,
                    max_lon: row.get(8)?,
                },
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut layers = Vec::new();
        for row in rows {
            let (mut descriptor, layer_type, file_path) = row?;
            match layer_type.as_deref() {
                Some("tile") if descriptor.url_template.as_deref().is_some_and(|u| !u.is_empty()) => {
                    layers.push(descriptor);
                }
                Some("image") => {
                    let Some(file_url) = file_path.and_then(|p| self.file_url(&p)) else {
                        debug!(layer = %descriptor.name, "image layer file missing");
                        continue;
                    };
                    if descriptor.bounds().is_none() {
                        debug!(layer = %descriptor.name, "image layer without bounds");
                        continue;
                    }
                    descriptor.kind = OverlayKind::Image;
                    descriptor.url_template = None;
                    descriptor.file_url = Some(file_url);
                    layers.push(descriptor);
                }
                other => debug!(layer = %descriptor.name, kind = ?other, "map layer skipped"),
            }
        }
        Ok(layers)
    }

    fn load_vector_layers(
        &self,
        conn: &Connection,
        project_id: i64,
    ) -> Result<Vec<OverlayDescriptor>, DataError> {
        let mut stmt = conn.prepare(
            "SELECT name, file_path FROM vector_layers WHERE project_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![project_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut layers = Vec::new();
        for row in rows {
            let (name, file_path) = row?;
            let Some(file_url) = file_path.and_then(|p| self.file_url(&p)) else {
                debug!(layer = %name, "vector layer file missing");
                continue;
            };
            layers.push(OverlayDescriptor {
                name,
                kind: OverlayKind::Vector,
                url_template: None,
                file_url: Some(file_url),
                attribution: None,
                min_lat: None,
                min_lon: None,
                max_lat: None,
                max_lon: None,
            });
        }
        Ok(layers)
    }

    /// `file:///<relative path>` for a layer file that exists under the
    /// database directory
    fn file_url(&self, file_path: &str) -> Option<String> {
        let relative = file_path.trim().replace('\\', "/");
        if relative.is_empty() || !self.base_dir.join(&relative).exists() {
            return None;
        }
        Some(format!("file:///{}", relative.trim_start_matches('/')))
    }
}

/// `projects.epsg_code` holds a number, or text such as `32636` or
/// `EPSG:32636`
fn epsg_code(value: Value) -> Option<u32> {
    match value {
        Value::Integer(code) => u32::try_from(code).ok().filter(|c| *c > 0),
        Value::Text(text) => {
            let text = text.trim();
            let digits = text.strip_prefix("EPSG:").unwrap_or(text);
            digits.trim().parse().ok().filter(|c| *c > 0)
        }
        Value::Null | Value::Real(_) | Value::Blob(_) => None,
    }
}

/// Depth column values may be stored as numbers or text
fn raw_depth(value: Value) -> Option<RawDepth> {
    match value {
        Value::Integer(z) => Some(RawDepth::Number(z as f64)),
        Value::Real(z) => Some(RawDepth::Number(z)),
        Value::Text(text) => Some(RawDepth::Text(text)),
        Value::Null | Value::Blob(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LonLatTransform;
    use dig_core::LatLng;

    const SCHEMA: &str = "
        CREATE TABLE projects (id INTEGER PRIMARY KEY, code TEXT, name TEXT, epsg_code INTEGER);
        CREATE TABLE app_settings (id INTEGER PRIMARY KEY, active_project_id INTEGER);
        CREATE TABLE trenches (id INTEGER PRIMARY KEY, project_id INTEGER, code TEXT,
                               name TEXT, description TEXT);
        CREATE TABLE trench_vertices (id INTEGER PRIMARY KEY, trench_id INTEGER,
                                      corner_index INTEGER, x_global REAL, y_global REAL);
        CREATE TABLE levels (id INTEGER PRIMARY KEY, name TEXT);
        CREATE TABLE finds (id INTEGER PRIMARY KEY, trench_id INTEGER, code TEXT,
                            description TEXT, found_at TEXT, x_global REAL, y_global REAL,
                            z_global, level_id INTEGER);
        CREATE TABLE map_layers (id INTEGER PRIMARY KEY, project_id INTEGER, name TEXT,
                                 type TEXT, url_template TEXT, file_path TEXT,
                                 attribution TEXT, is_active INTEGER);
        CREATE TABLE map_layer_bounds (layer_id INTEGER, min_lat REAL, min_lon REAL,
                                       max_lat REAL, max_lon REAL);
        CREATE TABLE vector_layers (id INTEGER PRIMARY KEY, project_id INTEGER, name TEXT,
                                    file_path TEXT, layer_type TEXT);
    ";

    const SEED: &str = "
        INSERT INTO projects VALUES (1, 'KT', 'Kultepe', 4326), (2, 'BH', 'Boncuklu', 4326);
        INSERT INTO trenches VALUES (10, 2, 'B2', 'North', NULL), (11, 1, 'A1', NULL, NULL);
        INSERT INTO trench_vertices VALUES
            (1, 10, 1, 32.51, 37.88), (2, 10, 0, 32.50, 37.87), (3, 10, 2, NULL, 37.9);
        INSERT INTO levels VALUES (1, 'Level 3');
        INSERT INTO finds VALUES
            (1, 10, 'B2-001', 'bead', '05.03.2024', 32.505, 37.875, 1.25, 1),
            (2, 10, 'B2-002', NULL, NULL, NULL, NULL, '0,8', NULL),
            (3, 11, 'A1-001', NULL, NULL, 32.0, 37.0, 2.0, NULL);
        INSERT INTO map_layers VALUES
            (1, 2, 'ortho', 'tile', 'tiles/ortho_z14_21/{z}/{x}/{y}.png', NULL, 'UAV', 1),
            (2, 2, 'old', 'tile', 'tiles/old/{z}/{x}/{y}.png', NULL, NULL, 0),
            (3, 2, 'plan', 'image', NULL, 'rasters/missing.png', NULL, 1);
    ";

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(SEED).unwrap();
        conn
    }

    fn source() -> SqliteSource {
        SqliteSource::new(std::env::temp_dir().join("digmap-does-not-exist").join("site.db"))
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("digmap-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_active_project_falls_back_to_first() {
        let conn = seeded();
        assert_eq!(SqliteSource::active_project(&conn).unwrap(), 1);

        conn.execute("INSERT INTO app_settings VALUES (1, 2)", []).unwrap();
        assert_eq!(SqliteSource::active_project(&conn).unwrap(), 2);
    }

    #[test]
    fn test_no_projects() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        assert!(matches!(
            SqliteSource::active_project(&conn),
            Err(DataError::NoActiveProject)
        ));
        assert!(matches!(
            source().load_from(&conn, Some(9)),
            Err(DataError::ProjectNotFound(9))
        ));
    }

    #[test]
    fn test_load_project() {
        let conn = seeded();
        let data = source().load_from(&conn, Some(2)).unwrap();

        assert_eq!(data.trenches.len(), 1);
        let trench = &data.trenches[0];
        assert_eq!(trench.project.as_deref(), Some("Boncuklu"));
        assert_eq!(
            trench.vertices,
            vec![LatLng::new(37.87, 32.50), LatLng::new(37.88, 32.51)]
        );

        assert_eq!(data.finds.len(), 2);
        assert_eq!(data.finds[0].level_name.as_deref(), Some("Level 3"));
        assert_eq!(data.finds[0].trench_code.as_deref(), Some("B2"));
        assert_eq!(data.finds[0].depth(), Some(1.25));
        assert_eq!(data.finds[1].z, Some(RawDepth::Text("0,8".to_string())));
        assert_eq!(data.finds[1].position(), None);

        let names: Vec<_> = data.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["ortho"]);
    }

    #[test]
    fn test_projected_project_is_reprojected() {
        let conn = seeded();
        conn.execute_batch(
            "INSERT INTO projects VALUES (3, 'AH', 'Asikli', 32636);
             INSERT INTO trenches VALUES (30, 3, 'C1', NULL, NULL);
             INSERT INTO trench_vertices VALUES
                 (10, 30, 0, 512000.0, 4190000.0), (11, 30, 1, 512010.0, 4190000.0),
                 (12, 30, 2, 512010.0, 4190010.0);
             INSERT INTO finds VALUES
                 (10, 30, 'C1-001', NULL, NULL, 512005.0, 4190005.0, 0.4, NULL);",
        )
        .unwrap();

        let data = source().load_from(&conn, Some(3)).unwrap();
        let vertices = &data.trenches[0].vertices;
        assert_eq!(vertices.len(), 3);
        for vertex in vertices {
            assert!((37.8..37.9).contains(&vertex.lat), "{:?}", vertex);
            assert!((33.1..33.2).contains(&vertex.lon), "{:?}", vertex);
        }
        assert!(vertices[1].lon > vertices[0].lon);

        let position = data.finds[0].position().unwrap();
        assert!((37.8..37.9).contains(&position.lat));
        assert!((33.1..33.2).contains(&position.lon));
    }

    #[test]
    fn test_project_without_epsg_is_an_error() {
        let conn = seeded();
        conn.execute("INSERT INTO projects VALUES (3, 'CH', 'Catalhoyuk', NULL)", [])
            .unwrap();
        let err = source().load_from(&conn, Some(3)).unwrap_err();
        assert!(matches!(&err, DataError::MissingEpsg(name) if name == "Catalhoyuk"));

        conn.execute("INSERT INTO projects VALUES (4, 'XX', 'Elsewhere', 2193)", [])
            .unwrap();
        assert!(matches!(
            source().load_from(&conn, Some(4)),
            Err(DataError::UnsupportedCrs(2193))
        ));
    }

    #[test]
    fn test_explicit_transform_replaces_project_system() {
        let conn = seeded();
        conn.execute("INSERT INTO projects VALUES (3, 'CH', 'Catalhoyuk', NULL)", [])
            .unwrap();
        let source = source().with_transform(Box::new(LonLatTransform));
        assert!(source.load_from(&conn, Some(3)).is_ok());
    }

    #[test]
    fn test_epsg_code_column_values() {
        assert_eq!(epsg_code(Value::Integer(32636)), Some(32636));
        assert_eq!(epsg_code(Value::Text(" EPSG:5255 ".to_string())), Some(5255));
        assert_eq!(epsg_code(Value::Text("32636".to_string())), Some(32636));
        assert_eq!(epsg_code(Value::Integer(0)), None);
        assert_eq!(epsg_code(Value::Text(String::new())), None);
        assert_eq!(epsg_code(Value::Null), None);
    }

    #[test]
    fn test_missing_database_is_not_created() {
        let dir = temp_dir("sqlite-missing");
        let path = dir.join("typo.db");

        let data = SqliteSource::new(&path).load_or_report(None);
        let message = data.error().unwrap();
        assert!(message.contains("database not found"), "{}", message);
        assert!(!path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_database_file() {
        let dir = temp_dir("sqlite-file");
        let path = dir.join("site.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(SCHEMA).unwrap();
            conn.execute_batch(SEED).unwrap();
        }

        let data = SqliteSource::new(&path).load(Some(2)).unwrap();
        assert_eq!(data.trenches.len(), 1);
        assert_eq!(data.finds.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_layer_files_resolve_against_database_dir() {
        let dir = temp_dir("sqlite");
        std::fs::create_dir_all(dir.join("vectors")).unwrap();
        std::fs::write(dir.join("vectors").join("walls.geojson"), "{}").unwrap();

        let conn = seeded();
        conn.execute_batch(
            "INSERT INTO vector_layers VALUES
                 (1, 2, 'walls', 'vectors\\walls.geojson', 'line'),
                 (2, 2, 'ghost', 'vectors/ghost.geojson', 'line');",
        )
        .unwrap();

        let source = SqliteSource::new(dir.join("site.db"));
        let data = source.load_from(&conn, Some(2)).unwrap();
        let vector = data.layers.iter().find(|l| l.kind == OverlayKind::Vector).unwrap();
        assert_eq!(vector.name, "walls");
        assert_eq!(vector.file_url.as_deref(), Some("file:///vectors/walls.geojson"));
        assert_eq!(data.layer_count(OverlayKind::Vector), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
