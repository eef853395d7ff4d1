//! digmap: headless excavation map host bridge
//!
//! Loads a project, writes every map surface call as a JSON line on stdout
//! and reads host commands as JSON lines from stdin. Logs go to stderr.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use dig_core::MapEngine;
use dig_data::{FileOverlayFetcher, MapConfig, MapData, OverlayFetcher, SqliteSource};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod host;
mod surface;

use surface::{JsonLineSurface, LineWriter};

const USAGE: &str = "usage: digmap [<map.json> | --db <project.db> [--project <id>]] [--config <config.json>]";

/// Command line arguments
#[derive(Debug, Default, PartialEq)]
struct Args {
    map: Option<PathBuf>,
    db: Option<PathBuf>,
    project: Option<i64>,
    config: Option<PathBuf>,
    help: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Args::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => parsed.db = Some(PathBuf::from(value_of(&mut args, "--db")?)),
                "--config" => parsed.config = Some(PathBuf::from(value_of(&mut args, "--config")?)),
                "--project" => {
                    let id = value_of(&mut args, "--project")?;
                    parsed.project = Some(
                        id.parse()
                            .with_context(|| format!("--project expects a numeric id, got '{}'", id))?,
                    );
                }
                "-h" | "--help" => {
                    parsed.help = true;
                    return Ok(parsed);
                }
                other if other.starts_with("--") => bail!("unknown option {}\n{}", other, USAGE),
                other => {
                    if parsed.map.replace(PathBuf::from(other)).is_some() {
                        bail!("only one map data file may be given\n{}", USAGE);
                    }
                }
            }
        }

        if parsed.map.is_some() && parsed.db.is_some() {
            bail!("give either a map data file or --db, not both\n{}", USAGE);
        }
        Ok(parsed)
    }
}

fn value_of(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .with_context(|| format!("{} needs a value\n{}", flag, USAGE))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Map data plus the directory overlay files resolve against
async fn load_map_data(args: &Args, config: &MapConfig) -> Result<(MapData, PathBuf)> {
    if let Some(path) = &args.map {
        let data = MapData::from_json_file(path)
            .with_context(|| format!("Failed to read map data from {}", path.display()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        return Ok((data, base_dir));
    }

    let database = config.database.as_ref();
    let Some(db_path) = args.db.clone().or_else(|| database.map(|d| d.path.clone())) else {
        bail!(USAGE);
    };
    let project = args.project.or_else(|| database.and_then(|d| d.project_id));

    let source = SqliteSource::new(&db_path);
    let base_dir = source.base_dir().to_path_buf();
    let data = tokio::task::spawn_blocking(move || source.load_or_report(project))
        .await
        .context("Project loading task failed")?;
    Ok((data, base_dir))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }
    let config = match &args.config {
        Some(path) => MapConfig::load(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?,
        None => MapConfig::default(),
    };

    let (data, base_dir) = load_map_data(&args, &config).await?;
    let center = data.center(config.engine.default_center);
    let error = data.error().map(str::to_string);
    let (store, layers) = data.into_parts();

    info!(
        trenches = store.trenches().len(),
        finds = store.finds().len(),
        overlays = layers.len(),
        composition = ?config.engine.composition,
        "starting digmap"
    );

    let writer = LineWriter::stdout();
    let mut engine = MapEngine::new(store, JsonLineSurface::new(writer.clone()), config.engine);
    surface::forward_events(engine.events(), &writer);

    let pending = engine.load_overlays(&layers);
    engine.open_view(center, error.as_deref());

    let fetcher: Arc<dyn OverlayFetcher> = Arc::new(FileOverlayFetcher::new(base_dir));
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    host::run(&mut engine, pending, fetcher, input, writer).await
}
