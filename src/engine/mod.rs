use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::info;

use crate::commands::{Command, CommandProcessor};
use crate::config::GaeaConfig;
use crate::entities::{Entities, PlayerView, TileView, UnitView};
use crate::error::{Error, Result};
use crate::mesh::{GeodesicMesh, MeshSource};
use crate::raster::ElevationRaster;
use crate::rng::IdGenerator;
use crate::seeding::Seeder;
use crate::spatial::{GeoCoord, NearestTile, SpatialIndex};
use crate::store::Store;
use crate::world::{self, WorldBuilder};

/// Where reset reads elevation from.
#[derive(Clone)]
pub enum ElevationSource {
    File(PathBuf),
    Fixed(Arc<ElevationRaster>),
}

impl ElevationSource {
    pub fn load(&self) -> Result<ElevationRaster> {
        match self {
            ElevationSource::File(path) => ElevationRaster::load(path),
            ElevationSource::Fixed(raster) => Ok(raster.as_ref().clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetSummary {
    pub tiles: usize,
    pub indexed: usize,
    pub players: usize,
    pub units: usize,
}

pub struct EngineBuilder {
    store: Arc<dyn Store>,
    config: GaeaConfig,
    mesh: Arc<dyn MeshSource>,
    elevation: Option<ElevationSource>,
}

impl EngineBuilder {
    pub fn new(store: Arc<dyn Store>, config: GaeaConfig) -> Self {
        Self {
            store,
            config,
            mesh: Arc::new(GeodesicMesh),
            elevation: None,
        }
    }

    pub fn with_mesh(mut self, mesh: impl MeshSource + 'static) -> Self {
        self.mesh = Arc::new(mesh);
        self
    }

    pub fn with_elevation(mut self, elevation: ElevationSource) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn build(self) -> Engine {
        let ids = Arc::new(IdGenerator::new(self.config.seeding.seed));
        let entities = Entities::new(self.store.clone(), ids.clone());
        let index = SpatialIndex::new(self.store.clone(), self.config.world.search_radius_km);
        let elevation = self
            .elevation
            .unwrap_or_else(|| ElevationSource::File(self.config.world.elevation_image.clone()));
        Engine {
            processor: CommandProcessor::new(entities.clone()),
            store: self.store,
            mesh: self.mesh,
            elevation,
            config: self.config,
            ids,
            entities,
            index,
            gate: RwLock::new(()),
            generating: AtomicBool::new(false),
        }
    }
}

/// Owns the world: serves reads and commands, and regenerates everything on
/// reset. Reads and commands share the gate; a reset holds it exclusively, and
/// anything arriving meanwhile fails fast with [`Error::Generating`].
pub struct Engine {
    store: Arc<dyn Store>,
    config: GaeaConfig,
    mesh: Arc<dyn MeshSource>,
    elevation: ElevationSource,
    ids: Arc<IdGenerator>,
    entities: Entities,
    index: SpatialIndex,
    processor: CommandProcessor,
    gate: RwLock<()>,
    generating: AtomicBool,
}

struct GeneratingFlag<'a>(&'a AtomicBool);

impl Drop for GeneratingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

const MAP_LAT_TOP: i32 = 84;
const MAP_LAT_BOTTOM: i32 = -84;
const MAP_LON_LEFT: i32 = -179;
const MAP_LON_RIGHT: i32 = 179;
const MAP_STEP: usize = 5;

impl Engine {
    pub fn config(&self) -> &GaeaConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst)
    }

    fn read_gate(&self) -> Result<RwLockReadGuard<'_, ()>> {
        if self.is_generating() {
            return Err(Error::Generating);
        }
        self.gate.try_read().map_err(|_| Error::Generating)
    }

    pub async fn tile_view(&self, tile_id: &str) -> Result<TileView> {
        let _gate = self.read_gate()?;
        self.entities.tile_view(tile_id).await
    }

    pub async fn player_view(&self, player_id: &str) -> Result<PlayerView> {
        let _gate = self.read_gate()?;
        self.entities.player_view(player_id).await
    }

    pub async fn units_for_player(&self, player_id: &str) -> Result<Vec<UnitView>> {
        let _gate = self.read_gate()?;
        self.entities.units_for_player(player_id).await
    }

    pub async fn unit_for_player(&self, player_id: &str, unit_id: &str) -> Result<UnitView> {
        let _gate = self.read_gate()?;
        self.entities.unit_view_for_player(player_id, unit_id).await
    }

    pub async fn nearest_tile(&self, coord: GeoCoord) -> Result<NearestTile> {
        let _gate = self.read_gate()?;
        self.index.nearest(coord).await
    }

    pub async fn execute(&self, player_id: &str, command: Command) -> Result<()> {
        let _gate = self.read_gate()?;
        self.processor.execute(player_id, command).await
    }

    pub async fn move_unit(&self, unit_id: &str, from_tile: &str, to_tile: &str) -> Result<()> {
        let _gate = self.read_gate()?;
        self.processor.move_unit(unit_id, from_tile, to_tile).await
    }

    /// Coarse land/water picture of the world, one character per sample:
    /// `x` for water (or no indexed tile nearby), a space for land.
    pub async fn render_map(&self) -> Result<String> {
        let _gate = self.read_gate()?;
        let mut map = String::new();
        let mut lat = MAP_LAT_TOP;
        while lat > MAP_LAT_BOTTOM {
            map.push('\n');
            for lon in (MAP_LON_LEFT..=MAP_LON_RIGHT).step_by(MAP_STEP) {
                let coord = GeoCoord::new(f64::from(lat), f64::from(lon));
                let land = match self.index.nearest(coord).await {
                    Ok(nearest) => !self.entities.tile(&nearest.tile_id).await?.is_water(),
                    Err(Error::NoTileFound { .. }) => false,
                    Err(err) => return Err(err),
                };
                map.push(if land { ' ' } else { 'x' });
            }
            lat -= MAP_STEP as i32;
        }
        Ok(map)
    }

    /// Destroys all stored state, regenerates the world and seeds the roster.
    ///
    /// Configuration, elevation and mesh are all prepared before the store is
    /// flushed, so a bad image or mesh leaves the previous world in place.
    pub async fn reset(&self) -> Result<ResetSummary> {
        if self.generating.swap(true, Ordering::SeqCst) {
            return Err(Error::Generating);
        }
        let _flag = GeneratingFlag(&self.generating);
        let _gate = self.gate.write().await;
        let started = Instant::now();

        self.config.validate()?;
        let raster = self.elevation.load()?;
        let mesh = self.mesh.generate(&self.config.world.mesh())?;
        self.ids.reseed(self.config.seeding.seed);
        let tiles = world::plan_tiles(&mesh, &raster, &self.ids)?;
        info!(
            tiles = tiles.len(),
            raster_width = raster.width(),
            raster_height = raster.height(),
            "world planned, flushing store"
        );

        self.store.flush_all().await?;
        self.processor.forget_units();
        let built = WorldBuilder::new(self.store.as_ref(), &self.config.world)
            .write(&tiles)
            .await?;
        let seeded = Seeder::new(&self.entities, &self.index, &self.config.seeding)
            .seed()
            .await?;

        let summary = ResetSummary {
            tiles: built.tiles,
            indexed: built.indexed,
            players: seeded.len(),
            units: seeded.iter().map(|p| p.unit_ids.len()).sum(),
        };
        info!(
            tiles = summary.tiles,
            indexed = summary.indexed,
            players = summary.players,
            units = summary.units,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "world reset complete"
        );
        Ok(summary)
    }
}
