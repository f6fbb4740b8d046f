#![allow(dead_code)]

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use gaea::{
    config::{RosterEntry, SeedingConfig, WorldConfig},
    entities::{keys, TileRecord},
    raster::ElevationRaster,
    spatial::{GeoCoord, TILE_GEO_KEY},
    store::{MemoryStore, Store, StoreError, StoreOp},
    ElevationSource, Engine, EngineBuilder, GaeaConfig,
};
use tokio::sync::Notify;

pub const DIVISIONS: u32 = 8;

pub fn roster() -> Vec<RosterEntry> {
    [
        ("p-joel", "joel", 45.5, -73.5),
        ("p-mark", "mark", 19.0, -99.1),
        ("p-michael", "michael", 33.5, -7.5),
    ]
    .into_iter()
    .map(|(id, name, lat, lon)| entry(id, name, lat, lon))
    .collect()
}

pub fn entry(id: &str, name: &str, lat: f64, lon: f64) -> RosterEntry {
    RosterEntry {
        id: id.to_string(),
        name: name.to_string(),
        lat,
        lon,
    }
}

/// A small world: 642 tiles, two humans and a ship per player.
pub fn config(roster: Vec<RosterEntry>) -> GaeaConfig {
    let mut config = GaeaConfig::starter();
    config.world = WorldConfig {
        divisions: DIVISIONS,
        search_radius_km: 1500.0,
        batch_size: 100,
        ..WorldConfig::default()
    };
    config.seeding = SeedingConfig {
        seed: 42,
        humans_per_player: 2,
        ships_per_player: 1,
        allow_water_start: false,
        roster,
    };
    config
}

pub fn flat(value: u8) -> ElevationRaster {
    ElevationRaster::new(360, 180, vec![value; 360 * 180]).expect("valid raster")
}

/// Water west of `lon`, land from there eastwards.
pub fn coast_at(lon: f64) -> ElevationRaster {
    let mut data = Vec::with_capacity(360 * 180);
    for _ in 0..180 {
        for x in 0..360 {
            let cell_lon = x as f64 - 180.0;
            data.push(if cell_lon < lon { 0 } else { 80 });
        }
    }
    ElevationRaster::new(360, 180, data).expect("valid raster")
}

/// All land, with elevation climbing diagonally across the image.
pub fn ramp() -> ElevationRaster {
    let mut data = Vec::with_capacity(360 * 180);
    for y in 0..180usize {
        for x in 0..360usize {
            data.push(1 + ((x + y) % 250) as u8);
        }
    }
    ElevationRaster::new(360, 180, data).expect("valid raster")
}

pub fn engine_with(config: GaeaConfig, raster: ElevationRaster) -> Arc<Engine> {
    engine_on(Arc::new(MemoryStore::new()), config, raster)
}

pub fn engine_on(store: Arc<dyn Store>, config: GaeaConfig, raster: ElevationRaster) -> Arc<Engine> {
    Arc::new(
        EngineBuilder::new(store, config)
            .with_elevation(ElevationSource::Fixed(Arc::new(raster)))
            .build(),
    )
}

/// A generated all-land world with the default roster.
pub async fn land_world() -> Arc<Engine> {
    let engine = engine_with(config(roster()), flat(50));
    engine.reset().await.expect("reset succeeds");
    engine
}

/// Every tile id reachable from the geo index, walking neighbor links so the
/// polar tiles are included.
pub async fn all_tiles(engine: &Engine) -> Vec<TileRecord> {
    let store = engine.store();
    let seeds = store
        .georadius(TILE_GEO_KEY, 0.0, 0.0, 25_000.0)
        .await
        .expect("georadius");
    let mut seen = BTreeSet::new();
    let mut queue: VecDeque<String> = seeds.into_iter().map(|(id, _)| id).collect();
    let mut tiles = Vec::new();
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let tile = engine.entities().tile(&id).await.expect("tile exists");
        for neighbor in &tile.neighbors {
            if !seen.contains(neighbor) {
                queue.push_back(neighbor.clone());
            }
        }
        tiles.push(tile);
    }
    tiles
}

/// Rewrites a tile's elevation in place.
pub async fn set_elevation(engine: &Engine, tile_id: &str, elevation: i32) {
    let mut tile = engine.entities().tile(tile_id).await.expect("tile exists");
    tile.elevation = elevation;
    engine
        .store()
        .set(
            &keys::tile(tile_id),
            serde_json::to_string(&tile).expect("encode tile"),
        )
        .await
        .expect("store write");
}

pub async fn occupants(engine: &Engine, tile_id: &str) -> BTreeSet<String> {
    engine
        .entities()
        .occupant_ids(tile_id)
        .await
        .expect("occupants")
        .into_iter()
        .collect()
}

pub async fn nearest_id(engine: &Engine, lat: f64, lon: f64) -> String {
    engine
        .nearest_tile(GeoCoord::new(lat, lon))
        .await
        .expect("nearest tile")
        .tile_id
}

/// Delegates to a [`MemoryStore`]; the next `smove` can be made to fail, or
/// to stall until released.
#[derive(Default)]
pub struct InterceptStore {
    inner: MemoryStore,
    fail_smove: AtomicBool,
    hold_smove: AtomicBool,
    held: Notify,
    release: Notify,
}

impl InterceptStore {
    pub fn fail_next_smove(&self) {
        self.fail_smove.store(true, Ordering::SeqCst);
    }

    pub fn hold_next_smove(&self) {
        self.hold_smove.store(true, Ordering::SeqCst);
    }

    /// Resolves once a held `smove` is waiting.
    pub async fn smove_held(&self) {
        self.held.notified().await;
    }

    pub fn release_smove(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Store for InterceptStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
    ) -> Result<bool, StoreError> {
        self.inner.compare_and_set(key, expected, value).await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.sadd(key, member).await
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.srem(key, member).await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.inner.smembers(key).await
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.sismember(key, member).await
    }

    async fn smove(
        &self,
        source: &str,
        destination: &str,
        member: &str,
    ) -> Result<bool, StoreError> {
        if self.fail_smove.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected smove failure".into()));
        }
        if self.hold_smove.swap(false, Ordering::SeqCst) {
            self.held.notify_one();
            self.release.notified().await;
        }
        self.inner.smove(source, destination, member).await
    }

    async fn geoadd(
        &self,
        key: &str,
        lon: f64,
        lat: f64,
        member: &str,
    ) -> Result<(), StoreError> {
        self.inner.geoadd(key, lon, lat, member).await
    }

    async fn georadius(
        &self,
        key: &str,
        lon: f64,
        lat: f64,
        radius_km: f64,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        self.inner.georadius(key, lon, lat, radius_km).await
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        self.inner.apply(ops).await
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        self.inner.flush_all().await
    }
}
