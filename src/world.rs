//! World generation: turns a raw mesh and an elevation raster into persisted
//! tile records and the tile geo index.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::config::WorldConfig;
use crate::entities::{keys, TileKind, TileRecord};
use crate::error::{Error, Result};
use crate::mesh::RawMesh;
use crate::raster::ElevationRaster;
use crate::rng::IdGenerator;
use crate::spatial::{GeoCoord, TILE_GEO_KEY};
use crate::store::{Store, StoreOp};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub tiles: usize,
    pub indexed: usize,
    pub land: usize,
}

/// Rejects meshes whose adjacency is not a simple undirected graph.
pub fn check_mesh(mesh: &RawMesh) -> Result<()> {
    let count = mesh.tiles.len();
    if count == 0 {
        return Err(Error::Mesh("mesh has no tiles".into()));
    }
    for (index, tile) in mesh.tiles.iter().enumerate() {
        let mut seen = HashSet::with_capacity(tile.neighbors.len());
        for &other in &tile.neighbors {
            if other >= count {
                return Err(Error::Mesh(format!(
                    "tile {index} references missing tile {other}"
                )));
            }
            if other == index {
                return Err(Error::Mesh(format!("tile {index} neighbors itself")));
            }
            if !seen.insert(other) {
                return Err(Error::Mesh(format!(
                    "tile {index} lists neighbor {other} twice"
                )));
            }
            if !mesh.tiles[other].neighbors.contains(&index) {
                return Err(Error::Mesh(format!(
                    "tile {index} neighbors {other} but not the other way round"
                )));
            }
        }
    }
    Ok(())
}

/// Whether a latitude is inside the band the geo index covers.
pub fn indexable(lat: f64, pole_exclusion_lat: f64) -> bool {
    -pole_exclusion_lat < lat && lat < pole_exclusion_lat
}

/// Assigns every mesh tile an id, then materialises records whose neighbor
/// lists reference those ids. Nothing is written.
pub fn plan_tiles(
    mesh: &RawMesh,
    raster: &ElevationRaster,
    ids: &IdGenerator,
) -> Result<Vec<TileRecord>> {
    check_mesh(mesh)?;

    let mut taken = HashSet::with_capacity(mesh.tiles.len());
    let tile_ids: Vec<String> = mesh
        .tiles
        .iter()
        .map(|_| loop {
            let id = ids.next_id("tile");
            if taken.insert(id.clone()) {
                break id;
            }
        })
        .collect();

    let records = mesh
        .tiles
        .iter()
        .zip(&tile_ids)
        .map(|(raw, id)| {
            let latlon = GeoCoord::from_direction(raw.center);
            TileRecord {
                id: id.clone(),
                kind: TileKind::Tile,
                elevation: i32::from(raster.sample(latlon)),
                latlon,
                neighbors: raw.neighbors.iter().map(|&n| tile_ids[n].clone()).collect(),
            }
        })
        .collect();
    Ok(records)
}

pub struct WorldBuilder<'a> {
    store: &'a dyn Store,
    config: &'a WorldConfig,
}

impl<'a> WorldBuilder<'a> {
    pub fn new(store: &'a dyn Store, config: &'a WorldConfig) -> Self {
        Self { store, config }
    }

    /// Writes tile records and geo entries in pipelined batches.
    pub async fn write(&self, tiles: &[TileRecord]) -> Result<BuildSummary> {
        let mut summary = BuildSummary::default();
        let mut batch = Vec::with_capacity(self.config.batch_size);

        for tile in tiles {
            let key = keys::tile(&tile.id);
            let value = serde_json::to_string(tile).map_err(|source| Error::Decode {
                key: key.clone(),
                source,
            })?;
            batch.push(StoreOp::Set { key, value });
            if indexable(tile.latlon.lat, self.config.pole_exclusion_lat) {
                batch.push(StoreOp::GeoAdd {
                    key: TILE_GEO_KEY.to_string(),
                    lon: tile.latlon.lon,
                    lat: tile.latlon.lat,
                    member: tile.id.clone(),
                });
                summary.indexed += 1;
            }
            summary.tiles += 1;
            if !tile.is_water() {
                summary.land += 1;
            }
            if batch.len() >= self.config.batch_size {
                debug!(ops = batch.len(), written = summary.tiles, "flushing tile batch");
                self.store.apply(std::mem::take(&mut batch)).await?;
            }
        }
        if !batch.is_empty() {
            self.store.apply(batch).await?;
        }

        info!(
            tiles = summary.tiles,
            indexed = summary.indexed,
            land = summary.land,
            "world tiles written"
        );
        Ok(summary)
    }
}
