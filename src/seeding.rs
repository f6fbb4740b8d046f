//! Places the configured player roster on a freshly generated world.

use tracing::{info, warn};

use crate::config::{RosterEntry, SeedingConfig};
use crate::entities::{Entities, TileRecord, UnitKind};
use crate::error::{Error, Result};
use crate::spatial::{GeoCoord, SpatialIndex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeededPlayer {
    pub player_id: String,
    pub tile_id: String,
    pub unit_ids: Vec<String>,
}

pub struct Seeder<'a> {
    entities: &'a Entities,
    index: &'a SpatialIndex,
    config: &'a SeedingConfig,
}

impl<'a> Seeder<'a> {
    pub fn new(
        entities: &'a Entities,
        index: &'a SpatialIndex,
        config: &'a SeedingConfig,
    ) -> Self {
        Self {
            entities,
            index,
            config,
        }
    }

    /// Seeds every roster entry, strictly in roster order.
    pub async fn seed(&self) -> Result<Vec<SeededPlayer>> {
        self.config.validate()?;
        let mut seeded = Vec::with_capacity(self.config.roster.len());
        for entry in &self.config.roster {
            seeded.push(self.seed_player(entry).await?);
        }
        Ok(seeded)
    }

    async fn seed_player(&self, entry: &RosterEntry) -> Result<SeededPlayer> {
        let tile = self.starting_tile(GeoCoord::new(entry.lat, entry.lon)).await?;
        self.entities.create_player(&entry.id, &entry.name).await?;

        let mut unit_ids = Vec::new();
        let humans = std::iter::repeat(UnitKind::Human).take(self.config.humans_per_player as usize);
        let ships = std::iter::repeat(UnitKind::Ship).take(self.config.ships_per_player as usize);
        for kind in humans.chain(ships) {
            let unit = self.entities.create_unit(kind, &tile.id, &entry.id).await?;
            unit_ids.push(unit.id);
        }

        info!(
            player = %entry.id,
            name = %entry.name,
            tile = %tile.id,
            elevation = tile.elevation,
            units = unit_ids.len(),
            "player seeded"
        );
        Ok(SeededPlayer {
            player_id: entry.id.clone(),
            tile_id: tile.id,
            unit_ids,
        })
    }

    /// The nearest tile to `coord`, or with water starts disallowed, the
    /// nearest land tile within the search radius.
    pub async fn starting_tile(&self, coord: GeoCoord) -> Result<TileRecord> {
        if self.config.allow_water_start {
            let nearest = self.index.nearest(coord).await?;
            return self.entities.tile(&nearest.tile_id).await;
        }

        let candidates = self.index.candidates(coord).await?;
        if candidates.is_empty() {
            return Err(Error::NoTileFound {
                lat: coord.lat,
                lon: coord.lon,
            });
        }
        for (rank, candidate) in candidates.iter().enumerate() {
            let tile = self.entities.tile(&candidate.tile_id).await?;
            if tile.is_water() {
                continue;
            }
            if rank > 0 {
                warn!(
                    lat = coord.lat,
                    lon = coord.lon,
                    tile = %tile.id,
                    distance_km = candidate.distance_km,
                    "nearest tile is water, starting on closest land instead"
                );
            }
            return Ok(tile);
        }
        warn!(
            lat = coord.lat,
            lon = coord.lon,
            radius_km = self.index.radius_km(),
            candidates = candidates.len(),
            "no land tile within search radius"
        );
        Err(Error::NoLandTile {
            lat: coord.lat,
            lon: coord.lon,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::entities::keys;
    use crate::rng::IdGenerator;
    use crate::spatial::TILE_GEO_KEY;
    use crate::store::{MemoryStore, Store};

    /// Three tiles along the equator; `west` is water.
    async fn fixture(allow_water_start: bool) -> (Entities, SpatialIndex, SeedingConfig) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        for (id, lon, elevation) in [("west", 0.0, 0), ("mid", 2.0, 30), ("east", 4.0, 60)] {
            let tile = TileRecord {
                id: id.into(),
                kind: Default::default(),
                elevation,
                latlon: GeoCoord::new(0.0, lon),
                neighbors: Vec::new(),
            };
            store
                .set(&keys::tile(id), serde_json::to_string(&tile).unwrap())
                .await
                .unwrap();
            store.geoadd(TILE_GEO_KEY, lon, 0.0, id).await.unwrap();
        }
        let config = SeedingConfig {
            seed: 1,
            humans_per_player: 3,
            ships_per_player: 2,
            allow_water_start,
            roster: vec![RosterEntry {
                id: "p1".into(),
                name: "joel".into(),
                lat: 0.0,
                lon: -0.5,
            }],
        };
        let entities = Entities::new(store.clone(), Arc::new(IdGenerator::new(1)));
        (entities, SpatialIndex::new(store, 1000.0), config)
    }

    #[tokio::test]
    async fn test_water_start_falls_back_to_nearest_land() {
        let (entities, index, config) = fixture(false).await;
        let seeder = Seeder::new(&entities, &index, &config);
        let tile = seeder.starting_tile(GeoCoord::new(0.0, -0.5)).await.unwrap();
        assert_eq!(tile.id, "mid");
    }

    #[tokio::test]
    async fn test_water_start_allowed() {
        let (entities, index, config) = fixture(true).await;
        let seeder = Seeder::new(&entities, &index, &config);
        let tile = seeder.starting_tile(GeoCoord::new(0.0, -0.5)).await.unwrap();
        assert_eq!(tile.id, "west");
    }

    #[tokio::test]
    async fn test_out_of_range_start() {
        let (entities, index, config) = fixture(false).await;
        let seeder = Seeder::new(&entities, &index, &config);
        assert!(matches!(
            seeder.starting_tile(GeoCoord::new(60.0, 100.0)).await,
            Err(Error::NoTileFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_seed_creates_roster_units() {
        let (entities, index, config) = fixture(false).await;
        let seeded = Seeder::new(&entities, &index, &config).seed().await.unwrap();

        assert_eq!(seeded.len(), 1);
        assert_eq!(seeded[0].tile_id, "mid");
        assert_eq!(seeded[0].unit_ids.len(), 5);
        let mut occupants = entities.occupant_ids("mid").await.unwrap();
        let mut expected = seeded[0].unit_ids.clone();
        occupants.sort();
        expected.sort();
        assert_eq!(occupants, expected);

        let ships = entities
            .units_for_player("p1")
            .await
            .unwrap()
            .into_iter()
            .filter(|u| u.kind == UnitKind::Ship)
            .count();
        assert_eq!(ships, 2);
    }
}
