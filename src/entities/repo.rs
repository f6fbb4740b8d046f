use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::views::{NeighborView, PlayerView, TileView, UnitView};
use super::{keys, PlayerKind, PlayerRecord, TileRecord, UnitKind, UnitRecord};
use crate::error::{Error, Result};
use crate::rng::IdGenerator;
use crate::store::Store;

/// Attempts at drawing an unused unit id before giving up.
const MAX_ID_ATTEMPTS: usize = 16;

/// A decoded record together with the exact stored text, which is what a
/// compare-and-set has to present as its expected value.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub record: T,
    pub raw: String,
}

/// Typed access to tile, unit and player records.
///
/// Unit creation and movement span several independent writes. The unit
/// record is authoritative: whenever a read finds an occupant or membership
/// set disagreeing with it, the set is repaired on the spot.
#[derive(Clone)]
pub struct Entities {
    store: Arc<dyn Store>,
    ids: Arc<IdGenerator>,
}

impl Entities {
    pub fn new(store: Arc<dyn Store>, ids: Arc<IdGenerator>) -> Self {
        Self { store, ids }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    async fn read<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        id: &str,
        key: String,
    ) -> Result<Versioned<T>> {
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| Error::not_found(kind, id))?;
        let record =
            serde_json::from_str(&raw).map_err(|source| Error::Decode { key, source })?;
        Ok(Versioned { record, raw })
    }

    fn encode<T: Serialize>(key: &str, record: &T) -> Result<String> {
        serde_json::to_string(record).map_err(|source| Error::Decode {
            key: key.to_string(),
            source,
        })
    }

    pub async fn tile(&self, id: &str) -> Result<TileRecord> {
        Ok(self.read("tile", id, keys::tile(id)).await?.record)
    }

    pub async fn unit(&self, id: &str) -> Result<Versioned<UnitRecord>> {
        self.read("unit", id, keys::unit(id)).await
    }

    pub async fn player(&self, id: &str) -> Result<PlayerRecord> {
        Ok(self.read("player", id, keys::player(id)).await?.record)
    }

    pub async fn occupant_ids(&self, tile_id: &str) -> Result<Vec<String>> {
        Ok(self.store.smembers(&keys::tile_occupants(tile_id)).await?)
    }

    pub async fn unit_ids(&self, player_id: &str) -> Result<Vec<String>> {
        Ok(self.store.smembers(&keys::player_units(player_id)).await?)
    }

    pub async fn create_player(&self, id: &str, name: &str) -> Result<PlayerRecord> {
        let player = PlayerRecord {
            id: id.to_string(),
            name: name.to_string(),
            kind: PlayerKind::Player,
        };
        let key = keys::player(id);
        self.store.set(&key, Self::encode(&key, &player)?).await?;
        Ok(player)
    }

    /// Persists a new unit, then links it into its player's unit set and its
    /// tile's occupant set, in that order.
    pub async fn create_unit(
        &self,
        kind: UnitKind,
        tile_id: &str,
        player_id: &str,
    ) -> Result<UnitRecord> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let unit = UnitRecord {
                id: self.ids.next_id("unit"),
                kind,
                tile: tile_id.to_string(),
                player: player_id.to_string(),
                last_move_time: Utc::now().timestamp_millis(),
                version: 0,
            };
            let key = keys::unit(&unit.id);
            let value = Self::encode(&key, &unit)?;
            if !self.store.compare_and_set(&key, None, value).await? {
                debug!(unit = %unit.id, "unit id already taken, drawing another");
                continue;
            }
            self.store
                .sadd(&keys::player_units(player_id), &unit.id)
                .await?;
            self.store
                .sadd(&keys::tile_occupants(tile_id), &unit.id)
                .await?;
            debug!(unit = %unit.id, kind = unit.kind.as_str(), tile = tile_id, player = player_id, "unit created");
            return Ok(unit);
        }
        Err(Error::IdsExhausted {
            kind: "unit",
            attempts: MAX_ID_ATTEMPTS,
        })
    }

    /// Overwrites a unit record unconditionally.
    pub async fn update_unit(&self, unit: &UnitRecord) -> Result<()> {
        let key = keys::unit(&unit.id);
        self.store.set(&key, Self::encode(&key, unit)?).await?;
        Ok(())
    }

    /// Replaces `current` with `next` only if nobody else wrote the unit since
    /// `current` was read.
    pub async fn swap_unit(
        &self,
        current: &Versioned<UnitRecord>,
        next: &UnitRecord,
    ) -> Result<bool> {
        let key = keys::unit(&next.id);
        let value = Self::encode(&key, next)?;
        Ok(self
            .store
            .compare_and_set(&key, Some(&current.raw), value)
            .await?)
    }

    pub async fn player_view(&self, player_id: &str) -> Result<PlayerView> {
        let player = self.player(player_id).await?;
        Ok(PlayerView { name: player.name })
    }

    pub async fn unit_view(&self, unit_id: &str) -> Result<UnitView> {
        let unit = self.unit(unit_id).await?;
        self.resolve_unit(&unit).await
    }

    /// A unit view, provided the unit belongs to `player_id`.
    pub async fn unit_view_for_player(
        &self,
        player_id: &str,
        unit_id: &str,
    ) -> Result<UnitView> {
        self.player(player_id).await?;
        let unit = self.unit(unit_id).await?;
        if unit.record.player != player_id {
            return Err(Error::not_found("unit", unit_id));
        }
        self.resolve_unit(&unit).await
    }

    /// Resolves every unit in the player's set, one lookup per unit.
    pub async fn units_for_player(&self, player_id: &str) -> Result<Vec<UnitView>> {
        self.player(player_id).await?;
        let units_key = keys::player_units(player_id);
        let mut views = Vec::new();
        for unit_id in self.unit_ids(player_id).await? {
            let unit = match self.unit(&unit_id).await {
                Ok(unit) => unit,
                Err(Error::NotFound { .. }) => {
                    warn!(player = player_id, unit = %unit_id, "dropping dangling unit membership");
                    self.store.srem(&units_key, &unit_id).await?;
                    continue;
                }
                Err(err) => return Err(err),
            };
            let owner = &unit.record.player;
            if owner != player_id {
                warn!(player = player_id, unit = %unit_id, owner = %owner, "re-homing stale unit membership");
                self.store
                    .smove(&units_key, &keys::player_units(owner), &unit_id)
                    .await?;
                continue;
            }
            views.push(self.resolve_unit(&unit).await?);
        }
        Ok(views)
    }

    pub async fn tile_view(&self, tile_id: &str) -> Result<TileView> {
        let tile = self.tile(tile_id).await?;

        let mut neighbors = Vec::with_capacity(tile.neighbors.len());
        for neighbor_id in &tile.neighbors {
            let neighbor = self.tile(neighbor_id).await?;
            neighbors.push(NeighborView {
                tile: neighbor.id,
                bearing: tile.latlon.bearing_to(&neighbor.latlon),
            });
        }

        let occupants_key = keys::tile_occupants(tile_id);
        let mut occupants = Vec::new();
        for unit_id in self.occupant_ids(tile_id).await? {
            let unit = match self.unit(&unit_id).await {
                Ok(unit) => unit,
                Err(Error::NotFound { .. }) => {
                    warn!(tile = tile_id, unit = %unit_id, "dropping dangling occupant");
                    self.store.srem(&occupants_key, &unit_id).await?;
                    continue;
                }
                Err(err) => return Err(err),
            };
            let actual = &unit.record.tile;
            if actual != tile_id {
                // smove is a no-op if a concurrent move already took it out.
                warn!(tile = tile_id, unit = %unit_id, actual = %actual, "re-homing stale occupant");
                self.store
                    .smove(&occupants_key, &keys::tile_occupants(actual), &unit_id)
                    .await?;
                continue;
            }
            occupants.push(self.resolve_unit(&unit).await?);
        }

        Ok(TileView {
            id: tile.id,
            kind: tile.kind,
            elevation: tile.elevation,
            latlon: tile.latlon,
            neighbors,
            occupants,
        })
    }

    /// Builds the view for a unit, first making sure its tile and player sets
    /// list it.
    async fn resolve_unit(&self, unit: &Versioned<UnitRecord>) -> Result<UnitView> {
        self.heal_memberships(unit).await?;
        let record = &unit.record;
        let player = self.player(&record.player).await?;
        Ok(UnitView {
            id: record.id.clone(),
            kind: record.kind,
            tile: record.tile.clone(),
            player: player.name,
        })
    }

    /// Re-adds a unit to the occupant and membership sets its record names.
    /// Returns whether anything had to be repaired.
    ///
    /// The occupant repair only applies while the record is unchanged: if a
    /// move commits in between, the mover owns the occupant sets and any entry
    /// added here is taken back.
    pub async fn heal_memberships(&self, unit: &Versioned<UnitRecord>) -> Result<bool> {
        let record = &unit.record;
        let mut repaired = false;

        if self
            .store
            .sadd(&keys::player_units(&record.player), &record.id)
            .await?
        {
            warn!(unit = %record.id, player = %record.player, "restored missing unit membership");
            repaired = true;
        }

        let occupants_key = keys::tile_occupants(&record.tile);
        if self.store.sismember(&occupants_key, &record.id).await? {
            return Ok(repaired);
        }
        if !self.is_current(unit).await? {
            return Ok(repaired);
        }
        if self.store.sadd(&occupants_key, &record.id).await? {
            if !self.is_current(unit).await? {
                self.store.srem(&occupants_key, &record.id).await?;
                return Ok(repaired);
            }
            warn!(unit = %record.id, tile = %record.tile, "restored missing occupant entry");
            repaired = true;
        }
        Ok(repaired)
    }

    async fn is_current(&self, unit: &Versioned<UnitRecord>) -> Result<bool> {
        let stored = self.store.get(&keys::unit(&unit.record.id)).await?;
        Ok(stored.as_deref() == Some(unit.raw.as_str()))
    }
}
