//! Persistent records for tiles, units and players, and the views served to
//! clients.

mod repo;
mod views;

pub use repo::{Entities, Versioned};
pub use views::{NeighborView, PlayerView, TileView, UnitView};

use serde::{Deserialize, Serialize};

use crate::spatial::GeoCoord;

pub mod keys {
    pub fn tile(id: &str) -> String {
        format!("tile:{id}")
    }

    pub fn tile_occupants(id: &str) -> String {
        format!("tile:{id}:occupants")
    }

    pub fn unit(id: &str) -> String {
        format!("unit:{id}")
    }

    pub fn player(id: &str) -> String {
        format!("player:{id}")
    }

    pub fn player_units(id: &str) -> String {
        format!("player:{id}:units")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    #[default]
    Tile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    #[default]
    Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Human,
    Ship,
}

impl UnitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::Human => "human",
            UnitKind::Ship => "ship",
        }
    }
}

/// A tile as written at world generation. Only its occupant set (kept under a
/// separate key) changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: TileKind,
    pub elevation: i32,
    pub latlon: GeoCoord,
    pub neighbors: Vec<String>,
}

impl TileRecord {
    pub fn is_water(&self) -> bool {
        self.elevation <= 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: UnitKind,
    pub tile: String,
    pub player: String,
    /// Milliseconds since the Unix epoch.
    pub last_move_time: i64,
    /// Bumped on every committed move; guards compare-and-set updates.
    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: PlayerKind,
}
