use serde::Serialize;

use super::{TileKind, UnitKind};
use crate::spatial::GeoCoord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborView {
    pub tile: String,
    /// Initial great-circle bearing from the viewed tile, in degrees.
    pub bearing: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TileKind,
    pub elevation: i32,
    pub latlon: GeoCoord,
    pub neighbors: Vec<NeighborView>,
    pub occupants: Vec<UnitView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: UnitKind,
    pub tile: String,
    /// Display name of the owning player.
    pub player: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub name: String,
}
