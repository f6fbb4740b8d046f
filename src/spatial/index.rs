use std::sync::Arc;

use crate::error::{Error, Result};
use crate::spatial::GeoCoord;
use crate::store::Store;

/// Geo set holding every indexed tile id.
pub const TILE_GEO_KEY: &str = "tiles";

#[derive(Debug, Clone, PartialEq)]
pub struct NearestTile {
    pub tile_id: String,
    pub distance_km: f64,
}

/// Nearest-tile lookup over the store's geo-radius primitive.
#[derive(Clone)]
pub struct SpatialIndex {
    store: Arc<dyn Store>,
    radius_km: f64,
}

impl SpatialIndex {
    pub fn new(store: Arc<dyn Store>, radius_km: f64) -> Self {
        Self { store, radius_km }
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    /// Indexed tiles within the search radius, nearest first.
    pub async fn candidates(&self, coord: GeoCoord) -> Result<Vec<NearestTile>> {
        let hits = self
            .store
            .georadius(TILE_GEO_KEY, coord.lon, coord.lat, self.radius_km)
            .await?;
        Ok(hits
            .into_iter()
            .map(|(tile_id, distance_km)| NearestTile {
                tile_id,
                distance_km,
            })
            .collect())
    }

    pub async fn nearest(&self, coord: GeoCoord) -> Result<NearestTile> {
        self.candidates(coord)
            .await?
            .into_iter()
            .next()
            .ok_or(Error::NoTileFound {
                lat: coord.lat,
                lon: coord.lon,
            })
    }
}
