use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Store, StoreError, StoreOp};
use crate::spatial::{GeoCoord, KM_PER_DEGREE};

/// Process-local store. A single lock guards all keyspaces, so `smove`,
/// `compare_and_set` and batches are atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Keyspace>,
}

#[derive(Default)]
struct Keyspace {
    strings: HashMap<String, String>,
    sets: HashMap<String, BTreeSet<String>>,
    geo: HashMap<String, GeoSet>,
}

#[derive(Default)]
struct GeoSet {
    positions: HashMap<String, GeoCoord>,
    // Rebuilt lazily after writes; ordered by latitude for band pruning.
    by_lat: Option<Vec<(GeoCoord, String)>>,
}

impl GeoSet {
    fn insert(&mut self, member: &str, coord: GeoCoord) {
        self.positions.insert(member.to_string(), coord);
        self.by_lat = None;
    }

    fn sorted(&mut self) -> &[(GeoCoord, String)] {
        let positions = &self.positions;
        self.by_lat.get_or_insert_with(|| {
            let mut entries: Vec<_> = positions
                .iter()
                .map(|(member, coord)| (*coord, member.clone()))
                .collect();
            entries.sort_by(|a, b| a.0.lat.total_cmp(&b.0.lat).then_with(|| a.1.cmp(&b.1)));
            entries
        })
    }

    fn radius(&mut self, center: GeoCoord, radius_km: f64) -> Vec<(String, f64)> {
        let band = radius_km / KM_PER_DEGREE;
        let entries = self.sorted();
        let start = entries.partition_point(|(coord, _)| coord.lat < center.lat - band);
        let mut hits: Vec<(String, f64)> = entries[start..]
            .iter()
            .take_while(|(coord, _)| coord.lat <= center.lat + band)
            .filter_map(|(coord, member)| {
                let distance = center.distance_km(coord);
                (distance <= radius_km).then(|| (member.clone(), distance))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        hits
    }
}

impl Keyspace {
    fn set(&mut self, key: &str, value: String) -> Result<(), StoreError> {
        if self.sets.contains_key(key) || self.geo.contains_key(key) {
            return Err(StoreError::WrongType(key.to_string()));
        }
        self.strings.insert(key.to_string(), value);
        Ok(())
    }

    fn set_mut(&mut self, key: &str) -> Result<&mut BTreeSet<String>, StoreError> {
        if self.strings.contains_key(key) || self.geo.contains_key(key) {
            return Err(StoreError::WrongType(key.to_string()));
        }
        Ok(self.sets.entry(key.to_string()).or_default())
    }

    fn set_ref(&self, key: &str) -> Result<Option<&BTreeSet<String>>, StoreError> {
        if self.strings.contains_key(key) || self.geo.contains_key(key) {
            return Err(StoreError::WrongType(key.to_string()));
        }
        Ok(self.sets.get(key))
    }

    fn sadd(&mut self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self.set_mut(key)?.insert(member.to_string()))
    }

    fn geo_mut(&mut self, key: &str) -> Result<&mut GeoSet, StoreError> {
        if self.strings.contains_key(key) || self.sets.contains_key(key) {
            return Err(StoreError::WrongType(key.to_string()));
        }
        Ok(self.geo.entry(key.to_string()).or_default())
    }

    fn apply(&mut self, op: StoreOp) -> Result<(), StoreError> {
        match op {
            StoreOp::Set { key, value } => self.set(&key, value),
            StoreOp::SAdd { key, member } => self.sadd(&key, &member).map(|_| ()),
            StoreOp::GeoAdd {
                key,
                lon,
                lat,
                member,
            } => {
                self.geo_mut(&key)?.insert(&member, GeoCoord::new(lat, lon));
                Ok(())
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Keyspace>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let keyspace = self.lock()?;
        if keyspace.sets.contains_key(key) || keyspace.geo.contains_key(key) {
            return Err(StoreError::WrongType(key.to_string()));
        }
        Ok(keyspace.strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.lock()?.set(key, value)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut keyspace = self.lock()?;
        let removed = keyspace.strings.remove(key).is_some()
            | keyspace.sets.remove(key).is_some()
            | keyspace.geo.remove(key).is_some();
        Ok(removed)
    }

    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
    ) -> Result<bool, StoreError> {
        let mut keyspace = self.lock()?;
        if keyspace.strings.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        keyspace.set(key, value)?;
        Ok(true)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.lock()?.sadd(key, member)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut keyspace = self.lock()?;
        let removed = match keyspace.set_ref(key)? {
            Some(set) => set.contains(member),
            None => false,
        };
        if removed {
            keyspace.set_mut(key)?.remove(member);
        }
        Ok(removed)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let keyspace = self.lock()?;
        Ok(keyspace
            .set_ref(key)?
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let keyspace = self.lock()?;
        Ok(keyspace
            .set_ref(key)?
            .is_some_and(|set| set.contains(member)))
    }

    async fn smove(
        &self,
        source: &str,
        destination: &str,
        member: &str,
    ) -> Result<bool, StoreError> {
        let mut keyspace = self.lock()?;
        // Type-check the destination before touching the source.
        keyspace.set_ref(destination)?;
        let present = keyspace
            .set_ref(source)?
            .is_some_and(|set| set.contains(member));
        if !present {
            return Ok(false);
        }
        keyspace.set_mut(source)?.remove(member);
        keyspace.sadd(destination, member)?;
        Ok(true)
    }

    async fn geoadd(
        &self,
        key: &str,
        lon: f64,
        lat: f64,
        member: &str,
    ) -> Result<(), StoreError> {
        self.lock()?
            .geo_mut(key)?
            .insert(member, GeoCoord::new(lat, lon));
        Ok(())
    }

    async fn georadius(
        &self,
        key: &str,
        lon: f64,
        lat: f64,
        radius_km: f64,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let mut keyspace = self.lock()?;
        if keyspace.strings.contains_key(key) || keyspace.sets.contains_key(key) {
            return Err(StoreError::WrongType(key.to_string()));
        }
        Ok(match keyspace.geo.get_mut(key) {
            Some(set) => set.radius(GeoCoord::new(lat, lon), radius_km),
            None => Vec::new(),
        })
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> Result<(), StoreError> {
        let mut keyspace = self.lock()?;
        for op in ops {
            keyspace.apply(op)?;
        }
        Ok(())
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        let mut keyspace = self.lock()?;
        *keyspace = Keyspace::default();
        Ok(())
    }
}
