//! Persistence adapter.
//!
//! The game only needs a small key/value surface: string records, string
//! sets, and one geo set answering radius queries. Anything that can offer
//! those primitives (Redis being the obvious candidate) can sit behind
//! [`Store`]; [`MemoryStore`] is the process-local implementation.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),
    #[error("key '{0}' holds a value of the wrong type")]
    WrongType(String),
}

/// One write in a pipelined batch.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Set { key: String, value: String },
    SAdd { key: String, member: String },
    GeoAdd {
        key: String,
        lon: f64,
        lat: f64,
        member: String,
    },
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Writes `value` only if the current value equals `expected`
    /// (`None` meaning "key absent"). Returns whether the write happened.
    async fn compare_and_set(
        &self,
        key: &str,
        expected: Option<&str>,
        value: String,
    ) -> Result<bool, StoreError>;

    /// Returns whether the member was newly added.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Atomically moves `member` from `source` to `destination`. Returns
    /// `false` (and changes nothing) when `member` is not in `source`.
    async fn smove(
        &self,
        source: &str,
        destination: &str,
        member: &str,
    ) -> Result<bool, StoreError>;

    async fn geoadd(&self, key: &str, lon: f64, lat: f64, member: &str)
        -> Result<(), StoreError>;

    /// Members within `radius_km` of (`lon`, `lat`), nearest first, paired
    /// with their distance in km.
    async fn georadius(
        &self,
        key: &str,
        lon: f64,
        lat: f64,
        radius_km: f64,
    ) -> Result<Vec<(String, f64)>, StoreError>;

    /// Applies a batch of writes in one round trip.
    async fn apply(&self, ops: Vec<StoreOp>) -> Result<(), StoreError>;

    async fn flush_all(&self) -> Result<(), StoreError>;
}
