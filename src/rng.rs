use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

const ID_ALPHABET: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_-";
const ID_LEN: usize = 8;

/// Hands out short opaque ids from named, independently seeded streams.
///
/// Each stream (`"tile"`, `"unit"`, ...) is derived from the master seed the
/// first time it is used, so the ids one stream produces do not depend on how
/// many ids another stream has drawn.
pub struct IdGenerator {
    inner: Mutex<Streams>,
}

struct Streams {
    master: u64,
    by_name: HashMap<String, ChaCha8Rng>,
}

impl IdGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: Mutex::new(Streams {
                master: seed,
                by_name: HashMap::new(),
            }),
        }
    }

    /// Restarts every stream from `seed`.
    pub fn reseed(&self, seed: u64) {
        let mut streams = self.lock();
        streams.master = seed;
        streams.by_name.clear();
    }

    pub fn next_id(&self, stream: &str) -> String {
        let mut streams = self.lock();
        let master = streams.master;
        let rng = streams
            .by_name
            .entry(stream.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(derive_seed(master, stream)));
        short_id(rng)
    }

    fn lock(&self) -> MutexGuard<'_, Streams> {
        // Streams hold no invariant a panicking holder could break.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn derive_seed(master: u64, stream: &str) -> u64 {
    let mut seeder = ChaCha8Rng::seed_from_u64(master);
    let mut seed = seeder.next_u64();
    for byte in stream.bytes() {
        seed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(u64::from(byte) ^ 1442695040888963407);
    }
    seed
}

fn short_id(rng: &mut impl Rng) -> String {
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
