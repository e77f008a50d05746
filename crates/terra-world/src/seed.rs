//! Per-chunk seed derivation.
//!
//! Combines the world seed with a chunk coordinate into a well-distributed
//! `u64`, so every chunk draws from its own reproducible RNG regardless of
//! which worker thread processes it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use terra_voxel::ChunkCoord;

/// Derives a per-chunk seed from the world seed and chunk coordinate.
pub fn derive_chunk_seed(world_seed: u64, coord: ChunkCoord) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    coord.x.hash(&mut hasher);
    coord.y.hash(&mut hasher);
    coord.z.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic RNG for a chunk. `stream` separates independent uses of
/// the same chunk seed.
pub fn chunk_rng(world_seed: u64, coord: ChunkCoord, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(derive_chunk_seed(world_seed, coord));
    rng.set_stream(stream);
    rng
}
