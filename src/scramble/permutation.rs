//! Deterministic key-seeded row permutations

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derive the row permutation for a frame of `n` rows from `key`.
///
/// The result is a bijection over `[0, n)`: the identity sequence shuffled
/// with a Fisher–Yates pass driven by a ChaCha generator seeded from `key`.
/// ChaCha keeps the stream stable across platforms and releases, so the same
/// `(key, n)` pair always yields the same permutation — a stream scrambled
/// today stays unscramblable tomorrow.
///
/// The shuffle order (top-down, `i` from `n-1` to `1`, `j` drawn from
/// `[0, i]`) is part of the on-disk contract: changing it changes every
/// permutation and breaks round-trips against previously written output.
pub fn generate(key: i64, n: usize) -> Vec<usize> {
    let mut rows: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(key as u64);

    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        rows.swap(i, j);
    }

    rows
}
