use anyhow::{bail, Result};
use rand::seq::SliceRandom;
use signnet_core::seeded_rng;

/// Shuffle `0..len` with `seed` and cut it into chunks of `chunk_size`.
///
/// Every chunk but the last holds exactly `chunk_size` indices; the last holds the
/// remainder. Nothing is emitted for an empty dataset, so the result always has
/// `ceil(len / chunk_size)` non-empty chunks.
pub fn random_mini_batches(len: usize, chunk_size: usize, seed: u64) -> Result<Vec<Vec<usize>>> {
    if chunk_size == 0 {
        bail!("minibatch size must be at least 1");
    }

    let mut permutation: Vec<usize> = (0..len).collect();
    permutation.shuffle(&mut seeded_rng(seed));

    Ok(permutation
        .chunks(chunk_size)
        .map(<[usize]>::to_vec)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_ceil_chunks_without_empty_tail() {
        for (len, size) in [(0, 4), (1, 4), (20, 5), (21, 5), (99, 100), (100, 100), (1000, 7)] {
            let chunks = random_mini_batches(len, size, 3).unwrap();

            assert_eq!(chunks.len(), len.div_ceil(size), "len {len} size {size}");
            assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
            assert_eq!(chunks.iter().map(Vec::len).sum::<usize>(), len);
            assert!(chunks.iter().rev().skip(1).all(|chunk| chunk.len() == size));
        }
    }

    #[test]
    fn chunks_form_a_permutation() {
        let mut seen: Vec<usize> = random_mini_batches(57, 10, 11).unwrap().concat();
        seen.sort_unstable();
        assert_eq!(seen, (0..57).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_partition() {
        assert_eq!(
            random_mini_batches(64, 10, 42).unwrap(),
            random_mini_batches(64, 10, 42).unwrap()
        );
        assert_ne!(
            random_mini_batches(64, 10, 42).unwrap(),
            random_mini_batches(64, 10, 43).unwrap()
        );
    }

    #[test]
    fn zero_chunk_size_is_an_error() {
        assert!(random_mini_batches(10, 0, 0).is_err());
    }
}
