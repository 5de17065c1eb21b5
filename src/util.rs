use std::collections::HashMap;

use fixedbitset::FixedBitSet;

use crate::error::{Error, Result};

/// Allocate a vector of `len` copies of `value`, reporting allocation failure
/// instead of aborting.
pub(crate) fn try_filled_vec<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut array = Vec::new();
    array.try_reserve_exact(len).map_err(|_| Error::AllocationFailed { len })?;
    array.resize(len, value);
    Ok(array)
}

/// Renumber community ids to `0..k` in first-seen order, returning `k`.
pub fn normalize(communities: &mut [usize]) -> usize {
    let mut renumbered = HashMap::<usize, usize>::new();
    for community in communities.iter_mut() {
        let next_id = renumbered.len();
        *community = *renumbered.entry(*community).or_insert(next_id);
    }
    renumbered.len()
}

/// Count the distinct community ids, given that every id is below `bound`.
pub fn count_distinct(communities: &[usize], bound: usize) -> usize {
    let mut seen = FixedBitSet::with_capacity(bound);
    for &community in communities {
        seen.insert(community);
    }
    seen.count_ones(..)
}

#[cfg(test)]
mod test_util {
    use crate::util::{count_distinct, normalize, try_filled_vec};

    #[test]
    fn test_normalize() {
        let mut communities = vec![7, 7, 3, 9, 3, 7];
        let count = normalize(&mut communities);
        assert_eq!(count, 3);
        assert_eq!(communities, vec![0, 0, 1, 2, 1, 0]);
    }

    #[test]
    fn test_normalize_empty() {
        let mut communities: Vec<usize> = vec![];
        assert_eq!(normalize(&mut communities), 0);
    }

    #[test]
    fn test_count_distinct() {
        assert_eq!(count_distinct(&[4, 1, 4, 0, 1], 5), 3);
        assert_eq!(count_distinct(&[], 0), 0);
    }

    #[test]
    fn test_try_filled_vec() {
        let array = try_filled_vec(4, 1.5f64).unwrap();
        assert_eq!(array, vec![1.5; 4]);
        assert!(try_filled_vec(usize::MAX, 0u64).is_err());
    }
}
