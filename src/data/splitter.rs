// ============================================================
// Layer 4 — Split Subsampling
// ============================================================
// The train/validation membership comes from the split index
// files; this module only thins a split down to a fraction of
// its size (`--sample-ratio`) and checks that the two splits
// do not share molecules.
//
// The subsample is a seeded Fisher-Yates shuffle followed by
// truncation, so the same seed always keeps the same molecules.
//
// Reference: rand crate documentation

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::HashSet;

/// Keep `ceil(len * ratio)` randomly chosen entries of `indices`.
///
/// A ratio of 1.0 returns the indices untouched (original order).
pub fn subsample<T>(mut indices: Vec<T>, ratio: f64, seed: u64) -> Vec<T> {
    if ratio >= 1.0 {
        return indices;
    }

    let total = indices.len();
    let keep  = ((total as f64) * ratio).ceil() as usize;
    let keep  = keep.min(total);

    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices.truncate(keep);

    tracing::debug!("Subsampled split: kept {} of {} ({:.0}%)", keep, total, ratio * 100.0);
    indices
}

/// Fail if any molecule index appears in both splits.
pub fn ensure_disjoint(train: &[usize], val: &[usize]) -> Result<()> {
    let train: HashSet<usize> = train.iter().copied().collect();
    let shared: Vec<usize> = val.iter().copied().filter(|i| train.contains(i)).collect();
    ensure!(
        shared.is_empty(),
        "train and val splits overlap on {} molecule(s), e.g. index {}",
        shared.len(),
        shared[0],
    );
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_ratio_keeps_order() {
        let items: Vec<usize> = (0..10).collect();
        assert_eq!(subsample(items.clone(), 1.0, 7), items);
    }

    #[test]
    fn test_ratio_rounds_up() {
        let items: Vec<usize> = (0..10).collect();
        assert_eq!(subsample(items.clone(), 0.25, 7).len(), 3);
        assert_eq!(subsample(items, 0.01, 7).len(), 1);
    }

    #[test]
    fn test_same_seed_same_subset() {
        let items: Vec<usize> = (0..100).collect();
        assert_eq!(subsample(items.clone(), 0.5, 42), subsample(items, 0.5, 42));
    }

    #[test]
    fn test_empty_split() {
        assert!(subsample(Vec::<usize>::new(), 0.5, 1).is_empty());
    }

    #[test]
    fn test_overlap_detected() {
        assert!(ensure_disjoint(&[0, 1, 2], &[3, 4]).is_ok());
        assert!(ensure_disjoint(&[0, 1, 2], &[2, 4]).is_err());
    }
}
