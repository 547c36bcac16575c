// ============================================================
// Layer 4 — Stratified Train/Test Splitter
// ============================================================
// Splits samples so every class keeps (roughly) the same
// proportion in the training and the test set.
//
// How it works:
//   1. Group sample positions by label (BTreeMap, so groups are
//      visited in label order every time)
//   2. Shuffle each group with ONE seeded StdRng
//   3. The first round(len * test_fraction) of each group go
//      to the test set, the rest to training. For a fraction
//      strictly between 0 and 1 that count is clamped to
//      1..=len-1, so a class with two or more members always
//      appears on both sides.
//
// Same seed + same input → same split, run after run.
// A class with a single member ends up entirely in training.
//
// Reference: rand crate documentation (SeedableRng, SliceRandom)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::collections::BTreeMap;

/// Split `samples` into (train, test), stratified by `label_of`.
pub fn stratified_split<T>(
    samples:       Vec<T>,
    label_of:      impl Fn(&T) -> usize,
    test_fraction: f64,
    seed:          u64,
) -> (Vec<T>, Vec<T>) {
    let test_fraction = test_fraction.clamp(0.0, 1.0);

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, s) in samples.iter().enumerate() {
        groups.entry(label_of(s)).or_default().push(i);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut test_positions  = Vec::new();
    let mut train_positions = Vec::new();

    for positions in groups.values_mut() {
        positions.shuffle(&mut rng);
        let n_test = test_count(positions.len(), test_fraction);
        test_positions.extend_from_slice(&positions[..n_test]);
        train_positions.extend_from_slice(&positions[n_test..]);
    }

    // Move each sample out exactly once
    let mut slots: Vec<Option<T>> = samples.into_iter().map(Some).collect();
    let mut take = |positions: &[usize]| -> Vec<T> {
        positions.iter().filter_map(|&i| slots[i].take()).collect()
    };
    let train = take(&train_positions);
    let test  = take(&test_positions);

    tracing::debug!(
        "Stratified split: {} train, {} test across {} classes",
        train.len(),
        test.len(),
        groups.len()
    );

    (train, test)
}

/// Rows of a class of `len` members that go to the test set.
fn test_count(len: usize, test_fraction: f64) -> usize {
    if len < 2 {
        return 0;
    }
    let n_test = ((len as f64) * test_fraction).round() as usize;
    if test_fraction > 0.0 && test_fraction < 1.0 {
        n_test.clamp(1, len - 1)
    } else {
        n_test.min(len)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    /// 50 of class 0, 30 of class 1, 20 of class 2
    fn labelled() -> Vec<(usize, usize)> {
        (0..100)
            .map(|i| (i, if i < 50 { 0 } else if i < 80 { 1 } else { 2 }))
            .collect()
    }

    #[test]
    fn test_split_sizes_are_stratified() {
        let (train, test) = stratified_split(labelled(), |s| s.1, 0.2, 42);
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);

        let count = |v: &[(usize, usize)], l| v.iter().filter(|s| s.1 == l).count();
        assert_eq!(count(&test, 0), 10);
        assert_eq!(count(&test, 1), 6);
        assert_eq!(count(&test, 2), 4);
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = stratified_split(labelled(), |s| s.1, 0.2, 7);
        let b = stratified_split(labelled(), |s| s.1, 0.2, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_sample_lost_or_duplicated() {
        let (train, test) = stratified_split(labelled(), |s| s.1, 0.2, 1);
        let mut ids: Vec<usize> = train.iter().chain(test.iter()).map(|s| s.0).collect();
        ids.sort();
        assert_eq!(ids, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_every_class_in_both_splits() {
        let items: Vec<(usize, usize)> = (0..6).map(|i| (i, i % 3)).collect();
        let (train, test) = stratified_split(items, |s| s.1, 0.5, 42);
        for label in 0..3 {
            assert!(train.iter().any(|s| s.1 == label));
            assert!(test.iter().any(|s| s.1 == label));
        }
    }

    #[test]
    fn test_two_member_class_kept_on_both_sides() {
        // 10 of class 0, 2 of class 1
        let items: Vec<(usize, usize)> = (0..12).map(|i| (i, usize::from(i >= 10))).collect();

        for fraction in [0.2, 0.8] {
            let (train, test) = stratified_split(items.clone(), |s| s.1, fraction, 42);
            for label in 0..2 {
                assert!(train.iter().any(|s| s.1 == label), "class {label} missing from train at {fraction}");
                assert!(test.iter().any(|s| s.1 == label), "class {label} missing from test at {fraction}");
            }
        }
    }

    #[test]
    fn test_single_member_class_stays_in_training() {
        let items = vec![(0, 0), (1, 0), (2, 0), (3, 0), (4, 1)];
        let (train, test) = stratified_split(items, |s| s.1, 0.5, 42);
        assert!(train.iter().any(|s| s.1 == 1));
        assert!(!test.iter().any(|s| s.1 == 1));
    }

    #[test]
    fn test_test_count_bounds() {
        assert_eq!(test_count(2, 0.2), 1);
        assert_eq!(test_count(2, 0.8), 1);
        assert_eq!(test_count(10, 0.2), 2);
        assert_eq!(test_count(1, 0.5), 0);
        assert_eq!(test_count(5, 0.0), 0);
        assert_eq!(test_count(5, 1.0), 5);
    }

    #[test]
    fn test_empty_dataset() {
        let (train, test) = stratified_split(Vec::<(usize, usize)>::new(), |s| s.1, 0.2, 42);
        assert!(train.is_empty());
        assert!(test.is_empty());
    }
}
