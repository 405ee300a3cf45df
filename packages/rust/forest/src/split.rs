//! Stratified train/test partitioning.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use injuryclass_shared::{InjuryClassError, Result};

/// Row indices of the two partitions, each sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices so each class keeps roughly `test_fraction` of its rows
/// in the test partition.
///
/// Every class keeps at least one row in train; a class with a single row
/// therefore never reaches the test partition. The result depends only on
/// `y`, `test_fraction` and `seed`.
pub fn stratified_split(
    y: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(InjuryClassError::validation(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }

    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (row, &label) in y.iter().enumerate() {
        let bucket = by_class.get_mut(label).ok_or_else(|| {
            InjuryClassError::validation(format!("label {label} out of range for {n_classes} classes"))
        })?;
        bucket.push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(y.len());
    let mut test = Vec::new();

    for mut rows in by_class {
        if rows.is_empty() {
            continue;
        }
        rows.shuffle(&mut rng);
        let wanted = (rows.len() as f64 * test_fraction).round() as usize;
        let n_test = wanted.min(rows.len() - 1);
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(SplitIndices { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_class_proportions() {
        let mut y = vec![0; 50];
        y.extend(vec![1; 30]);
        y.extend(vec![2; 20]);

        let split = stratified_split(&y, 3, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);

        let test_of = |c: usize| split.test.iter().filter(|&&i| y[i] == c).count();
        assert_eq!(test_of(0), 10);
        assert_eq!(test_of(1), 6);
        assert_eq!(test_of(2), 4);
    }

    #[test]
    fn partitions_are_disjoint_and_complete() {
        let y: Vec<usize> = (0..37).map(|i| i % 4).collect();
        let split = stratified_split(&y, 4, 0.25, 7).unwrap();

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..37).collect::<Vec<_>>());
    }

    #[test]
    fn singleton_class_stays_in_train() {
        let y = vec![0, 0, 0, 0, 0, 1];
        let split = stratified_split(&y, 2, 0.5, 1).unwrap();
        assert!(split.train.contains(&5));
        assert!(!split.test.contains(&5));
    }

    #[test]
    fn deterministic_for_a_seed() {
        let y: Vec<usize> = (0..40).map(|i| i % 3).collect();
        let a = stratified_split(&y, 3, 0.2, 99).unwrap();
        let b = stratified_split(&y, 3, 0.2, 99).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_bad_fraction_and_labels() {
        assert!(stratified_split(&[0, 1], 2, 0.0, 1).is_err());
        assert!(stratified_split(&[0, 1], 2, 1.0, 1).is_err());
        assert!(stratified_split(&[0, 3], 2, 0.5, 1).is_err());
    }
}
