// ============================================================
// Layer 4 — Train/Test Splitter and K-Fold
// ============================================================
// Two ways of partitioning row indices:
//
//   train_test_split — one seeded shuffle, then the first
//                      ceil(n * test_fraction) rows are the
//                      held-out test set, the rest train
//
//   KFold            — k contiguous folds over 0..n, NOT
//                      shuffled; the first n % k folds get one
//                      extra row. Used by the hyperparameter
//                      search for cross-validation.
//
// Both work on indices only; callers gather rows with
// DataTable::take_rows, so no data is copied twice.
//
// The shuffle is Fisher-Yates (rand::seq::SliceRandom) driven
// by StdRng::seed_from_u64; the same seed gives the same
// partition on every run.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::error::PipelineError;

/// Seeded shuffle-and-split of `n_rows` row indices.
///
/// # Returns
/// `(train_indices, test_indices)`
///
/// # Errors
/// `test_fraction` outside (0, 1), or a split that leaves either
/// side empty.
pub fn train_test_split(
    n_rows:        usize,
    test_fraction: f64,
    seed:          u64,
) -> Result<(Vec<usize>, Vec<usize>), PipelineError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(PipelineError::invalid_param(
            "test_size",
            test_fraction,
            "must be strictly between 0 and 1",
        ));
    }

    let n_test  = (n_rows as f64 * test_fraction).ceil() as usize;
    let n_train = n_rows.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(PipelineError::Schema(format!(
            "cannot split {n_rows} rows into non-empty train and test sets"
        )));
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    let test  = indices;

    tracing::debug!(
        "Dataset split: {} training, {} test ({}% / {}%)",
        train.len(),
        test.len(),
        (train.len() * 100) / n_rows,
        (test.len()  * 100) / n_rows,
    );

    Ok((train, test))
}

/// K-fold cross-validator over contiguous, unshuffled folds.
#[derive(Debug, Clone, Copy)]
pub struct KFold {
    n_splits: usize,
}

impl KFold {
    pub fn new(n_splits: usize) -> Result<Self, PipelineError> {
        if n_splits < 2 {
            return Err(PipelineError::invalid_param("cv", n_splits, "must be at least 2"));
        }
        Ok(Self { n_splits })
    }

    /// (train_indices, test_indices) for each fold.
    pub fn split(&self, n_samples: usize) -> Result<Vec<(Vec<usize>, Vec<usize>)>, PipelineError> {
        if n_samples < self.n_splits {
            return Err(PipelineError::invalid_param(
                "cv",
                self.n_splits,
                format!("cannot exceed the number of training rows ({n_samples})"),
            ));
        }

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let size = if i < remainder { fold_size + 1 } else { fold_size };
            let end  = start + size;

            let test: Vec<usize>  = (start..end).collect();
            let train: Vec<usize> = (0..start).chain(end..n_samples).collect();
            folds.push((train, test));

            start = end;
        }
        Ok(folds)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let (train, test) = train_test_split(100, 0.2, 42).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(),  20);
    }

    #[test]
    fn test_test_size_rounds_up() {
        // 0.2 * 3 = 0.6 → 1 test row
        let (train, test) = train_test_split(3, 0.2, 42).unwrap();
        assert_eq!(test.len(),  1);
        assert_eq!(train.len(), 2);
    }

    #[test]
    fn test_all_rows_preserved_once() {
        let (mut train, test) = train_test_split(57, 0.2, 7).unwrap();
        train.extend(test);
        train.sort_unstable();
        assert_eq!(train, (0..57).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_partition() {
        let a = train_test_split(1000, 0.2, 42).unwrap();
        let b = train_test_split(1000, 0.2, 42).unwrap();
        assert_eq!(a, b);

        let c = train_test_split(1000, 0.2, 43).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(train_test_split(10, 0.0, 1).is_err());
        assert!(train_test_split(10, 1.0, 1).is_err());
        assert!(train_test_split(1, 0.5, 1).is_err());
    }

    #[test]
    fn test_kfold_covers_each_index_once() {
        let folds = KFold::new(5).unwrap().split(23).unwrap();
        assert_eq!(folds.len(), 5);

        let mut seen: Vec<usize> = folds.iter().flat_map(|(_, t)| t.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());

        // 23 = 5*4 + 3 → first three folds have 5 rows
        let sizes: Vec<usize> = folds.iter().map(|(_, t)| t.len()).collect();
        assert_eq!(sizes, vec![5, 5, 5, 4, 4]);

        for (train, test) in &folds {
            assert_eq!(train.len() + test.len(), 23);
            assert!(test.iter().all(|i| !train.contains(i)));
        }
    }

    #[test]
    fn test_kfold_rejects_bad_k() {
        assert!(KFold::new(1).is_err());
        assert!(KFold::new(5).unwrap().split(4).is_err());
    }
}
