// Split engine — positional training/validation partitioning

use stoat_core::{Error, Result};
use tracing::info;

/// Which partition of a split dataset to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    Training,
    Validation,
    /// Both partitions, returned as a (training, validation) pair.
    Both,
}

impl Subset {
    pub fn name(&self) -> &'static str {
        match self {
            Subset::Training => "training",
            Subset::Validation => "validation",
            Subset::Both => "both",
        }
    }
}

/// Partition two parallel arrays into a training or validation slice.
///
/// With `fraction = f` and `N` samples, the last `floor(f * N)` entries form
/// the validation set and the first `N - floor(f * N)` the training set.
/// Slices are purely positional and order-preserving: shuffle beforehand if
/// a randomized split is wanted.
///
/// `f = 0` yields an empty validation set, `f = 1` an empty training set;
/// values outside `[0, 1]` are a configuration error. `Subset::Both` is a
/// caller-level concern (call once per side) and is rejected here.
pub fn split_samples<P, L>(
    samples: Vec<P>,
    labels: Vec<L>,
    fraction: f32,
    subset: Subset,
) -> Result<(Vec<P>, Vec<L>)> {
    if !(0.0..=1.0).contains(&fraction) {
        return Err(Error::Configuration(format!(
            "validation_split must be between 0 and 1, received: {fraction}"
        )));
    }
    if samples.len() != labels.len() {
        return Err(Error::LengthMismatch {
            left_name: "samples",
            left: samples.len(),
            right_name: "labels",
            right: labels.len(),
        });
    }

    let n = samples.len();
    let num_val = (fraction as f64 * n as f64).floor() as usize;

    match subset {
        Subset::Training => {
            let keep = n - num_val;
            info!("using {keep} files for training");
            let mut samples = samples;
            let mut labels = labels;
            samples.truncate(keep);
            labels.truncate(keep);
            Ok((samples, labels))
        }
        Subset::Validation => {
            info!("using {num_val} files for validation");
            let start = n - num_val;
            let samples = samples.into_iter().skip(start).collect();
            let labels = labels.into_iter().skip(start).collect();
            Ok((samples, labels))
        }
        Subset::Both => Err(Error::Configuration(
            "split_samples partitions one subset at a time; call it once per side".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parallel(n: usize) -> (Vec<usize>, Vec<usize>) {
        ((0..n).collect(), (0..n).map(|i| i * 10).collect())
    }

    #[test]
    fn completeness() {
        // train ++ val reconstructs the original ordering exactly once
        let (s, l) = parallel(10);
        let (train_s, train_l) = split_samples(s.clone(), l.clone(), 0.3, Subset::Training).unwrap();
        let (val_s, val_l) = split_samples(s.clone(), l.clone(), 0.3, Subset::Validation).unwrap();

        assert_eq!(train_s.len() + val_s.len(), 10);
        let mut joined_s = train_s;
        joined_s.extend(val_s);
        assert_eq!(joined_s, s);
        let mut joined_l = train_l;
        joined_l.extend(val_l);
        assert_eq!(joined_l, l);
    }

    #[test]
    fn floor_semantics() {
        let (s, l) = parallel(7);
        // floor(0.5 * 7) = 3 validation entries
        let (val, _) = split_samples(s, l, 0.5, Subset::Validation).unwrap();
        assert_eq!(val, vec![4, 5, 6]);
    }

    #[test]
    fn zero_fraction_empty_validation() {
        let (s, l) = parallel(5);
        let (val, _) = split_samples(s, l, 0.0, Subset::Validation).unwrap();
        assert!(val.is_empty());
    }

    #[test]
    fn full_fraction_empty_training() {
        let (s, l) = parallel(5);
        let (train, _) = split_samples(s, l, 1.0, Subset::Training).unwrap();
        assert!(train.is_empty());
    }

    #[test]
    fn fraction_out_of_range() {
        let (s, l) = parallel(5);
        let err = split_samples(s, l, 1.5, Subset::Training).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn mismatched_arrays() {
        let err = split_samples(vec![1, 2, 3], vec![1], 0.5, Subset::Training).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { .. }));
    }
}
