// ImageDatasetBuilder — one-stop configuration for directory-backed streams
//
// Scans a directory of class subfolders and assembles the full pipeline:
// index → split → encode labels → parallel decode → shuffle/batch/prefetch.
// Every option is validated before any directory scan or file I/O.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use stoat_core::{ColorMode, Error, Interpolation, Result};

use crate::decode::LoadOptions;
use crate::index::{index_directory, IndexOptions};
use crate::labels::{encode_labels, LabelMode, LabelTensor, Labels};
use crate::pipeline::{decode_stream, Batch, DatasetStream, DecodePolicy, Parallelism, Sample};
use crate::split::{split_samples, Subset};

/// What the shuffle stage reorders.
///
/// `Sample` shuffles individual samples before batching. `Batch` reproduces
/// the weaker ordering some pipelines default to — batches are formed first
/// and only their order is randomized, never the membership within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShuffleGranularity {
    #[default]
    Sample,
    Batch,
}

/// A fully-assembled pipeline: individual samples when unbatched, collated
/// batches otherwise.
pub enum ImageDataset {
    Samples(DatasetStream<Sample>),
    Batches(DatasetStream<Batch>),
}

impl std::fmt::Debug for ImageDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageDataset::Samples(s) => f
                .debug_tuple("Samples")
                .field(&s.class_names())
                .finish(),
            ImageDataset::Batches(s) => f
                .debug_tuple("Batches")
                .field(&s.class_names())
                .finish(),
        }
    }
}

impl ImageDataset {
    /// The ordered class names the dataset was built from.
    pub fn class_names(&self) -> &[String] {
        match self {
            ImageDataset::Samples(s) => s.class_names(),
            ImageDataset::Batches(s) => s.class_names(),
        }
    }

    pub fn is_batched(&self) -> bool {
        matches!(self, ImageDataset::Batches(_))
    }

    /// The sample stream, if the dataset was built unbatched.
    pub fn samples(self) -> Option<DatasetStream<Sample>> {
        match self {
            ImageDataset::Samples(s) => Some(s),
            ImageDataset::Batches(_) => None,
        }
    }

    /// The batch stream, if the dataset was built with a batch size.
    pub fn batches(self) -> Option<DatasetStream<Batch>> {
        match self {
            ImageDataset::Samples(_) => None,
            ImageDataset::Batches(s) => Some(s),
        }
    }
}

/// Builder for directory-backed image datasets.
///
/// ```no_run
/// use stoat_data::{ImageDatasetBuilder, Subset};
///
/// let (train, val) = ImageDatasetBuilder::new("photos/")
///     .image_size(180, 180)
///     .validation_split(Some(0.2))
///     .subset(Some(Subset::Both))
///     .seed(Some(1337))
///     .build_split()?;
/// # Ok::<(), stoat_core::Error>(())
/// ```
///
/// With `labels: Labels::None` the stream yields images only and
/// `label_mode` is ignored.
#[derive(Debug, Clone)]
pub struct ImageDatasetBuilder {
    directory: PathBuf,
    labels: Labels,
    label_mode: Option<LabelMode>,
    class_names: Option<Vec<String>>,
    color_mode: ColorMode,
    batch_size: Option<usize>,
    image_size: (usize, usize),
    shuffle: bool,
    seed: Option<u64>,
    validation_split: Option<f32>,
    subset: Option<Subset>,
    interpolation: Interpolation,
    follow_links: bool,
    crop_to_aspect_ratio: bool,
    shuffle_granularity: ShuffleGranularity,
    decode_policy: DecodePolicy,
    parallelism: Parallelism,
    prefetch: Option<usize>,
    drop_remainder: bool,
}

impl ImageDatasetBuilder {
    /// Start a builder rooted at the given directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            labels: Labels::Inferred,
            label_mode: Some(LabelMode::Int),
            class_names: None,
            color_mode: ColorMode::Rgb,
            batch_size: Some(32),
            image_size: (256, 256),
            shuffle: true,
            seed: None,
            validation_split: None,
            subset: None,
            interpolation: Interpolation::Bilinear,
            follow_links: false,
            crop_to_aspect_ratio: false,
            shuffle_granularity: ShuffleGranularity::Sample,
            decode_policy: DecodePolicy::Fail,
            parallelism: Parallelism::Auto,
            prefetch: Some(2),
            drop_remainder: false,
        }
    }

    pub fn labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn label_mode(mut self, mode: Option<LabelMode>) -> Self {
        self.label_mode = mode;
        self
    }

    pub fn class_names(mut self, names: Option<Vec<String>>) -> Self {
        self.class_names = names;
        self
    }

    pub fn color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = mode;
        self
    }

    /// Samples per batch; `None` leaves the stream unbatched.
    pub fn batch_size(mut self, size: Option<usize>) -> Self {
        self.batch_size = size;
        self
    }

    /// Target decode size as `(height, width)`.
    pub fn image_size(mut self, height: usize, width: usize) -> Self {
        self.image_size = (height, width);
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Fraction of samples reserved for validation; requires `subset`.
    pub fn validation_split(mut self, fraction: Option<f32>) -> Self {
        self.validation_split = fraction;
        self
    }

    /// Which partition to materialize; requires `validation_split`.
    pub fn subset(mut self, subset: Option<Subset>) -> Self {
        self.subset = subset;
        self
    }

    pub fn interpolation(mut self, interp: Interpolation) -> Self {
        self.interpolation = interp;
        self
    }

    /// Accepted for interface compatibility; symlinked subdirectories are
    /// not currently followed.
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Center-crop to the target aspect ratio before resizing.
    pub fn crop_to_aspect_ratio(mut self, crop: bool) -> Self {
        self.crop_to_aspect_ratio = crop;
        self
    }

    pub fn shuffle_granularity(mut self, granularity: ShuffleGranularity) -> Self {
        self.shuffle_granularity = granularity;
        self
    }

    /// What to do when a file fails to decode mid-iteration.
    pub fn decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.decode_policy = policy;
        self
    }

    pub fn parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Elements produced ahead of the consumer; `None` disables the stage.
    pub fn prefetch(mut self, depth: Option<usize>) -> Self {
        self.prefetch = depth;
        self
    }

    /// Drop the final batch when it is smaller than `batch_size`.
    pub fn drop_remainder(mut self, drop: bool) -> Self {
        self.drop_remainder = drop;
        self
    }

    /// Assemble the configured subset (`None`, `Training` or `Validation`).
    ///
    /// `Subset::Both` yields two streams and goes through
    /// [`build_split`](Self::build_split) instead.
    pub fn build(self) -> Result<ImageDataset> {
        self.validate()?;
        if self.subset == Some(Subset::Both) {
            return Err(Error::Configuration(
                "subset \"both\" produces two streams; call build_split()".to_string(),
            ));
        }
        if self.subset.is_some() && self.shuffle && self.seed.is_none() {
            warn!(
                "shuffling with a validation split but no seed: training and \
                 validation subsets from separate builds may overlap"
            );
        }

        let prepared = self.prepare()?;
        let (paths, labels) = match self.subset {
            None => (prepared.paths, prepared.labels),
            Some(subset) => {
                let fraction = self.validation_split.unwrap_or(0.0);
                partition(prepared.paths, prepared.labels, fraction, subset)?
            }
        };
        // Validation iterates in index order; only training re-shuffles.
        let stream_shuffle = self.subset != Some(Subset::Validation);
        Ok(self.assemble(paths, labels, prepared.class_names, stream_shuffle))
    }

    /// Assemble both partitions at once as `(training, validation)`.
    ///
    /// Indexing happens once, so the two streams are disjoint and together
    /// cover every file exactly once, seeded or not.
    pub fn build_split(self) -> Result<(ImageDataset, ImageDataset)> {
        self.validate()?;
        let fraction = self.validation_split.ok_or_else(|| {
            Error::Configuration("build_split() requires validation_split".to_string())
        })?;
        if let Some(subset @ (Subset::Training | Subset::Validation)) = self.subset {
            return Err(Error::Configuration(format!(
                "subset \"{}\" produces one stream; call build()",
                subset.name()
            )));
        }

        let prepared = self.prepare()?;
        let (train_paths, train_labels) = partition(
            prepared.paths.clone(),
            prepared.labels.clone(),
            fraction,
            Subset::Training,
        )?;
        let (val_paths, val_labels) =
            partition(prepared.paths, prepared.labels, fraction, Subset::Validation)?;

        let training = self.assemble(train_paths, train_labels, prepared.class_names.clone(), true);
        let validation = self.assemble(val_paths, val_labels, prepared.class_names, false);
        Ok((training, validation))
    }

    /// Option checks that need no I/O. Everything here fires before the
    /// directory is touched.
    fn validate(&self) -> Result<()> {
        let (h, w) = self.image_size;
        if h == 0 || w == 0 {
            return Err(Error::Configuration(format!(
                "image_size must be positive, received: ({h}, {w})"
            )));
        }
        if self.batch_size == Some(0) {
            return Err(Error::Configuration(
                "batch_size must be positive; use None for an unbatched stream".to_string(),
            ));
        }
        if let Some(f) = self.validation_split {
            if !(0.0..=1.0).contains(&f) {
                return Err(Error::Configuration(format!(
                    "validation_split must be between 0 and 1, received: {f}"
                )));
            }
        }
        if self.subset.is_some() != self.validation_split.is_some() {
            return Err(Error::Configuration(
                "if subset is set, validation_split must be set, and inversely".to_string(),
            ));
        }
        if self.class_names.is_some() && self.labels != Labels::Inferred {
            return Err(Error::Configuration(
                "class_names can only be supplied when labels are inferred".to_string(),
            ));
        }
        if let (Some(LabelMode::Binary), Some(names)) = (self.label_mode, &self.class_names) {
            if names.len() != 2 {
                return Err(Error::Configuration(format!(
                    "label_mode \"binary\" requires exactly 2 classes, found {}",
                    names.len()
                )));
            }
        }
        Ok(())
    }

    /// Index the directory and encode the full label array.
    fn prepare(&self) -> Result<Prepared> {
        let index = index_directory(
            &self.directory,
            IndexOptions::default()
                .labels(self.labels.clone())
                .class_names(self.class_names.clone())
                .shuffle(self.shuffle)
                .seed(self.seed)
                .follow_links(self.follow_links),
        )?;

        let labels = match (&self.labels, self.label_mode) {
            (Labels::None, _) | (_, None) => None,
            (_, Some(mode)) => Some(encode_labels(&index.labels, mode, index.num_classes())?),
        };

        Ok(Prepared {
            paths: index.paths,
            labels,
            class_names: Arc::new(index.class_names),
        })
    }

    /// Wire the decode stream and the requested stages for one subset.
    fn assemble(
        &self,
        paths: Vec<PathBuf>,
        labels: Option<Vec<LabelTensor>>,
        class_names: Arc<Vec<String>>,
        stream_shuffle: bool,
    ) -> ImageDataset {
        let load = LoadOptions {
            image_size: self.image_size,
            color_mode: self.color_mode,
            interpolation: self.interpolation,
            crop_to_aspect_ratio: self.crop_to_aspect_ratio,
        };
        let samples = decode_stream(
            Arc::new(paths),
            labels.map(Arc::new),
            class_names,
            Arc::new(load),
            self.decode_policy,
            self.parallelism,
        );
        let shuffling = stream_shuffle && self.shuffle;

        match self.batch_size {
            Some(size) => {
                let batches = match self.shuffle_granularity {
                    ShuffleGranularity::Sample => {
                        let samples = if shuffling {
                            samples.shuffle(size * 8, self.seed)
                        } else {
                            samples
                        };
                        samples.batch(size, self.drop_remainder)
                    }
                    ShuffleGranularity::Batch => {
                        let batches = samples.batch(size, self.drop_remainder);
                        if shuffling {
                            batches.shuffle(size * 8, self.seed)
                        } else {
                            batches
                        }
                    }
                };
                let batches = match self.prefetch {
                    Some(depth) => batches.prefetch(depth),
                    None => batches,
                };
                ImageDataset::Batches(batches)
            }
            None => {
                let samples = if shuffling {
                    samples.shuffle(1024, self.seed)
                } else {
                    samples
                };
                let samples = match self.prefetch {
                    Some(depth) => samples.prefetch(depth),
                    None => samples,
                };
                ImageDataset::Samples(samples)
            }
        }
    }
}

struct Prepared {
    paths: Vec<PathBuf>,
    labels: Option<Vec<LabelTensor>>,
    class_names: Arc<Vec<String>>,
}

/// Slice the path array (and label array, when present) to one subset.
fn partition(
    paths: Vec<PathBuf>,
    labels: Option<Vec<LabelTensor>>,
    fraction: f32,
    subset: Subset,
) -> Result<(Vec<PathBuf>, Option<Vec<LabelTensor>>)> {
    match labels {
        Some(labels) => {
            let (paths, labels) = split_samples(paths, labels, fraction, subset)?;
            Ok((paths, Some(labels)))
        }
        None => {
            let markers = vec![(); paths.len()];
            let (paths, _) = split_samples(paths, markers, fraction, subset)?;
            Ok((paths, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // All of these must fail before any directory access: the root given
    // here never exists.
    const NO_DIR: &str = "/stoat/never/exists";

    #[test]
    fn subset_requires_validation_split() {
        let err = ImageDatasetBuilder::new(NO_DIR)
            .subset(Some(Subset::Training))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("subset"));
    }

    #[test]
    fn validation_split_requires_subset() {
        let err = ImageDatasetBuilder::new(NO_DIR)
            .validation_split(Some(0.2))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn validation_split_out_of_range() {
        let err = ImageDatasetBuilder::new(NO_DIR)
            .validation_split(Some(1.5))
            .subset(Some(Subset::Training))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("between 0 and 1"));
    }

    #[test]
    fn zero_image_size() {
        let err = ImageDatasetBuilder::new(NO_DIR)
            .image_size(0, 128)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("image_size"));
    }

    #[test]
    fn zero_batch_size() {
        let err = ImageDatasetBuilder::new(NO_DIR)
            .batch_size(Some(0))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn class_names_only_with_inferred_labels() {
        let err = ImageDatasetBuilder::new(NO_DIR)
            .labels(Labels::Explicit(vec![0, 1]))
            .class_names(Some(vec!["a".to_string(), "b".to_string()]))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn binary_with_three_explicit_class_names() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let err = ImageDatasetBuilder::new(NO_DIR)
            .label_mode(Some(LabelMode::Binary))
            .class_names(Some(names))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("binary"));
    }

    #[test]
    fn both_subset_goes_through_build_split() {
        let err = ImageDatasetBuilder::new(NO_DIR)
            .validation_split(Some(0.5))
            .subset(Some(Subset::Both))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("build_split"));
    }

    #[test]
    fn build_split_requires_validation_split() {
        let err = ImageDatasetBuilder::new(NO_DIR).build_split().unwrap_err();
        assert!(err.to_string().contains("validation_split"));
    }

    #[test]
    fn build_split_rejects_single_subsets() {
        let err = ImageDatasetBuilder::new(NO_DIR)
            .validation_split(Some(0.5))
            .subset(Some(Subset::Validation))
            .build_split()
            .unwrap_err();
        assert!(err.to_string().contains("build()"));
    }
}
