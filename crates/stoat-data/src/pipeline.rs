// DatasetStream — lazy, composable shuffle / batch / prefetch / map stages
//
// A stream is a factory of boxed iterators plus the resolved class names.
// Stages wrap the factory, so construction stays cheap and every `iter()`
// call replays the pipeline from the start: an unshuffled (or seeded)
// stream reproduces the same elements on every iteration.
//
// The base producer decodes files in index chunks with rayon; a chunk's
// results are collected in input order, so parallel decode is
// order-preserving and seed-reproducible end to end.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::warn;

use stoat_core::{bail, Error, ImageTensor, Result};

use crate::decode::{load_image, LoadOptions};
use crate::labels::LabelTensor;

// Element types

/// One stream element: a decoded image and, unless labels were disabled,
/// its encoded label.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: ImageTensor,
    pub label: Option<LabelTensor>,
}

/// A group of images collated into one contiguous N×H×W×C buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    data: Vec<f32>,
    len: usize,
    height: usize,
    width: usize,
    channels: usize,
}

impl ImageBatch {
    /// Stack images into one buffer. All images must share a shape.
    pub fn from_images(images: Vec<ImageTensor>) -> Result<Self> {
        let first = match images.first() {
            Some(t) => t,
            None => bail!("cannot collate an empty batch"),
        };
        let (height, width, channels) = first.shape();
        let mut data = Vec::with_capacity(images.len() * first.len());
        for img in &images {
            if img.shape() != (height, width, channels) {
                bail!(
                    "cannot collate images of different shapes: {:?} vs {:?}",
                    img.shape(),
                    (height, width, channels)
                );
            }
            data.extend_from_slice(img.data());
        }
        Ok(Self {
            data,
            len: images.len(),
            height,
            width,
            channels,
        })
    }

    /// Shape as `(batch, height, width, channels)`.
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.len, self.height, self.width, self.channels)
    }

    /// Number of images in the batch.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The flat NHWC buffer.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// The HWC slice of the i-th image.
    pub fn image(&self, i: usize) -> &[f32] {
        let stride = self.height * self.width * self.channels;
        &self.data[i * stride..(i + 1) * stride]
    }
}

/// Labels of one batch, collated per encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelBatch {
    /// Shape `(batch,)` of class indices.
    Int(Vec<i64>),
    /// Shape `(batch,)` of 0.0/1.0 scalars.
    Binary(Vec<f32>),
    /// Shape `(batch, num_classes)` one-hot rows, row-major.
    Categorical { data: Vec<f32>, num_classes: usize },
}

impl LabelBatch {
    /// Stack per-sample labels. All labels must share an encoding.
    pub fn collate(labels: Vec<LabelTensor>) -> Result<Self> {
        let mut iter = labels.into_iter();
        let first = match iter.next() {
            Some(l) => l,
            None => bail!("cannot collate an empty label batch"),
        };
        match first {
            LabelTensor::Int(v) => {
                let mut out = vec![v];
                for l in iter {
                    match l {
                        LabelTensor::Int(v) => out.push(v),
                        other => bail!("mixed label encodings in one batch: {other:?}"),
                    }
                }
                Ok(LabelBatch::Int(out))
            }
            LabelTensor::Binary(v) => {
                let mut out = vec![v];
                for l in iter {
                    match l {
                        LabelTensor::Binary(v) => out.push(v),
                        other => bail!("mixed label encodings in one batch: {other:?}"),
                    }
                }
                Ok(LabelBatch::Binary(out))
            }
            LabelTensor::Categorical(row) => {
                let num_classes = row.len();
                let mut data = row;
                for l in iter {
                    match l {
                        LabelTensor::Categorical(row) if row.len() == num_classes => {
                            data.extend_from_slice(&row);
                        }
                        other => bail!("mixed label encodings in one batch: {other:?}"),
                    }
                }
                Ok(LabelBatch::Categorical { data, num_classes })
            }
        }
    }

    /// Number of labels in the batch.
    pub fn len(&self) -> usize {
        match self {
            LabelBatch::Int(v) => v.len(),
            LabelBatch::Binary(v) => v.len(),
            LabelBatch::Categorical { data, num_classes } => {
                if *num_classes == 0 {
                    0
                } else {
                    data.len() / num_classes
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A collated group of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub images: ImageBatch,
    pub labels: Option<LabelBatch>,
}

impl Batch {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

// Decode configuration

/// What to do when a file fails to decode mid-iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Propagate the error through the stream (iteration sees `Err`).
    #[default]
    Fail,
    /// Log a warning and drop the sample.
    Skip,
}

/// Degree of parallel decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// One decode chunk per rayon worker thread.
    #[default]
    Auto,
    /// Decode one file at a time on the consumer thread.
    Sequential,
    /// A fixed chunk width.
    Fixed(usize),
}

impl Parallelism {
    /// Decode chunk width, always at least 1.
    pub fn width(&self) -> usize {
        match self {
            Parallelism::Auto => rayon::current_num_threads().max(1),
            Parallelism::Sequential => 1,
            Parallelism::Fixed(n) => (*n).max(1),
        }
    }
}

// DatasetStream

/// A boxed, sendable element iterator.
pub type BoxedIter<T> = Box<dyn Iterator<Item = Result<T>> + Send>;

/// A lazily-evaluated, re-iterable stream of dataset elements with the
/// resolved class names attached as read-only metadata.
///
/// Streams are cheap handles: stages wrap the underlying iterator factory
/// and nothing is decoded until an iterator is pulled.
pub struct DatasetStream<T> {
    factory: Arc<dyn Fn() -> BoxedIter<T> + Send + Sync>,
    class_names: Arc<Vec<String>>,
}

impl<T> Clone for DatasetStream<T> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            class_names: self.class_names.clone(),
        }
    }
}

impl<T: Send + 'static> DatasetStream<T> {
    /// Build a stream from an iterator factory.
    pub fn from_factory(
        class_names: Arc<Vec<String>>,
        factory: impl Fn() -> BoxedIter<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Arc::new(factory),
            class_names,
        }
    }

    /// Start one pass over the stream.
    pub fn iter(&self) -> BoxedIter<T> {
        (self.factory)()
    }

    /// The ordered class names this stream was built from.
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Materialize one full pass, stopping at the first error.
    pub fn collect(&self) -> Result<Vec<T>> {
        self.iter().collect()
    }

    /// Approximate a full shuffle with a bounded in-memory pool: up to
    /// `buffer_size` pending elements are held and drawn from uniformly.
    ///
    /// With a seed, every iteration replays the same order; without one,
    /// each iteration draws fresh randomness. Errors are forwarded
    /// immediately and never buffered.
    pub fn shuffle(self, buffer_size: usize, seed: Option<u64>) -> Self {
        let prev = self.factory;
        let capacity = buffer_size.max(1);
        Self {
            factory: Arc::new(move || {
                let rng = match seed {
                    Some(s) => StdRng::seed_from_u64(s),
                    None => StdRng::from_entropy(),
                };
                Box::new(ShuffleBuffer {
                    inner: prev(),
                    pool: Vec::with_capacity(capacity),
                    capacity,
                    rng,
                })
            }),
            class_names: self.class_names,
        }
    }

    /// Produce up to `depth` elements ahead of the consumer on a background
    /// thread. The bounded channel is the back-pressure: when the consumer
    /// stalls, the producer blocks. Dropping the iterator stops and joins
    /// the producer.
    pub fn prefetch(self, depth: usize) -> Self {
        let prev = self.factory;
        let depth = depth.max(1);
        Self {
            factory: Arc::new(move || {
                let inner = prev();
                let (tx, rx) = mpsc::sync_channel::<Result<T>>(depth);
                let handle = thread::spawn(move || {
                    for item in inner {
                        // Consumer gone — stop producing
                        if tx.send(item).is_err() {
                            break;
                        }
                    }
                });
                Box::new(Prefetcher {
                    rx: Some(rx),
                    handle: Some(handle),
                })
            }),
            class_names: self.class_names,
        }
    }

    /// Apply a pure transform to every element. Class names carry over.
    pub fn map<U: Send + 'static>(
        self,
        f: impl Fn(T) -> Result<U> + Send + Sync + 'static,
    ) -> DatasetStream<U> {
        let prev = self.factory;
        let f = Arc::new(f);
        DatasetStream {
            factory: Arc::new(move || {
                let f = f.clone();
                Box::new(prev().map(move |item| item.and_then(|v| f(v))))
            }),
            class_names: self.class_names,
        }
    }
}

impl DatasetStream<Sample> {
    /// Group consecutive samples into fixed-size batches. The final group
    /// may be smaller unless `drop_remainder` is set.
    pub fn batch(self, size: usize, drop_remainder: bool) -> DatasetStream<Batch> {
        let prev = self.factory;
        let size = size.max(1);
        DatasetStream {
            factory: Arc::new(move || {
                Box::new(Batcher {
                    inner: prev(),
                    size,
                    drop_remainder,
                    exhausted: false,
                })
            }),
            class_names: self.class_names,
        }
    }
}

// Stage iterators

struct ShuffleBuffer<T> {
    inner: BoxedIter<T>,
    pool: Vec<T>,
    capacity: usize,
    rng: StdRng,
}

impl<T> Iterator for ShuffleBuffer<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        while self.pool.len() < self.capacity {
            match self.inner.next() {
                Some(Ok(v)) => self.pool.push(v),
                Some(Err(e)) => return Some(Err(e)),
                None => break,
            }
        }
        if self.pool.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..self.pool.len());
        Some(Ok(self.pool.swap_remove(idx)))
    }
}

struct Batcher {
    inner: BoxedIter<Sample>,
    size: usize,
    drop_remainder: bool,
    exhausted: bool,
}

impl Iterator for Batcher {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Result<Batch>> {
        if self.exhausted {
            return None;
        }
        let mut images = Vec::with_capacity(self.size);
        let mut labels = Vec::with_capacity(self.size);
        while images.len() < self.size {
            match self.inner.next() {
                Some(Ok(sample)) => {
                    images.push(sample.image);
                    if let Some(label) = sample.label {
                        labels.push(label);
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }
        if images.is_empty() {
            return None;
        }
        if self.exhausted && self.drop_remainder && images.len() < self.size {
            return None;
        }
        if !labels.is_empty() && labels.len() != images.len() {
            return Some(Err(Error::LengthMismatch {
                left_name: "images",
                left: images.len(),
                right_name: "labels",
                right: labels.len(),
            }));
        }
        let labels = if labels.is_empty() {
            None
        } else {
            match LabelBatch::collate(labels) {
                Ok(l) => Some(l),
                Err(e) => return Some(Err(e)),
            }
        };
        match ImageBatch::from_images(images) {
            Ok(images) => Some(Ok(Batch { images, labels })),
            Err(e) => Some(Err(e)),
        }
    }
}

struct Prefetcher<T> {
    rx: Option<mpsc::Receiver<Result<T>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<T> Iterator for Prefetcher<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        self.rx.as_ref()?.recv().ok()
    }
}

impl<T> Drop for Prefetcher<T> {
    fn drop(&mut self) {
        // Hang up first so a producer blocked on a full channel errors out
        // of `send` instead of deadlocking the join below.
        drop(self.rx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// Base producer — ordered parallel decode

/// Build the base sample stream over index-aligned paths and pre-encoded
/// labels. Decoding happens in chunks of `parallelism.width()` files via
/// rayon; chunk results are collected in input order.
pub fn decode_stream(
    paths: Arc<Vec<PathBuf>>,
    labels: Option<Arc<Vec<LabelTensor>>>,
    class_names: Arc<Vec<String>>,
    options: Arc<LoadOptions>,
    policy: DecodePolicy,
    parallelism: Parallelism,
) -> DatasetStream<Sample> {
    let width = parallelism.width();
    DatasetStream::from_factory(class_names, move || {
        Box::new(ChunkedDecode {
            paths: paths.clone(),
            labels: labels.clone(),
            options: options.clone(),
            policy,
            width,
            cursor: 0,
            ready: VecDeque::new(),
        })
    })
}

struct ChunkedDecode {
    paths: Arc<Vec<PathBuf>>,
    labels: Option<Arc<Vec<LabelTensor>>>,
    options: Arc<LoadOptions>,
    policy: DecodePolicy,
    width: usize,
    cursor: usize,
    ready: VecDeque<Result<Sample>>,
}

impl ChunkedDecode {
    fn decode_one(&self, i: usize) -> Result<Sample> {
        let image = load_image(&self.paths[i], &self.options)?;
        let label = self.labels.as_ref().map(|ls| ls[i].clone());
        Ok(Sample { image, label })
    }
}

impl Iterator for ChunkedDecode {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Result<Sample>> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some(item);
            }
            if self.cursor >= self.paths.len() {
                return None;
            }
            let start = self.cursor;
            let end = (start + self.width).min(self.paths.len());
            self.cursor = end;

            let decoded: Vec<Result<Sample>> = if end - start > 1 {
                (start..end)
                    .into_par_iter()
                    .map(|i| self.decode_one(i))
                    .collect()
            } else {
                (start..end).map(|i| self.decode_one(i)).collect()
            };

            for item in decoded {
                match item {
                    Ok(sample) => self.ready.push_back(Ok(sample)),
                    Err(e) => match self.policy {
                        DecodePolicy::Fail => self.ready.push_back(Err(e)),
                        DecodePolicy::Skip => warn!("skipping undecodable sample: {e}"),
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A stream over synthetic 1×1 grayscale samples with Int labels 0..n.
    fn toy_stream(n: usize) -> DatasetStream<Sample> {
        let class_names = Arc::new(vec!["zero".to_string(), "one".to_string()]);
        DatasetStream::from_factory(class_names, move || {
            Box::new((0..n).map(|i| {
                Ok(Sample {
                    image: ImageTensor::new(vec![i as f32], 1, 1, 1).unwrap(),
                    label: Some(LabelTensor::Int(i as i64)),
                })
            }))
        })
    }

    fn values(samples: &[Sample]) -> Vec<f32> {
        samples.iter().map(|s| s.image.data()[0]).collect()
    }

    #[test]
    fn reiteration_reproduces_elements() {
        let stream = toy_stream(6);
        let a = stream.collect().unwrap();
        let b = stream.collect().unwrap();
        assert_eq!(values(&a), values(&b));
        assert_eq!(values(&a), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn class_names_survive_every_stage() {
        let stream = toy_stream(4)
            .shuffle(2, Some(1))
            .batch(2, false)
            .prefetch(1);
        assert_eq!(stream.class_names(), ["zero", "one"]);
    }

    #[test]
    fn batch_keeps_partial_group() {
        let batches = toy_stream(7).batch(3, false).collect().unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[2].len(), 1);
        assert_eq!(batches[1].images.shape(), (3, 1, 1, 1));
        match &batches[2].labels {
            Some(LabelBatch::Int(v)) => assert_eq!(v, &[6]),
            other => panic!("unexpected labels: {other:?}"),
        }
    }

    #[test]
    fn batch_drop_remainder() {
        let batches = toy_stream(7).batch(3, true).collect().unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 3));
    }

    #[test]
    fn shuffle_emits_a_permutation() {
        let stream = toy_stream(32).shuffle(8, Some(42));
        let out = values(&stream.collect().unwrap());
        let mut sorted = out.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted, (0..32).map(|i| i as f32).collect::<Vec<_>>());
        assert_ne!(out, sorted, "seeded shuffle left order unchanged");
    }

    #[test]
    fn seeded_shuffle_replays_identically() {
        let stream = toy_stream(32).shuffle(8, Some(7));
        let a = values(&stream.collect().unwrap());
        let b = values(&stream.collect().unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn shuffle_keeps_pairing() {
        let stream = toy_stream(32).shuffle(16, Some(3));
        for sample in stream.collect().unwrap() {
            match sample.label {
                Some(LabelTensor::Int(l)) => assert_eq!(l as f32, sample.image.data()[0]),
                other => panic!("unexpected label: {other:?}"),
            }
        }
    }

    #[test]
    fn prefetch_preserves_order() {
        let plain = values(&toy_stream(16).collect().unwrap());
        let fetched = values(&toy_stream(16).prefetch(4).collect().unwrap());
        assert_eq!(plain, fetched);
    }

    #[test]
    fn prefetch_drop_mid_iteration_joins_worker() {
        let stream = toy_stream(100).prefetch(2);
        let mut iter = stream.iter();
        let _ = iter.next();
        drop(iter); // must not hang
    }

    #[test]
    fn map_transforms_elements() {
        let doubled = toy_stream(4)
            .map(|mut s| {
                let data: Vec<f32> = s.image.data().iter().map(|v| v * 2.0).collect();
                s.image = ImageTensor::new(data, 1, 1, 1)?;
                Ok(s)
            })
            .collect()
            .unwrap();
        assert_eq!(values(&doubled), vec![0.0, 2.0, 4.0, 6.0]);
    }

    #[test]
    fn collate_categorical_rows() {
        let batch = LabelBatch::collate(vec![
            LabelTensor::Categorical(vec![1.0, 0.0]),
            LabelTensor::Categorical(vec![0.0, 1.0]),
        ])
        .unwrap();
        assert_eq!(
            batch,
            LabelBatch::Categorical {
                data: vec![1.0, 0.0, 0.0, 1.0],
                num_classes: 2
            }
        );
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn collate_rejects_mixed_encodings() {
        let err = LabelBatch::collate(vec![LabelTensor::Int(0), LabelTensor::Binary(1.0)])
            .unwrap_err();
        assert!(err.to_string().contains("mixed label encodings"));
    }

    #[test]
    fn image_batch_slices() {
        let batch = ImageBatch::from_images(vec![
            ImageTensor::new(vec![1.0, 2.0], 1, 2, 1).unwrap(),
            ImageTensor::new(vec![3.0, 4.0], 1, 2, 1).unwrap(),
        ])
        .unwrap();
        assert_eq!(batch.shape(), (2, 1, 2, 1));
        assert_eq!(batch.image(0), &[1.0, 2.0]);
        assert_eq!(batch.image(1), &[3.0, 4.0]);
    }

    #[test]
    fn image_batch_rejects_mixed_shapes() {
        let err = ImageBatch::from_images(vec![
            ImageTensor::new(vec![1.0], 1, 1, 1).unwrap(),
            ImageTensor::new(vec![1.0, 2.0], 1, 2, 1).unwrap(),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("different shapes"));
    }
}
