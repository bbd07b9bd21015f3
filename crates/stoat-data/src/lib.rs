//! # stoat-data
//!
//! Directory-indexed image datasets for training loops.
//!
//! This crate provides:
//! - [`ImageDatasetBuilder`] — one-stop configuration: scan a directory of
//!   class subfolders and get back a lazy, batchable, shuffleable stream of
//!   (image, label) pairs
//! - [`index_directory`] — the directory indexer: class catalog, ordered
//!   file listing, synchronized path/label shuffling
//! - [`split_samples`] — positional training/validation partitioning
//! - [`encode_labels`] — int / one-hot / binary label encodings
//! - [`load_image`] — decode + aspect-ratio-preserving smart resize
//! - [`DatasetStream`] — composable shuffle / batch / prefetch / map stages
//! - [`LabelStore`] — append-only sidecar CSV of folder→index assignments
//!
//! ```no_run
//! use stoat_data::{ImageDatasetBuilder, LabelMode};
//!
//! let dataset = ImageDatasetBuilder::new("photos/")
//!     .label_mode(Some(LabelMode::Categorical))
//!     .image_size(224, 224)
//!     .batch_size(Some(64))
//!     .seed(Some(1337))
//!     .build()?;
//! println!("classes: {:?}", dataset.class_names());
//! # Ok::<(), stoat_core::Error>(())
//! ```

pub mod builder;
pub mod decode;
pub mod index;
pub mod label_store;
pub mod labels;
pub mod pipeline;
pub mod split;

pub use builder::{ImageDataset, ImageDatasetBuilder, ShuffleGranularity};
pub use decode::{crop_geometry, decode_image, load_image, LoadOptions};
pub use index::{index_directory, permute, DirectoryIndex, IndexOptions};
pub use label_store::{LabelEntry, LabelStore};
pub use labels::{encode_labels, LabelMode, LabelTensor, Labels};
pub use pipeline::{
    Batch, DatasetStream, DecodePolicy, ImageBatch, LabelBatch, Parallelism, Sample,
};
pub use split::{split_samples, Subset};

pub use stoat_core::{ColorMode, Error, ImageTensor, Interpolation, Result};
