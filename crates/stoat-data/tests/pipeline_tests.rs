// End-to-end tests for stoat-data: directory in, streams out

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgb, RgbImage};

use stoat_data::{
    ColorMode, DecodePolicy, ImageDataset, ImageDatasetBuilder, LabelBatch, LabelMode,
    LabelTensor, Labels, Subset,
};

static DIR_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Build a scratch dataset: one subdirectory per class, `count` small PNGs
/// each. Every class gets its own red intensity so samples are traceable
/// back to their class after decoding.
fn scratch_dataset(classes: &[(&str, usize)]) -> PathBuf {
    let id = DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    let root = std::env::temp_dir().join(format!(
        "stoat_pipeline_test_{}_{id}",
        std::process::id()
    ));
    for (class_idx, (class, count)) in classes.iter().enumerate() {
        let dir = root.join(class);
        std::fs::create_dir_all(&dir).unwrap();
        let shade = (class_idx * 40 + 10) as u8;
        for i in 0..*count {
            let img = RgbImage::from_pixel(4, 4, Rgb([shade, 0, 0]));
            img.save(dir.join(format!("img_{i:03}.png"))).unwrap();
        }
    }
    root
}

fn cleanup(root: &PathBuf) {
    std::fs::remove_dir_all(root).ok();
}

#[test]
fn test_unbatched_stream_yields_every_sample() {
    let root = scratch_dataset(&[("cat", 3), ("dog", 2)]);
    let dataset = ImageDatasetBuilder::new(&root)
        .batch_size(None)
        .shuffle(false)
        .image_size(8, 8)
        .build()
        .unwrap();

    assert_eq!(dataset.class_names(), ["cat", "dog"]);
    assert!(!dataset.is_batched());

    let samples = dataset.samples().unwrap().collect().unwrap();
    assert_eq!(samples.len(), 5);
    for s in &samples {
        assert_eq!(s.image.shape(), (8, 8, 3));
    }
    let labels: Vec<i64> = samples
        .iter()
        .map(|s| match s.label {
            Some(LabelTensor::Int(l)) => l,
            ref other => panic!("unexpected label: {other:?}"),
        })
        .collect();
    assert_eq!(labels, vec![0, 0, 0, 1, 1]);

    cleanup(&root);
}

#[test]
fn test_batched_stream_shapes_and_partial_batch() {
    let root = scratch_dataset(&[("a", 6), ("b", 4)]);
    let dataset = ImageDatasetBuilder::new(&root)
        .batch_size(Some(4))
        .shuffle(false)
        .image_size(8, 8)
        .build()
        .unwrap();

    let batches = dataset.batches().unwrap().collect().unwrap();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0].images.shape(), (4, 8, 8, 3));
    assert_eq!(batches[2].len(), 2); // 10 = 4 + 4 + 2
    match &batches[0].labels {
        Some(LabelBatch::Int(v)) => assert_eq!(v.len(), 4),
        other => panic!("unexpected labels: {other:?}"),
    }

    cleanup(&root);
}

#[test]
fn test_drop_remainder_discards_short_batch() {
    let root = scratch_dataset(&[("a", 7)]);
    let dataset = ImageDatasetBuilder::new(&root)
        .batch_size(Some(3))
        .drop_remainder(true)
        .shuffle(false)
        .image_size(4, 4)
        .build()
        .unwrap();

    let batches = dataset.batches().unwrap().collect().unwrap();
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|b| b.len() == 3));

    cleanup(&root);
}

#[test]
fn test_build_split_partitions_are_disjoint_and_complete() {
    let root = scratch_dataset(&[("a", 6), ("b", 4)]);
    let (train, val) = ImageDatasetBuilder::new(&root)
        .batch_size(None)
        .shuffle(false)
        .image_size(4, 4)
        .validation_split(Some(0.3))
        .subset(Some(Subset::Both))
        .build_split()
        .unwrap();

    let train = train.samples().unwrap().collect().unwrap();
    let val = val.samples().unwrap().collect().unwrap();
    assert_eq!(train.len(), 7);
    assert_eq!(val.len(), 3);

    // With shuffling off, train ++ val walks the classes in index order.
    let label = |s: &stoat_data::Sample| match s.label {
        Some(LabelTensor::Int(l)) => l,
        ref other => panic!("unexpected label: {other:?}"),
    };
    let joined: Vec<i64> = train.iter().chain(val.iter()).map(label).collect();
    assert_eq!(joined, vec![0, 0, 0, 0, 0, 0, 1, 1, 1, 1]);

    cleanup(&root);
}

#[test]
fn test_training_subset_matches_split_engine() {
    let root = scratch_dataset(&[("a", 5)]);
    let dataset = ImageDatasetBuilder::new(&root)
        .batch_size(None)
        .shuffle(false)
        .image_size(4, 4)
        .validation_split(Some(0.4))
        .subset(Some(Subset::Training))
        .build()
        .unwrap();

    // floor(0.4 * 5) = 2 validation files, 3 remain for training
    let samples = dataset.samples().unwrap().collect().unwrap();
    assert_eq!(samples.len(), 3);

    cleanup(&root);
}

#[test]
fn test_binary_mode_with_three_discovered_classes_fails() {
    let root = scratch_dataset(&[("a", 1), ("b", 1), ("c", 1)]);
    let err = ImageDatasetBuilder::new(&root)
        .label_mode(Some(LabelMode::Binary))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("binary"));
    cleanup(&root);
}

#[test]
fn test_categorical_labels_collate_one_hot_rows() {
    let root = scratch_dataset(&[("a", 2), ("b", 2)]);
    let dataset = ImageDatasetBuilder::new(&root)
        .batch_size(Some(4))
        .shuffle(false)
        .image_size(4, 4)
        .label_mode(Some(LabelMode::Categorical))
        .build()
        .unwrap();

    let batches = dataset.batches().unwrap().collect().unwrap();
    match &batches[0].labels {
        Some(LabelBatch::Categorical { data, num_classes }) => {
            assert_eq!(*num_classes, 2);
            assert_eq!(data.len(), 8);
            assert_eq!(&data[..4], &[1.0, 0.0, 1.0, 0.0]);
        }
        other => panic!("unexpected labels: {other:?}"),
    }

    cleanup(&root);
}

#[test]
fn test_labels_none_yields_images_only() {
    let root = scratch_dataset(&[("a", 2), ("b", 1)]);
    let dataset = ImageDatasetBuilder::new(&root)
        .labels(Labels::None)
        .batch_size(None)
        .shuffle(false)
        .image_size(4, 4)
        .build()
        .unwrap();

    let samples = dataset.samples().unwrap().collect().unwrap();
    assert_eq!(samples.len(), 3);
    assert!(samples.iter().all(|s| s.label.is_none()));

    cleanup(&root);
}

#[test]
fn test_grayscale_and_smart_resize_shapes() {
    let root = scratch_dataset(&[("a", 1)]);
    // overwrite with a non-square source so the crop path is exercised
    let file = root.join("a").join("img_000.png");
    RgbImage::from_pixel(10, 4, Rgb([50, 0, 0]))
        .save(&file)
        .unwrap();

    let dataset = ImageDatasetBuilder::new(&root)
        .batch_size(None)
        .shuffle(false)
        .color_mode(ColorMode::Grayscale)
        .image_size(6, 6)
        .crop_to_aspect_ratio(true)
        .build()
        .unwrap();

    let samples = dataset.samples().unwrap().collect().unwrap();
    assert_eq!(samples[0].image.shape(), (6, 6, 1));

    cleanup(&root);
}

#[test]
fn test_seeded_shuffle_replays_and_keeps_pairing() {
    let root = scratch_dataset(&[("a", 8), ("b", 8)]);
    let dataset = ImageDatasetBuilder::new(&root)
        .batch_size(None)
        .shuffle(true)
        .seed(Some(21))
        .image_size(4, 4)
        .build()
        .unwrap();
    let stream = dataset.samples().unwrap();

    let first = stream.collect().unwrap();
    let second = stream.collect().unwrap();
    assert_eq!(first.len(), 16);
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.image.data(), b.image.data());
        assert_eq!(a.label, b.label);
    }

    // Class shade and label must still agree after shuffling.
    for s in &first {
        let shade = s.image.data()[0];
        let expected = if shade == 10.0 { 0 } else { 1 };
        assert_eq!(s.label, Some(LabelTensor::Int(expected)));
    }

    cleanup(&root);
}

#[test]
fn test_decode_failure_policies() {
    let root = scratch_dataset(&[("a", 3)]);
    std::fs::write(root.join("a").join("img_999.png"), b"not a png").unwrap();

    let build = |policy| -> ImageDataset {
        ImageDatasetBuilder::new(&root)
            .batch_size(None)
            .shuffle(false)
            .image_size(4, 4)
            .decode_policy(policy)
            .build()
            .unwrap()
    };

    // Fail: the bad file surfaces as an error element.
    let strict = build(DecodePolicy::Fail).samples().unwrap();
    assert!(strict.collect().is_err());

    // Skip: the bad file is dropped, the rest decode.
    let lenient = build(DecodePolicy::Skip).samples().unwrap();
    assert_eq!(lenient.collect().unwrap().len(), 3);

    cleanup(&root);
}

#[test]
fn test_class_names_metadata_survives_stages() {
    let root = scratch_dataset(&[("daisy", 2), ("rose", 2)]);
    let dataset = ImageDatasetBuilder::new(&root)
        .batch_size(Some(2))
        .image_size(4, 4)
        .seed(Some(5))
        .build()
        .unwrap();
    assert_eq!(dataset.class_names(), ["daisy", "rose"]);
    cleanup(&root);
}

#[test]
fn test_missing_root_fails_before_decoding() {
    let err = ImageDatasetBuilder::new("/stoat/nowhere")
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("directory not found"));
}
