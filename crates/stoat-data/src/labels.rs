// Label encoding — class indices to int / one-hot / binary tensors

use stoat_core::{Error, Result};

/// Where labels come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Labels {
    /// Labels are generated from the directory structure: each class
    /// subfolder becomes one class, indexed in lexicographic order.
    #[default]
    Inferred,
    /// Pre-assigned integer labels, one per file, ordered to match the
    /// lexicographic file listing.
    Explicit(Vec<usize>),
    /// No labels: the stream yields images only.
    None,
}

/// The target encoding for labels in the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelMode {
    /// One integer class index per sample.
    #[default]
    Int,
    /// One-hot vector of length `num_classes` per sample.
    Categorical,
    /// A single `{0.0, 1.0}` scalar per sample; requires exactly 2 classes.
    Binary,
}

impl LabelMode {
    pub fn name(&self) -> &'static str {
        match self {
            LabelMode::Int => "int",
            LabelMode::Categorical => "categorical",
            LabelMode::Binary => "binary",
        }
    }
}

/// An encoded label as it appears in the output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelTensor {
    /// Scalar class index (`LabelMode::Int`).
    Int(i64),
    /// Scalar 0.0/1.0 (`LabelMode::Binary`).
    Binary(f32),
    /// One-hot vector (`LabelMode::Categorical`).
    Categorical(Vec<f32>),
}

/// Encode raw class indices into the requested representation.
///
/// `Binary` demands exactly two classes; `Categorical` demands every label
/// be below `num_classes`. Both violations surface as configuration errors
/// before any element is produced.
pub fn encode_labels(
    labels: &[usize],
    mode: LabelMode,
    num_classes: usize,
) -> Result<Vec<LabelTensor>> {
    match mode {
        LabelMode::Int => Ok(labels.iter().map(|&l| LabelTensor::Int(l as i64)).collect()),
        LabelMode::Binary => {
            if num_classes != 2 {
                return Err(Error::Configuration(format!(
                    "label_mode \"binary\" requires exactly 2 classes, found {num_classes}"
                )));
            }
            Ok(labels
                .iter()
                .map(|&l| LabelTensor::Binary(if l == 0 { 0.0 } else { 1.0 }))
                .collect())
        }
        LabelMode::Categorical => {
            let mut out = Vec::with_capacity(labels.len());
            for &l in labels {
                if l >= num_classes {
                    return Err(Error::Configuration(format!(
                        "label {l} out of range for {num_classes} classes"
                    )));
                }
                let mut one_hot = vec![0.0; num_classes];
                one_hot[l] = 1.0;
                out.push(LabelTensor::Categorical(one_hot));
            }
            Ok(out)
        }
    }
}
