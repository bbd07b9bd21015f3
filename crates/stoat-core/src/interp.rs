// Interpolation — resize filter vocabulary

use std::str::FromStr;

use crate::Error;

/// Interpolation method used when resizing images.
///
/// The eight canonical names are accepted case-insensitively. Three of them
/// have no exact counterpart in the `image` crate and are served by the
/// nearest available filter: `Area` resolves to a triangle filter,
/// `Lanczos5` to the 3-lobe Lanczos window, and `MitchellCubic` to
/// Catmull-Rom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpolation {
    Bilinear,
    Nearest,
    Bicubic,
    Area,
    Lanczos3,
    Lanczos5,
    Gaussian,
    MitchellCubic,
}

/// The fixed name table. Built once at compile time; never mutated.
pub const INTERPOLATION_NAMES: &[(&str, Interpolation)] = &[
    ("bilinear", Interpolation::Bilinear),
    ("nearest", Interpolation::Nearest),
    ("bicubic", Interpolation::Bicubic),
    ("area", Interpolation::Area),
    ("lanczos3", Interpolation::Lanczos3),
    ("lanczos5", Interpolation::Lanczos5),
    ("gaussian", Interpolation::Gaussian),
    ("mitchellcubic", Interpolation::MitchellCubic),
];

impl Interpolation {
    /// The canonical lowercase name.
    pub fn name(&self) -> &'static str {
        INTERPOLATION_NAMES
            .iter()
            .find(|(_, v)| v == self)
            .map(|(n, _)| *n)
            .unwrap_or("bilinear")
    }

    /// All valid names, in canonical order.
    pub fn valid_names() -> Vec<&'static str> {
        INTERPOLATION_NAMES.iter().map(|(n, _)| *n).collect()
    }
}

impl Default for Interpolation {
    fn default() -> Self {
        Interpolation::Bilinear
    }
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interpolation {
    type Err = Error;

    /// Parse a filter name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Error> {
        let lowered = s.to_ascii_lowercase();
        INTERPOLATION_NAMES
            .iter()
            .find(|(n, _)| *n == lowered)
            .map(|(_, v)| *v)
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "value not recognized for interpolation: {s}. Supported values are: {}",
                    Interpolation::valid_names().join(", ")
                ))
            })
    }
}
