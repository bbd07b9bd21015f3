// ColorMode — channel count selection for decoded images

/// How many channels decoded images carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorMode {
    /// Single luminance channel.
    Grayscale,
    /// Three channels, red/green/blue.
    #[default]
    Rgb,
    /// Four channels, red/green/blue/alpha.
    Rgba,
}

impl ColorMode {
    /// Number of channels in the decoded tensor.
    pub fn channels(&self) -> usize {
        match self {
            ColorMode::Grayscale => 1,
            ColorMode::Rgb => 3,
            ColorMode::Rgba => 4,
        }
    }

    /// The canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            ColorMode::Grayscale => "grayscale",
            ColorMode::Rgb => "rgb",
            ColorMode::Rgba => "rgba",
        }
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
