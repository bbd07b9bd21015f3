// Image decode + resize
//
// Turns a compressed image file into a fixed-size HWC f32 tensor. Two
// resize branches:
//   - direct: resize straight to the target, aspect ratio may distort
//   - smart:  largest centered window matching the target aspect ratio,
//             then an exact resize of that window (no residual distortion)
//
// Animated formats are truncated to their first frame by the decoder.

use std::path::Path;

use image::imageops::FilterType;
use image::{ImageBuffer, Pixel};

use stoat_core::{ColorMode, Error, ImageTensor, Interpolation, Result};

/// Decode-and-resize configuration shared by every sample of a stream.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Target `(height, width)` of the decoded tensor.
    pub image_size: (usize, usize),
    /// Channel selection (grayscale / rgb / rgba).
    pub color_mode: ColorMode,
    /// Resize filter.
    pub interpolation: Interpolation,
    /// Center-crop to the target aspect ratio before resizing.
    pub crop_to_aspect_ratio: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            image_size: (256, 256),
            color_mode: ColorMode::Rgb,
            interpolation: Interpolation::Bilinear,
            crop_to_aspect_ratio: false,
        }
    }
}

impl LoadOptions {
    pub fn image_size(mut self, height: usize, width: usize) -> Self {
        self.image_size = (height, width);
        self
    }

    pub fn color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = mode;
        self
    }

    pub fn interpolation(mut self, interp: Interpolation) -> Self {
        self.interpolation = interp;
        self
    }

    pub fn crop_to_aspect_ratio(mut self, crop: bool) -> Self {
        self.crop_to_aspect_ratio = crop;
        self
    }
}

/// Read and decode one image file into a `(height, width, channels)` tensor.
pub fn load_image(path: impl AsRef<Path>, options: &LoadOptions) -> Result<ImageTensor> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    decode_image(&bytes, &path.display().to_string(), options)
}

/// Decode already-read image bytes. `origin` names the source in errors.
pub fn decode_image(bytes: &[u8], origin: &str, options: &LoadOptions) -> Result<ImageTensor> {
    let img = image::load_from_memory(bytes).map_err(|e| decode_error(origin, e))?;

    let (th, tw) = (
        options.image_size.0 as u32,
        options.image_size.1 as u32,
    );
    let filter = filter_type(options.interpolation);
    let crop = options.crop_to_aspect_ratio;

    match options.color_mode {
        ColorMode::Grayscale => {
            let out = fit_to_target(img.to_luma8(), th, tw, filter, crop);
            tensor_from_raw(out.into_raw(), th, tw, 1)
        }
        ColorMode::Rgb => {
            let out = fit_to_target(img.to_rgb8(), th, tw, filter, crop);
            tensor_from_raw(out.into_raw(), th, tw, 3)
        }
        ColorMode::Rgba => {
            let out = fit_to_target(img.to_rgba8(), th, tw, filter, crop);
            tensor_from_raw(out.into_raw(), th, tw, 4)
        }
    }
}

/// Largest centered crop window matching the target aspect ratio.
///
/// Returns `(crop_height, crop_width, offset_y, offset_x)`:
/// the scaled dimension is rounded to the nearest integer, clamped to the
/// source extent, and the window is centered with floor-division offsets.
pub fn crop_geometry(
    height: u32,
    width: u32,
    target_height: u32,
    target_width: u32,
) -> (u32, u32, u32, u32) {
    let crop_height = ((width as f64 * target_height as f64 / target_width as f64).round()
        as u32)
        .min(height);
    let crop_width = ((height as f64 * target_width as f64 / target_height as f64).round()
        as u32)
        .min(width);
    let offset_y = (height - crop_height) / 2;
    let offset_x = (width - crop_width) / 2;
    (crop_height, crop_width, offset_y, offset_x)
}

/// Resize `buf` to exactly (target_height, target_width), optionally through
/// the centered aspect-ratio crop window.
fn fit_to_target<P>(
    buf: ImageBuffer<P, Vec<u8>>,
    target_height: u32,
    target_width: u32,
    filter: FilterType,
    crop: bool,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let src = if crop {
        let (ch, cw, oy, ox) = crop_geometry(buf.height(), buf.width(), target_height, target_width);
        image::imageops::crop_imm(&buf, ox, oy, cw, ch).to_image()
    } else {
        buf
    };
    if src.height() == target_height && src.width() == target_width {
        src
    } else {
        image::imageops::resize(&src, target_width, target_height, filter)
    }
}

/// The `image`-crate filter serving each interpolation name. Names with no
/// exact counterpart use the nearest available filter.
fn filter_type(interp: Interpolation) -> FilterType {
    match interp {
        Interpolation::Bilinear | Interpolation::Area => FilterType::Triangle,
        Interpolation::Nearest => FilterType::Nearest,
        Interpolation::Bicubic | Interpolation::MitchellCubic => FilterType::CatmullRom,
        Interpolation::Lanczos3 | Interpolation::Lanczos5 => FilterType::Lanczos3,
        Interpolation::Gaussian => FilterType::Gaussian,
    }
}

fn tensor_from_raw(raw: Vec<u8>, height: u32, width: u32, channels: usize) -> Result<ImageTensor> {
    let data: Vec<f32> = raw.into_iter().map(|v| v as f32).collect();
    ImageTensor::new(data, height as usize, width as usize, channels)
}

fn decode_error(origin: &str, e: image::ImageError) -> Error {
    match e {
        image::ImageError::Unsupported(u) => Error::UnsupportedFormat {
            path: origin.to_string(),
            detail: u.to_string(),
        },
        other => Error::Decode {
            path: origin.to_string(),
            detail: other.to_string(),
        },
    }
}
