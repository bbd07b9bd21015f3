//! # stoat-core
//!
//! Core types shared across the stoat image dataset pipeline.
//!
//! This crate provides:
//! - [`Error`] / [`Result`] — the single error type used throughout stoat
//! - [`ImageTensor`] — a dense HWC `f32` pixel buffer with an explicit shape
//! - [`Interpolation`] — the resize filter vocabulary and its name table
//! - [`ColorMode`] — grayscale / RGB / RGBA channel selection

pub mod color;
pub mod error;
pub mod interp;
pub mod tensor;

pub use color::ColorMode;
pub use error::{Error, Result};
pub use interp::Interpolation;
pub use tensor::ImageTensor;
