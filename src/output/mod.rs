mod file;
mod render;

pub use file::{CutoutFile, MaskFile, MatteFile};
pub use render::{render_cutout, render_matte};

use crate::segmentation::Matte;
use anyhow::Result;
use image::RgbImage;

/// Trait for destinations of a finished segmentation
pub trait OutputSink {
    /// Persist the segmentation of `image` described by `matte`
    fn write(&mut self, image: &RgbImage, matte: &Matte) -> Result<()>;
}
