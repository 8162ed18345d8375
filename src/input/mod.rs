mod file;

pub use file::FileSource;

use anyhow::Result;
use image::RgbImage;

/// Trait for image sources feeding a segmentation session
pub trait ImageSource {
    /// Produce the image to segment
    fn load(&mut self) -> Result<RgbImage>;

    /// Human-readable origin of the image, for logs
    fn describe(&self) -> String;
}
