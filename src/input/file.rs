use super::ImageSource;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Image decoded from a file on disk
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ImageSource for FileSource {
    fn load(&mut self) -> Result<RgbImage> {
        tracing::info!("Loading image from {}", self.path.display());

        let image = image::open(&self.path)
            .with_context(|| format!("Failed to decode image {}", self.path.display()))?
            .to_rgb8();

        let (width, height) = image.dimensions();
        tracing::info!("Loaded {}x{} image", width, height);
        Ok(image)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
