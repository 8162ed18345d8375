use super::render::{render_cutout, render_matte};
use super::OutputSink;
use crate::segmentation::Matte;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Writes the foreground cutout (background painted black) to an image file
pub struct CutoutFile {
    path: PathBuf,
}

impl CutoutFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl OutputSink for CutoutFile {
    fn write(&mut self, image: &RgbImage, matte: &Matte) -> Result<()> {
        let cutout = render_cutout(image, matte);
        cutout
            .save(&self.path)
            .with_context(|| format!("Failed to write cutout to {}", self.path.display()))?;
        tracing::info!("Saved cutout to {}", self.path.display());
        Ok(())
    }
}

/// Writes the binary foreground mask (255 = foreground) to an image file
pub struct MaskFile {
    path: PathBuf,
}

impl MaskFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl OutputSink for MaskFile {
    fn write(&mut self, _image: &RgbImage, matte: &Matte) -> Result<()> {
        matte
            .foreground_mask()
            .save(&self.path)
            .with_context(|| format!("Failed to write mask to {}", self.path.display()))?;
        tracing::info!("Saved mask to {}", self.path.display());
        Ok(())
    }
}

/// Writes the four-level grayscale view of the matte labels to an image file
pub struct MatteFile {
    path: PathBuf,
}

impl MatteFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl OutputSink for MatteFile {
    fn write(&mut self, _image: &RgbImage, matte: &Matte) -> Result<()> {
        render_matte(matte)
            .save(&self.path)
            .with_context(|| format!("Failed to write matte view to {}", self.path.display()))?;
        tracing::info!("Saved matte view to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::MatteLabel;

    #[test]
    fn matte_and_mask_files_round_trip_through_png() {
        let dir = std::env::temp_dir().join(format!("grabcut-output-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let image = RgbImage::new(3, 1);
        let mut matte = Matte::new(3, 1);
        matte.set(1, 0, MatteLabel::ProbableForeground).unwrap();
        matte.set(2, 0, MatteLabel::DefiniteForeground).unwrap();

        let matte_path = dir.join("matte.png");
        let mask_path = dir.join("mask.png");
        MatteFile::new(&matte_path).write(&image, &matte).unwrap();
        MaskFile::new(&mask_path).write(&image, &matte).unwrap();

        let view = image::open(&matte_path).unwrap().to_rgb8();
        let levels: Vec<u8> = (0..3).map(|x| view.get_pixel(x, 0)[0]).collect();
        assert_eq!(levels, vec![0, 170, 255]);
        let mask = image::open(&mask_path).unwrap().to_luma8();
        let bits: Vec<u8> = (0..3).map(|x| mask.get_pixel(x, 0)[0]).collect();
        assert_eq!(bits, vec![0, 255, 255]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
