use crate::error::{Result, SegmentationError};
use image::{GrayImage, Luma};
use ndarray::Array2;
use std::fmt;

/// The two competing pixel classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelClass {
    Background,
    Foreground,
}

impl fmt::Display for PixelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PixelClass::Background => f.write_str("background"),
            PixelClass::Foreground => f.write_str("foreground"),
        }
    }
}

/// Per-pixel classification held by the matte
///
/// Definite labels are hard constraints set by the user (or by the area
/// outside the rectangle) and are never rewritten by a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatteLabel {
    #[default]
    DefiniteBackground,
    DefiniteForeground,
    ProbableBackground,
    ProbableForeground,
}

impl MatteLabel {
    pub fn definite(class: PixelClass) -> Self {
        match class {
            PixelClass::Background => MatteLabel::DefiniteBackground,
            PixelClass::Foreground => MatteLabel::DefiniteForeground,
        }
    }

    pub fn probable(class: PixelClass) -> Self {
        match class {
            PixelClass::Background => MatteLabel::ProbableBackground,
            PixelClass::Foreground => MatteLabel::ProbableForeground,
        }
    }

    pub fn class(self) -> PixelClass {
        match self {
            MatteLabel::DefiniteBackground | MatteLabel::ProbableBackground => {
                PixelClass::Background
            }
            MatteLabel::DefiniteForeground | MatteLabel::ProbableForeground => {
                PixelClass::Foreground
            }
        }
    }

    pub fn is_definite(self) -> bool {
        matches!(
            self,
            MatteLabel::DefiniteBackground | MatteLabel::DefiniteForeground
        )
    }

    /// Byte code used when a matte is saved: 0=BGD, 1=FGD, 2=PR_BGD, 3=PR_FGD
    pub fn code(self) -> u8 {
        match self {
            MatteLabel::DefiniteBackground => 0,
            MatteLabel::DefiniteForeground => 1,
            MatteLabel::ProbableBackground => 2,
            MatteLabel::ProbableForeground => 3,
        }
    }
}

/// Axis-aligned bounding rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Clip the half-open box `[x, x+w) x [y, y+h)` to an image.
    ///
    /// Returns `(x0, y0, x1, y1)` with exclusive upper bounds, or `None` when
    /// nothing of the rectangle lies inside the image.
    pub fn clip(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let x1 = self.x.saturating_add(self.width).min(width);
        let y1 = self.y.saturating_add(self.height).min(height);
        if self.x >= x1 || self.y >= y1 {
            return None;
        }
        Some((self.x, self.y, x1, y1))
    }
}

/// Mutable width x height grid of matte labels
#[derive(Debug, Clone, PartialEq)]
pub struct Matte {
    labels: Array2<MatteLabel>,
}

impl Matte {
    /// A matte with every cell set to `DefiniteBackground`
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            labels: Array2::default((height as usize, width as usize)),
        }
    }

    pub fn width(&self) -> u32 {
        self.labels.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.labels.nrows() as u32
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<MatteLabel> {
        self.labels.get((y as usize, x as usize)).copied()
    }

    pub fn set(&mut self, x: u32, y: u32, label: MatteLabel) -> Result<()> {
        let (width, height) = (self.width(), self.height());
        let cell = self
            .labels
            .get_mut((y as usize, x as usize))
            .ok_or(SegmentationError::OutOfBounds {
                x,
                y,
                width,
                height,
            })?;
        *cell = label;
        Ok(())
    }

    /// Labels in row-major order, matching the pixel index `y * width + x`
    pub fn labels(&self) -> impl Iterator<Item = MatteLabel> + '_ {
        self.labels.iter().copied()
    }

    pub(crate) fn as_slice(&self) -> &[MatteLabel] {
        // Array2::default is always in standard layout.
        self.labels
            .as_slice()
            .unwrap_or_else(|| unreachable!("matte storage is contiguous"))
    }

    pub(crate) fn as_slice_mut(&mut self) -> &mut [MatteLabel] {
        self.labels
            .as_slice_mut()
            .unwrap_or_else(|| unreachable!("matte storage is contiguous"))
    }

    pub fn count(&self, label: MatteLabel) -> usize {
        self.labels.iter().filter(|&&l| l == label).count()
    }

    pub fn count_class(&self, class: PixelClass) -> usize {
        self.labels.iter().filter(|l| l.class() == class).count()
    }

    /// Row-major label codes, see [`MatteLabel::code`]
    pub fn label_codes(&self) -> Vec<u8> {
        self.labels.iter().map(|l| l.code()).collect()
    }

    /// Collapse to a binary mask: 255 for foreground (definite or probable), 0 otherwise
    pub fn foreground_mask(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            match self.labels[[y as usize, x as usize]].class() {
                PixelClass::Foreground => Luma([255]),
                PixelClass::Background => Luma([0]),
            }
        })
    }
}

/// Tunables for one segmentation session
#[derive(Debug, Clone, PartialEq)]
pub struct GrabCutConfig {
    /// Number of mixture components per class model
    pub components: usize,
    /// Smoothness strength of the pairwise term
    pub gamma: f64,
    /// Terminal weight pinning definite pixels; `None` means `9 * gamma`
    pub hard_weight: Option<f64>,
}

impl Default for GrabCutConfig {
    fn default() -> Self {
        Self {
            components: 5,
            gamma: 50.0,
            hard_weight: None,
        }
    }
}

impl GrabCutConfig {
    pub fn hard_weight(&self) -> f64 {
        self.hard_weight.unwrap_or(9.0 * self.gamma)
    }

    pub fn validate(&self) -> Result<()> {
        if self.components == 0 {
            return Err(SegmentationError::InvalidComponentCount(self.components));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_matte_is_definite_background() {
        let matte = Matte::new(4, 3);
        assert_eq!(matte.width(), 4);
        assert_eq!(matte.height(), 3);
        assert_eq!(matte.count(MatteLabel::DefiniteBackground), 12);
    }

    #[test]
    fn set_outside_image_is_rejected() {
        let mut matte = Matte::new(4, 3);
        assert!(matches!(
            matte.set(4, 0, MatteLabel::DefiniteForeground),
            Err(SegmentationError::OutOfBounds { x: 4, y: 0, .. })
        ));
    }

    #[test]
    fn rect_clip_handles_overflow_and_misses() {
        let rect = Rect::new(2, 1, u32::MAX, 3);
        assert_eq!(rect.clip(10, 10), Some((2, 1, 10, 4)));
        assert_eq!(Rect::new(10, 0, 3, 3).clip(10, 10), None);
        assert_eq!(Rect::new(0, 0, 0, 3).clip(10, 10), None);
    }

    #[test]
    fn foreground_mask_collapses_probable_labels() {
        let mut matte = Matte::new(2, 2);
        matte.set(0, 0, MatteLabel::ProbableForeground).unwrap();
        matte.set(1, 0, MatteLabel::DefiniteForeground).unwrap();
        matte.set(0, 1, MatteLabel::ProbableBackground).unwrap();
        let mask = matte.foreground_mask();
        assert_eq!(mask.get_pixel(0, 0)[0], 255);
        assert_eq!(mask.get_pixel(1, 0)[0], 255);
        assert_eq!(mask.get_pixel(0, 1)[0], 0);
        assert_eq!(mask.get_pixel(1, 1)[0], 0);
        assert_eq!(matte.label_codes(), vec![3, 1, 2, 0]);
    }

    #[test]
    fn default_hard_weight_scales_with_gamma() {
        let config = GrabCutConfig {
            gamma: 10.0,
            ..Default::default()
        };
        assert_eq!(config.hard_weight(), 90.0);
        assert!(GrabCutConfig {
            components: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }
}
