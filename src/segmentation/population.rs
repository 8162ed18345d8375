use super::types::{Matte, PixelClass};
use crate::gmm::{pixel_color, Color};
use image::RgbImage;

/// Colors of every pixel belonging to one class
#[derive(Debug, Clone)]
pub struct PixelPopulation {
    class: PixelClass,
    colors: Vec<Color>,
}

impl PixelPopulation {
    /// Gather, in row-major order, every pixel whose matte label belongs to `class`
    pub fn collect(image: &RgbImage, matte: &Matte, class: PixelClass) -> Self {
        let colors = matte
            .labels()
            .zip(image.pixels())
            .filter(|(label, _)| label.class() == class)
            .map(|(_, pixel)| pixel_color(pixel))
            .collect();
        Self { class, colors }
    }

    pub fn class(&self) -> PixelClass {
        self.class
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::MatteLabel;
    use image::Rgb;

    #[test]
    fn collect_splits_by_class() {
        let image = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8, y as u8, 7]));
        let mut matte = Matte::new(3, 2);
        matte.set(1, 0, MatteLabel::ProbableForeground).unwrap();
        matte.set(2, 1, MatteLabel::DefiniteForeground).unwrap();
        matte.set(0, 1, MatteLabel::ProbableBackground).unwrap();

        let fg = PixelPopulation::collect(&image, &matte, PixelClass::Foreground);
        let bg = PixelPopulation::collect(&image, &matte, PixelClass::Background);

        assert_eq!(
            fg.colors(),
            &[Color::new(1.0, 0.0, 7.0), Color::new(2.0, 1.0, 7.0)]
        );
        assert_eq!(bg.colors()[2], Color::new(0.0, 1.0, 7.0));
        assert_eq!(bg.class(), PixelClass::Background);
        assert_eq!(fg.len() + bg.len(), 6);
    }
}
