use crate::segmentation::{Matte, MatteLabel, PixelClass};
use image::{Rgb, RgbImage};

/// Keep foreground pixels, paint background black
pub fn render_cutout(image: &RgbImage, matte: &Matte) -> RgbImage {
    let _span = tracing::debug_span!("render_cutout").entered();

    let mut out = image.clone();
    for (pixel, label) in out.pixels_mut().zip(matte.labels()) {
        if label.class() == PixelClass::Background {
            *pixel = Rgb([0, 0, 0]);
        }
    }
    out
}

/// Grayscale view of the four matte labels
///
/// Definite background is black, probable background dark gray, probable
/// foreground light gray and definite foreground white.
pub fn render_matte(matte: &Matte) -> RgbImage {
    RgbImage::from_fn(matte.width(), matte.height(), |x, y| {
        let value = match matte.get(x, y) {
            Some(MatteLabel::DefiniteForeground) => 255,
            Some(MatteLabel::ProbableForeground) => 170,
            Some(MatteLabel::ProbableBackground) => 85,
            Some(MatteLabel::DefiniteBackground) | None => 0,
        };
        Rgb([value, value, value])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutout_blacks_out_background() {
        let image = RgbImage::from_pixel(2, 1, Rgb([9, 8, 7]));
        let mut matte = Matte::new(2, 1);
        matte.set(1, 0, MatteLabel::ProbableForeground).unwrap();

        let cutout = render_cutout(&image, &matte);
        assert_eq!(cutout.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(cutout.get_pixel(1, 0), &Rgb([9, 8, 7]));
    }

    #[test]
    fn matte_view_distinguishes_labels() {
        let mut matte = Matte::new(4, 1);
        matte.set(1, 0, MatteLabel::ProbableBackground).unwrap();
        matte.set(2, 0, MatteLabel::ProbableForeground).unwrap();
        matte.set(3, 0, MatteLabel::DefiniteForeground).unwrap();

        let view = render_matte(&matte);
        let values: Vec<u8> = (0..4).map(|x| view.get_pixel(x, 0)[0]).collect();
        assert_eq!(values, vec![0, 85, 170, 255]);
    }
}
