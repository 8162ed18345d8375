use image::{Rgb, RgbImage};

pub const BACKGROUND: Rgb<u8> = Rgb([40, 60, 200]);
pub const PATCH: Rgb<u8> = Rgb([230, 200, 30]);

/// Uniform background with one solid rectangular patch `[x0, x1) x [y0, y1)`.
pub fn patch_image(width: u32, height: u32, patch: (u32, u32, u32, u32)) -> RgbImage {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    let (x0, y0, x1, y1) = patch;
    RgbImage::from_fn(width, height, |x, y| {
        if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
            PATCH
        } else {
            BACKGROUND
        }
    })
}

/// Image without any contrast.
pub fn solid_image(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(width, height, color)
}
