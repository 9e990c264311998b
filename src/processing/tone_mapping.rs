use image::{Rgb32FImage, RgbImage};
use rayon::prelude::*;

/// Maps a fused value to 8 bits: scale by 255, clamp, truncate. NaN maps to 0.
#[inline]
pub fn linear_to_8bit(x: f32) -> u8 {
    (x * 255.0).clamp(0.0, 255.0) as u8
}

/// Lossy conversion of the floating-point composite to 8-bit RGB
pub fn to_8bit(hdr: &Rgb32FImage) -> RgbImage {
    let mut out = RgbImage::new(hdr.width(), hdr.height());
    let buffer: &mut [u8] = &mut out;
    buffer
        .par_iter_mut()
        .zip(hdr.as_raw().par_iter())
        .for_each(|(dst, &src)| *dst = linear_to_8bit(src));
    out
}
