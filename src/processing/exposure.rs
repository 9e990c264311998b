use image::RgbImage;
use rayon::prelude::*;

use crate::utils::error_handling::{NightModeError, Result};

/// Synthetic exposures in generation order, each paired with its brightness factor
#[derive(Debug, Clone)]
pub struct ExposureSet {
    images: Vec<RgbImage>,
    factors: Vec<f64>,
}

impl ExposureSet {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[RgbImage] {
        &self.images
    }

    pub fn factors(&self) -> &[f64] {
        &self.factors
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RgbImage, f64)> {
        self.images.iter().zip(self.factors.iter().copied())
    }
}

/// Brightness multiplier of the `index`-th exposure (1-based)
#[inline]
pub fn exposure_factor(index: usize, step: f64) -> f64 {
    1.0 + index as f64 * step
}

fn exposure_lut(factor: f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (v, out) in lut.iter_mut().enumerate() {
        // saturate, then truncate toward zero
        *out = (v as f64 * factor).clamp(0.0, 255.0) as u8;
    }
    lut
}

/// Multiplies every channel by `factor`, saturating at 255
pub fn increase_exposure(image: &RgbImage, factor: f64) -> RgbImage {
    let lut = exposure_lut(factor);
    let mut out = RgbImage::new(image.width(), image.height());
    let buffer: &mut [u8] = &mut out;
    buffer
        .par_iter_mut()
        .zip(image.as_raw().par_iter())
        .for_each(|(dst, &src)| *dst = lut[src as usize]);
    out
}

/// `count` brightened copies with factors `1 + i * step`, `i = 1..=count`
pub fn generate_exposure_images(image: &RgbImage, count: usize, step: f64) -> Result<ExposureSet> {
    if count == 0 {
        return Err(NightModeError::invalid("exposure_count", "at least one exposure is required"));
    }
    if !step.is_finite() || step <= 0.0 {
        return Err(NightModeError::invalid(
            "exposure_step",
            format!("must be a positive number, got {}", step),
        ));
    }

    let (images, factors): (Vec<RgbImage>, Vec<f64>) = (1..=count)
        .into_par_iter()
        .map(|i| {
            let factor = exposure_factor(i, step);
            (increase_exposure(image, factor), factor)
        })
        .unzip();

    Ok(ExposureSet { images, factors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_increase_exposure_saturates() {
        let image = RgbImage::from_pixel(2, 2, Rgb([100, 200, 0]));
        let out = increase_exposure(&image, 1.5);
        assert_eq!(out.get_pixel(0, 0), &Rgb([150, 255, 0]));
    }

    #[test]
    fn test_increase_exposure_truncates() {
        let image = RgbImage::from_pixel(1, 1, Rgb([3, 7, 9]));
        // 3.3, 7.7, 9.9
        let out = increase_exposure(&image, 1.1);
        assert_eq!(out.get_pixel(0, 0), &Rgb([3, 7, 9]));
    }

    #[test]
    fn test_lut_matches_double_precision_product() {
        for i in 1..=30usize {
            let factor = exposure_factor(i, 0.1);
            let lut = exposure_lut(factor);
            for v in 0..=255u8 {
                let expected = (v as f64 * (1.0 + i as f64 * 0.1)).clamp(0.0, 255.0) as u8;
                assert_eq!(lut[v as usize], expected, "v={} i={}", v, i);
            }
        }
        // exact-integer products must not lose a level
        let image = RgbImage::from_pixel(1, 1, Rgb([90, 170, 45]));
        assert_eq!(increase_exposure(&image, exposure_factor(3, 0.1)).get_pixel(0, 0), &Rgb([117, 221, 58]));
    }

    #[test]
    fn test_exposure_monotonic_in_factor() {
        let image = gradient(64, 32);
        let factors = [1.0f64, 1.1, 1.5, 2.0, 3.7, 10.0];
        for pair in factors.windows(2) {
            let low = increase_exposure(&image, pair[0]);
            let high = increase_exposure(&image, pair[1]);
            assert!(low.as_raw().iter().zip(high.as_raw()).all(|(l, h)| l <= h));
        }
    }

    #[test]
    fn test_generate_count_and_factors() {
        let image = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let set = generate_exposure_images(&image, 5, 0.2).unwrap();
        assert_eq!(set.len(), 5);
        let expected = [1.2f64, 1.4, 1.6, 1.8, 2.0];
        for (f, e) in set.factors().iter().zip(expected) {
            assert!((f - e).abs() < 1e-12);
        }
        for (img, factor) in set.iter() {
            assert_eq!(img.dimensions(), (4, 4));
            assert_eq!(img.get_pixel(0, 0)[0], (100.0 * factor) as u8);
        }
    }

    #[test]
    fn test_generated_images_get_brighter() {
        let image = gradient(32, 32);
        let set = generate_exposure_images(&image, 30, 0.1).unwrap();
        for pair in set.images().windows(2) {
            assert!(pair[0].as_raw().iter().zip(pair[1].as_raw()).all(|(a, b)| a <= b));
        }
    }

    #[test]
    fn test_invalid_count_and_step() {
        let image = gradient(4, 4);
        assert!(matches!(
            generate_exposure_images(&image, 0, 0.1),
            Err(NightModeError::InvalidParameter { name: "exposure_count", .. })
        ));
        assert!(generate_exposure_images(&image, 3, 0.0).is_err());
        assert!(generate_exposure_images(&image, 3, -0.1).is_err());
        assert!(generate_exposure_images(&image, 3, f64::NAN).is_err());
    }
}
