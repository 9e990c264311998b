//! Mertens exposure fusion.
//!
//! Every exposure gets a per-pixel quality weight (contrast * saturation *
//! well-exposedness, each raised to its configured exponent). Weights are
//! normalized across the stack and the exposures are blended level by level
//! in a Laplacian pyramid, using a Gaussian pyramid of the weights.

use image::{Rgb32FImage, RgbImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::processing::border::reflect101;
use crate::processing::exposure::ExposureSet;
use crate::processing::pyramid::{collapse, gaussian_pyramid, laplacian_pyramid, max_level_for, FloatImage};
use crate::utils::error_handling::{Dimensions, NightModeError, Result};

const WEIGHT_EPSILON: f32 = 1e-12;
/// `2 * sigma^2` with sigma = 0.2 around mid-gray
const EXPOSEDNESS_DENOM: f32 = 0.08;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionParams {
    pub contrast_weight: f32,
    pub saturation_weight: f32,
    pub exposure_weight: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self { contrast_weight: 1.0, saturation_weight: 1.0, exposure_weight: 1.0 }
    }
}

impl FusionParams {
    pub fn validate(&self) -> Result<()> {
        let exponents = [
            ("fusion.contrast_weight", self.contrast_weight),
            ("fusion.saturation_weight", self.saturation_weight),
            ("fusion.exposure_weight", self.exposure_weight),
        ];
        for (name, value) in exponents {
            if !value.is_finite() || value < 0.0 {
                return Err(NightModeError::invalid(
                    name,
                    format!("must be a non-negative number, got {}", value),
                ));
            }
        }
        Ok(())
    }
}

pub struct MergeMertens {
    params: FusionParams,
}

impl MergeMertens {
    pub fn new(params: &FusionParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params: params.clone() })
    }

    /// Fuses same-sized exposures into an unclamped floating-point composite
    pub fn process(&self, images: &[RgbImage]) -> Result<Rgb32FImage> {
        let first = images
            .first()
            .ok_or_else(|| NightModeError::invalid("exposures", "at least one image is required"))?;
        let (width, height) = first.dimensions();
        if width == 0 || height == 0 {
            return Err(NightModeError::invalid("exposures", "images have zero area"));
        }
        for (index, image) in images.iter().enumerate().skip(1) {
            if image.dimensions() != (width, height) {
                return Err(NightModeError::DimensionMismatch {
                    index,
                    expected: Dimensions::new(width, height),
                    actual: Dimensions::new(image.width(), image.height()),
                });
            }
        }

        // A lone exposure has a normalized weight of exactly 1 everywhere
        if images.len() == 1 {
            return Ok(to_unit_float(first).into_rgb32f());
        }

        let (w, h) = (width as usize, height as usize);
        let max_level = max_level_for(w, h);

        // Only one exposure's pyramids are alive at a time; weights are recomputed instead of stored
        let mut weight_sum = vec![0.0f32; w * h];
        for image in images {
            let weights = self.weight_map(&to_unit_float(image));
            weight_sum
                .par_iter_mut()
                .zip(weights.data.par_iter())
                .for_each(|(sum, &wt)| *sum += wt);
        }

        let mut result: Option<Vec<FloatImage>> = None;
        for image in images {
            let unit = to_unit_float(image);
            let mut weights = self.weight_map(&unit);
            weights
                .data
                .par_iter_mut()
                .zip(weight_sum.par_iter())
                .for_each(|(wt, &sum)| *wt /= sum);

            let mut bands = laplacian_pyramid(unit, max_level);
            let weight_levels = gaussian_pyramid(weights, max_level);
            for (band, weight) in bands.iter_mut().zip(weight_levels.iter()) {
                apply_weight(band, weight);
            }

            match result.as_mut() {
                None => result = Some(bands),
                Some(acc) => {
                    for (level, band) in acc.iter_mut().zip(bands.iter()) {
                        level.add_assign(band);
                    }
                }
            }
        }

        let fused = result
            .and_then(collapse)
            .ok_or_else(|| NightModeError::invalid("exposures", "at least one image is required"))?;
        Ok(fused.into_rgb32f())
    }

    fn weight_map(&self, image: &FloatImage) -> FloatImage {
        let (w, h) = (image.width, image.height);
        let gray: Vec<f32> = image
            .data
            .par_chunks_exact(3)
            .map(|px| 0.299 * px[0] + 0.587 * px[1] + 0.114 * px[2])
            .collect();

        let FusionParams { contrast_weight, saturation_weight, exposure_weight } = self.params;
        let mut weights = FloatImage::new(w, h, 1);
        weights
            .data
            .par_chunks_exact_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                let up = reflect101(y as isize - 1, h);
                let down = reflect101(y as isize + 1, h);
                for (x, out) in row.iter_mut().enumerate() {
                    let left = reflect101(x as isize - 1, w);
                    let right = reflect101(x as isize + 1, w);
                    let contrast = (gray[up * w + x] + gray[down * w + x] + gray[y * w + left] + gray[y * w + right]
                        - 4.0 * gray[y * w + x])
                        .abs();

                    let px = &image.data[(y * w + x) * 3..(y * w + x) * 3 + 3];
                    let mean = (px[0] + px[1] + px[2]) / 3.0;
                    let saturation = px.iter().map(|&v| (v - mean) * (v - mean)).sum::<f32>().sqrt();
                    let exposedness: f32 = px
                        .iter()
                        .map(|&v| (-(v - 0.5) * (v - 0.5) / EXPOSEDNESS_DENOM).exp())
                        .product();

                    *out = contrast.powf(contrast_weight)
                        * saturation.powf(saturation_weight)
                        * exposedness.powf(exposure_weight)
                        + WEIGHT_EPSILON;
                }
            });
        weights
    }
}

/// Fuses an exposure set with the given weighting exponents
pub fn merge_mertens(exposures: &ExposureSet, params: &FusionParams) -> Result<Rgb32FImage> {
    MergeMertens::new(params)?.process(exposures.images())
}

fn to_unit_float(image: &RgbImage) -> FloatImage {
    let data = image.as_raw().par_iter().map(|&v| v as f32 / 255.0).collect();
    FloatImage::from_data(image.width() as usize, image.height() as usize, 3, data)
}

/// Multiplies every channel of `band` by the single-channel `weight`
fn apply_weight(band: &mut FloatImage, weight: &FloatImage) {
    let channels = band.channels;
    band.data
        .par_chunks_exact_mut(channels)
        .zip(weight.data.par_iter())
        .for_each(|(px, &wt)| px.iter_mut().for_each(|v| *v *= wt));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::exposure::generate_exposure_images;
    use crate::processing::tone_mapping::to_8bit;
    use image::Rgb;

    fn merge(images: &[RgbImage]) -> Result<Rgb32FImage> {
        MergeMertens::new(&FusionParams::default()).unwrap().process(images)
    }

    fn textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([((x * 13 + y * 7) % 200 + 20) as u8, ((x * 5 + y * 11) % 180 + 30) as u8, ((x ^ y) * 3 % 220) as u8])
        })
    }

    #[test]
    fn test_single_image_is_identity() {
        let image = textured(45, 30);
        let fused = merge(std::slice::from_ref(&image)).unwrap();
        assert_eq!(fused.dimensions(), (45, 30));
        for (src, out) in image.as_raw().iter().zip(fused.as_raw()) {
            assert_eq!(*src as f32 / 255.0, *out);
        }
    }

    #[test]
    fn test_single_exposure_survives_tone_mapping() {
        let image = RgbImage::from_fn(97, 61, |x, y| {
            Rgb([((x * 31 + y * 17) % 256) as u8, ((x * y) % 256) as u8, ((x * 3 + y * 5) % 256) as u8])
        });
        let set = generate_exposure_images(&image, 1, 0.1).unwrap();
        let fused = merge_mertens(&set, &FusionParams::default()).unwrap();
        assert_eq!(to_8bit(&fused), set.images()[0]);
    }

    #[test]
    fn test_flat_exposures_fuse_to_uniform_mean() {
        let gray = RgbImage::from_pixel(100, 100, Rgb([100, 100, 100]));
        let set = generate_exposure_images(&gray, 5, 0.2).unwrap();
        let fused = merge_mertens(&set, &FusionParams::default()).unwrap();

        // equal weights everywhere: plain average of 120, 140, 160, 180, 200
        let expected = 160.0 / 255.0;
        assert!(fused.as_raw().iter().all(|&v| (v - expected).abs() < 1e-4));
    }

    #[test]
    fn test_prefers_well_exposed_image() {
        let black = RgbImage::new(16, 16);
        let textured = RgbImage::from_fn(16, 16, |x, y| {
            if (x + y) % 2 == 0 { Rgb([150, 100, 120]) } else { Rgb([100, 150, 130]) }
        });
        let fused = merge(&[black, textured.clone()]).unwrap();
        for (src, out) in textured.as_raw().iter().zip(fused.as_raw()) {
            assert!((*src as f32 / 255.0 - out).abs() < 1e-3);
        }
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = RgbImage::new(10, 10);
        let b = RgbImage::new(10, 9);
        match merge(&[a.clone(), a, b]) {
            Err(NightModeError::DimensionMismatch { index, expected, actual }) => {
                assert_eq!(index, 2);
                assert_eq!(expected, Dimensions::new(10, 10));
                assert_eq!(actual, Dimensions::new(10, 9));
            }
            other => panic!("expected DimensionMismatch, got {:?}", other.map(|i| i.dimensions())),
        }
    }

    #[test]
    fn test_empty_stack_rejected() {
        assert!(matches!(merge(&[]), Err(NightModeError::InvalidParameter { .. })));
    }

    #[test]
    fn test_one_pixel_image() {
        let image = RgbImage::from_pixel(1, 1, Rgb([10, 20, 30]));
        let fused = merge(&[image.clone(), image]).unwrap();
        assert!((fused.get_pixel(0, 0)[2] - 30.0 / 255.0).abs() < 1e-5);
    }

    #[test]
    fn test_negative_exponent_rejected() {
        let params = FusionParams { saturation_weight: -1.0, ..Default::default() };
        assert!(MergeMertens::new(&params).is_err());
    }
}
