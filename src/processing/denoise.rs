//! Non-local means denoising.
//!
//! Every output pixel is a weighted mean of the pixels in its search window,
//! weighted by `exp(-d / (h^2 * channels))` where `d` is the mean squared
//! difference between the two template patches. Patch distances are computed
//! one displacement at a time with an integral image, so the cost does not
//! depend on the template size.

use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::processing::border::pad_reflect101;
use crate::processing::color_processing::{l_from_8bit, l_to_8bit, LabImage, CHROMA_OFFSET};
use crate::progress::{ProgressSink, StageProgress};
use crate::utils::error_handling::{NightModeError, Result};

/// Weights below this are treated as zero
const WEIGHT_THRESHOLD: f32 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseParams {
    /// Filter strength for the lightness channel
    pub h_luminance: f32,
    /// Filter strength for the a/b chroma channels
    pub h_color: f32,
    /// Side of the comparison patch, odd
    pub template_window: u32,
    /// Side of the area searched for similar patches, odd
    pub search_window: u32,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        Self { h_luminance: 10.0, h_color: 10.0, template_window: 7, search_window: 21 }
    }
}

impl DenoiseParams {
    pub fn validate(&self) -> Result<()> {
        for (name, h) in [("denoise.h_luminance", self.h_luminance), ("denoise.h_color", self.h_color)] {
            if !h.is_finite() || h <= 0.0 {
                return Err(NightModeError::invalid(name, format!("must be a positive number, got {}", h)));
            }
        }
        for (name, size) in [
            ("denoise.template_window", self.template_window),
            ("denoise.search_window", self.search_window),
        ] {
            if size == 0 || size % 2 == 0 {
                return Err(NightModeError::invalid(name, format!("must be a positive odd number, got {}", size)));
            }
        }
        if self.template_window > self.search_window {
            return Err(NightModeError::invalid(
                "denoise.template_window",
                format!(
                    "{} is larger than the search window {}",
                    self.template_window, self.search_window
                ),
            ));
        }
        Ok(())
    }
}

/// Denoises `planes` jointly: one patch distance summed over all planes, one weight per pixel pair.
/// Window sizes must be odd.
pub fn denoise_planes(
    planes: &[Vec<f32>],
    width: usize,
    height: usize,
    h: f32,
    template_window: usize,
    search_window: usize,
    progress: Option<&dyn ProgressSink>,
) -> Vec<Vec<f32>> {
    let channels = planes.len();
    if channels == 0 || width == 0 || height == 0 {
        return planes.to_vec();
    }

    let t = template_window / 2;
    let s = search_window / 2;
    let border = s + t;
    let padded: Vec<Vec<f32>> = planes
        .par_iter()
        .map(|plane| pad_reflect101(plane, width, height, border))
        .collect();
    let pw = width + 2 * border;

    // Region of patch centres the template sums are taken over, in padded coordinates offset by `s`
    let rw = width + 2 * t;
    let rh = height + 2 * t;
    let iw = rw + 1;
    let patch_area = (template_window * template_window) as f64;
    let inv_h2 = 1.0 / (h * h * channels as f32);

    // Per pixel: [weight sum, weighted value per channel]
    let stride = channels + 1;
    let mut acc = vec![0.0f32; width * height * stride];
    let mut sqdiff = vec![0.0f32; rw * rh];
    let mut integral = vec![0.0f64; iw * (rh + 1)];

    let span = search_window as isize;
    for (row_idx, dy) in (-(s as isize)..=s as isize).enumerate() {
        for dx in -(s as isize)..=s as isize {
            sqdiff.par_chunks_exact_mut(rw).enumerate().for_each(|(ry, row)| {
                let base = (ry + s) * pw + s;
                let shifted = ((ry + s) as isize + dy) as usize * pw;
                for (rx, out) in row.iter_mut().enumerate() {
                    let sx = ((rx + s) as isize + dx) as usize;
                    *out = padded
                        .iter()
                        .map(|p| {
                            let diff = p[base + rx] - p[shifted + sx];
                            diff * diff
                        })
                        .sum();
                }
            });

            build_integral(&sqdiff, rw, &mut integral);

            acc.par_chunks_exact_mut(width * stride).enumerate().for_each(|(y, row)| {
                let top = &integral[y * iw..(y + 1) * iw];
                let bottom = &integral[(y + template_window) * iw..(y + template_window + 1) * iw];
                let src_row = ((y + border) as isize + dy) as usize * pw;
                for x in 0..width {
                    let x2 = x + template_window;
                    let sum = bottom[x2] - bottom[x] - top[x2] + top[x];
                    let distance = (sum / patch_area) as f32;
                    let weight = (-distance * inv_h2).exp();
                    if weight < WEIGHT_THRESHOLD {
                        continue;
                    }
                    let sx = ((x + border) as isize + dx) as usize;
                    let px = &mut row[x * stride..(x + 1) * stride];
                    px[0] += weight;
                    for (c, plane) in padded.iter().enumerate() {
                        px[c + 1] += weight * plane[src_row + sx];
                    }
                }
            });
        }

        if let Some(p) = progress {
            p.set((row_idx + 1) as f32 / span as f32, None);
        }
    }

    let mut out = vec![vec![0.0f32; width * height]; channels];
    for (c, plane) in out.iter_mut().enumerate() {
        plane.par_iter_mut().enumerate().for_each(|(i, v)| {
            let px = &acc[i * stride..(i + 1) * stride];
            *v = px[c + 1] / px[0];
        });
    }
    out
}

/// Summed-area table with a zero first row and column
fn build_integral(values: &[f32], width: usize, integral: &mut [f64]) {
    let iw = width + 1;
    integral[..iw].fill(0.0);
    integral[iw..]
        .par_chunks_exact_mut(iw)
        .zip(values.par_chunks_exact(width))
        .for_each(|(row, src)| {
            let mut running = 0.0f64;
            row[0] = 0.0;
            for (dst, &v) in row[1..].iter_mut().zip(src.iter()) {
                running += v as f64;
                *dst = running;
            }
        });

    let rows = integral.len() / iw;
    for y in 2..rows {
        let (above, current) = integral.split_at_mut(y * iw);
        let prev = &above[(y - 1) * iw..];
        for (dst, &p) in current[..iw].iter_mut().zip(prev.iter()) {
            *dst += p;
        }
    }
}

fn quantize(v: f32) -> f32 {
    v.round().clamp(0.0, 255.0)
}

/// Color NLM: the image goes to 8-bit-scaled Lab, lightness is filtered with
/// `h_luminance` and the a/b pair jointly with `h_color`.
pub fn denoise_colored(
    image: &RgbImage,
    params: &DenoiseParams,
    progress: Option<&dyn ProgressSink>,
) -> Result<RgbImage> {
    params.validate()?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(image.clone());
    }
    let (w, h) = (width as usize, height as usize);
    let template = params.template_window as usize;
    let search = params.search_window as usize;

    let lab = LabImage::from_rgb(image);
    let lightness: Vec<f32> = lab.l.par_iter().map(|&l| l_to_8bit(l) as f32).collect();
    let a: Vec<f32> = lab.a.par_iter().map(|&v| quantize(v + CHROMA_OFFSET)).collect();
    let b: Vec<f32> = lab.b.par_iter().map(|&v| quantize(v + CHROMA_OFFSET)).collect();

    let luminance_progress = progress.map(|p| StageProgress::new(p, 0.0, 0.5));
    let mut l_out = denoise_planes(
        &[lightness],
        w,
        h,
        params.h_luminance,
        template,
        search,
        luminance_progress.as_ref().map(|p| p as &dyn ProgressSink),
    );

    let chroma_progress = progress.map(|p| StageProgress::new(p, 0.5, 1.0));
    let mut ab_out = denoise_planes(
        &[a, b],
        w,
        h,
        params.h_color,
        template,
        search,
        chroma_progress.as_ref().map(|p| p as &dyn ProgressSink),
    )
    .into_iter();

    let (Some(l), Some(a), Some(b)) = (l_out.pop(), ab_out.next(), ab_out.next()) else {
        return Err(NightModeError::invalid("denoise", "unexpected plane count"));
    };

    let filtered = LabImage {
        width,
        height,
        l: l.par_iter().map(|&v| l_from_8bit(quantize(v) as u8)).collect(),
        a: a.par_iter().map(|&v| quantize(v) - CHROMA_OFFSET).collect(),
        b: b.par_iter().map(|&v| quantize(v) - CHROMA_OFFSET).collect(),
    };
    Ok(filtered.to_rgb())
}
