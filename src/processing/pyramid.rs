//! Gaussian / Laplacian pyramids over interleaved float images.
//!
//! Both directions use the 5-tap binomial kernel `[1 4 6 4 1]` with
//! reflect-101 borders: `/16` per axis when reducing, `/8` per axis on the
//! zero-interleaved grid when expanding.

use image::Rgb32FImage;
use rayon::prelude::*;

use crate::processing::border::reflect101;

const KERNEL_DOWN: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];
const KERNEL_UP: [f32; 5] = [1.0 / 8.0, 4.0 / 8.0, 6.0 / 8.0, 4.0 / 8.0, 1.0 / 8.0];

/// Interleaved float image with an arbitrary channel count
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl FloatImage {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self { width, height, channels, data: vec![0.0; width * height * channels] }
    }

    pub fn from_data(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width * height * channels);
        Self { width, height, channels, data }
    }

    fn row_len(&self) -> usize {
        self.width * self.channels
    }

    pub fn into_rgb32f(self) -> Rgb32FImage {
        debug_assert_eq!(self.channels, 3);
        let mut out = Rgb32FImage::new(self.width as u32, self.height as u32);
        let buffer: &mut [f32] = &mut out;
        buffer.copy_from_slice(&self.data);
        out
    }

    /// `self += other`
    pub fn add_assign(&mut self, other: &FloatImage) {
        self.data
            .par_iter_mut()
            .zip(other.data.par_iter())
            .for_each(|(a, &b)| *a += b);
    }

    /// `self -= other`
    pub fn sub_assign(&mut self, other: &FloatImage) {
        self.data
            .par_iter_mut()
            .zip(other.data.par_iter())
            .for_each(|(a, &b)| *a -= b);
    }
}

/// Blur and drop every other row and column; output is `ceil(w/2) x ceil(h/2)`
pub fn pyr_down(src: &FloatImage) -> FloatImage {
    let (w, h, c) = (src.width, src.height, src.channels);
    let dw = w.div_ceil(2);
    let dh = h.div_ceil(2);

    // Horizontal pass, evaluated on even columns only
    let mut tmp = FloatImage::new(dw, h, c);
    let tmp_row_len = tmp.row_len();
    tmp.data
        .par_chunks_exact_mut(tmp_row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = &src.data[y * src.row_len()..(y + 1) * src.row_len()];
            for dx in 0..dw {
                for (k, &kv) in KERNEL_DOWN.iter().enumerate() {
                    let sx = reflect101(2 * dx as isize + k as isize - 2, w);
                    for ch in 0..c {
                        row[dx * c + ch] += kv * src_row[sx * c + ch];
                    }
                }
            }
        });

    let mut dst = FloatImage::new(dw, dh, c);
    let dst_row_len = dst.row_len();
    dst.data
        .par_chunks_exact_mut(dst_row_len)
        .enumerate()
        .for_each(|(dy, row)| {
            for (k, &kv) in KERNEL_DOWN.iter().enumerate() {
                let sy = reflect101(2 * dy as isize + k as isize - 2, h);
                let src_row = &tmp.data[sy * tmp_row_len..(sy + 1) * tmp_row_len];
                for (d, &s) in row.iter_mut().zip(src_row.iter()) {
                    *d += kv * s;
                }
            }
        });
    dst
}

/// Source taps for every destination index of a zero-interleaved upsample.
/// Weights are renormalized so a one-pixel destination does not double its value.
fn upsample_taps(dst_len: usize) -> Vec<Vec<(usize, f32)>> {
    (0..dst_len)
        .map(|x| {
            let mut taps: Vec<(usize, f32)> = Vec::with_capacity(3);
            for (k, &kv) in KERNEL_UP.iter().enumerate() {
                let j = reflect101(x as isize + k as isize - 2, dst_len);
                if j % 2 == 0 {
                    taps.push((j / 2, kv));
                }
            }
            let total: f32 = taps.iter().map(|&(_, w)| w).sum();
            if total != 1.0 {
                for tap in taps.iter_mut() {
                    tap.1 /= total;
                }
            }
            taps
        })
        .collect()
}

/// Upsample to `dst_width x dst_height` (each at most twice the source size)
pub fn pyr_up(src: &FloatImage, dst_width: usize, dst_height: usize) -> FloatImage {
    let c = src.channels;
    debug_assert!(dst_width.div_ceil(2) <= src.width && dst_height.div_ceil(2) <= src.height);
    let taps_x = upsample_taps(dst_width);
    let taps_y = upsample_taps(dst_height);

    let mut tmp = FloatImage::new(dst_width, src.height, c);
    let tmp_row_len = tmp.row_len();
    tmp.data
        .par_chunks_exact_mut(tmp_row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let src_row = &src.data[y * src.row_len()..(y + 1) * src.row_len()];
            for (x, taps) in taps_x.iter().enumerate() {
                for &(sx, kv) in taps {
                    for ch in 0..c {
                        row[x * c + ch] += kv * src_row[sx * c + ch];
                    }
                }
            }
        });

    let mut dst = FloatImage::new(dst_width, dst_height, c);
    let dst_row_len = dst.row_len();
    dst.data
        .par_chunks_exact_mut(dst_row_len)
        .enumerate()
        .for_each(|(y, row)| {
            for &(sy, kv) in &taps_y[y] {
                let src_row = &tmp.data[sy * tmp_row_len..(sy + 1) * tmp_row_len];
                for (d, &s) in row.iter_mut().zip(src_row.iter()) {
                    *d += kv * s;
                }
            }
        });
    dst
}

/// Levels `0..=max_level`, level 0 being the input itself
pub fn gaussian_pyramid(image: FloatImage, max_level: usize) -> Vec<FloatImage> {
    let mut levels = Vec::with_capacity(max_level + 1);
    levels.push(image);
    for _ in 0..max_level {
        let next = pyr_down(&levels[levels.len() - 1]);
        levels.push(next);
    }
    levels
}

/// Band-pass levels plus the coarsest Gaussian level on top
pub fn laplacian_pyramid(image: FloatImage, max_level: usize) -> Vec<FloatImage> {
    let mut levels = gaussian_pyramid(image, max_level);
    for lvl in 0..max_level {
        let up = pyr_up(&levels[lvl + 1], levels[lvl].width, levels[lvl].height);
        levels[lvl].sub_assign(&up);
    }
    levels
}

/// Inverse of `laplacian_pyramid`
pub fn collapse(mut levels: Vec<FloatImage>) -> Option<FloatImage> {
    let mut current = levels.pop()?;
    while let Some(mut finer) = levels.pop() {
        let up = pyr_up(&current, finer.width, finer.height);
        finer.add_assign(&up);
        current = finer;
    }
    Some(current)
}

/// Number of reductions until the shorter side reaches one pixel
pub fn max_level_for(width: usize, height: usize) -> usize {
    width.min(height).max(1).ilog2() as usize
}
