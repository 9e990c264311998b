//! Contrast-limited adaptive histogram equalization (CLAHE) on the lightness channel.
//!
//! Tile LUTs are built on a reflect-101 extended copy when the image size does
//! not divide the tile grid; output pixels interpolate bilinearly between the
//! four closest tile LUTs.

use image::{GrayImage, RgbImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::processing::border::reflect101;
use crate::processing::color_processing::LabImage;
use crate::processing::histogram::{Histogram256, BIN_COUNT};
use crate::utils::error_handling::{NightModeError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaheParams {
    /// Cap on local contrast amplification, relative to a flat histogram
    pub clip_limit: f32,
    /// Number of tiles horizontally and vertically
    pub tile_grid: (u32, u32),
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self { clip_limit: 2.0, tile_grid: (8, 8) }
    }
}

impl ClaheParams {
    pub fn validate(&self) -> Result<()> {
        if !self.clip_limit.is_finite() || self.clip_limit <= 0.0 {
            return Err(NightModeError::invalid(
                "clahe.clip_limit",
                format!("must be a positive number, got {}", self.clip_limit),
            ));
        }
        if self.tile_grid.0 == 0 || self.tile_grid.1 == 0 {
            return Err(NightModeError::invalid(
                "clahe.tile_grid",
                format!("needs at least one tile per axis, got {:?}", self.tile_grid),
            ));
        }
        Ok(())
    }
}

pub struct Clahe {
    clip_limit: f32,
    grid_x: usize,
    grid_y: usize,
}

impl Clahe {
    pub fn new(params: &ClaheParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            clip_limit: params.clip_limit,
            grid_x: params.tile_grid.0 as usize,
            grid_y: params.tile_grid.1 as usize,
        })
    }

    pub fn apply(&self, image: &GrayImage) -> GrayImage {
        let (w, h) = image.dimensions();
        let out = self.apply_plane(image.as_raw(), w as usize, h as usize);
        GrayImage::from_vec(w, h, out).unwrap_or_else(|| GrayImage::new(w, h))
    }

    /// Equalizes only the lightness plane; a/b are left untouched
    pub fn apply_to_lab(&self, lab: &mut LabImage) {
        let lightness = lab.lightness_8bit();
        let equalized = self.apply_plane(&lightness, lab.width as usize, lab.height as usize);
        lab.set_lightness_8bit(&equalized);
    }

    pub fn apply_plane(&self, plane: &[u8], width: usize, height: usize) -> Vec<u8> {
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let ext_w = width.div_ceil(self.grid_x) * self.grid_x;
        let ext_h = height.div_ceil(self.grid_y) * self.grid_y;
        let extended;
        let source = if ext_w != width || ext_h != height {
            extended = extend_reflect101(plane, width, height, ext_w, ext_h);
            &extended[..]
        } else {
            plane
        };

        let tile_w = ext_w / self.grid_x;
        let tile_h = ext_h / self.grid_y;
        let luts = self.tile_luts(source, ext_w, tile_w, tile_h);

        let inv_tw = 1.0 / tile_w as f32;
        let inv_th = 1.0 / tile_h as f32;
        let mut out = vec![0u8; width * height];
        out.par_chunks_exact_mut(width).enumerate().for_each(|(y, row)| {
            let tyf = y as f32 * inv_th - 0.5;
            let ty1 = tyf.floor() as isize;
            let ya = tyf - ty1 as f32;
            let ya1 = 1.0 - ya;
            let ty2 = ((ty1 + 1) as usize).min(self.grid_y - 1);
            let ty1 = ty1.max(0) as usize;

            let src_row = &plane[y * width..(y + 1) * width];
            for (x, dst) in row.iter_mut().enumerate() {
                let txf = x as f32 * inv_tw - 0.5;
                let tx1 = txf.floor() as isize;
                let xa = txf - tx1 as f32;
                let xa1 = 1.0 - xa;
                let tx2 = ((tx1 + 1) as usize).min(self.grid_x - 1);
                let tx1 = tx1.max(0) as usize;

                let v = src_row[x] as usize;
                let lut = |tx: usize, ty: usize| luts[ty * self.grid_x + tx][v] as f32;
                let top = xa1 * lut(tx1, ty1) + xa * lut(tx2, ty1);
                let bottom = xa1 * lut(tx1, ty2) + xa * lut(tx2, ty2);
                *dst = (ya1 * top + ya * bottom).round().clamp(0.0, 255.0) as u8;
            }
        });
        out
    }

    fn tile_luts(&self, source: &[u8], stride: usize, tile_w: usize, tile_h: usize) -> Vec<[u8; BIN_COUNT]> {
        let area = tile_w * tile_h;
        let limit = ((self.clip_limit * area as f32 / BIN_COUNT as f32) as u32).max(1);

        (0..self.grid_x * self.grid_y)
            .into_par_iter()
            .map(|idx| {
                let tx = idx % self.grid_x;
                let ty = idx / self.grid_x;
                let mut hist = Histogram256::from_region(source, stride, tx * tile_w, ty * tile_h, tile_w, tile_h);
                hist.clip_and_redistribute(limit);
                hist.equalization_lut()
            })
            .collect()
    }
}

fn extend_reflect101(plane: &[u8], width: usize, height: usize, ext_w: usize, ext_h: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(ext_w * ext_h);
    for y in 0..ext_h {
        let sy = reflect101(y as isize, height);
        let row = &plane[sy * width..(sy + 1) * width];
        out.extend((0..ext_w).map(|x| row[reflect101(x as isize, width)]));
    }
    out
}

/// RGB -> Lab, CLAHE on L, Lab -> RGB
pub fn enhance_contrast(image: &RgbImage, params: &ClaheParams) -> Result<RgbImage> {
    let clahe = Clahe::new(params)?;
    let mut lab = LabImage::from_rgb(image);
    clahe.apply_to_lab(&mut lab);
    Ok(lab.to_rgb())
}
