//! sRGB <-> CIE L*a*b* (D65) conversions.
//!
//! Lightness is kept in `[0, 100]`, a/b are unbounded floats (roughly
//! `[-128, 127]` for sRGB content). Stages that work on 8-bit scaled planes
//! use `l_to_8bit` / `l_from_8bit` and the `CHROMA_OFFSET`.

use std::sync::LazyLock;

use glam::{Mat3, Vec3};
use image::RgbImage;
use rayon::prelude::*;

/// D65 reference white
const WHITE_D65: Vec3 = Vec3::new(0.95047, 1.0, 1.08883);

/// Offset applied to a/b when they are stored on the 8-bit scale
pub const CHROMA_OFFSET: f32 = 128.0;

const LAB_EPSILON: f32 = 216.0 / 24389.0; // (6/29)^3
const LAB_DELTA: f32 = 6.0 / 29.0;

fn srgb_to_xyz_matrix() -> Mat3 {
    Mat3::from_cols_array(&[
        0.4124564, 0.2126729, 0.0193339,
        0.3575761, 0.7151522, 0.1191920,
        0.1804375, 0.0721750, 0.9503041,
    ])
}

fn xyz_to_srgb_matrix() -> Mat3 {
    // XYZ -> linear sRGB, D65
    Mat3::from_cols_array(&[
        3.2404542, -0.9692660, 0.0556434,
       -1.5371385,  1.8760108, -0.2040259,
       -0.4985314,  0.0415560, 1.0572252,
    ])
}

static SRGB_TO_LINEAR_LUT: LazyLock<[f32; 256]> = LazyLock::new(|| {
    let mut lut = [0.0f32; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = srgb_eotf(i as f32 / 255.0);
    }
    lut
});

#[inline]
fn srgb_eotf(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn srgb_oetf(v: f32) -> f32 {
    let v = v.clamp(0.0, 1.0);
    if v <= 0.0031308 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        t / (3.0 * LAB_DELTA * LAB_DELTA) + 4.0 / 29.0
    }
}

#[inline]
fn lab_f_inv(f: f32) -> f32 {
    if f > LAB_DELTA {
        f * f * f
    } else {
        3.0 * LAB_DELTA * LAB_DELTA * (f - 4.0 / 29.0)
    }
}

/// 8-bit sRGB pixel to (L, a, b)
#[inline]
pub fn rgb_to_lab(rgb: [u8; 3]) -> Vec3 {
    let lut = &*SRGB_TO_LINEAR_LUT;
    let linear = Vec3::new(lut[rgb[0] as usize], lut[rgb[1] as usize], lut[rgb[2] as usize]);
    let xyz = srgb_to_xyz_matrix() * linear / WHITE_D65;

    let fx = lab_f(xyz.x);
    let fy = lab_f(xyz.y);
    let fz = lab_f(xyz.z);
    Vec3::new(116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

/// (L, a, b) back to 8-bit sRGB, rounding and clamping out-of-gamut values
#[inline]
pub fn lab_to_rgb(lab: Vec3) -> [u8; 3] {
    let fy = (lab.x + 16.0) / 116.0;
    let fx = fy + lab.y / 500.0;
    let fz = fy - lab.z / 200.0;
    let xyz = Vec3::new(lab_f_inv(fx), lab_f_inv(fy), lab_f_inv(fz)) * WHITE_D65;
    let linear = xyz_to_srgb_matrix() * xyz;

    let encode = |v: f32| (srgb_oetf(v) * 255.0).round().clamp(0.0, 255.0) as u8;
    [encode(linear.x), encode(linear.y), encode(linear.z)]
}

/// Lightness `[0, 100]` to the 8-bit scale, rounded
#[inline]
pub fn l_to_8bit(l: f32) -> u8 {
    (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8
}

#[inline]
pub fn l_from_8bit(v: u8) -> f32 {
    v as f32 * 100.0 / 255.0
}

/// Planar L*a*b* image
#[derive(Debug, Clone, PartialEq)]
pub struct LabImage {
    pub width: u32,
    pub height: u32,
    pub l: Vec<f32>,
    pub a: Vec<f32>,
    pub b: Vec<f32>,
}

impl LabImage {
    pub fn from_rgb(image: &RgbImage) -> Self {
        let pixels: Vec<Vec3> = image
            .as_raw()
            .par_chunks_exact(3)
            .map(|px| rgb_to_lab([px[0], px[1], px[2]]))
            .collect();

        let mut l = Vec::with_capacity(pixels.len());
        let mut a = Vec::with_capacity(pixels.len());
        let mut b = Vec::with_capacity(pixels.len());
        for p in pixels {
            l.push(p.x);
            a.push(p.y);
            b.push(p.z);
        }

        Self { width: image.width(), height: image.height(), l, a, b }
    }

    pub fn to_rgb(&self) -> RgbImage {
        let mut out = RgbImage::new(self.width, self.height);
        let buffer: &mut [u8] = &mut out;
        buffer
            .par_chunks_exact_mut(3)
            .enumerate()
            .for_each(|(i, px)| {
                let rgb = lab_to_rgb(Vec3::new(self.l[i], self.a[i], self.b[i]));
                px.copy_from_slice(&rgb);
            });
        out
    }

    /// Lightness plane quantized to 8 bits
    pub fn lightness_8bit(&self) -> Vec<u8> {
        self.l.par_iter().map(|&l| l_to_8bit(l)).collect()
    }

    pub fn set_lightness_8bit(&mut self, values: &[u8]) {
        debug_assert_eq!(values.len(), self.l.len());
        self.l
            .par_iter_mut()
            .zip(values.par_iter())
            .for_each(|(l, &v)| *l = l_from_8bit(v));
    }
}
