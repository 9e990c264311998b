pub const BIN_COUNT: usize = 256;

/// 256-bin histogram of 8-bit samples, the building block of CLAHE tile LUTs
#[derive(Debug, Clone)]
pub struct Histogram256 {
    pub bins: [u32; BIN_COUNT],
    /// Number of samples the histogram was built from
    pub total: u32,
}

impl Histogram256 {
    pub fn new() -> Self {
        Self { bins: [0; BIN_COUNT], total: 0 }
    }

    /// Histogram of a rectangular region of a row-major plane
    pub fn from_region(plane: &[u8], stride: usize, x0: usize, y0: usize, width: usize, height: usize) -> Self {
        let mut hist = Self::new();
        for row in plane.chunks_exact(stride).skip(y0).take(height) {
            for &v in &row[x0..x0 + width] {
                hist.bins[v as usize] += 1;
            }
        }
        hist.total = (width * height) as u32;
        hist
    }

    /// Caps every bin at `limit` and spreads the clipped excess over all bins.
    /// The remainder that does not divide evenly goes to every `BIN_COUNT / residual`-th bin.
    pub fn clip_and_redistribute(&mut self, limit: u32) {
        let mut clipped = 0u32;
        for bin in self.bins.iter_mut() {
            if *bin > limit {
                clipped += *bin - limit;
                *bin = limit;
            }
        }

        let batch = clipped / BIN_COUNT as u32;
        let mut residual = (clipped % BIN_COUNT as u32) as usize;
        for bin in self.bins.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (BIN_COUNT / residual).max(1);
            let mut i = 0;
            while i < BIN_COUNT && residual > 0 {
                self.bins[i] += 1;
                residual -= 1;
                i += step;
            }
        }
    }

    /// Cumulative distribution scaled by `255 / total`, saturated to u8
    pub fn equalization_lut(&self) -> [u8; BIN_COUNT] {
        let scale = 255.0 / self.total.max(1) as f32;
        let mut lut = [0u8; BIN_COUNT];
        let mut sum = 0u32;
        for (entry, &count) in lut.iter_mut().zip(self.bins.iter()) {
            sum += count;
            *entry = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
        }
        lut
    }
}

impl Default for Histogram256 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mass(hist: &Histogram256) -> u32 {
        hist.bins.iter().sum()
    }

    #[test]
    fn test_histogram_region() {
        // 4x2 plane, take the right 2x2 block
        let plane = [0u8, 1, 2, 2, 5, 5, 2, 9];
        let hist = Histogram256::from_region(&plane, 4, 2, 0, 2, 2);
        assert_eq!(hist.total, 4);
        assert_eq!(hist.bins[2], 3);
        assert_eq!(hist.bins[9], 1);
        assert_eq!(mass(&hist), 4);
    }

    #[test]
    fn test_clip_preserves_mass() {
        let plane = vec![100u8; 64];
        let mut hist = Histogram256::from_region(&plane, 8, 0, 0, 8, 8);
        hist.clip_and_redistribute(1);
        assert_eq!(mass(&hist), 64);
        assert!(hist.bins.iter().all(|&b| b <= 2));
    }

    #[test]
    fn test_clip_with_batch_redistribution() {
        let plane = vec![7u8; 1024];
        let mut hist = Histogram256::from_region(&plane, 32, 0, 0, 32, 32);
        hist.clip_and_redistribute(8);
        // 1016 clipped: 3 per bin plus 248 residual
        assert_eq!(mass(&hist), 1024);
        assert_eq!(hist.bins[255], 3);
        assert_eq!(hist.bins[7], 8 + 3 + 1);
    }

    #[test]
    fn test_lut_is_monotonic_and_ends_at_white() {
        let plane: Vec<u8> = (0..=255u8).collect();
        let hist = Histogram256::from_region(&plane, 16, 0, 0, 16, 16);
        let lut = hist.equalization_lut();
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(lut[255], 255);
    }

    #[test]
    fn test_lut_scaled_by_region_size() {
        // half the samples at 0, half at 200
        let plane: Vec<u8> = (0..16).map(|i| if i < 8 { 0 } else { 200 }).collect();
        let hist = Histogram256::from_region(&plane, 4, 0, 0, 4, 4);
        let lut = hist.equalization_lut();
        assert_eq!(lut[0], 128);
        assert_eq!(lut[199], 128);
        assert_eq!(lut[200], 255);
    }
}
