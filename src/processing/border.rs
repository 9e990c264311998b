/// BORDER_REFLECT_101 index mapping (`gfedcb|abcdefgh|gfedcba`), valid for any offset
#[inline]
pub fn reflect101(i: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let period = 2 * len as isize - 2;
    let r = i.rem_euclid(period);
    if r >= len as isize {
        (period - r) as usize
    } else {
        r as usize
    }
}

/// Copies a plane into a larger one padded by `border` on every side with reflect-101 borders
pub fn pad_reflect101(plane: &[f32], width: usize, height: usize, border: usize) -> Vec<f32> {
    let pw = width + 2 * border;
    let ph = height + 2 * border;
    let mut out = Vec::with_capacity(pw * ph);
    for y in 0..ph {
        let sy = reflect101(y as isize - border as isize, height);
        let row = &plane[sy * width..(sy + 1) * width];
        for x in 0..pw {
            out.push(row[reflect101(x as isize - border as isize, width)]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect101() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(2, 5), 2);
        // Offsets larger than the plane keep bouncing
        assert_eq!(reflect101(9, 3), 1);
        assert_eq!(reflect101(-7, 2), 1);
        assert_eq!(reflect101(42, 1), 0);
    }

    #[test]
    fn test_pad_reflect101() {
        let plane = [1.0, 2.0, 3.0];
        let padded = pad_reflect101(&plane, 3, 1, 1);
        // 5x3, rows reflect onto the single source row
        assert_eq!(padded.len(), 15);
        assert_eq!(&padded[0..5], &[2.0, 1.0, 2.0, 3.0, 2.0]);
        assert_eq!(&padded[5..10], &[2.0, 1.0, 2.0, 3.0, 2.0]);
    }
}
