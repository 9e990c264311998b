use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::utils::error_handling::{NightModeError, Result};

/// Preview size used by `save_preview` when the caller has no preference
pub const PREVIEW_WIDTH: u32 = 960;
pub const PREVIEW_HEIGHT: u32 = 540;

/// Decodes any supported format into 8-bit RGB.
/// A missing, unreadable or empty image is a `LoadFailure`; there is no retry.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let decoded = image::open(path).map_err(|e| NightModeError::LoadFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let rgb = decoded.to_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(NightModeError::LoadFailure {
            path: path.to_path_buf(),
            reason: "image has zero width or height".into(),
        });
    }
    Ok(rgb)
}

/// Encodes the image; the format follows the file extension
pub fn save_image(image: &RgbImage, path: &Path) -> Result<()> {
    image.save(path).map_err(|e| NightModeError::WriteFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Writes a copy resized to exactly `width` x `height` (aspect ratio is not kept)
pub fn save_preview(image: &RgbImage, path: &Path, width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(NightModeError::invalid(
            "preview_size",
            format!("{}x{} has a zero dimension", width, height),
        ));
    }
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    save_image(&resized, path)
}

/// File name component of a path, for log messages
pub fn get_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown file")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.png");
        match load_image(&missing) {
            Err(NightModeError::LoadFailure { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected LoadFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_load_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(load_image(&path), Err(NightModeError::LoadFailure { .. })));
    }

    #[test]
    fn test_save_and_reload_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let image = RgbImage::from_fn(7, 5, |x, y| Rgb([x as u8 * 30, y as u8 * 40, 200]));

        save_image(&image, &path).unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded, image);
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no_such_dir").join("out.png");
        let image = RgbImage::new(2, 2);
        assert!(matches!(
            save_image(&image, &path),
            Err(NightModeError::WriteFailure { .. })
        ));
    }

    #[test]
    fn test_preview_has_requested_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.png");
        let image = RgbImage::from_pixel(40, 30, Rgb([10, 20, 30]));

        save_preview(&image, &path, 96, 54).unwrap();
        let loaded = load_image(&path).unwrap();
        assert_eq!(loaded.dimensions(), (96, 54));
    }

    #[test]
    fn test_get_file_name() {
        assert_eq!(get_file_name(Path::new("/tmp/night.jpg")), "night.jpg");
        assert_eq!(get_file_name(Path::new("/")), "unknown file");
    }
}
