//! Utility functions and helpers

use crate::error::{Result, WatermarkError};
use std::path::Path;

/// File utilities
pub mod file {
    use super::*;

    /// Check if a file exists and is readable
    pub fn is_file_accessible(path: &Path) -> bool {
        path.is_file() && std::fs::File::open(path).is_ok()
    }

    /// Ensure a directory exists, creating it if necessary
    pub fn ensure_directory_exists(path: &Path) -> Result<()> {
        if !path.is_dir() {
            std::fs::create_dir_all(path)?;
        }
        Ok(())
    }
}

/// Image format detection
pub mod format {
    use super::*;
    use image::ImageFormat;
    use std::io::Read;

    const SNIFF_LEN: u64 = 512;

    /// Detect the image format from the file's leading bytes, ignoring its name
    pub fn sniff_format(path: &Path) -> Result<Option<ImageFormat>> {
        let file = std::fs::File::open(path)?;
        let mut header = Vec::with_capacity(SNIFF_LEN as usize);
        file.take(SNIFF_LEN).read_to_end(&mut header)?;

        Ok(image::guess_format(&header).ok())
    }

    /// Decode an image using the format sniffed from its content
    pub fn open_image(path: &Path) -> Result<image::DynamicImage> {
        let format = sniff_format(path)?.ok_or_else(|| WatermarkError::DecodeFailed {
            path: path.to_path_buf(),
            message: "unrecognized image format".to_string(),
        })?;
        let reader = std::io::BufReader::new(std::fs::File::open(path)?);
        image::load(reader, format).map_err(|e| WatermarkError::DecodeFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Encoder for `target`: its extension decides, else the source format
    pub fn output_format_for(target: &Path, source_format: ImageFormat) -> ImageFormat {
        ImageFormat::from_path(target).unwrap_or(source_format)
    }
}

/// Performance monitoring utilities
pub mod performance {
    use std::time::{Duration, Instant};

    /// Simple performance timer
    pub struct Timer {
        start: Instant,
        name: String,
    }

    impl Timer {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                start: Instant::now(),
                name: name.into(),
            }
        }

        pub fn elapsed(&self) -> Duration {
            self.start.elapsed()
        }

        pub fn elapsed_ms(&self) -> u128 {
            self.elapsed().as_millis()
        }
    }

    impl Drop for Timer {
        fn drop(&mut self) {
            tracing::debug!("Timer '{}' elapsed: {}ms", self.name, self.elapsed_ms());
        }
    }
}

/// Validation utilities
pub mod validation {
    use super::*;

    /// Validate encoder quality setting
    pub fn validate_quality(quality: u8) -> Result<()> {
        if quality == 0 || quality > 100 {
            return Err(WatermarkError::InvalidInput {
                message: format!("Quality {} must be between 1 and 100", quality),
            });
        }
        Ok(())
    }

    /// Validate a transparency value
    pub fn validate_transparency(transparency: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&transparency) {
            return Err(WatermarkError::InvalidInput {
                message: format!("Transparency {} must be between 0.0 and 1.0", transparency),
            });
        }
        Ok(())
    }

    /// Validate a preview zoom percentage
    pub fn validate_zoom(zoom: u32) -> Result<()> {
        if zoom == 0 || zoom > 1000 {
            return Err(WatermarkError::InvalidInput {
                message: format!("Zoom {}% must be between 1 and 1000", zoom),
            });
        }
        Ok(())
    }

    /// The batch source root must be an existing directory
    pub fn validate_source_directory(path: &Path) -> Result<()> {
        if !path.is_dir() {
            return Err(WatermarkError::InvalidInput {
                message: format!("Source {} is not a directory", path.display()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_ignores_extension() {
        let temp_dir = tempdir().unwrap();

        let real_png = temp_dir.path().join("photo.jpg");
        RgbImage::from_pixel(2, 2, Rgb([1, 2, 3]))
            .save_with_format(&real_png, ImageFormat::Png)
            .unwrap();
        assert_eq!(
            format::sniff_format(&real_png).unwrap(),
            Some(ImageFormat::Png)
        );

        let fake_png = temp_dir.path().join("notes.png");
        std::fs::write(&fake_png, "just some text").unwrap();
        assert_eq!(format::sniff_format(&fake_png).unwrap(), None);

        let empty = temp_dir.path().join("empty.png");
        std::fs::write(&empty, "").unwrap();
        assert_eq!(format::sniff_format(&empty).unwrap(), None);
    }

    #[test]
    fn test_open_image_ignores_extension() {
        let temp_dir = tempdir().unwrap();

        let no_extension = temp_dir.path().join("logo");
        RgbImage::from_pixel(3, 2, Rgb([9, 8, 7]))
            .save_with_format(&no_extension, ImageFormat::Png)
            .unwrap();
        let image = format::open_image(&no_extension).unwrap();
        assert_eq!(image.to_rgb8().dimensions(), (3, 2));

        let text = temp_dir.path().join("fake.png");
        std::fs::write(&text, "not pixels").unwrap();
        let err = format::open_image(&text).unwrap_err();
        assert_eq!(err.error_type(), "decode_failed");
    }

    #[test]
    fn test_sniff_missing_file_errors() {
        assert!(format::sniff_format(Path::new("/no/such/file.png")).is_err());
    }

    #[test]
    fn test_output_format() {
        assert_eq!(
            format::output_format_for(Path::new("/out/a.jpeg"), ImageFormat::Png),
            ImageFormat::Jpeg
        );
        assert_eq!(
            format::output_format_for(Path::new("/out/no_extension"), ImageFormat::Png),
            ImageFormat::Png
        );
    }

    #[test]
    fn test_file_accessibility() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        std::fs::write(&file_path, "Hello, World!").unwrap();

        assert!(file::is_file_accessible(&file_path));
        assert!(!file::is_file_accessible(temp_dir.path()));
        assert!(!file::is_file_accessible(&PathBuf::from("/no/such/file")));
    }

    #[test]
    fn test_ensure_directory_exists() {
        let temp_dir = tempdir().unwrap();
        let nested = temp_dir.path().join("a/b/c");
        file::ensure_directory_exists(&nested).unwrap();
        assert!(nested.is_dir());
        file::ensure_directory_exists(&nested).unwrap();
    }

    #[test]
    fn test_quality_validation() {
        assert!(validation::validate_quality(85).is_ok());
        assert!(validation::validate_quality(1).is_ok());
        assert!(validation::validate_quality(100).is_ok());
        assert!(validation::validate_quality(0).is_err());
        assert!(validation::validate_quality(101).is_err());
    }

    #[test]
    fn test_transparency_validation() {
        assert!(validation::validate_transparency(0.5).is_ok());
        assert!(validation::validate_transparency(0.0).is_ok());
        assert!(validation::validate_transparency(1.0).is_ok());
        assert!(validation::validate_transparency(-0.1).is_err());
        assert!(validation::validate_transparency(1.1).is_err());
        assert!(validation::validate_transparency(f64::NAN).is_err());
    }

    #[test]
    fn test_zoom_validation() {
        assert!(validation::validate_zoom(30).is_ok());
        assert!(validation::validate_zoom(0).is_err());
    }

    #[test]
    fn test_source_directory_validation() {
        let temp_dir = tempdir().unwrap();
        assert!(validation::validate_source_directory(temp_dir.path()).is_ok());
        assert!(validation::validate_source_directory(&temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_performance_timer() {
        let timer = performance::Timer::new("test");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10);
    }
}
