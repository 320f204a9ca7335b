//! Opt-in image optimization for bundle entries.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageFormat, ImageReader};
use log::debug;

// Files this small are not worth re-encoding.
const MIN_OPTIMIZE_BYTES: u64 = 50 * 1024;

/// Result of a successful optimization pass.
#[derive(Debug, Clone)]
pub struct OptimizedImage {
    /// Re-encoded image bytes.
    pub bytes: Vec<u8>,
    /// Size of the original file on disk.
    pub original_size: u64,
    /// Size of the re-encoded bytes.
    pub new_size: u64,
}

/// Downscale and re-encode an image, returning the result only when smaller.
///
/// Files under 50 KiB are left alone, as are formats other than JPEG and PNG.
/// Images wider than `max_width` are resized proportionally before
/// re-encoding. `None` means the original file should be used as-is; every
/// failure degrades to that answer.
pub fn optimize_image(path: &Path, max_width: u32, quality: u8) -> Option<OptimizedImage> {
    let original_size = fs::metadata(path).ok()?.len();
    if original_size < MIN_OPTIMIZE_BYTES {
        return None;
    }

    let reader = ImageReader::open(path).ok()?.with_guessed_format().ok()?;
    let format = reader.format()?;
    if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
        return None;
    }

    let mut img = match reader.decode() {
        Ok(img) => img,
        Err(err) => {
            debug!("Failed to optimize image {}: {err}", path.display());
            return None;
        }
    };

    if img.width() > max_width {
        let ratio = f64::from(max_width) / f64::from(img.width());
        let height = ((f64::from(img.height()) * ratio) as u32).max(1);
        img = img.resize_exact(max_width, height, FilterType::Lanczos3);
    }

    let mut output = Vec::new();
    let encoded = match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut output), quality);
            img.write_with_encoder(encoder)
        }
        _ => img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png),
    };
    if let Err(err) = encoded {
        debug!("Failed to optimize image {}: {err}", path.display());
        return None;
    }

    let new_size = output.len() as u64;
    if new_size < original_size {
        Some(OptimizedImage {
            bytes: output,
            original_size,
            new_size,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use tempfile::tempdir;

    // Deterministic pseudo-noise keeps the fixture large after compression.
    fn noisy_image(width: u32, height: u32) -> RgbImage {
        let mut state: u32 = 0x2545_f491;
        RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            image::Rgb([
                (state & 0xff) as u8,
                ((state >> 8) & 0xff) as u8,
                ((state >> 16) & 0xff) as u8,
            ])
        })
    }

    #[test]
    fn small_files_are_left_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        noisy_image(8, 8).save(&path).unwrap();

        assert!(optimize_image(&path, 1920, 85).is_none());
    }

    #[test]
    fn non_image_payloads_are_left_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.png");
        fs::write(&path, vec![b'x'; 64 * 1024]).unwrap();

        assert!(optimize_image(&path, 1920, 85).is_none());
    }

    #[test]
    fn wide_jpegs_are_downscaled_and_reencoded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut bytes), 100);
        image::DynamicImage::ImageRgb8(noisy_image(1024, 768))
            .write_with_encoder(encoder)
            .unwrap();
        fs::write(&path, &bytes).unwrap();

        let optimized = optimize_image(&path, 512, 60).expect("noise should shrink");
        assert!(optimized.new_size < optimized.original_size);
        assert_eq!(optimized.original_size, bytes.len() as u64);

        let reloaded = image::load_from_memory(&optimized.bytes).unwrap();
        assert_eq!(reloaded.width(), 512);
        assert_eq!(reloaded.height(), 384);
    }

    #[test]
    fn images_that_do_not_shrink_are_left_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("noise.png");
        noisy_image(300, 300).save(&path).unwrap();

        // PNG noise cannot be recompressed below its original size.
        let size = fs::metadata(&path).unwrap().len();
        assert!(size > MIN_OPTIMIZE_BYTES);
        assert!(optimize_image(&path, 1920, 85).is_none());
    }
}
