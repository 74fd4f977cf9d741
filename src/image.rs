use std::fmt;
use std::path::Path;

use ::image::ColorType;
use log::info;

/// Which row of the pixel slice comes first. Frames are stored bottom row first, while
/// image files want the top row first, so every writer call has to say what it hands over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrder {
    TopFirst,
    BottomFirst,
}

/// Error types for writing images.
#[derive(Debug)]
pub enum ImageError {
    /// Pixel slice doesn't hold width * height rgb8 pixels.
    SizeMismatch { expected: usize, actual: usize },
    Encode(::image::ImageError),
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::SizeMismatch { expected, actual } => {
                write!(f, "Expected {} bytes of pixel data, got {}", expected, actual)
            }
            ImageError::Encode(e) => write!(f, "Encode error: {}", e),
        }
    }
}

impl std::error::Error for ImageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImageError::Encode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<::image::ImageError> for ImageError {
    fn from(e: ::image::ImageError) -> Self {
        ImageError::Encode(e)
    }
}

/// Rows of an rgb8 buffer in top first order, flipping them if needed.
pub fn top_first_rows(width: u32, pixels: &[u8], order: RowOrder) -> Vec<u8> {
    match order {
        RowOrder::TopFirst => return pixels.to_vec(),
        RowOrder::BottomFirst => {
            let row_len = (3 * width as usize).max(1);
            return pixels.rchunks_exact(row_len).flatten().copied().collect();
        }
    }
}

/// Persists an rgb8 buffer, the format being picked from the file extension.
pub fn write_rgb<P: AsRef<Path>>(
    path: P,
    width: u32,
    height: u32,
    pixels: &[u8],
    order: RowOrder,
) -> Result<(), ImageError> {
    let path = path.as_ref();
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(3))
        .unwrap_or(usize::MAX);
    if pixels.len() != expected {
        return Err(ImageError::SizeMismatch { expected, actual: pixels.len() });
    }
    let rows = top_first_rows(width, pixels, order);
    ::image::save_buffer(path, &rows, width, height, ColorType::Rgb8)?;
    info!("Wrote {}x{} image to {}", width, height, path.display());
    return Ok(());
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 3] = [255, 0, 0];

    /// 2x2 frame with only the bottom left pixel red, bottom row first.
    fn bottom_left_red() -> Vec<u8> {
        let mut pixels = vec![0; 12];
        pixels[0..3].copy_from_slice(&RED);
        return pixels;
    }

    #[test]
    fn bottom_first_rows_are_flipped_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flip.png");
        write_rgb(&path, 2, 2, &bottom_left_red(), RowOrder::BottomFirst).unwrap();
        let written = ::image::open(&path).unwrap().to_rgb8();
        assert_eq!(written.get_pixel(0, 1).0, RED);
        assert_eq!(written.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn top_first_rows_are_written_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("as_is.png");
        write_rgb(&path, 2, 2, &bottom_left_red(), RowOrder::TopFirst).unwrap();
        let written = ::image::open(&path).unwrap().to_rgb8();
        assert_eq!(written.get_pixel(0, 0).0, RED);
    }

    #[test]
    fn wrong_buffer_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_rgb(dir.path().join("bad.png"), 3, 2, &[0; 12], RowOrder::TopFirst);
        assert!(matches!(result, Err(ImageError::SizeMismatch { expected: 18, actual: 12 })));
    }

    #[test]
    fn flipping_keeps_pixel_order_within_rows() {
        let pixels = [1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4];
        assert_eq!(
            top_first_rows(2, &pixels, RowOrder::BottomFirst),
            vec![3, 3, 3, 4, 4, 4, 1, 1, 1, 2, 2, 2]
        );
    }
}
