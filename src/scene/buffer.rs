use std::ops::Range;

use super::RenderError;
use crate::util::{Color, BLACK};

/// Value of an untouched depth buffer cell. Anything drawn is closer than this.
pub const DEPTH_CLEAR: f32 = f32::MIN;

/// Part of a frame held by a buffer: the full frame dimensions plus the range of rows
/// actually stored. Coordinates are always whole-frame coordinates with (0, 0) in the
/// bottom left corner, so a band buffer treats rows outside of its range as out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
    pub row_start: u32,
    pub row_end: u32,
}

impl Extent {
    pub fn full(width: u32, height: u32) -> Extent {
        return Extent { width, height, row_start: 0, row_end: height };
    }

    /// Band of rows [rows.start, rows.end) of a width x height frame, clamped to the frame.
    pub fn band(width: u32, height: u32, rows: Range<u32>) -> Extent {
        let row_end = rows.end.min(height);
        let row_start = rows.start.min(row_end);
        return Extent { width, height, row_start, row_end };
    }

    pub fn row_count(&self) -> u32 {
        return self.row_end - self.row_start;
    }

    /// Number of stored pixels, failing instead of wrapping around on huge frames.
    pub fn pixel_count(&self) -> Result<usize, RenderError> {
        return (self.width as usize)
            .checked_mul(self.row_count() as usize)
            .ok_or(RenderError::Allocation { width: self.width, height: self.height });
    }

    /// Flat index of a pixel in the stored rows, None for anything outside of them.
    pub fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || x >= self.width as i64 {
            return None;
        }
        if y < self.row_start as i64 || y >= self.row_end as i64 {
            return None;
        }
        let row = (y - self.row_start as i64) as usize;
        return Some(row * self.width as usize + x as usize);
    }
}

/// Vec allocation that reports failure instead of aborting the process.
fn allocate<T: Clone>(len: usize, value: T, extent: Extent) -> Result<Vec<T>, RenderError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| RenderError::Allocation { width: extent.width, height: extent.height })?;
    data.resize(len, value);
    return Ok(data);
}

/// Copies the rows of `band` into `target`, both being flat row-major arrays with
/// `stride` elements per pixel.
fn copy_rows<T: Copy>(target: &mut [T], target_extent: Extent, band: &[T], band_extent: Extent, stride: usize) {
    let row_start = band_extent.row_start.max(target_extent.row_start);
    let row_end = band_extent.row_end.min(target_extent.row_end);
    let row_len = target_extent.width as usize * stride;
    for y in row_start..row_end {
        let from = (y - band_extent.row_start) as usize * row_len;
        let to = (y - target_extent.row_start) as usize * row_len;
        target[to..to + row_len].copy_from_slice(&band[from..from + row_len]);
    }
}

/// Owned rgb8 color buffer, row-major with the bottom row first.
pub struct FrameBuffer {
    extent: Extent,
    data: Vec<u8>,
}

impl FrameBuffer {
    /// Black buffer for the given extent.
    pub fn new(extent: Extent) -> Result<FrameBuffer, RenderError> {
        let len = extent
            .pixel_count()?
            .checked_mul(3)
            .ok_or(RenderError::Allocation { width: extent.width, height: extent.height })?;
        let data = allocate(len, 0u8, extent)?;
        return Ok(FrameBuffer { extent, data });
    }

    pub fn extent(&self) -> Extent {
        return self.extent;
    }

    /// Raw bytes, 3 per pixel, bottom row first.
    pub fn as_bytes(&self) -> &[u8] {
        return &self.data[..];
    }

    pub fn get(&self, x: i64, y: i64, channel: usize) -> Option<u8> {
        if channel >= 3 {
            return None;
        }
        let index = self.extent.index(x, y)?;
        return Some(self.data[3 * index + channel]);
    }

    /// Sets one channel of a pixel. Returns false and does nothing when out of bounds.
    pub fn set(&mut self, x: i64, y: i64, channel: usize, value: u8) -> bool {
        if channel >= 3 {
            return false;
        }
        match self.extent.index(x, y) {
            Some(index) => {
                self.data[3 * index + channel] = value;
                return true;
            }
            None => return false,
        }
    }

    pub fn pixel(&self, x: i64, y: i64) -> Option<Color> {
        let index = self.extent.index(x, y)?;
        return Some(Color::new(self.data[3 * index], self.data[3 * index + 1], self.data[3 * index + 2]));
    }

    /// Sets all channels of a pixel. Returns false and does nothing when out of bounds.
    pub fn set_pixel(&mut self, x: i64, y: i64, color: Color) -> bool {
        match self.extent.index(x, y) {
            Some(index) => {
                self.data[3 * index..3 * index + 3].copy_from_slice(&color.channels());
                return true;
            }
            None => return false,
        }
    }

    /// Sets all pixels to (0, 0, 0).
    pub fn clear(&mut self) {
        self.fill(BLACK);
    }

    pub fn fill(&mut self, color: Color) {
        for pixel in self.data.chunks_exact_mut(3) {
            pixel.copy_from_slice(&color.channels());
        }
    }

    /// Overwrites the rows covered by `band` with its contents.
    pub fn copy_band(&mut self, band: &FrameBuffer) {
        copy_rows(&mut self.data, self.extent, &band.data, band.extent, 3);
    }

    /// Number of pixels which are not black, handy for checking what got drawn.
    pub fn lit_pixel_count(&self) -> usize {
        return self.data.chunks_exact(3).filter(|pixel| pixel.iter().any(|&c| c != 0)).count();
    }
}

/// Owned z-buffer. Greater values are closer to the viewer.
pub struct DepthBuffer {
    extent: Extent,
    data: Vec<f32>,
}

impl DepthBuffer {
    /// Buffer filled with DEPTH_CLEAR for the given extent.
    pub fn new(extent: Extent) -> Result<DepthBuffer, RenderError> {
        let len = extent.pixel_count()?;
        let data = allocate(len, DEPTH_CLEAR, extent)?;
        return Ok(DepthBuffer { extent, data });
    }

    pub fn extent(&self) -> Extent {
        return self.extent;
    }

    pub fn as_slice(&self) -> &[f32] {
        return &self.data[..];
    }

    pub fn get(&self, x: i64, y: i64) -> Option<f32> {
        let index = self.extent.index(x, y)?;
        return Some(self.data[index]);
    }

    /// Depth test: stores z and returns true only if z is strictly closer than what is
    /// already there. Out of bounds coordinates never pass.
    pub fn test_and_set(&mut self, x: i64, y: i64, z: f32) -> bool {
        let index = match self.extent.index(x, y) {
            Some(index) => index,
            None => return false,
        };
        // NaN never compares greater, so it can't corrupt the buffer.
        if z > self.data[index] {
            self.data[index] = z;
            return true;
        }
        return false;
    }

    pub fn clear(&mut self) {
        self.data.fill(DEPTH_CLEAR);
    }

    pub fn copy_band(&mut self, band: &DepthBuffer) {
        copy_rows(&mut self.data, self.extent, &band.data, band.extent, 1);
    }

    /// Grey rgb8 picture of the buffer, same layout as FrameBuffer::as_bytes.
    /// Untouched cells are black, drawn ones are scaled between the closest (white) and
    /// farthest (dark grey) stored values.
    pub fn to_rgb(&self) -> Vec<u8> {
        let drawn = self.data.iter().copied().filter(|&z| z != DEPTH_CLEAR);
        let (z_min, z_max) = drawn.fold((f32::MAX, f32::MIN), |(lo, hi), z| (lo.min(z), hi.max(z)));
        let scale = z_max - z_min;

        let mut rgb = Vec::with_capacity(3 * self.data.len());
        for &z in &self.data {
            let value = if z == DEPTH_CLEAR {
                0
            } else if scale <= f32::EPSILON {
                255
            } else {
                (1.0 + 254.0 * (z - z_min) / scale) as u8
            };
            rgb.extend_from_slice(&[value, value, value]);
        }
        return rgb;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::WHITE;

    #[test]
    fn out_of_bounds_access_is_ignored() {
        let mut frame = FrameBuffer::new(Extent::full(4, 3)).unwrap();
        assert!(!frame.set_pixel(-1, 0, WHITE));
        assert!(!frame.set_pixel(4, 0, WHITE));
        assert!(!frame.set_pixel(0, 3, WHITE));
        assert!(!frame.set(0, 0, 3, 255));
        assert_eq!(frame.get(0, -1, 0), None);
        assert_eq!(frame.lit_pixel_count(), 0);
    }

    #[test]
    fn pixels_are_stored_bottom_row_first() {
        let mut frame = FrameBuffer::new(Extent::full(2, 2)).unwrap();
        assert!(frame.set_pixel(1, 0, Color::new(1, 2, 3)));
        assert_eq!(&frame.as_bytes()[3..6], &[1, 2, 3]);
        assert!(frame.set(0, 1, 2, 9));
        assert_eq!(frame.as_bytes()[8], 9);
        assert_eq!(frame.pixel(0, 1), Some(Color::new(0, 0, 9)));
    }

    #[test]
    fn depth_test_is_strictly_greater() {
        let mut depth = DepthBuffer::new(Extent::full(2, 2)).unwrap();
        assert_eq!(depth.get(1, 1), Some(DEPTH_CLEAR));
        assert!(depth.test_and_set(1, 1, 10.0));
        assert!(!depth.test_and_set(1, 1, 10.0));
        assert!(!depth.test_and_set(1, 1, 5.0));
        assert!(!depth.test_and_set(1, 1, f32::NAN));
        assert!(depth.test_and_set(1, 1, 20.0));
        assert_eq!(depth.get(1, 1), Some(20.0));
        assert!(!depth.test_and_set(2, 1, 100.0));
    }

    #[test]
    fn band_rejects_rows_it_does_not_own() {
        let extent = Extent::band(4, 10, 3..6);
        assert_eq!(extent.row_count(), 3);
        let mut frame = FrameBuffer::new(extent).unwrap();
        assert_eq!(frame.as_bytes().len(), 4 * 3 * 3);
        assert!(!frame.set_pixel(0, 2, WHITE));
        assert!(frame.set_pixel(0, 3, WHITE));
        assert!(frame.set_pixel(3, 5, WHITE));
        assert!(!frame.set_pixel(0, 6, WHITE));
    }

    #[test]
    fn band_is_clamped_to_frame() {
        let extent = Extent::band(4, 10, 8..20);
        assert_eq!((extent.row_start, extent.row_end), (8, 10));
        let extent = Extent::band(4, 10, 12..20);
        assert_eq!(extent.row_count(), 0);
    }

    #[test]
    fn copy_band_moves_rows_into_place() {
        let mut frame = FrameBuffer::new(Extent::full(3, 4)).unwrap();
        let mut band = FrameBuffer::new(Extent::band(3, 4, 2..4)).unwrap();
        band.set_pixel(1, 2, WHITE);
        band.set_pixel(2, 3, Color::new(7, 8, 9));
        frame.copy_band(&band);
        assert_eq!(frame.pixel(1, 2), Some(WHITE));
        assert_eq!(frame.pixel(2, 3), Some(Color::new(7, 8, 9)));
        assert_eq!(frame.lit_pixel_count(), 2);

        let mut depth = DepthBuffer::new(Extent::full(3, 4)).unwrap();
        let mut depth_band = DepthBuffer::new(Extent::band(3, 4, 1..2)).unwrap();
        depth_band.test_and_set(0, 1, 4.0);
        depth.copy_band(&depth_band);
        assert_eq!(depth.get(0, 1), Some(4.0));
        assert_eq!(depth.get(0, 0), Some(DEPTH_CLEAR));
    }

    #[test]
    fn oversized_frame_reports_allocation_error() {
        let result = FrameBuffer::new(Extent::full(u32::MAX, u32::MAX));
        assert!(matches!(result, Err(RenderError::Allocation { .. })));
    }

    #[test]
    fn depth_image_scales_drawn_values() {
        let mut depth = DepthBuffer::new(Extent::full(3, 1)).unwrap();
        depth.test_and_set(0, 0, 10.0);
        depth.test_and_set(1, 0, 20.0);
        let rgb = depth.to_rgb();
        assert_eq!(&rgb[0..3], &[1, 1, 1]);
        assert_eq!(&rgb[3..6], &[255, 255, 255]);
        assert_eq!(&rgb[6..9], &[0, 0, 0]);
    }
}
