use super::buffer::{DepthBuffer, Extent, FrameBuffer};
use super::transform::ScreenVertex;
use crate::util::{Color, Coord};

/// Triangles reaching further than this many pixels from the origin are skipped: f32 has
/// no sub-pixel precision left out there and row arithmetic could overflow.
pub const MAX_COORD: f32 = (1 << 24) as f32;

/// Triangle corner snapped to a pixel row, carrying the attributes interpolated along edges.
#[derive(Debug, Clone, Copy)]
struct Corner {
    x: f32,
    y: i64,
    z: f32,
    intensity: f32,
}

/// Attributes at one end of a scanline span.
#[derive(Debug, Clone, Copy)]
struct Sample {
    x: f32,
    z: f32,
    intensity: f32,
}

impl Corner {
    fn sample(&self) -> Sample {
        return Sample { x: self.x, z: self.z, intensity: self.intensity };
    }
}

/// offset / span, with an empty span collapsing onto its first sample instead of dividing by zero.
fn ratio(offset: i64, span: i64) -> f32 {
    if span == 0 {
        return 0.0;
    }
    return offset as f32 / span as f32;
}

fn lerp(a: Corner, b: Corner, t: f32) -> Sample {
    return Sample {
        x: a.x + (b.x - a.x) * t,
        z: a.z + (b.z - a.z) * t,
        intensity: a.intensity + (b.intensity - a.intensity) * t,
    };
}

fn in_range(v: f32) -> bool {
    return v.is_finite() && v.abs() <= MAX_COORD;
}

/// Scanline sweep shared by both fills. Sorts corners by row, splits the triangle at the
/// middle corner and hands every row of the triangle inside `extent` to `row` with the left
/// and right span ends (left.x <= right.x).
fn sweep<F: FnMut(i64, Sample, Sample)>(mut corners: [Corner; 3], extent: Extent, mut row: F) {
    corners.sort_by_key(|corner| corner.y);
    let [c0, c1, c2] = corners;
    let row_start = extent.row_start as i64;
    let row_end = extent.row_end as i64;

    let total_height = c2.y - c0.y;
    if total_height == 0 {
        // Everything on one row, spanning from the leftmost to the rightmost corner.
        if c0.y < row_start || c0.y >= row_end {
            return;
        }
        let mut left = c0;
        let mut right = c0;
        for corner in [c1, c2] {
            if corner.x < left.x {
                left = corner;
            }
            if corner.x > right.x {
                right = corner;
            }
        }
        row(c0.y, left.sample(), right.sample());
        return;
    }

    for y in c0.y.max(row_start)..=c2.y.min(row_end - 1) {
        // The long edge c0 -> c2 bounds one side of every row.
        let mut a = lerp(c0, c2, ratio(y - c0.y, total_height));
        let second_half = y > c1.y || c1.y == c0.y;
        let mut b = if second_half {
            lerp(c1, c2, ratio(y - c1.y, c2.y - c1.y))
        } else {
            lerp(c0, c1, ratio(y - c0.y, c1.y - c0.y))
        };
        if a.x > b.x {
            std::mem::swap(&mut a, &mut b);
        }
        row(y, a, b);
    }
}

/// Columns of a span clamped to the frame, as the rounded span ends and the visible range.
fn span_columns(left: Sample, right: Sample, extent: Extent) -> (i64, i64, i64, i64) {
    let x_left = left.x.round() as i64;
    let x_right = right.x.round() as i64;
    let from = x_left.max(0);
    let to = x_right.min(extent.width as i64 - 1);
    return (x_left, x_right, from, to);
}

/// Fills a triangle with a uniform color via scanline sweep, ignoring the z-buffer.
/// Returns the number of pixels written. A triangle with any corner further than
/// MAX_COORD from the origin is skipped whole, even if part of it is inside the frame.
pub fn fill_flat(frame: &mut FrameBuffer, a: Coord, b: Coord, c: Coord, color: Color) -> usize {
    if ![a, b, c].iter().all(|v| in_range(v.x as f32) && in_range(v.y as f32)) {
        return 0;
    }
    let corners = [a, b, c].map(|v| Corner { x: v.x as f32, y: v.y as i64, z: 0.0, intensity: 0.0 });
    let extent = frame.extent();
    let mut written = 0;
    sweep(corners, extent, |y, left, right| {
        let (_, _, from, to) = span_columns(left, right, extent);
        for x in from..=to {
            if frame.set_pixel(x, y, color) {
                written += 1;
            }
        }
    });
    return written;
}

/// Fills a triangle interpolating depth and light intensity across it. A pixel is written,
/// as `color` scaled by the intensity, only if it is strictly closer than what the z-buffer
/// holds. Returns the number of pixels that passed the depth test.
pub fn fill_shaded(
    frame: &mut FrameBuffer,
    depth: &mut DepthBuffer,
    vertices: [ScreenVertex; 3],
    intensities: [f32; 3],
    color: Color,
) -> usize {
    if !vertices.iter().all(|v| in_range(v.x) && in_range(v.y) && v.z.is_finite()) {
        return 0;
    }
    let mut corners = [Corner { x: 0.0, y: 0, z: 0.0, intensity: 0.0 }; 3];
    for i in 0..3 {
        corners[i] = Corner {
            x: vertices[i].x.round(),
            y: vertices[i].y.round() as i64,
            z: vertices[i].z,
            intensity: if intensities[i].is_nan() { 0.0 } else { intensities[i].clamp(0.0, 1.0) },
        };
    }

    let extent = frame.extent();
    let mut written = 0;
    sweep(corners, extent, |y, left, right| {
        let (x_left, x_right, from, to) = span_columns(left, right, extent);
        for x in from..=to {
            let phi = ratio(x - x_left, x_right - x_left);
            let z = left.z + (right.z - left.z) * phi;
            if !depth.test_and_set(x, y, z) {
                continue;
            }
            let intensity = left.intensity + (right.intensity - left.intensity) * phi;
            frame.set_pixel(x, y, color.shade(intensity));
            written += 1;
        }
    });
    return written;
}
