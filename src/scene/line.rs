use super::buffer::FrameBuffer;
use crate::util::{Color, Coord};

/// Walks the pixels of a line between a and b (both inclusive) via Bresenham's algorithm
/// as presented in https://en.wikipedia.org/wiki/Bresenham%27s_line_algorithm
/// and hands every visited pixel to `plot`.
///
/// Pure integer error accumulation, done in i64 so that even extreme i32 endpoints can't
/// overflow. Consecutive pixels are always 8-connected.
pub fn walk<F: FnMut(i64, i64)>(a: Coord, b: Coord, mut plot: F) {
    let mut x_0 = a.x as i64;
    let mut y_0 = a.y as i64;
    let x_1 = b.x as i64;
    let y_1 = b.y as i64;
    let dx: i64 = (x_1 - x_0).abs();
    let sx: i64 = if x_0 < x_1 { 1 } else { -1 };
    let dy: i64 = -(y_1 - y_0).abs();
    let sy: i64 = if y_0 < y_1 { 1 } else { -1 };
    let mut error: i64 = dx + dy;

    loop {
        plot(x_0, y_0);
        if x_0 == x_1 && y_0 == y_1 {
            break;
        }
        let e2 = 2 * error;
        if e2 >= dy {
            if x_0 == x_1 {
                break;
            }
            error += dy;
            x_0 += sx;
        }
        if e2 <= dx {
            if y_0 == y_1 {
                break;
            }
            error += dx;
            y_0 += sy;
        }
    }
}

/// Draws a line between a and b over anything already in the frame.
/// Pixels outside of the frame are skipped. Returns the number of pixels written.
pub fn draw(frame: &mut FrameBuffer, a: Coord, b: Coord, color: Color) -> usize {
    let extent = frame.extent();
    let (width, row_start, row_end) = (extent.width as i32, extent.row_start as i32, extent.row_end as i32);
    // Both ends past the same edge means no pixel of the line can be inside.
    if (a.x < 0 && b.x < 0)
        || (a.x >= width && b.x >= width)
        || (a.y < row_start && b.y < row_start)
        || (a.y >= row_end && b.y >= row_end)
    {
        return 0;
    }

    // Only lines leaving the frame get clipped, the rest keep their exact Bresenham path.
    let inside = |c: Coord| c.x >= 0 && c.x < width && c.y >= 0 && (c.y as i64) < extent.height as i64;
    let (a, b) = if inside(a) && inside(b) {
        (a, b)
    } else {
        // Clipped against the whole frame, not the band, so every band walks the same pixels.
        match clip(a, b, extent.width as f64, extent.height as f64) {
            Some(segment) => segment,
            None => return 0,
        }
    };

    let mut written = 0;
    walk(a, b, |x, y| {
        if frame.set_pixel(x, y, color) {
            written += 1;
        }
    });
    return written;
}

/// Part of the segment a-b inside [-1, width] x [-1, height] via Liang-Barsky, endpoints
/// rounded back to pixels. The one pixel margin keeps the clipped path from ending short of
/// the frame edge. None when the segment misses the rectangle.
fn clip(a: Coord, b: Coord, width: f64, height: f64) -> Option<(Coord, Coord)> {
    let (x_0, y_0) = (a.x as f64, a.y as f64);
    let (dx, dy) = (b.x as f64 - x_0, b.y as f64 - y_0);
    let mut t_0: f64 = 0.0;
    let mut t_1: f64 = 1.0;
    let edges = [
        (-dx, x_0 + 1.0),
        (dx, width - x_0),
        (-dy, y_0 + 1.0),
        (dy, height - y_0),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t_0 = t_0.max(r);
        } else {
            t_1 = t_1.min(r);
        }
    }
    if t_0 > t_1 {
        return None;
    }
    let at = |t: f64| Coord::new((x_0 + t * dx).round() as i32, (y_0 + t * dy).round() as i32);
    return Some((at(t_0), at(t_1)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::buffer::Extent;
    use crate::util::WHITE;

    fn collect(a: Coord, b: Coord) -> Vec<(i64, i64)> {
        let mut points = Vec::new();
        walk(a, b, |x, y| points.push((x, y)));
        return points;
    }

    #[test]
    fn path_is_connected_from_start_to_end() {
        let coords = [-7, -3, -1, 0, 1, 2, 5, 13];
        for &ax in &coords {
            for &ay in &coords {
                for &bx in &coords {
                    for &by in &coords {
                        let (a, b) = (Coord::new(ax, ay), Coord::new(bx, by));
                        let points = collect(a, b);
                        assert_eq!(points[0], (ax as i64, ay as i64));
                        assert_eq!(*points.last().unwrap(), (bx as i64, by as i64));
                        let expected_len = (bx - ax).abs().max((by - ay).abs()) as usize + 1;
                        assert_eq!(points.len(), expected_len, "{:?} -> {:?}", a, b);
                        for pair in points.windows(2) {
                            let step_x = (pair[1].0 - pair[0].0).abs();
                            let step_y = (pair[1].1 - pair[0].1).abs();
                            assert!(step_x <= 1 && step_y <= 1 && step_x + step_y > 0);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn coincident_endpoints_visit_one_pixel() {
        assert_eq!(collect(Coord::new(4, 9), Coord::new(4, 9)), vec![(4, 9)]);
    }

    #[test]
    fn horizontal_and_vertical_lines() {
        assert_eq!(collect(Coord::new(0, 2), Coord::new(3, 2)), vec![(0, 2), (1, 2), (2, 2), (3, 2)]);
        assert_eq!(collect(Coord::new(1, 3), Coord::new(1, 0)), vec![(1, 3), (1, 2), (1, 1), (1, 0)]);
    }

    #[test]
    fn diagonal_lights_301_pixels() {
        let mut frame = FrameBuffer::new(Extent::full(512, 512)).unwrap();
        let written = draw(&mut frame, Coord::new(100, 100), Coord::new(400, 400), WHITE);
        assert_eq!(written, 301);
        assert_eq!(frame.lit_pixel_count(), 301);
        for i in 100..=400 {
            assert_eq!(frame.pixel(i, i), Some(WHITE));
        }
    }

    #[test]
    fn partially_visible_line_is_clipped() {
        let mut frame = FrameBuffer::new(Extent::full(10, 10)).unwrap();
        let written = draw(&mut frame, Coord::new(-5, 5), Coord::new(14, 5), WHITE);
        assert_eq!(written, 10);
    }

    #[test]
    fn line_fully_outside_writes_nothing() {
        let mut frame = FrameBuffer::new(Extent::full(10, 10)).unwrap();
        assert_eq!(draw(&mut frame, Coord::new(i32::MIN, -1), Coord::new(i32::MAX, -3), WHITE), 0);
        assert_eq!(draw(&mut frame, Coord::new(20, 0), Coord::new(30, 9), WHITE), 0);
        assert_eq!(frame.lit_pixel_count(), 0);
    }

    #[test]
    fn far_endpoints_are_clipped_before_walking() {
        let mut frame = FrameBuffer::new(Extent::full(800, 800)).unwrap();
        let written = draw(&mut frame, Coord::new(400, 400), Coord::new(i32::MAX, 400), WHITE);
        assert_eq!(written, 400);
        for x in 400..800 {
            assert_eq!(frame.pixel(x, 400), Some(WHITE));
        }

        let mut frame = FrameBuffer::new(Extent::full(800, 800)).unwrap();
        assert_eq!(draw(&mut frame, Coord::new(0, 0), Coord::new(i32::MAX, i32::MAX), WHITE), 800);
        assert_eq!(frame.pixel(799, 799), Some(WHITE));

        let mut frame = FrameBuffer::new(Extent::full(800, 800)).unwrap();
        let written = draw(&mut frame, Coord::new(i32::MIN, -5), Coord::new(i32::MAX, 805), WHITE);
        assert!(written >= 800);
        assert_eq!(frame.lit_pixel_count(), written);
    }

    #[test]
    fn clipped_band_matches_full_frame() {
        let (a, b) = (Coord::new(-300, 20), Coord::new(1_000_000, 61));
        let mut full = FrameBuffer::new(Extent::full(90, 80)).unwrap();
        draw(&mut full, a, b, WHITE);
        let mut band = FrameBuffer::new(Extent::band(90, 80, 30..50)).unwrap();
        draw(&mut band, a, b, WHITE);
        for y in 30..50 {
            for x in 0..90 {
                assert_eq!(band.pixel(x, y), full.pixel(x, y), "({}, {})", x, y);
            }
        }
    }

    #[test]
    fn extreme_endpoints_do_not_overflow() {
        let points = collect(Coord::new(i32::MAX, i32::MIN), Coord::new(i32::MAX, i32::MIN));
        assert_eq!(points.len(), 1);
    }
}
