/// 2D coordinate of a frame pixel.
/// i32 to allow coordinates outside of the frame and to remove a lot of casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Coord {
        return Coord { x, y };
    }
}

/// Struct, representing raw rgb8 pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const WHITE: Color = Color { r: 255, g: 255, b: 255, };
pub const BLACK: Color = Color { r: 0,   g: 0,   b: 0,   };

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Color {
        return Color { r, g, b };
    }

    /// Get convex combination of two colors: t * c_1 + (1 - t) * c_2.
    /// t is clamped to [0, 1], so negative light never wraps around.
    pub fn blend(color_1: Color, color_2: Color, t: f32) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        return Color {
            r: (t * color_1.r as f32 + (1.0 - t) * color_2.r as f32) as u8,
            g: (t * color_1.g as f32 + (1.0 - t) * color_2.g as f32) as u8,
            b: (t * color_1.b as f32 + (1.0 - t) * color_2.b as f32) as u8,
        };
    }

    /// Color scaled by a light intensity, the way every shaded fragment is written.
    pub fn shade(self, intensity: f32) -> Color {
        return Color::blend(self, BLACK, intensity);
    }

    pub fn channels(self) -> [u8; 3] {
        return [self.r, self.g, self.b];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_endpoints() {
        let red = Color::new(255, 0, 0);
        assert_eq!(Color::blend(red, BLACK, 1.0), red);
        assert_eq!(Color::blend(red, BLACK, 0.0), BLACK);
    }

    #[test]
    fn shade_clamps_out_of_range_intensity() {
        assert_eq!(WHITE.shade(-0.5), BLACK);
        assert_eq!(WHITE.shade(3.0), WHITE);
        assert_eq!(WHITE.shade(f32::NAN), BLACK);
        assert_eq!(WHITE.shade(0.5), Color::new(127, 127, 127));
    }
}
