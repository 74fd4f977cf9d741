use nalgebra as na;
use na::{matrix, Matrix4, Point3, Vector3};

use crate::util::Coord;

/// Homogeneous w at or below this value means the vertex sits on (or behind) the eye plane
/// and can't be perspective-divided.
pub const W_EPSILON: f32 = 1e-6;

/// z-buffer resolution: clip space z is mapped into [0, DEPTH_RANGE], nearest being greatest.
pub const DEPTH_RANGE: f32 = 255.0;

/// Vertex after all transformations - x, y give the pixel position and z gives the value
/// used for comparison with the z-buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl ScreenVertex {
    pub fn new(x: f32, y: f32, z: f32) -> ScreenVertex {
        return ScreenVertex { x, y, z };
    }

    pub fn is_finite(&self) -> bool {
        return self.x.is_finite() && self.y.is_finite() && self.z.is_finite();
    }

    /// Nearest pixel. Float to int casts saturate, so huge values stay huge instead of wrapping.
    pub fn to_coord(&self) -> Coord {
        return Coord { x: self.x.round() as i32, y: self.y.round() as i32 };
    }
}

/// View matrix for a camera placed at `eye` looking at `target`.
/// Builds a right handed basis around the camera and moves the eye into the origin.
pub fn look_at(eye: Point3<f32>, target: Point3<f32>, up: Vector3<f32>) -> Matrix4<f32> {
    // New coordinate system x, y, z around camera position, z pointing back at the viewer.
    let new_z = (eye - target).try_normalize(f32::EPSILON).unwrap_or(Vector3::z());
    let new_y = match (up - new_z.dot(&up) * new_z).try_normalize(f32::EPSILON) {
        Some(new_y) => new_y,
        None => {
            // Up is parallel to the view direction, any perpendicular axis will do.
            let helper = if new_z.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
            (helper - new_z.dot(&helper) * new_z).normalize()
        }
    };
    let new_x = new_y.cross(&new_z).normalize();
    let basis = matrix![new_x.x, new_x.y, new_x.z, 0.0;
                        new_y.x, new_y.y, new_y.z, 0.0;
                        new_z.x, new_z.y, new_z.z, 0.0;
                        0.0,     0.0,     0.0,     1.0];
    let translation = matrix![1.0, 0.0, 0.0, -eye.x;
                              0.0, 1.0, 0.0, -eye.y;
                              0.0, 0.0, 1.0, -eye.z;
                              0.0, 0.0, 0.0, 1.0];
    return basis * translation;
}

/// OpenGL style perspective projection, w ends up being the distance in front of the eye.
/// `fov_y` is in radians.
pub fn perspective(aspect: f32, fov_y: f32, near: f32, far: f32) -> Matrix4<f32> {
    let f = 1.0 / (fov_y / 2.0).tan();
    let depth = near - far;
    return matrix![f / aspect, 0.0, 0.0,                  0.0;
                   0.0,        f,   0.0,                  0.0;
                   0.0,        0.0, (far + near) / depth, 2.0 * far * near / depth;
                   0.0,        0.0, -1.0,                 0.0];
}

/// Maps clip space [-1, 1] x [-1, 1] onto the pixel rectangle [x, x + w] x [y, y + h] and
/// clip space z onto [0, depth] with the near plane getting the greatest value.
pub fn viewport(x: f32, y: f32, w: f32, h: f32, depth: f32) -> Matrix4<f32> {
    return matrix![w / 2.0, 0.0,     0.0,          x + w / 2.0;
                   0.0,     h / 2.0, 0.0,          y + h / 2.0;
                   0.0,     0.0,     -depth / 2.0, depth / 2.0;
                   0.0,     0.0,     0.0,          1.0];
}

/// Lambertian intensity of a surface with the given normal lit from `light_dir`
/// (pointing towards the light). Always in [0, 1], faces turned away get 0.
pub fn lambert(normal: Vector3<f32>, light_dir: Vector3<f32>) -> f32 {
    let normal = match normal.try_normalize(f32::EPSILON) {
        Some(normal) => normal,
        None => return 0.0,
    };
    let light_dir = match light_dir.try_normalize(f32::EPSILON) {
        Some(light_dir) => light_dir,
        None => return 0.0,
    };
    return normal.dot(&light_dir).clamp(0.0, 1.0);
}

/// Camera setup for a frame.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub fov_y: f32,  // Radians.
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        return Camera {
            eye: Point3::new(1.0, 1.0, 3.0),
            target: Point3::origin(),
            up: Vector3::y(),
            fov_y: 45f32.to_radians(),
            near: 0.1,
            far: 100.0,
        };
    }
}

impl Camera {
    /// Transform of a model into a width x height frame. The model is placed into the
    /// central 3/4 of the frame.
    pub fn transform(&self, model: Matrix4<f32>, width: u32, height: u32) -> Transform {
        let (w, h) = (width as f32, height as f32);
        let aspect = if h > 0.0 { w / h } else { 1.0 };
        return Transform::new(
            model,
            look_at(self.eye, self.target, self.up),
            perspective(aspect, self.fov_y, self.near, self.far),
            viewport(w / 8.0, h / 8.0, w * 3.0 / 4.0, h * 3.0 / 4.0, DEPTH_RANGE),
        );
    }
}

/// Combined viewport * projection * view * model matrix, applied to every vertex of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix4<f32>,
}

impl Transform {
    pub fn new(model: Matrix4<f32>, view: Matrix4<f32>, projection: Matrix4<f32>, viewport: Matrix4<f32>) -> Transform {
        return Transform { matrix: viewport * projection * view * model };
    }

    pub fn from_matrix(matrix: Matrix4<f32>) -> Transform {
        return Transform { matrix };
    }

    pub fn matrix(&self) -> &Matrix4<f32> {
        return &self.matrix;
    }

    /// Model space point to pixel space via the perspective divide.
    /// None when w is zero, near zero or negative, or when the result isn't finite.
    pub fn project(&self, point: Point3<f32>) -> Option<ScreenVertex> {
        let h = self.matrix * point.to_homogeneous();
        if !(h.w > W_EPSILON) {
            return None;
        }
        let vertex = ScreenVertex { x: h.x / h.w, y: h.y / h.w, z: h.z / h.w };
        if !vertex.is_finite() {
            return None;
        }
        return Some(vertex);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn assert_matrix_eq(a: &Matrix4<f32>, b: &Matrix4<f32>) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < EPS, "\n{}\n!=\n{}", a, b);
        }
    }

    #[test]
    fn look_at_matches_nalgebra() {
        let eye = Point3::new(1.0, 1.0, 3.0);
        let target = Point3::origin();
        let up = Vector3::y();
        assert_matrix_eq(&look_at(eye, target, up), &Matrix4::look_at_rh(&eye, &target, &up));
    }

    #[test]
    fn look_at_survives_parallel_up() {
        let m = look_at(Point3::new(0.0, 5.0, 0.0), Point3::origin(), Vector3::y());
        assert!(m.iter().all(|v| v.is_finite()));
        // Eye still lands in the origin.
        let eye = m * Point3::new(0.0, 5.0, 0.0).to_homogeneous();
        assert!(eye.xyz().norm() < EPS);
    }

    #[test]
    fn perspective_matches_nalgebra() {
        let ours = perspective(1.5, 0.8, 0.1, 50.0);
        assert_matrix_eq(&ours, &Matrix4::new_perspective(1.5, 0.8, 0.1, 50.0));
    }

    #[test]
    fn viewport_maps_clip_cube_onto_rectangle() {
        let t = Transform::from_matrix(viewport(100.0, 100.0, 600.0, 600.0, DEPTH_RANGE));
        let low = t.project(Point3::new(-1.0, -1.0, 1.0)).unwrap();
        let high = t.project(Point3::new(1.0, 1.0, -1.0)).unwrap();
        assert!((low.x - 100.0).abs() < EPS && (low.y - 100.0).abs() < EPS && low.z.abs() < EPS);
        assert!((high.x - 700.0).abs() < EPS && (high.y - 700.0).abs() < EPS);
        assert!((high.z - DEPTH_RANGE).abs() < EPS);
    }

    #[test]
    fn nearer_points_get_greater_depth() {
        let camera = Camera { eye: Point3::new(0.0, 0.0, 5.0), ..Default::default() };
        let t = camera.transform(Matrix4::identity(), 800, 800);
        let near = t.project(Point3::new(0.0, 0.0, 1.0)).unwrap();
        let far = t.project(Point3::new(0.0, 0.0, -1.0)).unwrap();
        assert!(near.z > far.z);
        assert!(near.z <= DEPTH_RANGE && far.z >= 0.0);
        // Center of the view lands in the center of the frame.
        assert!((near.x - 400.0).abs() < EPS && (near.y - 400.0).abs() < EPS);
    }

    #[test]
    fn zero_or_negative_w_is_rejected() {
        let camera = Camera { eye: Point3::new(0.0, 0.0, 5.0), ..Default::default() };
        let t = camera.transform(Matrix4::identity(), 800, 800);
        // On the eye plane and behind the eye.
        assert_eq!(t.project(Point3::new(1.0, 0.0, 5.0)), None);
        assert_eq!(t.project(Point3::new(0.0, 0.0, 9.0)), None);
        assert!(t.project(Point3::new(0.0, 0.0, 0.0)).is_some());
    }

    #[test]
    fn lambert_is_clamped() {
        let light = Vector3::new(0.0, 0.0, 2.0);
        assert!((lambert(Vector3::z(), light) - 1.0).abs() < EPS);
        assert_eq!(lambert(-Vector3::z(), light), 0.0);
        assert!((lambert(Vector3::new(1.0, 0.0, 1.0), light) - 0.5f32.sqrt()).abs() < EPS);
        assert_eq!(lambert(Vector3::zeros(), light), 0.0);
        assert_eq!(lambert(Vector3::z(), Vector3::zeros()), 0.0);
    }

    #[test]
    fn screen_vertex_rounds_to_nearest_pixel() {
        assert_eq!(ScreenVertex::new(1.4, 2.6, 0.0).to_coord(), Coord::new(1, 3));
        assert_eq!(ScreenVertex::new(1e20, -1e20, 0.0).to_coord(), Coord::new(i32::MAX, i32::MIN));
    }
}
