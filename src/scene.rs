pub mod buffer;
pub mod line;
pub mod transform;
pub mod triangle;

use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::sync::{mpsc, Arc};

use log::{debug, trace};
use nalgebra as na;
use na::{Point3, Vector3};
use threadpool::ThreadPool;

use crate::image::{write_rgb, ImageError, RowOrder};
use crate::mesh::Mesh;
use crate::util::{Color, Coord, WHITE};
use buffer::{DepthBuffer, Extent, FrameBuffer};
use transform::{lambert, ScreenVertex, Transform};

/// Error types for setting up and running a render pass.
#[derive(Debug)]
pub enum RenderError {
    InvalidDimensions { width: u32, height: u32 },
    /// Frame or z-buffer could not be allocated.
    Allocation { width: u32, height: u32 },
    /// A render worker went away without handing its band back.
    WorkerLost,
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InvalidDimensions { width, height } => {
                write!(f, "Invalid frame dimensions {}x{}", width, height)
            }
            RenderError::Allocation { width, height } => {
                write!(f, "Failed to allocate buffers for a {}x{} frame", width, height)
            }
            RenderError::WorkerLost => write!(f, "Render worker exited without a result"),
        }
    }
}

impl std::error::Error for RenderError {}

/// Frame constants used to light a mesh.
#[derive(Debug, Clone, Copy)]
pub struct Shading {
    pub light_direction: Vector3<f32>, // Points towards the light.
    pub color: Color,                  // Surface color at full intensity.
}

impl Default for Shading {
    fn default() -> Self {
        return Shading { light_direction: Vector3::new(1.0, -1.0, 1.0).normalize(), color: WHITE };
    }
}

/// What a render call did with the faces it got.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderStats {
    pub faces_drawn: usize,
    pub faces_skipped: usize, // Faces with a vertex that could not be projected.
    pub pixels_written: usize,
}

/// Scene, holding a frame buffer and its z-buffer.
/// (0, 0) is the bottom left coordinate.
pub struct Scene {
    frame: FrameBuffer,
    depth: DepthBuffer,
}

impl Scene {
    /// Black scene with an empty z-buffer.
    pub fn new(width: u32, height: u32) -> Result<Scene, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        return Scene::with_extent(Extent::full(width, height));
    }

    /// Scene covering only `rows` of a width x height frame.
    pub fn band(width: u32, height: u32, rows: Range<u32>) -> Result<Scene, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        return Scene::with_extent(Extent::band(width, height, rows));
    }

    fn with_extent(extent: Extent) -> Result<Scene, RenderError> {
        return Ok(Scene { frame: FrameBuffer::new(extent)?, depth: DepthBuffer::new(extent)? });
    }

    pub fn width(&self) -> u32 {
        return self.frame.extent().width;
    }

    pub fn height(&self) -> u32 {
        return self.frame.extent().height;
    }

    pub fn frame(&self) -> &FrameBuffer {
        return &self.frame;
    }

    pub fn depth(&self) -> &DepthBuffer {
        return &self.depth;
    }

    /// Sets all pixels to (0, 0, 0) and clears the z-buffer.
    pub fn clear(&mut self) {
        self.frame.clear();
        self.depth.clear();
    }

    /// Draws a line over anything, the z-buffer is neither checked nor updated.
    pub fn draw_line(&mut self, a: Coord, b: Coord, color: Color) -> usize {
        return line::draw(&mut self.frame, a, b, color);
    }

    /// Fills a triangle with one color, ignoring the z-buffer.
    pub fn fill_triangle(&mut self, a: Coord, b: Coord, c: Coord, color: Color) -> usize {
        return triangle::fill_flat(&mut self.frame, a, b, c, color);
    }

    /// Depth tested triangle in pixel space with per-vertex light intensities.
    pub fn draw_triangle(&mut self, vertices: [ScreenVertex; 3], intensities: [f32; 3], color: Color) -> usize {
        return triangle::fill_shaded(&mut self.frame, &mut self.depth, vertices, intensities, color);
    }

    /// Projects a model space triangle and draws it. Returns None, leaving both buffers
    /// untouched, when any vertex can't be perspective-divided.
    pub fn draw_model_triangle(
        &mut self,
        transform: &Transform,
        positions: [Point3<f32>; 3],
        intensities: [f32; 3],
        color: Color,
    ) -> Option<usize> {
        let vertices = project_all(transform, positions)?;
        return Some(self.draw_triangle(vertices, intensities, color));
    }

    /// Draws every face of the mesh with Gouraud shaded Lambert lighting.
    pub fn render_mesh(&mut self, mesh: &Mesh, transform: &Transform, shading: &Shading) -> RenderStats {
        let mut stats = RenderStats::default();
        for (face, vertices) in mesh.faces().enumerate() {
            let intensities = vertices.map(|v| lambert(v.normal, shading.light_direction));
            match self.draw_model_triangle(transform, vertices.map(|v| v.position), intensities, shading.color) {
                Some(pixels) => {
                    stats.faces_drawn += 1;
                    stats.pixels_written += pixels;
                }
                None => {
                    trace!("Skipping face {}: vertex on or behind the eye plane", face);
                    stats.faces_skipped += 1;
                }
            }
        }
        return stats;
    }

    /// Draws the edges of every face with the line rasterizer, without depth testing.
    pub fn render_wireframe(&mut self, mesh: &Mesh, transform: &Transform, color: Color) -> RenderStats {
        let mut stats = RenderStats::default();
        for vertices in mesh.faces() {
            let coords = match project_all(transform, vertices.map(|v| v.position)) {
                Some(projected) => projected.map(|v| v.to_coord()),
                None => {
                    stats.faces_skipped += 1;
                    continue;
                }
            };
            stats.faces_drawn += 1;
            for i in 0..3 {
                stats.pixels_written += self.draw_line(coords[i], coords[(i + 1) % 3], color);
            }
        }
        return stats;
    }

    /// Same as render_mesh, but splits the frame into horizontal bands rendered on a pool
    /// of `threads` workers. Each worker owns its band, so no pixel is shared between them
    /// and the result matches the sequential render exactly.
    pub fn render_mesh_parallel(
        &mut self,
        mesh: Arc<Mesh>,
        transform: Transform,
        shading: Shading,
        threads: usize,
    ) -> Result<RenderStats, RenderError> {
        let height = self.height();
        let band_count = threads.clamp(1, height as usize) as u32;
        if band_count == 1 {
            return Ok(self.render_mesh(&mesh, &transform, &shading));
        }
        let band_height = (height + band_count - 1) / band_count;

        let pool = ThreadPool::new(band_count as usize);
        let (tx, rx) = mpsc::channel();
        for i in 0..band_count {
            let rows = i * band_height..((i + 1) * band_height).min(height);
            // Band starts out as a copy of what is already drawn in its rows.
            let mut band = Scene::band(self.width(), height, rows)?;
            band.copy_band(self);
            let mesh = Arc::clone(&mesh);
            let tx = tx.clone();
            pool.execute(move || {
                let stats = band.render_mesh(&mesh, &transform, &shading);
                // Receiver only goes away if the render pass already failed.
                let _ = tx.send((band, stats));
            });
        }
        drop(tx);

        let mut stats = RenderStats::default();
        for _ in 0..band_count {
            let (band, band_stats) = rx.recv().map_err(|_| RenderError::WorkerLost)?;
            let extent = band.frame.extent();
            debug!("Band {}..{} done, {} pixels", extent.row_start, extent.row_end, band_stats.pixels_written);
            self.copy_band(&band);
            // Every band sees every face.
            stats.faces_drawn = band_stats.faces_drawn;
            stats.faces_skipped = band_stats.faces_skipped;
            stats.pixels_written += band_stats.pixels_written;
        }
        return Ok(stats);
    }

    /// Overwrites the rows both scenes share with the contents of `other`.
    pub fn copy_band(&mut self, other: &Scene) {
        self.frame.copy_band(&other.frame);
        self.depth.copy_band(&other.depth);
    }

    /// Writes the rendered frame, top row first as image files expect.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageError> {
        return write_rgb(path, self.width(), self.height(), self.frame.as_bytes(), RowOrder::BottomFirst);
    }

    /// Writes a grey picture of the z-buffer, nearer being brighter.
    pub fn save_depth<P: AsRef<Path>>(&self, path: P) -> Result<(), ImageError> {
        return write_rgb(path, self.width(), self.height(), &self.depth.to_rgb(), RowOrder::BottomFirst);
    }
}

fn project_all(transform: &Transform, positions: [Point3<f32>; 3]) -> Option<[ScreenVertex; 3]> {
    return Some([
        transform.project(positions[0])?,
        transform.project(positions[1])?,
        transform.project(positions[2])?,
    ]);
}
