use std::path::PathBuf;
use std::sync::Arc;
use std::time;

use clap::Parser;
use log::{debug, info, warn};
use nalgebra as na;
use na::{Matrix4, Point3, Vector3};

use crate::mesh::Mesh;
use crate::scene::transform::Camera;
use crate::scene::{Scene, Shading};
use crate::util::{Coord, WHITE};

/// Renders one frame of an OBJ model with a scanline rasterizer and a z-buffer.
#[derive(Parser, Debug, Clone)]
#[command(name = "tiny_raster", version)]
pub struct Params {
    /// Triangulated OBJ model to render.
    #[arg(short = 'p', long, default_value = "assets/african_head.obj")]
    pub input: PathBuf,
    /// Rendered frame, format picked from the extension.
    #[arg(short, long, default_value = "triangle.tga")]
    pub output: PathBuf,
    /// Picture of the z-buffer.
    #[arg(long, default_value = "zbuffer.tga")]
    pub depth_output: PathBuf,
    /// Don't write the z-buffer picture.
    #[arg(long)]
    pub no_depth: bool,
    #[arg(long, default_value_t = 800)]
    pub width: u32,
    #[arg(long, default_value_t = 800)]
    pub height: u32,
    /// Worker threads for shaded renders, 1 renders on the calling thread.
    /// Wireframes are always drawn on the calling thread.
    #[arg(short, long, default_value_t = 1)]
    pub threads: usize,
    /// Draw face edges instead of shaded faces.
    #[arg(long)]
    pub wireframe: bool,
    /// Camera position as x,y,z. The camera looks at the origin.
    #[arg(long, default_value = "1,1,3", value_parser = parse_vector, allow_hyphen_values = true)]
    pub eye: Vector3<f32>,
    /// Vertical field of view in degrees.
    #[arg(long, default_value_t = 45.0)]
    pub fov: f32,
    /// Direction towards the light as x,y,z.
    #[arg(long, default_value = "1,-1,1", value_parser = parse_vector, allow_hyphen_values = true)]
    pub light: Vector3<f32>,
    /// Skip the flat test triangle drawn over the model.
    #[arg(long)]
    pub no_overlay: bool,
}

/// Parses "x,y,z" into a vector.
fn parse_vector(s: &str) -> Result<Vector3<f32>, String> {
    let parts = s
        .split(',')
        .map(|part| part.trim().parse::<f32>().map_err(|e| format!("'{}': {}", part, e)))
        .collect::<Result<Vec<f32>, String>>()?;
    if parts.len() != 3 {
        return Err(format!("expected 3 comma separated numbers, got {}", parts.len()));
    }
    return Ok(Vector3::new(parts[0], parts[1], parts[2]));
}

/// Loads the model, renders a single frame and writes the output images.
/// Nothing is written if the model can't be loaded.
pub fn run(params: Params) -> Result<(), Box<dyn std::error::Error>> {
    let time_begin = time::Instant::now();
    let mut scene = Scene::new(params.width, params.height)?;
    let mesh = Mesh::load(&params.input)?;

    let camera = Camera {
        eye: Point3::from(params.eye),
        fov_y: params.fov.to_radians(),
        ..Default::default()
    };
    if params.eye.norm() <= f32::EPSILON {
        warn!("Camera sits at the origin it is looking at, picking an arbitrary direction");
    }
    let transform = camera.transform(Matrix4::identity(), params.width, params.height);
    debug!("Transform: {}", transform.matrix());

    if params.light.norm() <= f32::EPSILON {
        warn!("Light direction is zero, the model will be black");
    }
    let shading = Shading { light_direction: params.light, color: WHITE };

    if params.wireframe && params.threads > 1 {
        warn!("Wireframe is drawn on one thread, ignoring --threads {}", params.threads);
    }
    let stats = if params.wireframe {
        scene.render_wireframe(&mesh, &transform, WHITE)
    } else if params.threads > 1 {
        scene.render_mesh_parallel(Arc::new(mesh), transform, shading, params.threads)?
    } else {
        scene.render_mesh(&mesh, &transform, &shading)
    };
    info!(
        "Drew {} faces ({} skipped), {} pixels",
        stats.faces_drawn, stats.faces_skipped, stats.pixels_written
    );

    if !params.no_overlay {
        scene.fill_triangle(Coord::new(5, 5), Coord::new(50, 50), Coord::new(100, 5), WHITE);
    }

    scene.save(&params.output)?;
    if !params.no_depth {
        scene.save_depth(&params.depth_output)?;
    }

    info!("Frame done in {:.3}s", time_begin.elapsed().as_secs_f32());
    return Ok(());
}
