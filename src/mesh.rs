use std::fmt;
use std::fs;
use std::path::Path;

use log::{debug, info};
use nalgebra as na;
use na::{Point3, Vector2, Vector3};
use obj::{load_obj, Obj, Position, TexturedVertex};

/// Floats per vertex in the interleaved buffer: position (3), normal (3), uv (2).
pub const VERTEX_STRIDE: usize = 8;

/// Error types for mesh loading.
#[derive(Debug)]
pub enum MeshError {
    Io(std::io::Error),
    Parse(obj::ObjError),
    /// Source has no vertices or no faces.
    Empty,
    /// Index buffer length isn't a multiple of 3.
    IndexCount(usize),
    /// Vertex buffer length isn't a multiple of VERTEX_STRIDE.
    VertexStride(usize),
    IndexOutOfRange { index: u16, vertex_count: usize },
}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshError::Io(e) => write!(f, "I/O error: {}", e),
            MeshError::Parse(e) => write!(f, "Parse error: {}", e),
            MeshError::Empty => write!(f, "Mesh has no faces"),
            MeshError::IndexCount(len) => write!(f, "Index count {} is not a multiple of 3", len),
            MeshError::VertexStride(len) => {
                write!(f, "Vertex data length {} is not a multiple of {}", len, VERTEX_STRIDE)
            }
            MeshError::IndexOutOfRange { index, vertex_count } => {
                write!(f, "Index {} out of range for {} vertices", index, vertex_count)
            }
        }
    }
}

impl std::error::Error for MeshError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MeshError::Io(e) => Some(e),
            MeshError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MeshError {
    fn from(e: std::io::Error) -> Self {
        MeshError::Io(e)
    }
}

impl From<obj::ObjError> for MeshError {
    fn from(e: obj::ObjError) -> Self {
        MeshError::Parse(e)
    }
}

/// One vertex of a mesh, unpacked from the interleaved buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub uv: Vector2<f32>,
}

/// Immutable indexed triangle mesh: interleaved vertex floats plus u16 indices, 3 per face.
/// Every index is known to be in range once a Mesh exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertex_data: Vec<f32>,
    index_data: Vec<u16>,
}

impl Mesh {
    /// Loads a triangulated OBJ file in one go.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Mesh, MeshError> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let mesh = Mesh::parse(&bytes)?;
        info!(
            "Loaded {}: {} vertices, {} faces",
            path.display(),
            mesh.vertex_count(),
            mesh.face_count()
        );
        return Ok(mesh);
    }

    /// Parses OBJ source. Texture coordinates are kept when every face has them, otherwise
    /// they are zero. Sources without normals get smooth ones, averaged over adjacent faces.
    pub fn parse(bytes: &[u8]) -> Result<Mesh, MeshError> {
        if let Ok(model) = load_obj::<TexturedVertex, _, u16>(bytes) {
            let mut vertex_data = Vec::with_capacity(model.vertices.len() * VERTEX_STRIDE);
            for v in &model.vertices {
                vertex_data.extend_from_slice(&v.position);
                vertex_data.extend_from_slice(&v.normal);
                vertex_data.extend_from_slice(&v.texture[..2]);
            }
            return Mesh::from_raw(vertex_data, model.indices);
        }
        if let Ok(model) = load_obj::<obj::Vertex, _, u16>(bytes) {
            debug!("No texture coordinates, using zero uvs");
            let mut vertex_data = Vec::with_capacity(model.vertices.len() * VERTEX_STRIDE);
            for v in &model.vertices {
                vertex_data.extend_from_slice(&v.position);
                vertex_data.extend_from_slice(&v.normal);
                vertex_data.extend_from_slice(&[0.0, 0.0]);
            }
            return Mesh::from_raw(vertex_data, model.indices);
        }
        debug!("No normals, generating smooth ones");
        let model: Obj<Position, u16> = load_obj(bytes)?;
        let positions: Vec<Point3<f32>> = model.vertices.iter().map(|v| Point3::from(v.position)).collect();
        let normals = smooth_normals(&positions, &model.indices);
        let mut vertex_data = Vec::with_capacity(positions.len() * VERTEX_STRIDE);
        for (position, normal) in positions.iter().zip(&normals) {
            vertex_data.extend_from_slice(&[position.x, position.y, position.z]);
            vertex_data.extend_from_slice(&[normal.x, normal.y, normal.z]);
            vertex_data.extend_from_slice(&[0.0, 0.0]);
        }
        return Mesh::from_raw(vertex_data, model.indices);
    }

    /// Builds a mesh from already flattened buffers, checking all invariants.
    pub fn from_raw(vertex_data: Vec<f32>, index_data: Vec<u16>) -> Result<Mesh, MeshError> {
        if vertex_data.len() % VERTEX_STRIDE != 0 {
            return Err(MeshError::VertexStride(vertex_data.len()));
        }
        if index_data.len() % 3 != 0 {
            return Err(MeshError::IndexCount(index_data.len()));
        }
        if vertex_data.is_empty() || index_data.is_empty() {
            return Err(MeshError::Empty);
        }
        let vertex_count = vertex_data.len() / VERTEX_STRIDE;
        if let Some(&index) = index_data.iter().find(|&&index| index as usize >= vertex_count) {
            return Err(MeshError::IndexOutOfRange { index, vertex_count });
        }
        return Ok(Mesh { vertex_data, index_data });
    }

    pub fn vertex_data(&self) -> &[f32] {
        return &self.vertex_data[..];
    }

    pub fn index_data(&self) -> &[u16] {
        return &self.index_data[..];
    }

    pub fn vertex_count(&self) -> usize {
        return self.vertex_data.len() / VERTEX_STRIDE;
    }

    pub fn face_count(&self) -> usize {
        return self.index_data.len() / 3;
    }

    pub fn vertex(&self, index: usize) -> Option<Vertex> {
        let v = self.vertex_data.get(index * VERTEX_STRIDE..(index + 1) * VERTEX_STRIDE)?;
        return Some(Vertex {
            position: Point3::new(v[0], v[1], v[2]),
            normal: Vector3::new(v[3], v[4], v[5]),
            uv: Vector2::new(v[6], v[7]),
        });
    }

    /// The three vertices of a face, each with its own normal.
    pub fn face(&self, face: usize) -> Option<[Vertex; 3]> {
        let indices = self.index_data.get(3 * face..3 * face + 3)?;
        return Some([
            self.vertex(indices[0] as usize)?,
            self.vertex(indices[1] as usize)?,
            self.vertex(indices[2] as usize)?,
        ]);
    }

    pub fn faces(&self) -> impl Iterator<Item = [Vertex; 3]> + '_ {
        return (0..self.face_count()).filter_map(move |face| self.face(face));
    }
}

/// Per vertex normals as the normalized sum of the (area weighted) normals of every face
/// using the vertex. Indices out of range are ignored here, from_raw reports them.
fn smooth_normals(positions: &[Point3<f32>], indices: &[u16]) -> Vec<Vector3<f32>> {
    let mut normals = vec![Vector3::zeros(); positions.len()];
    for face in indices.chunks_exact(3) {
        let corners = [face[0] as usize, face[1] as usize, face[2] as usize];
        if corners.iter().any(|&i| i >= positions.len()) {
            continue;
        }
        let [a, b, c] = corners.map(|i| positions[i]);
        let face_normal = (b - a).cross(&(c - a));
        for i in corners {
            normals[i] += face_normal;
        }
    }
    for normal in normals.iter_mut() {
        *normal = normal.try_normalize(f32::EPSILON).unwrap_or(Vector3::zeros());
    }
    return normals;
}
