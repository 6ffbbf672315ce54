//! Unwelded triangle mesh construction.
//!
//! Every exposed face contributes two triangles built from its own four
//! corners; vertices are owned by their triangle and never shared, so there
//! is no welding pass and triangle count is always twice the face count.

use cgmath::Vector3;

use crate::geometry::{Face, FaceDir};
use crate::model::Rgba;

/// Unit cube corners centered on the voxel origin.
const UNIT_VERTS: [[f32; 3]; 8] = [
    [-0.5, -0.5, -0.5],
    [0.5, -0.5, -0.5],
    [0.5, 0.5, -0.5],
    [-0.5, 0.5, -0.5],
    [-0.5, -0.5, 0.5],
    [0.5, -0.5, 0.5],
    [0.5, 0.5, 0.5],
    [-0.5, 0.5, 0.5],
];

/// Corner indices per face, wound counter-clockwise seen from outside.
/// Order matches `FaceDir::index`: front, back, right, left, top, bottom.
const FACE_CORNERS: [[usize; 4]; 6] = [
    [4, 5, 6, 7],
    [1, 0, 3, 2],
    [5, 1, 2, 6],
    [0, 4, 7, 3],
    [7, 6, 2, 3],
    [0, 1, 5, 4],
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
    pub color: Rgba,
}

/// A triangle owning its three vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
    /// The face this triangle came from.
    pub voxel: crate::model::GridPos,
    pub dir: FaceDir,
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Append both triangles of one face quad.
    pub fn add_face(&mut self, face: &Face) {
        let corners = face_corners(face);
        // Split the quad along the 0-2 diagonal.
        for tri in [[0, 1, 2], [0, 2, 3]] {
            self.triangles.push(Triangle {
                vertices: [corners[tri[0]], corners[tri[1]], corners[tri[2]]],
                voxel: face.voxel,
                dir: face.dir,
            });
        }
    }
}

/// The four corner vertices of a face, in winding order.
pub fn face_corners(face: &Face) -> [Vertex; 4] {
    let base = Vector3::new(
        face.voxel.x as f32,
        face.voxel.y as f32,
        face.voxel.z as f32,
    );
    FACE_CORNERS[face.dir.index()].map(|ci| Vertex {
        position: base + Vector3::from(UNIT_VERTS[ci]),
        normal: face.normal,
        color: face.color,
    })
}

/// Build the unwelded mesh for a set of exposed faces.
pub fn build_mesh(faces: &[Face]) -> Mesh {
    let mut mesh = Mesh::new();
    for face in faces.iter().filter(|f| f.exposed) {
        mesh.add_face(face);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryProcessor;
    use crate::model::{GridPos, Rgba, VoxelModel};

    #[test]
    fn test_triangle_count_is_twice_face_count() {
        let mut model = VoxelModel::new();
        model.insert(GridPos::new(0, 0, 0), Rgba::WHITE);
        model.insert(GridPos::new(1, 0, 0), Rgba::WHITE);
        let faces = GeometryProcessor::exposed_faces(&model);
        let mesh = build_mesh(&faces);
        assert_eq!(mesh.triangle_count(), 2 * faces.len());
        assert_eq!(mesh.triangle_count(), 20);
    }

    #[test]
    fn test_vertices_are_owned_not_shared() {
        let mut model = VoxelModel::new();
        model.insert(GridPos::new(0, 0, 0), Rgba::WHITE);
        let faces = GeometryProcessor::exposed_faces(&model);
        let mesh = build_mesh(&faces);

        // Each triangle owns value copies: 3 vertices per triangle, always.
        let total: usize = mesh.triangles.iter().map(|t| t.vertices.len()).sum();
        assert_eq!(total, mesh.triangle_count() * 3);

        // Spatially coincident corners of different faces are distinct
        // instances: mutating one triangle cannot affect another.
        let mut mesh2 = mesh.clone();
        mesh2.triangles[0].vertices[0].position.x += 100.0;
        assert_eq!(mesh.triangles[1], mesh2.triangles[1]);
    }

    #[test]
    fn test_face_corners_lie_on_face_plane() {
        let face = Face {
            voxel: GridPos::new(2, 3, 4),
            dir: FaceDir::Top,
            normal: FaceDir::Top.normal(),
            color: Rgba::WHITE,
            exposed: true,
        };
        for v in face_corners(&face) {
            assert!((v.position.y - 3.5).abs() < 1e-6);
            assert_eq!(v.normal, FaceDir::Top.normal());
        }
    }

    #[test]
    fn test_unexposed_faces_are_skipped() {
        let face = Face {
            voxel: GridPos::new(0, 0, 0),
            dir: FaceDir::Front,
            normal: FaceDir::Front.normal(),
            color: Rgba::WHITE,
            exposed: false,
        };
        let mesh = build_mesh(&[face]);
        assert!(mesh.is_empty());
    }
}
