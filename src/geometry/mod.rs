pub mod face;
pub mod mesh;

pub use face::{Face, FaceDir, GeometryProcessor};
pub use mesh::{build_mesh, face_corners, Mesh, Triangle, Vertex};
