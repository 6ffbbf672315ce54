//! Back-to-front depth ordering for painter's-algorithm compositing.
//!
//! The target surface has no per-pixel depth test, so correctness depends
//! entirely on sort order. Semi-transparent primitives are therefore not
//! correctly alpha-composited against each other; this is a documented
//! limitation of the pipeline, not a defect of the sort.

use cgmath::{Matrix4, Point3, Transform};

use crate::geometry::Face;

/// Sorts primitives by camera-space depth, farthest first.
pub struct DepthOrderer;

impl DepthOrderer {
    /// Camera-space depth of a face centroid. Larger means farther from the
    /// camera (view space looks down -Z).
    pub fn face_depth(face: &Face, model_view: &Matrix4<f32>) -> f32 {
        let center = Point3::new(
            face.voxel.x as f32,
            face.voxel.y as f32,
            face.voxel.z as f32,
        ) + face.normal * 0.5;
        let view_pos = model_view.transform_point(center);
        -view_pos.z
    }

    /// Sort faces back to front. The sort is stable: faces at equal depth
    /// keep their original insertion order, so near-identical geometry does
    /// not flicker between frames.
    pub fn sort_back_to_front(faces: &mut [Face], model_view: &Matrix4<f32>) {
        // sort_by is a stable sort; NaN depths compare as equal and keep
        // their input position rather than poisoning the order.
        faces.sort_by(|a, b| {
            let da = Self::face_depth(a, model_view);
            let db = Self::face_depth(b, model_view);
            db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

/// Convenience for sorting arbitrary items carrying a precomputed depth.
pub fn sort_by_depth<T>(items: &mut [T], depth_of: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| {
        depth_of(b)
            .partial_cmp(&depth_of(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{FaceDir, GeometryProcessor};
    use crate::model::{GridPos, Rgba, VoxelModel};
    use cgmath::SquareMatrix;

    fn face_at(z: i32, color: Rgba) -> Face {
        Face {
            voxel: GridPos::new(0, 0, z),
            dir: FaceDir::Front,
            normal: FaceDir::Front.normal(),
            color,
            exposed: true,
        }
    }

    #[test]
    fn test_farther_faces_come_first() {
        let mv = Matrix4::identity();
        let mut faces = vec![face_at(5, Rgba::WHITE), face_at(-3, Rgba::WHITE)];
        DepthOrderer::sort_back_to_front(&mut faces, &mv);
        // With identity view, larger +Z is closer (less deep).
        assert_eq!(faces[0].voxel.z, -3);
        assert_eq!(faces[1].voxel.z, 5);
    }

    #[test]
    fn test_equal_depth_keeps_insertion_order() {
        let mv = Matrix4::identity();
        let a = face_at(1, Rgba::new(1, 0, 0, 255));
        let b = face_at(1, Rgba::new(2, 0, 0, 255));
        let c = face_at(1, Rgba::new(3, 0, 0, 255));
        let mut faces = vec![a, b, c];
        DepthOrderer::sort_back_to_front(&mut faces, &mv);
        assert_eq!(faces[0].color.r, 1);
        assert_eq!(faces[1].color.r, 2);
        assert_eq!(faces[2].color.r, 3);
    }

    #[test]
    fn test_sort_whole_model() {
        let mut model = VoxelModel::new();
        for z in 0..4 {
            model.insert(GridPos::new(0, 0, z), Rgba::WHITE);
        }
        let mut faces = GeometryProcessor::exposed_faces(&model);
        let mv = Matrix4::identity();
        DepthOrderer::sort_back_to_front(&mut faces, &mv);
        let depths: Vec<f32> = faces
            .iter()
            .map(|f| DepthOrderer::face_depth(f, &mv))
            .collect();
        assert!(depths.windows(2).all(|w| w[0] >= w[1]));
    }
}
