//! Face directions and exposure classification.

use cgmath::{InnerSpace, Vector3};
use serde::{Deserialize, Serialize};

use crate::model::{GridPos, Rgba, VoxelModel};

/// The six canonical face directions. Naming follows the source convention:
/// front is +Z, top is +Y, right is +X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceDir {
    Front,  // +Z
    Back,   // -Z
    Right,  // +X
    Left,   // -X
    Top,    // +Y
    Bottom, // -Y
}

impl FaceDir {
    pub const ALL: [FaceDir; 6] = [
        FaceDir::Front,
        FaceDir::Back,
        FaceDir::Right,
        FaceDir::Left,
        FaceDir::Top,
        FaceDir::Bottom,
    ];

    /// Stable index used by the plugin ABI (`face_idx` hook argument).
    pub fn index(self) -> usize {
        match self {
            FaceDir::Front => 0,
            FaceDir::Back => 1,
            FaceDir::Right => 2,
            FaceDir::Left => 3,
            FaceDir::Top => 4,
            FaceDir::Bottom => 5,
        }
    }

    pub fn from_index(idx: usize) -> Option<FaceDir> {
        FaceDir::ALL.get(idx).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            FaceDir::Front => "front",
            FaceDir::Back => "back",
            FaceDir::Right => "right",
            FaceDir::Left => "left",
            FaceDir::Top => "top",
            FaceDir::Bottom => "bottom",
        }
    }

    /// Unit normal in model space.
    pub fn normal(self) -> Vector3<f32> {
        let (dx, dy, dz) = self.neighbor_offset();
        Vector3::new(dx as f32, dy as f32, dz as f32)
    }

    /// Grid offset toward the neighboring cell this face looks at.
    pub fn neighbor_offset(self) -> (i32, i32, i32) {
        match self {
            FaceDir::Front => (0, 0, 1),
            FaceDir::Back => (0, 0, -1),
            FaceDir::Right => (1, 0, 0),
            FaceDir::Left => (-1, 0, 0),
            FaceDir::Top => (0, 1, 0),
            FaceDir::Bottom => (0, -1, 0),
        }
    }
}

/// A single oriented voxel face. Derived from the model whenever it changes;
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Owning voxel coordinate.
    pub voxel: GridPos,
    pub dir: FaceDir,
    /// Unit normal in model space.
    pub normal: Vector3<f32>,
    /// Base color inherited from the owning voxel.
    pub color: Rgba,
    /// True iff the neighboring cell in `dir` is empty or out of bounds.
    pub exposed: bool,
}

/// Converts a voxel grid into exposed faces, dominant directions and an
/// unwelded mesh. Pure functions of the model; no side effects.
pub struct GeometryProcessor;

impl GeometryProcessor {
    /// Whether the face of `pos` toward `dir` is exposed.
    pub fn face_exposed(model: &VoxelModel, pos: GridPos, dir: FaceDir) -> bool {
        let (dx, dy, dz) = dir.neighbor_offset();
        !model.contains(pos.offset(dx, dy, dz))
    }

    /// All exposed faces of the model. O(V x 6).
    pub fn exposed_faces(model: &VoxelModel) -> Vec<Face> {
        let mut faces = Vec::new();
        for voxel in model.iter() {
            for dir in FaceDir::ALL {
                if Self::face_exposed(model, voxel.pos, dir) {
                    faces.push(Face {
                        voxel: voxel.pos,
                        dir,
                        normal: dir.normal(),
                        color: voxel.color,
                        exposed: true,
                    });
                }
            }
        }
        faces
    }

    /// Sum of exposed-face normals for one voxel. Zero for an enclosed voxel.
    pub fn accumulated_normal(model: &VoxelModel, pos: GridPos) -> Vector3<f32> {
        let mut sum = Vector3::new(0.0, 0.0, 0.0);
        for dir in FaceDir::ALL {
            if Self::face_exposed(model, pos, dir) {
                sum += dir.normal();
            }
        }
        sum
    }

    /// Classify an accumulated normal into one of the six canonical
    /// directions: axis of maximum absolute magnitude, sign selects the
    /// direction. Ties break by axis priority Y, then Z, then X so the
    /// mapping stays deterministic.
    pub fn dominant_direction(normal: Vector3<f32>) -> FaceDir {
        let ax = normal.x.abs();
        let ay = normal.y.abs();
        let az = normal.z.abs();

        if ay >= az && ay >= ax {
            if normal.y >= 0.0 {
                FaceDir::Top
            } else {
                FaceDir::Bottom
            }
        } else if az >= ax {
            if normal.z >= 0.0 {
                FaceDir::Front
            } else {
                FaceDir::Back
            }
        } else if normal.x >= 0.0 {
            FaceDir::Right
        } else {
            FaceDir::Left
        }
    }

    /// Dominant direction of a voxel's exposed faces.
    pub fn voxel_dominant_direction(model: &VoxelModel, pos: GridPos) -> FaceDir {
        Self::dominant_direction(Self::accumulated_normal(model, pos))
    }
}
