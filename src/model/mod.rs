//! Sparse voxel model storage.
//!
//! The model is built by an external collaborator from 2D raster layers and
//! is read-only for the duration of a frame. Absence of a grid entry means
//! empty space.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::geometry::FaceDir;

/// RGBA color, 0-255 per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const WHITE: Rgba = Rgba::new(255, 255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_array(c: [u8; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }

    /// Scale RGB channels by a factor, clamping to 255. Alpha untouched.
    pub fn scale_rgb(self, factor: f32) -> Self {
        let scale = |c: u8| (c as f32 * factor + 0.5).min(255.0).max(0.0) as u8;
        Self::new(scale(self.r), scale(self.g), scale(self.b), self.a)
    }
}

/// Integer grid coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// A single voxel: grid position plus color. Immutable once generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voxel {
    pub pos: GridPos,
    pub color: Rgba,
}

/// Sparse voxel grid with bounding dimensions.
///
/// Built once per source-state change; the core only reads it. Occupancy
/// lookup is O(1).
#[derive(Debug, Clone, Default)]
pub struct VoxelModel {
    grid: FxHashMap<GridPos, Rgba>,
    dims: (i32, i32, i32),
}

impl VoxelModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a voxel, growing the bounding dimensions as needed.
    /// Coordinates are expected to be non-negative grid indices.
    pub fn insert(&mut self, pos: GridPos, color: Rgba) {
        self.grid.insert(pos, color);
        self.dims.0 = self.dims.0.max(pos.x + 1);
        self.dims.1 = self.dims.1.max(pos.y + 1);
        self.dims.2 = self.dims.2.max(pos.z + 1);
    }

    pub fn from_voxels(voxels: impl IntoIterator<Item = Voxel>) -> Self {
        let mut model = Self::new();
        for v in voxels {
            model.insert(v.pos, v.color);
        }
        model
    }

    /// Bounding dimensions (exclusive upper bound per axis).
    pub fn dims(&self) -> (i32, i32, i32) {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        self.grid.contains_key(&pos)
    }

    pub fn color_at(&self, pos: GridPos) -> Option<Rgba> {
        self.grid.get(&pos).copied()
    }

    /// True if the voxel exists and has at least one exposed face.
    pub fn is_visible(&self, pos: GridPos) -> bool {
        if !self.contains(pos) {
            return false;
        }
        FaceDir::ALL.iter().any(|dir| {
            let (dx, dy, dz) = dir.neighbor_offset();
            !self.contains(pos.offset(dx, dy, dz))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Voxel> + '_ {
        self.grid
            .iter()
            .map(|(&pos, &color)| Voxel { pos, color })
    }
}
