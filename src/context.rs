//! Per-frame render context shared read-only by all modules.

use cgmath::{InnerSpace, Matrix4, Quaternion, SquareMatrix, Vector3};

/// Maximum number of directional lights in a context.
pub const MAX_LIGHTS: usize = 8;

/// A directional light.
#[derive(Debug, Clone, Copy)]
pub struct DirLight {
    /// Unit direction the light travels toward the scene from.
    pub direction: Vector3<f32>,
    /// Diffuse multiplier.
    pub intensity: f32,
    /// Specular exponent.
    pub specular_power: f32,
}

impl DirLight {
    pub fn new(direction: Vector3<f32>, intensity: f32, specular_power: f32) -> Self {
        Self {
            direction: direction.normalize(),
            intensity,
            specular_power,
        }
    }
}

/// Immutable per-frame rendering state: transforms, lights, camera, timing
/// and target dimensions. Shared by all modules without copying.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub model: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    /// Camera orientation.
    pub camera_rotation: Quaternion<f32>,
    pub lights: Vec<DirLight>,
    /// Seconds since render start.
    pub time_sec: f32,
    pub width: u32,
    pub height: u32,
}

impl RenderContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            model: Matrix4::identity(),
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            camera_rotation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
            lights: Vec::new(),
            time_sec: 0.0,
            width,
            height,
        }
    }

    /// Add a light, silently ignoring additions past the limit.
    pub fn push_light(&mut self, light: DirLight) {
        if self.lights.len() < MAX_LIGHTS {
            self.lights.push(light);
        } else {
            log::warn!("light limit {} reached, ignoring extra light", MAX_LIGHTS);
        }
    }

    /// View direction in world space (camera forward, -Z rotated by the
    /// camera orientation).
    pub fn view_dir(&self) -> Vector3<f32> {
        (self.camera_rotation * Vector3::new(0.0, 0.0, -1.0)).normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_limit() {
        let mut ctx = RenderContext::new(64, 64);
        for _ in 0..12 {
            ctx.push_light(DirLight::new(Vector3::new(0.0, 0.0, 1.0), 1.0, 32.0));
        }
        assert_eq!(ctx.lights.len(), MAX_LIGHTS);
    }

    #[test]
    fn test_default_view_dir() {
        let ctx = RenderContext::new(64, 64);
        let dir = ctx.view_dir();
        assert!((dir.z + 1.0).abs() < 1e-6);
    }
}
