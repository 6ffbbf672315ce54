//! Built-in reference shading math.
//!
//! Stateless ambient/diffuse/specular evaluation usable by any module. This
//! is a helper, not a pipeline stage.

use cgmath::{InnerSpace, Vector3};

use crate::context::DirLight;
use crate::model::Rgba;

/// Material coefficients for the reference lighting model.
#[derive(Debug, Clone, Copy)]
pub struct Material {
    /// Base illumination, 0-1.
    pub ambient: f32,
    /// Diffuse multiplier.
    pub diffuse: f32,
    /// Specular multiplier.
    pub specular: f32,
    /// Specular exponent fallback when a light carries none.
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: 0.1,
            diffuse: 1.0,
            specular: 0.0,
            shininess: 32.0,
        }
    }
}

pub struct LightingEvaluator;

impl LightingEvaluator {
    /// Total brightness factor for a surface: ambient plus the per-light
    /// diffuse and specular contributions.
    ///
    /// Per light: diffuse = max(0, N.L) * intensity, specular =
    /// max(0, R.V)^shininess with R = 2(N.L)N - L.
    pub fn brightness(
        normal: Vector3<f32>,
        view_dir: Vector3<f32>,
        lights: &[DirLight],
        material: &Material,
    ) -> f32 {
        let n = normal.normalize();
        let v = view_dir.normalize();
        let mut total = material.ambient;

        for light in lights {
            // L points from the surface toward the light.
            let l = -light.direction.normalize();
            let n_dot_l = n.dot(l).max(0.0);
            total += n_dot_l * light.intensity * material.diffuse;

            if material.specular > 0.0 && n_dot_l > 0.0 {
                let r = n * (2.0 * n_dot_l) - l;
                let r_dot_v = r.dot(v).max(0.0);
                let power = if light.specular_power > 0.0 {
                    light.specular_power
                } else {
                    material.shininess
                };
                total += r_dot_v.powf(power) * material.specular * light.intensity;
            }
        }

        total
    }

    /// Shade a base color, clamping each channel to the valid range.
    pub fn shade(
        base: Rgba,
        normal: Vector3<f32>,
        view_dir: Vector3<f32>,
        lights: &[DirLight],
        material: &Material,
    ) -> Rgba {
        base.scale_rgb(Self::brightness(normal, view_dir, lights, material))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head_on_light() -> DirLight {
        // Light travelling along -Z, i.e. straight at a +Z facing surface.
        DirLight {
            direction: Vector3::new(0.0, 0.0, -1.0),
            intensity: 1.0,
            specular_power: 0.0,
        }
    }

    #[test]
    fn test_head_on_diffuse_equals_intensity() {
        let material = Material {
            ambient: 0.1,
            diffuse: 1.0,
            specular: 0.0,
            shininess: 32.0,
        };
        let b = LightingEvaluator::brightness(
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
            &[head_on_light()],
            &material,
        );
        // N.L = 1, so brightness is ambient + intensity.
        assert!((b - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_lit_face_brighter_than_ambient_baseline() {
        let material = Material::default();
        let base = Rgba::new(200, 100, 50, 255);
        let normal = Vector3::new(0.0, 0.0, 1.0);
        let view = Vector3::new(0.0, 0.0, -1.0);
        let lit = LightingEvaluator::shade(base, normal, view, &[head_on_light()], &material);
        let ambient_only = LightingEvaluator::shade(base, normal, view, &[], &material);
        assert!(lit.r > ambient_only.r);
        assert!(lit.g > ambient_only.g);
        assert!(lit.b > ambient_only.b);
        assert_eq!(lit.a, base.a);
    }

    #[test]
    fn test_backfacing_light_contributes_nothing() {
        let material = Material {
            ambient: 0.25,
            ..Material::default()
        };
        let away = DirLight {
            direction: Vector3::new(0.0, 0.0, 1.0),
            intensity: 1.0,
            specular_power: 0.0,
        };
        let b = LightingEvaluator::brightness(
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
            &[away],
            &material,
        );
        assert!((b - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_channels_clamp() {
        let material = Material {
            ambient: 10.0,
            ..Material::default()
        };
        let out = LightingEvaluator::shade(
            Rgba::new(200, 200, 200, 255),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            &[],
            &material,
        );
        assert_eq!(out, Rgba::new(255, 255, 255, 255));
    }
}
