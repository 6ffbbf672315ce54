//! Built-in scripted shader modules.
//!
//! These ship with the engine and resolve by identifier like any other
//! module: a stylized Lambert shader, a directional-light shader with
//! radial falloff and rim lighting, a per-direction debug colorizer, and a
//! Phong shader driven by the context lights.

use cgmath::InnerSpace;

use crate::error::ValidationError;
use crate::geometry::{Face, FaceDir, GeometryProcessor};
use crate::lighting::{LightingEvaluator, Material};
use crate::model::{Rgba, Voxel};
use crate::shader::{
    FrameContext, HookResult, ModuleCategory, ParamDef, ParamValue, ScriptedShader,
};

fn bad_param(id: &str, key: &str, reason: &str) -> ValidationError {
    ValidationError::BadParam {
        id: id.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn unknown_key(id: &str, key: &str) -> ValidationError {
    bad_param(id, key, "unknown parameter")
}

fn f32_param(id: &str, key: &str, value: &ParamValue) -> Result<f32, ValidationError> {
    value
        .as_f32()
        .ok_or_else(|| bad_param(id, key, "expected a number"))
}

// ---------------------------------------------------------------------------
// builtin.basic: stylized uniform face brightness
// ---------------------------------------------------------------------------

/// Stylized Lambert shading against the global camera direction. Brightness
/// is uniform per face so large flat planes do not show dot artifacts.
pub struct BasicLighting {
    light_intensity: f32,
    shade_intensity: f32,
}

impl Default for BasicLighting {
    fn default() -> Self {
        Self {
            light_intensity: 50.0,
            shade_intensity: 50.0,
        }
    }
}

impl BasicLighting {
    pub const ID: &'static str = "builtin.basic";

    /// Brightness curve: shade intensity flattens the falloff exponent,
    /// light intensity lifts the floor.
    fn brightness(&self, dot: f32) -> f32 {
        let dot = dot.max(0.0);
        let si = self.shade_intensity / 100.0;
        let li = self.light_intensity / 100.0;
        let min_b = 0.05 + 0.9 * li;
        let curve = (1.0 - si) * (1.0 - si);
        let exponent = 1.0 + 6.0 * curve;
        let powered = if dot > 0.0 { dot.powf(exponent) } else { 0.0 };
        (min_b + (1.0 - min_b) * powered).clamp(0.0, 1.0)
    }
}

impl ScriptedShader for BasicLighting {
    fn id(&self) -> &str {
        Self::ID
    }

    fn display_name(&self) -> &str {
        "Basic Lighting (Lambert)"
    }

    fn category(&self) -> ModuleCategory {
        ModuleCategory::Lighting
    }

    fn schema(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::new("light_intensity", ParamValue::Float(50.0))
                .with_display("Light Intensity", "Brightness floor (0-100)"),
            ParamDef::new("shade_intensity", ParamValue::Float(50.0))
                .with_display("Shade Intensity", "Falloff steepness (0-100)"),
        ]
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<(), ValidationError> {
        match key {
            "light_intensity" => {
                self.light_intensity = f32_param(Self::ID, key, value)?.clamp(0.0, 100.0)
            }
            "shade_intensity" => {
                self.shade_intensity = f32_param(Self::ID, key, value)?.clamp(0.0, 100.0)
            }
            _ => return Err(unknown_key(Self::ID, key)),
        }
        Ok(())
    }

    fn voxel(&self, ctx: &FrameContext, voxel: &Voxel, input: Rgba) -> Option<HookResult<Rgba>> {
        // Voxel-level shading uses the dominant direction of the voxel's
        // exposed faces as its normal.
        let dir = GeometryProcessor::voxel_dominant_direction(ctx.model, voxel.pos);
        let dot = dir.normal().dot(ctx.camera_dir);
        Some(Ok(input.scale_rgb(self.brightness(dot))))
    }

    fn face(&self, ctx: &FrameContext, face: &Face, input: Rgba) -> Option<HookResult<Rgba>> {
        let dot = face.normal.dot(ctx.camera_dir);
        Some(Ok(input.scale_rgb(self.brightness(dot))))
    }
}

// ---------------------------------------------------------------------------
// builtin.dynamic: directional light with falloff and rim
// ---------------------------------------------------------------------------

/// Lambert with a shaping exponent, ambient floor, radial falloff around the
/// light axis and optional rim lighting.
pub struct DynamicLighting {
    pitch: f32,
    yaw: f32,
    diffuse: f32,
    ambient: f32,
    diameter: f32,
    rim_enabled: bool,
    light_color: Rgba,
}

impl Default for DynamicLighting {
    fn default() -> Self {
        Self {
            pitch: 25.0,
            yaw: 25.0,
            diffuse: 60.0,
            ambient: 30.0,
            diameter: 100.0,
            rim_enabled: false,
            light_color: Rgba::WHITE,
        }
    }
}

impl DynamicLighting {
    pub const ID: &'static str = "builtin.dynamic";

    fn light_dir(&self) -> cgmath::Vector3<f32> {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();
        cgmath::Vector3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize()
    }
}

impl ScriptedShader for DynamicLighting {
    fn id(&self) -> &str {
        Self::ID
    }

    fn display_name(&self) -> &str {
        "Dynamic Lighting"
    }

    fn category(&self) -> ModuleCategory {
        ModuleCategory::Lighting
    }

    fn schema(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::new("pitch", ParamValue::Float(25.0)).with_display("Pitch", "Light pitch in degrees"),
            ParamDef::new("yaw", ParamValue::Float(25.0)).with_display("Yaw", "Light yaw in degrees"),
            ParamDef::new("diffuse", ParamValue::Float(60.0))
                .with_display("Diffuse", "Diffuse percentage (0-100)"),
            ParamDef::new("ambient", ParamValue::Float(30.0))
                .with_display("Ambient", "Ambient percentage (0-100)"),
            ParamDef::new("diameter", ParamValue::Float(100.0))
                .with_display("Diameter", "Beam diameter in voxels, 0 disables falloff"),
            ParamDef::new("rim_enabled", ParamValue::Bool(false))
                .with_display("Rim Light", "Edge highlight toward the camera"),
            ParamDef::new("light_color", ParamValue::Color(Rgba::WHITE))
                .with_display("Light Color", "Tint of the light source"),
        ]
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<(), ValidationError> {
        match key {
            "pitch" => self.pitch = f32_param(Self::ID, key, value)?,
            "yaw" => self.yaw = f32_param(Self::ID, key, value)?,
            "diffuse" => self.diffuse = f32_param(Self::ID, key, value)?.clamp(0.0, 100.0),
            "ambient" => self.ambient = f32_param(Self::ID, key, value)?.clamp(0.0, 100.0),
            "diameter" => self.diameter = f32_param(Self::ID, key, value)?.max(0.0),
            "rim_enabled" => {
                self.rim_enabled = value
                    .as_bool()
                    .ok_or_else(|| bad_param(Self::ID, key, "expected a bool"))?
            }
            "light_color" => {
                self.light_color = value
                    .as_color()
                    .ok_or_else(|| bad_param(Self::ID, key, "expected a color"))?
            }
            _ => return Err(unknown_key(Self::ID, key)),
        }
        Ok(())
    }

    fn face(&self, ctx: &FrameContext, face: &Face, input: Rgba) -> Option<HookResult<Rgba>> {
        let l = self.light_dir();
        let diffuse_intensity = self.diffuse / 100.0;
        let ambient_intensity = self.ambient / 100.0;
        let exponent = 1.0 + (1.0 - diffuse_intensity) * 3.0;

        let n_dot_l = face.normal.dot(l).max(0.0);
        let mut diffuse = n_dot_l.powf(exponent);

        // Radial falloff around the light axis, measured from model center.
        if self.diameter > 0.0 {
            let to_voxel = cgmath::Vector3::new(
                face.voxel.x as f32 - ctx.middle.x,
                face.voxel.y as f32 - ctx.middle.y,
                face.voxel.z as f32 - ctx.middle.z,
            );
            let along = to_voxel.dot(l);
            let perp = to_voxel - l * along;
            let radius = self.diameter / 2.0;
            if radius > 0.0 {
                diffuse *= (1.0 - perp.magnitude() / radius).max(0.0);
            }
        }
        diffuse *= diffuse_intensity;

        let lr = self.light_color.r as f32 / 255.0;
        let lg = self.light_color.g as f32 / 255.0;
        let lb = self.light_color.b as f32 / 255.0;

        let mut r = input.r as f32 * (ambient_intensity + diffuse * lr);
        let mut g = input.g as f32 * (ambient_intensity + diffuse * lg);
        let mut b = input.b as f32 * (ambient_intensity + diffuse * lb);

        if self.rim_enabled {
            let n_dot_v = face.normal.dot(ctx.camera_dir);
            if n_dot_v > 0.0 {
                let edge = 1.0 - n_dot_v;
                let (rim_start, rim_end) = (0.55, 0.95);
                if edge > rim_start {
                    let t = ((edge - rim_start) / (rim_end - rim_start)).min(1.0);
                    let t = t * t * (3.0 - 2.0 * t);
                    let rim = 0.6 * t;
                    r += lr * rim * 255.0;
                    g += lg * rim * 255.0;
                    b += lb * rim * 255.0;
                }
            }
        }

        Some(Ok(Rgba::new(
            (r + 0.5).clamp(0.0, 255.0) as u8,
            (g + 0.5).clamp(0.0, 255.0) as u8,
            (b + 0.5).clamp(0.0, 255.0) as u8,
            input.a,
        )))
    }
}

// ---------------------------------------------------------------------------
// builtin.faceshade: per-direction debug colors
// ---------------------------------------------------------------------------

const FACESHADE_MODE_LITERAL: i32 = 0;
const FACESHADE_MODE_BLEND: i32 = 1;
const FACESHADE_MODE_MATERIAL: i32 = 2;

/// Colors faces by orientation. Useful for checking face visibility and
/// stacking order.
pub struct FaceShade {
    mode: i32,
    colors: [Rgba; 6],
    material_color: Rgba,
}

impl Default for FaceShade {
    fn default() -> Self {
        Self {
            mode: FACESHADE_MODE_LITERAL,
            colors: [
                Rgba::new(0, 255, 255, 255), // front: cyan
                Rgba::new(255, 0, 0, 255),   // back: red
                Rgba::new(0, 255, 0, 255),   // right: green
                Rgba::new(255, 0, 255, 255), // left: magenta
                Rgba::new(255, 255, 0, 255), // top: yellow
                Rgba::new(0, 0, 255, 255),   // bottom: blue
            ],
            material_color: Rgba::WHITE,
        }
    }
}

impl FaceShade {
    pub const ID: &'static str = "builtin.faceshade";

    fn color_for(&self, dir: FaceDir) -> Rgba {
        self.colors[dir.index()]
    }
}

impl ScriptedShader for FaceShade {
    fn id(&self) -> &str {
        Self::ID
    }

    fn display_name(&self) -> &str {
        "FaceShade (Debug Colors)"
    }

    fn category(&self) -> ModuleCategory {
        ModuleCategory::Effect
    }

    fn schema(&self) -> Vec<ParamDef> {
        let mut schema = vec![ParamDef::new("mode", ParamValue::Int(FACESHADE_MODE_LITERAL))
            .with_display("Mode", "0=Literal, 1=Blend, 2=Material Only")];
        let defaults = FaceShade::default();
        for dir in FaceDir::ALL {
            schema.push(
                ParamDef::new(
                    &format!("{}_color", dir.name()),
                    ParamValue::Color(defaults.color_for(dir)),
                )
                .with_display(dir.name(), "Face color for this direction"),
            );
        }
        schema.push(
            ParamDef::new("material_color", ParamValue::Color(Rgba::WHITE))
                .with_display("Material Color", "Only faces matching this color are recolored"),
        );
        schema
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<(), ValidationError> {
        if key == "mode" {
            let mode = value
                .as_i32()
                .ok_or_else(|| bad_param(Self::ID, key, "expected an int"))?;
            if !(FACESHADE_MODE_LITERAL..=FACESHADE_MODE_MATERIAL).contains(&mode) {
                return Err(bad_param(Self::ID, key, "mode out of range"));
            }
            self.mode = mode;
            return Ok(());
        }
        if key == "material_color" {
            self.material_color = value
                .as_color()
                .ok_or_else(|| bad_param(Self::ID, key, "expected a color"))?;
            return Ok(());
        }
        for dir in FaceDir::ALL {
            if key == format!("{}_color", dir.name()) {
                let color = value
                    .as_color()
                    .ok_or_else(|| bad_param(Self::ID, key, "expected a color"))?;
                self.colors[dir.index()] = color;
                return Ok(());
            }
        }
        Err(unknown_key(Self::ID, key))
    }

    fn face(&self, _ctx: &FrameContext, face: &Face, input: Rgba) -> Option<HookResult<Rgba>> {
        let target = self.color_for(face.dir);
        let out = match self.mode {
            FACESHADE_MODE_BLEND => Rgba::new(
                ((target.r as u16 + input.r as u16) / 2) as u8,
                ((target.g as u16 + input.g as u16) / 2) as u8,
                ((target.b as u16 + input.b as u16) / 2) as u8,
                input.a,
            ),
            FACESHADE_MODE_MATERIAL => {
                let close = |a: u8, b: u8| (a as i16 - b as i16).abs() <= 10;
                if close(input.r, self.material_color.r)
                    && close(input.g, self.material_color.g)
                    && close(input.b, self.material_color.b)
                {
                    Rgba::new(target.r, target.g, target.b, input.a)
                } else {
                    input
                }
            }
            _ => Rgba::new(target.r, target.g, target.b, input.a),
        };
        Some(Ok(out))
    }
}

// ---------------------------------------------------------------------------
// builtin.phong: context-light Phong shading
// ---------------------------------------------------------------------------

/// Ambient/diffuse/specular shading using the render context's directional
/// lights and the reference evaluator.
pub struct PhongLighting {
    material: Material,
}

impl Default for PhongLighting {
    fn default() -> Self {
        Self {
            material: Material::default(),
        }
    }
}

impl PhongLighting {
    pub const ID: &'static str = "builtin.phong";
}

impl ScriptedShader for PhongLighting {
    fn id(&self) -> &str {
        Self::ID
    }

    fn display_name(&self) -> &str {
        "Phong Lighting"
    }

    fn category(&self) -> ModuleCategory {
        ModuleCategory::Lighting
    }

    fn schema(&self) -> Vec<ParamDef> {
        vec![
            ParamDef::new("ambient", ParamValue::Float(0.1))
                .with_display("Ambient", "Base illumination level (0-1)"),
            ParamDef::new("diffuse_strength", ParamValue::Float(1.0))
                .with_display("Diffuse Strength", "Diffuse multiplier (0-2)"),
            ParamDef::new("specular_strength", ParamValue::Float(0.0))
                .with_display("Specular Strength", "Specular multiplier (0-2)"),
            ParamDef::new("shininess", ParamValue::Float(32.0))
                .with_display("Shininess", "Specular exponent (1-128)"),
        ]
    }

    fn set_param(&mut self, key: &str, value: &ParamValue) -> Result<(), ValidationError> {
        match key {
            "ambient" => self.material.ambient = f32_param(Self::ID, key, value)?.clamp(0.0, 1.0),
            "diffuse_strength" => {
                self.material.diffuse = f32_param(Self::ID, key, value)?.clamp(0.0, 2.0)
            }
            "specular_strength" => {
                self.material.specular = f32_param(Self::ID, key, value)?.clamp(0.0, 2.0)
            }
            "shininess" => {
                self.material.shininess = f32_param(Self::ID, key, value)?.clamp(1.0, 128.0)
            }
            _ => return Err(unknown_key(Self::ID, key)),
        }
        Ok(())
    }

    fn face(&self, ctx: &FrameContext, face: &Face, input: Rgba) -> Option<HookResult<Rgba>> {
        Some(Ok(LightingEvaluator::shade(
            input,
            face.normal,
            ctx.camera_dir,
            &ctx.render.lights,
            &self.material,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{DirLight, RenderContext};
    use crate::model::{GridPos, VoxelModel};
    use cgmath::Vector3;

    fn test_face(dir: FaceDir) -> Face {
        Face {
            voxel: GridPos::new(0, 0, 0),
            dir,
            normal: dir.normal(),
            color: Rgba::new(200, 100, 50, 255),
            exposed: true,
        }
    }

    #[test]
    fn test_basic_brightness_bounds_and_monotonicity() {
        let shader = BasicLighting::default();
        let mut last = -1.0;
        for i in 0..=10 {
            let dot = i as f32 / 10.0;
            let b = shader.brightness(dot);
            assert!((0.0..=1.0).contains(&b));
            assert!(b >= last);
            last = b;
        }
        assert_eq!(shader.brightness(-0.5), shader.brightness(0.0));
    }

    #[test]
    fn test_basic_set_param_clamps() {
        let mut shader = BasicLighting::default();
        shader
            .set_param("light_intensity", &ParamValue::Float(250.0))
            .unwrap();
        assert_eq!(shader.light_intensity, 100.0);
        assert!(shader.set_param("nope", &ParamValue::Float(1.0)).is_err());
        assert!(shader
            .set_param("light_intensity", &ParamValue::Bool(true))
            .is_err());
    }

    #[test]
    fn test_faceshade_literal_and_blend() {
        let render = RenderContext::new(4, 4);
        let model = VoxelModel::new();
        let ctx = FrameContext::new(&render, &model);

        let shader = FaceShade::default();
        let face = test_face(FaceDir::Top);
        let out = shader.face(&ctx, &face, face.color).unwrap().unwrap();
        assert_eq!(out, Rgba::new(255, 255, 0, 255));

        let mut blend = FaceShade::default();
        blend.set_param("mode", &ParamValue::Int(1)).unwrap();
        let out = blend.face(&ctx, &face, Rgba::new(0, 0, 0, 255)).unwrap().unwrap();
        assert_eq!(out, Rgba::new(127, 127, 0, 255));
    }

    #[test]
    fn test_faceshade_rejects_bad_mode() {
        let mut shader = FaceShade::default();
        assert!(shader.set_param("mode", &ParamValue::Int(9)).is_err());
    }

    #[test]
    fn test_phong_brighter_than_ambient_baseline() {
        let mut render = RenderContext::new(4, 4);
        render.push_light(DirLight::new(Vector3::new(0.0, 0.0, -1.0), 1.0, 0.0));
        let model = VoxelModel::new();
        let ctx = FrameContext::new(&render, &model);

        let mut shader = PhongLighting::default();
        shader.set_param("ambient", &ParamValue::Float(0.1)).unwrap();

        // Face looking straight at the light: N.L = 1, diffuse = intensity.
        let face = test_face(FaceDir::Front);
        let lit = shader.face(&ctx, &face, face.color).unwrap().unwrap();

        let dark_render = RenderContext::new(4, 4);
        let dark_ctx = FrameContext::new(&dark_render, &model);
        let ambient_only = shader.face(&dark_ctx, &face, face.color).unwrap().unwrap();

        assert!(lit.r > ambient_only.r);
        assert!(lit.g > ambient_only.g);
        assert!(lit.b > ambient_only.b);
    }

    #[test]
    fn test_dynamic_ambient_floor() {
        let render = RenderContext::new(4, 4);
        let model = VoxelModel::new();
        let ctx = FrameContext::new(&render, &model);

        let mut shader = DynamicLighting::default();
        shader.set_param("diffuse", &ParamValue::Float(0.0)).unwrap();
        shader.set_param("ambient", &ParamValue::Float(100.0)).unwrap();

        // With no diffuse, output is input scaled by the ambient floor (1.0).
        let face = test_face(FaceDir::Top);
        let out = shader.face(&ctx, &face, face.color).unwrap().unwrap();
        assert_eq!(out, face.color);
    }

    #[test]
    fn test_voxel_hook_uses_dominant_direction() {
        let mut model = VoxelModel::new();
        model.insert(GridPos::new(0, 0, 0), Rgba::new(100, 100, 100, 255));
        let render = RenderContext::new(4, 4);
        let ctx = FrameContext::new(&render, &model);

        let shader = BasicLighting::default();
        let voxel = Voxel {
            pos: GridPos::new(0, 0, 0),
            color: Rgba::new(100, 100, 100, 255),
        };
        // Hook is implemented and deterministic.
        let a = shader.voxel(&ctx, &voxel, voxel.color).unwrap().unwrap();
        let b = shader.voxel(&ctx, &voxel, voxel.color).unwrap().unwrap();
        assert_eq!(a, b);
    }
}
