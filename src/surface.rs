//! Caller-owned RGBA pixel target.
//!
//! The core writes into the surface during the IMAGE stage and the final
//! composite step; it never owns it. There is no per-pixel depth test, which
//! is why compositing relies on painter ordering upstream.

use crate::model::Rgba;

/// A packed RGBA8 pixel buffer.
#[derive(Debug, Clone)]
pub struct SurfaceBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl SurfaceBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn fill(&mut self, color: Rgba) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color.to_array());
        }
    }

    /// Bounds-checked pixel write; out-of-range coordinates are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let off = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[off..off + 4].copy_from_slice(&color.to_array());
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Rgba> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let off = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.pixels[off..off + 4];
        Some(Rgba::new(px[0], px[1], px[2], px[3]))
    }

    /// Scanline-fill a convex quad given in screen space. Used by the
    /// engine's painter-order composite; later fills overwrite earlier ones.
    pub fn fill_quad(&mut self, xs: &[f32; 4], ys: &[f32; 4], color: Rgba) {
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let y0 = (min_y.floor().max(0.0)) as i32;
        let y1 = (max_y.ceil().min(self.height as f32)) as i32;

        struct Edge {
            x0: f32,
            y0: f32,
            x1: f32,
            y1: f32,
        }
        let mut edges = Vec::with_capacity(4);
        for i in 0..4 {
            let j = (i + 1) & 3;
            let (mut ex0, mut ey0, mut ex1, mut ey1) = (xs[i], ys[i], xs[j], ys[j]);
            if ey0 > ey1 {
                std::mem::swap(&mut ex0, &mut ex1);
                std::mem::swap(&mut ey0, &mut ey1);
            }
            edges.push(Edge {
                x0: ex0,
                y0: ey0,
                x1: ex1,
                y1: ey1,
            });
        }

        for y in y0..y1 {
            let scan = y as f32 + 0.5;
            let mut crossings: Vec<f32> = Vec::with_capacity(4);
            for e in &edges {
                if scan >= e.y0 && scan < e.y1 {
                    let t = (scan - e.y0) / (e.y1 - e.y0);
                    crossings.push(e.x0 + (e.x1 - e.x0) * t);
                }
            }
            if crossings.len() < 2 {
                continue;
            }
            crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            for pair in crossings.chunks_exact(2) {
                let xa = pair[0].min(pair[1]);
                let xb = pair[0].max(pair[1]);
                let ix0 = ((xa + 0.5).floor().max(0.0)) as i32;
                let ix1 = ((xb - 0.5).floor().min(self.width as f32 - 1.0)) as i32;
                for x in ix0..=ix1 {
                    self.set_pixel(x, y, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_pixel_bounds_checked() {
        let mut surface = SurfaceBuffer::new(4, 4);
        surface.set_pixel(-1, 0, Rgba::WHITE);
        surface.set_pixel(0, 4, Rgba::WHITE);
        assert!(surface.pixels().iter().all(|&b| b == 0));
        surface.set_pixel(3, 3, Rgba::new(1, 2, 3, 4));
        assert_eq!(surface.get_pixel(3, 3), Some(Rgba::new(1, 2, 3, 4)));
    }

    #[test]
    fn test_fill() {
        let mut surface = SurfaceBuffer::new(2, 2);
        surface.fill(Rgba::new(9, 8, 7, 6));
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(surface.get_pixel(x, y), Some(Rgba::new(9, 8, 7, 6)));
            }
        }
    }

    #[test]
    fn test_fill_quad_covers_center() {
        let mut surface = SurfaceBuffer::new(8, 8);
        let xs = [1.0, 7.0, 7.0, 1.0];
        let ys = [1.0, 1.0, 7.0, 7.0];
        surface.fill_quad(&xs, &ys, Rgba::WHITE);
        assert_eq!(surface.get_pixel(4, 4), Some(Rgba::WHITE));
        assert_eq!(surface.get_pixel(0, 0), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn test_fill_quad_clips_to_surface() {
        let mut surface = SurfaceBuffer::new(4, 4);
        let xs = [-10.0, 10.0, 10.0, -10.0];
        let ys = [-10.0, -10.0, 10.0, 10.0];
        surface.fill_quad(&xs, &ys, Rgba::WHITE);
        assert_eq!(surface.get_pixel(0, 0), Some(Rgba::WHITE));
        assert_eq!(surface.get_pixel(3, 3), Some(Rgba::WHITE));
    }
}
