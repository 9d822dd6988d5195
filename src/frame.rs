// frame.rs — host-side RGB-D frame types.
//
// `ColorPixel` and `DepthPixel` are the AOS per-pixel records: the exact
// byte layout that `push_frame` copies into the device AOS buffers. Both
// are `bytemuck::Pod` so a `&[ColorPixel]` reinterprets as `&[u8]` for
// `queue.write_buffer` without copies or unsafe at the call site.

use bytemuck::{Pod, Zeroable};

use crate::layout::Resolution;

/// One AOS color sample: 8-bit RGBA, 4 bytes. The alpha channel is carried
/// for alignment (WGSL reads the pixel as one `u32`) and ignored by the
/// SOA conversion.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ColorPixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ColorPixel {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        ColorPixel { r, g, b, a: 255 }
    }
}

/// One AOS depth sample: metric depth in meters. Zero or negative means
/// "no return" from the sensor.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct DepthPixel {
    pub depth: f32,
}

impl DepthPixel {
    pub fn new(depth: f32) -> Self {
        DepthPixel { depth }
    }
}

// ---------------------------------------------------------------------------
// RgbdFrame
// ---------------------------------------------------------------------------

/// An owned host-resident color+depth frame.
///
/// Convenience container for tests, benches and demos; `push_frame` itself
/// takes plain slices so capture code can hand over mapped sensor memory
/// directly.
pub struct RgbdFrame {
    pub color: Vec<ColorPixel>,
    pub depth: Vec<DepthPixel>,
    pub resolution: Resolution,
}

impl RgbdFrame {
    /// A frame with constant depth and a single color.
    pub fn constant(resolution: Resolution, depth: f32, color: ColorPixel) -> Self {
        let n = resolution.pixel_count();
        RgbdFrame {
            color: vec![color; n],
            depth: vec![DepthPixel::new(depth); n],
            resolution,
        }
    }

    /// A frame with a depth ramp along x (near left edge, far right edge)
    /// and a matching grayscale ramp in color. Gives every stage non-trivial
    /// but predictable input.
    pub fn ramp(resolution: Resolution, near: f32, far: f32) -> Self {
        let (w, h) = (resolution.width(), resolution.height());
        let mut color = Vec::with_capacity(w * h);
        let mut depth = Vec::with_capacity(w * h);
        for _y in 0..h {
            for x in 0..w {
                let t = x as f32 / (w - 1).max(1) as f32;
                let g = (t * 255.0) as u8;
                color.push(ColorPixel::new(g, g, g));
                depth.push(DepthPixel::new(near + t * (far - near)));
            }
        }
        RgbdFrame { color, depth, resolution }
    }

    /// Raw depth values as a flat `&[f32]` (the CPU builders take this).
    pub fn depth_values(&self) -> Vec<f32> {
        self.depth.iter().map(|d| d.depth).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_sizes() {
        // AOS records must match what the WGSL kernels read: 4 bytes each.
        assert_eq!(std::mem::size_of::<ColorPixel>(), 4);
        assert_eq!(std::mem::size_of::<DepthPixel>(), 4);
    }

    #[test]
    fn test_constant_frame() {
        let res = Resolution::new(8, 4).unwrap();
        let f = RgbdFrame::constant(res, 1.5, ColorPixel::new(10, 20, 30));
        assert_eq!(f.color.len(), 32);
        assert_eq!(f.depth.len(), 32);
        assert!(f.depth_values().iter().all(|&d| (d - 1.5).abs() < 1e-6));
    }

    #[test]
    fn test_ramp_frame_monotone() {
        let res = Resolution::new(16, 4).unwrap();
        let f = RgbdFrame::ramp(res, 0.5, 3.5);
        let d = f.depth_values();
        assert!((d[0] - 0.5).abs() < 1e-6);
        assert!((d[15] - 3.5).abs() < 1e-6);
        for x in 1..16 {
            assert!(d[x] > d[x - 1], "depth ramp not monotone at x={x}");
        }
    }
}
