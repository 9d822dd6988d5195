// soa.rs — CPU structure-of-arrays map containers + color AOS→SOA.
//
// `SoaPyramid` is the CPU twin of one GPU map buffer: a single Vec<f32>
// with the exact packed layout from layout.rs. The GPU agreement tests
// read a device buffer back and compare it element-for-element against
// one of these.

use crate::frame::ColorPixel;
use crate::layout::{LevelView, PyramidLayout, NUM_CHANNELS};

// ---------------------------------------------------------------------------
// SoaPyramid
// ---------------------------------------------------------------------------

/// A packed 3-channel, 3-level SOA map on the CPU.
///
/// One owning allocation; channel/level access goes through the layout's
/// `LevelView` descriptors, so slices handed out here can never cross a
/// level boundary.
pub struct SoaPyramid {
    data: Vec<f32>,
    layout: PyramidLayout,
}

impl SoaPyramid {
    /// Allocate, zero-initialized.
    pub fn new(layout: PyramidLayout) -> Self {
        SoaPyramid {
            data: vec![0.0; layout.total_len()],
            layout,
        }
    }

    pub fn layout(&self) -> PyramidLayout {
        self.layout
    }

    /// One channel at one level, read-only.
    pub fn level(&self, channel: usize, level: usize) -> &[f32] {
        let v = self.layout.view(channel, level);
        &self.data[v.offset..v.offset + v.len]
    }

    /// One channel at one level, mutable.
    pub fn level_mut(&mut self, channel: usize, level: usize) -> &mut [f32] {
        let v = self.layout.view(channel, level);
        &mut self.data[v.offset..v.offset + v.len]
    }

    /// The whole packed allocation (for GPU comparison and upload).
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// One pixel's three channel values at a level.
    pub fn pixel(&self, level: usize, u: usize, v: usize) -> [f32; 3] {
        let lv = self.layout.view(0, level);
        assert!(u < lv.width && v < lv.height, "pixel ({u},{v}) out of bounds");
        let idx = v * lv.width + u;
        [
            self.level(0, level)[idx],
            self.level(1, level)[idx],
            self.level(2, level)[idx],
        ]
    }

    /// Write one pixel's three channel values at a level.
    pub fn set_pixel(&mut self, level: usize, u: usize, v: usize, value: [f32; 3]) {
        let lv = self.layout.view(0, level);
        assert!(u < lv.width && v < lv.height, "pixel ({u},{v}) out of bounds");
        let idx = v * lv.width + u;
        for c in 0..NUM_CHANNELS {
            self.level_mut(c, level)[idx] = value[c];
        }
    }
}

// ---------------------------------------------------------------------------
// SoaColor
// ---------------------------------------------------------------------------

/// Single-level SOA color map: three planes of P elements (r, g, b),
/// packed in one allocation. Raw channel values 0–255 stored as f32 —
/// same raw-value convention as the GPU kernels.
pub struct SoaColor {
    data: Vec<f32>,
    pixel_count: usize,
}

impl SoaColor {
    pub fn new(pixel_count: usize) -> Self {
        SoaColor {
            data: vec![0.0; NUM_CHANNELS * pixel_count],
            pixel_count,
        }
    }

    /// Channel plane r=0, g=1, b=2.
    pub fn plane(&self, channel: usize) -> &[f32] {
        assert!(channel < NUM_CHANNELS);
        let start = channel * self.pixel_count;
        &self.data[start..start + self.pixel_count]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Descriptor for one channel plane (visualization boundary).
    pub fn plane_view(&self, channel: usize, width: usize, height: usize) -> LevelView {
        assert!(channel < NUM_CHANNELS);
        assert_eq!(width * height, self.pixel_count);
        LevelView {
            offset: channel * self.pixel_count,
            len: self.pixel_count,
            width,
            height,
        }
    }
}

/// Convert an AOS color buffer into SOA channel planes, preserving
/// row-major pixel order. Pure transform: no validity filtering, and
/// running it twice on the same input yields identical output.
pub fn color_to_soa(aos: &[ColorPixel], out: &mut SoaColor) {
    assert_eq!(aos.len(), out.pixel_count, "AOS length must equal pixel count");
    for (i, px) in aos.iter().enumerate() {
        out.data[i] = px.r as f32;
        out.data[out.pixel_count + i] = px.g as f32;
        out.data[2 * out.pixel_count + i] = px.b as f32;
    }
}
