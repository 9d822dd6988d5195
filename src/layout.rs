// layout.rs — packed SOA pyramid layout arithmetic.
//
// Every map type (vertex, normal) lives in ONE contiguous allocation:
// three channel planes back to back, each plane holding three pyramid
// levels back to back. For pixel count P:
//
//   elements:  0        P       P+P/4   plane   2·plane         3·plane
//   channel x: [ L0 ... | L1 .. | L2 ]
//   channel y:                          [ L0 | L1 | L2 ]
//   channel z:                                  [ L0 | L1 | L2 ]
//
//   plane = P + P/4 + P/16 elements.
//
// One allocation per map means a whole pyramid can be produced, traversed
// and freed as a single block, and levels stay cache/VRAM-local.
//
// All offsets are computed HERE, exactly once, at construction. Consumers
// receive `LevelView` descriptors (offset + length + dimensions) and never
// do their own pointer arithmetic — a `LevelView` cannot address outside
// its level.

use std::fmt;

/// Number of pyramid levels. Level `l` has dimensions `(w >> l, h >> l)`.
pub const NUM_PYRAMID_LEVELS: usize = 3;

/// Channels per SOA map: x/y/z for vertex and normal maps, r/g/b for color.
pub const NUM_CHANNELS: usize = 3;

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Immutable frame resolution, fixed at pipeline construction.
///
/// Width and height must be positive multiples of 4 so that pyramid levels
/// 1 and 2 have exactly P/4 and P/16 pixels while still halving both
/// dimensions per level. Every common RGB-D sensor mode (640×480, 512×424,
/// 320×240) satisfies this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    width: usize,
    height: usize,
}

impl Resolution {
    /// Validate and construct. Returns `None` for dimensions that are zero
    /// or not multiples of 4.
    pub fn new(width: usize, height: usize) -> Option<Self> {
        if width == 0 || height == 0 || width % 4 != 0 || height % 4 != 0 {
            return None;
        }
        Some(Resolution { width, height })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Total pixels at level 0.
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

// ---------------------------------------------------------------------------
// LevelView
// ---------------------------------------------------------------------------

/// Non-owning descriptor of one channel at one pyramid level inside a
/// packed SOA allocation: element offset, element length, and the level's
/// pixel dimensions.
///
/// Handed out by [`PyramidLayout`]; the element range of one view never
/// overlaps any other view of the same map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelView {
    /// Offset from the start of the allocation, in elements.
    pub offset: usize,
    /// Number of elements (= width * height of this level).
    pub len: usize,
    /// Level width in pixels.
    pub width: usize,
    /// Level height in pixels.
    pub height: usize,
}

impl LevelView {
    /// Byte offset for f32 storage (wgpu buffer addressing).
    pub fn byte_offset(&self) -> u64 {
        (self.offset * std::mem::size_of::<f32>()) as u64
    }

    /// Byte length for f32 storage.
    pub fn byte_len(&self) -> u64 {
        (self.len * std::mem::size_of::<f32>()) as u64
    }
}

// ---------------------------------------------------------------------------
// PyramidLayout
// ---------------------------------------------------------------------------

/// Offset arithmetic for one packed SOA pyramid map.
///
/// Copy-cheap; both the CPU reference (`soa::SoaPyramid`) and the device
/// buffer manager (`gpu::buffers::FrameBuffers`) address through the same
/// layout, so CPU and GPU agree on every element's position by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PyramidLayout {
    resolution: Resolution,
}

impl PyramidLayout {
    pub fn new(resolution: Resolution) -> Self {
        PyramidLayout { resolution }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Pixel dimensions of a pyramid level.
    pub fn level_dims(&self, level: usize) -> (usize, usize) {
        assert!(level < NUM_PYRAMID_LEVELS, "level {level} out of range");
        (self.resolution.width >> level, self.resolution.height >> level)
    }

    /// Element count of one channel at one level: P, P/4, P/16.
    pub fn level_len(&self, level: usize) -> usize {
        assert!(level < NUM_PYRAMID_LEVELS, "level {level} out of range");
        self.resolution.pixel_count() >> (2 * level)
    }

    /// Element offset of a level within its channel plane: 0, P, P + P/4.
    pub fn level_offset(&self, level: usize) -> usize {
        let p = self.resolution.pixel_count();
        match level {
            0 => 0,
            1 => p,
            2 => p + (p >> 2),
            _ => panic!("level {level} out of range"),
        }
    }

    /// Elements per channel plane: P + P/4 + P/16.
    pub fn plane_len(&self) -> usize {
        let p = self.resolution.pixel_count();
        p + (p >> 2) + (p >> 4)
    }

    /// Total elements in the packed allocation: 3 channel planes.
    pub fn total_len(&self) -> usize {
        NUM_CHANNELS * self.plane_len()
    }

    /// The view for `channel` (0..3) at `level` (0..3).
    pub fn view(&self, channel: usize, level: usize) -> LevelView {
        assert!(channel < NUM_CHANNELS, "channel {channel} out of range");
        let (width, height) = self.level_dims(level);
        LevelView {
            offset: channel * self.plane_len() + self.level_offset(level),
            len: self.level_len(level),
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_rejects_bad_dims() {
        assert!(Resolution::new(0, 480).is_none());
        assert!(Resolution::new(640, 0).is_none());
        assert!(Resolution::new(641, 480).is_none()); // not multiple of 4
        assert!(Resolution::new(640, 482).is_none());
        assert!(Resolution::new(640, 480).is_some());
        assert!(Resolution::new(4, 4).is_some());
    }

    #[test]
    fn test_level_lengths() {
        let layout = PyramidLayout::new(Resolution::new(640, 480).unwrap());
        let p = 640 * 480;
        assert_eq!(layout.level_len(0), p);
        assert_eq!(layout.level_len(1), p / 4);
        assert_eq!(layout.level_len(2), p / 16);
        assert_eq!(layout.plane_len(), p + p / 4 + p / 16);
        assert_eq!(layout.total_len(), 3 * (p + p / 4 + p / 16));
    }

    #[test]
    fn test_level_dims_halve() {
        let layout = PyramidLayout::new(Resolution::new(640, 480).unwrap());
        assert_eq!(layout.level_dims(0), (640, 480));
        assert_eq!(layout.level_dims(1), (320, 240));
        assert_eq!(layout.level_dims(2), (160, 120));
    }

    #[test]
    fn test_views_cover_allocation_without_overlap() {
        // Collect all 9 views, sort by offset, and check they tile the
        // allocation exactly: contiguous, non-overlapping, total length
        // equal to total_len().
        let layout = PyramidLayout::new(Resolution::new(64, 48).unwrap());
        let mut views: Vec<LevelView> = Vec::new();
        for c in 0..NUM_CHANNELS {
            for l in 0..NUM_PYRAMID_LEVELS {
                views.push(layout.view(c, l));
            }
        }
        views.sort_by_key(|v| v.offset);

        let mut cursor = 0;
        for v in &views {
            assert_eq!(v.offset, cursor, "gap or overlap at offset {cursor}");
            assert_eq!(v.len, v.width * v.height);
            cursor += v.len;
        }
        assert_eq!(cursor, layout.total_len());
    }

    #[test]
    fn test_packed_plane_order() {
        // The packed order is x[0] x[1] x[2] y[0] y[1] y[2] z[0] z[1] z[2].
        let layout = PyramidLayout::new(Resolution::new(16, 16).unwrap());
        let p = 256;
        assert_eq!(layout.view(0, 0).offset, 0);
        assert_eq!(layout.view(0, 1).offset, p);
        assert_eq!(layout.view(0, 2).offset, p + p / 4);
        assert_eq!(layout.view(1, 0).offset, p + p / 4 + p / 16);
        assert_eq!(layout.view(2, 2).offset, layout.total_len() - p / 16);
    }

    #[test]
    fn test_byte_views() {
        let layout = PyramidLayout::new(Resolution::new(8, 8).unwrap());
        let v = layout.view(1, 1);
        assert_eq!(v.byte_offset(), (v.offset * 4) as u64);
        assert_eq!(v.byte_len(), (v.len * 4) as u64);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_level_out_of_range_panics() {
        let layout = PyramidLayout::new(Resolution::new(8, 8).unwrap());
        layout.view(0, 3);
    }
}
