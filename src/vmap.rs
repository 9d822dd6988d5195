// vmap.rs — CPU vertex-map builder.
//
// Unprojects each valid depth sample to a camera-space point, writing
// level 0 of the vertex SOA pyramid. Invalid samples (zero, negative, or
// beyond max_depth) get the sentinel in all three channels so downstream
// consumers test validity with a single comparison.

use crate::filter::{DepthFilter, FilterError};
use crate::intrinsics::Intrinsics;
use crate::soa::SoaPyramid;

/// In-band invalid marker, written to every channel of an invalid pixel.
///
/// A designated finite value rather than NaN: WGSL implementations may
/// assume no NaNs, so `x != x` is not a portable validity test in
/// shaders, while equality against a marker is. The marker can never be
/// produced by averaging valid samples.
pub const INVALID: f32 = f32::MAX;

/// Single-comparison validity test, usable on any one channel because
/// invalid pixels carry the sentinel in all three.
#[inline]
pub fn is_valid(v: f32) -> bool {
    v != INVALID
}

/// Build level 0 of the vertex map from a raw depth image.
///
/// `depth` holds one f32 per pixel, row-major, at the layout's full
/// resolution. A sample `d` is valid iff `0 < d <= max_depth`; valid
/// samples unproject through `intr`, invalid ones write [`INVALID`] to
/// all three channels.
///
/// Levels 1 and 2 are untouched — call `pyramid::build_map_pyramid`
/// afterwards.
pub fn build_vertex_map(
    depth: &[f32],
    intr: &Intrinsics,
    filter: DepthFilter,
    max_depth: f32,
    out: &mut SoaPyramid,
) -> Result<(), FilterError> {
    filter.ensure_implemented()?;

    let layout = out.layout();
    let (w, h) = layout.level_dims(0);
    assert_eq!(depth.len(), w * h, "depth buffer must have one sample per pixel");

    for v in 0..h {
        for u in 0..w {
            let d = depth[v * w + u];
            let p = if d > 0.0 && d <= max_depth {
                intr.unproject(u as f32, v as f32, d)
            } else {
                [INVALID; 3]
            };
            out.set_pixel(0, u, v, p);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{PyramidLayout, Resolution};

    fn make_out(w: usize, h: usize) -> SoaPyramid {
        SoaPyramid::new(PyramidLayout::new(Resolution::new(w, h).unwrap()))
    }

    #[test]
    fn test_valid_pixel_unprojects() {
        let intr = Intrinsics::new(2.0, 2.0, 2.0, 2.0);
        let mut out = make_out(4, 4);
        let depth = vec![1.0f32; 16];
        build_vertex_map(&depth, &intr, DepthFilter::None, 5.0, &mut out).unwrap();

        // Pixel (0, 0): X = (0-2)*1/2 = -1, Y = -1, Z = 1.
        assert_eq!(out.pixel(0, 0, 0), [-1.0, -1.0, 1.0]);
        // Pixel (3, 1): X = (3-2)*1/2 = 0.5, Y = (1-2)*1/2 = -0.5.
        assert_eq!(out.pixel(0, 3, 1), [0.5, -0.5, 1.0]);
    }

    #[test]
    fn test_invalid_depths_write_sentinel() {
        let intr = Intrinsics::new(1.0, 1.0, 2.0, 2.0);
        let mut out = make_out(4, 4);
        let mut depth = vec![2.0f32; 16];
        depth[0] = 0.0; // no return
        depth[5] = -0.5; // negative
        depth[10] = 9.0; // beyond max_depth
        build_vertex_map(&depth, &intr, DepthFilter::None, 5.0, &mut out).unwrap();

        assert_eq!(out.pixel(0, 0, 0), [INVALID; 3]);
        assert_eq!(out.pixel(0, 1, 1), [INVALID; 3]);
        assert_eq!(out.pixel(0, 2, 2), [INVALID; 3]);
        // Everything else is finite.
        assert!(out.pixel(0, 3, 3).iter().all(|&v| is_valid(v)));
    }

    #[test]
    fn test_unimplemented_filter_touches_nothing() {
        let intr = Intrinsics::new(1.0, 1.0, 2.0, 2.0);
        let mut out = make_out(4, 4);
        let depth = vec![2.0f32; 16];
        let r = build_vertex_map(
            &depth,
            &intr,
            DepthFilter::Gaussian { sigma: 1.0 },
            5.0,
            &mut out,
        );
        assert!(r.is_err());
        // Output still zero-initialized: the builder failed before writing.
        assert!(out.level(0, 0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid(0.0));
        assert!(is_valid(-1.0e30));
        assert!(!is_valid(INVALID));
    }
}
