// pyramid.rs — CPU SOA map pyramid builder.
//
// Fills levels 1..num_levels of a packed SOA map from its level 0.
// Generic over map type: the builder only sees channel planes, so the
// same code downsamples vertex maps and normal maps.
//
// Each output pixel at level L+1 averages its 2×2 source block at level L.
// If ANY of the four source samples carries the invalid sentinel, the
// output is invalid — a mixed block is never averaged, so geometry near
// depth discontinuities is dropped rather than biased.

use crate::layout::{NUM_CHANNELS, NUM_PYRAMID_LEVELS};
use crate::soa::SoaPyramid;
use crate::vmap::{is_valid, INVALID};

/// Build levels `1..num_levels` of `map` from its level 0.
///
/// `num_levels` must be in `1..=3`; `num_levels == 1` is a no-op.
///
/// Vertex positions at level L remain consistent with projecting through
/// [`Intrinsics::at_level(L)`](crate::intrinsics::Intrinsics::at_level),
/// up to the half-pixel shift of the 2×2 block centroid.
///
/// For normal maps the mean of four unit vectors is not re-normalized:
/// coarser normal levels are mean vectors of length ≤ 1. Consumers that
/// need unit normals at coarse levels should prefer per-level estimation
/// (`nmap::build_normal_map` over multiple levels).
pub fn build_map_pyramid(map: &mut SoaPyramid, num_levels: usize) {
    assert!(
        (1..=NUM_PYRAMID_LEVELS).contains(&num_levels),
        "num_levels must be in 1..={NUM_PYRAMID_LEVELS}"
    );

    for level in 1..num_levels {
        for channel in 0..NUM_CHANNELS {
            downsample_channel(map, channel, level);
        }
    }
}

/// Downsample one channel from `level - 1` into `level`.
fn downsample_channel(map: &mut SoaPyramid, channel: usize, level: usize) {
    let layout = map.layout();
    let (src_w, _) = layout.level_dims(level - 1);
    let (dst_w, dst_h) = layout.level_dims(level);

    for dv in 0..dst_h {
        for du in 0..dst_w {
            let out = {
                let src = map.level(channel, level - 1);
                let a = src[(2 * dv) * src_w + 2 * du];
                let b = src[(2 * dv) * src_w + 2 * du + 1];
                let c = src[(2 * dv + 1) * src_w + 2 * du];
                let d = src[(2 * dv + 1) * src_w + 2 * du + 1];
                if is_valid(a) && is_valid(b) && is_valid(c) && is_valid(d) {
                    (a + b + c + d) * 0.25
                } else {
                    INVALID
                }
            };
            map.level_mut(channel, level)[dv * dst_w + du] = out;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{PyramidLayout, Resolution};

    fn make_map(w: usize, h: usize) -> SoaPyramid {
        SoaPyramid::new(PyramidLayout::new(Resolution::new(w, h).unwrap()))
    }

    #[test]
    fn test_mean_of_four() {
        let mut m = make_map(4, 4);
        // Top-left 2×2 block of channel 0: 1, 2, 3, 4 → mean 2.5.
        let l0 = m.level_mut(0, 0);
        l0[0] = 1.0;
        l0[1] = 2.0;
        l0[4] = 3.0;
        l0[5] = 4.0;
        build_map_pyramid(&mut m, 2);
        assert!((m.level(0, 1)[0] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_one_invalid_source_invalidates_output() {
        let mut m = make_map(4, 4);
        m.level_mut(0, 0).fill(1.0);
        m.level_mut(0, 0)[1] = INVALID; // one corner of the top-left block
        build_map_pyramid(&mut m, 2);
        assert_eq!(m.level(0, 1)[0], INVALID);
        // The other three level-1 cells have all-valid sources.
        assert!((m.level(0, 1)[1] - 1.0).abs() < 1e-6);
        assert!((m.level(0, 1)[2] - 1.0).abs() < 1e-6);
        assert!((m.level(0, 1)[3] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalidity_propagates_to_level_2() {
        let mut m = make_map(8, 8);
        for c in 0..3 {
            m.level_mut(c, 0).fill(2.0);
        }
        // One invalid level-0 pixel at (0, 0) poisons level-1 (0, 0) and
        // thus level-2 (0, 0).
        m.level_mut(0, 0)[0] = INVALID;
        build_map_pyramid(&mut m, 3);
        assert_eq!(m.level(0, 1)[0], INVALID);
        assert_eq!(m.level(0, 2)[0], INVALID);
        // Channels without the invalid pixel are unaffected.
        assert!((m.level(1, 2)[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_constant_map_stays_constant() {
        let mut m = make_map(16, 16);
        for c in 0..3 {
            m.level_mut(c, 0).fill(7.0);
        }
        build_map_pyramid(&mut m, 3);
        for c in 0..3 {
            for l in 1..3 {
                assert!(
                    m.level(c, l).iter().all(|&v| (v - 7.0).abs() < 1e-6),
                    "channel {c} level {l} drifted"
                );
            }
        }
    }

    #[test]
    fn test_single_level_is_noop() {
        let mut m = make_map(4, 4);
        m.level_mut(0, 0).fill(3.0);
        build_map_pyramid(&mut m, 1);
        assert!(m.level(0, 1).iter().all(|&v| v == 0.0));
    }

    #[test]
    #[should_panic(expected = "num_levels")]
    fn test_zero_levels_panics() {
        let mut m = make_map(4, 4);
        build_map_pyramid(&mut m, 0);
    }
}
