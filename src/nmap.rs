// nmap.rs — CPU normal-map builder.
//
// Per-pixel surface normal from the cross product of two tangent vectors
// taken from the right and down vertex-map neighbors. Computed at any
// subset of already-built vertex pyramid levels; never builds the vertex
// pyramid itself.
//
// SIGN CONVENTION
// ────────────────
// Camera frame: X right, Y down, Z forward. With
//   du = V(u+1, v) − V(u, v)   (tangent along +X)
//   dv = V(u, v+1) − V(u, v)   (tangent along +Y)
// the normal is n = normalize(dv × du). For a frontoparallel surface
// du ∝ +X and dv ∝ +Y, so dv × du ∝ −Z: normals consistently face the
// sensor.

use crate::layout::NUM_PYRAMID_LEVELS;
use crate::soa::SoaPyramid;
use crate::vmap::{is_valid, INVALID};

/// Cross products with magnitude below this are treated as degenerate
/// (parallel or near-zero tangents) and produce an invalid normal.
pub const DEGENERATE_EPS: f32 = 1e-12;

/// Estimate normals at levels `0..levels` of `nmap` from the corresponding
/// levels of `vmap`.
///
/// Both maps must share a layout. A pixel's normal is invalid (sentinel in
/// all channels) when the pixel itself, its right neighbor, or its down
/// neighbor is invalid, when either neighbor is out of bounds (last column
/// and row), or when the cross product is degenerate.
pub fn build_normal_map(vmap: &SoaPyramid, nmap: &mut SoaPyramid, levels: usize) {
    assert!(
        (1..=NUM_PYRAMID_LEVELS).contains(&levels),
        "levels must be in 1..={NUM_PYRAMID_LEVELS}"
    );
    assert_eq!(vmap.layout(), nmap.layout(), "vmap and nmap layouts must match");

    for level in 0..levels {
        let (w, h) = vmap.layout().level_dims(level);
        for v in 0..h {
            for u in 0..w {
                let n = normal_at(vmap, level, u, v, w, h);
                nmap.set_pixel(level, u, v, n);
            }
        }
    }
}

fn normal_at(vmap: &SoaPyramid, level: usize, u: usize, v: usize, w: usize, h: usize) -> [f32; 3] {
    // Right/down neighbors leave the last column and row without a normal.
    if u + 1 >= w || v + 1 >= h {
        return [INVALID; 3];
    }
    let center = vmap.pixel(level, u, v);
    let right = vmap.pixel(level, u + 1, v);
    let down = vmap.pixel(level, u, v + 1);
    // One comparison per pixel suffices: invalid vertices carry the
    // sentinel in every channel.
    if !is_valid(center[0]) || !is_valid(right[0]) || !is_valid(down[0]) {
        return [INVALID; 3];
    }

    let du = sub(right, center);
    let dv = sub(down, center);
    let n = cross(dv, du);
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len < DEGENERATE_EPS {
        return [INVALID; 3];
    }
    [n[0] / len, n[1] / len, n[2] / len]
}

// Tiny 3-vector helpers.

#[inline]
fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
