// intrinsics.rs — pinhole camera model.
//
// Depth → camera-space unprojection and its inverse. No lens distortion:
// RGB-D sensors deliver depth already registered to a rectified grid.

/// Pinhole camera intrinsics: focal lengths and principal point, in pixels.
///
/// Supplied once at pipeline construction; immutable thereafter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    /// Focal length in pixels (x-axis).
    pub fx: f32,
    /// Focal length in pixels (y-axis).
    pub fy: f32,
    /// Principal point x (pixels).
    pub cx: f32,
    /// Principal point y (pixels).
    pub cy: f32,
}

impl Intrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Self {
        Intrinsics { fx, fy, cx, cy }
    }

    /// Unproject pixel (u, v) with depth `d` to a camera-space point.
    ///
    /// X = (u - cx) · d / fx
    /// Y = (v - cy) · d / fy
    /// Z = d
    ///
    /// Camera frame: X right, Y down, Z forward (along the optical axis,
    /// away from the sensor). Matches image coordinates: u grows with X,
    /// v grows with Y.
    #[inline]
    pub fn unproject(&self, u: f32, v: f32, d: f32) -> [f32; 3] {
        [(u - self.cx) * d / self.fx, (v - self.cy) * d / self.fy, d]
    }

    /// Project a camera-space point back to pixel coordinates.
    ///
    /// Inverse of [`unproject`](Self::unproject) for points with z > 0.
    #[inline]
    pub fn project(&self, p: [f32; 3]) -> (f32, f32) {
        (p[0] * self.fx / p[2] + self.cx, p[1] * self.fy / p[2] + self.cy)
    }

    /// Intrinsics for pyramid level `l`: focal lengths and principal point
    /// scale with resolution (each level halves both dimensions).
    ///
    /// Consumers projecting into coarse pyramid levels (coarse-to-fine
    /// alignment runs ICP at levels above 0) project with these, not the
    /// full-resolution intrinsics.
    pub fn at_level(&self, level: usize) -> Intrinsics {
        let s = 1.0 / (1 << level) as f32;
        Intrinsics {
            fx: self.fx * s,
            fy: self.fy * s,
            cx: self.cx * s,
            cy: self.cy * s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unproject_principal_point() {
        // The principal point unprojects straight down the optical axis.
        let intr = Intrinsics::new(525.0, 525.0, 319.5, 239.5);
        let p = intr.unproject(319.5, 239.5, 2.0);
        assert!(p[0].abs() < 1e-6);
        assert!(p[1].abs() < 1e-6);
        assert!((p[2] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_unproject_project_round_trip() {
        let intr = Intrinsics::new(525.0, 520.0, 319.5, 239.5);
        for &(u, v, d) in &[(0.0, 0.0, 0.5), (100.0, 200.0, 1.3), (639.0, 479.0, 4.9)] {
            let p = intr.unproject(u, v, d);
            let (u2, v2) = intr.project(p);
            assert!((u - u2).abs() < 1e-3, "u: {u} → {u2}");
            assert!((v - v2).abs() < 1e-3, "v: {v} → {v2}");
            assert!((p[2] - d).abs() < 1e-6);
        }
    }

    #[test]
    fn test_at_level_scales() {
        let intr = Intrinsics::new(520.0, 520.0, 320.0, 240.0);
        let l1 = intr.at_level(1);
        assert!((l1.fx - 260.0).abs() < 1e-6);
        assert!((l1.cx - 160.0).abs() < 1e-6);
        let l2 = intr.at_level(2);
        assert!((l2.fy - 130.0).abs() < 1e-6);
        assert!((l2.cy - 60.0).abs() < 1e-6);
    }
}
