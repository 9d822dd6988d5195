// gpu/preprocess.rs — per-frame preprocessing pipeline controller.
//
// Owns the device, every buffer, and one compiled pipeline per kernel.
// Pipelines are expensive to create (shader compilation) and are built
// once at construction; per-frame calls only encode and submit.
//
// STAGE ORDERING
// ───────────────
// Stages are independently callable (a host can interleave visualization
// or re-run a single stage), but their data dependencies are fixed:
//
//   push_frame ─► convert_color_to_soa
//              └► build_vertex_map ─► build_vertex_pyramid
//                                        └► build_normal_map ─► build_normal_pyramid
//
// Each stage returns a token that the next stage requires, so calling a
// stage before its input exists is a compile error, not a silent read of
// stale data. Tokens carry the frame generation; using a token from a
// previous frame trips a debug assertion.
//
// SYNCHRONIZATION
// ────────────────
// Build calls are fire-and-forget submissions on one queue; within a
// frame they execute in program order. `synchronize()` is the single
// fence: call it before host-side consumption of any buffer, and before
// `push_frame` when the previous frame still has external readers
// (single-buffered design — a new push overwrites the resident frame).

use crate::filter::{DepthFilter, FilterError};
use crate::frame::{ColorPixel, DepthPixel};
use crate::intrinsics::Intrinsics;
use crate::layout::{LevelView, PyramidLayout, Resolution, NUM_PYRAMID_LEVELS};

use super::buffers::FrameBuffers;
use super::device::{GpuDevice, GpuError};
use super::nmap::NmapPipeline;
use super::pyramid::MapPyramidPipeline;
use super::soa::ColorSoaPipeline;
use super::vmap::VmapPipeline;

// ---------------------------------------------------------------------------
// Stage tokens
// ---------------------------------------------------------------------------

/// Evidence that a frame is resident in the device AOS buffers.
#[derive(Debug)]
pub struct FrameStaged {
    frame: u64,
}

/// Evidence that level 0 of the vertex map is built for this frame.
#[derive(Debug)]
pub struct VertexMapBuilt {
    frame: u64,
}

/// Evidence that all requested vertex pyramid levels are built.
#[derive(Debug)]
pub struct VertexPyramidBuilt {
    frame: u64,
}

/// Evidence that normals are estimated for this frame.
#[derive(Debug)]
pub struct NormalMapBuilt {
    frame: u64,
}

// ---------------------------------------------------------------------------
// Preprocessor
// ---------------------------------------------------------------------------

/// The per-frame RGB-D preprocessing pipeline.
///
/// One instance exclusively owns its device buffers; exactly one frame is
/// resident at a time. A resolution change requires constructing a new
/// instance.
pub struct Preprocessor {
    gpu: GpuDevice,
    buffers: FrameBuffers,
    intr: Intrinsics,

    color_soa_pipe: ColorSoaPipeline,
    vmap_pipe: VmapPipeline,
    pyramid_pipe: MapPyramidPipeline,
    nmap_pipe: NmapPipeline,

    last_frame_time: i64,
    current_frame_time: i64,
    frame: u64,
    released: bool,
}

impl Preprocessor {
    /// Build the pipeline: device selection, shader compilation, and every
    /// device allocation. Fatal on bad resolution, missing adapter, or
    /// allocation failure — no partially constructed pipeline exists.
    pub fn new(width: usize, height: usize, intr: Intrinsics) -> Result<Self, GpuError> {
        let resolution =
            Resolution::new(width, height).ok_or(GpuError::InvalidResolution { width, height })?;
        let gpu = GpuDevice::new()?;
        Self::with_device(gpu, resolution, intr)
    }

    /// Same as [`new`](Self::new) with a caller-supplied device (tests
    /// share one device across cases to avoid repeated adapter setup).
    pub fn with_device(
        gpu: GpuDevice,
        resolution: Resolution,
        intr: Intrinsics,
    ) -> Result<Self, GpuError> {
        let layout = PyramidLayout::new(resolution);
        let buffers = FrameBuffers::allocate(&gpu, layout)?;

        let color_soa_pipe = ColorSoaPipeline::new(&gpu);
        let vmap_pipe = VmapPipeline::new(&gpu);
        let pyramid_pipe = MapPyramidPipeline::new(&gpu);
        let nmap_pipe = NmapPipeline::new(&gpu);

        Ok(Preprocessor {
            gpu,
            buffers,
            intr,
            color_soa_pipe,
            vmap_pipe,
            pyramid_pipe,
            nmap_pipe,
            last_frame_time: 0,
            current_frame_time: 0,
            frame: 0,
            released: false,
        })
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Copy one host frame into the device AOS buffers and advance the
    /// timestamp pair.
    ///
    /// The slices are staged before this returns; the caller may reuse its
    /// buffers immediately. Both slices must hold exactly one element per
    /// pixel — checked in debug builds only (documented precondition).
    ///
    /// No ordering is enforced on `timestamp`; the caller may supply a
    /// non-increasing value and downstream motion deltas will reflect it.
    pub fn push_frame(
        &mut self,
        color: &[ColorPixel],
        depth: &[DepthPixel],
        timestamp: i64,
    ) -> FrameStaged {
        let p = self.buffers.layout().resolution().pixel_count();
        debug_assert_eq!(color.len(), p, "color frame must have one pixel per element");
        debug_assert_eq!(depth.len(), p, "depth frame must have one pixel per element");

        self.last_frame_time = self.current_frame_time;
        self.current_frame_time = timestamp;
        self.frame += 1;

        self.gpu
            .queue
            .write_buffer(&self.buffers.color_aos, 0, bytemuck::cast_slice(color));
        self.gpu
            .queue
            .write_buffer(&self.buffers.depth_aos, 0, bytemuck::cast_slice(depth));

        FrameStaged { frame: self.frame }
    }

    // -----------------------------------------------------------------------
    // Build stages
    // -----------------------------------------------------------------------

    /// AOS→SOA color conversion for the staged frame. Re-run after every
    /// push; SOA planes are not invalidated automatically.
    pub fn convert_color_to_soa(&self, staged: &FrameStaged) {
        debug_assert_eq!(staged.frame, self.frame, "stale frame token");
        self.color_soa_pipe.dispatch(&self.gpu, &self.buffers);
    }

    /// Unproject the staged depth frame into level 0 of the vertex map.
    ///
    /// Samples outside `(0, max_depth]` get the invalid sentinel in all
    /// three channels. Unimplemented filter variants fail fast with no
    /// device work submitted.
    pub fn build_vertex_map(
        &self,
        staged: &FrameStaged,
        filter: DepthFilter,
        max_depth: f32,
    ) -> Result<VertexMapBuilt, FilterError> {
        debug_assert_eq!(staged.frame, self.frame, "stale frame token");
        self.vmap_pipe
            .dispatch(&self.gpu, &self.buffers, &self.intr, filter, max_depth)?;
        Ok(VertexMapBuilt { frame: staged.frame })
    }

    /// Downsample the vertex map into all coarser levels.
    pub fn build_vertex_pyramid(&self, vmap: &VertexMapBuilt) -> VertexPyramidBuilt {
        debug_assert_eq!(vmap.frame, self.frame, "stale frame token");
        self.pyramid_pipe
            .dispatch(&self.gpu, &self.buffers, &self.buffers.vmap, NUM_PYRAMID_LEVELS);
        VertexPyramidBuilt { frame: vmap.frame }
    }

    /// Estimate normals at levels `0..levels` from the vertex pyramid.
    ///
    /// With `levels == NUM_PYRAMID_LEVELS` every normal level is estimated
    /// directly from the matching vertex level and no normal-pyramid pass
    /// is needed; with `levels == 1` follow up with
    /// [`build_normal_pyramid`](Self::build_normal_pyramid).
    pub fn build_normal_map(&self, pyr: &VertexPyramidBuilt, levels: usize) -> NormalMapBuilt {
        debug_assert_eq!(pyr.frame, self.frame, "stale frame token");
        self.nmap_pipe.dispatch(&self.gpu, &self.buffers, levels);
        NormalMapBuilt { frame: pyr.frame }
    }

    /// Downsample normal level 0 into the coarser normal levels,
    /// overwriting any per-level estimates there. Mean-of-4 with
    /// invalidity propagation; means are not re-normalized.
    pub fn build_normal_pyramid(&self, nmap: &NormalMapBuilt) {
        debug_assert_eq!(nmap.frame, self.frame, "stale frame token");
        self.pyramid_pipe
            .dispatch(&self.gpu, &self.buffers, &self.buffers.nmap, NUM_PYRAMID_LEVELS);
    }

    // -----------------------------------------------------------------------
    // Synchronization / lifecycle
    // -----------------------------------------------------------------------

    /// Fence: block until all submitted stages complete and surface any
    /// accelerator error raised since the last fence. Required before any
    /// non-accelerator consumer reads the buffers.
    pub fn synchronize(&self) -> Result<(), GpuError> {
        self.gpu.synchronize()
    }

    /// Clear the timestamp pair (new recording session, same buffers).
    pub fn reset(&mut self) {
        self.last_frame_time = 0;
        self.current_frame_time = 0;
    }

    /// Release all device memory. Idempotent; also run on drop. After
    /// release, no build stage may be called.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.buffers.release();
        self.released = true;
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn layout(&self) -> PyramidLayout {
        self.buffers.layout()
    }

    pub fn intrinsics(&self) -> Intrinsics {
        self.intr
    }

    /// Timestamp of the resident frame.
    pub fn current_frame_time(&self) -> i64 {
        self.current_frame_time
    }

    /// Timestamp of the previously resident frame.
    pub fn last_frame_time(&self) -> i64 {
        self.last_frame_time
    }

    pub fn gpu(&self) -> &GpuDevice {
        &self.gpu
    }

    // Visualization boundary: read-only views of the SOA buffers. An
    // external renderer addresses them via `LevelView` byte offsets; the
    // core never writes display-owned memory.

    pub fn vmap_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.vmap
    }

    pub fn nmap_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.nmap
    }

    pub fn color_soa_buffer(&self) -> &wgpu::Buffer {
        &self.buffers.color_soa
    }

    /// Descriptor for one channel/level of either map buffer.
    pub fn map_view(&self, channel: usize, level: usize) -> LevelView {
        self.buffers.layout().view(channel, level)
    }

    // Expensive synchronous readbacks — tests and debug tools only.

    pub fn readback_vmap_level(&self, channel: usize, level: usize) -> Vec<f32> {
        self.buffers
            .read_map_level(&self.gpu, &self.buffers.vmap, channel, level)
    }

    pub fn readback_nmap_level(&self, channel: usize, level: usize) -> Vec<f32> {
        self.buffers
            .read_map_level(&self.gpu, &self.buffers.nmap, channel, level)
    }

    pub fn readback_color_soa(&self) -> Vec<f32> {
        let p = self.buffers.layout().resolution().pixel_count();
        self.buffers
            .read_f32(&self.gpu, &self.buffers.color_soa, 0, 3 * p)
    }
}

impl Drop for Preprocessor {
    fn drop(&mut self) {
        self.release();
    }
}

// ============================================================
// GPU agreement tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RgbdFrame;
    use crate::nmap::build_normal_map;
    use crate::pyramid::build_map_pyramid;
    use crate::soa::{color_to_soa, SoaColor, SoaPyramid};
    use crate::vmap::{build_vertex_map, is_valid, INVALID};

    // GPU tests are `#[ignore]`d so `cargo test` passes without Vulkan.
    // Run with: cargo test -- --include-ignored

    const W: usize = 64;
    const H: usize = 48;

    fn test_intrinsics() -> Intrinsics {
        Intrinsics::new(50.0, 50.0, W as f32 / 2.0, H as f32 / 2.0)
    }

    fn make_pre() -> Preprocessor {
        Preprocessor::new(W, H, test_intrinsics()).expect("need Vulkan GPU")
    }

    /// A frame with structure: depth ramp plus a block of sensor dropouts.
    fn test_frame() -> RgbdFrame {
        let res = Resolution::new(W, H).unwrap();
        let mut f = RgbdFrame::ramp(res, 0.8, 3.2);
        for v in 10..14 {
            for u in 20..26 {
                f.depth[v * W + u] = DepthPixel::new(0.0);
            }
        }
        f
    }

    fn assert_levels_eq(gpu_level: &[f32], cpu_level: &[f32], what: &str) {
        assert_eq!(gpu_level.len(), cpu_level.len());
        for (i, (g, c)) in gpu_level.iter().zip(cpu_level).enumerate() {
            assert!(
                (g - c).abs() < 1e-4 || (*g == INVALID && *c == INVALID),
                "{what}: GPU {g} != CPU {c} at element {i}"
            );
        }
    }

    #[test]
    #[ignore = "requires a real Vulkan GPU"]
    fn test_color_soa_matches_cpu() {
        let mut pre = make_pre();
        let frame = test_frame();
        let staged = pre.push_frame(&frame.color, &frame.depth, 1);
        pre.convert_color_to_soa(&staged);
        pre.synchronize().unwrap();

        let mut cpu = SoaColor::new(W * H);
        color_to_soa(&frame.color, &mut cpu);
        assert_levels_eq(&pre.readback_color_soa(), cpu.as_slice(), "color SOA");
    }

    #[test]
    #[ignore = "requires a real Vulkan GPU"]
    fn test_full_pipeline_matches_cpu() {
        let mut pre = make_pre();
        let frame = test_frame();
        let intr = test_intrinsics();

        let staged = pre.push_frame(&frame.color, &frame.depth, 1);
        let vmap = pre.build_vertex_map(&staged, DepthFilter::None, 5.0).unwrap();
        let pyr = pre.build_vertex_pyramid(&vmap);
        let _nmap = pre.build_normal_map(&pyr, NUM_PYRAMID_LEVELS);
        pre.synchronize().unwrap();

        // CPU reference of the same frame.
        let layout = pre.layout();
        let mut cpu_vmap = SoaPyramid::new(layout);
        build_vertex_map(&frame.depth_values(), &intr, DepthFilter::None, 5.0, &mut cpu_vmap)
            .unwrap();
        build_map_pyramid(&mut cpu_vmap, NUM_PYRAMID_LEVELS);
        let mut cpu_nmap = SoaPyramid::new(layout);
        build_normal_map(&cpu_vmap, &mut cpu_nmap, NUM_PYRAMID_LEVELS);

        for c in 0..3 {
            for l in 0..NUM_PYRAMID_LEVELS {
                assert_levels_eq(
                    &pre.readback_vmap_level(c, l),
                    cpu_vmap.level(c, l),
                    &format!("vmap channel {c} level {l}"),
                );
                assert_levels_eq(
                    &pre.readback_nmap_level(c, l),
                    cpu_nmap.level(c, l),
                    &format!("nmap channel {c} level {l}"),
                );
            }
        }
    }

    #[test]
    #[ignore = "requires a real Vulkan GPU"]
    fn test_dropout_region_invalid_on_gpu() {
        let mut pre = make_pre();
        let frame = test_frame();
        let staged = pre.push_frame(&frame.color, &frame.depth, 1);
        let vmap = pre.build_vertex_map(&staged, DepthFilter::None, 5.0).unwrap();
        let _pyr = pre.build_vertex_pyramid(&vmap);
        pre.synchronize().unwrap();

        let z0 = pre.readback_vmap_level(2, 0);
        assert_eq!(z0[11 * W + 22], INVALID, "dropout pixel should be invalid");
        assert!(is_valid(z0[0]), "corner pixel should be valid");
        // Level 1: the dropout block's parents are invalid.
        let z1 = pre.readback_vmap_level(2, 1);
        assert_eq!(z1[5 * (W / 2) + 11], INVALID);
    }

    #[test]
    #[ignore = "requires a real Vulkan GPU"]
    fn test_unimplemented_filter_submits_nothing() {
        let mut pre = make_pre();
        let frame = test_frame();
        let staged = pre.push_frame(&frame.color, &frame.depth, 1);
        let r = pre.build_vertex_map(&staged, DepthFilter::Gaussian { sigma: 1.5 }, 5.0);
        assert!(r.is_err());
        pre.synchronize().unwrap(); // nothing was submitted, nothing to fail
    }

    #[test]
    #[ignore = "requires a real Vulkan GPU"]
    fn test_timestamps_shift() {
        let mut pre = make_pre();
        let frame = test_frame();
        assert_eq!(pre.current_frame_time(), 0);
        pre.push_frame(&frame.color, &frame.depth, 100);
        assert_eq!(pre.current_frame_time(), 100);
        assert_eq!(pre.last_frame_time(), 0);
        pre.push_frame(&frame.color, &frame.depth, 140);
        assert_eq!(pre.current_frame_time(), 140);
        assert_eq!(pre.last_frame_time(), 100);
        // Permissive by design: non-increasing timestamps are accepted.
        pre.push_frame(&frame.color, &frame.depth, 90);
        assert_eq!(pre.current_frame_time(), 90);
        assert_eq!(pre.last_frame_time(), 140);
        pre.reset();
        assert_eq!(pre.current_frame_time(), 0);
        assert_eq!(pre.last_frame_time(), 0);
    }

    #[test]
    #[ignore = "requires a real Vulkan GPU"]
    #[should_panic(expected = "one pixel per element")]
    fn test_short_color_buffer_is_precondition_violation() {
        // A color buffer of length P-1 is a caller-contract violation,
        // not a graceful error: caught by the debug assertion here, UB in
        // release builds (documented precondition).
        let mut pre = make_pre();
        let frame = test_frame();
        pre.push_frame(&frame.color[..W * H - 1], &frame.depth, 1);
    }

    #[test]
    #[ignore = "requires a real Vulkan GPU"]
    fn test_release_idempotent() {
        let mut pre = make_pre();
        pre.release();
        pre.release(); // second call is a no-op, drop will be a third
    }

    #[test]
    fn test_invalid_resolution_rejected() {
        // Resolution is validated before any device work, so this runs
        // without Vulkan.
        assert!(matches!(
            Preprocessor::new(641, 480, test_intrinsics()),
            Err(GpuError::InvalidResolution { .. })
        ));
        assert!(matches!(
            Preprocessor::new(0, 480, test_intrinsics()),
            Err(GpuError::InvalidResolution { .. })
        ));
    }
}
