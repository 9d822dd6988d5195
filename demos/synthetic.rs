// demos/synthetic.rs — full GPU pipeline on a synthetic frame.
//
// Requires a Vulkan device:
//   cargo run --example synthetic
//
// Pushes a depth ramp with a dropout block, runs every preprocessing
// stage, fences, and prints per-level validity statistics from readback.

use comet_rgbd::filter::DepthFilter;
use comet_rgbd::frame::{DepthPixel, RgbdFrame};
use comet_rgbd::gpu::preprocess::Preprocessor;
use comet_rgbd::intrinsics::Intrinsics;
use comet_rgbd::layout::{Resolution, NUM_PYRAMID_LEVELS};
use comet_rgbd::vmap::is_valid;

const W: usize = 640;
const H: usize = 480;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let intr = Intrinsics::new(525.0, 525.0, 319.5, 239.5);
    let mut pre = Preprocessor::new(W, H, intr)?;
    println!("{}", pre.gpu());

    // Depth ramp 0.5–4.5 m with a 40×40 dropout block in the middle.
    let res = Resolution::new(W, H).unwrap();
    let mut frame = RgbdFrame::ramp(res, 0.5, 4.5);
    for v in 220..260 {
        for u in 300..340 {
            frame.depth[v * W + u] = DepthPixel::new(0.0);
        }
    }

    let staged = pre.push_frame(&frame.color, &frame.depth, 33_000_000);
    pre.convert_color_to_soa(&staged);
    let vmap = pre.build_vertex_map(&staged, DepthFilter::None, 5.0)?;
    let pyr = pre.build_vertex_pyramid(&vmap);
    let _nmap = pre.build_normal_map(&pyr, NUM_PYRAMID_LEVELS);
    pre.synchronize()?;

    for level in 0..NUM_PYRAMID_LEVELS {
        let z = pre.readback_vmap_level(2, level);
        let nz = pre.readback_nmap_level(2, level);
        let valid_v = z.iter().filter(|&&v| is_valid(v)).count();
        let valid_n = nz.iter().filter(|&&v| is_valid(v)).count();
        let (w, h) = pre.layout().level_dims(level);
        println!(
            "level {level} ({w}×{h}): {valid_v}/{} valid vertices, {valid_n}/{} valid normals",
            z.len(),
            nz.len(),
        );
    }

    Ok(())
}
