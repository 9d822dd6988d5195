// Comet: per-frame geometric preprocessing for real-time RGB-D reconstruction.
// CPU reference implementation + wgpu compute mirror.
//
// Reference: Newcombe et al. — "KinectFusion: Real-Time Dense Surface
// Mapping and Tracking" (ISMAR 2011), preprocessing stage.
//
// Per-frame dataflow:
//
//   push_frame ──► AOS color ──► SOA color planes
//              └─► AOS depth ──► vertex map L0 ──► vertex pyramid L1,L2
//                                                        │
//                                 normal map per level ◄─┘ ──► normal pyramid
//
// The CPU modules below are the authoritative reference — every GPU kernel
// in `gpu::*` is validated against them pixel-for-pixel.

pub mod layout;
pub mod intrinsics;
pub mod frame;
pub mod filter;
pub mod soa;
pub mod vmap;
pub mod pyramid;
pub mod nmap;

pub mod gpu;
