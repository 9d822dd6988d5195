// gpu/mod.rs — wgpu compute mirror of the CPU preprocessing stages.
//
// Every kernel here mirrors a CPU module in the parent crate and is
// validated against it element-for-element in the `#[ignore]`d GPU tests.
// The CPU implementations remain the authoritative reference.
//
// Per-frame model: one controlling thread, one wgpu queue. Build calls
// encode and submit, then return — wgpu executes submissions in order, so
// later stages of the same frame observe earlier stages' storage-buffer
// writes without explicit fences. Host-visible consumption (readback,
// visualization) requires `synchronize()` first.

pub mod device;
pub mod buffers;
pub mod soa;
pub mod vmap;
pub mod pyramid;
pub mod nmap;
pub mod preprocess;
