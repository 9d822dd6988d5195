// gpu/buffers.rs — device buffer manager.
//
// Owns every accelerator-resident allocation of one pipeline instance:
//
//   color_aos  : P × rgba8 (read as u32 in WGSL)
//   depth_aos  : P × f32 meters
//   color_soa  : 3 planes × P × f32, packed
//   vmap, nmap : 3 planes × (P + P/4 + P/16) × f32, packed pyramid
//
// All five are created once at construction and never resized. Level and
// channel addressing comes exclusively from `PyramidLayout` — kernels
// receive element offsets in their uniform params and bind each map as a
// single storage buffer, so no offset arithmetic is duplicated anywhere.
//
// Allocation failure is fatal: `allocate` fences the device after
// creating the buffers and converts any parked out-of-memory error into
// `GpuError::Allocation`, and the caller abandons construction.

use crate::layout::PyramidLayout;

use super::device::{GpuDevice, GpuError};

const F32_SIZE: u64 = std::mem::size_of::<f32>() as u64;

/// All device-resident buffers of one pipeline instance.
pub struct FrameBuffers {
    layout: PyramidLayout,
    pub color_aos: wgpu::Buffer,
    pub depth_aos: wgpu::Buffer,
    pub color_soa: wgpu::Buffer,
    pub vmap: wgpu::Buffer,
    pub nmap: wgpu::Buffer,
    released: bool,
}

impl FrameBuffers {
    /// Perform every device allocation the SOA layout requires.
    ///
    /// Fails fatally (`GpuError::Allocation`) if the device cannot satisfy
    /// an allocation; nothing is usable on error.
    pub fn allocate(gpu: &GpuDevice, layout: PyramidLayout) -> Result<Self, GpuError> {
        let p = layout.resolution().pixel_count() as u64;

        let storage = |label: &str, bytes: u64| {
            gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };

        let bufs = FrameBuffers {
            layout,
            color_aos: storage("FrameBuffers::color_aos", p * 4),
            depth_aos: storage("FrameBuffers::depth_aos", p * F32_SIZE),
            color_soa: storage("FrameBuffers::color_soa", 3 * p * F32_SIZE),
            vmap: storage("FrameBuffers::vmap", layout.total_len() as u64 * F32_SIZE),
            nmap: storage("FrameBuffers::nmap", layout.total_len() as u64 * F32_SIZE),
            released: false,
        };

        // Surface out-of-memory now rather than at the first kernel.
        gpu.synchronize()
            .map_err(|e| GpuError::Allocation(e.to_string()))?;

        Ok(bufs)
    }

    pub fn layout(&self) -> PyramidLayout {
        self.layout
    }

    /// Free every owning allocation. Idempotent; also run by `Drop`, so an
    /// explicit call is only needed to release VRAM early.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.color_aos.destroy();
        self.depth_aos.destroy();
        self.color_soa.destroy();
        self.vmap.destroy();
        self.nmap.destroy();
        self.released = true;
    }

    // -----------------------------------------------------------------------
    // Readback (tests / debug)
    // -----------------------------------------------------------------------

    /// Read `len` f32 elements starting at element `offset` of a device
    /// buffer back to the CPU.
    ///
    /// **Expensive and synchronous** — stalls the GPU pipeline. Tests and
    /// offline debugging only, never the per-frame hot path.
    pub fn read_f32(
        &self,
        gpu: &GpuDevice,
        buffer: &wgpu::Buffer,
        offset: usize,
        len: usize,
    ) -> Vec<f32> {
        let byte_len = len as u64 * F32_SIZE;
        let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("FrameBuffers::read_f32"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("FrameBuffers::read_f32"),
            });
        encoder.copy_buffer_to_buffer(buffer, offset as u64 * F32_SIZE, &readback, 0, byte_len);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            tx.send(r).expect("readback channel closed");
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .expect("readback callback never fired")
            .expect("readback map failed");

        let mapped = slice.get_mapped_range();
        let out: Vec<f32> = bytemuck::cast_slice(&mapped).to_vec();
        drop(mapped);
        readback.unmap();
        out
    }

    /// Read one channel of one pyramid level of `vmap` or `nmap`.
    pub fn read_map_level(
        &self,
        gpu: &GpuDevice,
        buffer: &wgpu::Buffer,
        channel: usize,
        level: usize,
    ) -> Vec<f32> {
        let v = self.layout.view(channel, level);
        self.read_f32(gpu, buffer, v.offset, v.len)
    }
}

impl Drop for FrameBuffers {
    fn drop(&mut self) {
        self.release();
    }
}
