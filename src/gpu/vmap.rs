// gpu/vmap.rs — GPU vertex-map builder.
//
// Mirrors the CPU `vmap::build_vertex_map`: unprojects the device AOS
// depth buffer into level 0 of the packed vertex pyramid. The filter
// strategy is checked on the CPU before anything is encoded, so an
// unimplemented filter selection does no device work at all.

use wgpu::util::DeviceExt;

use crate::filter::{DepthFilter, FilterError};
use crate::intrinsics::Intrinsics;

use super::buffers::FrameBuffers;
use super::device::GpuDevice;
use super::soa::{storage_entry, uniform_entry};

/// Uniform block; layout must match `Params` in vmap.wgsl (48 bytes).
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    width: u32,
    height: u32,
    plane_stride: u32,
    _pad: u32,
    fx: f32,
    fy: f32,
    cx: f32,
    cy: f32,
    max_depth: f32,
    _pad1: f32,
    _pad2: f32,
    _pad3: f32,
}

/// Compiled depth→vertex pipeline.
pub struct VmapPipeline {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
}

impl VmapPipeline {
    pub fn new(gpu: &GpuDevice) -> Self {
        let shader_src = gpu
            .workgroup_size
            .specialize(include_str!("../shaders/vmap.wgsl"));
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("vmap.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Vmap BGL"),
                entries: &[
                    storage_entry(0, true),  // AOS depth
                    storage_entry(1, false), // vertex pyramid
                    uniform_entry(2),
                ],
            });

        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Vmap pipeline layout"),
                bind_group_layouts: &[&bgl],
                push_constant_ranges: &[],
            });

        let pipeline = gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("build_vmap"),
                layout: Some(&layout),
                module: &shader,
                entry_point: "build_vmap",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        VmapPipeline { pipeline, bgl }
    }

    /// Encode and submit one vertex-map build (level 0 only).
    ///
    /// Fails fast before any encoding when `filter` is a declared
    /// extension point with no implementation.
    pub fn dispatch(
        &self,
        gpu: &GpuDevice,
        bufs: &FrameBuffers,
        intr: &Intrinsics,
        filter: DepthFilter,
        max_depth: f32,
    ) -> Result<(), FilterError> {
        filter.ensure_implemented()?;

        let res = bufs.layout().resolution();
        let params = Params {
            width: res.width() as u32,
            height: res.height() as u32,
            plane_stride: bufs.layout().plane_len() as u32,
            _pad: 0,
            fx: intr.fx,
            fy: intr.fy,
            cx: intr.cx,
            cy: intr.cy,
            max_depth,
            _pad1: 0.0,
            _pad2: 0.0,
            _pad3: 0.0,
        };
        let params_buf = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Vmap params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Vmap bind group"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: bufs.depth_aos.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: bufs.vmap.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Vmap::dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("build_vmap"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (dx, dy) = gpu.dispatch_size(res.width() as u32, res.height() as u32);
            pass.dispatch_workgroups(dx, dy, 1);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
