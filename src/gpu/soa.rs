// gpu/soa.rs — GPU color AOS→SOA conversion.
//
// Mirrors the CPU `soa::color_to_soa`. Must be re-dispatched after every
// ingestion; the SOA planes are not invalidated automatically when a new
// frame lands in the AOS buffer.

use wgpu::util::DeviceExt;

use super::buffers::FrameBuffers;
use super::device::GpuDevice;

/// Uniform block; layout must match `Params` in color_soa.wgsl.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    width: u32,
    height: u32,
    plane_stride: u32,
    _pad: u32,
}

/// Compiled AOS→SOA color pipeline. Create once, dispatch every frame.
pub struct ColorSoaPipeline {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
}

impl ColorSoaPipeline {
    pub fn new(gpu: &GpuDevice) -> Self {
        let shader_src = gpu
            .workgroup_size
            .specialize(include_str!("../shaders/color_soa.wgsl"));
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("color_soa.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("ColorSoa BGL"),
                entries: &[
                    storage_entry(0, true),  // AOS color, read-only
                    storage_entry(1, false), // SOA planes, read-write
                    uniform_entry(2),
                ],
            });

        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("ColorSoa pipeline layout"),
                bind_group_layouts: &[&bgl],
                push_constant_ranges: &[],
            });

        let pipeline = gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("color_to_soa"),
                layout: Some(&layout),
                module: &shader,
                entry_point: "color_to_soa",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        ColorSoaPipeline { pipeline, bgl }
    }

    /// Encode and submit one conversion of the current AOS color buffer.
    /// Fire-and-forget; fence with `GpuDevice::synchronize` before host
    /// reads.
    pub fn dispatch(&self, gpu: &GpuDevice, bufs: &FrameBuffers) {
        let res = bufs.layout().resolution();
        let params = Params {
            width: res.width() as u32,
            height: res.height() as u32,
            plane_stride: res.pixel_count() as u32,
            _pad: 0,
        };
        let params_buf = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("ColorSoa params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ColorSoa bind group"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: bufs.color_aos.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: bufs.color_soa.as_entire_binding(),
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
                label: Some("ColorSoa::dispatch"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("color_to_soa"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (dx, dy) = gpu.dispatch_size(res.width() as u32, res.height() as u32);
            pass.dispatch_workgroups(dx, dy, 1);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}

// Shared BGL entry helpers for all compute pipelines in this crate.

pub(crate) fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
