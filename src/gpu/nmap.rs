// gpu/nmap.rs — GPU normal-map builder.
//
// Mirrors the CPU `nmap::build_normal_map`: per-level cross-product
// normals from the vertex pyramid, one compute pass per level. Reads only
// already-built vertex levels; never builds the vertex pyramid itself.

use wgpu::util::DeviceExt;

use crate::layout::NUM_PYRAMID_LEVELS;

use super::buffers::FrameBuffers;
use super::device::GpuDevice;
use super::soa::{storage_entry, uniform_entry};

/// Uniform block; layout must match `Params` in nmap.wgsl.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    width: u32,
    height: u32,
    level_base: u32,
    plane_stride: u32,
}

/// Compiled normal-estimation pipeline.
pub struct NmapPipeline {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
}

impl NmapPipeline {
    pub fn new(gpu: &GpuDevice) -> Self {
        let shader_src = gpu
            .workgroup_size
            .specialize(include_str!("../shaders/nmap.wgsl"));
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("nmap.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Nmap BGL"),
                entries: &[
                    storage_entry(0, true),  // vertex pyramid
                    storage_entry(1, false), // normal pyramid
                    uniform_entry(2),
                ],
            });

        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Nmap pipeline layout"),
                bind_group_layouts: &[&bgl],
                push_constant_ranges: &[],
            });

        let pipeline = gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("build_normals"),
                layout: Some(&layout),
                module: &shader,
                entry_point: "build_normals",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        NmapPipeline { pipeline, bgl }
    }

    /// Encode and submit normal estimation at levels `0..levels`.
    pub fn dispatch(&self, gpu: &GpuDevice, bufs: &FrameBuffers, levels: usize) {
        assert!(
            (1..=NUM_PYRAMID_LEVELS).contains(&levels),
            "levels must be in 1..={NUM_PYRAMID_LEVELS}"
        );
        let layout = bufs.layout();

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Nmap::dispatch"),
            });

        for level in 0..levels {
            let (w, h) = layout.level_dims(level);
            let params = Params {
                width: w as u32,
                height: h as u32,
                level_base: layout.level_offset(level) as u32,
                plane_stride: layout.plane_len() as u32,
            };
            let params_buf = gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Nmap params"),
                    contents: bytemuck::bytes_of(&params),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Nmap bind group"),
                layout: &self.bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: bufs.vmap.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: bufs.nmap.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: params_buf.as_entire_binding(),
                    },
                ],
            });

            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("build_normals"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (dx, dy) = gpu.dispatch_size(w as u32, h as u32);
            pass.dispatch_workgroups(dx, dy, 1);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}
