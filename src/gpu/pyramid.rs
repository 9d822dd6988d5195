// gpu/pyramid.rs — GPU SOA map pyramid builder.
//
// Mirrors the CPU `pyramid::build_map_pyramid`. Generic over map type:
// the kernel sees only a packed storage buffer plus element offsets, so
// the same pipeline downsamples the vertex and the normal pyramid.
//
// One compute pass per level, submitted in one command buffer; wgpu's
// usage tracking orders the passes, so level 2 reads level 1's completed
// writes. gid.z selects the channel (dispatch depth 3).

use wgpu::util::DeviceExt;

use crate::layout::{NUM_CHANNELS, NUM_PYRAMID_LEVELS};

use super::buffers::FrameBuffers;
use super::device::GpuDevice;
use super::soa::{storage_entry, uniform_entry};

/// Uniform block; layout must match `Params` in map_pyramid.wgsl.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    src_base: u32,
    dst_base: u32,
    plane_stride: u32,
    _pad: u32,
}

/// Compiled downsample pipeline, shared by both map types.
pub struct MapPyramidPipeline {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
}

impl MapPyramidPipeline {
    pub fn new(gpu: &GpuDevice) -> Self {
        let shader_src = gpu
            .workgroup_size
            .specialize(include_str!("../shaders/map_pyramid.wgsl"));
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("map_pyramid.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("MapPyramid BGL"),
                entries: &[storage_entry(0, false), uniform_entry(1)],
            });

        let layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("MapPyramid pipeline layout"),
                bind_group_layouts: &[&bgl],
                push_constant_ranges: &[],
            });

        let pipeline = gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("downsample"),
                layout: Some(&layout),
                module: &shader,
                entry_point: "downsample",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        MapPyramidPipeline { pipeline, bgl }
    }

    /// Encode and submit the build of levels `1..num_levels` of `map`
    /// (one of `bufs.vmap` / `bufs.nmap`) from its level 0.
    pub fn dispatch(
        &self,
        gpu: &GpuDevice,
        bufs: &FrameBuffers,
        map: &wgpu::Buffer,
        num_levels: usize,
    ) {
        assert!(
            (1..=NUM_PYRAMID_LEVELS).contains(&num_levels),
            "num_levels must be in 1..={NUM_PYRAMID_LEVELS}"
        );
        let layout = bufs.layout();

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("MapPyramid::dispatch"),
            });

        for level in 1..num_levels {
            let (src_w, src_h) = layout.level_dims(level - 1);
            let (dst_w, dst_h) = layout.level_dims(level);
            let params = Params {
                src_width: src_w as u32,
                src_height: src_h as u32,
                dst_width: dst_w as u32,
                dst_height: dst_h as u32,
                src_base: layout.level_offset(level - 1) as u32,
                dst_base: layout.level_offset(level) as u32,
                plane_stride: layout.plane_len() as u32,
                _pad: 0,
            };
            let params_buf = gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("MapPyramid params"),
                    contents: bytemuck::bytes_of(&params),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("MapPyramid bind group"),
                layout: &self.bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: map.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: params_buf.as_entire_binding(),
                    },
                ],
            });

            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("downsample"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let (dx, dy) = gpu.dispatch_size(dst_w as u32, dst_h as u32);
            pass.dispatch_workgroups(dx, dy, NUM_CHANNELS as u32);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}
