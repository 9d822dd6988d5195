// gpu/device.rs — wgpu device abstraction.
//
// Responsibilities:
//   - Enumerate Vulkan adapters and select the first non-CPU one.
//   - Provide `WorkgroupSize` and ceiling-division dispatch sizing.
//   - Expose the `synchronize()` fence the rest of the crate relies on:
//     build calls are fire-and-forget submissions; `synchronize()` blocks
//     until the queue drains and surfaces any accelerator error that was
//     raised since the last fence.
//
// ADAPTER SELECTION:
// wgpu's default `request_adapter` power-preference heuristics can grab
// llvmpipe/softpipe where a software renderer appears as a valid Vulkan
// device. We enumerate explicitly and prefer real hardware, falling back
// to whatever exists only as a last resort.
//
// ERROR CAPTURE:
// wgpu reports validation and out-of-memory errors asynchronously through
// the device's uncaptured-error handler. We park the first such error in a
// slot; `synchronize()` drains the slot and converts it into
// `GpuError::Device`. Errors are therefore never silently swallowed — they
// surface at the next fence, and the documented remedy is tearing down and
// reconstructing the pipeline (partially-written storage buffers are not
// safe to resubmit into).

use std::fmt;
use std::sync::{Arc, Mutex};

/// A workgroup configuration for 2D compute dispatches.
///
/// Injected into WGSL via the `{{WG_X}}`/`{{WG_Y}}` placeholder tokens in
/// each shader source (naga does not yet support `override` expressions
/// inside `@workgroup_size`, so the dimensions are baked into the source
/// at pipeline creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    /// 16×8 = 128 invocations — comfortably inside every desktop and
    /// embedded Vulkan implementation's limits.
    pub fn default_2d() -> Self {
        WorkgroupSize { x: 16, y: 8 }
    }

    /// Total invocations per workgroup.
    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Substitute the placeholder tokens into a WGSL shader template.
    pub fn specialize(&self, template: &str) -> String {
        template
            .replace("{{WG_X}}", &self.x.to_string())
            .replace("{{WG_Y}}", &self.y.to_string())
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.x, self.y)
    }
}

/// Basic adapter identity, kept for logging and diagnostics.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.device_type, self.backend)
    }
}

// ---------------------------------------------------------------------------
// GpuDevice
// ---------------------------------------------------------------------------

/// Handle to the compute device: wgpu device + queue, the selected
/// workgroup size, and the parked-error slot drained by `synchronize()`.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    error_slot: Arc<Mutex<Option<String>>>,
    // Keep the instance alive for the lifetime of the device.
    _instance: wgpu::Instance,
}

impl GpuDevice {
    /// Create a `GpuDevice` using the first non-CPU Vulkan adapter found.
    pub fn new() -> Result<Self, GpuError> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> Result<Self, GpuError> {
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
                | wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        } else {
            wgpu::InstanceFlags::ALLOW_UNDERLYING_NONCOMPLIANT_ADAPTER
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN,
            flags,
            ..Default::default()
        });

        let all_adapters: Vec<wgpu::Adapter> = instance
            .enumerate_adapters(wgpu::Backends::VULKAN)
            .into_iter()
            .collect();

        if all_adapters.is_empty() {
            return Err(GpuError::NoSuitableAdapter);
        }

        for a in &all_adapters {
            let info = a.get_info();
            eprintln!(
                "[comet] Vulkan adapter: {} ({:?}, {:?})",
                info.name, info.backend, info.device_type
            );
        }

        // Tier 1: real or virtual hardware. Tier 2 (last resort): anything,
        // even a software rasterizer — the adapter name is logged above so
        // the operator knows what they got.
        let adapter = all_adapters
            .into_iter()
            .find(|a| {
                matches!(
                    a.get_info().device_type,
                    wgpu::DeviceType::DiscreteGpu
                        | wgpu::DeviceType::IntegratedGpu
                        | wgpu::DeviceType::VirtualGpu
                        | wgpu::DeviceType::Other
                )
            })
            .or_else(|| {
                instance
                    .enumerate_adapters(wgpu::Backends::VULKAN)
                    .into_iter()
                    .next()
            })
            .ok_or(GpuError::NoSuitableAdapter)?;

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name.clone(),
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("comet-rgbd"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(GpuError::DeviceRequest)?;

        // Park the first uncaptured error (validation, OOM); synchronize()
        // drains it. Later errors are dropped — after the first failure the
        // pipeline instance is already condemned.
        let error_slot: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&error_slot);
        device.on_uncaptured_error(Box::new(move |e: wgpu::Error| {
            let mut guard = slot.lock().unwrap();
            if guard.is_none() {
                *guard = Some(e.to_string());
            }
        }));

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            workgroup_size: WorkgroupSize::default_2d(),
            error_slot,
            _instance: instance,
        })
    }

    /// Workgroup counts covering a `w`×`h` pixel grid, by ceiling division.
    ///
    /// Shaders must guard against out-of-bounds global IDs:
    /// ```wgsl
    /// if (gid.x >= width || gid.y >= height) { return; }
    /// ```
    pub fn dispatch_size(&self, w: u32, h: u32) -> (u32, u32) {
        let dx = (w + self.workgroup_size.x - 1) / self.workgroup_size.x;
        let dy = (h + self.workgroup_size.y - 1) / self.workgroup_size.y;
        (dx, dy)
    }

    /// Block until all submitted work has completed, then surface any
    /// accelerator error raised since the previous fence.
    ///
    /// This is THE synchronization point of the crate: call it before any
    /// non-accelerator code reads the device buffers, and before pushing a
    /// new frame if the previous frame's consumers are still reading.
    pub fn synchronize(&self) -> Result<(), GpuError> {
        self.device.poll(wgpu::Maintain::Wait);
        match self.error_slot.lock().unwrap().take() {
            None => Ok(()),
            Some(msg) => Err(GpuError::Device(msg)),
        }
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, workgroup: {} }}",
            self.adapter_info, self.workgroup_size
        )
    }
}

// ============================================================
// Error type
// ============================================================

/// Errors from device initialization, allocation and synchronization.
///
/// All of these are fatal to the pipeline instance: there is no retry
/// path, only teardown and reconstruction.
#[derive(Debug)]
pub enum GpuError {
    /// Resolution was zero or not a multiple of 4 in either dimension.
    InvalidResolution { width: usize, height: usize },
    /// No Vulkan adapter found. Check that Vulkan is installed and
    /// `vulkaninfo` lists a device.
    NoSuitableAdapter,
    /// wgpu device request failed (driver issue, unsupported limits).
    DeviceRequest(wgpu::RequestDeviceError),
    /// Device buffer allocation failed at pipeline construction.
    Allocation(String),
    /// An accelerator error (validation or out-of-memory) surfaced at a
    /// synchronization point. The pipeline instance must be torn down.
    Device(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::InvalidResolution { width, height } => write!(
                f,
                "invalid resolution {width}×{height}: both dimensions must be \
                 positive multiples of 4"
            ),
            GpuError::NoSuitableAdapter => write!(
                f,
                "no Vulkan adapter found (is Vulkan installed? does \
                 `vulkaninfo` list a device?)"
            ),
            GpuError::DeviceRequest(e) => write!(f, "device request failed: {e}"),
            GpuError::Allocation(msg) => write!(f, "device allocation failed: {msg}"),
            GpuError::Device(msg) => write!(f, "accelerator error at sync point: {msg}"),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::DeviceRequest(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================
// Tests
// ============================================================
