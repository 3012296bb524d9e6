//! Device-offload engine: the whole fixed-iteration loop runs inside one
//! kernel dispatch, so the host pays a single submission round-trip
//! instead of one per iteration.

use log::debug;
use wgpu::{
    Backends, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    CommandEncoderDescriptor, ComputePassDescriptor, ComputePipelineDescriptor, Device,
    DeviceDescriptor, Features, Instance, PipelineLayoutDescriptor, PowerPreference, Queue,
    RequestAdapterOptions, ShaderModuleDescriptor, ShaderSource,
};

use crate::{
    image::SourceImage,
    structures::{AssignmentsBuffer, CentroidsBuffer, ParamsBuffer, PixelsBuffer, SeedsBuffer},
    utils::compute_work_group_count,
    ClusterSession, PaletteError,
};

const WORKGROUP_SIZE: u32 = 256;

/// A compute device with its queue, created once and reused across runs.
pub struct GpuContext {
    device: Device,
    queue: Queue,
}

impl GpuContext {
    /// Select a compute device and create the execution context. Fails
    /// with [`PaletteError::NoAdapter`] when no compatible device exists.
    ///
    /// ```rust,no_run
    /// use kmeans_palette::GpuContext;
    /// use pollster::FutureExt;
    ///
    /// let context = GpuContext::new().block_on();
    /// ```
    pub async fn new() -> Result<Self, PaletteError> {
        let instance = Instance::new(Backends::all());
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(PaletteError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: None,
                    features: Features::empty(),
                    limits: Default::default(),
                },
                None,
            )
            .await?;

        Ok(Self { device, queue })
    }
}

pub(crate) fn cluster(
    session: &mut ClusterSession,
    context: &GpuContext,
    image: &SourceImage,
) -> Result<(), PaletteError> {
    let device = &context.device;
    let queue = &context.queue;

    debug!("begin clustering on the compute device...");

    // Kernel argument order is fixed: pixels, centroids, assignments,
    // seeds, scalar params.
    let pixels_buffer = PixelsBuffer::new(device, image);
    let centroids_buffer = CentroidsBuffer::empty_centroids(session.k, device);
    let assignments_buffer = AssignmentsBuffer::new(device, image.pixel_count());
    let seeds_buffer = SeedsBuffer::new(device, &session.seeds);
    let params_buffer = ParamsBuffer::new(device, session.k, session.iterations, image);

    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("Cluster shader"),
        source: ShaderSource::Wgsl(include_str!("shaders/cluster.wgsl").into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("Cluster bind group layout"),
        entries: &[
            PixelsBuffer::layout(0),
            CentroidsBuffer::layout(1),
            AssignmentsBuffer::layout(2),
            SeedsBuffer::layout(3),
            ParamsBuffer::layout(4),
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("Cluster pipeline layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_compute_pipeline(&ComputePipelineDescriptor {
        label: Some("Cluster pipeline"),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: "main",
    });

    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("Cluster bind group"),
        layout: &bind_group_layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: pixels_buffer.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 1,
                resource: centroids_buffer.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 2,
                resource: assignments_buffer.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 3,
                resource: seeds_buffer.as_entire_binding(),
            },
            BindGroupEntry {
                binding: 4,
                resource: params_buffer.as_entire_binding(),
            },
        ],
    });

    // The dispatch is padded up to whole work groups; the kernel guards
    // out-of-range invocations, so every pixel is processed.
    let dispatch_size = compute_work_group_count(image.pixel_count() as u32, WORKGROUP_SIZE);
    debug!("dispatching {dispatch_size} work groups of {WORKGROUP_SIZE}");

    let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor { label: None });
    {
        let mut compute_pass = encoder.begin_compute_pass(&ComputePassDescriptor {
            label: Some("Cluster pass"),
        });
        compute_pass.set_pipeline(&pipeline);
        compute_pass.set_bind_group(0, &bind_group, &[]);
        compute_pass.dispatch_workgroups(dispatch_size, 1, 1);
    }
    queue.submit(Some(encoder.finish()));
    device.poll(wgpu::Maintain::Wait);

    session.centroids = centroids_buffer.pull_values(device, queue)?;
    session.assignments = assignments_buffer.pull_values(device, queue)?;

    debug!("end clustering...");
    session.log_centroids();

    Ok(())
}
