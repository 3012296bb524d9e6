//! Device buffer wrappers for the GPU engine.
//!
//! Each wrapper owns its [`wgpu::Buffer`]; dropping the wrappers in reverse
//! declaration order releases the device memory on success and on every
//! early error return alike. Read-backs are synchronous: copy into a
//! staging buffer, block on the map, then pull the bytes out.

use std::{ops::Deref, sync::mpsc::channel};

use wgpu::{
    util::{BufferInitDescriptor, DeviceExt},
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, BufferDescriptor, BufferUsages,
    CommandEncoderDescriptor, Device, MapMode, Queue, ShaderStages,
};

use crate::{image::SourceImage, sample::ColorSample, PaletteError};

fn storage_layout(binding: u32, read_only: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn read_back_words(
    device: &Device,
    queue: &Queue,
    buffer: &Buffer,
    size: u64,
) -> Result<Vec<u32>, PaletteError> {
    let staging_buffer = device.create_buffer(&BufferDescriptor {
        label: None,
        size,
        usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor { label: None });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging_buffer, 0, size);
    queue.submit(Some(encoder.finish()));

    let buffer_slice = staging_buffer.slice(..);
    let (sender, receiver) = channel();
    buffer_slice.map_async(MapMode::Read, move |v| {
        sender.send(v).expect("Couldn't send result");
    });

    device.poll(wgpu::Maintain::Wait);

    match receiver.recv() {
        Ok(Ok(())) => {
            let data = buffer_slice.get_mapped_range();
            let words = bytemuck::cast_slice::<u8, u32>(&data).to_vec();
            drop(data);
            staging_buffer.unmap();
            Ok(words)
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(PaletteError::ReadBack),
    }
}

/// The source pixel bytes, packed into u32 words and copied to the device
/// once. The kernel indexes bytes through the image's channel stride.
pub(crate) struct PixelsBuffer(Buffer);

impl PixelsBuffer {
    pub fn new(device: &Device, image: &SourceImage) -> Self {
        let mut bytes = image.bytes().to_vec();
        bytes.resize((bytes.len() + 3) / 4 * 4, 0);

        let buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("pixels buffer"),
            contents: &bytes,
            usage: BufferUsages::STORAGE,
        });

        Self(buffer)
    }

    pub fn layout(binding: u32) -> BindGroupLayoutEntry {
        storage_layout(binding, true)
    }
}

impl Deref for PixelsBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Per-cluster (r, g, b) storage, three words per cluster. The kernel
/// seeds it and rewrites it each iteration.
pub(crate) struct CentroidsBuffer {
    copy_size: u64,
    buffer: Buffer,
}

impl CentroidsBuffer {
    pub fn empty_centroids(k: u32, device: &Device) -> Self {
        let copy_size = u64::from(k) * 3 * 4;
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("centroids buffer"),
            size: copy_size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Self { copy_size, buffer }
    }

    pub fn layout(binding: u32) -> BindGroupLayoutEntry {
        storage_layout(binding, false)
    }

    pub fn pull_values(
        &self,
        device: &Device,
        queue: &Queue,
    ) -> Result<Vec<ColorSample>, PaletteError> {
        let words = read_back_words(device, queue, &self.buffer, self.copy_size)?;

        Ok(words
            .chunks_exact(3)
            .map(|channels| {
                ColorSample::new(channels[0] as i32, channels[1] as i32, channels[2] as i32)
            })
            .collect())
    }
}

impl Deref for CentroidsBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

/// One cluster index per pixel. Zero-initialized on creation, so entries
/// keep a valid cluster id even before the first assignment write.
pub(crate) struct AssignmentsBuffer {
    copy_size: u64,
    buffer: Buffer,
}

impl AssignmentsBuffer {
    pub fn new(device: &Device, pixel_count: usize) -> Self {
        let copy_size = pixel_count as u64 * 4;
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("assignments buffer"),
            size: copy_size,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Self { copy_size, buffer }
    }

    pub fn layout(binding: u32) -> BindGroupLayoutEntry {
        storage_layout(binding, false)
    }

    pub fn pull_values(&self, device: &Device, queue: &Queue) -> Result<Vec<u32>, PaletteError> {
        read_back_words(device, queue, &self.buffer, self.copy_size)
    }
}

impl Deref for AssignmentsBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

/// The seed vector: one pixel index per cluster, copied once, read-only.
pub(crate) struct SeedsBuffer(Buffer);

impl SeedsBuffer {
    pub fn new(device: &Device, seeds: &[u32]) -> Self {
        let buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("seeds buffer"),
            contents: bytemuck::cast_slice(seeds),
            usage: BufferUsages::STORAGE,
        });

        Self(buffer)
    }

    pub fn layout(binding: u32) -> BindGroupLayoutEntry {
        storage_layout(binding, true)
    }
}

impl Deref for SeedsBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Scalar kernel parameters, in the documented order: k, iterations,
/// width, height, channels, pixel count.
pub(crate) struct ParamsBuffer(Buffer);

impl ParamsBuffer {
    pub fn new(device: &Device, k: u32, iterations: u32, image: &SourceImage) -> Self {
        // Trailing zeros pad the struct to 16-byte alignment, see
        // https://www.w3.org/TR/WGSL/#address-space-layout-constraints
        let params = [
            k,
            iterations,
            image.width(),
            image.height(),
            image.channels(),
            image.pixel_count() as u32,
            0,
            0,
        ];

        let buffer = device.create_buffer_init(&BufferInitDescriptor {
            label: Some("params buffer"),
            contents: bytemuck::cast_slice(&params),
            usage: BufferUsages::UNIFORM,
        });

        Self(buffer)
    }

    pub fn layout(binding: u32) -> BindGroupLayoutEntry {
        BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }
}

impl Deref for ParamsBuffer {
    type Target = Buffer;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
