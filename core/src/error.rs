use thiserror::Error;

/// Failures surfaced by the clustering library.
///
/// Degenerate data (an empty cluster after an assignment phase) is handled
/// by policy and never reported through this type.
#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("cluster count {0} out of range [1, 256]")]
    ClusterCountOutOfRange(u32),

    #[error("iteration count {0} out of range [0, 128]")]
    IterationCountOutOfRange(u32),

    #[error("thread count {0} out of range [1, 64]")]
    ThreadCountOutOfRange(u32),

    #[error("seed count {found} does not match cluster count {k}")]
    SeedCountMismatch { k: u32, found: usize },

    #[error("seed index {index} out of bounds for {pixels} pixels")]
    SeedIndexOutOfBounds { index: u32, pixels: usize },

    #[error("pixel buffer length {len} does not match {width}x{height} with {channels} channels")]
    ImageDimensionMismatch {
        len: usize,
        width: u32,
        height: u32,
        channels: u32,
    },

    #[error("unsupported channel count {0}, expected at least 3")]
    UnsupportedChannelCount(u32),

    #[error("image has no pixels")]
    EmptyImage,

    #[error("couldn't build the worker pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("no compatible compute adapter found")]
    NoAdapter,

    #[error("couldn't create the compute device")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("device buffer read-back failed")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("device disconnected during buffer read-back")]
    ReadBack,
}
