//! Reduces an image's color palette to `k` representative colors.
//!
//! A [`ClusterSession`] runs a fixed number of k-means iterations over the
//! pixels of a [`SourceImage`], producing `k` centroid colors and a
//! per-pixel cluster assignment. Three engines execute the same algorithm:
//! one thread ([`Engine::Sequential`]), a worker pool
//! ([`Engine::Threaded`]), or a compute device ([`Engine::Gpu`]).
//! [`render_palette`] then substitutes every pixel with its cluster's
//! centroid color.
//!
//! ```rust,no_run
//! use kmeans_palette::{reduce, Engine, SourceImage};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! # fn main() -> Result<(), kmeans_palette::PaletteError> {
//! let data = vec![0u8; 16 * 16 * 4];
//! let image = SourceImage::new(16, 16, 4, &data)?;
//! let mut rng = StdRng::seed_from_u64(42);
//! let reduced = reduce(&image, 8, 16, Engine::Threaded(4), &mut rng)?;
//! # Ok(())
//! # }
//! ```

use log::{debug, info};
use rand::Rng;

mod error;
mod gpu;
mod render;
mod sample;
mod sequential;
mod structures;
mod threaded;
mod utils;

pub mod image;

pub use error::PaletteError;
pub use gpu::GpuContext;
pub use image::SourceImage;
pub use render::render_palette;
pub use rgb::RGBA8;
pub use sample::ColorSample;

use image::Image;

pub const MAX_CLUSTERS: u32 = 256;
pub const MAX_ITERATIONS: u32 = 128;
pub const MAX_THREADS: u32 = 64;

/// Execution strategy for one clustering run. Strategies are never mixed
/// within a run.
#[derive(Clone, Copy)]
pub enum Engine<'a> {
    /// Single thread, fully synchronous.
    Sequential,
    /// Shared-memory worker pool with the given thread count (1 to 64).
    Threaded(u32),
    /// Single kernel dispatch on the given compute device.
    Gpu(&'a GpuContext),
}

/// One clustering run: the cluster count, the iteration count, the seed
/// pixel indices, and the output arrays the engines fill in.
///
/// The centroid array always holds `k` entries and the assignment table
/// always holds one entry per source pixel, every value below `k`.
pub struct ClusterSession {
    pub(crate) k: u32,
    pub(crate) iterations: u32,
    pub(crate) seeds: Vec<u32>,
    pub(crate) centroids: Vec<ColorSample>,
    pub(crate) assignments: Vec<u32>,
}

impl ClusterSession {
    /// Create a session with `k` initial centroids picked uniformly at
    /// random (with replacement) from the image's pixels.
    pub fn new(
        image: &SourceImage,
        k: u32,
        iterations: u32,
        rng: &mut impl Rng,
    ) -> Result<Self, PaletteError> {
        validate_config(k, iterations)?;

        let pixels = image.pixel_count() as u32;
        let seeds = (0..k).map(|_| rng.gen_range(0..pixels)).collect();

        Self::from_seeds(image, k, iterations, seeds)
    }

    /// Create a session from explicit seed pixel indices, one per cluster.
    /// Duplicate indices are permitted, exactly as with random seeding.
    pub fn with_seeds(
        image: &SourceImage,
        k: u32,
        iterations: u32,
        seeds: Vec<u32>,
    ) -> Result<Self, PaletteError> {
        validate_config(k, iterations)?;

        if seeds.len() != k as usize {
            return Err(PaletteError::SeedCountMismatch {
                k,
                found: seeds.len(),
            });
        }
        if let Some(&index) = seeds.iter().find(|&&s| s as usize >= image.pixel_count()) {
            return Err(PaletteError::SeedIndexOutOfBounds {
                index,
                pixels: image.pixel_count(),
            });
        }

        Self::from_seeds(image, k, iterations, seeds)
    }

    fn from_seeds(
        image: &SourceImage,
        k: u32,
        iterations: u32,
        seeds: Vec<u32>,
    ) -> Result<Self, PaletteError> {
        info!("cluster count is {k}, iteration count is {iterations}");

        let centroids: Vec<ColorSample> = seeds
            .iter()
            .map(|&index| image.sample(index as usize))
            .collect();
        for (index, centroid) in centroids.iter().enumerate() {
            debug!(
                "c{index}: {r}, {g}, {b}, norm {norm}",
                r = centroid.r,
                g = centroid.g,
                b = centroid.b,
                norm = centroid.norm()
            );
        }

        Ok(Self {
            k,
            iterations,
            seeds,
            centroids,
            assignments: vec![0; image.pixel_count()],
        })
    }

    /// Run the fixed-iteration clustering loop with the selected engine.
    ///
    /// The image must be the one the session was created for; the engines
    /// only borrow it. Calling this again re-runs the loop from the current
    /// centroids.
    pub fn cluster(&mut self, image: &SourceImage, engine: Engine) -> Result<(), PaletteError> {
        match engine {
            Engine::Sequential => {
                sequential::cluster(self, image);
                Ok(())
            }
            Engine::Threaded(threads) => threaded::cluster(self, image, threads),
            Engine::Gpu(context) => gpu::cluster(self, context, image),
        }
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn seeds(&self) -> &[u32] {
        &self.seeds
    }

    pub fn centroids(&self) -> &[ColorSample] {
        &self.centroids
    }

    pub fn assignments(&self) -> &[u32] {
        &self.assignments
    }

    pub(crate) fn log_centroids(&self) {
        for (index, centroid) in self.centroids.iter().enumerate() {
            debug!(
                "c{index}: {r}, {g}, {b}, norm {norm}",
                r = centroid.r,
                g = centroid.g,
                b = centroid.b,
                norm = centroid.norm()
            );
        }
    }
}

fn validate_config(k: u32, iterations: u32) -> Result<(), PaletteError> {
    if k == 0 || k > MAX_CLUSTERS {
        return Err(PaletteError::ClusterCountOutOfRange(k));
    }
    if iterations > MAX_ITERATIONS {
        return Err(PaletteError::IterationCountOutOfRange(iterations));
    }
    Ok(())
}

/// Cluster with the selected engine, then render the reduced image.
pub fn reduce(
    image: &SourceImage,
    k: u32,
    iterations: u32,
    engine: Engine,
    rng: &mut impl Rng,
) -> Result<Image<Vec<RGBA8>>, PaletteError> {
    let mut session = ClusterSession::new(image, k, iterations, rng)?;
    session.cluster(image, engine)?;

    Ok(render_palette(
        image,
        session.centroids(),
        session.assignments(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn gradient_bytes() -> Vec<u8> {
        (0..4 * 4 * 3).map(|i| (i * 5 % 256) as u8).collect()
    }

    #[test]
    fn rejects_out_of_range_config() {
        let data = gradient_bytes();
        let image = SourceImage::new(4, 4, 3, &data).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        assert!(matches!(
            ClusterSession::new(&image, 0, 4, &mut rng),
            Err(PaletteError::ClusterCountOutOfRange(0))
        ));
        assert!(matches!(
            ClusterSession::new(&image, 300, 4, &mut rng),
            Err(PaletteError::ClusterCountOutOfRange(300))
        ));
        assert!(matches!(
            ClusterSession::new(&image, 4, 129, &mut rng),
            Err(PaletteError::IterationCountOutOfRange(129))
        ));
    }

    #[test]
    fn rejects_bad_seed_vectors() {
        let data = gradient_bytes();
        let image = SourceImage::new(4, 4, 3, &data).unwrap();

        assert!(matches!(
            ClusterSession::with_seeds(&image, 3, 4, vec![0, 1]),
            Err(PaletteError::SeedCountMismatch { k: 3, found: 2 })
        ));
        assert!(matches!(
            ClusterSession::with_seeds(&image, 2, 4, vec![0, 16]),
            Err(PaletteError::SeedIndexOutOfBounds { index: 16, .. })
        ));
    }

    #[test]
    fn seeds_become_initial_centroids() {
        let data = gradient_bytes();
        let image = SourceImage::new(4, 4, 3, &data).unwrap();

        let session = ClusterSession::with_seeds(&image, 2, 4, vec![0, 5]).unwrap();

        assert_eq!(session.centroids()[0], image.sample(0));
        assert_eq!(session.centroids()[1], image.sample(5));
        assert_eq!(session.assignments().len(), image.pixel_count());
        assert!(session.assignments().iter().all(|&a| a == 0));
    }

    #[test]
    fn duplicate_seeds_are_permitted() {
        let data = gradient_bytes();
        let image = SourceImage::new(4, 4, 3, &data).unwrap();

        let session = ClusterSession::with_seeds(&image, 3, 1, vec![7, 7, 7]).unwrap();

        assert_eq!(session.centroids()[0], session.centroids()[2]);
    }

    #[test]
    fn random_seeding_stays_in_bounds() {
        let data = gradient_bytes();
        let image = SourceImage::new(4, 4, 3, &data).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let session = ClusterSession::new(&image, 256, 0, &mut rng).unwrap();

        assert_eq!(session.seeds().len(), 256);
        assert!(session
            .seeds()
            .iter()
            .all(|&s| (s as usize) < image.pixel_count()));
    }
}
