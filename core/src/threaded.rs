//! Shared-memory parallel engine: the same assign/update loop as the
//! sequential engine, partitioned over a fixed-size worker pool.
//!
//! Each phase is one parallel iterator; its completion is the barrier
//! between phases. During assignment the centroid array is only read, so
//! workers share it unsynchronized. During the update each worker folds
//! per-cluster counts and channel sums into its own private accumulators,
//! which are then merged on a single thread before the centroids are
//! recomputed — no locks are held across an iteration.

use log::debug;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::{
    image::SourceImage,
    sequential::{accumulate, apply_means, nearest_centroid},
    ClusterSession, PaletteError, MAX_THREADS,
};

pub(crate) fn cluster(
    session: &mut ClusterSession,
    image: &SourceImage,
    threads: u32,
) -> Result<(), PaletteError> {
    if threads == 0 || threads > MAX_THREADS {
        return Err(PaletteError::ThreadCountOutOfRange(threads));
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(threads as usize)
        .build()?;

    debug!("begin clustering with {threads} threads...");

    let k = session.centroids.len();
    let min_len = (image.pixel_count() / threads as usize).max(1);

    pool.install(|| {
        for iteration in 0..session.iterations {
            debug!(
                "processing iteration {current}/{total}...",
                current = iteration + 1,
                total = session.iterations
            );

            let centroids = &session.centroids;
            session
                .assignments
                .par_iter_mut()
                .enumerate()
                .with_min_len(min_len)
                .for_each(|(index, assignment)| {
                    *assignment = nearest_centroid(image.sample(index), centroids);
                });

            let partials: Vec<(Vec<u32>, Vec<[u64; 3]>)> = session
                .assignments
                .par_iter()
                .enumerate()
                .with_min_len(min_len)
                .fold_with(
                    (vec![0u32; k], vec![[0u64; 3]; k]),
                    |(mut counts, mut sums), (index, &cluster)| {
                        accumulate(&mut counts, &mut sums, cluster, image.sample(index));
                        (counts, sums)
                    },
                )
                .collect();

            let mut counts = vec![0u32; k];
            let mut sums = vec![[0u64; 3]; k];
            for (partial_counts, partial_sums) in partials {
                for (count, partial) in counts.iter_mut().zip(&partial_counts) {
                    *count += partial;
                }
                for (sum, partial) in sums.iter_mut().zip(&partial_sums) {
                    sum[0] += partial[0];
                    sum[1] += partial[1];
                    sum[2] += partial[2];
                }
            }

            apply_means(&counts, &sums, &mut session.centroids);
        }
    });

    debug!("end clustering...");
    session.log_centroids();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClusterSession;

    #[test]
    fn rejects_out_of_range_thread_counts() {
        let data = vec![0u8; 4 * 4 * 3];
        let image = SourceImage::new(4, 4, 3, &data).unwrap();
        let mut session = ClusterSession::with_seeds(&image, 2, 1, vec![0, 1]).unwrap();

        assert!(matches!(
            cluster(&mut session, &image, 0),
            Err(PaletteError::ThreadCountOutOfRange(0))
        ));
        assert!(matches!(
            cluster(&mut session, &image, 65),
            Err(PaletteError::ThreadCountOutOfRange(65))
        ));
    }

    #[test]
    fn more_workers_than_pixels_still_completes() {
        let data = [0, 0, 0, 200, 200, 200];
        let image = SourceImage::new(2, 1, 3, &data).unwrap();
        let mut session = ClusterSession::with_seeds(&image, 2, 4, vec![0, 1]).unwrap();

        cluster(&mut session, &image, 8).unwrap();

        assert_eq!(session.assignments(), &[0, 1]);
    }
}
