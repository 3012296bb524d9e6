//! Baseline single-threaded clustering engine, and the phase helpers the
//! worker-pool engine shares with it.

use log::debug;

use crate::{image::SourceImage, sample::ColorSample, ClusterSession};

pub(crate) fn cluster(session: &mut ClusterSession, image: &SourceImage) {
    debug!("begin clustering...");

    for iteration in 0..session.iterations {
        debug!(
            "processing iteration {current}/{total}...",
            current = iteration + 1,
            total = session.iterations
        );

        assign_phase(image, &session.centroids, &mut session.assignments);
        update_phase(image, &session.assignments, &mut session.centroids);
    }

    debug!("end clustering...");
    session.log_centroids();
}

/// Assign every pixel to its nearest centroid. Centroids are never touched
/// here; a stale assignment is only ever overwritten with a fresh one.
pub(crate) fn assign_phase(
    image: &SourceImage,
    centroids: &[ColorSample],
    assignments: &mut [u32],
) {
    for (index, assignment) in assignments.iter_mut().enumerate() {
        *assignment = nearest_centroid(image.sample(index), centroids);
    }
}

/// Index of the centroid with the smallest squared distance to `sample`.
/// Ties resolve to the lowest cluster index: the scan runs left to right
/// and only a strictly smaller distance displaces the current choice.
pub(crate) fn nearest_centroid(sample: ColorSample, centroids: &[ColorSample]) -> u32 {
    let mut nearest = 0;
    let mut nearest_distance = f64::MAX;

    for (cluster, centroid) in centroids.iter().enumerate() {
        let distance = centroid.distance_squared(sample);
        if distance < nearest_distance {
            nearest_distance = distance;
            nearest = cluster as u32;
        }
    }

    nearest
}

/// Recompute every centroid as the truncated integer mean of its pixels.
pub(crate) fn update_phase(
    image: &SourceImage,
    assignments: &[u32],
    centroids: &mut [ColorSample],
) {
    let mut counts = vec![0u32; centroids.len()];
    let mut sums = vec![[0u64; 3]; centroids.len()];

    for (index, &cluster) in assignments.iter().enumerate() {
        accumulate(&mut counts, &mut sums, cluster, image.sample(index));
    }

    apply_means(&counts, &sums, centroids);
}

pub(crate) fn accumulate(
    counts: &mut [u32],
    sums: &mut [[u64; 3]],
    cluster: u32,
    sample: ColorSample,
) {
    let cluster = cluster as usize;
    counts[cluster] += 1;
    sums[cluster][0] += sample.r as u64;
    sums[cluster][1] += sample.g as u64;
    sums[cluster][2] += sample.b as u64;
}

/// An empty cluster keeps its previous centroid: it is never re-seeded.
pub(crate) fn apply_means(counts: &[u32], sums: &[[u64; 3]], centroids: &mut [ColorSample]) {
    for (cluster, centroid) in centroids.iter_mut().enumerate() {
        let count = u64::from(counts[cluster]);
        if count == 0 {
            continue;
        }

        *centroid = ColorSample::new(
            (sums[cluster][0] / count) as i32,
            (sums[cluster][1] / count) as i32,
            (sums[cluster][2] / count) as i32,
        );
    }
}
