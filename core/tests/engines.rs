//! Cross-engine properties: every engine runs the same algorithm, so with
//! identical seed indices they must land on the same centroids and
//! assignments.

use kmeans_palette::{
    render_palette, ClusterSession, ColorSample, Engine, GpuContext, SourceImage,
};
use rand::{rngs::StdRng, SeedableRng};

/// Deterministic multi-colored test image.
fn gradient_bytes(width: u32, height: u32, channels: u32) -> Vec<u8> {
    (0..width * height * channels)
        .map(|i| (i * 7 % 256) as u8)
        .collect()
}

fn run(
    image: &SourceImage,
    k: u32,
    iterations: u32,
    seeds: Vec<u32>,
    engine: Engine,
) -> ClusterSession {
    let mut session = ClusterSession::with_seeds(image, k, iterations, seeds).unwrap();
    session.cluster(image, engine).unwrap();
    session
}

#[test]
fn assignments_cover_every_pixel_within_bounds() {
    let data = gradient_bytes(9, 5, 3);
    let image = SourceImage::new(9, 5, 3, &data).unwrap();

    for k in [1, 3, 7] {
        for iterations in [0, 1, 5] {
            let mut rng = StdRng::seed_from_u64(u64::from(k * 131 + iterations));
            for engine in [Engine::Sequential, Engine::Threaded(3)] {
                let mut session = ClusterSession::new(&image, k, iterations, &mut rng).unwrap();
                session.cluster(&image, engine).unwrap();

                assert_eq!(session.assignments().len(), image.pixel_count());
                assert!(session.assignments().iter().all(|&a| a < k));
                assert_eq!(session.centroids().len(), k as usize);
            }
        }
    }
}

#[test]
fn sequential_and_threaded_agree() {
    let data = gradient_bytes(16, 11, 4);
    let image = SourceImage::new(16, 11, 4, &data).unwrap();
    let seeds = vec![0, 20, 47, 101, 175];

    let sequential = run(&image, 5, 8, seeds.clone(), Engine::Sequential);
    let threaded = run(&image, 5, 8, seeds, Engine::Threaded(4));

    assert_eq!(sequential.centroids(), threaded.centroids());
    assert_eq!(sequential.assignments(), threaded.assignments());
}

#[test]
fn single_worker_degenerates_to_sequential() {
    let data = gradient_bytes(8, 8, 3);
    let image = SourceImage::new(8, 8, 3, &data).unwrap();
    let seeds = vec![3, 33, 60];

    let sequential = run(&image, 3, 6, seeds.clone(), Engine::Sequential);
    let threaded = run(&image, 3, 6, seeds, Engine::Threaded(1));

    assert_eq!(sequential.centroids(), threaded.centroids());
    assert_eq!(sequential.assignments(), threaded.assignments());
}

#[test]
fn k_of_one_converges_to_the_image_mean() {
    // Means of the four pixels per channel: 15, 30, 45.
    let data = [0, 0, 0, 10, 20, 30, 20, 40, 60, 30, 60, 90];
    let image = SourceImage::new(2, 2, 3, &data).unwrap();

    let session = run(&image, 1, 2, vec![0], Engine::Sequential);

    assert_eq!(session.assignments(), &[0, 0, 0, 0]);
    assert_eq!(session.centroids(), &[ColorSample::new(15, 30, 45)]);
}

#[test]
fn zero_iterations_leaves_the_seeded_state() {
    let data = gradient_bytes(4, 4, 3);
    let image = SourceImage::new(4, 4, 3, &data).unwrap();
    let seeds = vec![2, 9];

    for engine in [Engine::Sequential, Engine::Threaded(2)] {
        let session = run(&image, 2, 0, seeds.clone(), engine);

        assert_eq!(session.centroids()[0], image.sample(2));
        assert_eq!(session.centroids()[1], image.sample(9));
        assert!(session.assignments().iter().all(|&a| a == 0));
    }
}

#[test]
fn empty_cluster_retains_its_seeded_centroid() {
    // Two pixels, three clusters: one cluster can never win a pixel.
    let data = [0, 0, 0, 200, 200, 200];
    let image = SourceImage::new(2, 1, 3, &data).unwrap();

    for engine in [Engine::Sequential, Engine::Threaded(2)] {
        let session = run(&image, 3, 4, vec![0, 1, 1], engine);

        // Pixel 1 ties between clusters 1 and 2; the lower index wins, so
        // cluster 2 stays empty through every iteration.
        assert_eq!(session.assignments(), &[0, 1]);
        assert_eq!(session.centroids()[2], ColorSample::new(200, 200, 200));
    }
}

#[test]
fn two_tone_image_splits_into_its_two_colors() {
    let data = [
        0, 0, 0, 255, //
        0, 0, 0, 255, //
        255, 255, 255, 255, //
        255, 255, 255, 255, //
    ];
    let image = SourceImage::new(2, 2, 4, &data).unwrap();

    for engine in [Engine::Sequential, Engine::Threaded(2)] {
        let session = run(&image, 2, 1, vec![0, 2], engine);

        assert_eq!(session.assignments(), &[0, 0, 1, 1]);
        assert_eq!(
            session.centroids(),
            &[ColorSample::new(0, 0, 0), ColorSample::new(255, 255, 255)]
        );

        let first = render_palette(&image, session.centroids(), session.assignments());
        let second = render_palette(&image, session.centroids(), session.assignments());
        assert_eq!(first.into_raw_pixels(), second.into_raw_pixels());
    }
}

#[test]
fn gpu_matches_sequential_when_a_device_is_available() {
    use pollster::FutureExt;

    let context = match GpuContext::new().block_on() {
        Ok(context) => context,
        Err(e) => {
            eprintln!("skipping gpu test: {e}");
            return;
        }
    };

    // Small enough for a single work group, where the device phases are
    // fully synchronized and results are exact.
    let data = gradient_bytes(5, 5, 3);
    let image = SourceImage::new(5, 5, 3, &data).unwrap();
    let seeds = vec![1, 12, 24];

    let sequential = run(&image, 3, 4, seeds.clone(), Engine::Sequential);
    let gpu = run(&image, 3, 4, seeds, Engine::Gpu(&context));

    assert_eq!(sequential.centroids(), gpu.centroids());
    assert_eq!(sequential.assignments(), gpu.assignments());

    let two_tone = [
        0, 0, 0, 255, //
        0, 0, 0, 255, //
        255, 255, 255, 255, //
        255, 255, 255, 255, //
    ];
    let image = SourceImage::new(2, 2, 4, &two_tone).unwrap();
    let session = run(&image, 2, 1, vec![0, 2], Engine::Gpu(&context));

    assert_eq!(session.assignments(), &[0, 0, 1, 1]);
    assert_eq!(
        session.centroids(),
        &[ColorSample::new(0, 0, 0), ColorSample::new(255, 255, 255)]
    );
}
