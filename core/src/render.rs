use rgb::RGBA8;

use crate::{
    image::{Image, SourceImage},
    sample::ColorSample,
};

/// Produce the reduced image: every pixel becomes its cluster's centroid
/// color with an opaque alpha. The output always has four channels,
/// whatever the source had.
///
/// Pure function of its arguments; rendering twice from the same clustering
/// yields byte-identical buffers.
pub fn render_palette(
    image: &SourceImage,
    centroids: &[ColorSample],
    assignments: &[u32],
) -> Image<Vec<RGBA8>> {
    debug_assert_eq!(assignments.len(), image.pixel_count());

    let rgba = assignments
        .iter()
        .map(|&cluster| {
            let centroid = centroids[cluster as usize];
            RGBA8 {
                r: centroid.r as u8,
                g: centroid.g as u8,
                b: centroid.b as u8,
                a: 255,
            }
        })
        .collect();

    Image::new((image.width(), image.height()), rgba)
}
