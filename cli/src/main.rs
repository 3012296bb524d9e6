use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use image::{ImageBuffer, Rgba};
use kmeans_palette::{reduce, Engine, GpuContext, SourceImage};
use log::info;
use pollster::FutureExt;
use rand::{rngs::StdRng, SeedableRng};

use args::Cli;

mod args;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }

    info!(
        "running with arguments: img_in={input}, img_out={output}, k={k}, iter={iterations}, thr={threads}, gpu={gpu}",
        input = cli.input.display(),
        output = cli.output.display(),
        k = cli.color_count,
        iterations = cli.iterations,
        threads = cli.threads,
        gpu = cli.gpu,
    );

    let (dimensions, raw) = open_rgba(&cli.input)?;
    let source = SourceImage::new(dimensions.0, dimensions.1, 4, &raw)?;

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let context = if cli.gpu {
        Some(
            GpuContext::new()
                .block_on()
                .context("couldn't set up the compute device")?,
        )
    } else {
        None
    };
    let engine = match &context {
        Some(context) => Engine::Gpu(context),
        None if cli.threads > 1 => Engine::Threaded(cli.threads),
        None => Engine::Sequential,
    };

    let result = reduce(
        &source,
        cli.color_count,
        cli.iterations,
        engine,
        &mut rng,
    )?;

    let (width, height) = result.dimensions();
    let output_image =
        ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, result.into_raw_pixels())
            .context("rendered image didn't fit its dimensions")?;
    output_image
        .save(&cli.output)
        .with_context(|| format!("couldn't write {}", cli.output.display()))?;

    info!("wrote {}", cli.output.display());

    Ok(())
}

fn open_rgba(path: &Path) -> Result<((u32, u32), Vec<u8>)> {
    let image = image::open(path)
        .with_context(|| format!("couldn't open {}", path.display()))?
        .to_rgba8();
    let dimensions = image.dimensions();

    Ok((dimensions, image.into_raw()))
}
