use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    /// Input image file
    #[clap(short, long, value_parser = validate_filenames, default_value = "in.png")]
    pub input: PathBuf,
    /// Output image file
    #[clap(short, long, value_parser = validate_filenames, default_value = "out.png")]
    pub output: PathBuf,
    /// Color count of the reduced palette. Between 2 and 256
    #[clap(short = 'k', long = "colorcount", value_parser = validate_color_count, default_value_t = 10)]
    pub color_count: u32,
    /// Clustering iteration count. Between 1 and 128
    #[clap(short = 'n', long, value_parser = validate_iterations, default_value_t = 16)]
    pub iterations: u32,
    /// Worker thread count for the parallel engine. Between 1 and 64
    #[clap(short, long, value_parser = validate_threads, default_value_t = 1)]
    pub threads: u32,
    /// Run the clustering on the GPU
    #[clap(short, long)]
    pub gpu: bool,
    /// Seed for the centroid picker, for reproducible runs
    #[clap(short, long)]
    pub seed: Option<u64>,
    /// Log progress to stderr
    #[clap(short, long)]
    pub verbose: bool,
}

fn validate_color_count(s: &str) -> Result<u32> {
    match s.parse::<u32>() {
        Ok(k) if (2..=256).contains(&k) => Ok(k),
        _ => Err(anyhow!("color count must be an integer between 2 and 256.")),
    }
}

fn validate_iterations(s: &str) -> Result<u32> {
    match s.parse::<u32>() {
        Ok(n) if (1..=128).contains(&n) => Ok(n),
        _ => Err(anyhow!(
            "iteration count must be an integer between 1 and 128."
        )),
    }
}

fn validate_threads(s: &str) -> Result<u32> {
    match s.parse::<u32>() {
        Ok(t) if (1..=64).contains(&t) => Ok(t),
        _ => Err(anyhow!("thread count must be an integer between 1 and 64.")),
    }
}

fn validate_filenames(s: &str) -> Result<PathBuf> {
    if s.len() > 4 && (s.ends_with(".png") || s.ends_with(".jpg")) {
        Ok(PathBuf::from(s))
    } else {
        Err(anyhow!("Only support png or jpg files."))
    }
}
