use argh::FromArgs;
use std::path::PathBuf;

use knn_smooth::imgproc::parallel::ExecutionStrategy;
use knn_smooth::io::ImageFormat;
use knn_smooth::pipeline::{self, SmoothConfig, DEFAULT_OUTPUT_DIR};

#[derive(FromArgs)]
/// Smooth an image by averaging every pixel with its k nearest neighbors by value
struct Args {
    /// path to an input image
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// the window size, an odd number (default 3)
    #[argh(option, short = 'n', default = "3")]
    n: i64,

    /// the number of neighbors, between 0 and n^2 - 1 (default 5)
    #[argh(option, short = 'k', default = "5")]
    k: i64,

    /// do not print logs
    #[argh(switch, short = 'q')]
    quiet: bool,

    /// do not save the smoothed image
    #[argh(switch)]
    no_save: bool,

    /// directory where the smoothed image is saved
    #[argh(option, default = "PathBuf::from(DEFAULT_OUTPUT_DIR)")]
    output_dir: PathBuf,

    /// format of the saved image: jpg or png (default jpg)
    #[argh(option, default = "ImageFormat::Jpeg")]
    format: ImageFormat,

    /// number of threads, uses the global thread pool when not set
    #[argh(option)]
    threads: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Args = argh::from_env();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let strategy = match args.threads {
        Some(n) => ExecutionStrategy::Fixed(n),
        None => ExecutionStrategy::ParallelRows,
    };

    let config = SmoothConfig::new(args.image_path)
        .with_n(args.n)
        .with_k(args.k)
        .with_print_logs(!args.quiet)
        .with_save_image(!args.no_save)
        .with_output_dir(args.output_dir)
        .with_format(args.format)
        .with_strategy(strategy);

    let output = pipeline::run(&config)?;

    if output.saved_path.is_none() {
        log::warn!("The smoothed image was not saved");
    }

    Ok(())
}
