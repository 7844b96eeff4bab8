use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use knn_image::{Image, ImageSize};
use knn_imgproc::filter::{knn_output_size, knn_smooth_new, KnnError, KnnParams};
use knn_imgproc::parallel::ExecutionStrategy;
use knn_io::functional::{read_image_any, write_image_normalized};
use knn_io::{DynImage, ImageFormat, IoError};

/// Directory the smoothed images are written to unless configured otherwise.
pub const DEFAULT_OUTPUT_DIR: &str = "knn_processed_images";

/// Errors detected before any pixel is computed.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    /// The window size or number of neighbors is invalid, also for the loaded image.
    #[error("invalid filter parameters: {0}")]
    Params(#[from] KnnError),

    /// The image path is not an existing file.
    #[error("image path invalid: {0}")]
    ImagePathNotFound(PathBuf),

    /// Neither saving nor returning the result was requested.
    #[error("nothing to do: enable saving the image or returning the frame")]
    NothingToDo,

    /// A fixed thread pool needs at least one thread.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),
}

/// An error type for the smoothing pipeline.
#[derive(thiserror::Error, Debug)]
pub enum SmoothError {
    /// Invalid configuration, never worth retrying.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The image could not be read or decoded.
    #[error("error encountered while loading image: {0}")]
    Decode(IoError),

    /// The result could not be written.
    #[error("failed to save the image: {0}")]
    Save(IoError),

    /// The filter failed to run.
    #[error(transparent)]
    Filter(KnnError),
}

/// Configuration of one smoothing run.
///
/// # Examples
///
/// ```
/// use knn_smooth::pipeline::SmoothConfig;
///
/// let config = SmoothConfig::new("image1.jpg")
///     .with_n(5)
///     .with_k(12)
///     .with_save_image(false)
///     .with_return_frame(true);
///
/// assert_eq!(config.n, 5);
/// assert!(config.print_logs);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothConfig {
    /// Path to the image to smooth.
    pub image_path: PathBuf,
    /// The window side, an odd number >= 1.
    pub n: i64,
    /// The number of neighbors, between 0 and `n * n - 1`.
    pub k: i64,
    /// Log progress and timing information.
    pub print_logs: bool,
    /// Write the result to `output_dir`.
    pub save_image: bool,
    /// Return the result in [`SmoothOutput::frame`].
    pub return_frame: bool,
    /// Directory where the result is written.
    pub output_dir: PathBuf,
    /// Encoding of the written result.
    pub format: ImageFormat,
    /// How the filter schedules its work.
    pub strategy: ExecutionStrategy,
}

impl SmoothConfig {
    /// Create a configuration with the default parameters for the given image.
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            n: KnnParams::DEFAULT_WINDOW_SIZE as i64,
            k: KnnParams::DEFAULT_NEIGHBORS as i64,
            print_logs: true,
            save_image: true,
            return_frame: false,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            format: ImageFormat::default(),
            strategy: ExecutionStrategy::default(),
        }
    }

    /// Set the window side.
    pub fn with_n(mut self, n: i64) -> Self {
        self.n = n;
        self
    }

    /// Set the number of neighbors.
    pub fn with_k(mut self, k: i64) -> Self {
        self.k = k;
        self
    }

    /// Enable or disable progress logs.
    pub fn with_print_logs(mut self, print_logs: bool) -> Self {
        self.print_logs = print_logs;
        self
    }

    /// Enable or disable writing the result.
    pub fn with_save_image(mut self, save_image: bool) -> Self {
        self.save_image = save_image;
        self
    }

    /// Enable or disable returning the result.
    pub fn with_return_frame(mut self, return_frame: bool) -> Self {
        self.return_frame = return_frame;
        self
    }

    /// Set the directory where the result is written.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Set the encoding of the written result.
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the execution strategy of the filter.
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Check everything that can be checked without decoding the image.
    ///
    /// # Returns
    ///
    /// The validated filter parameters.
    pub fn validate(&self) -> Result<KnnParams, ValidationError> {
        let params = KnnParams::new(self.n, self.k)?;

        if !self.image_path.is_file() {
            return Err(ValidationError::ImagePathNotFound(self.image_path.clone()));
        }

        if !self.save_image && !self.return_frame {
            return Err(ValidationError::NothingToDo);
        }

        if let ExecutionStrategy::Fixed(0) = self.strategy {
            return Err(ValidationError::InvalidThreadCount(0));
        }

        Ok(params)
    }
}

/// A smoothed image, normalized into `[0, 1]`, with the channel layout of its source.
#[derive(Debug, Clone, PartialEq)]
pub enum FilteredImage {
    /// grayscale
    L(Image<f32, 1>),
    /// grayscale with alpha channel
    La(Image<f32, 2>),
    /// RGB
    Rgb(Image<f32, 3>),
    /// RGB with alpha channel
    Rgba(Image<f32, 4>),
}

impl FilteredImage {
    /// Get the size of the image in pixels.
    pub fn size(&self) -> ImageSize {
        match self {
            FilteredImage::L(img) => img.size(),
            FilteredImage::La(img) => img.size(),
            FilteredImage::Rgb(img) => img.size(),
            FilteredImage::Rgba(img) => img.size(),
        }
    }

    /// Get the number of channels in the image.
    pub fn num_channels(&self) -> usize {
        match self {
            FilteredImage::L(_) => 1,
            FilteredImage::La(_) => 2,
            FilteredImage::Rgb(_) => 3,
            FilteredImage::Rgba(_) => 4,
        }
    }

    /// Get the pixel data as a flat slice.
    pub fn as_slice(&self) -> &[f32] {
        match self {
            FilteredImage::L(img) => img.as_slice(),
            FilteredImage::La(img) => img.as_slice(),
            FilteredImage::Rgb(img) => img.as_slice(),
            FilteredImage::Rgba(img) => img.as_slice(),
        }
    }

    /// Write the image to `file_path` with the given encoding.
    pub fn write(&self, file_path: impl AsRef<Path>, format: ImageFormat) -> Result<(), IoError> {
        match self {
            FilteredImage::L(img) => write_image_normalized(file_path, img, format),
            FilteredImage::La(img) => write_image_normalized(file_path, img, format),
            FilteredImage::Rgb(img) => write_image_normalized(file_path, img, format),
            FilteredImage::Rgba(img) => write_image_normalized(file_path, img, format),
        }
    }
}

/// Result of a smoothing run.
#[derive(Debug)]
pub struct SmoothOutput {
    /// The smoothed image, when requested with `return_frame`.
    pub frame: Option<FilteredImage>,
    /// Where the smoothed image was written, when requested with `save_image`.
    pub saved_path: Option<PathBuf>,
    /// Size of the source image.
    pub input_size: ImageSize,
    /// Size of the smoothed image.
    pub output_size: ImageSize,
    /// Time spent loading and filtering the image.
    pub elapsed: Duration,
}

/// Apply the knn filter to a decoded image of any supported layout.
pub fn smooth_image(
    image: &DynImage,
    params: &KnnParams,
    strategy: ExecutionStrategy,
) -> Result<FilteredImage, KnnError> {
    let filtered = match image {
        DynImage::L8(img) => FilteredImage::L(knn_smooth_new(img, params, strategy)?),
        DynImage::La8(img) => FilteredImage::La(knn_smooth_new(img, params, strategy)?),
        DynImage::Rgb8(img) => FilteredImage::Rgb(knn_smooth_new(img, params, strategy)?),
        DynImage::Rgba8(img) => FilteredImage::Rgba(knn_smooth_new(img, params, strategy)?),
    };
    Ok(filtered)
}

/// Name of the image without directories and extensions.
///
/// Everything after the first `.` of the file name is dropped.
///
/// # Examples
///
/// ```
/// use knn_smooth::pipeline::image_name;
///
/// assert_eq!(image_name("knn_original_images/image1.jpg"), "image1");
/// assert_eq!(image_name("photo.final.png"), "photo");
/// ```
pub fn image_name(image_path: impl AsRef<Path>) -> String {
    image_path
        .as_ref()
        .file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.split('.').next().map(str::to_owned))
        .unwrap_or_default()
}

/// File name of the smoothed image, `<name>_knn_n_<n>_k_<k>.<ext>`.
///
/// # Examples
///
/// ```
/// use knn_smooth::imgproc::filter::KnnParams;
/// use knn_smooth::io::ImageFormat;
/// use knn_smooth::pipeline::output_file_name;
///
/// let params = KnnParams::new(5, 12).unwrap();
/// assert_eq!(
///     output_file_name("images/cat.png", &params, ImageFormat::Jpeg),
///     "cat_knn_n_5_k_12.jpg"
/// );
/// ```
pub fn output_file_name(
    image_path: impl AsRef<Path>,
    params: &KnnParams,
    format: ImageFormat,
) -> String {
    format!(
        "{}_knn_n_{}_k_{}.{}",
        image_name(image_path),
        params.window_size(),
        params.neighbors(),
        format.extension()
    )
}

/// Smooth the image described by `config`.
///
/// The steps are: validate the configuration, load the image, check the window against
/// the image size, filter, and finally save and/or return the result. Validation errors
/// are reported before the image is decoded and before any pixel is computed.
///
/// # Errors
///
/// See [`SmoothError`]. No partial result is produced on error.
pub fn run(config: &SmoothConfig) -> Result<SmoothOutput, SmoothError> {
    let start_time = Instant::now();

    let params = config.validate()?;

    let image = read_image_any(&config.image_path).map_err(SmoothError::Decode)?;
    let input_size = image.size();

    params
        .check_image_size(input_size)
        .map_err(ValidationError::from)?;

    let output_size = knn_output_size(input_size, params.window_size()).ok_or(
        ValidationError::Params(KnnError::WindowTooLarge {
            n: params.window_size(),
            size: input_size,
        }),
    )?;

    if config.print_logs {
        log::info!("Image Name is - {}", image_name(&config.image_path));
        log::info!("Image imported successfully !");
        log::info!("n = {}", params.window_size());
        log::info!("k = {}", params.neighbors());
        log::info!("Input image size is {input_size}");
        log::info!("Output image size will be {output_size}");
        log::info!("Computing...");
    }

    let filtered = smooth_image(&image, &params, config.strategy).map_err(SmoothError::Filter)?;

    let elapsed = start_time.elapsed();

    if config.print_logs {
        log::info!(
            "Time Taken to compute is - {:.4} secs",
            elapsed.as_secs_f64()
        );
    }

    let saved_path = if config.save_image {
        let file_path = config
            .output_dir
            .join(output_file_name(&config.image_path, &params, config.format));
        filtered
            .write(&file_path, config.format)
            .map_err(SmoothError::Save)?;
        if config.print_logs {
            log::info!("Image saved at - {}", file_path.display());
        }
        Some(file_path)
    } else {
        None
    };

    Ok(SmoothOutput {
        frame: config.return_frame.then_some(filtered),
        saved_path,
        input_size,
        output_size,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SmoothConfig::new("a.png");
        assert_eq!(config.n, 3);
        assert_eq!(config.k, 5);
        assert!(config.print_logs);
        assert!(config.save_image);
        assert!(!config.return_frame);
        assert_eq!(config.output_dir, PathBuf::from("knn_processed_images"));
        assert_eq!(config.format, ImageFormat::Jpeg);
        assert_eq!(config.strategy, ExecutionStrategy::ParallelRows);
    }

    #[test]
    fn test_validate_params_before_path() {
        // the parameters are checked first, the path does not exist either
        let config = SmoothConfig::new("missing.png").with_n(4);
        assert_eq!(
            config.validate(),
            Err(ValidationError::Params(KnnError::EvenWindowSize(4)))
        );

        let config = SmoothConfig::new("missing.png").with_k(-1);
        assert_eq!(
            config.validate(),
            Err(ValidationError::Params(KnnError::NegativeNeighbors(-1)))
        );

        let config = SmoothConfig::new("missing.png");
        assert_eq!(
            config.validate(),
            Err(ValidationError::ImagePathNotFound(PathBuf::from("missing.png")))
        );
    }

    #[test]
    fn test_image_name() {
        assert_eq!(image_name("a/b/c.jpg"), "c");
        assert_eq!(image_name("noext"), "noext");
        assert_eq!(image_name(".hidden"), "");
        assert_eq!(image_name(""), "");
    }

    #[test]
    fn test_smooth_image_keeps_layout() -> Result<(), KnnError> {
        let params = KnnParams::new(3, 8)?;
        let image = DynImage::La8(Image::new([4, 3].into(), vec![255; 4 * 3 * 2])?);

        let filtered = smooth_image(&image, &params, ExecutionStrategy::Serial)?;
        assert_eq!(filtered.num_channels(), 2);
        assert_eq!(filtered.size(), [2, 1].into());
        assert_eq!(filtered.as_slice(), &[1.0; 4]);

        Ok(())
    }
}
