use std::{fmt, path::Path, str::FromStr};

use image::{DynamicImage, ImageBuffer};
use knn_image::{Image, ImageSize};

use crate::error::IoError;

/// A decoded image with the channel layout found in the file.
///
/// Every layout is stored with 8 bits per channel.
#[derive(Debug, Clone, PartialEq)]
pub enum DynImage {
    /// 8-bit grayscale image
    L8(Image<u8, 1>),
    /// 8-bit grayscale image with alpha channel
    La8(Image<u8, 2>),
    /// 8-bit RGB image
    Rgb8(Image<u8, 3>),
    /// 8-bit RGB image with alpha channel
    Rgba8(Image<u8, 4>),
}

impl DynImage {
    /// Get the size of the image in pixels.
    pub fn size(&self) -> ImageSize {
        match self {
            DynImage::L8(img) => img.size(),
            DynImage::La8(img) => img.size(),
            DynImage::Rgb8(img) => img.size(),
            DynImage::Rgba8(img) => img.size(),
        }
    }

    /// Get the number of channels in the image.
    pub fn num_channels(&self) -> usize {
        match self {
            DynImage::L8(_) => 1,
            DynImage::La8(_) => 2,
            DynImage::Rgb8(_) => 3,
            DynImage::Rgba8(_) => 4,
        }
    }
}

/// Encodings supported when writing images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    /// JPEG, lossy and without alpha channel.
    #[default]
    Jpeg,
    /// PNG, lossless.
    Png,
}

impl ImageFormat {
    /// The file extension used for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    fn supports_alpha(&self) -> bool {
        matches!(self, ImageFormat::Png)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            _ => Err(IoError::InvalidFileExtension(s.to_string())),
        }
    }
}

impl From<ImageFormat> for image::ImageFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
        }
    }
}

/// Reads an image from the given file path.
///
/// The format is guessed from the file content, not from its extension. Images with more
/// than 8 bits per channel are converted to 8 bits.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// An image with the channel layout stored in the file.
///
/// # Errors
///
/// Returns [`IoError::FileDoesNotExist`] if the path is missing and
/// [`IoError::ImageDecodeError`] if the data is not a supported or valid image.
pub fn read_image_any(file_path: impl AsRef<Path>) -> Result<DynImage, IoError> {
    let file_path = file_path.as_ref();

    // verify the file exists
    if !file_path.is_file() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::ImageReader::open(file_path)?
        .with_guessed_format()?
        .decode()?;

    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    log::debug!("decoded {} as {:?} ({size})", file_path.display(), img.color());

    let image = match img.color().channel_count() {
        1 => DynImage::L8(Image::new(size, img.into_luma8().into_raw())?),
        2 => DynImage::La8(Image::new(size, img.into_luma_alpha8().into_raw())?),
        4 => DynImage::Rgba8(Image::new(size, img.into_rgba8().into_raw())?),
        _ => DynImage::Rgb8(Image::new(size, img.into_rgb8().into_raw())?),
    };

    Ok(image)
}

/// Writes an image with values in `[0, 1]` to the given file path.
///
/// Values are clipped to `[0, 1]` and scaled to 8 bits. Missing parent directories are
/// created. Formats without alpha support drop the alpha channel.
///
/// # Arguments
///
/// * `file_path` - The destination path.
/// * `image` - The normalized image with 1 to 4 channels.
/// * `format` - The encoding to use, independent of the file extension.
pub fn write_image_normalized<const C: usize>(
    file_path: impl AsRef<Path>,
    image: &Image<f32, C>,
    format: ImageFormat,
) -> Result<(), IoError> {
    let file_path = file_path.as_ref();

    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let data = image
        .as_slice()
        .iter()
        .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect::<Vec<_>>();

    let (width, height) = (image.width() as u32, image.height() as u32);
    let size_mismatch = || {
        IoError::ImageCreationError(knn_image::ImageError::InvalidChannelShape(
            image.as_slice().len(),
            image.width() * image.height() * C,
        ))
    };

    let mut img = match C {
        1 => DynamicImage::ImageLuma8(
            ImageBuffer::from_raw(width, height, data).ok_or_else(size_mismatch)?,
        ),
        2 => DynamicImage::ImageLumaA8(
            ImageBuffer::from_raw(width, height, data).ok_or_else(size_mismatch)?,
        ),
        3 => DynamicImage::ImageRgb8(
            ImageBuffer::from_raw(width, height, data).ok_or_else(size_mismatch)?,
        ),
        4 => DynamicImage::ImageRgba8(
            ImageBuffer::from_raw(width, height, data).ok_or_else(size_mismatch)?,
        ),
        _ => return Err(IoError::UnsupportedChannelCount(C)),
    };

    if img.color().has_alpha() && !format.supports_alpha() {
        img = match C {
            2 => DynamicImage::ImageLuma8(img.to_luma8()),
            _ => DynamicImage::ImageRgb8(img.to_rgb8()),
        };
    }

    img.save_with_format(file_path, format.into())
        .map_err(IoError::ImageEncodeError)?;

    Ok(())
}
