/// An error type for the io module.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// Error when the file does not exist.
    #[error("File does not exist: {0}")]
    FileDoesNotExist(std::path::PathBuf),

    /// Unknown image format name or extension.
    #[error("Unsupported image format: {0}")]
    InvalidFileExtension(String),

    /// Error to open, read or write the file.
    #[error("Failed to manipulate the file. {0}")]
    FileError(#[from] std::io::Error),

    /// Error to create the image.
    #[error("Failed to create image. {0}")]
    ImageCreationError(#[from] knn_image::ImageError),

    /// Error to decode the image.
    #[error("Failed to decode the image. Format might not be compatible or data corrupted. {0}")]
    ImageDecodeError(#[from] image::ImageError),

    /// Error to encode the image.
    #[error("Failed to encode the image. {0}")]
    ImageEncodeError(image::ImageError),

    /// The number of channels has no matching pixel layout.
    #[error("Images with {0} channels cannot be encoded")]
    UnsupportedChannelCount(usize),
}
