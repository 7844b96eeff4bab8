use knn_image::{ImageError, ImageSize};

use crate::parallel::ParallelError;

/// An error type for the knn filter.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum KnnError {
    /// The window side is smaller than one pixel.
    #[error("window size n must be >= 1, got {0}")]
    WindowSizeTooSmall(i64),

    /// The window side is even, so the window has no center pixel.
    #[error("window size n must be odd (3, 5, 7, ...), got {0}")]
    EvenWindowSize(i64),

    /// The number of neighbors is negative.
    #[error("number of neighbors k must be >= 0, got {0}")]
    NegativeNeighbors(i64),

    /// The number of neighbors exceeds the number of entries around the center.
    #[error("number of neighbors k must be <= {max} for a {n}x{n} window, got {k}")]
    TooManyNeighbors {
        /// The requested number of neighbors.
        k: i64,
        /// The window side.
        n: i64,
        /// The largest valid number of neighbors, `n * n - 1`.
        max: i128,
    },

    /// A parameter does not fit in the platform word size.
    #[error("parameter {0} is too large for this platform")]
    ParameterOverflow(i64),

    /// The window does not fit inside the image.
    #[error("window size {n} exceeds the smallest dimension of the {size} image")]
    WindowTooLarge {
        /// The window side.
        n: usize,
        /// The image size.
        size: ImageSize,
    },

    /// A window was requested outside of the image.
    #[error("window of size {size} at ({row}, {col}) on channel {channel} is out of bounds")]
    WindowOutOfBounds {
        /// Row of the top-left pixel.
        row: usize,
        /// Column of the top-left pixel.
        col: usize,
        /// The channel index.
        channel: usize,
        /// The window side.
        size: usize,
    },

    /// The destination image does not have the valid convolution size.
    #[error("output image size {actual} does not match the expected size {expected}")]
    InvalidOutputSize {
        /// Size of the given destination image.
        actual: ImageSize,
        /// Size the destination image must have.
        expected: ImageSize,
    },

    /// Error from the image container.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Error from the parallel executor.
    #[error(transparent)]
    Parallel(#[from] ParallelError),
}

/// Validated parameters of the knn filter.
///
/// `n` is the odd side of the square window and `k` the number of neighbors averaged with
/// the center, `0 <= k <= n * n - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnnParams {
    window_size: usize,
    neighbors: usize,
}

impl KnnParams {
    /// Default window side.
    pub const DEFAULT_WINDOW_SIZE: usize = 3;

    /// Default number of neighbors.
    pub const DEFAULT_NEIGHBORS: usize = 5;

    /// Validate and create the filter parameters.
    ///
    /// # Arguments
    ///
    /// * `n` - The window side, an odd number >= 1.
    /// * `k` - The number of neighbors, between 0 and `n * n - 1`.
    ///
    /// # Errors
    ///
    /// The checks run in order: `n < 1`, `n` even, `k < 0`, `k > n * n - 1`.
    ///
    /// # Examples
    ///
    /// ```
    /// use knn_imgproc::filter::{KnnError, KnnParams};
    ///
    /// let params = KnnParams::new(5, 24).unwrap();
    /// assert_eq!(params.window_size(), 5);
    /// assert_eq!(params.neighbors(), 24);
    ///
    /// assert_eq!(KnnParams::new(4, 1), Err(KnnError::EvenWindowSize(4)));
    /// ```
    pub fn new(n: i64, k: i64) -> Result<Self, KnnError> {
        if n < 1 {
            return Err(KnnError::WindowSizeTooSmall(n));
        }

        if n % 2 == 0 {
            return Err(KnnError::EvenWindowSize(n));
        }

        if k < 0 {
            return Err(KnnError::NegativeNeighbors(k));
        }

        let max = i128::from(n) * i128::from(n) - 1;
        if i128::from(k) > max {
            return Err(KnnError::TooManyNeighbors { k, n, max });
        }

        Ok(Self {
            window_size: usize::try_from(n).map_err(|_| KnnError::ParameterOverflow(n))?,
            neighbors: usize::try_from(k).map_err(|_| KnnError::ParameterOverflow(k))?,
        })
    }

    /// The window side `n`.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// The number of neighbors `k`.
    pub fn neighbors(&self) -> usize {
        self.neighbors
    }

    /// Check that the window fits inside an image of the given size.
    ///
    /// # Errors
    ///
    /// Returns [`KnnError::WindowTooLarge`] if `n > min(width, height)`.
    pub fn check_image_size(&self, size: ImageSize) -> Result<(), KnnError> {
        if self.window_size > size.width.min(size.height) {
            return Err(KnnError::WindowTooLarge {
                n: self.window_size,
                size,
            });
        }
        Ok(())
    }
}

impl Default for KnnParams {
    fn default() -> Self {
        Self {
            window_size: Self::DEFAULT_WINDOW_SIZE,
            neighbors: Self::DEFAULT_NEIGHBORS,
        }
    }
}
