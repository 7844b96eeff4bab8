use knn_image::Image;

use super::KnnError;

/// A read-only `n x n` view over a single channel of an image.
///
/// The window is rooted at its top-left pixel and borrows the image buffer, so it is cheap
/// to create one per output pixel.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a, T> {
    data: &'a [T],
    // offset of the top-left entry in `data`
    base: usize,
    row_stride: usize,
    channels: usize,
    size: usize,
}

impl<'a, T: Copy> Window<'a, T> {
    /// Create a window over one channel of an image.
    ///
    /// # Arguments
    ///
    /// * `image` - The source image.
    /// * `row` - Row of the top-left pixel of the window.
    /// * `col` - Column of the top-left pixel of the window.
    /// * `channel` - The channel the window reads from.
    /// * `size` - The side `n` of the window.
    ///
    /// # Errors
    ///
    /// Returns [`KnnError::WindowOutOfBounds`] if the window does not fit inside the image.
    ///
    /// # Examples
    ///
    /// ```
    /// use knn_image::Image;
    /// use knn_imgproc::filter::Window;
    ///
    /// let image = Image::<u8, 1>::new([3, 3].into(), (1..=9).collect()).unwrap();
    /// let window = Window::new(&image, 0, 0, 0, 3).unwrap();
    ///
    /// assert_eq!(window.center(), 5);
    /// assert_eq!(window.iter().collect::<Vec<_>>(), (1..=9).collect::<Vec<u8>>());
    /// ```
    pub fn new<const C: usize>(
        image: &'a Image<T, C>,
        row: usize,
        col: usize,
        channel: usize,
        size: usize,
    ) -> Result<Self, KnnError> {
        if size == 0
            || channel >= C
            || row >= image.height()
            || col >= image.width()
            || size > image.height() - row
            || size > image.width() - col
        {
            return Err(KnnError::WindowOutOfBounds {
                row,
                col,
                channel,
                size,
            });
        }

        Ok(Self::from_raw(
            image.as_slice(),
            image.row_stride(),
            C,
            row,
            col,
            channel,
            size,
        ))
    }

    /// Build a window from a raw interleaved buffer whose bounds the caller has checked.
    pub(crate) fn from_raw(
        data: &'a [T],
        row_stride: usize,
        channels: usize,
        row: usize,
        col: usize,
        channel: usize,
        size: usize,
    ) -> Self {
        Self {
            data,
            base: row * row_stride + col * channels + channel,
            row_stride,
            channels,
            size,
        }
    }

    /// The side `n` of the window.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of entries in the window, `n * n`.
    pub fn len(&self) -> usize {
        self.size * self.size
    }

    /// A window always holds at least one entry.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Get the entry at `(row, col)` relative to the window origin.
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.size || col >= self.size {
            return None;
        }
        Some(self.at(row, col))
    }

    /// Index of the center along each axis, `(n - 1) / 2`.
    pub fn center_index(&self) -> usize {
        (self.size - 1) / 2
    }

    /// The value at the center of the window.
    pub fn center(&self) -> T {
        let c = self.center_index();
        self.at(c, c)
    }

    /// Iterate over the window entries in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = T> + 'a {
        let Self {
            data,
            base,
            row_stride,
            channels,
            size,
        } = *self;

        (0..size).flat_map(move |r| {
            let start = base + r * row_stride;
            data[start..start + (size - 1) * channels + 1]
                .iter()
                .step_by(channels)
                .copied()
        })
    }

    fn at(&self, row: usize, col: usize) -> T {
        self.data[self.base + row * self.row_stride + col * self.channels]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knn_image::ImageError;

    #[test]
    fn test_window_iter_single_channel() -> Result<(), KnnError> {
        #[rustfmt::skip]
        let image = Image::<u8, 1>::new(
            [4, 3].into(),
            vec![
                1, 2, 3, 4,
                5, 6, 7, 8,
                9, 10, 11, 12,
            ],
        )?;

        let window = Window::new(&image, 1, 2, 0, 2)?;
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![7, 8, 11, 12]);
        assert_eq!(window.len(), 4);
        assert_eq!(window.center_index(), 0);
        assert_eq!(window.center(), 7);

        let window = Window::new(&image, 0, 1, 0, 3)?;
        assert_eq!(
            window.iter().collect::<Vec<_>>(),
            vec![2, 3, 4, 6, 7, 8, 10, 11, 12]
        );
        assert_eq!(window.center(), 7);
        assert_eq!(window.get(2, 0), Some(10));
        assert_eq!(window.get(3, 0), None);

        Ok(())
    }

    #[test]
    fn test_window_iter_interleaved_channels() -> Result<(), KnnError> {
        // 3x3 image with two channels, the second one is the first times 10
        let data = (1..=9u16).flat_map(|v| [v, v * 10]).collect();
        let image = Image::<u16, 2>::new([3, 3].into(), data)?;

        let window = Window::new(&image, 0, 0, 1, 3)?;
        assert_eq!(
            window.iter().collect::<Vec<_>>(),
            vec![10, 20, 30, 40, 50, 60, 70, 80, 90]
        );
        assert_eq!(window.center(), 50);

        let window = Window::new(&image, 1, 1, 0, 2)?;
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![5, 6, 8, 9]);

        Ok(())
    }

    #[test]
    fn test_window_out_of_bounds() -> Result<(), ImageError> {
        let image = Image::<u8, 3>::from_size_val([3, 3].into(), 0)?;

        assert!(matches!(
            Window::new(&image, 1, 0, 0, 3),
            Err(KnnError::WindowOutOfBounds { row: 1, .. })
        ));
        assert!(matches!(
            Window::new(&image, 0, 0, 3, 1),
            Err(KnnError::WindowOutOfBounds { channel: 3, .. })
        ));
        assert!(matches!(
            Window::new(&image, 0, 0, 0, 0),
            Err(KnnError::WindowOutOfBounds { size: 0, .. })
        ));

        // origins and sizes near usize::MAX must not wrap around
        assert!(matches!(
            Window::new(&image, usize::MAX, 0, 0, 3),
            Err(KnnError::WindowOutOfBounds { row: usize::MAX, .. })
        ));
        assert!(matches!(
            Window::new(&image, 0, usize::MAX - 1, 0, 2),
            Err(KnnError::WindowOutOfBounds { .. })
        ));
        assert!(matches!(
            Window::new(&image, 1, 1, 0, usize::MAX),
            Err(KnnError::WindowOutOfBounds { size: usize::MAX, .. })
        ));

        Ok(())
    }
}
