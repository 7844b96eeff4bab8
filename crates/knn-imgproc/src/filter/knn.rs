use knn_image::{Image, ImageSize};
use num_traits::ToPrimitive;

use super::{KnnError, KnnParams, Window};
use crate::parallel::{par_iter_rows_init, ExecutionStrategy};

/// Assumed maximum intensity of the input data, used to normalize the output into `[0, 1]`.
pub const MAX_INTENSITY: f64 = 255.0;

/// Pixel types the knn filter can rank and average.
///
/// Any numeric type that converts to `f64` qualifies, e.g. `u8`, `i16` or `f32`. Ranking and
/// averaging happen in `f64`, so differences never overflow the pixel type.
pub trait KnnPixel: Copy + ToPrimitive + Send + Sync {}

impl<T> KnnPixel for T where T: Copy + ToPrimitive + Send + Sync {}

/// Compute the size of the image produced by [`knn_smooth`].
///
/// Only positions where the full `n x n` window fits are computed, so the output is
/// `(width - n + 1) x (height - n + 1)`.
///
/// Returns `None` when `n` is zero or larger than one of the image dimensions.
///
/// # Examples
///
/// ```
/// use knn_image::ImageSize;
/// use knn_imgproc::filter::knn_output_size;
///
/// let size = ImageSize { width: 640, height: 480 };
/// assert_eq!(knn_output_size(size, 5), Some(ImageSize { width: 636, height: 476 }));
/// assert_eq!(knn_output_size(size, 481), None);
/// ```
pub fn knn_output_size(size: ImageSize, n: usize) -> Option<ImageSize> {
    if n == 0 || n > size.width || n > size.height {
        return None;
    }
    Some(ImageSize {
        width: size.width - n + 1,
        height: size.height - n + 1,
    })
}

/// Average the center of a window with its `k` closest-valued neighbors.
///
/// The window entries are taken in row-major order and stable-sorted by their absolute
/// difference to the center value. The first `k + 1` entries are averaged and the mean is
/// divided by [`MAX_INTENSITY`].
///
/// Entries with the same difference keep their row-major order, so when other entries tie
/// with the center value they may rank before it. A NaN difference ranks after every number.
///
/// # Arguments
///
/// * `window` - The window to average.
/// * `k` - The number of neighbors, at most `n * n - 1`.
///
/// # Examples
///
/// ```
/// use knn_image::Image;
/// use knn_imgproc::filter::{knn_average, Window};
///
/// let image = Image::<u8, 1>::new([3, 3].into(), vec![10, 20, 30, 40, 50, 60, 70, 80, 90]).unwrap();
/// let window = Window::new(&image, 0, 0, 0, 3).unwrap();
///
/// // 50 plus its two nearest values 40 and 60
/// assert!((knn_average(&window, 2) - 50.0 / 255.0).abs() < 1e-6);
/// ```
pub fn knn_average<T: KnnPixel>(window: &Window<'_, T>, k: usize) -> f32 {
    let mut scratch = Vec::with_capacity(window.len());
    knn_average_with(window, k, &mut scratch)
}

/// Same as [`knn_average`] but reuses `scratch` to hold the ranked entries.
pub fn knn_average_with<T: KnnPixel>(
    window: &Window<'_, T>,
    k: usize,
    scratch: &mut Vec<(f64, f64)>,
) -> f32 {
    let center = window.center().to_f64().unwrap_or(f64::NAN);

    scratch.clear();
    scratch.extend(window.iter().map(|v| {
        let v = v.to_f64().unwrap_or(f64::NAN);
        ((v - center).abs(), v)
    }));

    // NOTE: sort_by is stable, ties keep the row-major order
    scratch.sort_by(|a, b| a.0.total_cmp(&b.0));

    let count = (k + 1).min(scratch.len());
    let sum = scratch[..count].iter().map(|&(_, v)| v).sum::<f64>();

    (sum / count as f64 / MAX_INTENSITY) as f32
}

/// Smooth an image with the k-nearest-by-value filter.
///
/// For every channel and every position where an `n x n` window fits, the output value is
/// [`knn_average`] of that window. No padding is applied, the output is `n - 1` pixels
/// smaller than the input in each dimension (see [`knn_output_size`]).
///
/// Output rows are computed independently according to `strategy`.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H - n + 1, W - n + 1, C).
/// * `params` - The validated window size and number of neighbors.
/// * `strategy` - How the output rows are scheduled.
///
/// # Errors
///
/// Returns an error if the window does not fit in `src` or if `dst` has the wrong size.
/// Both checks happen before any pixel is computed.
///
/// # Examples
///
/// ```
/// use knn_image::Image;
/// use knn_imgproc::filter::{knn_smooth, KnnParams};
/// use knn_imgproc::parallel::ExecutionStrategy;
///
/// let src = Image::<u8, 1>::from_size_val([5, 4].into(), 255).unwrap();
/// let mut dst = Image::<f32, 1>::from_size_val([3, 2].into(), 0.0).unwrap();
///
/// knn_smooth(&src, &mut dst, &KnnParams::new(3, 4).unwrap(), ExecutionStrategy::Serial).unwrap();
///
/// assert_eq!(dst.as_slice(), &[1.0; 6]);
/// ```
pub fn knn_smooth<T: KnnPixel, const C: usize>(
    src: &Image<T, C>,
    dst: &mut Image<f32, C>,
    params: &KnnParams,
    strategy: ExecutionStrategy,
) -> Result<(), KnnError> {
    params.check_image_size(src.size())?;

    let n = params.window_size();
    let k = params.neighbors();

    let expected = knn_output_size(src.size(), n).ok_or(KnnError::WindowTooLarge {
        n,
        size: src.size(),
    })?;

    if dst.size() != expected {
        return Err(KnnError::InvalidOutputSize {
            actual: dst.size(),
            expected,
        });
    }

    log::debug!(
        "knn smoothing {} -> {} with n = {n}, k = {k}, {strategy:?}",
        src.size(),
        expected
    );

    let src_data = src.as_slice();
    let src_stride = src.row_stride();

    par_iter_rows_init(
        dst.as_slice_mut(),
        expected.width * C,
        strategy,
        || Vec::with_capacity(n * n),
        |scratch, row, dst_row| {
            dst_row
                .chunks_exact_mut(C)
                .enumerate()
                .for_each(|(col, dst_pixel)| {
                    for (ch, out) in dst_pixel.iter_mut().enumerate() {
                        let window = Window::from_raw(src_data, src_stride, C, row, col, ch, n);
                        *out = knn_average_with(&window, k, scratch);
                    }
                });
        },
    )?;

    Ok(())
}

/// Smooth an image with the k-nearest-by-value filter into a newly allocated image.
///
/// See [`knn_smooth`].
pub fn knn_smooth_new<T: KnnPixel, const C: usize>(
    src: &Image<T, C>,
    params: &KnnParams,
    strategy: ExecutionStrategy,
) -> Result<Image<f32, C>, KnnError> {
    params.check_image_size(src.size())?;

    let size = knn_output_size(src.size(), params.window_size()).ok_or(
        KnnError::WindowTooLarge {
            n: params.window_size(),
            size: src.size(),
        },
    )?;

    let mut dst = Image::from_size_val(size, 0.0f32)?;
    knn_smooth(src, &mut dst, params, strategy)?;

    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn random_image<const C: usize>(size: ImageSize, seed: u64) -> Result<Image<u8, C>, KnnError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..size.width * size.height * C)
            .map(|_| rng.random::<u8>())
            .collect();
        Ok(Image::new(size, data)?)
    }

    #[test]
    fn test_knn_average_center_only() -> Result<(), KnnError> {
        let image = Image::<u8, 1>::new([3, 3].into(), vec![10, 20, 30, 40, 50, 60, 70, 80, 90])?;
        let window = Window::new(&image, 0, 0, 0, 3)?;

        assert_relative_eq!(knn_average(&window, 0), 50.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(knn_average(&window, 8), 50.0 / 255.0, epsilon = 1e-6);

        Ok(())
    }

    #[test]
    fn test_knn_average_asymmetric() -> Result<(), KnnError> {
        let image = Image::<u16, 1>::new([3, 3].into(), vec![10, 20, 30, 40, 50, 60, 70, 80, 900])?;
        let window = Window::new(&image, 0, 0, 0, 3)?;

        // the outlier shifts the full mean but not the center value
        assert_relative_eq!(knn_average(&window, 0), 50.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(knn_average(&window, 8), 140.0 / 255.0, epsilon = 1e-6);

        // 50, then 40 and 60 tie and keep row-major order, then 30 and 70
        assert_relative_eq!(knn_average(&window, 1), 45.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(knn_average(&window, 4), 50.0 / 255.0, epsilon = 1e-6);
        // the outlier only enters with the last neighbor
        assert_relative_eq!(knn_average(&window, 7), 45.0 / 255.0, epsilon = 1e-6);

        Ok(())
    }

    #[test]
    fn test_knn_average_stable_ties() -> Result<(), KnnError> {
        #[rustfmt::skip]
        let image = Image::<u8, 1>::new(
            [3, 3].into(),
            vec![
                50, 52, 50,
                10, 50, 90,
                200, 48, 51,
            ],
        )?;
        let window = Window::new(&image, 0, 0, 0, 3)?;

        // three entries equal the center, then 51
        assert_relative_eq!(knn_average(&window, 0), 50.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(knn_average(&window, 3), 201.0 / 4.0 / 255.0, epsilon = 1e-6);
        // 52 and 48 tie, 52 comes first in row-major order
        assert_relative_eq!(knn_average(&window, 4), 253.0 / 5.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(knn_average(&window, 5), 301.0 / 6.0 / 255.0, epsilon = 1e-6);

        Ok(())
    }

    #[test]
    fn test_knn_average_uniform() -> Result<(), KnnError> {
        let image = Image::<u8, 1>::from_size_val([5, 5].into(), 37)?;
        let window = Window::new(&image, 0, 0, 0, 5)?;

        for k in 0..25 {
            assert_relative_eq!(knn_average(&window, k), 37.0 / 255.0, epsilon = 1e-6);
        }

        Ok(())
    }

    #[test]
    fn test_knn_average_float_input() -> Result<(), KnnError> {
        let image = Image::<f32, 1>::new([3, 3].into(), vec![0.0, 0.0, 0.0, 0.0, 25.5, 51.0, 0.0, 0.0, 0.0])?;
        let window = Window::new(&image, 0, 0, 0, 3)?;

        // 0 and 51 tie around 25.5, the first 0 in row-major order wins
        assert_relative_eq!(knn_average(&window, 1), 12.75 / 255.0, epsilon = 1e-6);

        Ok(())
    }

    #[test]
    fn test_knn_average_signed_extremes() -> Result<(), KnnError> {
        #[rustfmt::skip]
        let image = Image::<i8, 1>::new(
            [3, 3].into(),
            vec![
                -128, 0, 0,
                0, 127, 0,
                0, 0, 0,
            ],
        )?;
        let window = Window::new(&image, 0, 0, 0, 3)?;

        // -128 is 255 away from the center and ranks last
        assert_relative_eq!(knn_average(&window, 1), 63.5 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(knn_average(&window, 7), 127.0 / 8.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(knn_average(&window, 8), -1.0 / 9.0 / 255.0, epsilon = 1e-6);

        let mut data = vec![0i32; 9];
        data[0] = i32::MIN;
        data[4] = i32::MAX;
        let image = Image::<i32, 1>::new([3, 3].into(), data)?;
        let window = Window::new(&image, 0, 0, 0, 3)?;
        assert_relative_eq!(knn_average(&window, 8), -1.0 / 9.0 / 255.0, epsilon = 1e-6);

        Ok(())
    }

    #[test]
    fn test_knn_average_nan_ranks_last() -> Result<(), KnnError> {
        let image = Image::<f32, 1>::new(
            [3, 3].into(),
            vec![f32::NAN, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0],
        )?;
        let window = Window::new(&image, 0, 0, 0, 3)?;

        assert_relative_eq!(knn_average(&window, 0), 50.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(knn_average(&window, 7), 55.0 / 255.0, epsilon = 1e-6);
        assert!(knn_average(&window, 8).is_nan());

        Ok(())
    }

    #[test]
    fn test_knn_smooth_float_with_nans() -> Result<(), KnnError> {
        let data = (0..49)
            .map(|i| if i % 11 == 0 { f32::NAN } else { i as f32 })
            .collect();
        let src = Image::<f32, 1>::new([7, 7].into(), data)?;

        for k in 0..49 {
            let params = KnnParams::new(7, k)?;
            let dst = knn_smooth_new(&src, &params, ExecutionStrategy::Serial)?;
            assert_eq!(dst.size(), ImageSize { width: 1, height: 1 });
        }

        Ok(())
    }

    #[test]
    fn test_knn_output_size() {
        for (width, height, n) in [(3, 3, 3), (10, 7, 1), (10, 7, 5), (10, 7, 7), (4, 9, 3)] {
            let size = ImageSize { width, height };
            assert_eq!(
                knn_output_size(size, n),
                Some(ImageSize {
                    width: width - n + 1,
                    height: height - n + 1,
                })
            );
        }

        assert_eq!(knn_output_size([4, 9].into(), 5), None);
        assert_eq!(knn_output_size([4, 9].into(), 0), None);
    }

    #[test]
    fn test_knn_smooth_shape() -> Result<(), KnnError> {
        let src = random_image::<3>([11, 8].into(), 0)?;

        for n in [1, 3, 5, 7] {
            let params = KnnParams::new(n as i64, 0)?;
            let dst = knn_smooth_new(&src, &params, ExecutionStrategy::default())?;
            assert_eq!(dst.width(), 11 - n + 1);
            assert_eq!(dst.height(), 8 - n + 1);
            assert_eq!(dst.num_channels(), 3);
        }

        Ok(())
    }

    #[test]
    fn test_knn_smooth_identity() -> Result<(), KnnError> {
        let src = random_image::<3>([6, 5].into(), 1)?;

        // a 1x1 window only sees the pixel itself
        let dst = knn_smooth_new(&src, &KnnParams::new(1, 0)?, ExecutionStrategy::Serial)?;
        let expected = src.cast_and_scale(1.0f32 / 255.0)?;

        dst.as_slice()
            .iter()
            .zip(expected.as_slice())
            .for_each(|(a, b)| assert_relative_eq!(*a, *b, epsilon = 1e-6));

        Ok(())
    }

    #[test]
    fn test_knn_smooth_box_blur() -> Result<(), KnnError> {
        let src = random_image::<2>([7, 6].into(), 2)?;
        let params = KnnParams::new(3, 8)?;
        let dst = knn_smooth_new(&src, &params, ExecutionStrategy::ParallelRows)?;

        for row in 0..dst.height() {
            for col in 0..dst.width() {
                for ch in 0..2 {
                    let mut sum = 0.0;
                    for dy in 0..3 {
                        for dx in 0..3 {
                            sum += src.get_pixel(col + dx, row + dy, ch)? as f64;
                        }
                    }
                    let expected = (sum / 9.0 / 255.0) as f32;
                    assert_relative_eq!(dst.get_pixel(col, row, ch)?, expected, epsilon = 1e-6);
                }
            }
        }

        Ok(())
    }

    #[test]
    fn test_knn_smooth_center_without_duplicates() -> Result<(), KnnError> {
        // all values distinct, so k = 0 keeps the center pixel
        let src = Image::<u8, 1>::new([6, 5].into(), (0..30).map(|x| x * 7).collect())?;
        let dst = knn_smooth_new(&src, &KnnParams::new(3, 0)?, ExecutionStrategy::Serial)?;

        for row in 0..dst.height() {
            for col in 0..dst.width() {
                let center = src.get_pixel(col + 1, row + 1, 0)? as f32;
                assert_relative_eq!(dst.get_pixel(col, row, 0)?, center / 255.0, epsilon = 1e-6);
            }
        }

        Ok(())
    }

    #[test]
    fn test_knn_smooth_preserves_edge() -> Result<(), KnnError> {
        // left half dark, right half bright
        let src = Image::<u8, 1>::new(
            [6, 3].into(),
            (0..18).map(|i| if i % 6 < 3 { 10 } else { 200 }).collect(),
        )?;
        let dst = knn_smooth_new(&src, &KnnParams::new(3, 2)?, ExecutionStrategy::Serial)?;

        #[rustfmt::skip]
        let expected = [
            10.0f32, 10.0, 200.0, 200.0,
        ];
        dst.as_slice()
            .iter()
            .zip(expected.iter())
            .for_each(|(a, b)| assert_relative_eq!(*a, b / 255.0, epsilon = 1e-6));

        Ok(())
    }

    #[test]
    fn test_knn_smooth_channels_are_independent() -> Result<(), KnnError> {
        let data = (0..25u8).flat_map(|x| [x * 10, 100]).collect();
        let src = Image::<u8, 2>::new([5, 5].into(), data)?;
        let dst = knn_smooth_new(&src, &KnnParams::new(5, 24)?, ExecutionStrategy::Serial)?;

        assert_eq!(dst.size(), ImageSize { width: 1, height: 1 });
        assert_relative_eq!(dst.get_pixel(0, 0, 0)?, 120.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(dst.get_pixel(0, 0, 1)?, 100.0 / 255.0, epsilon = 1e-6);

        Ok(())
    }

    #[test]
    fn test_knn_smooth_strategies_are_identical() -> Result<(), KnnError> {
        let src = random_image::<3>([32, 24].into(), 3)?;
        let params = KnnParams::new(5, 7)?;

        let serial = knn_smooth_new(&src, &params, ExecutionStrategy::Serial)?;
        let rows = knn_smooth_new(&src, &params, ExecutionStrategy::ParallelRows)?;
        let fixed = knn_smooth_new(&src, &params, ExecutionStrategy::Fixed(3))?;
        let again = knn_smooth_new(&src, &params, ExecutionStrategy::Serial)?;

        assert_eq!(serial.as_slice(), rows.as_slice());
        assert_eq!(serial.as_slice(), fixed.as_slice());
        assert_eq!(serial.as_slice(), again.as_slice());

        Ok(())
    }

    #[test]
    fn test_knn_smooth_rejects_bad_sizes() -> Result<(), KnnError> {
        let src = Image::<u8, 1>::from_size_val([4, 6].into(), 0)?;

        let params = KnnParams::new(5, 0)?;
        let mut dst = Image::<f32, 1>::from_size_val([1, 1].into(), 0.0)?;
        assert_eq!(
            knn_smooth(&src, &mut dst, &params, ExecutionStrategy::Serial),
            Err(KnnError::WindowTooLarge {
                n: 5,
                size: src.size(),
            })
        );

        let params = KnnParams::new(3, 0)?;
        let mut dst = Image::<f32, 1>::from_size_val([4, 6].into(), -1.0)?;
        assert_eq!(
            knn_smooth(&src, &mut dst, &params, ExecutionStrategy::Serial),
            Err(KnnError::InvalidOutputSize {
                actual: [4, 6].into(),
                expected: [2, 4].into(),
            })
        );
        // nothing is written on error
        assert!(dst.as_slice().iter().all(|&v| v == -1.0));

        assert_eq!(
            knn_smooth_new(&src, &params, ExecutionStrategy::Fixed(0)).map(|_| ()),
            Err(KnnError::Parallel(crate::parallel::ParallelError::InvalidThreadCount(0)))
        );

        Ok(())
    }
}
