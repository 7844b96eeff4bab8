use rayon::prelude::*;
use thiserror::Error;

/// Errors that can occur during parallel execution.
#[derive(Error, Debug, PartialEq)]
pub enum ParallelError {
    /// The thread pool failed to build.
    #[error("failed to build thread pool: {0}")]
    BuildError(String),

    /// The requested thread count is invalid.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),

    /// The row stride must be a positive number of elements.
    #[error("row stride must be > 0, got {0}")]
    InvalidRowStride(usize),

    /// The destination buffer is not a whole number of rows.
    #[error("buffer of length {0} is not a multiple of the row stride {1}")]
    SizeMismatch(usize, usize),
}

/// Controls how row-parallel operations are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStrategy {
    /// Use the global Rayon thread pool and hand out output rows as independent tasks.
    ///
    /// Every task owns a disjoint row of the destination buffer, so no locking is needed.
    #[default]
    ParallelRows,

    /// Run sequentially on the current thread.
    ///
    /// Useful for small images, debugging, or when the overhead of parallelization
    /// outweighs the benefits.
    Serial,

    /// Run on a local thread pool with `n` threads.
    ///
    /// # Warning
    /// Creates a new thread pool on every call, which has significant overhead.
    /// Use this primarily for benchmarking or specific isolation needs.
    Fixed(usize),
}

/// Apply a function to every row of a destination buffer with the given strategy.
///
/// The buffer is split into disjoint chunks of `row_stride` elements. Each worker
/// creates its own state with `init` once and reuses it for all the rows it
/// processes, which lets callers keep per-thread scratch memory.
///
/// # Arguments
///
/// * `dst` - The destination buffer.
/// * `row_stride` - Number of elements in one row.
/// * `strategy` - The execution strategy.
/// * `init` - Creates the per-worker state.
/// * `f` - Called with the worker state, the row index and the mutable row.
///
/// # Errors
///
/// Returns an error when the stride does not split the buffer into whole rows or
/// when a local thread pool cannot be created.
pub fn par_iter_rows_init<T, S, I, F>(
    dst: &mut [T],
    row_stride: usize,
    strategy: ExecutionStrategy,
    init: I,
    f: F,
) -> Result<(), ParallelError>
where
    T: Send,
    I: Fn() -> S + Send + Sync,
    F: Fn(&mut S, usize, &mut [T]) + Send + Sync,
{
    if row_stride == 0 {
        return Err(ParallelError::InvalidRowStride(row_stride));
    }

    if dst.len() % row_stride != 0 {
        return Err(ParallelError::SizeMismatch(dst.len(), row_stride));
    }

    match strategy {
        ExecutionStrategy::Serial => {
            let mut state = init();
            dst.chunks_mut(row_stride)
                .enumerate()
                .for_each(|(r, row)| f(&mut state, r, row));
        }
        ExecutionStrategy::ParallelRows => {
            dst.par_chunks_mut(row_stride)
                .enumerate()
                .for_each_init(&init, |state, (r, row)| f(state, r, row));
        }
        ExecutionStrategy::Fixed(n) => {
            if n == 0 {
                return Err(ParallelError::InvalidThreadCount(n));
            }
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| ParallelError::BuildError(e.to_string()))?;

            pool.install(|| {
                dst.par_chunks_mut(row_stride)
                    .enumerate()
                    .for_each_init(&init, |state, (r, row)| f(state, r, row));
            });
        }
    }
    Ok(())
}
