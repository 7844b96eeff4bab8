//! Filter operations
//!
//! This module provides the k-nearest-by-value smoothing filter: every output pixel is the
//! mean of the window entries whose values are closest to the window center.

/// Filter parameters and errors
mod params;
pub use params::*;

/// Read-only window views
mod window;
pub use window::*;

/// k-nearest-by-value averaging and convolution
mod knn;
pub use knn::*;
