#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use knn_image as image;

#[doc(inline)]
pub use knn_imgproc as imgproc;

#[doc(inline)]
pub use knn_io as io;

/// End-to-end smoothing of an image file: validate, load, filter and save.
pub mod pipeline;
