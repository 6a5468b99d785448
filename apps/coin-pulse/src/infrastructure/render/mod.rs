//! Software Raster Surface
//!
//! `PixelBuffer` implements the `Surface` port over a plain RGBA buffer so
//! charts can be rendered headless and written out as PPM images.

mod pixel_buffer;

pub use pixel_buffer::PixelBuffer;
