//! Common utilities and types shared by the mediafy crates.

pub mod bitmap;
pub mod error;
pub mod geometry;

pub use bitmap::{Bitmap, SharedBitmap};
pub use error::{MediafyError, MediafyResult};
pub use geometry::{PixelRect, Rect, Size};
