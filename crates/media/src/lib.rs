//! Object wrappers over canvas and video elements.
//!
//! This crate provides:
//! - `MediaObject`, the element handle behind every wrapper, and the
//!   `ElementWrapper` trait carrying `remove`, `toggle_visibility`, `get`
//!   and `set`
//! - `Video`: webcam capture and playback control
//! - `Canvas`: 2D drawing, image read/write and PNG export
//! - `Coords`: rectangles for drawing and clearing regions
//! - `util::extend`: shallow property-map merge

pub mod canvas;
pub mod config;
pub mod coords;
pub mod environment;
pub mod media_object;
pub mod util;
pub mod video;

pub use canvas::{Canvas, Context2d, Context2dRef, ContextType, ImageData, ImageSource};
pub use common::{MediafyError, MediafyResult};
pub use config::MediafyConfig;
pub use coords::Coords;
pub use environment::Environment;
pub use media_object::{ElementWrapper, Lookup, MediaObject, Source};
pub use video::{MediaReadyState, Video};
