//! Web APIs implementation.
//!
//! This crate provides the camera side of the host:
//! - Navigator, with its camera-access entry points
//! - Media Capture and Streams (devices, permission gate, streams)
//! - Camera capability detection across vendor prefixes
//! - Object URLs

pub mod media_devices;
pub mod navigator;
pub mod url;
pub mod user_media;

pub use media_devices::{
    CaptureDevice, DeviceInfo, DeviceKind, MediaDevices, MediaDevicesError, MediaStream,
    MediaStreamConstraints, PermissionState, SyntheticCamera, TrackSettings, VideoConstraints,
    VideoFrame,
};
pub use navigator::{CameraApis, Navigator};
pub use url::ObjectUrlRegistry;
pub use user_media::{UserMedia, UserMediaApi};
