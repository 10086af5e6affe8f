//! Navigator API implementation.

use crate::media_devices::MediaDevices;
use bitflags::bitflags;
use std::sync::Arc;

bitflags! {
    /// Camera-access entry points a navigator exposes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct CameraApis: u8 {
        /// `navigator.mediaDevices.getUserMedia`
        const MEDIA_DEVICES = 1 << 0;
        /// `navigator.getUserMedia`
        const LEGACY = 1 << 1;
        /// `navigator.webkitGetUserMedia`
        const WEBKIT = 1 << 2;
        /// `navigator.mozGetUserMedia`
        const MOZ = 1 << 3;
        /// `navigator.msGetUserMedia`
        const MS = 1 << 4;
    }
}

/// Navigator API implementation.
#[derive(Clone, Debug)]
pub struct Navigator {
    /// User agent string.
    user_agent: String,
    /// Platform.
    platform: String,
    /// Language.
    language: String,
    /// Online status.
    online: bool,
    /// Exposed camera entry points.
    camera_apis: CameraApis,
    /// Backend shared by every camera entry point.
    media_devices: Arc<MediaDevices>,
}

impl Navigator {
    /// Create a navigator exposing only the standard `mediaDevices` API.
    pub fn new() -> Self {
        Self {
            user_agent: format!(
                "Mozilla/5.0 ({}) mediafy/{}",
                std::env::consts::OS,
                env!("CARGO_PKG_VERSION")
            ),
            platform: std::env::consts::OS.to_string(),
            language: "en-US".to_string(),
            online: true,
            camera_apis: CameraApis::MEDIA_DEVICES,
            media_devices: Arc::new(MediaDevices::new()),
        }
    }

    /// Create with custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Replace the set of exposed camera entry points.
    pub fn with_camera_apis(mut self, apis: CameraApis) -> Self {
        self.camera_apis = apis;
        self
    }

    /// Use an existing device backend.
    pub fn with_media_devices(mut self, devices: Arc<MediaDevices>) -> Self {
        self.media_devices = devices;
        self
    }

    /// Set online status.
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// Get the user agent.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Get the platform.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Get the language.
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Check if online.
    pub fn online(&self) -> bool {
        self.online
    }

    pub fn camera_apis(&self) -> CameraApis {
        self.camera_apis
    }

    /// `navigator.mediaDevices`, if exposed.
    pub fn media_devices(&self) -> Option<&Arc<MediaDevices>> {
        self.camera_apis
            .contains(CameraApis::MEDIA_DEVICES)
            .then_some(&self.media_devices)
    }

    /// Backend behind a legacy entry point, if that entry point is exposed.
    pub fn legacy_get_user_media(&self, api: CameraApis) -> Option<&Arc<MediaDevices>> {
        (api != CameraApis::MEDIA_DEVICES && self.camera_apis.contains(api))
            .then_some(&self.media_devices)
    }

    /// The device backend regardless of which entry points are exposed.
    pub fn devices(&self) -> &Arc<MediaDevices> {
        &self.media_devices
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}
