//! One-time resolution of the camera-access entry point.
//!
//! Older engines only expose `getUserMedia` on the navigator itself,
//! sometimes behind a vendor prefix. [`UserMedia::detect`] picks the first
//! available entry point once; every later capture request goes through it.

use crate::media_devices::{MediaDevices, MediaDevicesError, MediaStream, MediaStreamConstraints};
use crate::navigator::{CameraApis, Navigator};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// A camera-access entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UserMediaApi {
    /// `navigator.mediaDevices.getUserMedia`
    MediaDevices,
    /// `navigator.getUserMedia`
    Legacy,
    Webkit,
    Moz,
    Ms,
}

impl UserMediaApi {
    /// Detection order.
    pub const ALL: [UserMediaApi; 5] = [
        UserMediaApi::MediaDevices,
        UserMediaApi::Legacy,
        UserMediaApi::Webkit,
        UserMediaApi::Moz,
        UserMediaApi::Ms,
    ];

    pub fn flag(&self) -> CameraApis {
        match self {
            UserMediaApi::MediaDevices => CameraApis::MEDIA_DEVICES,
            UserMediaApi::Legacy => CameraApis::LEGACY,
            UserMediaApi::Webkit => CameraApis::WEBKIT,
            UserMediaApi::Moz => CameraApis::MOZ,
            UserMediaApi::Ms => CameraApis::MS,
        }
    }

    /// Script-visible name of the entry point.
    pub fn name(&self) -> &'static str {
        match self {
            UserMediaApi::MediaDevices => "mediaDevices.getUserMedia",
            UserMediaApi::Legacy => "getUserMedia",
            UserMediaApi::Webkit => "webkitGetUserMedia",
            UserMediaApi::Moz => "mozGetUserMedia",
            UserMediaApi::Ms => "msGetUserMedia",
        }
    }
}

impl fmt::Display for UserMediaApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UserMediaApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "mediadevices" => Ok(UserMediaApi::MediaDevices),
            "legacy" | "unprefixed" => Ok(UserMediaApi::Legacy),
            "webkit" => Ok(UserMediaApi::Webkit),
            "moz" => Ok(UserMediaApi::Moz),
            "ms" => Ok(UserMediaApi::Ms),
            other => Err(format!("unknown camera API: {}", other)),
        }
    }
}

/// The resolved camera capability.
#[derive(Clone, Debug)]
pub struct UserMedia {
    resolved: Option<(UserMediaApi, Arc<MediaDevices>)>,
}

impl UserMedia {
    /// Pick the first entry point the navigator exposes.
    pub fn detect(navigator: &Navigator) -> Self {
        let resolved = UserMediaApi::ALL.iter().find_map(|&api| {
            let devices = match api {
                UserMediaApi::MediaDevices => navigator.media_devices(),
                _ => navigator.legacy_get_user_media(api.flag()),
            };
            devices.map(|d| (api, d.clone()))
        });

        match &resolved {
            Some((api, _)) => debug!(api = %api, "camera access resolved"),
            None => warn!("no camera access entry point available"),
        }
        Self { resolved }
    }

    /// A capability that never grants access.
    pub fn unsupported() -> Self {
        Self { resolved: None }
    }

    pub fn api(&self) -> Option<UserMediaApi> {
        self.resolved.as_ref().map(|(api, _)| *api)
    }

    pub fn is_supported(&self) -> bool {
        self.resolved.is_some()
    }

    /// Request a stream through the resolved entry point.
    pub async fn get_user_media(
        &self,
        constraints: &MediaStreamConstraints,
    ) -> Result<MediaStream, MediaDevicesError> {
        let (api, devices) = self
            .resolved
            .as_ref()
            .ok_or(MediaDevicesError::NotSupported)?;
        debug!(api = %api, "requesting camera stream");
        devices.get_user_media(constraints).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_devices::{PermissionState, SyntheticCamera};

    #[test]
    fn test_detect_prefers_standard() {
        let nav = Navigator::new().with_camera_apis(CameraApis::all());
        assert_eq!(UserMedia::detect(&nav).api(), Some(UserMediaApi::MediaDevices));
    }

    #[test]
    fn test_detect_prefix_order() {
        let nav = Navigator::new().with_camera_apis(CameraApis::MOZ | CameraApis::MS);
        assert_eq!(UserMedia::detect(&nav).api(), Some(UserMediaApi::Moz));

        let nav = Navigator::new().with_camera_apis(CameraApis::WEBKIT | CameraApis::MOZ);
        assert_eq!(UserMedia::detect(&nav).api(), Some(UserMediaApi::Webkit));
    }

    #[test]
    fn test_detect_none() {
        let nav = Navigator::new().with_camera_apis(CameraApis::empty());
        let user_media = UserMedia::detect(&nav);
        assert!(!user_media.is_supported());
        assert_eq!(user_media.api(), None);
    }

    #[test]
    fn test_parse_api() {
        assert_eq!("standard".parse::<UserMediaApi>(), Ok(UserMediaApi::MediaDevices));
        assert_eq!("WebKit".parse::<UserMediaApi>(), Ok(UserMediaApi::Webkit));
        assert!("opera".parse::<UserMediaApi>().is_err());
    }

    #[tokio::test]
    async fn test_unsupported_request() {
        let err = UserMedia::unsupported()
            .get_user_media(&MediaStreamConstraints::video())
            .await
            .unwrap_err();
        assert_eq!(err, MediaDevicesError::NotSupported);
    }

    #[tokio::test]
    async fn test_prefixed_request_reaches_devices() {
        let nav = Navigator::new().with_camera_apis(CameraApis::WEBKIT);
        nav.devices().add_device(Arc::new(SyntheticCamera::new("Cam")));
        nav.devices().set_permission(PermissionState::Granted);

        let stream = UserMedia::detect(&nav)
            .get_user_media(&MediaStreamConstraints::video())
            .await
            .unwrap();
        assert_eq!(stream.label(), "Cam");
    }
}
