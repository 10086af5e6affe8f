//! Wrapper configuration.

use crate::canvas::ContextType;
use serde::{Deserialize, Serialize};
use web_apis::VideoConstraints;

/// Configuration shared by every wrapper built from one environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediafyConfig {
    /// Class toggled by `toggle_visibility`.
    pub hide_class: String,
    /// Context type `Canvas::get_context(None)` acquires.
    pub default_context: ContextType,
    /// MIME type `Canvas::export_image` encodes with.
    pub export_mime: String,
    /// Constraints `Video::load_user_media` requests.
    pub video: VideoConstraints,
    /// URL of the host document; object URLs are minted under its origin.
    pub document_url: String,
}

impl MediafyConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Set the hide class.
    pub fn with_hide_class(mut self, class: impl Into<String>) -> Self {
        self.hide_class = class.into();
        self
    }

    /// Set the export MIME type.
    pub fn with_export_mime(mut self, mime: impl Into<String>) -> Self {
        self.export_mime = mime.into();
        self
    }

    /// Set the requested capture resolution.
    pub fn with_video_size(mut self, width: u32, height: u32) -> Self {
        self.video.width = Some(width);
        self.video.height = Some(height);
        self
    }

    /// Set the requested capture frame rate.
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.video.frame_rate = Some(frame_rate);
        self
    }

    /// Set the document URL.
    pub fn with_document_url(mut self, url: impl Into<String>) -> Self {
        self.document_url = url.into();
        self
    }
}

impl Default for MediafyConfig {
    fn default() -> Self {
        Self {
            hide_class: "hide".to_string(),
            default_context: ContextType::TwoD,
            export_mime: "image/png".to_string(),
            video: VideoConstraints::default(),
            document_url: "about:blank".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MediafyConfig::default();
        assert_eq!(config.hide_class, "hide");
        assert_eq!(config.default_context, ContextType::TwoD);
        assert_eq!(config.export_mime, "image/png");
        assert_eq!(config.video.width, None);
    }

    #[test]
    fn test_partial_json() {
        let config = MediafyConfig::from_json(
            r#"{"hideClass":"is-hidden","video":{"width":320,"height":240,"frameRate":15}}"#,
        )
        .unwrap();
        assert_eq!(config.hide_class, "is-hidden");
        assert_eq!(config.video.width, Some(320));
        assert_eq!(config.video.frame_rate, Some(15.0));
        assert_eq!(config.export_mime, "image/png");
    }

    #[test]
    fn test_builder() {
        let config = MediafyConfig::new()
            .with_hide_class("gone")
            .with_video_size(64, 48)
            .with_frame_rate(10.0);
        assert_eq!(config.hide_class, "gone");
        assert_eq!(config.video.height, Some(48));
        assert_eq!(config.video.frame_rate, Some(10.0));
    }
}
