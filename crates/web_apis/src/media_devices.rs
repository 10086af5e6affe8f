//! Media Capture and Streams: devices, permission gate and streams.
//!
//! `MediaDevices` owns the camera permission state and the capture devices
//! known to the host. `get_user_media` waits on the permission gate, picks
//! the first video device and starts it, yielding a [`MediaStream`] whose
//! frames arrive over a bounded channel.

use common::{Bitmap, MediafyError, Size};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};
use uuid::Uuid;

/// Frames buffered between a device and its consumer.
const FRAME_BUFFER: usize = 4;

/// Frame rates the synthetic camera can run at. Requests outside the range
/// are clamped.
const MIN_FRAME_RATE: f64 = 1.0;
const MAX_FRAME_RATE: f64 = 1000.0;

/// Largest resolution the synthetic camera renders, per side.
const MAX_RESOLUTION: u32 = 8192;

/// Errors raised while acquiring or running a capture stream.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MediaDevicesError {
    #[error("getUserMedia is not supported")]
    NotSupported,

    #[error("Permission denied by user")]
    PermissionDenied,

    #[error("No {0} input device available")]
    NotFound(String),

    #[error("Constraints cannot be satisfied: {0}")]
    Overconstrained(String),

    #[error("Invalid constraints: {0}")]
    InvalidConstraints(String),

    #[error("Device failed: {0}")]
    Device(String),
}

impl From<MediaDevicesError> for MediafyError {
    fn from(err: MediaDevicesError) -> Self {
        match err {
            MediaDevicesError::NotSupported => {
                MediafyError::Unsupported("camera access (getUserMedia)".to_string())
            }
            MediaDevicesError::PermissionDenied => MediafyError::PermissionDenied("camera".to_string()),
            MediaDevicesError::NotFound(kind) => MediafyError::DeviceNotFound(kind),
            MediaDevicesError::Overconstrained(msg) | MediaDevicesError::InvalidConstraints(msg) => {
                MediafyError::InvalidValue(msg)
            }
            MediaDevicesError::Device(msg) => MediafyError::Capture(msg),
        }
    }
}

/// Camera permission state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Permission granted.
    Granted,
    /// Permission denied.
    Denied,
    /// The user has not answered yet.
    Prompt,
}

impl PermissionState {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionState::Granted)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, PermissionState::Denied)
    }
}

/// Video track constraints. Unset fields leave the choice to the device.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoConstraints {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
}

/// Constraints passed to `getUserMedia`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaStreamConstraints {
    pub video: Option<VideoConstraints>,
    pub audio: bool,
}

impl MediaStreamConstraints {
    /// `{ video: true }`.
    pub fn video() -> Self {
        Self {
            video: Some(VideoConstraints::default()),
            audio: false,
        }
    }

    pub fn with_video(video: VideoConstraints) -> Self {
        Self {
            video: Some(video),
            audio: false,
        }
    }
}

/// Kind of an input device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
}

/// Information about an input device, as `enumerateDevices` reports it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    pub label: String,
}

/// Settings a running track actually uses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

/// A single captured frame.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub bitmap: Bitmap,
    /// Zero-based frame counter.
    pub sequence: u64,
    /// Time since the device started.
    pub timestamp: Duration,
}

/// A source of video frames.
pub trait CaptureDevice: Send + Sync {
    fn info(&self) -> DeviceInfo;

    /// Start capturing. Must be called within a tokio runtime; the device
    /// produces frames until the returned stream is stopped or dropped.
    fn start(&self, constraints: &VideoConstraints) -> Result<MediaStream, MediaDevicesError>;
}

/// A live capture stream with a single video track.
pub struct MediaStream {
    id: String,
    label: String,
    settings: TrackSettings,
    frames: mpsc::Receiver<VideoFrame>,
    ended: bool,
}

impl MediaStream {
    /// Wrap a frame receiver fed by a device.
    pub fn new(label: impl Into<String>, settings: TrackSettings, frames: mpsc::Receiver<VideoFrame>) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            id,
            label: label.into(),
            settings,
            frames,
            ended: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Label of the device feeding the track.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn settings(&self) -> TrackSettings {
        self.settings
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Wait for the next frame. Returns `None` once the stream has ended.
    pub async fn next_frame(&mut self) -> Option<VideoFrame> {
        if self.ended {
            return None;
        }
        let frame = self.frames.recv().await;
        if frame.is_none() {
            self.ended = true;
        }
        frame
    }

    /// Stop the track. Frames already buffered are discarded.
    pub fn stop(&mut self) {
        if !self.ended {
            debug!(stream = %self.id, "stopping stream");
            self.frames.close();
            self.ended = true;
        }
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("settings", &self.settings)
            .field("ended", &self.ended)
            .finish()
    }
}

/// A camera that renders a moving color-bar test pattern.
#[derive(Clone, Debug)]
pub struct SyntheticCamera {
    device_id: String,
    label: String,
    default_settings: TrackSettings,
    frame_limit: Option<u64>,
}

impl SyntheticCamera {
    /// Eight bars, left to right.
    pub const BARS: [[u8; 4]; 8] = [
        [255, 255, 255, 255],
        [255, 255, 0, 255],
        [0, 255, 255, 255],
        [0, 255, 0, 255],
        [255, 0, 255, 255],
        [255, 0, 0, 255],
        [0, 0, 255, 255],
        [0, 0, 0, 255],
    ];

    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            device_id: format!("synthetic:{}", label.to_ascii_lowercase().replace(' ', "-")),
            label,
            default_settings: TrackSettings {
                width: 640,
                height: 480,
                frame_rate: 30.0,
            },
            frame_limit: None,
        }
    }

    /// End the stream after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Resolution and rate used when constraints leave them open.
    pub fn with_default_settings(mut self, settings: TrackSettings) -> Self {
        self.default_settings = settings;
        self
    }

    /// Render frame `sequence`: the bars scroll one bar to the left per frame.
    /// Sizes over the bitmap limits render an empty bitmap.
    pub fn render(width: u32, height: u32, sequence: u64) -> Bitmap {
        if !Bitmap::fits(Size::new(width, height)) {
            return Bitmap::default();
        }
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        let bar_width = (width / Self::BARS.len() as u32).max(1);
        for _ in 0..height {
            for x in 0..width {
                let bar = (x / bar_width) as u64 + sequence;
                let color = Self::BARS[(bar % Self::BARS.len() as u64) as usize];
                pixels.extend_from_slice(&color);
            }
        }
        Bitmap::from_rgba(width, height, pixels).unwrap_or_default()
    }

    fn resolve(&self, constraints: &VideoConstraints) -> Result<TrackSettings, MediaDevicesError> {
        let mut settings = TrackSettings {
            width: constraints.width.unwrap_or(self.default_settings.width),
            height: constraints.height.unwrap_or(self.default_settings.height),
            frame_rate: constraints.frame_rate.unwrap_or(self.default_settings.frame_rate),
        };
        if settings.width == 0
            || settings.height == 0
            || settings.width > MAX_RESOLUTION
            || settings.height > MAX_RESOLUTION
        {
            return Err(MediaDevicesError::Overconstrained(format!(
                "resolution {}x{}",
                settings.width, settings.height
            )));
        }
        if !(settings.frame_rate.is_finite() && settings.frame_rate > 0.0) {
            return Err(MediaDevicesError::Overconstrained(format!(
                "frame rate {}",
                settings.frame_rate
            )));
        }
        settings.frame_rate = settings.frame_rate.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);
        Ok(settings)
    }
}

impl CaptureDevice for SyntheticCamera {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            device_id: self.device_id.clone(),
            kind: DeviceKind::VideoInput,
            label: self.label.clone(),
        }
    }

    fn start(&self, constraints: &VideoConstraints) -> Result<MediaStream, MediaDevicesError> {
        let settings = self.resolve(constraints)?;
        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let limit = self.frame_limit;
        let period = Duration::from_secs_f64(1.0 / settings.frame_rate);

        debug!(
            device = %self.device_id,
            width = settings.width,
            height = settings.height,
            frame_rate = settings.frame_rate,
            "starting synthetic camera"
        );

        tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let mut ticker = tokio::time::interval(period);
            let mut sequence = 0u64;
            loop {
                if limit.map_or(false, |l| sequence >= l) {
                    break;
                }
                ticker.tick().await;
                let frame = VideoFrame {
                    bitmap: SyntheticCamera::render(settings.width, settings.height, sequence),
                    sequence,
                    timestamp: started.elapsed(),
                };
                if tx.send(frame).await.is_err() {
                    break;
                }
                trace!(sequence, "frame produced");
                sequence += 1;
            }
            trace!(frames = sequence, "synthetic camera stopped");
        });

        Ok(MediaStream::new(self.label.clone(), settings, rx))
    }
}

/// The `navigator.mediaDevices` object.
pub struct MediaDevices {
    permission: watch::Sender<PermissionState>,
    devices: RwLock<Vec<Arc<dyn CaptureDevice>>>,
}

impl MediaDevices {
    /// No devices, permission not yet answered.
    pub fn new() -> Self {
        let (permission, _) = watch::channel(PermissionState::Prompt);
        Self {
            permission,
            devices: RwLock::new(Vec::new()),
        }
    }

    /// Register a capture device.
    pub fn add_device(&self, device: Arc<dyn CaptureDevice>) {
        debug!(device = %device.info().device_id, "capture device added");
        self.devices.write().push(device);
    }

    pub fn enumerate_devices(&self) -> Vec<DeviceInfo> {
        self.devices.read().iter().map(|d| d.info()).collect()
    }

    pub fn permission(&self) -> PermissionState {
        *self.permission.borrow()
    }

    /// Answer (or reset) the camera permission prompt. Wakes pending requests.
    pub fn set_permission(&self, state: PermissionState) {
        debug!(?state, "camera permission changed");
        self.permission.send_replace(state);
    }

    /// Resolve once the permission is granted. Stays pending while the
    /// prompt is unanswered.
    pub async fn request_permission(&self) -> Result<(), MediaDevicesError> {
        let mut rx = self.permission.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                PermissionState::Granted => return Ok(()),
                PermissionState::Denied => return Err(MediaDevicesError::PermissionDenied),
                PermissionState::Prompt => {
                    trace!("waiting for camera permission");
                    if rx.changed().await.is_err() {
                        return Err(MediaDevicesError::PermissionDenied);
                    }
                }
            }
        }
    }

    /// Prompt for camera access and start the first video device.
    pub async fn get_user_media(
        &self,
        constraints: &MediaStreamConstraints,
    ) -> Result<MediaStream, MediaDevicesError> {
        let video = match (&constraints.video, constraints.audio) {
            (Some(video), false) => video.clone(),
            (_, true) => return Err(MediaDevicesError::NotFound("audio".to_string())),
            (None, false) => {
                return Err(MediaDevicesError::InvalidConstraints(
                    "at least one of audio and video must be requested".to_string(),
                ))
            }
        };

        self.request_permission().await?;

        let device = self
            .devices
            .read()
            .iter()
            .find(|d| d.info().kind == DeviceKind::VideoInput)
            .cloned()
            .ok_or_else(|| MediaDevicesError::NotFound("video".to_string()))?;

        device.start(&video)
    }
}

impl Default for MediaDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MediaDevices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDevices")
            .field("permission", &self.permission())
            .field("devices", &self.enumerate_devices())
            .finish()
    }
}
