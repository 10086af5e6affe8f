//! Video wrapper: webcam binding and playback control.

use crate::environment::Environment;
use crate::media_object::{ElementWrapper, MediaObject, Source};
use common::{MediafyError, MediafyResult};
use dom::{Event, EventCallback, EventType, NodeId, PropertyValue};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};
use web_apis::{MediaStream, MediaStreamConstraints, VideoFrame};

/// `HTMLMediaElement.readyState` values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MediaReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl From<MediaReadyState> for PropertyValue {
    fn from(state: MediaReadyState) -> Self {
        PropertyValue::Number(state as i32 as f64)
    }
}

/// A stream bound to the element.
struct StreamBinding {
    url: String,
    pump: JoinHandle<()>,
}

/// Video element wrapper.
pub struct Video {
    object: MediaObject,
    binding: Mutex<Option<StreamBinding>>,
}

impl ElementWrapper for Video {
    const TAG: &'static str = "video";

    fn object(&self) -> &MediaObject {
        &self.object
    }
}

impl Video {
    /// Wrap an existing video (`"#id"`) or create one (`(width, height)`,
    /// `Source::Create(None)`).
    pub fn new<'a>(env: &Environment, source: impl Into<Source<'a>>) -> MediafyResult<Self> {
        Ok(Self {
            object: MediaObject::new(env, Self::TAG, source.into())?,
            binding: Mutex::new(None),
        })
    }

    /// Request the camera and bind its stream to the element.
    ///
    /// On success the element's `src` holds an object URL for the stream and
    /// `on_loaded` is installed as its `onloadedmetadata` handler; it fires
    /// once the first frame arrives. The returned future stays pending while
    /// the permission prompt is unanswered.
    ///
    /// # Errors
    ///
    /// [`MediafyError::Unsupported`] if the host has no camera entry point,
    /// [`MediafyError::PermissionDenied`] if the user refused, and
    /// [`MediafyError::DeviceNotFound`] if there is no camera.
    pub async fn load_user_media<F>(&self, on_loaded: F) -> MediafyResult<&Self>
    where
        F: Fn(&mut Event) + Send + Sync + 'static,
    {
        let env = self.object.env();
        let constraints = MediaStreamConstraints::with_video(env.config().video.clone());
        let stream = env.user_media().get_user_media(&constraints).await?;
        self.bind(stream, Arc::new(on_loaded))?;
        Ok(self)
    }

    fn bind(&self, stream: MediaStream, on_loaded: EventCallback) -> MediafyResult<()> {
        let env = self.object.env();
        let node = self.element();

        self.unbind()?;

        let url = env.object_urls().create_object_url(stream.id());
        {
            let mut doc = env.document().write();
            let elem = doc.tree.get_element_mut(node).ok_or(MediafyError::StaleElement)?;
            elem.set_property("src", url.as_str().into());
            elem.set_property("readyState", MediaReadyState::HaveNothing.into());
            elem.set_property("ended", false.into());
            doc.events
                .set_handler(node, &EventType::LoadedMetadata, Some(on_loaded));
        }
        debug!(url = %url, stream = stream.id(), "bound stream to video");

        let pump = tokio::spawn(pump_frames(env.clone(), node, stream));
        *self.binding.lock() = Some(StreamBinding { url, pump });
        Ok(())
    }

    fn unbind(&self) -> MediafyResult<bool> {
        let Some(binding) = self.binding.lock().take() else {
            return Ok(false);
        };
        binding.pump.abort();

        let env = self.object.env();
        env.object_urls().revoke_object_url(&binding.url);
        self.object.with_element_mut(|e| {
            e.set_property("src", "".into());
            e.set_property("readyState", MediaReadyState::HaveNothing.into());
            e.set_surface(None);
        })?;
        debug!(url = %binding.url, "unbound stream");
        env.dispatch_event(self.element(), EventType::Emptied);
        Ok(true)
    }

    /// Stop the bound stream: revoke its URL, stop pumping frames and drop
    /// the current frame.
    pub fn stop(&self) -> MediafyResult<&Self> {
        self.unbind()?;
        Ok(self)
    }

    /// Whether a stream is currently bound.
    pub fn is_bound(&self) -> bool {
        self.binding.lock().is_some()
    }

    pub fn play(&self) -> MediafyResult<&Self> {
        self.set_paused(false, EventType::Play)?;
        Ok(self)
    }

    pub fn pause(&self) -> MediafyResult<&Self> {
        self.set_paused(true, EventType::Pause)?;
        Ok(self)
    }

    pub fn is_paused(&self) -> MediafyResult<bool> {
        self.object
            .with_element(|e| e.property("paused").map_or(true, |v| v.is_truthy()))
    }

    fn set_paused(&self, paused: bool, event: EventType) -> MediafyResult<()> {
        let changed = self.object.with_element_mut(|e| {
            let was = e.property("paused").map_or(true, |v| v.is_truthy());
            e.set_property("paused", paused.into());
            was != paused
        })?;
        if changed {
            trace!(paused, "playback state changed");
            self.object.env().dispatch_event(self.element(), event);
        }
        Ok(())
    }
}

// Only the pump and the URL registry are touched here. Dropping can happen
// inside an event callback, so the document lock is not taken.
impl Drop for Video {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.get_mut().take() {
            binding.pump.abort();
            self.object.env().object_urls().revoke_object_url(&binding.url);
            debug!(url = %binding.url, "released stream on drop");
        }
    }
}

impl std::fmt::Debug for Video {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Video")
            .field("object", &self.object)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Copy frames from `stream` into the element's surface until the stream
/// ends or the task is aborted.
async fn pump_frames(env: Environment, node: NodeId, mut stream: MediaStream) {
    let mut first = true;
    while let Some(frame) = stream.next_frame().await {
        if first {
            first = false;
            if !store_frame(&env, node, frame, MediaReadyState::HaveMetadata) {
                return;
            }
            env.dispatch_event(node, EventType::LoadedMetadata);
            set_ready_state(&env, node, MediaReadyState::HaveEnoughData);
            env.dispatch_event(node, EventType::LoadedData);
            continue;
        }

        let paused = {
            let doc = env.document().read();
            match doc.tree.get_element(node) {
                Some(e) => e.property("paused").map_or(true, |v| v.is_truthy()),
                None => return,
            }
        };
        if paused {
            trace!(sequence = frame.sequence, "paused, dropping frame");
            continue;
        }
        if !store_frame(&env, node, frame, MediaReadyState::HaveEnoughData) {
            return;
        }
    }

    debug!(stream = stream.id(), "stream ended");
    {
        let mut doc = env.document().write();
        if let Some(e) = doc.tree.get_element_mut(node) {
            e.set_property("ended", true.into());
        }
    }
    env.dispatch_event(node, EventType::Ended);
}

/// Write a frame into the element. Returns false if the element is gone.
fn store_frame(env: &Environment, node: NodeId, frame: VideoFrame, state: MediaReadyState) -> bool {
    let mut doc = env.document().write();
    let Some(elem) = doc.tree.get_element_mut(node) else {
        return false;
    };
    trace!(sequence = frame.sequence, "painting frame");
    match elem.surface() {
        Some(surface) => surface.write().replace(frame.bitmap),
        None => elem.set_surface(Some(frame.bitmap.shared())),
    }
    elem.set_property("readyState", state.into());
    true
}

fn set_ready_state(env: &Environment, node: NodeId, state: MediaReadyState) {
    if let Some(e) = env.document().write().tree.get_element_mut(node) {
        e.set_property("readyState", state.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MediafyConfig;
    use crate::{Canvas, Coords};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use web_apis::{CameraApis, Navigator, PermissionState, SyntheticCamera};

    fn env_with_camera(permission: PermissionState) -> Environment {
        let config = MediafyConfig::default()
            .with_video_size(16, 8)
            .with_frame_rate(200.0);
        let env = Environment::new(config).unwrap();
        env.navigator()
            .devices()
            .add_device(Arc::new(SyntheticCamera::new("Test Camera")));
        env.navigator().devices().set_permission(permission);
        env
    }

    fn notify_once() -> (impl Fn(&mut Event) + Send + Sync + 'static, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let callback = move |_: &mut Event| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(());
            }
        };
        (callback, rx)
    }

    #[test]
    fn test_play_pause_chain() {
        let env = Environment::new(MediafyConfig::default()).unwrap();
        let video = Video::new(&env, (320, 240)).unwrap();
        assert!(video.is_paused().unwrap());

        let plays = Arc::new(AtomicUsize::new(0));
        let p = plays.clone();
        env.document().write().events.add_listener(
            video.element(),
            &EventType::Play,
            Arc::new(move |_: &mut Event| {
                p.fetch_add(1, Ordering::SeqCst);
            }),
            Default::default(),
        );

        let same = video.play().unwrap().play().unwrap();
        assert!(std::ptr::eq(same, &video));
        assert!(!video.is_paused().unwrap());
        assert_eq!(plays.load(Ordering::SeqCst), 1);

        video.pause().unwrap();
        assert!(video.is_paused().unwrap());
    }

    #[tokio::test]
    async fn test_load_user_media_binds_stream() {
        let env = env_with_camera(PermissionState::Granted);
        let video = Video::new(&env, Source::Create(None)).unwrap();
        let (on_loaded, loaded) = notify_once();

        video.load_user_media(on_loaded).await.unwrap();
        assert!(video.is_bound());

        let src = video.object().property("src").unwrap().unwrap();
        let src = src.as_str().unwrap().to_string();
        assert!(src.starts_with("blob:null/"));
        assert!(env.object_urls().resolve(&src).is_some());

        tokio::time::timeout(Duration::from_secs(5), loaded)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            video.object().property("videoWidth").unwrap(),
            Some(PropertyValue::Number(16.0))
        );
        assert_eq!(
            video.object().property("videoHeight").unwrap(),
            Some(PropertyValue::Number(8.0))
        );
    }

    #[tokio::test]
    async fn test_frame_drawn_onto_canvas() {
        let env = env_with_camera(PermissionState::Granted);
        let video = Video::new(&env, Source::Create(None)).unwrap();
        let canvas = Canvas::new(&env, (16, 8)).unwrap();
        let (on_loaded, loaded) = notify_once();

        video.load_user_media(on_loaded).await.unwrap();
        loaded.await.unwrap();

        // Paused, so only the first frame was painted.
        canvas
            .put_image(&video, Some(Coords::new(0.0, 0.0, 16.0, 8.0)))
            .unwrap();
        let data = canvas.get_image_data(None).unwrap();
        assert_eq!(data.pixel(0, 0), Some(SyntheticCamera::BARS[0]));
        assert_eq!(data.pixel(2, 0), Some(SyntheticCamera::BARS[1]));
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let env = env_with_camera(PermissionState::Denied);
        let video = Video::new(&env, Source::Create(None)).unwrap();
        let err = video.load_user_media(|_: &mut Event| {}).await.unwrap_err();
        assert!(matches!(err, MediafyError::PermissionDenied(_)));
        assert!(!video.is_bound());
    }

    #[tokio::test]
    async fn test_no_camera_api() {
        let document = Arc::new(parking_lot::RwLock::new(dom::Document::blank()));
        let navigator = Navigator::new().with_camera_apis(CameraApis::empty());
        let env = Environment::with_host(document, navigator, MediafyConfig::default());
        let video = Video::new(&env, Source::Create(None)).unwrap();

        let err = video.load_user_media(|_: &mut Event| {}).await.unwrap_err();
        assert!(matches!(err, MediafyError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_no_device() {
        let env = Environment::new(MediafyConfig::default()).unwrap();
        env.navigator().devices().set_permission(PermissionState::Granted);
        let video = Video::new(&env, Source::Create(None)).unwrap();

        let err = video.load_user_media(|_: &mut Event| {}).await.unwrap_err();
        assert!(matches!(err, MediafyError::DeviceNotFound(_)));
    }

    #[tokio::test]
    async fn test_prompt_stays_pending() {
        let env = env_with_camera(PermissionState::Prompt);
        let video = Video::new(&env, Source::Create(None)).unwrap();

        let pending =
            tokio::time::timeout(Duration::from_millis(50), video.load_user_media(|_: &mut Event| {}))
                .await;
        assert!(pending.is_err());
        assert!(!video.is_bound());

        env.navigator().devices().set_permission(PermissionState::Granted);
        video.load_user_media(|_: &mut Event| {}).await.unwrap();
        assert!(video.is_bound());
    }

    #[tokio::test]
    async fn test_stop_revokes_url() {
        let env = env_with_camera(PermissionState::Granted);
        let video = Video::new(&env, Source::Create(None)).unwrap();
        let (on_loaded, loaded) = notify_once();
        video.load_user_media(on_loaded).await.unwrap();
        loaded.await.unwrap();

        let src = video.object().property("src").unwrap().unwrap().to_string();
        video.stop().unwrap();

        assert!(!video.is_bound());
        assert!(env.object_urls().resolve(&src).is_none());
        assert_eq!(
            video.object().property("src").unwrap(),
            Some(PropertyValue::from(""))
        );
        assert_eq!(
            video.object().property("videoWidth").unwrap(),
            Some(PropertyValue::Number(0.0))
        );
    }

    #[tokio::test]
    async fn test_rebinding_replaces_stream() {
        let env = env_with_camera(PermissionState::Granted);
        let video = Video::new(&env, Source::Create(None)).unwrap();
        video.load_user_media(|_: &mut Event| {}).await.unwrap();
        let first = video.object().property("src").unwrap().unwrap().to_string();

        video.load_user_media(|_: &mut Event| {}).await.unwrap();
        let second = video.object().property("src").unwrap().unwrap().to_string();

        assert_ne!(first, second);
        assert!(env.object_urls().resolve(&first).is_none());
        assert_eq!(env.object_urls().len(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_stream() {
        let env = env_with_camera(PermissionState::Granted);
        let video = Video::new(&env, Source::Create(None)).unwrap();
        let node = video.element();
        let (on_loaded, loaded) = notify_once();
        video.load_user_media(on_loaded).await.unwrap();
        loaded.await.unwrap();
        video.play().unwrap();
        assert_eq!(env.object_urls().len(), 1);

        drop(video);
        assert!(env.object_urls().is_empty());

        // A live pump would keep writing readyState back to HaveEnoughData.
        env.document()
            .write()
            .tree
            .get_element_mut(node)
            .unwrap()
            .set_property("readyState", MediaReadyState::HaveNothing.into());
        tokio::time::sleep(Duration::from_millis(60)).await;
        let state = env
            .document()
            .read()
            .tree
            .get_element(node)
            .and_then(|e| e.property("readyState"));
        assert_eq!(state, Some(PropertyValue::from(MediaReadyState::HaveNothing)));
    }
}
